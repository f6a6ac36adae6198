//! # Context Scope Chunker
//!
//! Syntax-boundary-aware code chunking for semantic search and AI context,
//! without a per-language grammar.
//!
//! ## Philosophy
//!
//! The chunker cuts source files into bounded fragments that:
//! - Follow brace-delimited scopes (namespaces, classes, functions)
//! - Carry the declarations of their enclosing scopes as a context header
//! - Never split inside a string, a comment or a line
//! - Reproduce the original file exactly when their primary text is joined
//!
//! ## Architecture
//!
//! ```text
//! SourceFile
//!     │
//!     ├──> Profile Registry (language hint / extension → LanguageProfile)
//!     │
//!     ├──> Lexical Scanner → code / comment / literal events, brace deltas
//!     │
//!     ├──> Boundary Extractor → region tree (arena, explicit stack)
//!     │    └─> Header classifier: namespace / class / function / block
//!     │
//!     ├──> Chunk Assembler
//!     │    ├─> Whole regions that fit the budget
//!     │    ├─> Glue between child regions
//!     │    └─> Fallback Splitter for oversized leaves (line windows + overlap)
//!     │
//!     └──> Metadata Emitter → CodeChunk[] (lines, symbol path, size, header)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use context_scope_chunker::{Chunker, ChunkerConfig};
//!
//! let config = ChunkerConfig {
//!     max_chunk_size: 120,
//!     ..ChunkerConfig::default()
//! };
//! let chunker = Chunker::new(config).unwrap();
//!
//! let code = r#"
//! namespace geo {
//! struct Point {
//!     double length() const {
//!         return std::sqrt(x * x + y * y);
//!     }
//!     double x;
//!     double y;
//! };
//! }
//! "#;
//!
//! let chunks = chunker.chunk_str(code, Some("geo.cpp"));
//! for chunk in &chunks {
//!     println!(
//!         "Chunk at lines {}-{}: {}",
//!         chunk.start_line,
//!         chunk.end_line,
//!         chunk.metadata.symbol_path.as_deref().unwrap_or("<file>")
//!     );
//! }
//! let rebuilt: String = chunks.iter().map(|c| c.primary_content()).collect();
//! assert_eq!(rebuilt, code);
//! ```

mod assembler;
mod boundary;
mod chunker;
mod config;
mod error;
mod header;
mod language;
mod metadata;
mod scanner;
mod source;
mod splitter;
mod types;

pub use boundary::{extract, RegionId, SyntaxRegion, SyntaxTree};
pub use chunker::{ChunkOutcome, Chunker, ChunkingStats};
pub use config::{ChunkerConfig, SizeUnit};
pub use error::{ChunkerError, Degradation, Result};
pub use header::{classify, HeaderClass};
pub use language::{
    default_profile, BlockComment, LanguageProfile, ProfileOverride, ProfileRegistry,
    QuoteRule, ScopeKeyword, DEFAULT_PROFILE_ID,
};
pub use scanner::{scan, Nesting, ScanEvent, ScanKind, ScanOutput};
pub use source::{LineIndex, SizeIndex, SourceFile};
pub use splitter::{FallbackSplitter, SplitLimits, Window};
pub use types::{ChunkKind, ChunkMetadata, CodeChunk, RegionKind};
