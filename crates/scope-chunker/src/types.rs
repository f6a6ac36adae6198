use crate::config::SizeUnit;
use crate::language::LanguageProfile;
use serde::{Deserialize, Serialize};

/// A bounded, contiguous slice of a source file with metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeChunk {
    /// Source file identifier
    pub file_path: String,

    /// First byte of the chunk, overlap included
    pub start_byte: usize,

    /// One past the last byte of the chunk
    pub end_byte: usize,

    /// First byte that no earlier chunk already carried.
    ///
    /// Equal to `start_byte` except for fallback fragments that repeat the
    /// tail of the previous fragment.
    pub primary_start_byte: usize,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// Exact original text of `start_byte..end_byte`
    pub content: String,

    /// Enclosing declarations, outermost first, joined for display.
    ///
    /// Never part of `content`; see [`CodeChunk::render`].
    pub context_header: Option<String>,

    /// Rich metadata about this chunk
    pub metadata: ChunkMetadata,
}

impl CodeChunk {
    /// Get the number of lines in this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Check if chunk contains a specific line
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// Text this chunk contributes that the previous chunk did not carry
    #[must_use]
    pub fn primary_content(&self) -> &str {
        let skip = self.primary_start_byte.saturating_sub(self.start_byte);
        self.content.get(skip..).unwrap_or_default()
    }

    /// Text repeated from the previous chunk, empty for structural chunks
    #[must_use]
    pub fn overlap_content(&self) -> &str {
        let skip = self.primary_start_byte.saturating_sub(self.start_byte);
        self.content.get(..skip).unwrap_or_default()
    }

    /// Whether this chunk exceeds the budget because it cannot be split
    #[must_use]
    pub const fn is_oversized(&self) -> bool {
        self.metadata.oversized
    }

    /// Chunk text with the context header prepended as a comment line.
    ///
    /// The header line is the only synthesized text and always ends with a
    /// newline, so `render(..).ends_with(&chunk.content)` holds.
    #[must_use]
    pub fn render(&self, profile: &LanguageProfile) -> String {
        match &self.context_header {
            Some(header) => format!("{}\n{}", profile.comment_line(header), self.content),
            None => self.content.clone(),
        }
    }
}

/// Metadata about a code chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Language profile id
    pub language: String,

    /// What produced the chunk
    pub kind: ChunkKind,

    /// Ancestor-qualified name, `None` at file level
    pub symbol_path: Option<String>,

    /// Size of `content` in `size_unit`
    pub size: usize,

    /// Unit `size` is measured in
    pub size_unit: SizeUnit,

    /// Exceeds the budget because it is an atomic, unsplittable unit
    #[serde(default)]
    pub oversized: bool,
}

/// Kind of a syntactic region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Whole input file
    File,
    /// Namespace, module or package block
    Namespace,
    /// Class, struct, enum, interface, trait, impl block
    Class,
    /// Function, method, constructor
    Function,
    /// Any other brace pair: control flow, lambda, initializer
    Block,
    /// Brace structure that could not be trusted
    Unknown,
}

impl RegionKind {
    /// Whether regions of this kind contribute a component to symbol paths
    #[must_use]
    pub const fn is_named_scope(self) -> bool {
        matches!(
            self,
            Self::Namespace | Self::Class | Self::Function | Self::Unknown
        )
    }

    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Namespace => "namespace",
            Self::Class => "class",
            Self::Function => "function",
            Self::Block => "block",
            Self::Unknown => "unknown",
        }
    }
}

/// What produced a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "region", rename_all = "snake_case")]
pub enum ChunkKind {
    /// A whole region that fits the budget
    Region(RegionKind),
    /// Code of a region not covered by any child region
    Glue,
    /// A line window cut by the fallback splitter
    Fragment,
}

impl ChunkKind {
    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Region(kind) => kind.as_str(),
            Self::Glue => "glue",
            Self::Fragment => "fragment",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ProfileRegistry;

    fn chunk(content: &str, start: usize, primary: usize) -> CodeChunk {
        CodeChunk {
            file_path: "test.cpp".to_string(),
            start_byte: start,
            end_byte: start + content.len(),
            primary_start_byte: primary,
            start_line: 10,
            end_line: 15,
            content: content.to_string(),
            context_header: None,
            metadata: ChunkMetadata {
                language: "cpp".to_string(),
                kind: ChunkKind::Fragment,
                symbol_path: None,
                size: content.len(),
                size_unit: SizeUnit::Characters,
                oversized: false,
            },
        }
    }

    #[test]
    fn test_chunk_line_count() {
        assert_eq!(chunk("code", 0, 0).line_count(), 6);
    }

    #[test]
    fn test_chunk_contains_line() {
        let chunk = chunk("code", 0, 0);
        assert!(chunk.contains_line(10));
        assert!(chunk.contains_line(12));
        assert!(chunk.contains_line(15));
        assert!(!chunk.contains_line(9));
        assert!(!chunk.contains_line(16));
    }

    #[test]
    fn primary_and_overlap_split_content() {
        let chunk = chunk("b\nc\nd\n", 2, 4);
        assert_eq!(chunk.overlap_content(), "b\n");
        assert_eq!(chunk.primary_content(), "c\nd\n");
    }

    #[test]
    fn render_prefixes_header_comment() {
        let cpp = ProfileRegistry::builtin().lookup("cpp").unwrap();
        let mut chunk = chunk("int f() {}\n", 0, 0);
        assert_eq!(chunk.render(cpp), "int f() {}\n");

        chunk.context_header = Some("namespace a :: class B".to_string());
        assert_eq!(
            chunk.render(cpp),
            "// namespace a :: class B\nint f() {}\n"
        );
    }

    #[test]
    fn named_scope_kinds() {
        assert!(RegionKind::Class.is_named_scope());
        assert!(RegionKind::Unknown.is_named_scope());
        assert!(!RegionKind::Block.is_named_scope());
        assert!(!RegionKind::File.is_named_scope());
        assert_eq!(ChunkKind::Region(RegionKind::Function).as_str(), "function");
        assert_eq!(ChunkKind::Glue.as_str(), "glue");
    }
}
