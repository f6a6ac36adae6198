use crate::assembler::ChunkAssembler;
use crate::boundary::extract;
use crate::config::{ChunkerConfig, SizeUnit};
use crate::error::{Degradation, Result};
use crate::language::{LanguageProfile, ProfileRegistry};
use crate::metadata::{MetadataEmitter, ScopeLabels};
use crate::scanner::scan;
use crate::source::{LineIndex, SizeIndex, SourceFile};
use crate::splitter::{FallbackSplitter, SplitLimits};
use crate::types::{ChunkKind, CodeChunk};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Chunks of one file plus everything that was recovered from on the way
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub chunks: Vec<CodeChunk>,
    pub degradations: Vec<Degradation>,
}

/// Main chunker interface for processing code
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
    registry: ProfileRegistry,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        let registry = ProfileRegistry::with_overrides(&config.language_profiles);
        Ok(Self { config, registry })
    }

    /// Chunk code from a string
    pub fn chunk_str(&self, content: &str, file_path: Option<&str>) -> Vec<CodeChunk> {
        let file = SourceFile::new(file_path.unwrap_or("unknown"), content);
        self.chunk(&file)
    }

    /// Chunk code from a file
    pub fn chunk_file(&self, path: impl AsRef<Path>) -> Result<Vec<CodeChunk>> {
        let file = SourceFile::read(path)?;
        Ok(self.chunk(&file))
    }

    /// Chunk one in-memory file
    pub fn chunk(&self, file: &SourceFile) -> Vec<CodeChunk> {
        self.chunk_with_report(file).chunks
    }

    /// Chunk many files in parallel; results keep the input order
    pub fn chunk_batch(&self, files: &[SourceFile]) -> Vec<ChunkOutcome> {
        files
            .par_iter()
            .map(|file| self.chunk_with_report(file))
            .collect()
    }

    /// Chunk one file and report the degradations met while doing so.
    ///
    /// Never fails: malformed input falls back to line windows for the
    /// affected span.
    pub fn chunk_with_report(&self, file: &SourceFile) -> ChunkOutcome {
        let (profile, known) = self.registry.resolve(file);
        let mut degradations = Vec::new();
        if !known {
            log::debug!(
                "No language profile for '{}', using '{}'",
                file.id,
                profile.id
            );
            degradations.push(Degradation::UnknownLanguage {
                file: file.id.clone(),
            });
        }

        let text = file.text.as_str();
        if text.is_empty() {
            return ChunkOutcome {
                chunks: Vec::new(),
                degradations,
            };
        }

        let scanned = scan(text, &profile);
        let lines = LineIndex::new(text);
        let (tree, extract_degradations) = extract(text, &scanned, &profile, &lines);
        let sizes = SizeIndex::new(text, self.config.size_unit);

        let splitter = FallbackSplitter::new(
            text,
            &scanned,
            &sizes,
            SplitLimits {
                max_size: self.config.max_chunk_size,
                overlap_lines: self.config.overlap_size,
            },
        );
        let assembler = ChunkAssembler::new(
            text,
            &tree,
            &scanned,
            &sizes,
            &splitter,
            self.config.max_chunk_size,
        );
        let (drafts, assemble_degradations) = assembler.assemble();

        let labels = ScopeLabels::new(text, &tree, &profile.scope_join);
        let emitter = MetadataEmitter {
            file,
            labels: &labels,
            profile: &profile,
            lines: &lines,
            sizes: &sizes,
            include_context_header: self.config.include_context_header,
        };
        let chunks: Vec<CodeChunk> = drafts.iter().map(|draft| emitter.emit(draft)).collect();

        degradations.extend(scanned.degradations.iter().cloned());
        degradations.extend(extract_degradations);
        degradations.extend(assemble_degradations);

        if degradations.iter().any(is_structural_damage) {
            log::warn!(
                "{}: malformed structure, parts of the file were split by lines",
                file.id
            );
        }
        for degradation in &degradations {
            log::debug!("{}: {degradation:?}", file.id);
        }
        log::trace!(
            "{}: {} regions, {} chunks",
            file.id,
            tree.region_count(),
            chunks.len()
        );

        ChunkOutcome {
            chunks,
            degradations,
        }
    }

    /// Profile that would be applied to `file`
    #[must_use]
    pub fn profile_for(&self, file: &SourceFile) -> Arc<LanguageProfile> {
        self.registry.resolve(file).0
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Profiles in effect, builtins plus configured overrides
    #[must_use]
    pub const fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Get statistics about chunking
    #[must_use]
    pub fn get_stats(chunks: &[CodeChunk]) -> ChunkingStats {
        let sizes = || chunks.iter().map(|chunk| chunk.metadata.size);
        let total_size: usize = sizes().sum();
        ChunkingStats {
            total_chunks: chunks.len(),
            total_lines: chunks.iter().map(CodeChunk::line_count).sum(),
            total_size,
            avg_size_per_chunk: if chunks.is_empty() {
                0
            } else {
                total_size / chunks.len()
            },
            min_size: sizes().min().unwrap_or(0),
            max_size: sizes().max().unwrap_or(0),
            fragments: chunks
                .iter()
                .filter(|chunk| chunk.metadata.kind == ChunkKind::Fragment)
                .count(),
            oversized: chunks.iter().filter(|chunk| chunk.is_oversized()).count(),
            size_unit: chunks
                .first()
                .map_or_else(SizeUnit::default, |chunk| chunk.metadata.size_unit),
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            config: ChunkerConfig::default(),
            registry: ProfileRegistry::builtin().clone(),
        }
    }
}

const fn is_structural_damage(degradation: &Degradation) -> bool {
    matches!(
        degradation,
        Degradation::UnterminatedLiteral { .. }
            | Degradation::UnterminatedComment { .. }
            | Degradation::UnbalancedBraces { .. }
    )
}

/// Statistics about chunking results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_lines: usize,
    pub total_size: usize,
    pub avg_size_per_chunk: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub fragments: usize,
    pub oversized: usize,
    /// Unit all sizes are measured in
    pub size_unit: SizeUnit,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Lines: {} | Size: {} {} | Avg: {} | Range: {}-{}",
            self.total_chunks,
            self.total_lines,
            self.total_size,
            self.size_unit.as_str(),
            self.avg_size_per_chunk,
            self.min_size,
            self.max_size,
        )?;
        write!(
            f,
            " | Fragments: {} | Oversized: {}",
            self.fragments, self.oversized
        )
    }
}
