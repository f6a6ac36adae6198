use crate::error::{ChunkerError, Result};
use crate::language::ProfileOverride;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use unicode_segmentation::UnicodeSegmentation;

/// Configuration for code chunking behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkerConfig {
    /// Hard size budget per chunk, in `size_unit`
    pub max_chunk_size: usize,

    /// Lines repeated between consecutive fallback fragments
    pub overlap_size: usize,

    /// Unit chunk sizes are measured in
    pub size_unit: SizeUnit,

    /// Attach enclosing declarations to each chunk
    pub include_context_header: bool,

    /// Profile overrides keyed by language id or extension
    pub language_profiles: BTreeMap<String, ProfileOverride>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 2500,
            overlap_size: 2,
            size_unit: SizeUnit::Characters,
            include_context_header: true,
            language_profiles: BTreeMap::new(),
        }
    }
}

impl ChunkerConfig {
    /// Create config optimized for embeddings (smaller, focused chunks)
    pub fn for_embeddings() -> Self {
        Self {
            max_chunk_size: 512,
            overlap_size: 2,
            size_unit: SizeUnit::Tokens,
            ..Default::default()
        }
    }

    /// Create config optimized for LLM context (larger, comprehensive chunks)
    pub fn for_llm_context() -> Self {
        Self {
            max_chunk_size: 2048,
            overlap_size: 4,
            size_unit: SizeUnit::Tokens,
            ..Default::default()
        }
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(ChunkerError::config_parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document and validate it
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(ChunkerError::config_parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(ChunkerError::invalid_config("max_chunk_size must be > 0"));
        }

        if self.overlap_size.saturating_mul(2) >= self.max_chunk_size {
            return Err(ChunkerError::invalid_config(format!(
                "overlap_size ({}) must be less than half of max_chunk_size ({})",
                self.overlap_size, self.max_chunk_size
            )));
        }

        for (key, profile) in &self.language_profiles {
            if profile.scope_join.as_deref() == Some("") {
                return Err(ChunkerError::invalid_config(format!(
                    "language profile '{key}' has an empty scope_join"
                )));
            }
            let empty_marker = profile
                .line_comments
                .iter()
                .flatten()
                .any(String::is_empty)
                || profile
                    .strings
                    .iter()
                    .chain(profile.chars.iter())
                    .flatten()
                    .any(|rule| rule.delimiter.is_empty())
                || profile
                    .block_comments
                    .iter()
                    .flatten()
                    .any(|block| block.open.is_empty() || block.close.is_empty());
            if empty_marker {
                return Err(ChunkerError::invalid_config(format!(
                    "language profile '{key}' has an empty delimiter"
                )));
            }
        }

        Ok(())
    }
}

/// Unit chunk sizes are measured in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeUnit {
    /// Unicode scalar values
    #[default]
    Characters,
    /// Non-whitespace word-boundary segments, a tokenizer-free token estimate
    Tokens,
}

impl SizeUnit {
    /// Size of `text` in this unit.
    ///
    /// Both units are additive over line boundaries, so the size of a range
    /// of whole lines is the sum of the sizes of its lines.
    #[must_use]
    pub fn measure(self, text: &str) -> usize {
        match self {
            Self::Characters => text.chars().count(),
            Self::Tokens => text
                .split_word_bounds()
                .filter(|segment| !segment.trim().is_empty())
                .count(),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Characters => "characters",
            Self::Tokens => "tokens",
        }
    }
}
