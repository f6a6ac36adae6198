use crate::config::SizeUnit;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use unicode_segmentation::UnicodeSegmentation;

/// One input file: identifier, full text and an optional language hint.
///
/// The chunker only borrows a `SourceFile`; every region and chunk refers
/// back into `text` by byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// File identifier (usually a relative path)
    pub id: String,

    /// Full file text
    pub text: String,

    /// Explicit language id or extension, takes precedence over the id's extension
    #[serde(default)]
    pub language_hint: Option<String>,
}

impl SourceFile {
    /// Create a source file without a language hint
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            language_hint: None,
        }
    }

    /// Builder: set the language hint
    #[must_use]
    pub fn with_language(mut self, hint: impl Into<String>) -> Self {
        self.language_hint = Some(hint.into());
        self
    }

    /// Read a file from disk, using its path as identifier
    pub fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path.to_string_lossy(), text))
    }

    /// Lower-cased extension of the identifier, if any
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.id)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
    }
}

/// Byte offset to 1-based line number lookup.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the first byte of every line
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self {
            line_starts,
            len: text.len(),
        }
    }

    /// Line (1-based) containing the byte at `offset`
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.len);
        match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }

    /// Inclusive 1-based line range covered by the bytes `start..end`.
    ///
    /// An empty range reports the line `start` is on.
    #[must_use]
    pub fn line_range(&self, start: usize, end: usize) -> (usize, usize) {
        let first = self.line_of(start);
        if end <= start {
            return (first, first);
        }
        (first, self.line_of(end - 1).max(first))
    }

    /// Number of lines, counting a trailing line without newline
    #[must_use]
    pub fn line_count(&self) -> usize {
        match self.line_starts.last() {
            Some(&last) if last == self.len => self.line_starts.len() - 1,
            _ => self.line_starts.len(),
        }
    }
}

/// Constant-time size of any byte range in one [`SizeUnit`].
///
/// Counts the units that *start* inside a range, so it agrees with
/// [`SizeUnit::measure`] whenever the range edges fall on token boundaries
/// (line starts, braces, statement starts).
#[derive(Debug, Clone)]
pub struct SizeIndex {
    unit: SizeUnit,
    /// `prefix[i]`: units starting before byte `i`
    prefix: Vec<u32>,
}

impl SizeIndex {
    pub fn new(text: &str, unit: SizeUnit) -> Self {
        let mut starts = vec![0u32; text.len() + 1];
        match unit {
            SizeUnit::Characters => {
                for (idx, _) in text.char_indices() {
                    starts[idx + 1] = 1;
                }
            }
            SizeUnit::Tokens => {
                for (idx, segment) in text.split_word_bound_indices() {
                    if !segment.trim().is_empty() {
                        starts[idx + 1] = 1;
                    }
                }
            }
        }
        let mut total = 0u32;
        for slot in &mut starts {
            total += *slot;
            *slot = total;
        }
        Self {
            unit,
            prefix: starts,
        }
    }

    #[must_use]
    pub fn unit(&self) -> SizeUnit {
        self.unit
    }

    /// Size of the bytes in `range`
    #[must_use]
    pub fn size(&self, range: Range<usize>) -> usize {
        let end = range.end.min(self.prefix.len() - 1);
        let start = range.start.min(end);
        (self.prefix[end] - self.prefix[start]) as usize
    }
}

/// Byte offsets just past every `\n` strictly inside `start..end`.
pub(crate) fn line_breaks(
    text: &str,
    start: usize,
    end: usize,
) -> impl Iterator<Item = usize> + '_ {
    text.as_bytes()[start..end]
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .map(move |(idx, _)| start + idx + 1)
        .filter(move |&pos| pos < end)
}
