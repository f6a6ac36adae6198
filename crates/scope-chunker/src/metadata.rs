//! Chunk drafts to [`CodeChunk`]s: ranges, lines, symbol paths, headers.

use crate::boundary::{RegionId, SyntaxTree};
use crate::language::LanguageProfile;
use crate::source::{LineIndex, SizeIndex, SourceFile};
use crate::types::{ChunkKind, ChunkMetadata, CodeChunk, RegionKind};
use std::ops::Range;
use std::rc::Rc;

const ANONYMOUS: &str = "<anonymous>";
const UNKNOWN: &str = "<unknown>";

/// A chunk before metadata: byte ranges plus the region it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub range: Range<usize>,
    pub primary_start: usize,
    pub kind: ChunkKind,
    /// Region whose symbol path the chunk carries
    pub scope: RegionId,
    pub oversized: bool,
}

/// Symbol path and context header of every region, built in one pre-order
/// pass over the arena.
///
/// Blocks share their parent's labels, so transparent nesting adds no work
/// per chunk.
#[derive(Debug, Clone)]
pub struct ScopeLabels {
    /// Joined names of the named scopes enclosing and including each region
    paths: Vec<Option<Rc<str>>>,
    /// Joined headers of the named scopes enclosing and including each region
    headers: Vec<Option<Rc<str>>>,
    /// Same as `headers`, without the region's own header
    outer_headers: Vec<Option<Rc<str>>>,
}

impl ScopeLabels {
    #[must_use]
    pub fn new(text: &str, tree: &SyntaxTree, join: &str) -> Self {
        let count = tree.region_count();
        let mut labels = Self {
            paths: vec![None; count],
            headers: vec![None; count],
            outer_headers: vec![None; count],
        };
        let header_join = format!(" {join} ");

        // Parents are labeled before their children.
        let mut stack: Vec<RegionId> = tree.root().children.clone();
        while let Some(id) = stack.pop() {
            let region = tree.region(id);
            let parent = region.parent.unwrap_or(SyntaxTree::ROOT);
            let mut path = labels.paths[parent].clone();
            let outer = labels.headers[parent].clone();
            let mut header = outer.clone();

            if region.kind.is_named_scope() {
                let name = match region.kind {
                    RegionKind::Unknown => UNKNOWN,
                    _ => region.name.as_deref().unwrap_or(ANONYMOUS),
                };
                path = Some(extend(path.as_deref(), join, name));
                if let Some(own) = normalized(text, region.header.clone()) {
                    header = Some(extend(header.as_deref(), &header_join, &own));
                }
            }

            labels.paths[id] = path;
            labels.headers[id] = header;
            labels.outer_headers[id] = outer;
            stack.extend(region.children.iter().copied());
        }
        labels
    }

    /// Ancestor-qualified name of `id`, `None` at file level
    #[must_use]
    pub fn symbol_path(&self, id: RegionId) -> Option<&str> {
        self.paths.get(id)?.as_deref()
    }

    /// Declaration lines of the scopes enclosing `id`, outermost first
    #[must_use]
    pub fn context_header(&self, id: RegionId, include_self: bool) -> Option<&str> {
        let headers = if include_self {
            &self.headers
        } else {
            &self.outer_headers
        };
        headers.get(id)?.as_deref()
    }
}

fn extend(prefix: Option<&str>, join: &str, part: &str) -> Rc<str> {
    match prefix {
        Some(prefix) => format!("{prefix}{join}{part}").into(),
        None => part.into(),
    }
}

/// Header text with whitespace runs collapsed, `None` when empty
fn normalized(text: &str, header: Range<usize>) -> Option<String> {
    let header = text.get(header)?;
    let normalized = header.split_whitespace().collect::<Vec<_>>().join(" ");
    (!normalized.is_empty()).then_some(normalized)
}

/// Attaches file, position, symbol path and size to drafts of one file
pub struct MetadataEmitter<'a> {
    pub file: &'a SourceFile,
    pub labels: &'a ScopeLabels,
    pub profile: &'a LanguageProfile,
    pub lines: &'a LineIndex,
    pub sizes: &'a SizeIndex,
    pub include_context_header: bool,
}

impl MetadataEmitter<'_> {
    #[must_use]
    pub fn emit(&self, draft: &ChunkDraft) -> CodeChunk {
        let range = draft.range.clone();
        let (start_line, end_line) = self.lines.line_range(range.start, range.end);

        // A whole region already shows its own header in its content.
        let own_header = !matches!(draft.kind, ChunkKind::Region(_));
        let context_header = if self.include_context_header {
            self.labels
                .context_header(draft.scope, own_header)
                .map(str::to_string)
        } else {
            None
        };

        CodeChunk {
            file_path: self.file.id.clone(),
            start_byte: range.start,
            end_byte: range.end,
            primary_start_byte: draft.primary_start,
            start_line,
            end_line,
            content: self.file.text[range.clone()].to_string(),
            context_header,
            metadata: ChunkMetadata {
                language: self.profile.id.clone(),
                kind: draft.kind,
                symbol_path: self.labels.symbol_path(draft.scope).map(str::to_string),
                size: self.sizes.size(range),
                size_unit: self.sizes.unit(),
                oversized: draft.oversized,
            },
        }
    }
}
