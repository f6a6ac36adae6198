//! Region tree to ordered chunk drafts under a size budget.
//!
//! Every region is handled over its *extent*: its span plus the comment and
//! blank lines directly above it and the trivia left on the line of its
//! closing brace (`};`, `} // namespace x`). A region whose extent fits the
//! budget becomes one chunk. A larger one is broken into pieces in source
//! order: named children recurse, everything else (glue code and anonymous
//! blocks) is packed into windows that fit. Leaves that still do not fit go
//! to the fallback splitter.
//!
//! The walk uses an explicit work stack, so nesting depth never reaches the
//! call stack.

use crate::boundary::{RegionId, SyntaxTree};
use crate::error::Degradation;
use crate::metadata::ChunkDraft;
use crate::scanner::ScanOutput;
use crate::source::SizeIndex;
use crate::splitter::FallbackSplitter;
use crate::types::{ChunkKind, RegionKind};
use std::ops::Range;

/// Trivia allowed after a closing brace on the same line
const TRAILING_SEPARATORS: &[u8] = b";,";

/// One step of the walk
#[derive(Debug)]
enum Task {
    /// Break a region larger than the budget into pieces
    Expand { region: RegionId, extent: Range<usize> },
    /// Emit a finished draft
    Emit(ChunkDraft),
    /// Cut a span into line windows
    Split { span: Range<usize>, scope: RegionId },
}

/// Part of a region's extent
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Child { id: RegionId, extent: Range<usize> },
    Glue(Range<usize>),
}

impl Piece {
    fn range(&self) -> &Range<usize> {
        match self {
            Self::Child { extent, .. } => extent,
            Self::Glue(range) => range,
        }
    }

    fn range_mut(&mut self) -> &mut Range<usize> {
        match self {
            Self::Child { extent, .. } => extent,
            Self::Glue(range) => range,
        }
    }
}

/// Consecutive glue and anonymous blocks packed into one chunk
struct Run {
    range: Range<usize>,
    size: usize,
    /// The only piece, when the run holds a single block
    single_block: Option<RegionId>,
}

pub struct ChunkAssembler<'a> {
    text: &'a str,
    tree: &'a SyntaxTree,
    scan: &'a ScanOutput,
    sizes: &'a SizeIndex,
    splitter: &'a FallbackSplitter<'a>,
    budget: usize,
}

impl<'a> ChunkAssembler<'a> {
    pub fn new(
        text: &'a str,
        tree: &'a SyntaxTree,
        scan: &'a ScanOutput,
        sizes: &'a SizeIndex,
        splitter: &'a FallbackSplitter<'a>,
        budget: usize,
    ) -> Self {
        Self {
            text,
            tree,
            scan,
            sizes,
            splitter,
            budget,
        }
    }

    /// Drafts in file order; primary ranges cover the text exactly once
    pub fn assemble(&self) -> (Vec<ChunkDraft>, Vec<Degradation>) {
        let mut drafts = Vec::new();
        let mut degradations = Vec::new();
        if self.text.is_empty() {
            return (drafts, degradations);
        }

        let file_span = 0..self.text.len();
        let mut stack = vec![self.region_task(SyntaxTree::ROOT, file_span)];

        while let Some(task) = stack.pop() {
            match task {
                Task::Emit(draft) => drafts.push(draft),
                Task::Split { span, scope } => {
                    let (windows, degraded) = self.splitter.split(span);
                    degradations.extend(degraded);
                    drafts.extend(windows.into_iter().map(|window| ChunkDraft {
                        range: window.range,
                        primary_start: window.primary_start,
                        kind: ChunkKind::Fragment,
                        scope,
                        oversized: window.oversized,
                    }));
                }
                Task::Expand { region, extent } => {
                    let tasks = self.expand(region, extent);
                    // Reversed so the first piece is popped first.
                    stack.extend(tasks.into_iter().rev());
                }
            }
        }

        (drafts, degradations)
    }

    /// What to do with a region occupying `extent`
    fn region_task(&self, id: RegionId, extent: Range<usize>) -> Task {
        let region = self.tree.region(id);
        if self.sizes.size(extent.clone()) <= self.budget {
            return Task::Emit(whole(extent, ChunkKind::Region(region.kind), id));
        }
        if region.is_leaf() || region.kind == RegionKind::Unknown {
            log::trace!("Region {id} exceeds budget, splitting by lines");
            Task::Split {
                span: extent,
                scope: id,
            }
        } else {
            Task::Expand { region: id, extent }
        }
    }

    fn expand(&self, id: RegionId, extent: Range<usize>) -> Vec<Task> {
        let mut tasks = Vec::new();
        let mut run: Option<Run> = None;

        for piece in self.pieces(id, extent) {
            let range = piece.range().clone();
            let size = self.sizes.size(range.clone());
            let block = match piece {
                Piece::Child { id: child, .. } => {
                    let region = self.tree.region(child);
                    if region.kind != RegionKind::Block {
                        self.flush(&mut run, id, &mut tasks);
                        tasks.push(self.region_task(child, range));
                        continue;
                    }
                    Some(child)
                }
                Piece::Glue(_) => None,
            };

            if size > self.budget {
                self.flush(&mut run, id, &mut tasks);
                tasks.push(match block {
                    Some(child) => self.region_task(child, range),
                    None => Task::Split {
                        span: range,
                        scope: id,
                    },
                });
                continue;
            }

            match run.as_mut() {
                Some(current) if current.size + size <= self.budget => {
                    current.range.end = range.end;
                    current.size += size;
                    current.single_block = None;
                }
                _ => {
                    self.flush(&mut run, id, &mut tasks);
                    run = Some(Run {
                        range,
                        size,
                        single_block: block,
                    });
                }
            }
        }
        self.flush(&mut run, id, &mut tasks);
        tasks
    }

    fn flush(&self, run: &mut Option<Run>, scope: RegionId, tasks: &mut Vec<Task>) {
        let Some(run) = run.take() else {
            return;
        };
        let draft = match run.single_block {
            Some(block) => whole(run.range, ChunkKind::Region(RegionKind::Block), block),
            None => whole(run.range, ChunkKind::Glue, scope),
        };
        tasks.push(Task::Emit(draft));
    }

    /// Split the extent of `id` into child extents and glue, in order
    fn pieces(&self, id: RegionId, extent: Range<usize>) -> Vec<Piece> {
        let region = self.tree.region(id);
        // Trailing trivia of the last child cannot swallow the closing brace.
        let limit = if id == SyntaxTree::ROOT {
            extent.end
        } else {
            region.body.end
        };

        let mut pieces = Vec::with_capacity(region.children.len() * 2 + 1);
        let mut cursor = extent.start;
        for (idx, &child) in region.children.iter().enumerate() {
            let span = &self.tree.region(child).span;
            let next_limit = region
                .children
                .get(idx + 1)
                .map_or(limit, |&next| self.tree.region(next).span.start);

            let start = self.leading_start(cursor, span.start);
            let end = self.trailing_end(span.end, next_limit);
            if cursor < start {
                pieces.push(Piece::Glue(cursor..start));
            }
            pieces.push(Piece::Child {
                id: child,
                extent: start..end,
            });
            cursor = end;
        }
        if cursor < extent.end {
            pieces.push(Piece::Glue(cursor..extent.end));
        }

        self.absorb_blank_glue(pieces)
    }

    /// Whitespace-only glue joins the piece before it (or after it)
    fn absorb_blank_glue(&self, pieces: Vec<Piece>) -> Vec<Piece> {
        let mut out: Vec<Piece> = Vec::with_capacity(pieces.len());
        let mut pending: Option<Range<usize>> = None;
        for mut piece in pieces {
            let blank = matches!(&piece, Piece::Glue(range)
                if self.text[range.clone()].trim().is_empty());
            if blank {
                match out.last_mut() {
                    Some(prev) => prev.range_mut().end = piece.range().end,
                    None => pending = Some(piece.range().clone()),
                }
                continue;
            }
            if let Some(blank) = pending.take() {
                piece.range_mut().start = blank.start;
            }
            out.push(piece);
        }
        // Nothing but whitespace: keep it as glue.
        out.extend(pending.map(Piece::Glue));
        out
    }

    /// Start of the comment and blank lines directly above `span_start`
    fn leading_start(&self, floor: usize, span_start: usize) -> usize {
        let bytes = self.text.as_bytes();
        let mut start = span_start;
        let mut line_start = self.text[..span_start].rfind('\n').map_or(0, |nl| nl + 1);
        while line_start >= floor && self.scan.is_trivia(self.text, line_start..start, b"") {
            start = line_start;
            if line_start == 0 || line_start == floor {
                break;
            }
            // Previous line.
            line_start = bytes[..line_start - 1]
                .iter()
                .rposition(|&b| b == b'\n')
                .map_or(0, |nl| nl + 1);
        }
        start
    }

    /// End of the closing line of a child, when the rest of it is trivia
    fn trailing_end(&self, span_end: usize, limit: usize) -> usize {
        if span_end >= limit {
            return span_end;
        }
        let line_end = self.text[span_end..limit]
            .find('\n')
            .map_or(limit, |nl| span_end + nl + 1);
        if self.scan.is_trivia(self.text, span_end..line_end, TRAILING_SEPARATORS) {
            line_end
        } else {
            span_end
        }
    }
}

fn whole(range: Range<usize>, kind: ChunkKind, scope: RegionId) -> ChunkDraft {
    ChunkDraft {
        primary_start: range.start,
        range,
        kind,
        scope,
        oversized: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::extract;
    use crate::config::SizeUnit;
    use crate::language::ProfileRegistry;
    use crate::metadata::ScopeLabels;
    use crate::scanner::scan;
    use crate::source::LineIndex;
    use crate::splitter::SplitLimits;
    use pretty_assertions::assert_eq;

    struct Assembled {
        drafts: Vec<ChunkDraft>,
        labels: ScopeLabels,
    }

    fn assemble(text: &str, budget: usize) -> Assembled {
        let profile = ProfileRegistry::builtin().lookup("cpp").unwrap();
        let scanned = scan(text, profile);
        let (tree, _) = extract(text, &scanned, profile, &LineIndex::new(text));
        let sizes = SizeIndex::new(text, SizeUnit::Characters);
        let splitter = FallbackSplitter::new(
            text,
            &scanned,
            &sizes,
            SplitLimits {
                max_size: budget,
                overlap_lines: 1,
            },
        );
        let drafts = ChunkAssembler::new(text, &tree, &scanned, &sizes, &splitter, budget)
            .assemble()
            .0;
        let labels = ScopeLabels::new(text, &tree, "::");
        Assembled { drafts, labels }
    }

    impl Assembled {
        fn primary_text(&self, text: &str) -> String {
            self.drafts
                .iter()
                .map(|d| &text[d.primary_start..d.range.end])
                .collect()
        }

        fn path(&self, draft: &ChunkDraft) -> Option<String> {
            self.labels.symbol_path(draft.scope).map(str::to_string)
        }

        fn paths(&self) -> Vec<Option<String>> {
            self.drafts.iter().map(|d| self.path(d)).collect()
        }
    }

    const SOURCE: &str = r#"#include <cstdio>

namespace geo {

// Area of a rectangle.
int area(int w, int h) {
    return w * h;
}

struct Point {
    int x;
    int y;
};

int perimeter(int w, int h) {
    return 2 * (w + h);
}

}  // namespace geo
"#;

    #[test]
    fn small_file_is_one_chunk() {
        let out = assemble(SOURCE, 10_000);
        assert_eq!(out.drafts.len(), 1);
        assert_eq!(out.drafts[0].kind, ChunkKind::Region(RegionKind::File));
        assert_eq!(out.drafts[0].range, 0..SOURCE.len());
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(assemble("", 100).drafts.is_empty());
    }

    #[test]
    fn oversized_namespace_breaks_into_members() {
        let out = assemble(SOURCE, 80);
        assert_eq!(out.primary_text(SOURCE), SOURCE);

        let kinds: Vec<&str> = out.drafts.iter().map(|d| d.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["glue", "glue", "function", "class", "function", "glue"]
        );
        assert_eq!(
            out.paths(),
            vec![
                None,
                Some("geo".to_string()),
                Some("geo::area".to_string()),
                Some("geo::Point".to_string()),
                Some("geo::perimeter".to_string()),
                Some("geo".to_string()),
            ]
        );

        let area = &out.drafts[2];
        let area_text = &SOURCE[area.range.clone()];
        assert!(area_text.trim_start().starts_with("// Area of a rectangle.\n"));
        assert!(area_text.ends_with("}\n"));

        let point = &SOURCE[out.drafts[3].range.clone()];
        assert!(point.ends_with("};\n"));
        assert_eq!(&SOURCE[out.drafts[5].range.clone()], "\n}  // namespace geo\n");
    }

    #[test]
    fn oversized_leaf_is_split_with_its_path() {
        let body: String = (0..60).map(|i| format!("    total += values[{i}];\n")).collect();
        let text = format!(
            "namespace n {{\nint sum(const int* values) {{\n    int total = 0;\n{body}    return total;\n}}\n}}\n"
        );
        let out = assemble(&text, 200);
        assert_eq!(out.primary_text(&text), text);

        let fragments: Vec<&ChunkDraft> = out
            .drafts
            .iter()
            .filter(|d| d.kind == ChunkKind::Fragment)
            .collect();
        assert!(fragments.len() > 5);
        for fragment in &fragments {
            assert_eq!(out.path(fragment).as_deref(), Some("n::sum"));
            assert!(fragment.range.len() <= 200);
        }
        // only fragments overlap, and only their own predecessor
        for pair in out.drafts.windows(2) {
            assert!(pair[1].primary_start == pair[0].range.end);
            assert!(pair[1].range.start >= pair[0].primary_start);
        }
    }

    #[test]
    fn anonymous_blocks_pack_with_glue() {
        let text = "void run() {\n    int a = 0;\n    if (a) {\n        a++;\n    }\n    while (a < 3) {\n        a++;\n    }\n    finish(a);\n}\n";
        let out = assemble(text, 70);
        assert_eq!(out.primary_text(text), text);
        assert!(out.drafts.len() > 1);
        for draft in &out.drafts {
            assert!(draft.range.len() <= 70);
            assert!(draft.kind != ChunkKind::Fragment);
            assert_eq!(out.path(draft).as_deref(), Some("run"));
        }
    }

    #[test]
    fn deep_nesting_uses_no_recursion() {
        let depth = 5_000;
        let text = format!("{}{}", "{ x;\n".repeat(depth), "}\n".repeat(depth));
        let out = assemble(&text, 64);
        assert_eq!(out.primary_text(&text), text);
    }
}
