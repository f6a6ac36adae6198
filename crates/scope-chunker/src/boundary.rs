//! Boundary extraction: scan events to a tree of brace-delimited regions.
//!
//! Only `{` and `}` in code establish nesting. Every brace pair becomes a
//! region; [`header::classify`] decides its kind and name from the code
//! between the statement start and the opening brace. Regions live in an
//! arena indexed by [`RegionId`] and are built with an explicit stack, so
//! pathological nesting costs heap, not call stack.

use crate::error::Degradation;
use crate::header;
use crate::language::LanguageProfile;
use crate::scanner::{ScanKind, ScanOutput};
use crate::source::LineIndex;
use crate::types::RegionKind;
use std::ops::Range;

/// Index of a region in its [`SyntaxTree`]
pub type RegionId = usize;

/// One brace-delimited scope (or the whole file)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxRegion {
    pub kind: RegionKind,
    /// Declared name, `None` for blocks and anonymous scopes
    pub name: Option<String>,
    /// Declaration text before the opening brace
    pub header: Range<usize>,
    /// From the first token of the declaring statement to one past `}`
    pub span: Range<usize>,
    /// Between the braces
    pub body: Range<usize>,
    /// 1-based inclusive line range of `span`
    pub lines: (usize, usize),
    pub parent: Option<RegionId>,
    /// In source order
    pub children: Vec<RegionId>,
}

impl SyntaxRegion {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena of regions rooted at a single `File` region
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    regions: Vec<SyntaxRegion>,
}

impl SyntaxTree {
    pub const ROOT: RegionId = 0;

    #[must_use]
    pub fn root(&self) -> &SyntaxRegion {
        &self.regions[Self::ROOT]
    }

    /// Region by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this tree.
    #[must_use]
    pub fn region(&self, id: RegionId) -> &SyntaxRegion {
        &self.regions[id]
    }

    /// Number of regions, root included
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &SyntaxRegion)> {
        self.regions.iter().enumerate()
    }
}

/// Build the region tree of `text` from its scan
#[must_use]
pub fn extract(
    text: &str,
    scan: &ScanOutput,
    profile: &LanguageProfile,
    index: &LineIndex,
) -> (SyntaxTree, Vec<Degradation>) {
    let mut extractor = Extractor::new(text, scan, profile, index);
    if profile.is_structural() {
        extractor.run();
    }
    extractor.finish()
}

/// Region whose closing brace has not been seen yet
struct OpenRegion {
    kind: RegionKind,
    name: Option<String>,
    header: Range<usize>,
    start: usize,
    brace: usize,
    children: Vec<RegionId>,
    /// Arena length when the region opened
    mark: usize,
    /// Paren and bracket depth at the opening brace
    nesting: (u32, u32),
    /// Statement start the header candidate was taken from
    stmt: usize,
    /// Member initializer brace, folded into the next header on close
    initializer: bool,
}

struct Extractor<'a> {
    text: &'a str,
    scan: &'a ScanOutput,
    profile: &'a LanguageProfile,
    index: &'a LineIndex,
    /// `text` with comments blanked and literal bodies replaced by spaces
    sanitized: Vec<u8>,
    /// Line starts after labels and directives, ascending
    line_resets: Vec<usize>,
    arena: Vec<SyntaxRegion>,
    stack: Vec<OpenRegion>,
    root_children: Vec<RegionId>,
    stmt_start: usize,
    /// Where an unterminated literal cut extraction short
    cut: Option<usize>,
    degradations: Vec<Degradation>,
}

impl<'a> Extractor<'a> {
    fn new(
        text: &'a str,
        scan: &'a ScanOutput,
        profile: &'a LanguageProfile,
        index: &'a LineIndex,
    ) -> Self {
        let root = SyntaxRegion {
            kind: RegionKind::File,
            name: None,
            header: 0..0,
            span: 0..text.len(),
            body: 0..text.len(),
            lines: (1, index.line_count().max(1)),
            parent: None,
            children: Vec::new(),
        };
        Self {
            text,
            scan,
            profile,
            index,
            sanitized: Vec::new(),
            line_resets: Vec::new(),
            arena: vec![root],
            stack: Vec::new(),
            root_children: Vec::new(),
            stmt_start: 0,
            cut: None,
            degradations: Vec::new(),
        }
    }

    fn run(&mut self) {
        self.sanitized = sanitize(self.text, self.scan);
        self.line_resets = line_resets(&self.sanitized, self.profile);

        let scan = self.scan;
        let mut resets = 0;
        for event in &scan.events {
            if event.unterminated && !event.kind.is_comment() {
                self.cut = Some(event.start);
                break;
            }
            if event.kind != ScanKind::Code {
                continue;
            }

            if event.is_open_brace() {
                while resets < self.line_resets.len() && self.line_resets[resets] <= event.start {
                    self.stmt_start = self.stmt_start.max(self.line_resets[resets]);
                    resets += 1;
                }
                let (paren, bracket) = self.base_nesting();
                let nested = event.nesting.paren > paren || event.nesting.bracket > bracket;
                self.open(event.start, nested, (event.nesting.paren, event.nesting.bracket));
            } else if event.is_close_brace() {
                self.close(event.start);
            } else {
                let nesting = (event.nesting.paren, event.nesting.bracket);
                self.statement_ends(event.start, event.end, nesting);
            }
        }
    }

    /// Paren and bracket depth of the innermost open region's body
    fn base_nesting(&self) -> (u32, u32) {
        self.stack.last().map_or((0, 0), |open| open.nesting)
    }

    /// Move the statement start past every `;` at body level in a code span
    fn statement_ends(&mut self, start: usize, end: usize, nesting: (u32, u32)) {
        let base = self.base_nesting();
        let (mut paren, mut bracket) = nesting;
        for (offset, byte) in self.text.as_bytes()[start..end].iter().enumerate() {
            match byte {
                b'(' => paren += 1,
                b')' => paren = paren.saturating_sub(1),
                b'[' => bracket += 1,
                b']' => bracket = bracket.saturating_sub(1),
                b';' if (paren, bracket) == base => self.stmt_start = start + offset + 1,
                _ => {}
            }
        }
    }

    fn open(&mut self, brace: usize, nested: bool, nesting: (u32, u32)) {
        let stmt = self.stmt_start.min(brace);
        let candidate = String::from_utf8_lossy(&self.sanitized[stmt..brace]);
        let mut class = header::classify(&candidate, self.profile);
        if nested {
            class.kind = RegionKind::Block;
            class.name = None;
            class.initializer = false;
        }

        let start = first_code(&self.sanitized, stmt, brace);
        log::trace!(
            "open {} {:?} at {brace}",
            class.kind.as_str(),
            class.name.as_deref().unwrap_or("")
        );
        self.stack.push(OpenRegion {
            kind: class.kind,
            name: class.name,
            header: stmt + class.range.start..stmt + class.range.end,
            start,
            brace,
            children: Vec::new(),
            mark: self.arena.len(),
            nesting,
            stmt,
            initializer: class.initializer,
        });
        self.stmt_start = brace + 1;
    }

    fn close(&mut self, brace: usize) {
        self.stmt_start = brace + 1;
        let Some(open) = self.stack.pop() else {
            log::debug!("Ignoring unmatched '}}' at byte {brace}");
            self.degradations
                .push(Degradation::UnbalancedBraces { offset: brace });
            return;
        };
        if open.initializer {
            // `Counter(int n) : value_{n} {`: the body's header starts at `Counter`.
            self.arena.truncate(open.mark);
            self.stmt_start = open.stmt;
            return;
        }

        let id = self.arena.len();
        for &child in &open.children {
            self.arena[child].parent = Some(id);
        }
        let span = open.start..brace + 1;
        self.arena.push(SyntaxRegion {
            kind: open.kind,
            name: open.name,
            header: open.header,
            lines: self.index.line_range(span.start, span.end),
            span,
            body: open.brace + 1..brace,
            parent: None,
            children: open.children,
        });
        self.attach(id);
    }

    fn attach(&mut self, id: RegionId) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(id),
            None => self.root_children.push(id),
        }
    }

    /// Turn whatever is still open into one opaque `Unknown` leaf
    fn degrade_open_regions(&mut self) {
        let end = self.text.len();
        if self.stack.is_empty() {
            if let Some(cut) = self.cut {
                let start = first_code(&self.sanitized, self.stmt_start.min(cut), end);
                log::debug!("Unterminated literal at byte {cut}, remainder left unparsed");
                self.push_unknown(start, start..start, start..end);
            }
            return;
        }

        let outermost = self.stack.swap_remove(0);
        self.stack.clear();
        log::debug!(
            "Unclosed '{{' at byte {}, region degraded to unknown",
            outermost.brace
        );
        self.degradations.push(Degradation::UnbalancedBraces {
            offset: outermost.brace,
        });
        // Regions closed inside it are dropped with it.
        self.arena.truncate(outermost.mark);
        self.push_unknown(
            outermost.start,
            outermost.header,
            (outermost.brace + 1).min(end)..end,
        );
    }

    fn push_unknown(&mut self, start: usize, header: Range<usize>, body: Range<usize>) {
        let end = self.text.len();
        if start >= end {
            return;
        }
        let id = self.arena.len();
        self.arena.push(SyntaxRegion {
            kind: RegionKind::Unknown,
            name: None,
            header,
            span: start..end,
            body,
            lines: self.index.line_range(start, end),
            parent: None,
            children: Vec::new(),
        });
        self.root_children.push(id);
    }

    fn finish(mut self) -> (SyntaxTree, Vec<Degradation>) {
        self.degrade_open_regions();
        for &child in &self.root_children {
            self.arena[child].parent = Some(SyntaxTree::ROOT);
        }
        self.arena[SyntaxTree::ROOT].children = self.root_children;
        (
            SyntaxTree {
                regions: self.arena,
            },
            self.degradations,
        )
    }
}

/// Copy of `text` where only code survives; newlines are kept everywhere.
///
/// Literal delimiters stay in place so a header still sees that a literal
/// was there (`extern "C"`).
fn sanitize(text: &str, scan: &ScanOutput) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    for event in scan.events.iter().filter(|e| e.kind.is_opaque()) {
        let (mut from, mut to) = (event.start, event.end);
        if !event.kind.is_comment() {
            if bytes[from].is_ascii() {
                from += 1;
            }
            if !event.unterminated && to > from && bytes[to - 1].is_ascii() {
                to -= 1;
            }
        }
        for byte in &mut bytes[from..to] {
            if *byte != b'\n' {
                *byte = b' ';
            }
        }
    }
    bytes
}

/// First non-whitespace byte in `from..to`, or `to`
fn first_code(sanitized: &[u8], from: usize, to: usize) -> usize {
    sanitized[from..to]
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(to, |offset| from + offset)
}

/// Line starts following access labels (`public:`, `case X:`) and
/// directive lines (`#include`), where a new statement begins.
fn line_resets(sanitized: &[u8], profile: &LanguageProfile) -> Vec<usize> {
    let directive = profile.directive_prefix.as_deref().map(str::as_bytes);
    let mut resets = Vec::new();
    let mut continued = false;
    let mut line_start = 0;

    for line in sanitized.split_inclusive(|&b| b == b'\n') {
        let next = line_start + line.len();
        let trimmed = trim_bytes(line);

        let is_directive = continued || directive.is_some_and(|prefix| trimmed.starts_with(prefix));
        continued = is_directive && trimmed.ends_with(b"\\");

        if is_directive || is_label(trimmed, profile) {
            resets.push(next);
        }
        line_start = next;
    }
    resets
}

fn trim_bytes(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|b| !b.is_ascii_whitespace());
    let end = line.iter().rposition(|b| !b.is_ascii_whitespace());
    match (start, end) {
        (Some(start), Some(end)) => &line[start..=end],
        _ => &[],
    }
}

fn is_label(line: &[u8], profile: &LanguageProfile) -> bool {
    let Some(body) = line.strip_suffix(b":") else {
        return false;
    };
    if body.is_empty() || body.ends_with(b":") || body.contains(&b'(') || body.contains(&b'?') {
        return false;
    }
    // `class Foo :` continues onto the next line.
    let words = String::from_utf8_lossy(body);
    !words
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .any(|word| profile.scope_kind(word).is_some())
}
