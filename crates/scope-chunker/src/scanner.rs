//! Single-pass lexical classifier.
//!
//! The scanner splits a file into code, comment and literal spans. It does
//! not tokenize code: the only code bytes it singles out are `{` and `}`,
//! which become one-byte events carrying a brace delta. Brace, paren and
//! bracket depth only move in code, so a `{` inside `"a { b"` or a comment
//! never reaches the boundary extractor.
//!
//! Malformed input never fails: a literal or comment still open at end of
//! file is closed there and flagged `unterminated`.

use crate::error::Degradation;
use crate::language::{LanguageProfile, QuoteRule};

/// Longest char literal body accepted by the char heuristic (`'\u{10FFFF}'`)
const MAX_CHAR_LITERAL: usize = 12;

/// Classification of a scanned span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    Code,
    LineComment,
    BlockComment,
    StringLiteral,
    CharLiteral,
}

impl ScanKind {
    /// Comments and literals: bytes that never affect structure
    #[must_use]
    pub const fn is_opaque(self) -> bool {
        !matches!(self, Self::Code)
    }

    #[must_use]
    pub const fn is_comment(self) -> bool {
        matches!(self, Self::LineComment | Self::BlockComment)
    }
}

/// One classified span of the input, in file order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanEvent {
    pub kind: ScanKind,
    pub start: usize,
    pub end: usize,
    /// `+1` for a `{` event, `-1` for a `}` event, `0` otherwise
    pub brace_delta: i8,
    /// Code nesting at `start`
    pub nesting: Nesting,
    /// Literal or comment closed by end of file instead of its delimiter
    pub unterminated: bool,
}

impl ScanEvent {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    #[must_use]
    pub const fn is_open_brace(&self) -> bool {
        self.brace_delta > 0
    }

    #[must_use]
    pub const fn is_close_brace(&self) -> bool {
        self.brace_delta < 0
    }
}

/// Brace, paren and bracket depth, counted in code only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Nesting {
    pub brace: u32,
    pub paren: u32,
    pub bracket: u32,
}

/// Events covering the whole input plus recovered problems
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub events: Vec<ScanEvent>,
    pub degradations: Vec<Degradation>,
}

impl ScanOutput {
    /// Start of a literal or comment left open at end of file
    #[must_use]
    pub fn unterminated_at(&self) -> Option<usize> {
        self.events
            .iter()
            .find(|event| event.unterminated)
            .map(|event| event.start)
    }

    /// Event covering byte `pos`
    #[must_use]
    pub fn event_at(&self, pos: usize) -> Option<&ScanEvent> {
        let idx = self.events.partition_point(|event| event.end <= pos);
        self.events.get(idx).filter(|event| event.start <= pos)
    }

    /// Whether `pos` lies strictly inside a closed string or char literal.
    ///
    /// Splitting there would cut a token in half. Literals left open at end
    /// of file do not count; they are degraded input already.
    #[must_use]
    pub fn inside_literal(&self, pos: usize) -> bool {
        self.event_at(pos).is_some_and(|event| {
            matches!(event.kind, ScanKind::StringLiteral | ScanKind::CharLiteral)
                && !event.unterminated
                && event.start < pos
        })
    }

    /// Whether `range` holds only whitespace, comments and `separators`
    #[must_use]
    pub fn is_trivia(&self, text: &str, range: std::ops::Range<usize>, separators: &[u8]) -> bool {
        let bytes = text.as_bytes();
        let mut pos = range.start;
        while pos < range.end {
            let Some(event) = self.event_at(pos) else {
                return false;
            };
            let end = event.end.min(range.end);
            match event.kind {
                ScanKind::LineComment | ScanKind::BlockComment => {}
                ScanKind::Code => {
                    let clean = bytes[pos..end]
                        .iter()
                        .all(|b| b.is_ascii_whitespace() || separators.contains(b));
                    if !clean {
                        return false;
                    }
                }
                ScanKind::StringLiteral | ScanKind::CharLiteral => return false,
            }
            pos = end;
        }
        true
    }
}

/// Scan `text` with the comment and literal rules of `profile`
#[must_use]
pub fn scan(text: &str, profile: &LanguageProfile) -> ScanOutput {
    Scanner::new(text, profile).run()
}

#[derive(Clone, Copy)]
enum Opener {
    Block(usize),
    Line,
    Str(usize),
    Char(usize),
}

struct Scanner<'a> {
    src: &'a [u8],
    profile: &'a LanguageProfile,
    /// Every opening delimiter, longest first
    openers: Vec<(&'a [u8], Opener)>,
    first_bytes: [bool; 256],
    pos: usize,
    code_start: usize,
    code_nesting: Nesting,
    nesting: Nesting,
    out: ScanOutput,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str, profile: &'a LanguageProfile) -> Self {
        let mut openers: Vec<(&'a [u8], Opener)> = Vec::new();
        for (idx, block) in profile.block_comments.iter().enumerate() {
            openers.push((block.open.as_bytes(), Opener::Block(idx)));
        }
        for marker in &profile.line_comments {
            openers.push((marker.as_bytes(), Opener::Line));
        }
        for (idx, rule) in profile.strings.iter().enumerate() {
            openers.push((rule.delimiter.as_bytes(), Opener::Str(idx)));
        }
        for (idx, rule) in profile.chars.iter().enumerate() {
            openers.push((rule.delimiter.as_bytes(), Opener::Char(idx)));
        }
        openers.retain(|(delim, _)| !delim.is_empty());
        // Stable: equal lengths keep comment > string > char priority.
        openers.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut first_bytes = [false; 256];
        for (delim, _) in &openers {
            first_bytes[usize::from(delim[0])] = true;
        }

        Self {
            src: text.as_bytes(),
            profile,
            openers,
            first_bytes,
            pos: 0,
            code_start: 0,
            code_nesting: Nesting::default(),
            nesting: Nesting::default(),
            out: ScanOutput::default(),
        }
    }

    fn run(mut self) -> ScanOutput {
        while self.pos < self.src.len() {
            let byte = self.src[self.pos];
            if self.first_bytes[usize::from(byte)] && self.try_open() {
                continue;
            }

            match byte {
                b'{' | b'}' => self.brace(byte == b'{'),
                b'(' => {
                    self.nesting.paren += 1;
                    self.pos += 1;
                }
                b')' => {
                    self.nesting.paren = self.nesting.paren.saturating_sub(1);
                    self.pos += 1;
                }
                b'[' => {
                    self.nesting.bracket += 1;
                    self.pos += 1;
                }
                b']' => {
                    self.nesting.bracket = self.nesting.bracket.saturating_sub(1);
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        self.flush_code();
        self.out
    }

    /// Enter a comment or literal starting at `pos`, if one starts here
    fn try_open(&mut self) -> bool {
        let rest = &self.src[self.pos..];
        let Some(opener) = self
            .openers
            .iter()
            .find(|(delim, _)| rest.starts_with(delim))
            .map(|(_, opener)| *opener)
        else {
            return false;
        };

        match opener {
            Opener::Block(idx) => {
                self.flush_code();
                self.block_comment(idx);
            }
            Opener::Line => {
                self.flush_code();
                self.line_comment();
            }
            Opener::Str(idx) => {
                self.flush_code();
                let profile = self.profile;
                self.literal(&profile.strings[idx], ScanKind::StringLiteral);
            }
            Opener::Char(idx) => {
                let profile = self.profile;
                let rule = &profile.chars[idx];
                if !self.looks_like_char_literal(rule) {
                    return false;
                }
                self.flush_code();
                self.literal(rule, ScanKind::CharLiteral);
            }
        }
        self.code_start = self.pos;
        self.code_nesting = self.nesting;
        true
    }

    fn brace(&mut self, open: bool) {
        self.flush_code();
        self.push(ScanKind::Code, self.pos, self.pos + 1, if open { 1 } else { -1 }, false);
        if open {
            self.nesting.brace += 1;
        } else {
            self.nesting.brace = self.nesting.brace.saturating_sub(1);
        }
        self.pos += 1;
        self.code_start = self.pos;
        self.code_nesting = self.nesting;
    }

    fn flush_code(&mut self) {
        if self.code_start < self.pos {
            self.out.events.push(ScanEvent {
                kind: ScanKind::Code,
                start: self.code_start,
                end: self.pos,
                brace_delta: 0,
                nesting: self.code_nesting,
                unterminated: false,
            });
        }
        self.code_start = self.pos;
    }

    fn push(
        &mut self,
        kind: ScanKind,
        start: usize,
        end: usize,
        brace_delta: i8,
        unterminated: bool,
    ) {
        self.out.events.push(ScanEvent {
            kind,
            start,
            end,
            brace_delta,
            nesting: self.nesting,
            unterminated,
        });
    }

    fn line_comment(&mut self) {
        let start = self.pos;
        let end = self.src[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.src.len(), |off| start + off);
        self.pos = end;
        self.push(ScanKind::LineComment, start, end, 0, false);
    }

    fn block_comment(&mut self, idx: usize) {
        let profile = self.profile;
        let block = &profile.block_comments[idx];
        let (open, close) = (block.open.as_bytes(), block.close.as_bytes());
        let start = self.pos;
        self.pos += open.len();
        let mut depth = 1usize;

        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            if rest.starts_with(close) {
                self.pos += close.len();
                depth -= 1;
                if depth == 0 {
                    self.push(ScanKind::BlockComment, start, self.pos, 0, false);
                    return;
                }
            } else if block.nests && rest.starts_with(open) {
                self.pos += open.len();
                depth += 1;
            } else {
                self.pos += 1;
            }
        }

        self.out
            .degradations
            .push(Degradation::UnterminatedComment { offset: start });
        self.push(ScanKind::BlockComment, start, self.src.len(), 0, true);
    }

    fn literal(&mut self, rule: &QuoteRule, kind: ScanKind) {
        let delim = rule.delimiter.as_bytes();
        let mut escape_buf = [0u8; 4];
        let escape: Option<&[u8]> = match rule.escape {
            Some(c) => Some(c.encode_utf8(&mut escape_buf).as_bytes()),
            None => None,
        };
        let start = self.pos;
        self.pos += delim.len();

        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            if let Some(esc) = escape {
                if rest.starts_with(esc) {
                    self.pos += esc.len();
                    if self.pos < self.src.len() {
                        self.pos += utf8_len(self.src[self.pos]).min(self.src.len() - self.pos);
                    }
                    continue;
                }
            }
            if rest.starts_with(delim) {
                self.pos += delim.len();
                self.push(kind, start, self.pos, 0, false);
                return;
            }
            if rest[0] == b'\n' && !rule.multiline {
                // Recover at end of line; the newline stays code.
                self.out
                    .degradations
                    .push(Degradation::UnterminatedLiteral { offset: start });
                self.push(kind, start, self.pos, 0, false);
                return;
            }
            self.pos += 1;
        }

        self.out
            .degradations
            .push(Degradation::UnterminatedLiteral { offset: start });
        self.push(kind, start, self.src.len(), 0, true);
    }

    /// `'x'`, `'\n'`, `'\u{1F600}'`: a char quote only opens a literal when
    /// a short body and the closing quote follow on the same line.
    fn looks_like_char_literal(&self, rule: &QuoteRule) -> bool {
        let delim = rule.delimiter.as_bytes();
        let body_start = self.pos + delim.len();
        let Some(&first) = self.src.get(body_start) else {
            return false;
        };
        if first == b'\n' || self.src[body_start..].starts_with(delim) {
            return false;
        }

        let escaped = rule
            .escape
            .is_some_and(|esc| u32::from(first) == u32::from(esc) && esc.is_ascii());
        if !escaped {
            let after = body_start + utf8_len(first);
            return self.src.get(after..).is_some_and(|rest| rest.starts_with(delim));
        }

        let limit = (body_start + MAX_CHAR_LITERAL).min(self.src.len());
        let mut pos = body_start + 2;
        while pos < limit {
            if self.src[pos] == b'\n' {
                return false;
            }
            if self.src[pos..].starts_with(delim) {
                return true;
            }
            pos += 1;
        }
        false
    }
}

/// Byte length of the UTF-8 sequence introduced by `lead`
const fn utf8_len(lead: u8) -> usize {
    match lead {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ProfileRegistry;
    use pretty_assertions::assert_eq;

    fn profile(key: &str) -> &'static LanguageProfile {
        ProfileRegistry::builtin().lookup(key).unwrap()
    }

    fn kinds<'a>(text: &'a str, key: &str) -> Vec<(ScanKind, &'a str)> {
        scan(text, profile(key))
            .events
            .iter()
            .map(|e| (e.kind, &text[e.start..e.end]))
            .collect()
    }

    fn assert_covers(text: &str, out: &ScanOutput) {
        let mut pos = 0;
        for event in &out.events {
            assert_eq!(event.start, pos, "gap or overlap at {pos}");
            assert!(event.end > event.start);
            pos = event.end;
        }
        assert_eq!(pos, text.len());
    }

    #[test]
    fn braces_are_single_events() {
        let text = "int f() { return 1; }";
        let out = scan(text, profile("cpp"));
        assert_covers(text, &out);

        let deltas: Vec<i8> = out
            .events
            .iter()
            .filter(|e| e.brace_delta != 0)
            .map(|e| e.brace_delta)
            .collect();
        assert_eq!(deltas, vec![1, -1]);
    }

    #[test]
    fn braces_in_literals_and_comments_are_ignored() {
        let text = "s = \"{ not code }\"; // }\n/* { */ c = '{';\n";
        let out = scan(text, profile("cpp"));
        assert_covers(text, &out);
        assert!(out.events.iter().all(|e| e.brace_delta == 0));
        assert_eq!(
            kinds(text, "cpp"),
            vec![
                (ScanKind::Code, "s = "),
                (ScanKind::StringLiteral, "\"{ not code }\""),
                (ScanKind::Code, "; "),
                (ScanKind::LineComment, "// }"),
                (ScanKind::Code, "\n"),
                (ScanKind::BlockComment, "/* { */"),
                (ScanKind::Code, " c = "),
                (ScanKind::CharLiteral, "'{'"),
                (ScanKind::Code, ";\n"),
            ]
        );
    }

    #[test]
    fn escapes_are_consumed_in_pairs() {
        let text = r#"x = "a\"{b"; y = '\''; z"#;
        let out = scan(text, profile("cpp"));
        assert_covers(text, &out);
        let literals: Vec<&str> = out
            .events
            .iter()
            .filter(|e| e.kind.is_opaque())
            .map(|e| &text[e.start..e.end])
            .collect();
        assert_eq!(literals, vec![r#""a\"{b""#, r"'\''"]);
        assert!(out.degradations.is_empty());
    }

    #[test]
    fn rust_lifetimes_are_code() {
        let text = "impl<'a> Foo<'a> { fn f(c: char) -> bool { c == '}' } }";
        let out = scan(text, profile("rust"));
        assert_covers(text, &out);
        let opens = out.events.iter().filter(|e| e.is_open_brace()).count();
        let closes = out.events.iter().filter(|e| e.is_close_brace()).count();
        assert_eq!((opens, closes), (2, 2));
        assert_eq!(
            out.events
                .iter()
                .filter(|e| e.kind == ScanKind::CharLiteral)
                .count(),
            1
        );
    }

    #[test]
    fn nested_block_comments() {
        let text = "/* a /* b */ { */ fn x() {}";
        let out = scan(text, profile("rust"));
        assert_eq!(out.events[0].kind, ScanKind::BlockComment);
        assert_eq!(out.events[0].end, 17);

        // C comments do not nest: the first */ closes
        let out = scan(text, profile("cpp"));
        assert_eq!(out.events[0].end, 12);
    }

    #[test]
    fn triple_quotes_win_over_single() {
        let text = "x = \"\"\"a\n{\"\"\" + \"b\"\n";
        let out = scan(text, profile("python"));
        assert_covers(text, &out);
        assert_eq!(
            kinds(text, "python")[1],
            (ScanKind::StringLiteral, "\"\"\"a\n{\"\"\"")
        );
    }

    #[test]
    fn single_line_string_recovers_at_newline() {
        let text = "a = \"oops\nint f() { }\n";
        let out = scan(text, profile("cpp"));
        assert_covers(text, &out);
        assert_eq!(
            out.degradations,
            vec![Degradation::UnterminatedLiteral { offset: 4 }]
        );
        assert!(out.unterminated_at().is_none());
        assert_eq!(out.events.iter().filter(|e| e.is_open_brace()).count(), 1);
    }

    #[test]
    fn unterminated_at_eof_is_closed() {
        let text = "fn a() {}\nlet s = \"never { closed";
        let out = scan(text, profile("rust"));
        assert_covers(text, &out);
        let last = out.events.last().unwrap();
        assert_eq!(last.kind, ScanKind::StringLiteral);
        assert!(last.unterminated);
        assert_eq!(out.unterminated_at(), Some(18));

        let text = "int x; /* open";
        let out = scan(text, profile("cpp"));
        assert_covers(text, &out);
        assert_eq!(
            out.degradations,
            vec![Degradation::UnterminatedComment { offset: 7 }]
        );
    }

    #[test]
    fn paren_depth_is_recorded() {
        let text = "f(a, [](int x) { return x; });";
        let out = scan(text, profile("cpp"));
        let open = out.events.iter().find(|e| e.is_open_brace()).unwrap();
        assert_eq!(open.nesting.paren, 1);
        assert_eq!(open.nesting.brace, 0);
    }

    #[test]
    fn literal_and_trivia_queries() {
        let text = "s = \"a\nb\"; // note\n  /* x */\n}";
        let out = scan(text, profile("rust"));
        let newline_in_literal = text.find("a\n").unwrap() + 2;
        assert!(out.inside_literal(newline_in_literal));
        assert!(!out.inside_literal(text.find("s =").unwrap()));
        assert!(!out.inside_literal(text.find('"').unwrap()));

        let note = text.find(';').unwrap();
        let brace = text.find('}').unwrap();
        assert!(out.is_trivia(text, note + 1..brace, b""));
        assert!(!out.is_trivia(text, note..brace, b""));
        assert!(out.is_trivia(text, note..brace, b";"));
        assert!(!out.is_trivia(text, 0..brace, b";"));
        assert!(out.is_trivia(text, 3..3, b""));
    }

    #[test]
    fn multibyte_text_keeps_char_boundaries() {
        let text = "// héllo {\ns = \"ünïcode }\"; c = 'é';\n";
        let out = scan(text, profile("cpp"));
        assert_covers(text, &out);
        for event in &out.events {
            assert!(text.is_char_boundary(event.start));
            assert!(text.is_char_boundary(event.end));
        }
        assert!(out.events.iter().all(|e| e.brace_delta == 0));
    }
}
