//! Heuristic classification of the code preceding an opening brace.
//!
//! The input is a *sanitized* header candidate: comments are blanked and
//! literal bodies replaced by spaces, so only code tokens remain and byte
//! offsets still match the original text. Nothing here is a grammar; the
//! rules pick a kind and a name that are right for common declarations and
//! harmless (`Block`) for everything else.
//!
//! Angle brackets only count as nesting when `<` follows an identifier
//! (`Foo<T>`, `template <`); `>>` closes two levels, `->`, `<=` and `>=` are
//! ignored, and depth never goes below zero. Operator-heavy headers that
//! defeat this end up as `Block` or as a function named after the operator.

use crate::language::LanguageProfile;
use crate::types::RegionKind;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        concat!(
            r"[\p{L}_$][\p{L}\p{N}_$]*|\p{N}[\p{L}\p{N}_.]*",
            r"|<=>|::|->|=>|<<|>>|<=|>=|==|!=|&&|\|\||\.\.\.|\S",
        ),
    )
    .expect("Invalid regex")
});

/// Kind, name and header bounds of a brace-opened region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderClass {
    pub kind: RegionKind,
    /// Declared name, `None` for blocks and anonymous scopes
    pub name: Option<String>,
    /// Header bounds relative to the candidate, trimmed to code tokens
    pub range: Range<usize>,
    /// The brace is a constructor member initializer (`: value_{x}`) and
    /// belongs to the header of the body that follows
    pub initializer: bool,
}

impl HeaderClass {
    const fn block(range: Range<usize>) -> Self {
        Self {
            kind: RegionKind::Block,
            name: None,
            range,
            initializer: false,
        }
    }

    const fn scope(kind: RegionKind, name: Option<String>, range: Range<usize>) -> Self {
        Self {
            kind,
            name,
            range,
            initializer: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
    /// Paren + bracket + angle nesting the token sits at; openers and
    /// closers carry the outer level
    depth: u32,
}

impl Token<'_> {
    fn is_ident(&self) -> bool {
        self.text
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
    }
}

/// Classify the sanitized code between a statement start and a `{`
#[must_use]
pub fn classify(candidate: &str, profile: &LanguageProfile) -> HeaderClass {
    let (tokens, unbalanced) = tokenize(candidate);
    let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
        return HeaderClass::block(candidate.len()..candidate.len());
    };
    let statement = first.start..last.end;

    // Brace inside an open paren: lambda or closure argument.
    if unbalanced {
        return HeaderClass::block(statement);
    }

    let assignment = assignment_at(&tokens);

    if let Some(idx) = scope_keyword_at(&tokens, profile) {
        let keyword = tokens[idx];
        let range = keyword.start..last.end;
        // `x = class {..}` or `struct point p = {..}` initialize, `def f() = {` defines.
        let kind = profile.scope_kind(keyword.text).unwrap_or(RegionKind::Block);
        match assignment {
            Some(eq) if eq < idx => return HeaderClass::block(statement),
            Some(_) if kind != RegionKind::Function => return HeaderClass::block(statement),
            _ => {}
        }

        let (name, rest) = declared_name(&tokens[idx + 1..], profile);
        // `struct point make_point(int x)` returns a tagged type.
        if profile.detect_signatures && kind != RegionKind::Function {
            if let Some(function) = signature_name(rest, profile) {
                return HeaderClass::scope(RegionKind::Function, Some(function), statement);
            }
        }
        return HeaderClass::scope(kind, name, range);
    }

    if assignment.is_some() || profile.is_control_keyword(first.text) {
        return HeaderClass::block(statement);
    }

    if profile.detect_signatures {
        if is_member_initializer(&tokens, candidate) {
            return HeaderClass {
                initializer: true,
                ..HeaderClass::block(statement)
            };
        }
        if let Some(name) = signature_name(&tokens, profile) {
            return HeaderClass::scope(RegionKind::Function, Some(name), statement);
        }
    }

    HeaderClass::block(statement)
}

fn tokenize(candidate: &str) -> (Vec<Token<'_>>, bool) {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let (mut paren, mut bracket, mut angle) = (0u32, 0u32, 0u32);

    for m in TOKEN.find_iter(candidate) {
        let text = m.as_str();
        let depth = paren + bracket + angle;
        let prev = tokens.last().copied();
        let mut token = Token {
            text,
            start: m.start(),
            end: m.end(),
            depth,
        };
        match text {
            "(" => paren += 1,
            "[" => bracket += 1,
            ")" => paren = paren.saturating_sub(1),
            "]" => bracket = bracket.saturating_sub(1),
            "<" if prev.is_some_and(|p| p.is_ident() && p.text != "operator") => angle += 1,
            ">" => angle = angle.saturating_sub(1),
            ">>" => angle = angle.saturating_sub(2),
            _ => {}
        }
        if matches!(text, ")" | "]" | ">" | ">>") {
            token.depth = paren + bracket + angle;
        }
        tokens.push(token);
    }

    (tokens, paren > 0 || bracket > 0)
}

/// Index of a top-level `=` that is not part of an operator name
fn assignment_at(tokens: &[Token<'_>]) -> Option<usize> {
    tokens.iter().enumerate().position(|(idx, token)| {
        token.depth == 0
            && token.text == "="
            && !tokens[idx.saturating_sub(2)..idx]
                .iter()
                .any(|t| t.text == "operator")
    })
}

fn scope_keyword_at(tokens: &[Token<'_>], profile: &LanguageProfile) -> Option<usize> {
    tokens.iter().enumerate().position(|(idx, token)| {
        token.depth == 0
            && token.is_ident()
            && profile.scope_kind(token.text).is_some()
            && !(idx > 0 && matches!(tokens[idx - 1].text, "." | "::" | "->"))
            && tokens.get(idx + 1).map_or(true, |next| next.text != ":")
    })
}

/// Index just past the group opened at `open`, if `open` opened one
fn skip_group(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let depth = tokens[open].depth;
    if tokens.get(open + 1).map_or(true, |t| t.depth <= depth) {
        return None;
    }
    let mut idx = open + 1;
    while idx < tokens.len() && tokens[idx].depth > depth {
        idx += 1;
    }
    Some((idx + 1).min(tokens.len()))
}

/// Name following a scope keyword, and the tokens after it
fn declared_name<'t, 'a>(
    tokens: &'t [Token<'a>],
    profile: &LanguageProfile,
) -> (Option<String>, &'t [Token<'a>]) {
    let mut idx = 0;
    // Generic parameters, receivers, attributes and stacked keywords.
    while let Some(token) = tokens.get(idx) {
        if matches!(token.text, "<" | "(" | "[") {
            match skip_group(tokens, idx) {
                Some(next) => idx = next,
                None => break,
            }
        } else if token.is_ident()
            && (profile.scope_kind(token.text).is_some() || profile.is_name_modifier(token.text))
            && precedes_name(tokens.get(idx + 1))
        {
            idx += 1;
        } else {
            break;
        }
    }

    let mut name: Option<String> = None;
    while let Some(token) = tokens.get(idx) {
        if token.text == "for" && name.is_some() {
            // `impl Trait for Type` is named after the type.
            idx += 1;
            if tokens.get(idx).is_some_and(Token::is_ident) {
                let (path, next) = qualified_path(tokens, idx);
                name = Some(path);
                idx = next;
            }
            break;
        }
        let calls = tokens.get(idx + 1).is_some_and(|t| t.text == "(");
        let ends = name.is_some() && (calls || profile.is_name_stop(token.text));
        if token.is_ident() && !ends {
            // `class EXPORT_MACRO Widget`: the last word of a run wins.
            let (path, next) = qualified_path(tokens, idx);
            name = Some(path);
            idx = next;
        } else {
            break;
        }
    }

    (name, &tokens[idx.min(tokens.len())..])
}

/// Whether a keyword or modifier followed by `next` leaves room for a name
fn precedes_name(next: Option<&Token<'_>>) -> bool {
    next.is_some_and(|t| t.is_ident() || matches!(t.text, "(" | "["))
}

/// `a::b.c<T>::d` starting at `idx`, generic arguments dropped
fn qualified_path(tokens: &[Token<'_>], mut idx: usize) -> (String, usize) {
    let mut path = tokens[idx].text.to_string();
    idx += 1;
    loop {
        if tokens.get(idx).is_some_and(|t| t.text == "<") {
            match skip_group(tokens, idx) {
                Some(next) => idx = next,
                None => break,
            }
        }
        let Some(sep) = tokens.get(idx).filter(|t| matches!(t.text, "::" | "." | "\\")) else {
            break;
        };
        let tilde = tokens.get(idx + 1).is_some_and(|t| t.text == "~");
        let part = idx + 1 + usize::from(tilde);
        match tokens.get(part) {
            Some(next) if next.is_ident() => {
                path.push_str(sep.text);
                if tilde {
                    path.push('~');
                }
                path.push_str(next.text);
                idx = part + 1;
            }
            _ => break,
        }
    }
    (path, idx)
}

/// Name of the function whose parameter list is the first top-level `(`
fn signature_name(tokens: &[Token<'_>], profile: &LanguageProfile) -> Option<String> {
    let open = tokens.iter().enumerate().position(|(idx, token)| {
        token.depth == 0
            && token.text == "("
            // `@Annotation(..)` is not a parameter list.
            && !(idx >= 2 && tokens[idx - 2].text == "@")
    })?;
    if open == 0 {
        return None;
    }

    let before = tokens[open - 1];
    if before.text == "operator" {
        // `operator()(args)`
        return Some(qualify(tokens, open - 1, "operator()".to_string()));
    }

    if before.is_ident() {
        if profile.is_control_keyword(before.text) || profile.scope_kind(before.text).is_some() {
            return None;
        }
        if open >= 2 && tokens[open - 2].text == "operator" {
            return Some(qualify(tokens, open - 2, format!("operator {}", before.text)));
        }
        if open >= 2 && tokens[open - 2].text == "~" {
            return Some(qualify(tokens, open - 2, format!("~{}", before.text)));
        }
        return Some(qualify(tokens, open - 1, before.text.to_string()));
    }

    // `operator==(`, `operator+=(`, `operator[](`
    let lookback = open.saturating_sub(3);
    let keyword = (lookback..open - 1).rev().find(|&idx| tokens[idx].text == "operator")?;
    if tokens[keyword + 1..open].iter().any(Token::is_ident) {
        return None;
    }
    let symbol: String = tokens[keyword + 1..open].iter().map(|t| t.text).collect();
    Some(qualify(tokens, keyword, format!("operator{symbol}")))
}

/// Prefix `name` (starting at token `idx`) with `A::` / `A.` qualifiers
fn qualify(tokens: &[Token<'_>], mut idx: usize, name: String) -> String {
    let mut parts = vec![name];
    while idx >= 2 && matches!(tokens[idx - 1].text, "::" | ".") {
        let sep = tokens[idx - 1].text;
        let mut owner = idx - 2;
        // `Foo<T>::bar`
        if tokens[owner].text == ">" || tokens[owner].text == ">>" {
            let depth = tokens[owner].depth;
            while owner > 0 && tokens[owner - 1].depth > depth {
                owner -= 1;
            }
            if owner < 2 {
                break;
            }
            owner -= 2;
        }
        if !tokens[owner].is_ident() {
            break;
        }
        parts.push(sep.to_string());
        parts.push(tokens[owner].text.to_string());
        idx = owner;
    }
    parts.reverse();
    parts.concat()
}

/// `Foo(int x) : value{x}`: the brace belongs to a member initializer
fn is_member_initializer(tokens: &[Token<'_>], candidate: &str) -> bool {
    let n = tokens.len();
    n >= 2
        && tokens[n - 1].is_ident()
        && matches!(tokens[n - 2].text, ":" | ",")
        && candidate[tokens[n - 1].end..].is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ProfileRegistry;
    use pretty_assertions::assert_eq;

    fn classify_as(key: &str, header: &str) -> (RegionKind, Option<String>) {
        let profile = ProfileRegistry::builtin().lookup(key).unwrap();
        let class = classify(header, profile);
        (class.kind, class.name)
    }

    fn named(kind: RegionKind, name: &str) -> (RegionKind, Option<String>) {
        (kind, Some(name.to_string()))
    }

    const BLOCK: (RegionKind, Option<String>) = (RegionKind::Block, None);

    #[test]
    fn cpp_scopes() {
        use RegionKind::*;
        assert_eq!(classify_as("cpp", "namespace outer "), named(Namespace, "outer"));
        assert_eq!(classify_as("cpp", "namespace a::b "), named(Namespace, "a::b"));
        assert_eq!(classify_as("cpp", "namespace "), (Namespace, None));
        assert_eq!(
            classify_as("cpp", "class Derived : public Base, private Other "),
            named(Class, "Derived")
        );
        assert_eq!(classify_as("cpp", "enum class Color : int "), named(Class, "Color"));
        assert_eq!(classify_as("cpp", "class API_EXPORT Widget final "), named(Class, "Widget"));
        assert_eq!(classify_as("cpp", "struct alignas(16) Vec4 "), named(Class, "Vec4"));
    }

    #[test]
    fn modifier_words_can_be_names() {
        use RegionKind::*;
        for word in ["internal", "data", "value", "open", "default", "inner", "final"] {
            assert_eq!(
                classify_as("cpp", &format!("namespace {word} ")),
                named(Namespace, word)
            );
        }
        assert_eq!(classify_as("cpp", "class internal : public Base "), named(Class, "internal"));
        assert_eq!(classify_as("rust", "mod data "), named(Namespace, "data"));
        assert_eq!(classify_as("rust", "impl const Default for Config "), named(Class, "Config"));
        assert_eq!(classify_as("kotlin", "class value "), named(Class, "value"));
        assert_eq!(
            classify_as("kotlin", "class Token private constructor(val raw: String) "),
            named(Class, "Token")
        );
    }

    #[test]
    fn template_parameters_before_keyword() {
        use RegionKind::*;
        assert_eq!(
            classify_as(
                "cpp",
                "template <typename T, class Alloc = std::allocator<T>>\nclass Stack "
            ),
            named(Class, "Stack")
        );
        assert_eq!(
            classify_as("cpp", "class Map : public std::map<int, std::vector<int>> "),
            named(Class, "Map")
        );
        assert_eq!(
            classify_as("cpp", "template <typename T>\nT max_of(T a, T b) "),
            named(Function, "max_of")
        );
    }

    #[test]
    fn cpp_functions() {
        use RegionKind::*;
        assert_eq!(classify_as("cpp", "int main(int argc, char** argv) "), named(Function, "main"));
        assert_eq!(
            classify_as("cpp", "void Outer::Inner::run() const "),
            named(Function, "Outer::Inner::run")
        );
        assert_eq!(classify_as("cpp", "Widget::~Widget() "), named(Function, "Widget::~Widget"));
        assert_eq!(
            classify_as("cpp", "Point(int x, int y) : x_(x), y_(y) "),
            named(Function, "Point")
        );
        assert_eq!(
            classify_as("c", "struct point make_point(int x) "),
            named(Function, "make_point")
        );
    }

    #[test]
    fn operator_names() {
        use RegionKind::*;
        assert_eq!(
            classify_as("cpp", "bool operator==(const A& o) const "),
            named(Function, "operator==")
        );
        assert_eq!(
            classify_as("cpp", "bool operator<(const A& o) const "),
            named(Function, "operator<")
        );
        assert_eq!(
            classify_as("cpp", "A& A::operator=(const A& o) "),
            named(Function, "A::operator=")
        );
        assert_eq!(
            classify_as("cpp", "A& operator+=(const A& o) "),
            named(Function, "operator+=")
        );
        assert_eq!(
            classify_as("cpp", "int operator()(int x) const "),
            named(Function, "operator()")
        );
        assert_eq!(
            classify_as("cpp", "explicit operator bool() const "),
            named(Function, "operator bool")
        );
    }

    #[test]
    fn blocks() {
        assert_eq!(classify_as("cpp", "if (a < b && c > d) "), BLOCK);
        assert_eq!(classify_as("cpp", "else "), BLOCK);
        assert_eq!(classify_as("cpp", "for (int i = 0; i < n; ++i) "), BLOCK);
        assert_eq!(classify_as("cpp", "auto cmp = [](int a, int b) "), BLOCK);
        assert_eq!(classify_as("cpp", "std::sort(v.begin(), v.end(), [](int a, int b) "), BLOCK);
        assert_eq!(classify_as("cpp", "int values[] = "), BLOCK);
        assert_eq!(classify_as("cpp", "struct point p = "), BLOCK);
        assert_eq!(classify_as("cpp", "extern \" \" "), BLOCK);
        assert_eq!(classify_as("cpp", ""), BLOCK);
        assert_eq!(classify_as("cpp", "Foo(int x) : value"), BLOCK);
    }

    #[test]
    fn rust_items() {
        use RegionKind::*;
        assert_eq!(
            classify_as("rust", "pub(crate) fn parse<'a>(s: &'a str) -> Result<(), E> "),
            named(Function, "parse")
        );
        assert_eq!(classify_as("rust", "impl<T: Clone> Stack<T> "), named(Class, "Stack"));
        assert_eq!(
            classify_as("rust", "unsafe impl<T> Send for Queue<T> where T: Send "),
            named(Class, "Queue")
        );
        assert_eq!(classify_as("rust", "#[cfg(test)]\nmod tests "), named(Namespace, "tests"));
        assert_eq!(classify_as("rust", "match value "), BLOCK);
        assert_eq!(classify_as("rust", "Some(x) => "), BLOCK);
        assert_eq!(classify_as("rust", "let s = Point "), BLOCK);
    }

    #[test]
    fn other_languages() {
        use RegionKind::*;
        assert_eq!(
            classify_as("go", "func (s *Server) Serve(l net.Listener) error "),
            named(Function, "Serve")
        );
        assert_eq!(classify_as("go", "type Server struct "), named(Class, "Server"));
        assert_eq!(
            classify_as("java", "@Override\npublic String toString() "),
            named(Function, "toString")
        );
        assert_eq!(
            classify_as("java", "@SuppressWarnings(\" \")\nvoid run() throws IOException "),
            named(Function, "run")
        );
        assert_eq!(classify_as("java", "record Point(int x, int y) "), named(Class, "Point"));
        assert_eq!(classify_as("javascript", "class A extends B "), named(Class, "A"));
        assert_eq!(classify_as("javascript", "const f = (a) => "), BLOCK);
        assert_eq!(classify_as("scala", "def area(r: Double): Double = "), named(Function, "area"));
        assert_eq!(classify_as("csharp", "namespace App.Models "), named(Namespace, "App.Models"));
    }

    #[test]
    fn header_range_starts_at_keyword() {
        let cpp = ProfileRegistry::builtin().lookup("cpp").unwrap();
        let candidate = "\n  template <class T>\n  class Box ";
        let class = classify(candidate, cpp);
        assert_eq!(&candidate[class.range], "class Box");

        let candidate = "\n  int add(int a, int b) ";
        let class = classify(candidate, cpp);
        assert_eq!(&candidate[class.range], "int add(int a, int b)");
    }
}
