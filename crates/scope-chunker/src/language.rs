use crate::source::SourceFile;
use crate::types::RegionKind;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Id of the profile applied when nothing else matches
pub const DEFAULT_PROFILE_ID: &str = "text";

/// Syntax description of one language, used by the scanner and extractor.
///
/// Profiles are plain data: adding a language means adding a record, never
/// a new type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Stable language id ("cpp", "rust", ...)
    pub id: String,

    /// File extensions without the dot, lower case
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Line comment markers ("//", "#")
    #[serde(default)]
    pub line_comments: Vec<String>,

    /// Block comment delimiters
    #[serde(default)]
    pub block_comments: Vec<BlockComment>,

    /// String literal delimiters
    #[serde(default)]
    pub strings: Vec<QuoteRule>,

    /// Char literal delimiters, matched only around short literals
    #[serde(default)]
    pub chars: Vec<QuoteRule>,

    /// Keywords that open a named scope
    #[serde(default)]
    pub scope_keywords: Vec<ScopeKeyword>,

    /// Keywords that open anonymous control blocks
    #[serde(default)]
    pub control_keywords: Vec<String>,

    /// Words that may sit between a scope keyword and the declared name
    /// (`struct alignas(8) Foo`). Never skipped when nothing follows them.
    #[serde(default)]
    pub name_modifiers: Vec<String>,

    /// Words that end a declared name once one is found (`class A extends B`)
    #[serde(default)]
    pub name_stops: Vec<String>,

    /// Recognize `name(...) {` as a function without a keyword
    #[serde(default)]
    pub detect_signatures: bool,

    /// Prefix of single-line directives (C preprocessor "#")
    #[serde(default)]
    pub directive_prefix: Option<String>,

    /// Token joining scope names into a symbol path
    pub scope_join: String,
}

/// Block comment delimiters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockComment {
    pub open: String,
    pub close: String,
    /// Nested openers need their own closers (Rust, Swift, Kotlin)
    #[serde(default)]
    pub nests: bool,
}

/// String or char literal delimiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRule {
    pub delimiter: String,
    /// Escape character; the escape and the following char are consumed together
    #[serde(default = "default_escape")]
    pub escape: Option<char>,
    /// Literal may span lines; otherwise it is closed at end of line
    #[serde(default)]
    pub multiline: bool,
}

fn default_escape() -> Option<char> {
    Some('\\')
}

/// Keyword introducing a named scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeKeyword {
    pub keyword: String,
    pub kind: RegionKind,
}

/// Partial profile from configuration; unset fields keep the base profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOverride {
    /// Builtin profile to start from (defaults to the override key, then "text")
    pub base: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub line_comments: Option<Vec<String>>,
    pub block_comments: Option<Vec<BlockComment>>,
    pub strings: Option<Vec<QuoteRule>>,
    pub chars: Option<Vec<QuoteRule>>,
    pub scope_keywords: Option<Vec<ScopeKeyword>>,
    pub control_keywords: Option<Vec<String>>,
    pub name_modifiers: Option<Vec<String>>,
    pub name_stops: Option<Vec<String>>,
    pub detect_signatures: Option<bool>,
    pub directive_prefix: Option<String>,
    pub scope_join: Option<String>,
}

impl LanguageProfile {
    /// Whether braces in this language delimit named scopes at all.
    ///
    /// Profiles without scope keywords or signature detection are chunked
    /// by line windows only.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !self.scope_keywords.is_empty() || self.detect_signatures
    }

    /// Region kind introduced by `word`, if it is a scope keyword
    #[must_use]
    pub fn scope_kind(&self, word: &str) -> Option<RegionKind> {
        self.scope_keywords
            .iter()
            .find(|kw| kw.keyword == word)
            .map(|kw| kw.kind)
    }

    #[must_use]
    pub fn is_control_keyword(&self, word: &str) -> bool {
        self.control_keywords.iter().any(|kw| kw == word)
    }

    #[must_use]
    pub fn is_name_modifier(&self, word: &str) -> bool {
        self.name_modifiers.iter().any(|m| m == word)
    }

    #[must_use]
    pub fn is_name_stop(&self, word: &str) -> bool {
        self.name_stops.iter().any(|stop| stop == word)
    }

    /// Render `text` as a one-line comment in this language
    #[must_use]
    pub fn comment_line(&self, text: &str) -> String {
        if let Some(prefix) = self.line_comments.first() {
            format!("{prefix} {text}")
        } else if let Some(block) = self.block_comments.first() {
            format!("{} {text} {}", block.open, block.close)
        } else {
            format!("// {text}")
        }
    }

    fn apply(&mut self, patch: &ProfileOverride) {
        if let Some(v) = &patch.extensions {
            self.extensions = v.iter().map(|ext| normalize_key(ext)).collect();
        }
        if let Some(v) = &patch.line_comments {
            self.line_comments.clone_from(v);
        }
        if let Some(v) = &patch.block_comments {
            self.block_comments.clone_from(v);
        }
        if let Some(v) = &patch.strings {
            self.strings.clone_from(v);
        }
        if let Some(v) = &patch.chars {
            self.chars.clone_from(v);
        }
        if let Some(v) = &patch.scope_keywords {
            self.scope_keywords.clone_from(v);
        }
        if let Some(v) = &patch.control_keywords {
            self.control_keywords.clone_from(v);
        }
        if let Some(v) = &patch.name_modifiers {
            self.name_modifiers.clone_from(v);
        }
        if let Some(v) = &patch.name_stops {
            self.name_stops.clone_from(v);
        }
        if let Some(v) = patch.detect_signatures {
            self.detect_signatures = v;
        }
        if let Some(v) = &patch.directive_prefix {
            self.directive_prefix = (!v.is_empty()).then(|| v.clone());
        }
        if let Some(v) = &patch.scope_join {
            self.scope_join.clone_from(v);
        }
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().trim_start_matches('.').to_lowercase()
}

/// Read-only lookup from language id or extension to profile
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<Arc<LanguageProfile>>,
    by_key: HashMap<String, usize>,
    default: Arc<LanguageProfile>,
}

static BUILTIN: Lazy<ProfileRegistry> =
    Lazy::new(|| ProfileRegistry::from_profiles(builtin_profiles()));

impl ProfileRegistry {
    /// Process-wide registry of builtin profiles
    pub fn builtin() -> &'static ProfileRegistry {
        &BUILTIN
    }

    /// Builtin profiles with configured overrides applied.
    ///
    /// A key naming an existing profile (by id or extension) patches that
    /// profile; any other key defines a new language on top of `base`.
    pub fn with_overrides(overrides: &BTreeMap<String, ProfileOverride>) -> Self {
        if overrides.is_empty() {
            return BUILTIN.clone();
        }

        let mut profiles: Vec<LanguageProfile> = BUILTIN
            .profiles
            .iter()
            .map(|p| LanguageProfile::clone(p))
            .collect();

        for (key, patch) in overrides {
            let key = normalize_key(key);
            let existing = BUILTIN.by_key.get(&key).copied();
            match existing {
                Some(idx) if patch.base.is_none() => {
                    profiles[idx].apply(patch);
                }
                _ => {
                    let base_key = patch.base.as_deref().map(normalize_key);
                    let mut profile = base_key
                        .and_then(|b| BUILTIN.lookup(&b))
                        .map_or_else(default_profile, |p| LanguageProfile::clone(p));
                    profile.id.clone_from(&key);
                    profile.extensions = vec![key.clone()];
                    profile.apply(patch);
                    // An override replacing an existing key wins over the builtin.
                    if let Some(idx) = existing {
                        profiles[idx].extensions.retain(|ext| *ext != key);
                    }
                    profiles.push(profile);
                }
            }
            log::debug!("Applied language profile override for '{key}'");
        }

        Self::from_profiles(profiles)
    }

    fn from_profiles(profiles: Vec<LanguageProfile>) -> Self {
        let profiles: Vec<Arc<LanguageProfile>> = profiles.into_iter().map(Arc::new).collect();
        let mut by_key = HashMap::new();
        for (idx, profile) in profiles.iter().enumerate() {
            // Later profiles (overrides) shadow earlier ones.
            by_key.insert(profile.id.clone(), idx);
            for ext in &profile.extensions {
                by_key.insert(ext.clone(), idx);
            }
        }
        let default = by_key
            .get(DEFAULT_PROFILE_ID)
            .map_or_else(|| Arc::new(default_profile()), |&idx| profiles[idx].clone());
        Self {
            profiles,
            by_key,
            default,
        }
    }

    /// Profile registered under a language id or extension
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&Arc<LanguageProfile>> {
        self.by_key
            .get(&normalize_key(key))
            .map(|&idx| &self.profiles[idx])
    }

    /// Profile for a file: explicit hint first, then the identifier's extension.
    ///
    /// The second slot is `false` when the default profile was applied.
    #[must_use]
    pub fn resolve(&self, file: &SourceFile) -> (Arc<LanguageProfile>, bool) {
        let found = file
            .language_hint
            .as_deref()
            .and_then(|hint| self.lookup(hint))
            .or_else(|| file.extension().and_then(|ext| self.lookup(&ext)));

        match found {
            Some(profile) => (profile.clone(), true),
            None => (self.default.clone(), false),
        }
    }

    /// The minimal profile for unknown languages
    #[must_use]
    pub fn default_profile(&self) -> &Arc<LanguageProfile> {
        &self.default
    }

    /// Ids of all registered profiles
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.id.as_str())
    }
}

// ─── Builtin profiles ───────────────────────────────────────────────

fn strs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn quote(delimiter: &str) -> QuoteRule {
    QuoteRule {
        delimiter: delimiter.to_string(),
        escape: Some('\\'),
        multiline: false,
    }
}

fn multiline_quote(delimiter: &str, escape: Option<char>) -> QuoteRule {
    QuoteRule {
        delimiter: delimiter.to_string(),
        escape,
        multiline: true,
    }
}

fn c_block(nests: bool) -> Vec<BlockComment> {
    vec![BlockComment {
        open: "/*".to_string(),
        close: "*/".to_string(),
        nests,
    }]
}

fn keywords(items: &[(&str, RegionKind)]) -> Vec<ScopeKeyword> {
    items
        .iter()
        .map(|(keyword, kind)| ScopeKeyword {
            keyword: (*keyword).to_string(),
            kind: *kind,
        })
        .collect()
}

const C_CONTROL: &[&str] = &[
    "if", "else", "for", "foreach", "while", "do", "switch", "case", "default", "try", "catch",
    "finally", "return", "throw", "sizeof", "new", "synchronized", "lock", "using", "unsafe",
    "checked", "unchecked", "fixed", "static_assert",
];

fn c_like(
    id: &str,
    extensions: &[&str],
    scopes: &[(&str, RegionKind)],
    join: &str,
) -> LanguageProfile {
    LanguageProfile {
        id: id.to_string(),
        extensions: strs(extensions),
        line_comments: strs(&["//"]),
        block_comments: c_block(false),
        strings: vec![quote("\"")],
        chars: vec![quote("'")],
        scope_keywords: keywords(scopes),
        control_keywords: strs(C_CONTROL),
        name_modifiers: Vec::new(),
        name_stops: Vec::new(),
        detect_signatures: true,
        directive_prefix: None,
        scope_join: join.to_string(),
    }
}

/// Profile applied to files of unknown language
#[must_use]
pub fn default_profile() -> LanguageProfile {
    LanguageProfile {
        id: DEFAULT_PROFILE_ID.to_string(),
        extensions: Vec::new(),
        line_comments: strs(&["//"]),
        block_comments: c_block(false),
        strings: vec![quote("\""), quote("'")],
        chars: Vec::new(),
        scope_keywords: Vec::new(),
        control_keywords: Vec::new(),
        name_modifiers: Vec::new(),
        name_stops: Vec::new(),
        detect_signatures: false,
        directive_prefix: None,
        scope_join: ".".to_string(),
    }
}

fn builtin_profiles() -> Vec<LanguageProfile> {
    use RegionKind::{Class, Function, Namespace};

    let mut c = c_like(
        "c",
        &["c", "h"],
        &[("struct", Class), ("union", Class), ("enum", Class)],
        "::",
    );
    c.directive_prefix = Some("#".to_string());
    c.name_modifiers = strs(&["__attribute__", "__declspec"]);

    let mut cpp = c_like(
        "cpp",
        &["cpp", "cc", "cxx", "c++", "hpp", "hh", "hxx", "h++", "ipp", "inl"],
        &[
            ("namespace", Namespace),
            ("class", Class),
            ("struct", Class),
            ("union", Class),
            ("enum", Class),
        ],
        "::",
    );
    cpp.directive_prefix = Some("#".to_string());
    cpp.name_modifiers = strs(&["alignas", "__attribute__", "__declspec"]);
    cpp.name_stops = strs(&["final", "requires"]);

    let mut csharp = c_like(
        "csharp",
        &["cs"],
        &[
            ("namespace", Namespace),
            ("class", Class),
            ("struct", Class),
            ("interface", Class),
            ("enum", Class),
            ("record", Class),
        ],
        ".",
    );
    csharp.directive_prefix = Some("#".to_string());
    csharp.strings.push(multiline_quote("@\"", None));
    csharp.name_stops = strs(&["where"]);

    let mut java = c_like(
        "java",
        &["java"],
        &[("class", Class), ("interface", Class), ("enum", Class), ("record", Class)],
        ".",
    );
    java.name_stops = strs(&["extends", "implements", "permits"]);

    let mut javascript = c_like(
        "javascript",
        &["js", "mjs", "cjs", "jsx"],
        &[("class", Class), ("function", Function)],
        ".",
    );
    javascript.strings = vec![quote("\""), quote("'"), multiline_quote("`", Some('\\'))];
    javascript.chars = Vec::new();
    javascript.name_stops = strs(&["extends"]);

    let mut typescript = javascript.clone();
    typescript.id = "typescript".to_string();
    typescript.extensions = strs(&["ts", "tsx", "mts", "cts"]);
    typescript.scope_keywords = keywords(&[
        ("namespace", Namespace),
        ("module", Namespace),
        ("class", Class),
        ("interface", Class),
        ("enum", Class),
        ("function", Function),
    ]);
    typescript.name_stops = strs(&["extends", "implements"]);

    let mut go = c_like(
        "go",
        &["go"],
        &[("type", Class), ("func", Function)],
        ".",
    );
    go.strings = vec![quote("\""), multiline_quote("`", None)];
    go.name_stops = strs(&["struct", "interface"]);
    go.detect_signatures = false;

    let mut rust = c_like(
        "rust",
        &["rs"],
        &[
            ("mod", Namespace),
            ("struct", Class),
            ("enum", Class),
            ("union", Class),
            ("trait", Class),
            ("impl", Class),
            ("fn", Function),
        ],
        "::",
    );
    rust.block_comments = c_block(true);
    rust.strings = vec![multiline_quote("\"", Some('\\'))];
    rust.control_keywords = strs(&[
        "if", "else", "for", "while", "loop", "match", "unsafe", "async", "return", "move",
    ]);
    rust.name_modifiers = strs(&["const", "unsafe"]);
    rust.name_stops = strs(&["where"]);
    rust.detect_signatures = false;

    let mut kotlin = c_like(
        "kotlin",
        &["kt", "kts"],
        &[
            ("class", Class),
            ("interface", Class),
            ("object", Class),
            ("fun", Function),
        ],
        ".",
    );
    kotlin.block_comments = c_block(true);
    kotlin.strings = vec![multiline_quote("\"\"\"", None), quote("\"")];
    kotlin.control_keywords.extend(strs(&["when", "init"]));
    kotlin.name_stops = strs(&[
        "constructor", "private", "protected", "internal", "public", "where",
    ]);
    kotlin.detect_signatures = false;

    let mut swift = c_like(
        "swift",
        &["swift"],
        &[
            ("class", Class),
            ("struct", Class),
            ("enum", Class),
            ("protocol", Class),
            ("extension", Class),
            ("actor", Class),
            ("func", Function),
        ],
        ".",
    );
    swift.block_comments = c_block(true);
    swift.strings = vec![multiline_quote("\"\"\"", Some('\\')), quote("\"")];
    swift.chars = Vec::new();
    swift.control_keywords.extend(strs(&["guard", "defer", "repeat"]));
    swift.name_stops = strs(&["where"]);
    swift.detect_signatures = false;

    let mut scala = c_like(
        "scala",
        &["scala", "sc"],
        &[
            ("package", Namespace),
            ("object", Class),
            ("class", Class),
            ("trait", Class),
            ("def", Function),
        ],
        ".",
    );
    scala.block_comments = c_block(true);
    scala.strings = vec![multiline_quote("\"\"\"", None), quote("\"")];
    scala.control_keywords.push("match".to_string());
    scala.name_stops = strs(&["extends", "with", "private", "protected"]);
    scala.detect_signatures = false;

    let mut php = c_like(
        "php",
        &["php"],
        &[
            ("namespace", Namespace),
            ("class", Class),
            ("interface", Class),
            ("trait", Class),
            ("enum", Class),
            ("function", Function),
        ],
        "\\",
    );
    php.line_comments = strs(&["//", "#"]);
    php.strings = vec![multiline_quote("\"", Some('\\')), multiline_quote("'", Some('\\'))];
    php.chars = Vec::new();
    php.name_stops = strs(&["extends", "implements"]);
    php.detect_signatures = false;

    let python = LanguageProfile {
        id: "python".to_string(),
        extensions: strs(&["py", "pyw", "pyi"]),
        line_comments: strs(&["#"]),
        block_comments: Vec::new(),
        strings: vec![
            multiline_quote("\"\"\"", Some('\\')),
            multiline_quote("'''", Some('\\')),
            quote("\""),
            quote("'"),
        ],
        chars: Vec::new(),
        scope_keywords: keywords(&[("class", Class), ("def", Function)]),
        control_keywords: Vec::new(),
        name_modifiers: Vec::new(),
        name_stops: Vec::new(),
        detect_signatures: false,
        directive_prefix: None,
        scope_join: ".".to_string(),
    };

    let ruby = LanguageProfile {
        id: "ruby".to_string(),
        extensions: strs(&["rb", "rake"]),
        line_comments: strs(&["#"]),
        block_comments: vec![BlockComment {
            open: "=begin".to_string(),
            close: "=end".to_string(),
            nests: false,
        }],
        strings: vec![quote("\""), quote("'")],
        chars: Vec::new(),
        scope_keywords: keywords(&[("module", Namespace), ("class", Class), ("def", Function)]),
        control_keywords: Vec::new(),
        name_modifiers: Vec::new(),
        name_stops: Vec::new(),
        detect_signatures: false,
        directive_prefix: None,
        scope_join: "::".to_string(),
    };

    vec![
        default_profile(),
        c,
        cpp,
        csharp,
        java,
        javascript,
        typescript,
        go,
        rust,
        kotlin,
        swift,
        scala,
        php,
        python,
        ruby,
    ]
}
