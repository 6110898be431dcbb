//! Activation paths and the matchers compiled from them.
//!
//! Patterns follow the familiar router syntax: literal segments, named
//! parameters (`/user/:id`), optional and repeated parameters (`:id?`,
//! `:rest*`, `:rest+`) and a bare `*` wildcard. By default a pattern matches
//! any path it is a segment-wise prefix of, case-insensitively, ignoring a
//! trailing slash.

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RuntimeError, RuntimeResult};

/// Custom activation test over the full location.
pub type ActivationPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One activation path with its matching options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathRule {
    /// Path pattern.
    pub value: String,
    /// Match the whole path instead of a prefix.
    pub exact: bool,
    /// A trailing slash is significant.
    pub strict: bool,
    /// Case-sensitive matching.
    pub sensitive: bool,
    /// Match against the fragment (`#/path`) instead of the path.
    pub hash_type: bool,
}

impl PathRule {
    /// A rule with default options.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Require a whole-path match.
    #[must_use]
    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    /// Treat a trailing slash as significant.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Match case-sensitively.
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Match against the fragment.
    #[must_use]
    pub fn hash_type(mut self) -> Self {
        self.hash_type = true;
        self
    }
}

/// When an application should be active.
#[derive(Clone, Default)]
pub enum ActivePath {
    /// Always. Used by applications created directly rather than routed.
    #[default]
    Always,
    /// When any rule matches the location.
    Rules(Vec<PathRule>),
    /// When the predicate accepts the location.
    Predicate(ActivationPredicate),
}

impl ActivePath {
    /// A predicate over the full location.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Whether this is a list of path rules.
    #[must_use]
    pub fn is_rules(&self) -> bool {
        matches!(self, Self::Rules(rules) if !rules.is_empty())
    }
}

impl fmt::Debug for ActivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Rules(rules) => f.debug_tuple("Rules").field(rules).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for ActivePath {
    fn from(value: &str) -> Self {
        Self::Rules(vec![PathRule::new(value)])
    }
}

impl From<String> for ActivePath {
    fn from(value: String) -> Self {
        Self::Rules(vec![PathRule::new(value)])
    }
}

impl From<PathRule> for ActivePath {
    fn from(rule: PathRule) -> Self {
        Self::Rules(vec![rule])
    }
}

impl From<Vec<PathRule>> for ActivePath {
    fn from(rules: Vec<PathRule>) -> Self {
        Self::Rules(rules)
    }
}

struct CompiledRule {
    rule: PathRule,
    regex: Regex,
}

#[derive(Clone)]
enum Compiled {
    Always,
    Rules(Arc<[CompiledRule]>),
    Predicate(ActivationPredicate),
}

/// An [`ActivePath`] compiled against the framework basename.
#[derive(Clone)]
pub struct ActivationMatcher {
    compiled: Compiled,
}

impl fmt::Debug for ActivationMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.compiled {
            Compiled::Always => f.write_str("ActivationMatcher(always)"),
            Compiled::Rules(rules) => f
                .debug_list()
                .entries(rules.iter().map(|r| &r.rule.value))
                .finish(),
            Compiled::Predicate(_) => f.write_str("ActivationMatcher(predicate)"),
        }
    }
}

impl ActivationMatcher {
    /// Compile `path`, prefixing every rule with `basename`.
    ///
    /// An empty rule list is treated like [`ActivePath::Always`].
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidPath`] if a pattern does not compile.
    pub fn compile(path: &ActivePath, basename: Option<&str>) -> RuntimeResult<Self> {
        let compiled = match path {
            ActivePath::Always => Compiled::Always,
            ActivePath::Rules(rules) if rules.is_empty() => Compiled::Always,
            ActivePath::Rules(rules) => Compiled::Rules(
                rules
                    .iter()
                    .map(|rule| {
                        let rule = PathRule {
                            value: join_paths(basename, &rule.value),
                            ..rule.clone()
                        };
                        let regex = compile_pattern(&rule.value, rule.strict, rule.sensitive)?;
                        Ok(CompiledRule { rule, regex })
                    })
                    .collect::<RuntimeResult<Vec<_>>>()?
                    .into(),
            ),
            ActivePath::Predicate(f) => Compiled::Predicate(Arc::clone(f)),
        };
        Ok(Self { compiled })
    }

    /// A matcher that accepts every location.
    #[must_use]
    pub fn always() -> Self {
        Self {
            compiled: Compiled::Always,
        }
    }

    /// The pattern that matched `url`, `""` when active without a pattern,
    /// or `None` when inactive.
    #[must_use]
    pub fn matched_path(&self, url: &str) -> Option<String> {
        match &self.compiled {
            Compiled::Always => Some(String::new()),
            Compiled::Predicate(f) => f(url).then(String::new),
            Compiled::Rules(rules) => rules
                .iter()
                .find(|compiled| compiled.matches(url))
                .map(|compiled| compiled.rule.value.clone()),
        }
    }

    /// Whether the application should be active at `url`.
    #[must_use]
    pub fn is_active(&self, url: &str) -> bool {
        self.matched_path(url).is_some()
    }
}

impl CompiledRule {
    fn matches(&self, url: &str) -> bool {
        let path = location_path(url, self.rule.hash_type);
        if self.rule.exact {
            return self.regex.is_match(&path);
        }
        prefix_ends(&path)
            .filter_map(|end| path.get(..end))
            .any(|prefix| self.regex.is_match(prefix))
    }
}

/// Every length at which `path` can be cut on a segment boundary, with and
/// without the separating slash.
fn prefix_ends(path: &str) -> impl Iterator<Item = usize> + '_ {
    path.char_indices()
        .filter(|(_, c)| *c == '/')
        .flat_map(|(i, _)| [i, i.saturating_add(1)])
        .chain(std::iter::once(path.len()))
}

/// The part of `url` activation paths are matched against.
fn location_path(url: &str, hash_type: bool) -> String {
    let parsed = Url::parse(url).ok();
    if hash_type {
        let fragment = match &parsed {
            Some(url) => url.fragment().unwrap_or_default().to_string(),
            None => url
                .split_once('#')
                .map(|(_, fragment)| fragment.to_string())
                .unwrap_or_default(),
        };
        let path = fragment.split('?').next().unwrap_or_default();
        return if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
    }
    match parsed {
        Some(url) => url.path().to_string(),
        None => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// Prefix `path` with `base`, normalising the slash between them.
#[must_use]
pub fn join_paths(base: Option<&str>, path: &str) -> String {
    let base = base.unwrap_or_default().trim_end_matches('/');
    if base.is_empty() {
        return path.to_string();
    }
    format!("{base}/{}", path.trim_start_matches('/'))
}

/// Whether activating an application should publish a basename.
#[must_use]
pub fn should_set_basename(path: &ActivePath, app_basename: Option<&str>) -> bool {
    app_basename.is_some() || path.is_rules()
}

/// The basename handed to an application: its own basename under the
/// framework basename, or else the pattern it was activated by.
#[must_use]
pub fn default_basename(
    matched_path: &str,
    framework_basename: Option<&str>,
    app_basename: Option<&str>,
) -> String {
    match app_basename {
        Some(own) => join_paths(framework_basename, own),
        None => matched_path.to_string(),
    }
}

enum Token {
    Literal(String),
    Param { prefixed: bool, modifier: Option<char> },
    Wildcard,
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek().is_some_and(|n| n.is_ascii_alphanumeric() || *n == '_') => {
                while chars.next_if(|n| n.is_ascii_alphanumeric() || *n == '_').is_some() {}
                let prefixed = literal.ends_with('/');
                if prefixed {
                    literal.pop();
                }
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                let modifier = chars.next_if(|n| matches!(*n, '?' | '*' | '+'));
                tokens.push(Token::Param { prefixed, modifier });
            },
            '*' => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Wildcard);
            },
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

fn compile_pattern(pattern: &str, strict: bool, sensitive: bool) -> RuntimeResult<Regex> {
    let body = if strict {
        pattern
    } else {
        pattern.trim_end_matches('/')
    };

    let mut source = String::from("^");
    for token in tokenize(body) {
        match token {
            Token::Literal(text) => source.push_str(&regex::escape(&text)),
            Token::Wildcard => source.push_str("(.*)"),
            Token::Param { prefixed, modifier } => {
                let prefix = if prefixed { "/" } else { "" };
                let part = match modifier {
                    Some('?') => format!("(?:{prefix}([^/]+?))?"),
                    Some('+') => format!("{prefix}([^/]+?(?:/[^/]+?)*)"),
                    Some('*') => format!("(?:{prefix}([^/]+?(?:/[^/]+?)*))?"),
                    _ => format!("{prefix}([^/]+?)"),
                };
                source.push_str(&part);
            },
        }
    }
    if !strict {
        source.push_str("/?");
    }
    source.push('$');

    RegexBuilder::new(&source)
        .case_insensitive(!sensitive)
        .build()
        .map_err(|e| RuntimeError::InvalidPath {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(path: impl Into<ActivePath>) -> ActivationMatcher {
        ActivationMatcher::compile(&path.into(), None).unwrap()
    }

    #[test]
    fn prefix_matching_respects_segments() {
        let m = matcher("/shop");
        assert!(m.is_active("https://host.test/shop"));
        assert!(m.is_active("https://host.test/shop/"));
        assert!(m.is_active("https://host.test/shop/cart?x=1"));
        assert!(m.is_active("https://host.test/SHOP"));
        assert!(!m.is_active("https://host.test/shopping"));
        assert!(!m.is_active("https://host.test/"));
    }

    #[test]
    fn exact_strict_and_sensitive() {
        let exact = matcher(PathRule::new("/shop").exact());
        assert!(exact.is_active("https://host.test/shop/"));
        assert!(!exact.is_active("https://host.test/shop/cart"));

        let strict = matcher(PathRule::new("/shop/").exact().strict());
        assert!(strict.is_active("https://host.test/shop/"));
        assert!(!strict.is_active("https://host.test/shop"));

        let sensitive = matcher(PathRule::new("/Shop").sensitive());
        assert!(sensitive.is_active("https://host.test/Shop"));
        assert!(!sensitive.is_active("https://host.test/shop"));
    }

    #[test]
    fn parameters_and_wildcards() {
        let m = matcher(PathRule::new("/user/:id").exact());
        assert!(m.is_active("https://host.test/user/42"));
        assert!(!m.is_active("https://host.test/user"));

        let optional = matcher(PathRule::new("/user/:id?").exact());
        assert!(optional.is_active("https://host.test/user"));
        assert!(optional.is_active("https://host.test/user/42"));

        let rest = matcher(PathRule::new("/docs/:path+").exact());
        assert!(rest.is_active("https://host.test/docs/a/b/c"));
        assert!(!rest.is_active("https://host.test/docs"));

        let wildcard = matcher("/files/*");
        assert!(wildcard.is_active("https://host.test/files/x/y"));
    }

    #[test]
    fn hash_routes_match_the_fragment() {
        let m = matcher(PathRule::new("/seller").hash_type());
        assert!(m.is_active("https://host.test/#/seller/list?tab=1"));
        assert!(!m.is_active("https://host.test/seller"));
    }

    #[test]
    fn basename_is_prefixed_and_reported() {
        let m = ActivationMatcher::compile(&ActivePath::from("/shop"), Some("/portal/")).unwrap();
        assert!(m.is_active("https://host.test/portal/shop/cart"));
        assert!(!m.is_active("https://host.test/shop"));
        assert_eq!(
            m.matched_path("https://host.test/portal/shop").as_deref(),
            Some("/portal/shop")
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let m = matcher(vec![PathRule::new("/a"), PathRule::new("/")]);
        assert_eq!(m.matched_path("https://host.test/a/1").as_deref(), Some("/a"));
        assert_eq!(m.matched_path("https://host.test/b").as_deref(), Some("/"));
    }

    #[test]
    fn always_and_predicates() {
        assert_eq!(
            ActivationMatcher::always().matched_path("https://host.test/x").as_deref(),
            Some("")
        );
        assert!(matcher(ActivePath::Rules(Vec::new())).is_active("https://host.test/x"));

        let m = matcher(ActivePath::predicate(|url| url.contains("beta")));
        assert!(m.is_active("https://host.test/?beta"));
        assert!(!m.is_active("https://host.test/"));
    }

    #[test]
    fn basenames() {
        assert!(should_set_basename(&ActivePath::from("/a"), None));
        assert!(!should_set_basename(&ActivePath::Always, None));
        assert!(should_set_basename(&ActivePath::Always, Some("/own")));
        assert_eq!(default_basename("/portal/a", Some("/portal"), None), "/portal/a");
        assert_eq!(default_basename("/portal/a", Some("/portal"), Some("seller")), "/portal/seller");
        assert_eq!(join_paths(None, "/a"), "/a");
    }
}
