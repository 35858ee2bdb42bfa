//! Cookie matchers: literal names or patterns.

use regex::Regex;

/// How a matcher identifies cookies: by exact name, or by testing a
/// pattern against every live cookie name.
#[derive(Debug, Clone)]
pub enum MatcherName {
    Literal(String),
    Pattern(Regex),
}

/// A configured cookie matcher, optionally qualified by path and domain.
#[derive(Debug, Clone)]
pub struct CookieMatcher {
    pub name: MatcherName,
    pub path: Option<String>,
    pub domain: Option<String>,
}

impl CookieMatcher {
    /// Match a cookie by its exact name.
    pub fn literal(name: impl Into<String>) -> Self {
        Self {
            name: MatcherName::Literal(name.into()),
            path: None,
            domain: None,
        }
    }

    /// Match cookies whose names satisfy a regex pattern. An invalid
    /// pattern degrades to literal matching on the pattern text.
    pub fn pattern(pattern: impl AsRef<str>) -> Self {
        let pattern = pattern.as_ref();
        match Regex::new(pattern) {
            Ok(regex) => Self {
                name: MatcherName::Pattern(regex),
                path: None,
                domain: None,
            },
            Err(e) => {
                tracing::warn!("invalid cookie pattern {pattern:?}: {e}");
                Self::literal(pattern)
            }
        }
    }

    /// Match with an already-compiled regex.
    pub fn pattern_regex(regex: Regex) -> Self {
        Self {
            name: MatcherName::Pattern(regex),
            path: None,
            domain: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn matches(&self, cookie_name: &str) -> bool {
        match &self.name {
            MatcherName::Literal(literal) => literal == cookie_name,
            MatcherName::Pattern(regex) => regex.is_match(cookie_name),
        }
    }

    /// Names from the live set this matcher selects. All matches are
    /// collected up front so erasure never mutates a list mid-scan.
    pub fn find_matches(&self, live_names: &[String]) -> Vec<String> {
        match &self.name {
            MatcherName::Literal(literal) => live_names
                .iter()
                .find(|name| *name == literal)
                .cloned()
                .into_iter()
                .collect(),
            MatcherName::Pattern(regex) => live_names
                .iter()
                .filter(|name| regex.is_match(name))
                .cloned()
                .collect(),
        }
    }
}
