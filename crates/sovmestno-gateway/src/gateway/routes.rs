//! Public route classification.
//!
//! A single ordered rule list decides whether a path may be served without
//! a bearer token. Rules are written as plain paths (exact match) or paths
//! ending in `*` (prefix match):
//!
//! ```text
//! /health          exact
//! /swagger/*       prefix "/swagger/"
//! ```

/// One public-route rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteRule {
    Exact(String),
    Prefix(String),
}

impl RouteRule {
    /// Parses the textual form; a trailing `*` makes a prefix rule.
    pub fn parse(rule: &str) -> Self {
        let rule = rule.trim();
        match rule.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(rule.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Prefix(p) => path.starts_with(p.as_str()),
        }
    }
}

/// Ordered set of public-route rules, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct PublicRoutes {
    rules: Vec<RouteRule>,
}

impl PublicRoutes {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Builds the rule set from its textual form.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            patterns
                .into_iter()
                .map(|p| RouteRule::parse(p.as_ref()))
                .collect(),
        )
    }

    /// Returns `true` if `path` needs no authentication.
    ///
    /// Must be given the path exactly as received, before any proxy rewrite,
    /// and only after [`has_dot_segment`] has ruled out `.`/`..` segments.
    pub fn is_public(&self, path: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(path))
    }
}

/// Returns `true` if any segment of `path` is `.` or `..`, literally or
/// percent-encoded (`%2e`, `%2E`).
///
/// Such paths are classified as written but would reach the downstream
/// service after URL normalisation collapses them, so they are refused
/// outright. Backslashes count as separators since URL parsing treats
/// them as `/` for http(s).
pub fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutesConfig;

    fn defaults() -> PublicRoutes {
        PublicRoutes::from_patterns(&RoutesConfig::default().public)
    }

    #[test]
    fn test_parse_rules() {
        assert_eq!(RouteRule::parse("/health"), RouteRule::Exact("/health".into()));
        assert_eq!(
            RouteRule::parse(" /swagger/* "),
            RouteRule::Prefix("/swagger/".into())
        );
    }

    #[test]
    fn test_default_public_paths() {
        let routes = defaults();
        for path in [
            "/health",
            "/swagger/index.html",
            "/swagger/doc.json",
            "/api/auth",
            "/api/auth/login",
            "/api/user/auth",
            "/api/user/auth/register",
            "/swagger-user/index.html",
            "/swagger-event/doc.json",
            "/swagger-application/swagger.json",
        ] {
            assert!(routes.is_public(path), "{path} should be public");
        }
    }

    #[test]
    fn test_default_protected_paths() {
        let routes = defaults();
        for path in [
            "/",
            "/swagger",
            "/health/extra",
            "/healthz",
            "/api/user/profile",
            "/api/user/authx",
            "/api/event/42",
            "/api/application",
            "/swagger-user",
        ] {
            assert!(!routes.is_public(path), "{path} should be protected");
        }
    }

    #[test]
    fn test_empty_rule_set_protects_everything() {
        let routes = PublicRoutes::default();
        assert!(!routes.is_public("/health"));
        assert!(!routes.is_public("/api/user/auth/login"));
    }

    #[test]
    fn test_dot_segments_detected() {
        for path in [
            "/api/user/auth/../profile",
            "/api/user/auth/%2e%2e/profile",
            "/api/user/auth/%2E./profile",
            "/api/user/auth/.%2E",
            "/swagger-user/./doc.json",
            "/swagger-user/..\\x",
            "/..",
        ] {
            assert!(has_dot_segment(path), "{path} should be refused");
        }
    }

    #[test]
    fn test_dotted_names_allowed() {
        for path in [
            "/",
            "/api/event/42",
            "/swagger-user/swagger-ui.css",
            "/api/user/.well-known",
            "/api/event/files/report..pdf",
            "/api/event/...",
        ] {
            assert!(!has_dot_segment(path), "{path} should pass");
        }
    }
}
