//! Page metadata.

/// What `location` and `navigator` would tell us: enough context to write
/// correct cookie attributes and fill the logging payload.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub hostname: String,
    /// `"https"` or `"http"`.
    pub scheme: String,
    pub page_url: String,
    pub user_agent: String,
    /// Active language at decision time.
    pub language: String,
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            scheme: "https".to_string(),
            page_url: "https://localhost/".to_string(),
            user_agent: String::new(),
            language: "en".to_string(),
        }
    }
}

impl PageContext {
    pub fn new(hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        Self {
            page_url: format!("https://{hostname}/"),
            hostname,
            ..Default::default()
        }
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = url.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn is_https(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }

    /// Bare `localhost`-style hosts get no `Domain` attribute.
    pub fn hostname_has_dot(&self) -> bool {
        self.hostname.contains('.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotless_hostname() {
        assert!(!PageContext::new("localhost").hostname_has_dot());
        assert!(PageContext::new("www.example.com").hostname_has_dot());
    }

    #[test]
    fn test_https_detection() {
        assert!(PageContext::new("example.com").is_https());
        assert!(!PageContext::new("example.com").scheme("http").is_https());
    }
}
