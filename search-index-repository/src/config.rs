//! Configuration types for the SearchClient.

/// Default search service host.
pub const DEFAULT_HOST: &str = "http://localhost";

/// Default search service port.
pub const DEFAULT_PORT: u16 = 9200;

/// Configuration for the SearchClient.
///
/// Built once at the composition root and passed to the client; nothing in
/// the client reads process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchClientConfig {
    /// Base URL of the search service, e.g. `http://localhost:9200`.
    pub url: String,

    /// Log every outgoing request at debug level.
    pub debug: bool,

    /// Escape quotes, apostrophes and slashes in document bodies before they
    /// are sent. Off by default.
    pub sanitize_documents: bool,
}

impl Default for SearchClientConfig {
    fn default() -> Self {
        Self::from_host_and_port(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl SearchClientConfig {
    /// Create a config pointing at `url` with the default flags.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            debug: false,
            sanitize_documents: false,
        }
    }

    /// Create a config from a host (with scheme) and a port.
    ///
    /// # Arguments
    ///
    /// * `host` - The host including its scheme, e.g. `http://search.internal`
    /// * `port` - The port the search service listens on
    ///
    /// # Returns
    ///
    /// A `SearchClientConfig` whose `url` is `<host>:<port>`.
    pub fn from_host_and_port(host: &str, port: u16) -> Self {
        Self::with_url(format!("{}:{}", host.trim_end_matches('/'), port))
    }

    /// Enable or disable request logging.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable document sanitizing.
    pub fn sanitize_documents(mut self, sanitize: bool) -> Self {
        self.sanitize_documents = sanitize;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_localhost() {
        let config = SearchClientConfig::default();
        assert_eq!(config.url, "http://localhost:9200");
        assert!(!config.debug);
        assert!(!config.sanitize_documents);
    }

    #[test]
    fn test_host_trailing_slash_is_dropped() {
        let config = SearchClientConfig::from_host_and_port("http://search.internal/", 9201);
        assert_eq!(config.url, "http://search.internal:9201");
    }

    #[test]
    fn test_flags() {
        let config = SearchClientConfig::with_url("http://es:9200")
            .debug(true)
            .sanitize_documents(true);
        assert!(config.debug);
        assert!(config.sanitize_documents);
    }
}
