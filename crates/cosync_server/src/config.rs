//! Server configuration.

/// Configuration for the document server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of log operations returned per commit response.
    pub page_size: usize,
    /// Maximum number of operations accepted in one commit request.
    pub max_ops_per_commit: usize,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            page_size: 100,
            max_ops_per_commit: 100,
        }
    }

    /// Sets the maximum log page size per response.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the maximum operations accepted per commit.
    pub fn with_max_ops_per_commit(mut self, max: usize) -> Self {
        self.max_ops_per_commit = max;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
