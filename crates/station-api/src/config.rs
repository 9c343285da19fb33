//! API configuration.

/// Status server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Pre-shared key for control routes. `None` rejects every control call.
    pub admin_api_key: Option<String>,
    /// Control route rate limit (requests per second)
    pub control_rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            admin_api_key: None,
            control_rate_limit_rps: 2,
            max_body_size: 64 * 1024,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            admin_api_key: std::env::var("ADMIN_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            control_rate_limit_rps: std::env::var("CONTROL_RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(64 * 1024),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builder used by tests and embedders.
    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.admin_api_key = Some(key.into());
        self
    }
}
