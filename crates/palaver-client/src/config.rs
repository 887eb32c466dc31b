//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the client can run against a local server
//! with zero configuration.

/// Endpoints for the HTTP bulk-load API and the realtime connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host of the HTTP API.
    /// Env: `PALAVER_API_HOST`
    /// Default: `127.0.0.1`
    pub api_host: String,

    /// Port of the HTTP API.
    /// Env: `PALAVER_API_PORT`
    /// Default: `8080`
    pub api_port: u16,

    /// Host of the realtime WebSocket server.
    /// Env: `PALAVER_WS_HOST`
    /// Default: `127.0.0.1`
    pub ws_host: String,

    /// Port of the realtime WebSocket server.
    /// Env: `PALAVER_WS_PORT`
    /// Default: `8081`
    pub ws_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 8080,
            ws_host: "127.0.0.1".to_string(),
            ws_port: 8081,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("PALAVER_API_HOST") {
            config.api_host = host;
        }
        if let Ok(port) = std::env::var("PALAVER_API_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) => config.api_port = parsed,
                Err(_) => tracing::warn!(value = %port, "Invalid PALAVER_API_PORT, using default"),
            }
        }
        if let Ok(host) = std::env::var("PALAVER_WS_HOST") {
            config.ws_host = host;
        }
        if let Ok(port) = std::env::var("PALAVER_WS_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) => config.ws_port = parsed,
                Err(_) => tracing::warn!(value = %port, "Invalid PALAVER_WS_PORT, using default"),
            }
        }

        config
    }

    /// URL of the realtime connection endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}", self.ws_host, self.ws_port)
    }

    /// Base URL of the HTTP bulk-load API.
    pub fn api_base(&self) -> String {
        format!("http://{}:{}", self.api_host, self.api_port)
    }
}
