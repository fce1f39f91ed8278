//! Configuration management for mailguard.
//!
//! All configurable parameters in one place with environment variable
//! overrides. Sensible defaults, configurable in production.

use std::env;
use tracing::info;

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (empty = allow all)
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache (seconds)
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(), // Empty = allow all origins
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec!["Content-Type".to_string(), "X-Request-ID".to_string()],
            max_age_seconds: 86400,
        }
    }
}

impl CorsConfig {
    /// Load from environment variables with production safety checks.
    ///
    /// In production mode (MAILGUARD_ENV=production), warns if CORS origins
    /// are not configured.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(origins) = env::var("MAILGUARD_CORS_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(methods) = env::var("MAILGUARD_CORS_METHODS") {
            config.allowed_methods = methods
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(headers) = env::var("MAILGUARD_CORS_HEADERS") {
            config.allowed_headers = headers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(val) = env::var("MAILGUARD_CORS_MAX_AGE") {
            if let Ok(n) = val.parse() {
                config.max_age_seconds = n;
            }
        }

        let is_production = env::var("MAILGUARD_ENV")
            .map(|v| {
                let v = v.to_lowercase();
                v == "production" || v == "prod"
            })
            .unwrap_or(false);

        if is_production && config.allowed_origins.is_empty() {
            tracing::warn!(
                "PRODUCTION WARNING: CORS allows all origins. Set MAILGUARD_CORS_ORIGINS."
            );
        }

        config
    }

    /// Check if any origin restrictions are configured
    pub fn is_restricted(&self) -> bool {
        !self.allowed_origins.is_empty()
    }

    /// Convert to tower-http CorsLayer
    pub fn to_layer(&self) -> tower_http::cors::CorsLayer {
        use tower_http::cors::{AllowOrigin, Any, CorsLayer};

        let mut layer = CorsLayer::new();

        if self.allowed_origins.is_empty() {
            layer = layer.allow_origin(Any);
        } else {
            let mut valid_origins = Vec::new();
            for origin_str in &self.allowed_origins {
                match origin_str.parse::<axum::http::HeaderValue>() {
                    Ok(origin) => valid_origins.push(origin),
                    Err(_) => tracing::warn!("CORS: Invalid origin '{}' - skipping", origin_str),
                }
            }

            if valid_origins.is_empty() {
                // All configured origins failed to parse. Falling back to
                // permissive would be a security hole, so deny all instead.
                tracing::error!(
                    "CORS: All {} configured origin(s) failed to parse. \
                     Rejecting all cross-origin requests. Fix MAILGUARD_CORS_ORIGINS.",
                    self.allowed_origins.len()
                );
                layer =
                    layer.allow_origin(AllowOrigin::list(Vec::<axum::http::HeaderValue>::new()));
            } else {
                layer = layer.allow_origin(AllowOrigin::list(valid_origins));
            }
        }

        let methods: Vec<axum::http::Method> = self
            .allowed_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        if methods.is_empty() {
            layer = layer.allow_methods(Any);
        } else {
            layer = layer.allow_methods(methods);
        }

        let headers: Vec<axum::http::HeaderName> = self
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        if headers.is_empty() {
            layer = layer.allow_headers(Any);
        } else {
            layer = layer.allow_headers(headers);
        }

        layer.max_age(std::time::Duration::from_secs(self.max_age_seconds))
    }
}

/// Server configuration loaded from environment with defaults
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address (default: 127.0.0.1)
    /// Set to 0.0.0.0 for Docker or network-accessible deployments
    pub host: String,

    /// Server port (default: 8000)
    pub port: u16,

    /// Maximum accepted email body size in bytes (default: 50000)
    pub max_email_bytes: usize,

    /// Rate limit: requests per second (default: 100)
    pub rate_limit_per_second: u64,

    /// Rate limit: burst size (default: 200)
    pub rate_limit_burst: u32,

    /// Maximum concurrent requests (default: 64)
    pub max_concurrent_requests: usize,

    /// Request timeout in seconds (default: 30)
    pub request_timeout_secs: u64,

    /// Whether running in production mode
    pub is_production: bool,

    /// CORS configuration
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_email_bytes: crate::validation::DEFAULT_MAX_EMAIL_BYTES,
            rate_limit_per_second: 100,
            rate_limit_burst: 200,
            max_concurrent_requests: 64,
            request_timeout_secs: 30,
            is_production: false,
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    #[allow(clippy::field_reassign_with_default)] // Environment overrides require mutable config
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.is_production = env::var("MAILGUARD_ENV")
            .map(|v| {
                let v = v.to_lowercase();
                v == "production" || v == "prod"
            })
            .unwrap_or(false);

        if let Ok(val) = env::var("MAILGUARD_HOST") {
            config.host = val;
        }

        if let Ok(val) = env::var("MAILGUARD_PORT") {
            if let Ok(port) = val.parse() {
                config.port = port;
            }
        }

        if let Ok(val) = env::var("MAILGUARD_MAX_EMAIL_BYTES") {
            if let Ok(n) = val.parse() {
                config.max_email_bytes = n;
            }
        }

        if let Ok(val) = env::var("MAILGUARD_RATE_LIMIT") {
            if let Ok(n) = val.parse() {
                config.rate_limit_per_second = n;
            }
        }

        if let Ok(val) = env::var("MAILGUARD_RATE_BURST") {
            if let Ok(n) = val.parse() {
                config.rate_limit_burst = n;
            }
        }

        if let Ok(val) = env::var("MAILGUARD_MAX_CONCURRENT") {
            if let Ok(n) = val.parse() {
                config.max_concurrent_requests = n;
            }
        }

        if let Ok(val) = env::var("MAILGUARD_REQUEST_TIMEOUT") {
            if let Ok(n) = val.parse() {
                config.request_timeout_secs = n;
            }
        }

        config.cors = CorsConfig::from_env();

        config
    }

    /// Log the current configuration
    pub fn log(&self) {
        info!("Configuration:");
        info!(
            "   Mode: {}",
            if self.is_production {
                "PRODUCTION"
            } else {
                "Development"
            }
        );
        info!("   Bind: {}:{}", self.host, self.port);
        info!("   Max email size: {} bytes", self.max_email_bytes);
        if self.rate_limit_per_second > 0 {
            info!(
                "   Rate limit: {} req/sec (burst: {})",
                self.rate_limit_per_second, self.rate_limit_burst
            );
        } else {
            info!("   Rate limit: disabled");
        }
        info!("   Max concurrent: {}", self.max_concurrent_requests);
        info!("   Request timeout: {}s", self.request_timeout_secs);
        if self.cors.is_restricted() {
            info!("   CORS origins: {:?}", self.cors.allowed_origins);
        } else {
            info!("   CORS: Permissive (all origins allowed)");
        }
    }
}

/// Environment variable documentation
#[allow(unused)] // Public API - available for CLI help output
pub fn print_env_help() {
    println!("Mailguard Configuration Environment Variables:");
    println!();
    println!("  MAILGUARD_ENV              - Set to 'production' or 'prod' for production mode");
    println!("  MAILGUARD_HOST             - Bind address (default: 127.0.0.1)");
    println!("  MAILGUARD_PORT             - Server port (default: 8000)");
    println!("  MAILGUARD_MAX_EMAIL_BYTES  - Max accepted email body size (default: 50000)");
    println!("  MAILGUARD_RATE_LIMIT       - Requests per second (default: 100)");
    println!("  MAILGUARD_RATE_BURST       - Burst size (default: 200)");
    println!("  MAILGUARD_MAX_CONCURRENT   - Max concurrent requests (default: 64)");
    println!("  MAILGUARD_REQUEST_TIMEOUT  - Request timeout in seconds (default: 30)");
    println!();
    println!("Model files:");
    println!("  MAILGUARD_NER_PATH         - Directory with NER model.onnx + tokenizer.json");
    println!("  MAILGUARD_NER_CONFIDENCE   - Minimum NER span confidence (default: 0.7)");
    println!("  MAILGUARD_CLASSIFIER_PATH  - Directory with classifier model.onnx + tokenizer.json");
    println!("  MAILGUARD_ONNX_THREADS     - ONNX intra-op threads (default: 2)");
    println!();
    println!("CORS Configuration:");
    println!("  MAILGUARD_CORS_ORIGINS     - Comma-separated allowed origins (default: all)");
    println!("  MAILGUARD_CORS_METHODS     - Comma-separated allowed methods (default: GET,POST,OPTIONS)");
    println!("  MAILGUARD_CORS_HEADERS     - Comma-separated allowed headers");
    println!("  MAILGUARD_CORS_MAX_AGE     - Preflight cache seconds (default: 86400)");
    println!();
    println!("  RUST_LOG                   - Log level (e.g., info, debug, trace)");
    println!();
}
