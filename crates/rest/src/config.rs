//! Server configuration for the Storefront JSON:API server.
//!
//! Configuration comes from command line arguments with environment
//! variable fallbacks, or is built programmatically.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STOREFRONT_PORT` | 8080 | Server port |
//! | `STOREFRONT_HOST` | 127.0.0.1 | Host to bind |
//! | `STOREFRONT_LOG_LEVEL` | info | Log level |
//! | `STOREFRONT_BASE_URL` | http://localhost:8080 | Public base URL used in links |
//! | `STOREFRONT_API_PREFIX` | /api/v1 | Path prefix of every resource route |
//! | `STOREFRONT_DATABASE_URL` | storefront.db | SQLite database path, or `:memory:` |
//! | `STOREFRONT_DEFAULT_PAGE_SIZE` | 15 | Page size when only `page[number]` is given |
//! | `STOREFRONT_MAX_PAGE_SIZE` | 100 | Upper bound of `page[size]` |
//! | `STOREFRONT_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `STOREFRONT_ENABLE_CORS` | true | Enable CORS |
//! | `STOREFRONT_CORS_ORIGINS` | * | Allowed origins |
//!
//! # Example
//!
//! ```rust
//! use storefront_rest::ServerConfig;
//!
//! let config = ServerConfig {
//!     port: 3000,
//!     api_prefix: "/api/v2".to_string(),
//!     ..Default::default()
//! };
//! assert_eq!(config.api_base_url(), "http://localhost:8080/api/v2");
//! ```

use clap::Parser;
use storefront_jsonapi::{JsonApiConfig, PageLimits};

/// Server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "storefront")]
#[command(about = "Storefront JSON:API Server")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "STOREFRONT_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "STOREFRONT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "STOREFRONT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Public base URL of the server (used in document links and Location headers).
    #[arg(long, env = "STOREFRONT_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Path prefix of the resource routes.
    #[arg(long, env = "STOREFRONT_API_PREFIX", default_value = "/api/v1")]
    pub api_prefix: String,

    /// SQLite database path. `:memory:` opens an in-memory database.
    #[arg(long, env = "STOREFRONT_DATABASE_URL", default_value = "storefront.db")]
    pub database_url: String,

    /// Page size used when a request gives only `page[number]`.
    #[arg(long, env = "STOREFRONT_DEFAULT_PAGE_SIZE", default_value = "15")]
    pub default_page_size: usize,

    /// Maximum accepted `page[size]`.
    #[arg(long, env = "STOREFRONT_MAX_PAGE_SIZE", default_value = "100")]
    pub max_page_size: usize,

    /// Request timeout in seconds.
    #[arg(long, env = "STOREFRONT_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "STOREFRONT_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "STOREFRONT_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            base_url: "http://localhost:8080".to_string(),
            api_prefix: "/api/v1".to_string(),
            database_url: "storefront.db".to_string(),
            default_page_size: 15,
            max_page_size: 100,
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parses environment variables without requiring command line arguments.
    pub fn from_env() -> Self {
        Self::try_parse_from(["storefront"]).unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Route prefix normalized to a leading slash and no trailing slash.
    /// An empty or `/` prefix yields `""`.
    pub fn route_prefix(&self) -> String {
        let trimmed = self.api_prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Absolute URL of the API root, used as the base of every document link.
    pub fn api_base_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.route_prefix())
    }

    /// Returns true when the database lives in memory.
    pub fn is_memory_database(&self) -> bool {
        self.database_url == ":memory:"
    }

    /// Settings for the JSON:API engine.
    pub fn jsonapi_config(&self) -> JsonApiConfig {
        JsonApiConfig {
            base_url: self.api_base_url(),
            page_limits: PageLimits {
                default_size: self.default_page_size,
                max_size: self.max_page_size,
            },
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if url::Url::parse(&self.base_url).is_err() {
            errors.push(format!("Base URL is not a valid URL: {}", self.base_url));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing: in-memory database,
    /// ephemeral port, no CORS.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            base_url: "http://localhost".to_string(),
            api_prefix: "/api/v1".to_string(),
            database_url: ":memory:".to_string(),
            default_page_size: 15,
            max_page_size: 100,
            request_timeout: 5,
            enable_cors: false,
            cors_origins: "*".to_string(),
        }
    }
}
