//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override, `APFINGER__SECTION__KEY`)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

use crate::finger::Address;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub finger: FingerConfig,
    pub federation: FederationConfig,
    pub identity: IdentityConfig,
    pub logging: LoggingConfig,
}

/// Public HTTP side (actor document and WebFinger responder)
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for both listeners (e.g., "0.0.0.0")
    pub host: String,
    /// Port of the actor / WebFinger HTTP responder (e.g., 8042)
    pub http_port: u16,
    /// Public domain (e.g., "finger.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the public base URL
    ///
    /// # Returns
    /// Full URL like "https://finger.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Finger listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FingerConfig {
    /// TCP port. Finger is on 79, but binding below 1024 needs privileges,
    /// so the default is 7900 and deployments map it.
    pub port: u16,
    /// Address served for empty requests (e.g., "@BoD@mastodon.social")
    pub default_address: String,
    /// Request text that also selects the default address (e.g., "BoD")
    pub default_address_alias: String,
    /// Maximum number of posts rendered per response
    pub post_limit: usize,
    /// Column width of rendered post bodies
    pub wrap_width: usize,
    /// Maximum length of the request line in bytes
    pub max_request_bytes: usize,
    /// How long to wait for the request line
    pub read_timeout_seconds: u64,
}

/// Outbound federation client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Scheme used for WebFinger lookups ("https" outside of tests)
    pub scheme: String,
    /// Connect, read and request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

/// Local identity (key pair and account name) storage
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Directory holding private_key.pem and username
    pub data_dir: PathBuf,
    /// Fixed account name; generated and persisted when absent
    pub username: Option<String>,
    /// RSA modulus size for newly generated keys
    pub key_bits: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is not set
    pub fn filter_directives(&self) -> String {
        let level = self.level.to_ascii_lowercase();
        format!("apfinger={level},tower_http={level}")
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (APFINGER__*)
    ///
    /// The result is not validated yet; see `validate`.
    ///
    /// # Errors
    /// Returns error if configuration is missing or malformed
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.http_port", 8042)?
            .set_default("server.protocol", "https")?
            .set_default("finger.port", 7900)?
            .set_default("finger.post_limit", 3)?
            .set_default("finger.wrap_width", 72)?
            .set_default("finger.max_request_bytes", 1024)?
            .set_default("finger.read_timeout_seconds", 60)?
            .set_default("federation.scheme", "https")?
            .set_default("federation.timeout_seconds", 60)?
            .set_default(
                "federation.user_agent",
                concat!("apfinger/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("identity.data_dir", "data")?
            .set_default("identity.key_bits", 2048)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("APFINGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))
    }

    /// Check values that deserialize fine but cannot work
    ///
    /// Call after logging is set up: a local `server.domain` is only warned
    /// about.
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if !matches!(
            self.logging.level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(AppError::Config(format!(
                "logging.level must be trace, debug, info, warn or error, got {:?}",
                self.logging.level
            )));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be pretty or json, got {:?}",
                self.logging.format
            )));
        }

        if Address::parse(&self.finger.default_address).is_none() {
            return Err(AppError::Config(format!(
                "finger.default_address must look like @user@host, got {:?}",
                self.finger.default_address
            )));
        }

        if self.finger.post_limit == 0 {
            return Err(AppError::Config(
                "finger.post_limit must be greater than 0".to_string(),
            ));
        }

        if self.finger.wrap_width == 0 {
            return Err(AppError::Config(
                "finger.wrap_width must be greater than 0".to_string(),
            ));
        }

        if self.finger.max_request_bytes == 0 {
            return Err(AppError::Config(
                "finger.max_request_bytes must be greater than 0".to_string(),
            ));
        }

        if !matches!(self.federation.scheme.as_str(), "http" | "https") {
            return Err(AppError::Config(format!(
                "federation.scheme must be http or https, got {:?}",
                self.federation.scheme
            )));
        }

        if self.identity.key_bits < 1024 {
            return Err(AppError::Config(
                "identity.key_bits must be at least 1024".to_string(),
            ));
        }

        if is_local_server_domain(&self.server.domain) {
            tracing::warn!(
                domain = %self.server.domain,
                "Public domain is local; remote servers will not be able to verify signatures"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
