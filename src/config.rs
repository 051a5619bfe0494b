//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Storage engine selected by `CACHE_DRIVER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    File,
    Memory,
}

impl FromStr for Driver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Driver::File),
            "memory" => Ok(Driver::Memory),
            other => Err(format!("unknown cache driver: {}", other)),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage engine backing the cache
    pub driver: Driver,
    /// Directory used by the file engine
    pub cache_dir: PathBuf,
    /// Namespace prefix for every key
    pub prefix: String,
    /// HTTP server port
    pub server_port: u16,
    /// Expiry sweep interval in seconds, 0 disables the sweep
    pub sweep_interval: u64,
    /// Attempts allowed per rate-limit window
    pub rate_limit_max: u32,
    /// Rate-limit window in seconds
    pub rate_limit_window: u64,
    /// Verification code lifetime in seconds
    pub code_ttl: u64,
    /// Digits per verification code
    pub code_length: usize,
}

fn var_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DRIVER` - `file` or `memory` (default: file)
    /// - `CACHE_DIR` - File engine directory (default: ./cache)
    /// - `CACHE_PREFIX` - Key namespace (default: cacheguard)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds, 0 disables (default: 60)
    /// - `RATE_LIMIT_MAX` - Attempts per window (default: 5)
    /// - `RATE_LIMIT_WINDOW` - Window length in seconds (default: 900)
    /// - `CODE_TTL` - Verification code lifetime in seconds (default: 300)
    /// - `CODE_LENGTH` - Verification code digits (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            driver: var_or("CACHE_DRIVER", defaults.driver),
            cache_dir: var_or("CACHE_DIR", defaults.cache_dir),
            prefix: var_or("CACHE_PREFIX", defaults.prefix),
            server_port: var_or("SERVER_PORT", defaults.server_port),
            sweep_interval: var_or("SWEEP_INTERVAL", defaults.sweep_interval),
            rate_limit_max: var_or("RATE_LIMIT_MAX", defaults.rate_limit_max),
            rate_limit_window: var_or("RATE_LIMIT_WINDOW", defaults.rate_limit_window),
            code_ttl: var_or("CODE_TTL", defaults.code_ttl),
            code_length: var_or("CODE_LENGTH", defaults.code_length).max(1),
        }
    }

    /// Prefix for rate-limit and verification-code entries.
    ///
    /// Cache entries are stored as `prefix-key`; guard entries start with
    /// `prefix:guard-`, so no cache key can name them.
    pub fn guard_prefix(&self) -> String {
        format!("{}:guard", self.prefix)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window)
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: Driver::File,
            cache_dir: PathBuf::from("./cache"),
            prefix: "cacheguard".to_string(),
            server_port: 3000,
            sweep_interval: 60,
            rate_limit_max: 5,
            rate_limit_window: 900,
            code_ttl: 300,
            code_length: 5,
        }
    }
}
