// crates/autoconf-client/src/settings.rs
// ============================================================================
// Module: AutoConf Settings
// Description: File-based autoconf client settings.
// Purpose: Load host settings from TOML and turn them into a client builder.
// Dependencies: autoconf-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! [`AutoConfSettings`] is the `[autoconf]` section a host keeps in its TOML
//! configuration. Loading is strict: unknown keys, oversized files, and
//! non-UTF-8 content are rejected.
//!
//! ```toml
//! enabled = true
//! urls = ["https://conf.ipfs-mainnet.org/autoconf.json"]
//! refresh_interval_secs = 86400
//! cache_size = 3
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use autoconf_core::MAINNET_AUTOCONF_URL;
use autoconf_core::validate_http_url;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::client::Client;
use crate::client::ClientBuilder;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum settings file size in bytes.
const MAX_SETTINGS_FILE_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Settings loading and validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// I/O failure while reading settings.
    #[error("autoconf settings io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("autoconf settings parse error: {0}")]
    Parse(String),
    /// Invalid settings data.
    #[error("invalid autoconf settings: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Autoconf client settings as stored in host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoConfSettings {
    /// Whether autoconf is used at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Autoconf URLs; the mainnet URL when empty.
    #[serde(default)]
    pub urls: Vec<String>,
    /// Refresh interval in seconds.
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    /// Cache root directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Retained payload files.
    #[serde(default)]
    pub cache_size: Option<usize>,
    /// HTTP timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// `User-Agent` header.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Disables TLS certificate verification. Testing only.
    #[serde(default)]
    pub tls_insecure_skip_verify: bool,
}

/// Autoconf is on unless disabled.
const fn default_enabled() -> bool {
    true
}

impl Default for AutoConfSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            urls: Vec::new(),
            refresh_interval_secs: None,
            cache_dir: None,
            cache_size: None,
            timeout_ms: None,
            user_agent: None,
            tls_insecure_skip_verify: false,
        }
    }
}

impl AutoConfSettings {
    /// Loads and validates settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the file cannot be read, exceeds 1 MiB,
    /// is not UTF-8, fails to parse, or fails [`Self::validate`].
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let bytes = fs::read(path).map_err(|err| SettingsError::Io(err.to_string()))?;
        if bytes.len() > MAX_SETTINGS_FILE_SIZE {
            return Err(SettingsError::Invalid("settings file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| SettingsError::Invalid("settings file must be utf-8".to_string()))?;
        let settings: Self = toml::from_str(content).map_err(|err| SettingsError::Parse(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks field values.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] for non-HTTP URLs and zero-valued
    /// intervals, sizes, or timeouts.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (index, url) in self.urls.iter().enumerate() {
            validate_http_url(url, &format!("urls[{index}]"))
                .map_err(|err| SettingsError::Invalid(err.to_string()))?;
        }
        if self.refresh_interval_secs == Some(0) {
            return Err(SettingsError::Invalid("refresh_interval_secs must be positive".to_string()));
        }
        if self.cache_size == Some(0) {
            return Err(SettingsError::Invalid("cache_size must be at least 1".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(SettingsError::Invalid("timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Checks the settings against the host's network.
    ///
    /// An enabled autoconf needs a URL, and a private network must not use the
    /// public mainnet document.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] when either rule is violated.
    pub fn validate_for_network(&self, private_network: bool) -> Result<(), SettingsError> {
        if !self.enabled {
            return Ok(());
        }
        if self.urls.iter().any(|url| url.trim().is_empty()) {
            return Err(SettingsError::Invalid("autoconf is enabled but a URL is empty".to_string()));
        }
        let uses_mainnet = self.urls.is_empty() || self.urls.iter().any(|url| url == MAINNET_AUTOCONF_URL);
        if private_network && uses_mainnet {
            return Err(SettingsError::Invalid(format!(
                "private network cannot use the mainnet autoconf URL {MAINNET_AUTOCONF_URL}; set urls or disable autoconf"
            )));
        }
        Ok(())
    }

    /// Returns a client builder carrying these settings.
    #[must_use]
    pub fn into_builder(self) -> ClientBuilder {
        let mut builder = Client::builder().urls(self.urls).tls_insecure_skip_verify(self.tls_insecure_skip_verify);
        if let Some(secs) = self.refresh_interval_secs {
            builder = builder.refresh_interval(Duration::from_secs(secs));
        }
        if let Some(dir) = self.cache_dir {
            builder = builder.cache_dir(dir);
        }
        if let Some(size) = self.cache_size {
            builder = builder.cache_size(size);
        }
        if let Some(ms) = self.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        if let Some(user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        builder
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
