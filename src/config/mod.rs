//! Configuration loading.
//!
//! Loads gatekeeper configuration from `./authgate.toml` (or
//! `$AUTHGATE_CONFIG`). Environment variables override file values; file
//! values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audit::{AuditConfig, AuditDestination};

/// Config file used when `$AUTHGATE_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "authgate.toml";

/// Policy file used when none is configured.
pub const DEFAULT_POLICY_PATH: &str = "/etc/authgate/policy.json";

// ── Top-level config ────────────────────────────────────────────

/// Top-level gatekeeper configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Policy source settings (`[policy]`).
    pub policy: PolicyConfig,
    /// Audit destination settings (`[audit]`).
    pub audit: AuditConfig,
    /// Operator log settings (`[logging]`).
    pub logging: LoggingConfig,
}

impl GatekeeperConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// If the file does not exist, defaults are used.
    ///
    /// # Errors
    ///
    /// Fails on unreadable or malformed TOML, or on an invalid
    /// `AUTHGATE_AUDITOR_HOOK` override.
    pub fn load() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        Self::load_from(&path)
    }

    /// Load from an explicit file path, then apply env overrides.
    ///
    /// # Errors
    ///
    /// See [`GatekeeperConfig::load`].
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from TOML file only, no env overrides.
    fn load_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve the config path using a custom env resolver (for testing).
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("AUTHGATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    ///
    /// # Errors
    ///
    /// An unknown audit destination is an error: audit records must never
    /// silently go somewhere other than where the operator asked.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        // Policy.
        if let Some(v) = env("AUTHGATE_POLICY_FILE") {
            self.policy.path = PathBuf::from(v);
        }
        if let Some(v) = env("AUTHGATE_POLICY_STRICT") {
            match v.parse() {
                Ok(b) => self.policy.strict = b,
                Err(_) => tracing::warn!(
                    var = "AUTHGATE_POLICY_STRICT",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        // Audit.
        if let Some(v) = env("AUTHGATE_AUDITOR_HOOK") {
            self.audit.destination = v
                .parse::<AuditDestination>()
                .map_err(|e| anyhow::anyhow!(e))
                .context("invalid AUTHGATE_AUDITOR_HOOK")?;
        }
        if let Some(v) = env("AUTHGATE_AUDIT_LOG") {
            self.audit.file_path = Some(PathBuf::from(v));
        }

        // Logging.
        if let Some(v) = env("AUTHGATE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env("AUTHGATE_LOGS_DIR") {
            self.logging.logs_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or an unknown audit destination.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

// ── Policy config ───────────────────────────────────────────────

/// Where policies come from and how strictly they are checked.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Policy definition file.
    pub path: PathBuf,
    /// Reject users or names claimed by more than one policy.
    pub strict: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_POLICY_PATH),
            strict: false,
        }
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Operator log settings. Separate from the audit trail.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rotated JSON logs. Console-only when unset.
    pub logs_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            logs_dir: None,
        }
    }
}
