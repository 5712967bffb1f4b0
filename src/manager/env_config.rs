//! Environment variable and config file support for
//! [`ScopeManagerBuilder`](super::ScopeManagerBuilder).
//!
//! # Configuration Precedence
//!
//! Builder calls apply in order, so the usual chain
//! `from_toml(..)?.with_env_overrides()?.label(..)` yields:
//!
//! 1. **Programmatic**: values set via builder methods
//! 2. **Environment variables**: values from `AMBIENT_SCOPE_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`ManagerConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `AMBIENT_SCOPE_LABEL` | `String` | `label` |
//! | `AMBIENT_SCOPE_WARN_FOREIGN` | `bool` | `warn_on_foreign_scope` |

use super::config::ManagerConfig;
use crate::error::{ConfigError, ConfigResult};

/// Environment variable name for the manager label.
pub const ENV_LABEL: &str = "AMBIENT_SCOPE_LABEL";
/// Environment variable name for the foreign-scope warning toggle.
pub const ENV_WARN_FOREIGN: &str = "AMBIENT_SCOPE_WARN_FOREIGN";

/// Apply environment variable overrides to a [`ManagerConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut ManagerConfig) -> ConfigResult<()> {
    if let Some(val) = read_env(ENV_LABEL) {
        config.label = val.trim().to_string();
    }
    if let Some(val) = read_env(ENV_WARN_FOREIGN) {
        config.warn_on_foreign_scope = parse_bool(ENV_WARN_FOREIGN, &val)?;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_bool(var: &'static str, val: &str) -> ConfigResult<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: val.to_string(),
            expected: "bool (true/false/1/0/yes/no/on/off)",
        }),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable manager configuration.
///
/// ```toml
/// [manager]
/// label = "request-scopes"
/// warn_on_foreign_scope = false
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct ManagerTomlConfig {
    /// Manager settings.
    #[serde(default)]
    pub manager: ManagerToml,
}

/// `[manager]` section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct ManagerToml {
    /// Label attached to log events.
    pub label: Option<String>,
    /// Warn when a scope begun by another manager is installed.
    pub warn_on_foreign_scope: Option<bool>,
}

/// Apply a parsed TOML config. Only fields that are present override.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut ManagerConfig, toml: &ManagerTomlConfig) {
    if let Some(ref v) = toml.manager.label {
        config.label.clone_from(v);
    }
    if let Some(v) = toml.manager.warn_on_foreign_scope {
        config.warn_on_foreign_scope = v;
    }
}

/// Parse a TOML string into a [`ManagerTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> ConfigResult<ManagerTomlConfig> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Parse {
        message: e.to_string(),
    })
}

/// Read and parse a TOML file into a [`ManagerTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> ConfigResult<ManagerTomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml_str(&content)
}
