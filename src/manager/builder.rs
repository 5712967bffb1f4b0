//! Builder for [`ScopeManager`].

use super::config::ManagerConfig;
use super::env_config::apply_env_overrides;
use super::ScopeManager;
use crate::error::ConfigResult;

/// Builder for constructing a manager with custom configuration.
///
/// ```
/// use ambient_scope::ScopeManagerBuilder;
///
/// let manager = ScopeManagerBuilder::new()
///     .label("request-scopes")
///     .warn_on_foreign_scope(false)
///     .build()
///     .expect("valid config");
/// assert_eq!(manager.config().label, "request-scopes");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScopeManagerBuilder {
    config: ManagerConfig,
}

impl ScopeManagerBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label attached to log events.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Enable or disable the foreign-scope warning.
    #[must_use]
    pub fn warn_on_foreign_scope(mut self, enable: bool) -> Self {
        self.config.warn_on_foreign_scope = enable;
        self
    }

    /// Apply `AMBIENT_SCOPE_*` environment overrides on top of the current
    /// values.
    pub fn with_env_overrides(mut self) -> ConfigResult<Self> {
        apply_env_overrides(&mut self.config)?;
        Ok(self)
    }

    /// Start from a TOML config file.
    #[cfg(feature = "config-file")]
    pub fn from_toml(path: impl AsRef<std::path::Path>) -> ConfigResult<Self> {
        let parsed = super::env_config::parse_toml_file(path.as_ref())?;
        let mut builder = Self::new();
        super::env_config::apply_toml_config(&mut builder.config, &parsed);
        Ok(builder)
    }

    /// Start from a TOML string.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(toml: &str) -> ConfigResult<Self> {
        let parsed = super::env_config::parse_toml_str(toml)?;
        let mut builder = Self::new();
        super::env_config::apply_toml_config(&mut builder.config, &parsed);
        Ok(builder)
    }

    /// Validate the configuration and build the manager.
    pub fn build(self) -> ConfigResult<ScopeManager> {
        self.config.validate()?;
        Ok(ScopeManager::with_config(self.config))
    }
}
