//! Manager configuration.
//!
//! In most cases use [`ScopeManagerBuilder`](super::ScopeManagerBuilder)
//! rather than building a [`ManagerConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `label` | `"ambient"` |
//! | `warn_on_foreign_scope` | `true` |

use crate::error::{ConfigError, ConfigResult};

/// Default label attached to a manager's log events.
pub const DEFAULT_LABEL: &str = "ambient";

/// Manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Name attached to every log event the manager emits.
    pub label: String,
    /// Log a warning when `set_current` receives a scope begun by a
    /// different manager. The scope is installed either way.
    pub warn_on_foreign_scope: bool,
}

impl ManagerConfig {
    /// Checks field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.label.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "label",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            warn_on_foreign_scope: true,
        }
    }
}
