//! Guaranteed-release wrapper for scopes.

use super::Scope;
use core::fmt;
use std::ops::Deref;

/// Disposes its scope when dropped, including during unwinding.
///
/// This is the form collaborators use to open a scope around one unit of
/// work (one request, one job) and release it on every exit path.
///
/// ```
/// use ambient_scope::ScopeManager;
///
/// let manager = ScopeManager::new();
/// {
///     let scope = manager.begin_guarded();
///     assert_eq!(manager.current().as_ref(), Some(&*scope));
/// }
/// assert!(manager.current().is_none());
/// ```
#[must_use = "dropping the guard disposes the scope immediately"]
pub struct ScopeGuard {
    scope: Option<Scope>,
}

impl ScopeGuard {
    /// Wraps `scope`.
    pub fn new(scope: Scope) -> Self {
        Self { scope: Some(scope) }
    }

    /// Returns the guarded scope.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        self
    }

    /// Disposes now. Returns true if this call performed the disposal.
    #[allow(clippy::must_use_candidate)]
    pub fn dispose(mut self) -> bool {
        self.scope.take().is_some_and(|scope| scope.dispose())
    }

    /// Releases the scope without disposing it.
    #[must_use]
    pub fn into_inner(mut self) -> Scope {
        match self.scope.take() {
            Some(scope) => scope,
            None => unreachable!("scope guard emptied before into_inner"),
        }
    }
}

impl Deref for ScopeGuard {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        match &self.scope {
            Some(scope) => scope,
            None => unreachable!("scope guard used after release"),
        }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            scope.dispose();
        }
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopeGuard").field(&self.scope).finish()
    }
}
