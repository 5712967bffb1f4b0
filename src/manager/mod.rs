//! The scope manager.
//!
//! A [`ScopeManager`] tracks which [`Scope`] is *current* in each logical
//! flow. Code deep in a call chain asks the manager for the current scope
//! instead of receiving it as a parameter.
//!
//! # Operations
//!
//! - [`current`](ScopeManager::current): the scope current in this flow
//! - [`begin`](ScopeManager::begin): open a child of the current scope and
//!   make it current
//! - [`set_current`](ScopeManager::set_current): swap the current scope,
//!   returning the previous one
//! - [`execute_in_scope`](ScopeManager::execute_in_scope) and
//!   [`scoped`](ScopeManager::scoped): run work with a scope grafted onto the
//!   flow, restoring the previous value on every exit path
//!
//! # Disposal Promotion
//!
//! The manager watches every scope it installs. When the scope that is
//! current in the disposing flow is disposed, the manager walks the parent
//! chain, skips ancestors that are already disposed, and installs the first
//! live one (or nothing). Disposing a scope that is not current in that
//! flow leaves the flow untouched. A flow whose current scope was disposed
//! from a different flow is repaired on its next read, so a non-empty
//! current value always refers to a live scope.
//!
//! # Example
//!
//! ```
//! use ambient_scope::ScopeManager;
//!
//! let manager = ScopeManager::new();
//! let outer = manager.begin();
//! let inner = manager.begin();
//! assert_eq!(inner.parent().as_ref(), Some(&outer));
//!
//! inner.dispose();
//! assert_eq!(manager.current().as_ref(), Some(&outer));
//!
//! outer.dispose();
//! assert!(manager.current().is_none());
//! ```

pub mod builder;
pub mod config;
pub mod env_config;

pub use builder::ScopeManagerBuilder;
pub use config::ManagerConfig;

use crate::flow::local::{self, Owner, SlotKey};
use crate::flow::{FlowSnapshot, InFlow};
use crate::scope::{Lineage, Scope, ScopeGuard};
use crate::tracing_compat::{debug, trace, warn};
use crate::types::ManagerId;
use core::fmt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};

struct ManagerShared {
    /// Identity plus a weak handle on this state, so flow slots can tell
    /// when the manager is gone.
    key: SlotKey,
    config: ManagerConfig,
    /// Serializes current-value mutations with handler subscription and
    /// disposal handling.
    lock: Mutex<()>,
}

impl ManagerShared {
    /// Disposal handler, invoked on the flow that disposed `disposed`.
    fn on_scope_disposed(&self, disposed: &Scope) {
        let _guard = self.lock.lock();
        let Some(current) = local::get(self.key.id()) else {
            return;
        };
        if current.scope() != disposed {
            return;
        }
        let promoted = current.nearest_live_ancestor();
        let promoted_id = promoted.as_ref().map(|lineage| lineage.scope().id());
        if local::compare_and_replace(&self.key, disposed, promoted) {
            debug!(
                manager = %self.config.label,
                disposed = %disposed.id(),
                promoted = ?promoted_id,
                "current scope disposed, promoted to nearest live ancestor"
            );
        }
    }
}

/// Tracks the current scope of every logical flow.
///
/// `ScopeManager` is a cheap handle: clones share identity, configuration
/// and lock. Construct one per composition root and pass it to whatever
/// needs it. Disposal handlers hold a weak reference, so once every handle
/// is dropped, pending handlers do nothing, and the manager's slots are
/// pruned from each flow the next time that flow is written or forked.
///
/// A flow slot owns the chain of ancestors of the scope it holds, so an
/// ancestor stays available for promotion even when the caller keeps no
/// handle to it.
#[derive(Clone)]
pub struct ScopeManager {
    shared: Arc<ManagerShared>,
}

impl ScopeManager {
    /// Creates a manager with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    /// Creates a manager from an explicit configuration.
    ///
    /// The configuration is used as given; [`ScopeManagerBuilder::build`]
    /// validates it first.
    #[must_use]
    pub fn with_config(config: ManagerConfig) -> Self {
        let id = ManagerId::next();
        debug!(manager = %config.label, id = %id, "scope manager created");
        let shared = Arc::new_cyclic(|weak: &Weak<ManagerShared>| {
            let owner: Owner = weak.clone();
            ManagerShared {
                key: SlotKey::new(id, owner),
                config,
                lock: Mutex::new(()),
            }
        });
        Self { shared }
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> ScopeManagerBuilder {
        ScopeManagerBuilder::new()
    }

    /// Returns this manager's identity.
    #[must_use]
    pub fn id(&self) -> ManagerId {
        self.shared.key.id()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Returns the scope current in the calling flow.
    ///
    /// `None` if no scope was established in this flow (or inherited at a
    /// fork), or if the established chain is exhausted. Never blocks.
    #[must_use]
    pub fn current(&self) -> Option<Scope> {
        self.current_lineage()
            .map(|lineage| lineage.scope().clone())
    }

    fn current_lineage(&self) -> Option<Arc<Lineage>> {
        let current = local::get(self.id())?;
        if !current.scope().is_disposed() {
            return Some(current);
        }

        // Disposed from another flow: the handler ran against that flow's
        // table, so repair this one now.
        let promoted = current.nearest_live_ancestor();
        if local::compare_and_replace(&self.shared.key, current.scope(), promoted.clone()) {
            debug!(
                manager = %self.shared.config.label,
                disposed = %current.scope().id(),
                promoted = ?promoted.as_ref().map(|lineage| lineage.scope().id()),
                "stale current scope repaired on read"
            );
        }
        promoted
    }

    /// Begins a child of the current scope and makes it current.
    ///
    /// The new scope is visible to this flow and to flows forked from it
    /// afterwards.
    #[must_use = "the scope stays current until it is disposed"]
    pub fn begin(&self) -> Scope {
        let parent = self.current_lineage();
        let scope = Scope::create(parent.as_ref().map(|p| p.scope()), Some(self.id()));
        let lineage = Lineage::child(scope.clone(), parent);
        let previous = {
            let _guard = self.shared.lock.lock();
            self.watch(&scope);
            local::replace(&self.shared.key, Some(lineage))
        };
        drop(previous);

        trace!(
            manager = %self.shared.config.label,
            scope = %scope.id(),
            parent = ?scope.parent_id(),
            "scope begun"
        );
        scope
    }

    /// Begins a scope wrapped in a guard that disposes it on drop.
    pub fn begin_guarded(&self) -> ScopeGuard {
        self.begin().into_guard()
    }

    /// Replaces the current scope, returning the previous value.
    ///
    /// `scope` may belong to a different flow (handing a scope created on
    /// one flow to a callback running on another). Installing the same scope
    /// repeatedly registers the disposal handler only once.
    #[allow(clippy::must_use_candidate)]
    pub fn set_current(&self, scope: Option<Scope>) -> Option<Scope> {
        let lineage = self.resolve(scope);
        self.install(lineage)
            .map(|previous| previous.scope().clone())
    }

    /// Pairs `scope` with its ancestor chain, reusing the chain this flow
    /// already holds when `scope` is on it.
    fn resolve(&self, scope: Option<Scope>) -> Option<Arc<Lineage>> {
        let scope = scope?;
        self.check_foreign(&scope);
        let held = local::get(self.id());
        Some(Lineage::resolve(scope, held.as_ref()))
    }

    fn install(&self, lineage: Option<Arc<Lineage>>) -> Option<Arc<Lineage>> {
        let installed = lineage.as_ref().map(|l| l.scope().id());
        let previous = {
            let _guard = self.shared.lock.lock();
            if let Some(lineage) = &lineage {
                self.watch(lineage.scope());
            }
            local::replace(&self.shared.key, lineage)
        };

        trace!(
            manager = %self.shared.config.label,
            installed = ?installed,
            previous = ?previous.as_ref().map(|l| l.scope().id()),
            "current scope replaced"
        );
        previous
    }

    /// Runs `work` with `scope` current, then restores the previous value.
    ///
    /// The previous value is restored on every exit path, including a panic
    /// unwinding out of `work`. The result, or the panic, reaches the caller
    /// unchanged.
    ///
    /// ```
    /// use ambient_scope::{Scope, ScopeManager};
    ///
    /// let manager = ScopeManager::new();
    /// let borrowed = Scope::root();
    ///
    /// let result: Result<(), &str> = manager.execute_in_scope(Some(borrowed.clone()), || {
    ///     assert_eq!(manager.current().as_ref(), Some(&borrowed));
    ///     Err("resolution failed")
    /// });
    ///
    /// assert_eq!(result, Err("resolution failed"));
    /// assert!(manager.current().is_none());
    /// ```
    pub fn execute_in_scope<T>(&self, scope: Option<Scope>, work: impl FnOnce() -> T) -> T {
        let previous = self.install(self.resolve(scope));
        let _restore = RestoreGuard {
            manager: self,
            previous: Some(previous),
        };
        work()
    }

    /// Binds `future` to a flow in which `scope` is current.
    ///
    /// The asynchronous form of [`execute_in_scope`](Self::execute_in_scope):
    /// `scope` stays current across every suspension point of `future`,
    /// while the calling flow never observes the override.
    pub fn scoped<F: Future>(&self, scope: Option<Scope>, future: F) -> InFlow<F> {
        let lineage = self.resolve(scope);
        if let Some(lineage) = &lineage {
            let _guard = self.shared.lock.lock();
            self.watch(lineage.scope());
        }
        FlowSnapshot::capture()
            .with_lineage(&self.shared.key, lineage)
            .bind(future)
    }

    /// Subscribes the disposal handler, replacing an earlier subscription.
    /// Callers hold the manager lock.
    fn watch(&self, scope: &Scope) {
        let shared: Weak<ManagerShared> = Arc::downgrade(&self.shared);
        let _registered = scope.watch(self.id(), move |disposed: &Scope| {
            if let Some(shared) = shared.upgrade() {
                shared.on_scope_disposed(disposed);
            }
        });
    }

    fn check_foreign(&self, scope: &Scope) {
        if !self.shared.config.warn_on_foreign_scope {
            return;
        }
        if let Some(origin) = scope.origin() {
            if origin != self.id() {
                warn!(
                    manager = %self.shared.config.label,
                    scope = %scope.id(),
                    origin = %origin,
                    "installing a scope begun by a different manager"
                );
            }
        }
    }
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeManager")
            .field("id", &self.id())
            .field("label", &self.shared.config.label)
            .finish()
    }
}

/// Restores a saved current value on drop.
struct RestoreGuard<'a> {
    manager: &'a ScopeManager,
    previous: Option<Option<Arc<Lineage>>>,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            // The previous value was already checked when it was installed.
            let _replaced = self.manager.install(previous);
        }
    }
}
