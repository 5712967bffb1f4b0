//! Scope nodes.
//!
//! A [`Scope`] is one lifetime boundary in a tree of scopes. It carries:
//!
//! - an identity ([`ScopeId`]) that is never shared with another scope
//! - a non-owning link to the scope that was current when it was created
//! - a monotonic disposed flag
//! - a one-shot, multicast disposal notification
//!
//! Disposal follows the same protocol as a cancellation token: the first
//! caller flips the flag and drains the listener list, every later caller
//! observes "already disposed" and does nothing.
//!
//! ```
//! use ambient_scope::Scope;
//!
//! let outer = Scope::root();
//! let inner = Scope::child_of(&outer);
//! assert_eq!(inner.parent(), Some(outer.clone()));
//!
//! assert!(inner.dispose());
//! assert!(!inner.dispose());
//! assert!(inner.is_disposed());
//! ```

pub mod guard;
mod lineage;

pub use guard::ScopeGuard;
pub(crate) use lineage::Lineage;

use crate::tracing_compat::trace;
use crate::types::{ManagerId, ScopeId, SubscriptionId};
use core::fmt;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Listener notified when a scope is disposed.
pub trait DisposeListener: Send + Sync {
    /// Called exactly once, synchronously, by the call that disposed `scope`.
    fn on_dispose(&self, scope: &Scope);
}

impl<F> DisposeListener for F
where
    F: Fn(&Scope) + Send + Sync,
{
    fn on_dispose(&self, scope: &Scope) {
        self(scope);
    }
}

/// Registration key of a listener.
///
/// Manager registrations are keyed by the manager so that watching the same
/// scope twice replaces the earlier entry instead of adding a second one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerKey {
    Subscription(SubscriptionId),
    Manager(ManagerId),
}

struct ListenerEntry {
    key: ListenerKey,
    listener: Box<dyn DisposeListener>,
}

type Listeners = SmallVec<[ListenerEntry; 2]>;

struct ScopeState {
    id: ScopeId,
    /// Identity and weak link of the parent, fixed at construction.
    parent: Option<(ScopeId, Weak<ScopeState>)>,
    /// Manager whose `begin` created this scope, if any.
    origin: Option<ManagerId>,
    disposed: AtomicBool,
    /// Written together with `disposed` so that a subscriber observing a live
    /// scope under this lock is guaranteed to be drained by the disposer.
    listeners: Mutex<Listeners>,
}

/// A node in the scope tree.
///
/// `Scope` is a cheap handle: clones share identity, disposal state and
/// listeners. Equality and hashing follow identity. Dropping a handle never
/// disposes the scope; use [`Scope::dispose`] or a [`ScopeGuard`].
#[derive(Clone)]
pub struct Scope {
    state: Arc<ScopeState>,
}

impl Scope {
    /// Creates a root scope (no parent).
    #[must_use]
    pub fn root() -> Self {
        Self::create(None, None)
    }

    /// Creates a scope whose parent is `parent`.
    #[must_use]
    pub fn child_of(parent: &Self) -> Self {
        Self::create(Some(parent), None)
    }

    /// Creates a scope with an optional parent.
    #[must_use]
    pub fn new(parent: Option<&Self>) -> Self {
        Self::create(parent, None)
    }

    pub(crate) fn create(parent: Option<&Self>, origin: Option<ManagerId>) -> Self {
        Self {
            state: Arc::new(ScopeState {
                id: ScopeId::next(),
                parent: parent.map(|p| (p.id(), Arc::downgrade(&p.state))),
                origin,
                disposed: AtomicBool::new(false),
                listeners: Mutex::new(SmallVec::new()),
            }),
        }
    }

    /// Returns this scope's identity.
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.state.id
    }

    /// Returns the parent scope.
    ///
    /// The parent link does not keep the parent alive: once every handle to
    /// the parent has been dropped this returns `None`, even though
    /// [`parent_id`](Self::parent_id) still reports the recorded identity.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.state
            .parent
            .as_ref()
            .and_then(|(_, weak)| weak.upgrade())
            .map(|state| Self { state })
    }

    /// Returns the identity of the parent recorded at construction.
    #[must_use]
    pub fn parent_id(&self) -> Option<ScopeId> {
        self.state.parent.as_ref().map(|(id, _)| *id)
    }

    /// Returns true if this scope was created without a parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.state.parent.is_none()
    }

    /// Returns the manager whose `begin` created this scope.
    #[must_use]
    pub fn origin(&self) -> Option<ManagerId> {
        self.state.origin
    }

    /// Returns true once the scope has been disposed. Never resets.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::Acquire)
    }

    /// Iterates over reachable ancestors, nearest first.
    #[must_use]
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.parent(),
        }
    }

    /// Returns the nearest ancestor that is not disposed.
    ///
    /// Disposed ancestors are skipped; `None` means the chain is exhausted.
    #[must_use]
    pub fn nearest_live_ancestor(&self) -> Option<Self> {
        self.ancestors().find(|ancestor| !ancestor.is_disposed())
    }

    /// Disposes the scope.
    ///
    /// Returns true if this call performed the disposal (first caller wins).
    /// Listeners run synchronously on the calling flow, in subscription
    /// order, after the internal lock has been released. Later calls, and
    /// callers that lose a concurrent race, return false without notifying.
    #[allow(clippy::must_use_candidate)]
    pub fn dispose(&self) -> bool {
        let listeners = {
            let mut listeners = self.state.listeners.lock();
            if self.state.disposed.swap(true, Ordering::AcqRel) {
                return false;
            }
            std::mem::take(&mut *listeners)
        };

        trace!(
            scope = %self.id(),
            listeners = listeners.len(),
            "scope disposed"
        );

        // Notify without holding the lock to avoid reentrancy deadlocks.
        for entry in listeners {
            entry.listener.on_dispose(self);
        }
        true
    }

    /// Registers a listener for the disposal notification.
    ///
    /// Returns `None` without registering anything if the scope is already
    /// disposed: the one-shot notification has been delivered.
    pub fn on_dispose(&self, listener: impl DisposeListener + 'static) -> Option<SubscriptionId> {
        let id = SubscriptionId::next();
        self.register(ListenerKey::Subscription(id), Box::new(listener))
            .then_some(id)
    }

    /// Removes a listener registered with [`on_dispose`](Self::on_dispose).
    ///
    /// Returns true if the listener was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.remove(ListenerKey::Subscription(id))
    }

    /// Registers a manager's disposal handler, replacing any earlier
    /// registration by the same manager.
    pub(crate) fn watch(
        &self,
        manager: ManagerId,
        listener: impl DisposeListener + 'static,
    ) -> bool {
        let key = ListenerKey::Manager(manager);
        let mut listeners = self.state.listeners.lock();
        if self.is_disposed() {
            return false;
        }
        listeners.retain(|entry| entry.key != key);
        listeners.push(ListenerEntry {
            key,
            listener: Box::new(listener),
        });
        true
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.listeners.lock().len()
    }

    /// Wraps this scope in a guard that disposes it on drop.
    #[must_use]
    pub fn into_guard(self) -> ScopeGuard {
        ScopeGuard::new(self)
    }

    fn register(&self, key: ListenerKey, listener: Box<dyn DisposeListener>) -> bool {
        // Hold the listeners lock across the disposed check: dispose() sets
        // the flag under the same lock before draining.
        let mut listeners = self.state.listeners.lock();
        if self.is_disposed() {
            return false;
        }
        listeners.push(ListenerEntry { key, listener });
        true
    }

    fn remove(&self, key: ListenerKey) -> bool {
        let mut listeners = self.state.listeners.lock();
        let before = listeners.len();
        listeners.retain(|entry| entry.key != key);
        listeners.len() != before
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for Scope {}

impl Hash for Scope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("parent", &self.parent_id())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Iterator over the reachable ancestors of a scope, nearest first.
#[derive(Debug)]
pub struct Ancestors {
    next: Option<Scope>,
}

impl Iterator for Ancestors {
    type Item = Scope;

    fn next(&mut self) -> Option<Scope> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::sync::atomic::AtomicUsize;

    fn init_test(test_name: &str) {
        init_test_logging();
        crate::test_phase!(test_name);
    }

    #[test]
    fn root_has_no_parent() {
        init_test("root_has_no_parent");
        let root = Scope::root();
        assert!(root.is_root());
        assert!(root.parent().is_none());
        assert!(root.parent_id().is_none());
        assert!(!root.is_disposed());
        crate::test_complete!("root_has_no_parent");
    }

    #[test]
    fn child_links_to_parent() {
        init_test("child_links_to_parent");
        let parent = Scope::root();
        let child = Scope::child_of(&parent);
        assert_eq!(child.parent(), Some(parent.clone()));
        assert_eq!(child.parent_id(), Some(parent.id()));
        assert!(!child.is_root());
        assert_ne!(child, parent);
        crate::test_complete!("child_links_to_parent");
    }

    #[test]
    fn clones_share_identity() {
        init_test("clones_share_identity");
        let scope = Scope::root();
        let clone = scope.clone();
        assert_eq!(scope, clone);
        assert_eq!(scope.id(), clone.id());
        scope.dispose();
        assert!(clone.is_disposed());
        crate::test_complete!("clones_share_identity");
    }

    #[test]
    fn dispose_is_idempotent() {
        init_test("dispose_is_idempotent");
        let scope = Scope::root();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        scope
            .on_dispose(move |_: &Scope| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .expect("live scope accepts listeners");

        assert!(scope.dispose());
        assert!(!scope.dispose());
        assert!(scope.is_disposed());
        let fired = count.load(Ordering::SeqCst);
        crate::assert_with_log!(fired == 1, "listener fires once", 1, fired);
        crate::test_complete!("dispose_is_idempotent");
    }

    #[test]
    fn listeners_fire_in_subscription_order() {
        init_test("listeners_fire_in_subscription_order");
        let scope = Scope::root();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let order = Arc::clone(&order);
            scope.on_dispose(move |_: &Scope| order.lock().push(i));
        }
        scope.dispose();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
        crate::test_complete!("listeners_fire_in_subscription_order");
    }

    #[test]
    fn listener_receives_disposed_scope() {
        init_test("listener_receives_disposed_scope");
        let scope = Scope::root();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        scope.on_dispose(move |s: &Scope| {
            *seen_clone.lock() = Some((s.id(), s.is_disposed()));
        });
        scope.dispose();
        assert_eq!(*seen.lock(), Some((scope.id(), true)));
        crate::test_complete!("listener_receives_disposed_scope");
    }

    #[test]
    fn unsubscribe_removes_listener() {
        init_test("unsubscribe_removes_listener");
        let scope = Scope::root();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let id = scope
            .on_dispose(move |_: &Scope| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .expect("registered");
        assert!(scope.unsubscribe(id));
        assert!(!scope.unsubscribe(id));
        scope.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        crate::test_complete!("unsubscribe_removes_listener");
    }

    #[test]
    fn subscribing_after_disposal_registers_nothing() {
        init_test("subscribing_after_disposal_registers_nothing");
        let scope = Scope::root();
        scope.dispose();
        assert!(scope.on_dispose(|_: &Scope| {}).is_none());
        assert_eq!(scope.listener_count(), 0);
        crate::test_complete!("subscribing_after_disposal_registers_nothing");
    }

    #[test]
    fn watch_replaces_previous_registration() {
        init_test("watch_replaces_previous_registration");
        let scope = Scope::root();
        let manager = ManagerId::next();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            assert!(scope.watch(manager, move |_: &Scope| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(scope.listener_count(), 1);
        scope.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        crate::test_complete!("watch_replaces_previous_registration");
    }

    #[test]
    fn nearest_live_ancestor_skips_disposed() {
        init_test("nearest_live_ancestor_skips_disposed");
        let a = Scope::root();
        let b = Scope::child_of(&a);
        let c = Scope::child_of(&b);
        let d = Scope::child_of(&c);

        assert_eq!(d.nearest_live_ancestor(), Some(c.clone()));
        c.dispose();
        b.dispose();
        assert_eq!(d.nearest_live_ancestor(), Some(a.clone()));
        a.dispose();
        assert_eq!(d.nearest_live_ancestor(), None);
        crate::test_complete!("nearest_live_ancestor_skips_disposed");
    }

    #[test]
    fn parent_link_does_not_keep_parent_alive() {
        init_test("parent_link_does_not_keep_parent_alive");
        let parent = Scope::root();
        let parent_id = parent.id();
        let child = Scope::child_of(&parent);
        drop(parent);
        assert!(child.parent().is_none());
        assert_eq!(child.parent_id(), Some(parent_id));
        assert_eq!(child.ancestors().count(), 0);
        crate::test_complete!("parent_link_does_not_keep_parent_alive");
    }

    #[test]
    fn ancestors_are_nearest_first() {
        init_test("ancestors_are_nearest_first");
        let a = Scope::root();
        let b = Scope::child_of(&a);
        let c = Scope::child_of(&b);
        let ids: Vec<_> = c.ancestors().map(|s| s.id()).collect();
        assert_eq!(ids, vec![b.id(), a.id()]);
        crate::test_complete!("ancestors_are_nearest_first");
    }

    #[test]
    fn concurrent_dispose_has_one_winner() {
        init_test("concurrent_dispose_has_one_winner");
        let scope = Scope::root();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        scope.on_dispose(move |_: &Scope| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let scope = scope.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    scope.dispose()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("dispose thread panicked"))
            .filter(|won| *won)
            .count();

        crate::assert_with_log!(winners == 1, "exactly one winner", 1, winners);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        crate::test_complete!("concurrent_dispose_has_one_winner");
    }
}
