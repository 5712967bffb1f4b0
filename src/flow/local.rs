//! Thread-local storage for the current flow's scope table.
//!
//! Each OS thread holds one table mapping a manager to the scope that is
//! current for that manager. Futures wrapped in [`InFlow`](super::InFlow)
//! carry their own table and swap it in only while they are being polled,
//! so the table a piece of code observes is always the one of the logical
//! flow it belongs to.
//!
//! Slots are keyed by a weak handle on their manager. Slots whose manager
//! has been dropped are pruned whenever the table is written or captured.

use crate::scope::{Lineage, Scope};
use crate::types::ManagerId;
use core::fmt;
use smallvec::SmallVec;
use std::any::Any;
use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use super::InFlow;

/// Weak handle on whatever owns a slot. The slot is dead once it expires.
pub(crate) type Owner = Weak<dyn Any + Send + Sync>;

/// Identity and liveness of the manager a slot belongs to.
#[derive(Clone)]
pub(crate) struct SlotKey {
    id: ManagerId,
    owner: Owner,
}

impl SlotKey {
    pub(crate) fn new(id: ManagerId, owner: Owner) -> Self {
        Self { id, owner }
    }

    pub(crate) fn id(&self) -> ManagerId {
        self.id
    }

    fn is_live(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

impl fmt::Debug for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotKey")
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct Slot {
    key: SlotKey,
    lineage: Arc<Lineage>,
}

/// Scope table of one flow. Most processes run a single manager.
pub(crate) type Slots = SmallVec<[Slot; 2]>;

thread_local! {
    /// Table of the flow currently running on this thread.
    static FLOW: RefCell<Slots> = RefCell::new(SmallVec::new());
}

/// Returns the lineage current for `manager` in the running flow.
pub(crate) fn get(manager: ManagerId) -> Option<Arc<Lineage>> {
    FLOW.try_with(|slots| lookup(&slots.borrow(), manager))
        .ok()
        .flatten()
}

/// Replaces the lineage current for `key`, returning the previous value.
///
/// The previous value, and any pruned slot, is dropped outside the
/// `RefCell` borrow.
pub(crate) fn replace(key: &SlotKey, lineage: Option<Arc<Lineage>>) -> Option<Arc<Lineage>> {
    let outcome = FLOW.try_with(|slots| {
        let mut slots = slots.borrow_mut();
        let pruned = prune(&mut slots);
        (replace_in(&mut slots, key, lineage), pruned)
    });
    match outcome {
        Ok((previous, _pruned)) => previous,
        Err(_) => None,
    }
}

/// Replaces the value for `key` only if its scope is still `expected`.
///
/// Returns true if the swap happened.
pub(crate) fn compare_and_replace(
    key: &SlotKey,
    expected: &Scope,
    replacement: Option<Arc<Lineage>>,
) -> bool {
    let outcome = FLOW.try_with(|slots| {
        let mut slots = slots.borrow_mut();
        let matches = lookup_ref(&slots, key.id()).is_some_and(|current| current.scope() == expected);
        if matches {
            (true, replace_in(&mut slots, key, replacement))
        } else {
            (false, None)
        }
    });
    match outcome {
        Ok((swapped, _evicted)) => swapped,
        Err(_) => false,
    }
}

fn swap(slots: Slots) -> Slots {
    FLOW.try_with(|cell| std::mem::replace(&mut *cell.borrow_mut(), slots))
        .unwrap_or_default()
}

/// Removes slots whose manager is gone and hands them back for dropping.
fn prune(slots: &mut Slots) -> Slots {
    if slots.iter().all(|slot| slot.key.is_live()) {
        return Slots::new();
    }
    let (live, dead): (Slots, Slots) = std::mem::take(slots)
        .into_iter()
        .partition(|slot| slot.key.is_live());
    *slots = live;
    dead
}

fn lookup_ref(slots: &Slots, manager: ManagerId) -> Option<&Arc<Lineage>> {
    slots
        .iter()
        .find(|slot| slot.key.id() == manager)
        .map(|slot| &slot.lineage)
}

fn lookup(slots: &Slots, manager: ManagerId) -> Option<Arc<Lineage>> {
    lookup_ref(slots, manager).cloned()
}

fn replace_in(
    slots: &mut Slots,
    key: &SlotKey,
    lineage: Option<Arc<Lineage>>,
) -> Option<Arc<Lineage>> {
    let position = slots.iter().position(|slot| slot.key.id() == key.id());
    match (position, lineage) {
        (Some(i), Some(lineage)) => Some(std::mem::replace(&mut slots[i].lineage, lineage)),
        (Some(i), None) => Some(slots.remove(i).lineage),
        (None, Some(lineage)) => {
            slots.push(Slot {
                key: key.clone(),
                lineage,
            });
            None
        }
        (None, None) => None,
    }
}

/// A copy of a flow's scope table, taken at a fork point.
///
/// Handing a snapshot to a child flow (a thread, a task, a pool job) gives
/// the child the parent's current scopes as of the fork. Whatever the child
/// does afterwards stays in the child.
#[derive(Clone, Default)]
pub struct FlowSnapshot {
    slots: Slots,
}

impl FlowSnapshot {
    /// Captures the running flow's table.
    ///
    /// Slots of dropped managers are pruned from the running flow first and
    /// never copied.
    #[must_use]
    pub fn capture() -> Self {
        let outcome = FLOW.try_with(|slots| {
            let mut slots = slots.borrow_mut();
            let pruned = prune(&mut slots);
            (slots.clone(), pruned)
        });
        match outcome {
            Ok((slots, _pruned)) => Self { slots },
            Err(_) => Self::default(),
        }
    }

    /// A snapshot with no current scopes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the scope recorded for `manager`.
    #[must_use]
    pub fn get(&self, manager: ManagerId) -> Option<Scope> {
        lookup_ref(&self.slots, manager).map(|lineage| lineage.scope().clone())
    }

    /// Returns the number of managers with a current scope in this snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no manager has a current scope in this snapshot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Overrides the value recorded for `key`.
    #[must_use]
    pub(crate) fn with_lineage(mut self, key: &SlotKey, lineage: Option<Arc<Lineage>>) -> Self {
        let _evicted = replace_in(&mut self.slots, key, lineage);
        self
    }

    /// Installs this snapshot as the running flow until the guard drops.
    ///
    /// Guards are only created in strictly nested pairs (by [`run`](Self::run)
    /// and by each [`InFlow`] poll), so they always unwind in stack order.
    pub(crate) fn enter(self) -> FlowGuard {
        FlowGuard::install(self.slots)
    }

    /// Runs `f` as a flow seeded with this snapshot.
    ///
    /// The caller's table is restored afterwards, also if `f` panics.
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    /// Binds `future` to a flow seeded with this snapshot.
    pub fn bind<F: Future>(self, future: F) -> InFlow<F> {
        InFlow::new(future, self.slots)
    }
}

impl fmt::Debug for FlowSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.slots
                    .iter()
                    .map(|slot| (slot.key.id(), slot.lineage.scope().id())),
            )
            .finish()
    }
}

/// Restores the previous flow table on drop.
///
/// The guard is tied to the thread whose table it replaced and is therefore
/// neither `Send` nor `Sync`.
#[must_use = "the previous flow is restored when the guard drops"]
pub(crate) struct FlowGuard {
    prev: Option<Slots>,
    _not_send: PhantomData<*const ()>,
}

impl FlowGuard {
    pub(crate) fn install(slots: Slots) -> Self {
        let prev = swap(slots);
        Self {
            prev: Some(prev),
            _not_send: PhantomData,
        }
    }

    /// Restores the previous table and returns the one that was installed,
    /// including any writes made while it was active.
    pub(crate) fn finish(mut self) -> Slots {
        let prev = self.prev.take().unwrap_or_default();
        swap(prev)
    }
}

impl Drop for FlowGuard {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            let _installed = swap(prev);
        }
    }
}

impl fmt::Debug for FlowGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowGuard").finish_non_exhaustive()
    }
}
