//! Strong ancestor chains held by flow slots.

use super::Scope;
use core::fmt;
use std::sync::Arc;

/// A scope together with owning handles on the ancestors it was installed
/// with.
///
/// A scope's own parent link is weak. The flow slot that makes a scope
/// current holds its lineage instead, so an ancestor stays reachable for
/// promotion while any flow still has a descendant current, even after
/// the caller dropped every handle to it.
pub(crate) struct Lineage {
    scope: Scope,
    parent: Option<Arc<Lineage>>,
}

impl Lineage {
    /// Links `scope` under an existing lineage.
    ///
    /// `parent` must be the lineage of `scope`'s parent.
    pub(crate) fn child(scope: Scope, parent: Option<Arc<Self>>) -> Arc<Self> {
        debug_assert_eq!(
            scope.parent_id(),
            parent.as_ref().map(|p| p.scope.id()),
            "lineage parent does not match the scope's parent"
        );
        Arc::new(Self { scope, parent })
    }

    /// Builds a lineage from the parent links still reachable from `scope`.
    pub(crate) fn of(scope: Scope) -> Arc<Self> {
        let mut ancestors: Vec<Scope> = scope.ancestors().collect();
        let mut parent = None;
        while let Some(ancestor) = ancestors.pop() {
            parent = Some(Arc::new(Self {
                scope: ancestor,
                parent,
            }));
        }
        Arc::new(Self { scope, parent })
    }

    /// Returns the node for `scope` inside `within` if there is one, and a
    /// freshly built lineage otherwise.
    pub(crate) fn resolve(scope: Scope, within: Option<&Arc<Self>>) -> Arc<Self> {
        within
            .and_then(|lineage| lineage.find(&scope))
            .unwrap_or_else(|| Self::of(scope))
    }

    pub(crate) fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Nearest node above this one whose scope is not disposed.
    pub(crate) fn nearest_live_ancestor(&self) -> Option<Arc<Self>> {
        let mut next = self.parent.clone();
        while let Some(node) = next {
            if !node.scope.is_disposed() {
                return Some(node);
            }
            next = node.parent.clone();
        }
        None
    }

    fn find(self: &Arc<Self>, scope: &Scope) -> Option<Arc<Self>> {
        let mut next = Some(Arc::clone(self));
        while let Some(node) = next {
            if node.scope == *scope {
                return Some(node);
            }
            next = node.parent.clone();
        }
        None
    }
}

impl fmt::Debug for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        list.entry(&self.scope.id());
        let mut next = self.parent.as_deref();
        while let Some(node) = next {
            list.entry(&node.scope.id());
            next = node.parent.as_deref();
        }
        list.finish()
    }
}
