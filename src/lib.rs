//! Ambient scope tracking.
//!
//! # Overview
//!
//! A [`Scope`] is a lifetime boundary: a node in a parent-linked tree that is
//! disposed exactly once and notifies its listeners when it is. A
//! [`ScopeManager`] remembers which scope is *current* in each logical flow
//! of execution, so code deep in a call chain can find it without threading
//! it through every signature.
//!
//! # Core Guarantees
//!
//! - **Nesting**: [`ScopeManager::begin`] creates a child of the current scope
//!   and makes it current
//! - **Promotion on dispose**: disposing the current scope makes its nearest
//!   live ancestor current, skipping ancestors that were disposed out of order
//! - **Flow isolation**: a change made in one flow is never observed by
//!   another flow; forked flows inherit the value current at the fork and
//!   diverge afterwards
//! - **Panic-safe grafting**: [`ScopeManager::execute_in_scope`] restores the
//!   previous value on every exit path
//! - **No stale reads**: a non-empty current value always refers to a live
//!   scope
//!
//! # Module Structure
//!
//! - [`scope`]: The scope tree, disposal and listeners
//! - [`manager`]: The scope manager and its configuration
//! - [`flow`]: Flow-local storage and propagation across threads and futures
//! - [`types`]: Identifiers
//! - [`error`]: Configuration errors
//! - [`tracing_compat`]: Logging facade over the optional `tracing` dependency
//!
//! # Example
//!
//! ```
//! use ambient_scope::ScopeManager;
//!
//! let manager = ScopeManager::new();
//! let request = manager.begin();
//! {
//!     let unit_of_work = manager.begin_guarded();
//!     assert_eq!(manager.current().as_ref(), Some(&*unit_of_work));
//! }
//! assert_eq!(manager.current().as_ref(), Some(&request));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod error;
pub mod flow;
pub mod manager;
pub mod scope;
pub mod tracing_compat;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{ConfigError, ConfigResult};
pub use flow::{FlowSnapshot, InFlow};
pub use manager::{ManagerConfig, ScopeManager, ScopeManagerBuilder};
pub use scope::{Ancestors, DisposeListener, Scope, ScopeGuard};
pub use types::{ManagerId, ScopeId, SubscriptionId};
