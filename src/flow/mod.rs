//! Flow-local propagation of current scopes.
//!
//! A *flow* is a logical thread of control: a plain OS thread, or an async
//! task across all of its suspension points. Each flow sees its own table of
//! current scopes (one entry per [`ScopeManager`](crate::ScopeManager)).
//!
//! # Propagation Contract
//!
//! - A child flow starts with a copy of its parent's table as of the fork.
//! - Writes made in a child (`begin`, `set_current`) are visible only to the
//!   child and to flows it forks later.
//! - Writes never leak back to the parent or across to siblings.
//!
//! Rust has no ambient async-local storage, so every concurrency boundary
//! must carry the table explicitly. Use [`spawn_thread`] for threads,
//! [`fork`] for futures handed to any executor, and [`fork_fn`] for jobs
//! submitted to a thread pool. A future spawned without [`fork`] runs with
//! whatever table the worker thread happens to hold, which breaks isolation.
//!
//! ```
//! use ambient_scope::{flow, ScopeManager};
//!
//! let manager = ScopeManager::new();
//! let parent = manager.begin();
//!
//! let worker = manager.clone();
//! let child = flow::spawn_thread(move || {
//!     let inherited = worker.current();
//!     let nested = worker.begin();
//!     (inherited, nested)
//! })
//! .join()
//! .unwrap();
//!
//! assert_eq!(child.0.as_ref(), Some(&parent));
//! assert_eq!(child.1.parent().as_ref(), Some(&parent));
//! assert_eq!(manager.current().as_ref(), Some(&parent));
//! ```

mod future;
pub(crate) mod local;

pub use future::InFlow;
pub use local::FlowSnapshot;

use std::future::Future;
use std::thread::JoinHandle;

/// Binds `future` to a copy of the calling flow.
///
/// Pass the result to an executor's spawn function to start a child task.
pub fn fork<F: Future>(future: F) -> InFlow<F> {
    FlowSnapshot::capture().bind(future)
}

/// Wraps `f` so that it runs in a copy of the calling flow, wherever it is
/// eventually executed.
pub fn fork_fn<F, R>(f: F) -> impl FnOnce() -> R
where
    F: FnOnce() -> R,
{
    let snapshot = FlowSnapshot::capture();
    move || snapshot.run(f)
}

/// Spawns an OS thread that starts with a copy of the calling flow.
pub fn spawn_thread<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::spawn(fork_fn(f))
}
