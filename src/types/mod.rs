//! Core identifier types.
//!
//! - [`id`]: Identifier types (`ScopeId`, `ManagerId`, `SubscriptionId`)

pub mod id;

pub use id::{ManagerId, ScopeId, SubscriptionId};
