//! Vela Core
//!
//! Provider contract for declarative infrastructure management: attribute
//! values and schemas, the Provider trait, per-attribute change detection,
//! and the status-polling helpers that CRUD handlers parameterize.

pub mod differ;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod waiter;
