//! # Token Rotator Library
//!
//! Keeps issuer sessions alive for a set of configured credentials: each
//! credential gets a worker that fetches a fresh token shortly before the
//! current one expires and persists it to a shared store.
//!
//! Modules:
//! - `config`: YAML configuration, env expansion and validation
//! - `catalog`: credentials expanded from account sections
//! - `provider`: HTTP issuing exchange
//! - `store`: memory and redis token stores
//! - `scheduler`: startup planning, refresh workers, coordinator

pub mod catalog;
pub mod config;
pub mod error;
pub mod helpers;
pub mod observability;
pub mod provider;
pub mod resilience;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod tests;
pub mod utils;

pub use crate::config::types::ServiceConfig;
pub use crate::error::{ConfigurationError, IssuerError, StoreError};
pub use crate::scheduler::SchedulerCoordinator;
