//! Role-gated lifecycle engine for COVID test requests.
//!
//! A test request moves through a fixed pipeline: a patient raises it, a
//! tester collects the sample and records the lab result, and a doctor closes
//! it with a consultation. This crate implements the lifecycle state machine,
//! the role gate in front of it, and the queries that drive per-role work
//! queues.
//!
//! The lifecycle is encoded with the typestate pattern ([`request::types`]),
//! so a request can only carry the sub-records its status implies and
//! out-of-order transitions do not typecheck. Persistence is a collaborator
//! behind the [`RequestStore`] trait; identity is whatever hands a [`User`]
//! to the [`WorkflowService`] operations.

pub mod error;
pub mod request;
pub mod service;
pub mod store;
pub mod users;

// Re-export commonly used types
pub use error::{CovtrackError, Result};
pub use request::*;
pub use service::WorkflowService;
pub use store::{MemoryStore, RequestStore};
pub use users::{Operation, Role, User, UserId, authorize};
