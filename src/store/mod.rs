//! Storage seam for test requests.
//!
//! The engine holds no in-memory shared state; every request lives behind
//! [`RequestStore`]. Implementations own serialization of concurrent writers:
//! `persist` is a compare-and-set on the request's prior status, so two
//! conflicting transitions on the same request resolve to exactly one success.

use async_trait::async_trait;

use crate::error::Result;
use crate::request::{
    AnyRequest, CreateTestRequest, Initiated, RequestId, RequestState, RequestStatus, TestRequest,
};
use crate::users::UserId;

pub mod memory;

pub use memory::MemoryStore;

/// Storage trait for persisting and querying test requests.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Create a new request in the `Initiated` state, assigning its id.
    ///
    /// The input is expected to be validated by the caller.
    async fn create(
        &self,
        requester: UserId,
        input: CreateTestRequest,
    ) -> Result<TestRequest<Initiated>>;

    /// Load a request by id.
    ///
    /// # Errors
    /// `NotFound` if no request with that id exists.
    async fn get(&self, id: RequestId) -> Result<AnyRequest>;

    /// All requests currently in the given status, ordered by id.
    ///
    /// Finite and repeatable; each call is an independent snapshot.
    async fn find_by_status(&self, status: RequestStatus) -> Result<Vec<AnyRequest>>;

    /// All requests raised by the given user, ordered by id.
    async fn find_by_requester(&self, requester: UserId) -> Result<Vec<AnyRequest>>;

    /// Replace the stored request, provided its status still equals
    /// `expected`.
    ///
    /// # Errors
    /// `NotFound` if the request vanished, `Conflict` if another transition
    /// got there first. On error nothing is written.
    async fn persist<S: RequestState + Clone>(
        &self,
        expected: RequestStatus,
        request: &TestRequest<S>,
    ) -> Result<()>
    where
        AnyRequest: From<TestRequest<S>>;
}
