//! In-memory reference implementation of [`RequestStore`].
//!
//! Intended for tests and single-process embedders; a database-backed
//! implementation replaces it at the deployment boundary. The whole map sits
//! behind one mutex, which makes the compare-and-set in `persist` atomic.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;

use async_trait::async_trait;

use crate::error::{CovtrackError, Result};
use crate::request::{
    AnyRequest, CreateTestRequest, Initiated, PatientDetails, RequestId, RequestState,
    RequestStatus, TestRequest,
};
use crate::users::UserId;

use super::RequestStore;

/// In-memory request store.
pub struct MemoryStore {
    requests: Mutex<BTreeMap<RequestId, AnyRequest>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            requests: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of requests held, across all statuses.
    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn create(
        &self,
        requester: UserId,
        input: CreateTestRequest,
    ) -> Result<TestRequest<Initiated>> {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = TestRequest {
            state: Initiated,
            details: PatientDetails {
                id,
                requester,
                name: input.name,
                age: input.age,
                gender: input.gender,
                address: input.address,
                pincode: input.pincode,
                phone_number: input.phone_number,
                email: input.email,
                created_at: Utc::now(),
            },
        };
        self.requests
            .lock()
            .insert(id, AnyRequest::from(request.clone()));
        tracing::debug!(request_id = %id, "Stored new test request");
        Ok(request)
    }

    async fn get(&self, id: RequestId) -> Result<AnyRequest> {
        self.requests
            .lock()
            .get(&id)
            .cloned()
            .ok_or(CovtrackError::NotFound(id))
    }

    async fn find_by_status(&self, status: RequestStatus) -> Result<Vec<AnyRequest>> {
        Ok(self
            .requests
            .lock()
            .values()
            .filter(|r| r.status() == status)
            .cloned()
            .collect())
    }

    async fn find_by_requester(&self, requester: UserId) -> Result<Vec<AnyRequest>> {
        Ok(self
            .requests
            .lock()
            .values()
            .filter(|r| r.details().requester == requester)
            .cloned()
            .collect())
    }

    async fn persist<S: RequestState + Clone>(
        &self,
        expected: RequestStatus,
        request: &TestRequest<S>,
    ) -> Result<()>
    where
        AnyRequest: From<TestRequest<S>>,
    {
        let id = request.details.id;
        let mut requests = self.requests.lock();
        let current = requests.get(&id).ok_or(CovtrackError::NotFound(id))?;
        if current.status() != expected {
            tracing::warn!(
                request_id = %id,
                stored = %current.status(),
                expected = %expected,
                "Persist rejected, request changed concurrently"
            );
            return Err(CovtrackError::Conflict(id));
        }
        requests.insert(id, AnyRequest::from(request.clone()));
        Ok(())
    }
}
