//! Role-gated boundary service over the transition engine.
//!
//! One operation here is one unit of work: check the capability table, load
//! the aggregate, hand it to the typed transition, return the updated
//! snapshot. Authorization lives only at this layer; status and payload
//! preconditions are enforced again inside the engine regardless of what this
//! layer checked.

use metrics::counter;

use crate::error::{CovtrackError, Result};
use crate::request::{
    AnyRequest, CreateConsultation, CreateLabResult, CreateTestRequest, DoctorSuggestion,
    RequestId, RequestStatus,
};
use crate::store::RequestStore;
use crate::users::{Operation, User, UserId, authorize};

/// Entry point collaborators call per workflow operation.
pub struct WorkflowService<S> {
    store: S,
}

impl<S: RequestStore> WorkflowService<S> {
    pub fn new(store: S) -> Self {
        WorkflowService { store }
    }

    /// The underlying store, for embedders that wire queries elsewhere.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Raise a new test request on behalf of the acting patient.
    ///
    /// A patient can have at most one request open at a time; creation is
    /// refused while an earlier request has not reached `Completed`.
    #[tracing::instrument(skip(self, input, user), fields(user = %user.id))]
    pub async fn create_request(
        &self,
        input: CreateTestRequest,
        user: &User,
    ) -> Result<AnyRequest> {
        authorize(user, Operation::CreateRequest)?;
        input.validate()?;
        let has_open_request = self
            .store
            .find_by_requester(user.id)
            .await?
            .iter()
            .any(|r| !r.is_terminal());
        if has_open_request {
            return Err(CovtrackError::Validation(
                "a test request is already in progress for this user".into(),
            ));
        }
        let request = self.store.create(user.id, input).await?;
        counter!("covtrack_requests_created_total").increment(1);
        tracing::info!(request_id = %request.details.id, "Test request created");
        Ok(request.into())
    }

    /// Claim an `Initiated` request for lab testing as the acting tester.
    #[tracing::instrument(skip(self, user), fields(request_id = %id, user = %user.id))]
    pub async fn assign_for_lab_test(&self, id: RequestId, user: &User) -> Result<AnyRequest> {
        authorize(user, Operation::AssignForLabTest)?;
        let any = self.store.get(id).await?;
        let actual = any.status();
        let Some(request) = any.into_initiated() else {
            return Err(wrong_status(id, actual, RequestStatus::Initiated));
        };
        let request = request.assign_for_lab_test(user.id, &self.store).await?;
        Ok(request.into())
    }

    /// Record the lab result for a request the lab is working on.
    #[tracing::instrument(skip(self, payload, user), fields(request_id = %id, user = %user.id))]
    pub async fn update_lab_test(
        &self,
        id: RequestId,
        payload: CreateLabResult,
        user: &User,
    ) -> Result<AnyRequest> {
        authorize(user, Operation::UpdateLabTest)?;
        let any = self.store.get(id).await?;
        let actual = any.status();
        let Some(request) = any.into_lab_test_in_progress() else {
            return Err(wrong_status(id, actual, RequestStatus::LabTestInProgress));
        };
        let request = request.complete_lab_test(payload, &self.store).await?;
        Ok(request.into())
    }

    /// Replace an already-recorded lab result before a doctor picks the
    /// request up.
    #[tracing::instrument(skip(self, payload, user), fields(request_id = %id, user = %user.id))]
    pub async fn revise_lab_result(
        &self,
        id: RequestId,
        payload: CreateLabResult,
        user: &User,
    ) -> Result<AnyRequest> {
        authorize(user, Operation::UpdateLabTest)?;
        let any = self.store.get(id).await?;
        let actual = any.status();
        let Some(request) = any.into_lab_test_completed() else {
            return Err(wrong_status(id, actual, RequestStatus::LabTestCompleted));
        };
        let request = request.revise_lab_result(payload, &self.store).await?;
        Ok(request.into())
    }

    /// Claim a lab-completed request for consultation as the acting doctor.
    #[tracing::instrument(skip(self, user), fields(request_id = %id, user = %user.id))]
    pub async fn assign_for_consultation(&self, id: RequestId, user: &User) -> Result<AnyRequest> {
        authorize(user, Operation::AssignForConsultation)?;
        let any = self.store.get(id).await?;
        let actual = any.status();
        let Some(request) = any.into_lab_test_completed() else {
            return Err(wrong_status(id, actual, RequestStatus::LabTestCompleted));
        };
        let request = request.assign_for_consultation(user.id, &self.store).await?;
        Ok(request.into())
    }

    /// Record the consultation and close the request.
    #[tracing::instrument(skip(self, payload, user), fields(request_id = %id, user = %user.id))]
    pub async fn update_consultation(
        &self,
        id: RequestId,
        payload: CreateConsultation,
        user: &User,
    ) -> Result<AnyRequest> {
        authorize(user, Operation::UpdateConsultation)?;
        let any = self.store.get(id).await?;
        let actual = any.status();
        let Some(request) = any.into_diagnosis_in_process() else {
            return Err(wrong_status(id, actual, RequestStatus::DiagnosisInProcess));
        };
        let request = request.complete_consultation(payload, &self.store).await?;
        Ok(request.into())
    }

    /// Advisory consultation pre-fill derived from the lab result.
    ///
    /// Positive ⇒ home quarantine, negative ⇒ no issues. Purely advisory: the
    /// payload submitted to [`Self::update_consultation`] is authoritative.
    pub async fn advisory_suggestion(&self, id: RequestId) -> Result<DoctorSuggestion> {
        let any = self.store.get(id).await?;
        match any.lab_result() {
            Some(lab_result) => Ok(DoctorSuggestion::advisory_for(lab_result.result)),
            None => Err(wrong_status(id, any.status(), RequestStatus::LabTestCompleted)),
        }
    }

    /// Load a request snapshot by id.
    pub async fn request_by_id(&self, id: RequestId) -> Result<AnyRequest> {
        self.store.get(id).await
    }

    /// Requests currently in the given status, for per-role work queues.
    pub async fn find_by_status(&self, status: RequestStatus) -> Result<Vec<AnyRequest>> {
        self.store.find_by_status(status).await
    }

    /// Requests raised by the given user.
    pub async fn find_by_requester(&self, requester: UserId) -> Result<Vec<AnyRequest>> {
        self.store.find_by_requester(requester).await
    }
}

fn wrong_status(id: RequestId, actual: RequestStatus, expected: RequestStatus) -> CovtrackError {
    counter!("covtrack_transitions_rejected_total", "reason" => "invalid_state").increment(1);
    tracing::warn!(
        request_id = %id,
        actual = %actual,
        expected = %expected,
        "Operation not legal in current status"
    );
    CovtrackError::InvalidState(id, actual, expected)
}
