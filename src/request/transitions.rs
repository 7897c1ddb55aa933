//! State transitions for test requests using the typestate pattern.
//!
//! Each transition is a method on the state it starts from and returns the
//! request in its successor state, so an out-of-order transition is a compile
//! error rather than a runtime check:
//!
//! ```text
//! TestRequest<Initiated> ──assign_for_lab_test()──> TestRequest<LabTestInProgress>
//!                                                          │
//!                                     complete_lab_test()  │
//!                                                          v
//!                        ┌─revise_lab_result()─┐ TestRequest<LabTestCompleted>
//!                        └────────────────────>┘          │
//!                                 assign_for_consultation()│
//!                                                          v
//!                                               TestRequest<DiagnosisInProcess>
//!                                                          │
//!                                   complete_consultation()│
//!                                                          v
//!                                               TestRequest<Completed>
//! ```
//!
//! Every transition persists through [`RequestStore::persist`], a
//! compare-and-set on the predecessor status. Two racing transitions on the
//! same request therefore resolve to exactly one success; the loser observes a
//! conflict and the stored aggregate is left exactly as loaded. Payloads are
//! validated before any successor state is built, so a rejected payload never
//! leaves partial fields behind.

use chrono::Utc;
use metrics::counter;

use crate::error::Result;
use crate::store::RequestStore;
use crate::users::UserId;

use super::types::{
    Completed, Consultation, CreateConsultation, CreateLabResult, DiagnosisInProcess,
    DoctorSuggestion, Initiated, LabTestCompleted, LabTestInProgress, RequestStatus, TestRequest,
};

impl TestRequest<Initiated> {
    /// Hand the request to a tester for sample collection.
    pub async fn assign_for_lab_test<S: RequestStore + ?Sized>(
        self,
        tester: UserId,
        store: &S,
    ) -> Result<TestRequest<LabTestInProgress>> {
        let request = TestRequest {
            details: self.details,
            state: LabTestInProgress {
                tester,
                assigned_at: Utc::now(),
            },
        };
        store.persist(RequestStatus::Initiated, &request).await?;
        counter!("covtrack_transitions_total", "operation" => "assign_for_lab_test").increment(1);
        tracing::info!(
            request_id = %request.details.id,
            tester = %tester,
            "Request assigned for lab test"
        );
        Ok(request)
    }
}

impl TestRequest<LabTestInProgress> {
    /// Record the lab result and complete the lab stage.
    pub async fn complete_lab_test<S: RequestStore + ?Sized>(
        self,
        payload: CreateLabResult,
        store: &S,
    ) -> Result<TestRequest<LabTestCompleted>> {
        let lab_result = payload.into_record(Utc::now())?;
        let request = TestRequest {
            details: self.details,
            state: LabTestCompleted {
                tester: self.state.tester,
                lab_result,
                completed_at: Utc::now(),
            },
        };
        store
            .persist(RequestStatus::LabTestInProgress, &request)
            .await?;
        counter!("covtrack_transitions_total", "operation" => "update_lab_test").increment(1);
        tracing::info!(
            request_id = %request.details.id,
            result = ?request.state.lab_result.result,
            "Lab test completed"
        );
        Ok(request)
    }
}

impl TestRequest<LabTestCompleted> {
    /// Replace the recorded lab result while no doctor has picked the request
    /// up yet. The status does not change.
    pub async fn revise_lab_result<S: RequestStore + ?Sized>(
        self,
        payload: CreateLabResult,
        store: &S,
    ) -> Result<TestRequest<LabTestCompleted>> {
        let lab_result = payload.into_record(Utc::now())?;
        let request = TestRequest {
            details: self.details,
            state: LabTestCompleted {
                tester: self.state.tester,
                lab_result,
                completed_at: self.state.completed_at,
            },
        };
        store
            .persist(RequestStatus::LabTestCompleted, &request)
            .await?;
        tracing::info!(
            request_id = %request.details.id,
            result = ?request.state.lab_result.result,
            "Lab result revised"
        );
        Ok(request)
    }

    /// Hand the request to a doctor for consultation.
    pub async fn assign_for_consultation<S: RequestStore + ?Sized>(
        self,
        doctor: UserId,
        store: &S,
    ) -> Result<TestRequest<DiagnosisInProcess>> {
        let request = TestRequest {
            details: self.details,
            state: DiagnosisInProcess {
                tester: self.state.tester,
                lab_result: self.state.lab_result,
                doctor,
                assigned_at: Utc::now(),
            },
        };
        store
            .persist(RequestStatus::LabTestCompleted, &request)
            .await?;
        counter!("covtrack_transitions_total", "operation" => "assign_for_consultation")
            .increment(1);
        tracing::info!(
            request_id = %request.details.id,
            doctor = %doctor,
            "Request assigned for consultation"
        );
        Ok(request)
    }
}

impl TestRequest<DiagnosisInProcess> {
    /// Advisory suggestion derived from the lab result, for pre-filling the
    /// consultation form. The submitted payload always wins.
    pub fn advisory_suggestion(&self) -> DoctorSuggestion {
        DoctorSuggestion::advisory_for(self.state.lab_result.result)
    }

    /// Record the consultation and close the request.
    pub async fn complete_consultation<S: RequestStore + ?Sized>(
        self,
        payload: CreateConsultation,
        store: &S,
    ) -> Result<TestRequest<Completed>> {
        let consultation: Consultation = payload.into_record(Utc::now())?;
        let request = TestRequest {
            details: self.details,
            state: Completed {
                tester: self.state.tester,
                lab_result: self.state.lab_result,
                doctor: self.state.doctor,
                consultation,
                completed_at: Utc::now(),
            },
        };
        store
            .persist(RequestStatus::DiagnosisInProcess, &request)
            .await?;
        counter!("covtrack_transitions_total", "operation" => "update_consultation").increment(1);
        tracing::info!(
            request_id = %request.details.id,
            suggestion = ?request.state.consultation.suggestion,
            "Consultation recorded, request completed"
        );
        Ok(request)
    }
}
