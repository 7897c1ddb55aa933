//! Core types for the test request workflow.
//!
//! This module defines the type-safe request lifecycle using the typestate
//! pattern. Each workflow status is a distinct state type on `TestRequest<S>`,
//! so a request can only carry the sub-records its status implies: a lab
//! result exists from `LabTestCompleted` onward, a consultation only on
//! `Completed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CovtrackError, Result};
use crate::users::UserId;

/// Workflow status of a test request, used for filtering and storage.
///
/// The workflow is strictly ordered: each status is reachable from exactly
/// one predecessor, via exactly one role's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Initiated,
    LabTestInProgress,
    LabTestCompleted,
    DiagnosisInProcess,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Initiated => "initiated",
            RequestStatus::LabTestInProgress => "lab_test_in_progress",
            RequestStatus::LabTestCompleted => "lab_test_completed",
            RequestStatus::DiagnosisInProcess => "diagnosis_in_process",
            RequestStatus::Completed => "completed",
        }
    }

    /// The status a legal transition out of `self` lands in, if any.
    pub fn successor(&self) -> Option<RequestStatus> {
        match self {
            RequestStatus::Initiated => Some(RequestStatus::LabTestInProgress),
            RequestStatus::LabTestInProgress => Some(RequestStatus::LabTestCompleted),
            RequestStatus::LabTestCompleted => Some(RequestStatus::DiagnosisInProcess),
            RequestStatus::DiagnosisInProcess => Some(RequestStatus::Completed),
            RequestStatus::Completed => None,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(RequestStatus::Initiated),
            "lab_test_in_progress" => Ok(RequestStatus::LabTestInProgress),
            "lab_test_completed" => Ok(RequestStatus::LabTestCompleted),
            "diagnosis_in_process" => Ok(RequestStatus::DiagnosisInProcess),
            "completed" => Ok(RequestStatus::Completed),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

/// Patient gender as captured on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Outcome of a lab test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Positive,
    Negative,
}

/// Advice a doctor issues when closing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoctorSuggestion {
    HomeQuarantine,
    NoIssues,
    ReferToHospital,
}

impl DoctorSuggestion {
    /// Advisory pre-fill derived from a lab outcome.
    ///
    /// This only seeds the consultation form; the submitted payload is
    /// authoritative and a missing suggestion is a validation failure, never
    /// default-filled from this rule.
    pub fn advisory_for(result: TestStatus) -> DoctorSuggestion {
        match result {
            TestStatus::Positive => DoctorSuggestion::HomeQuarantine,
            TestStatus::Negative => DoctorSuggestion::NoIssues,
        }
    }
}

/// Unique identifier for a test request, assigned by the store at creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId(id)
    }
}

impl std::ops::Deref for RequestId {
    type Target = i64;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Marker trait for valid request states.
///
/// This trait enables the typestate pattern, ensuring that transitions are
/// only available on requests in the state they start from.
pub trait RequestState: Send + Sync {}

/// A COVID test request.
///
/// Uses the typestate pattern to ensure type-safe state transitions. The
/// generic parameter `S` represents the current workflow state.
#[derive(Debug, Clone, Serialize)]
pub struct TestRequest<S: RequestState> {
    /// The current state of the request.
    pub state: S,
    /// The patient details captured at creation.
    pub details: PatientDetails,
}

/// Patient-supplied details, captured at creation and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDetails {
    /// The id assigned to the request at creation.
    pub id: RequestId,

    /// The patient who raised the request.
    pub requester: UserId,

    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub address: String,
    pub pincode: String,
    pub phone_number: String,
    pub email: String,

    pub created_at: DateTime<Utc>,
}

/// Measurements and outcome recorded by a tester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabResult {
    pub blood_pressure: String,
    pub heart_beat: String,
    pub temperature: String,
    pub oxygen_level: Option<String>,
    pub comments: Option<String>,
    pub result: TestStatus,
    pub recorded_at: DateTime<Utc>,
}

/// Advice issued by a doctor at the end of the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultation {
    pub suggestion: DoctorSuggestion,
    pub comments: Option<String>,
    pub advised_at: DateTime<Utc>,
}

// ============================================================================
// Request States
// ============================================================================

/// Request has been raised by a patient and awaits a tester.
///
/// This is the initial state for all newly created requests.
#[derive(Debug, Clone, Serialize)]
pub struct Initiated;

impl RequestState for Initiated {}

/// A tester has taken the sample; the lab result is pending.
#[derive(Debug, Clone, Serialize)]
pub struct LabTestInProgress {
    pub tester: UserId,
    pub assigned_at: DateTime<Utc>,
}

impl RequestState for LabTestInProgress {}

/// The lab result is recorded; the request awaits a doctor.
///
/// The tester may still revise the result until a doctor picks the request up.
#[derive(Debug, Clone, Serialize)]
pub struct LabTestCompleted {
    pub tester: UserId,
    pub lab_result: LabResult,
    pub completed_at: DateTime<Utc>,
}

impl RequestState for LabTestCompleted {}

/// A doctor has picked the request up for consultation.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisInProcess {
    pub tester: UserId,
    pub lab_result: LabResult,
    pub doctor: UserId,
    pub assigned_at: DateTime<Utc>,
}

impl RequestState for DiagnosisInProcess {}

/// Consultation recorded. Terminal state, retained for audit.
#[derive(Debug, Clone, Serialize)]
pub struct Completed {
    pub tester: UserId,
    pub lab_result: LabResult,
    pub doctor: UserId,
    pub consultation: Consultation,
    pub completed_at: DateTime<Utc>,
}

impl RequestState for Completed {}

// ============================================================================
// Input payloads
// ============================================================================

/// Input payload for raising a new test request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTestRequest {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub address: String,
    pub pincode: String,
    pub phone_number: String,
    pub email: String,
}

impl CreateTestRequest {
    /// Field-level validation; messages name the violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CovtrackError::Validation("name must not be empty".into()));
        }
        if self.age > 120 {
            return Err(CovtrackError::Validation(
                "age must be between 0 and 120".into(),
            ));
        }
        if self.address.trim().is_empty() {
            return Err(CovtrackError::Validation(
                "address must not be empty".into(),
            ));
        }
        if self.pincode.len() != 6 || !self.pincode.chars().all(|c| c.is_ascii_digit()) {
            return Err(CovtrackError::Validation(
                "pincode must be a 6-digit code".into(),
            ));
        }
        if self.phone_number.trim().is_empty() {
            return Err(CovtrackError::Validation(
                "phone_number must not be empty".into(),
            ));
        }
        if !self.email.contains('@') {
            return Err(CovtrackError::Validation(
                "email must be a valid address".into(),
            ));
        }
        Ok(())
    }
}

/// Input payload for recording a lab result.
///
/// `result` is optional in the payload so that a missing value surfaces as a
/// validation failure rather than a deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateLabResult {
    pub blood_pressure: String,
    pub heart_beat: String,
    pub temperature: String,
    pub oxygen_level: Option<String>,
    pub comments: Option<String>,
    pub result: Option<TestStatus>,
}

impl CreateLabResult {
    /// Validate and convert into a stored lab result.
    pub fn into_record(self, recorded_at: DateTime<Utc>) -> Result<LabResult> {
        if self.blood_pressure.trim().is_empty() {
            return Err(CovtrackError::Validation(
                "blood_pressure must not be empty".into(),
            ));
        }
        if self.heart_beat.trim().is_empty() {
            return Err(CovtrackError::Validation(
                "heart_beat must not be empty".into(),
            ));
        }
        if self.temperature.trim().is_empty() {
            return Err(CovtrackError::Validation(
                "temperature must not be empty".into(),
            ));
        }
        let result = self.result.ok_or_else(|| {
            CovtrackError::Validation("result must be one of positive, negative".into())
        })?;
        Ok(LabResult {
            blood_pressure: self.blood_pressure,
            heart_beat: self.heart_beat,
            temperature: self.temperature,
            oxygen_level: self.oxygen_level,
            comments: self.comments,
            result,
            recorded_at,
        })
    }
}

/// Input payload for recording a consultation.
///
/// `suggestion` is optional in the payload; `None` is a hard validation
/// failure, never an invitation to fill in the advisory default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateConsultation {
    pub suggestion: Option<DoctorSuggestion>,
    pub comments: Option<String>,
}

impl CreateConsultation {
    /// Validate and convert into a stored consultation.
    pub fn into_record(self, advised_at: DateTime<Utc>) -> Result<Consultation> {
        let Some(suggestion) = self.suggestion else {
            return Err(CovtrackError::Validation("suggestion is required".into()));
        };
        // A hospital referral is not actionable without instructions.
        if suggestion == DoctorSuggestion::ReferToHospital
            && self.comments.as_deref().is_none_or(|c| c.trim().is_empty())
        {
            return Err(CovtrackError::Validation(
                "comments are required when referring to hospital".into(),
            ));
        }
        Ok(Consultation {
            suggestion,
            comments: self.comments,
            advised_at,
        })
    }
}

// ============================================================================
// Unified Request Representation
// ============================================================================

/// Enum that can hold a request in any state.
///
/// This is used by storage and queries where requests are handled uniformly
/// regardless of their current state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "request")]
#[serde(rename_all = "snake_case")]
pub enum AnyRequest {
    Initiated(TestRequest<Initiated>),
    LabTestInProgress(TestRequest<LabTestInProgress>),
    LabTestCompleted(TestRequest<LabTestCompleted>),
    DiagnosisInProcess(TestRequest<DiagnosisInProcess>),
    Completed(TestRequest<Completed>),
}

impl AnyRequest {
    /// Get the request id regardless of state.
    pub fn id(&self) -> RequestId {
        self.details().id
    }

    /// Get the patient details regardless of state.
    pub fn details(&self) -> &PatientDetails {
        match self {
            AnyRequest::Initiated(r) => &r.details,
            AnyRequest::LabTestInProgress(r) => &r.details,
            AnyRequest::LabTestCompleted(r) => &r.details,
            AnyRequest::DiagnosisInProcess(r) => &r.details,
            AnyRequest::Completed(r) => &r.details,
        }
    }

    /// Get the workflow status enum for the current state.
    pub fn status(&self) -> RequestStatus {
        match self {
            AnyRequest::Initiated(_) => RequestStatus::Initiated,
            AnyRequest::LabTestInProgress(_) => RequestStatus::LabTestInProgress,
            AnyRequest::LabTestCompleted(_) => RequestStatus::LabTestCompleted,
            AnyRequest::DiagnosisInProcess(_) => RequestStatus::DiagnosisInProcess,
            AnyRequest::Completed(_) => RequestStatus::Completed,
        }
    }

    /// The lab result, if the request has reached a state that carries one.
    pub fn lab_result(&self) -> Option<&LabResult> {
        match self {
            AnyRequest::Initiated(_) | AnyRequest::LabTestInProgress(_) => None,
            AnyRequest::LabTestCompleted(r) => Some(&r.state.lab_result),
            AnyRequest::DiagnosisInProcess(r) => Some(&r.state.lab_result),
            AnyRequest::Completed(r) => Some(&r.state.lab_result),
        }
    }

    /// The consultation, present only once the request is completed.
    pub fn consultation(&self) -> Option<&Consultation> {
        match self {
            AnyRequest::Completed(r) => Some(&r.state.consultation),
            _ => None,
        }
    }

    /// Check if this request is in the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnyRequest::Completed(_))
    }

    /// Try to take as an `Initiated` request, consuming self.
    pub fn into_initiated(self) -> Option<TestRequest<Initiated>> {
        match self {
            AnyRequest::Initiated(r) => Some(r),
            _ => None,
        }
    }

    /// Try to take as a `LabTestInProgress` request, consuming self.
    pub fn into_lab_test_in_progress(self) -> Option<TestRequest<LabTestInProgress>> {
        match self {
            AnyRequest::LabTestInProgress(r) => Some(r),
            _ => None,
        }
    }

    /// Try to take as a `LabTestCompleted` request, consuming self.
    pub fn into_lab_test_completed(self) -> Option<TestRequest<LabTestCompleted>> {
        match self {
            AnyRequest::LabTestCompleted(r) => Some(r),
            _ => None,
        }
    }

    /// Try to take as a `DiagnosisInProcess` request, consuming self.
    pub fn into_diagnosis_in_process(self) -> Option<TestRequest<DiagnosisInProcess>> {
        match self {
            AnyRequest::DiagnosisInProcess(r) => Some(r),
            _ => None,
        }
    }
}

// Conversion traits for going from typed TestRequest to AnyRequest

impl From<TestRequest<Initiated>> for AnyRequest {
    fn from(r: TestRequest<Initiated>) -> Self {
        AnyRequest::Initiated(r)
    }
}

impl From<TestRequest<LabTestInProgress>> for AnyRequest {
    fn from(r: TestRequest<LabTestInProgress>) -> Self {
        AnyRequest::LabTestInProgress(r)
    }
}

impl From<TestRequest<LabTestCompleted>> for AnyRequest {
    fn from(r: TestRequest<LabTestCompleted>) -> Self {
        AnyRequest::LabTestCompleted(r)
    }
}

impl From<TestRequest<DiagnosisInProcess>> for AnyRequest {
    fn from(r: TestRequest<DiagnosisInProcess>) -> Self {
        AnyRequest::DiagnosisInProcess(r)
    }
}

impl From<TestRequest<Completed>> for AnyRequest {
    fn from(r: TestRequest<Completed>) -> Self {
        AnyRequest::Completed(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            RequestStatus::Initiated,
            RequestStatus::LabTestInProgress,
            RequestStatus::LabTestCompleted,
            RequestStatus::DiagnosisInProcess,
            RequestStatus::Completed,
        ] {
            assert_eq!(RequestStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(RequestStatus::from_str("diagnosed").is_err());
    }

    #[test]
    fn successor_chain_is_strictly_ordered() {
        let mut status = RequestStatus::Initiated;
        let mut seen = vec![status];
        while let Some(next) = status.successor() {
            seen.push(next);
            status = next;
        }
        assert_eq!(
            seen,
            vec![
                RequestStatus::Initiated,
                RequestStatus::LabTestInProgress,
                RequestStatus::LabTestCompleted,
                RequestStatus::DiagnosisInProcess,
                RequestStatus::Completed,
            ]
        );
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&RequestStatus::LabTestInProgress).unwrap();
        assert_eq!(json, r#""lab_test_in_progress""#);
    }

    #[test]
    fn lab_result_payload_rejects_missing_fields() {
        let payload = CreateLabResult {
            heart_beat: "72".into(),
            temperature: "98.6".into(),
            result: Some(TestStatus::Negative),
            ..Default::default()
        };
        let err = payload.into_record(Utc::now()).unwrap_err();
        assert!(err.to_string().contains("blood_pressure"));

        let payload = CreateLabResult {
            blood_pressure: "120/80".into(),
            heart_beat: "72".into(),
            temperature: "98.6".into(),
            result: None,
            ..Default::default()
        };
        let err = payload.into_record(Utc::now()).unwrap_err();
        assert!(err.to_string().contains("result"));
    }

    #[test]
    fn consultation_payload_requires_comments_for_hospital_referral() {
        let payload = CreateConsultation {
            suggestion: Some(DoctorSuggestion::ReferToHospital),
            comments: None,
        };
        let err = payload.into_record(Utc::now()).unwrap_err();
        assert!(err.to_string().contains("comments"));

        let payload = CreateConsultation {
            suggestion: Some(DoctorSuggestion::NoIssues),
            comments: None,
        };
        assert!(payload.into_record(Utc::now()).is_ok());
    }

    #[test]
    fn advisory_suggestion_follows_lab_outcome() {
        assert_eq!(
            DoctorSuggestion::advisory_for(TestStatus::Positive),
            DoctorSuggestion::HomeQuarantine
        );
        assert_eq!(
            DoctorSuggestion::advisory_for(TestStatus::Negative),
            DoctorSuggestion::NoIssues
        );
    }
}
