//! Request and response DTOs for the scheduling API.
//!
//! Dates arrive as ISO-8601 strings (plain dates or instants) and are
//! normalized to UTC calendar days. Clock times are `"HH:MM"` strings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AppointmentStatus, Skill};

/// Successful response wrapper: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

/// The closed set of machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingDates,
    InvalidDateRange,
    CareReceiverNotFound,
    CareGiverNotFound,
    AppointmentNotFound,
    MissingFields,
    ValidationError,
    DuplicateError,
    InternalError,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: ErrorCode,
}

/// Failure response wrapper: `{"success": false, "error": {...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

/// Parses an ISO-8601 date or instant to its UTC calendar day.
pub fn parse_day(value: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|instant| crate::geo::utc_day(instant.with_timezone(&Utc)))
        .map_err(|_| format!("invalid date: {value:?}"))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Single receiver; mutually additive with `care_receiver_ids`.
    pub care_receiver_id: Option<Uuid>,
    pub care_receiver_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub care_giver_id: Option<Uuid>,
    pub care_receiver_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub care_receiver: Uuid,
    /// Visit number within the receiver.
    pub visit: u8,
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct FindAvailableRequest {
    pub care_receiver_id: Uuid,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub requirements: Vec<Skill>,
    #[serde(default)]
    pub double_handed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ManualAppointmentRequest {
    pub care_receiver_id: Uuid,
    pub care_giver_id: Uuid,
    pub secondary_care_giver_id: Option<Uuid>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub visit_number: Option<u8>,
    #[serde(default)]
    pub requirements: Vec<Skill>,
    #[serde(default)]
    pub double_handed: bool,
    pub priority: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PaginatedAppointments {
    pub items: Vec<crate::domain::Appointment>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// One expanded visit occurrence with no appointment behind it.
#[derive(Debug, Serialize)]
pub struct MissingVisit {
    pub visit_number: u8,
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ReceiverUnscheduled {
    pub care_receiver_id: Uuid,
    pub care_receiver_name: String,
    pub missing: Vec<MissingVisit>,
}

#[derive(Debug, Serialize)]
pub struct AvailableCareGiver {
    pub care_giver_id: Uuid,
    pub name: String,
    pub distance_km: f64,
    pub travel_time_minutes: i64,
    /// Engine selection score; lower is better.
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct DeletionAck {
    pub deleted: bool,
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: usize,
    pub scheduled: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub missed: usize,
    pub needs_review: usize,
    pub needs_reassignment: usize,
    /// Completed share of non-cancelled appointments, in percent.
    pub completion_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct DemoLoadReport {
    pub demo_set: String,
    pub care_givers: usize,
    pub care_receivers: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
}
