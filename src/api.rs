//! REST API handlers for the scheduling engine.
//!
//! Every successful response is wrapped as `{"success": true, "data": ...}`;
//! failures carry `{"success": false, "error": {"message", "code"}}` with a
//! matching HTTP status.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::analyzer;
use crate::demo_data::{self, DemoData};
use crate::domain::{
    hhmm, Appointment, AppointmentStatus, DayOfWeek, ScheduleSnapshot, SystemSettings,
};
use crate::dto::*;
use crate::engine;
use crate::feasibility;
use crate::geo::{haversine_km, RoutingConfig, TravelEstimator};
use crate::notify::{NotificationEvent, Notifier};
use crate::recurrence;
use crate::settings::SettingsService;
use crate::store::{AppointmentFilter, Store};
use crate::validator;
use crate::availability;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

/// Application state shared across handlers.
pub struct AppState {
    pub store: Store,
    pub settings: SettingsService,
    pub notifier: Notifier,
    pub routing: RoutingConfig,
}

impl AppState {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            store: Store::new(),
            settings: SettingsService::new(),
            notifier,
            routing: RoutingConfig::from_env(),
        }
    }

    /// A fresh request-scoped travel estimator.
    fn estimator(&self) -> TravelEstimator {
        TravelEstimator::new(self.routing.clone())
    }
}

/// API error carried to the response envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn missing_dates() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::MissingDates,
            "start_date and end_date are required",
        )
    }

    pub fn invalid_date_range() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidDateRange,
            "end_date must not be before start_date",
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::ValidationError, message)
    }

    pub fn missing_fields(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::MissingFields, message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::DuplicateError, message)
    }

    pub fn care_receiver_not_found(id: Uuid) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ErrorCode::CareReceiverNotFound,
            format!("care receiver {id} not found"),
        )
    }

    pub fn care_giver_not_found(id: Uuid) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ErrorCode::CareGiverNotFound,
            format!("care giver {id} not found"),
        )
    }

    pub fn appointment_not_found(id: Uuid) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ErrorCode::AppointmentNotFound,
            format!("appointment {id} not found"),
        )
    }
}

impl From<crate::domain::ValidationError> for ApiError {
    fn from(err: crate::domain::ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                message: self.message,
                code: self.code,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope {
        success: true,
        data,
    }))
}

/// Parses a required `[start_date, end_date]` pair.
fn require_range(start: Option<&str>, end: Option<&str>) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        _ => return Err(ApiError::missing_dates()),
    };
    let from = parse_day(start).map_err(ApiError::validation)?;
    let to = parse_day(end).map_err(ApiError::validation)?;
    if to < from {
        return Err(ApiError::invalid_date_range());
    }
    Ok((from, to))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/demo-data", get(list_demo_data))
        .route("/demo-data/{id}/load", post(load_demo_data))
        .route("/schedule/generate", post(generate))
        .route("/schedule/appointments", get(list_appointments))
        .route("/schedule/unscheduled", get(unscheduled))
        .route("/schedule/analyze-unscheduled", post(analyze_unscheduled))
        .route("/schedule/validate", post(validate))
        .route("/schedule/find-available", post(find_available))
        .route("/schedule/appointments/manual", post(create_manual_appointment))
        .route("/schedule/appointments/{id}/status", patch(update_status))
        .route("/schedule/appointments/{id}", delete(delete_appointment))
        .route("/schedule/stats", get(stats))
        .route("/schedule/settings", get(get_settings).put(update_settings))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Care Scheduling",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(demo_data::list_demo_data())
}

async fn load_demo_data(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<DemoLoadReport> {
    let demo: DemoData = id
        .parse()
        .map_err(|_| ApiError::validation(format!("unknown demo data set: {id}")))?;
    state.store.clear();
    let report = demo_data::seed(&state.store, demo);
    ok(report)
}

/// POST /schedule/generate - expands and assigns visits over a range.
async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<engine::GenerateOutcome> {
    let (from, to) = require_range(request.start_date.as_deref(), request.end_date.as_deref())?;

    // A single explicitly-named receiver must exist; bulk lists record
    // unknown ids in the result and continue.
    let receiver_ids = match (request.care_receiver_id, request.care_receiver_ids) {
        (Some(id), _) => {
            if state.store.care_receiver(id).is_none() {
                return Err(ApiError::care_receiver_not_found(id));
            }
            Some(vec![id])
        }
        (None, Some(ids)) => Some(ids),
        (None, None) => None,
    };

    let settings = state.settings.get(&state.store);
    let mut travel = state.estimator();
    let outcome = engine::generate_range(
        &state.store,
        &settings,
        &mut travel,
        receiver_ids,
        from,
        to,
        Utc::now(),
    )
    .await;

    state.notifier.publish(NotificationEvent::ScheduleRunCompleted {
        care_receivers_processed: outcome.summary.care_receivers_processed,
        total_scheduled: outcome.summary.total_scheduled,
        total_failed: outcome.summary.total_failed,
    });

    ok(outcome)
}

/// GET /schedule/appointments - filtered, paginated listing.
async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppointmentsQuery>,
) -> ApiResult<PaginatedAppointments> {
    let from = query
        .start_date
        .as_deref()
        .map(parse_day)
        .transpose()
        .map_err(ApiError::validation)?;
    let to = query
        .end_date
        .as_deref()
        .map(parse_day)
        .transpose()
        .map_err(ApiError::validation)?;
    if let (Some(from), Some(to)) = (from, to) {
        if to < from {
            return Err(ApiError::invalid_date_range());
        }
    }

    let filter = AppointmentFilter {
        from,
        to,
        care_giver: query.care_giver_id,
        care_receiver: query.care_receiver_id,
        status: query.status,
    };
    let all = state.store.appointments_filtered(&filter);

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let total = all.len();
    let total_pages = total.div_ceil(limit).max(1);
    let items = all
        .into_iter()
        .skip((page - 1) * limit)
        .take(limit)
        .collect();

    ok(PaginatedAppointments {
        items,
        page,
        limit,
        total,
        total_pages,
    })
}

/// GET /schedule/unscheduled - expanded visits with no appointment behind
/// them, with the reason each could not be placed.
async fn unscheduled(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<Vec<ReceiverUnscheduled>> {
    let (from, to) = require_range(query.start_date.as_deref(), query.end_date.as_deref())?;

    let settings = state.settings.get(&state.store);
    let mut travel = state.estimator();
    let mut report = Vec::new();

    for receiver in state.store.active_care_receivers() {
        let mut missing = Vec::new();
        for template in &receiver.visits {
            for date in recurrence::expansion_dates(template, receiver.created_at, from, to) {
                if state.store.slot_occupied(receiver.id, date, template.visit_number) {
                    continue;
                }
                let reason = engine::probe_visit(
                    &state.store,
                    &settings,
                    &mut travel,
                    &receiver,
                    template,
                    date,
                )
                .await
                .unwrap_or_else(|| "not yet generated".to_string());
                missing.push(MissingVisit {
                    visit_number: template.visit_number,
                    date,
                    reason,
                });
            }
        }
        if !missing.is_empty() {
            report.push(ReceiverUnscheduled {
                care_receiver_id: receiver.id,
                care_receiver_name: receiver.name.clone(),
                missing,
            });
        }
    }

    ok(report)
}

/// POST /schedule/analyze-unscheduled - per-care-giver rejection reasons
/// and match scores for one visit occurrence.
async fn analyze_unscheduled(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Vec<analyzer::CandidateAssessment>> {
    let receiver = state
        .store
        .care_receiver(request.care_receiver)
        .ok_or_else(|| ApiError::care_receiver_not_found(request.care_receiver))?;
    let template = receiver
        .visit(request.visit)
        .ok_or_else(|| {
            ApiError::validation(format!(
                "care receiver {} has no visit {}",
                receiver.name, request.visit
            ))
        })?
        .clone();
    let date = parse_day(&request.date).map_err(ApiError::validation)?;

    let settings = state.settings.get(&state.store);
    let mut travel = state.estimator();
    let report =
        analyzer::analyze_visit(&state.store, &settings, &mut travel, &receiver, &template, date)
            .await;
    ok(report)
}

/// POST /schedule/validate - flags appointments whose preconditions broke.
async fn validate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DateRangeQuery>,
) -> ApiResult<validator::ValidationReport> {
    let (from, to) = require_range(request.start_date.as_deref(), request.end_date.as_deref())?;
    let report = validator::validate_window(&state.store, from, to, Utc::now());

    state.notifier.publish(NotificationEvent::ValidationCompleted {
        checked: report.summary.checked,
        invalidated: report.summary.invalidated,
        restored: report.summary.restored,
    });

    ok(report)
}

/// POST /schedule/find-available - feasible care givers for an ad-hoc
/// window, ranked by selection score.
async fn find_available(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FindAvailableRequest>,
) -> ApiResult<Vec<AvailableCareGiver>> {
    let receiver = state
        .store
        .care_receiver(request.care_receiver_id)
        .ok_or_else(|| ApiError::care_receiver_not_found(request.care_receiver_id))?;
    let date = parse_day(&request.date).map_err(ApiError::validation)?;
    let start = hhmm::parse(&request.start_time).map_err(ApiError::validation)?;
    let end = hhmm::parse(&request.end_time).map_err(ApiError::validation)?;
    if end <= start {
        return Err(ApiError::validation("end_time must be after start_time"));
    }

    let requirements: BTreeSet<_> = request.requirements.iter().copied().collect();
    let settings = state.settings.get(&state.store);
    let mut travel = state.estimator();

    let mut available = Vec::new();
    for candidate in engine::candidates(
        &state.store,
        &settings,
        &receiver,
        &requirements,
        request.double_handed,
        None,
    ) {
        let outcome = feasibility::is_available(
            &state.store,
            &settings,
            &mut travel,
            candidate.id,
            date,
            start,
            end,
            receiver.home_location,
            None,
        )
        .await;
        if !outcome.available {
            continue;
        }
        let travel_time_minutes = travel
            .minutes(candidate.home_location, receiver.home_location)
            .await;
        available.push(AvailableCareGiver {
            care_giver_id: candidate.id,
            name: candidate.name.clone(),
            distance_km: haversine_km(candidate.home_location, receiver.home_location),
            travel_time_minutes,
            score: engine::score(&receiver, &candidate),
        });
    }

    available.sort_by(|a, b| a.score.total_cmp(&b.score));
    ok(available)
}

/// POST /schedule/appointments/manual - manually placed appointment,
/// feasibility-checked for every assigned care giver.
async fn create_manual_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ManualAppointmentRequest>,
) -> ApiResult<Appointment> {
    let (date, start_time, end_time) = match (&request.date, &request.start_time, &request.end_time)
    {
        (Some(d), Some(s), Some(e)) => (d.as_str(), s.as_str(), e.as_str()),
        _ => return Err(ApiError::missing_fields("date, start_time and end_time are required")),
    };
    let date = parse_day(date).map_err(ApiError::validation)?;
    let start = hhmm::parse(start_time).map_err(ApiError::validation)?;
    let end = hhmm::parse(end_time).map_err(ApiError::validation)?;
    if end <= start {
        return Err(ApiError::validation("end_time must be after start_time"));
    }

    let receiver = state
        .store
        .care_receiver(request.care_receiver_id)
        .ok_or_else(|| ApiError::care_receiver_not_found(request.care_receiver_id))?;
    let primary = state
        .store
        .care_giver(request.care_giver_id)
        .ok_or_else(|| ApiError::care_giver_not_found(request.care_giver_id))?;
    if let Some(secondary) = request.secondary_care_giver_id {
        if state.store.care_giver(secondary).is_none() {
            return Err(ApiError::care_giver_not_found(secondary));
        }
        if secondary == primary.id {
            return Err(ApiError::validation(
                "secondary care giver must differ from the primary",
            ));
        }
    }
    if request.double_handed && request.secondary_care_giver_id.is_none() {
        return Err(ApiError::validation(
            "a double-handed appointment needs a second care giver",
        ));
    }

    let visit_number = request.visit_number.unwrap_or(1);
    if state.store.slot_occupied(receiver.id, date, visit_number) {
        return Err(ApiError::duplicate(format!(
            "visit {visit_number} for {} on {date} already has an appointment",
            receiver.name
        )));
    }

    let settings = state.settings.get(&state.store);
    let mut travel = state.estimator();
    let mut assignees = vec![primary.id];
    assignees.extend(request.secondary_care_giver_id);
    for care_giver in &assignees {
        let outcome = feasibility::is_available(
            &state.store,
            &settings,
            &mut travel,
            *care_giver,
            date,
            start,
            end,
            receiver.home_location,
            None,
        )
        .await;
        if !outcome.available {
            return Err(ApiError::validation(outcome.reason()));
        }
    }

    let resolved = availability::resolve_for(&state.store.availability, &primary, date);
    let snapshot: ScheduleSnapshot = resolved.snapshot_for(DayOfWeek::of(date));
    let appointment = Appointment {
        id: Uuid::new_v4(),
        care_receiver: receiver.id,
        care_giver: primary.id,
        secondary_care_giver: request.secondary_care_giver_id,
        date,
        start_time: start,
        end_time: end,
        duration_minutes: crate::geo::minutes_between(start, end) as u32,
        visit_number,
        requirements: request.requirements.iter().copied().collect(),
        double_handed: request.double_handed,
        priority: request.priority.unwrap_or(3),
        status: AppointmentStatus::Scheduled,
        cancellation_reason: None,
        invalidation_reason: None,
        invalidated_at: None,
        snapshot: Some(snapshot),
        created_at: Utc::now(),
    };
    state.store.insert_appointment(appointment.clone());

    state.notifier.publish(NotificationEvent::AppointmentCreated {
        appointment_id: appointment.id,
        care_receiver: receiver.id,
        date,
    });

    ok(appointment)
}

/// PATCH /schedule/appointments/{id}/status - status transition.
async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> ApiResult<Appointment> {
    let updated = state
        .store
        .update_appointment(id, |appointment| {
            appointment.status = request.status;
            if request.status == AppointmentStatus::Cancelled {
                appointment.cancellation_reason = request.cancellation_reason.clone();
            }
        })
        .ok_or_else(|| ApiError::appointment_not_found(id))?;

    state.notifier.publish(NotificationEvent::AppointmentStatusChanged {
        appointment_id: id,
        status: request.status,
    });

    ok(updated)
}

/// DELETE /schedule/appointments/{id}.
async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeletionAck> {
    if !state.store.delete_appointment(id) {
        return Err(ApiError::appointment_not_found(id));
    }
    ok(DeletionAck { deleted: true, id })
}

/// GET /schedule/stats - per-status counts and completion rate.
async fn stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<StatsResponse> {
    let from = query
        .start_date
        .as_deref()
        .map(parse_day)
        .transpose()
        .map_err(ApiError::validation)?;
    let to = query
        .end_date
        .as_deref()
        .map(parse_day)
        .transpose()
        .map_err(ApiError::validation)?;

    let filter = AppointmentFilter {
        from,
        to,
        ..Default::default()
    };
    let appointments = state.store.appointments_filtered(&filter);

    let count =
        |status: AppointmentStatus| appointments.iter().filter(|a| a.status == status).count();
    let completed = count(AppointmentStatus::Completed);
    let cancelled = count(AppointmentStatus::Cancelled);
    let total = appointments.len();
    let effective = total - cancelled;
    let completion_rate = if effective == 0 {
        0.0
    } else {
        (completed as f64 / effective as f64 * 1000.0).round() / 10.0
    };

    ok(StatsResponse {
        total,
        scheduled: count(AppointmentStatus::Scheduled),
        in_progress: count(AppointmentStatus::InProgress),
        completed,
        cancelled,
        missed: count(AppointmentStatus::Missed),
        needs_review: count(AppointmentStatus::NeedsReview),
        needs_reassignment: count(AppointmentStatus::NeedsReassignment),
        completion_rate,
    })
}

async fn get_settings(State(state): State<Arc<AppState>>) -> ApiResult<SystemSettings> {
    ok(state.settings.get(&state.store))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<SystemSettings>,
) -> ApiResult<SystemSettings> {
    let saved = state.settings.update(&state.store, settings)?;
    ok(saved)
}
