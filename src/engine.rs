//! The assignment engine.
//!
//! Expands each care receiver's visit templates over a date range, selects
//! the lowest-scoring feasible care giver per visit (and a distinct second
//! one for double-handed visits), and materializes appointments. Selection
//! is greedy: days in increasing order, templates by visit number,
//! candidates in id order, so a run is deterministic given the same
//! persisted state and settings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::availability;
use crate::domain::{
    Appointment, AppointmentStatus, CareGiver, CareReceiver, DayOfWeek, SystemSettings,
    VisitTemplate,
};
use crate::feasibility;
use crate::geo::{haversine_km, TravelEstimator};
use crate::recurrence;
use crate::store::Store;

/// Score reduction for the receiver's preferred care giver. Scores are raw
/// distance in kilometers otherwise; lower wins.
pub const PREFERRED_CARE_GIVER_BONUS: f64 = 10.0;

/// A visit occurrence the engine could not place.
#[derive(Debug, Clone, Serialize)]
pub struct FailedVisit {
    pub visit_number: u8,
    pub date: NaiveDate,
    pub reason: String,
}

/// Outcome of one receiver's run over a range.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiverRun {
    pub care_receiver_id: Uuid,
    pub scheduled: Vec<Appointment>,
    pub failed: Vec<FailedVisit>,
    /// Receiver-level failure (unknown id in a bulk run).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunSummary {
    pub total_scheduled: usize,
    pub total_failed: usize,
    pub care_receivers_processed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateOutcome {
    pub results: Vec<ReceiverRun>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    ReceiverNotFound(Uuid),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ReceiverNotFound(id) => write!(f, "care receiver {id} not found"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Active care givers passing the static filters for a visit: skill
/// superset, double-handed eligibility, gender preference, geographic
/// radius. Sorted by id (the store guarantees it) so tie-breaks are stable.
pub fn candidates(
    store: &Store,
    settings: &SystemSettings,
    receiver: &CareReceiver,
    requirements: &std::collections::BTreeSet<crate::domain::Skill>,
    double_handed: bool,
    exclude: Option<Uuid>,
) -> Vec<CareGiver> {
    store
        .active_care_givers()
        .into_iter()
        .filter(|cg| Some(cg.id) != exclude)
        .filter(|cg| cg.has_skills(requirements))
        // Single-handed-only care givers never join a double-handed visit,
        // in either role.
        .filter(|cg| !(double_handed && cg.single_handed_only))
        .filter(|cg| receiver.gender_preference.accepts(cg.gender))
        .filter(|cg| {
            haversine_km(cg.home_location, receiver.home_location) <= settings.max_distance_km
        })
        .collect()
}

/// Selection score for a feasible candidate; lower is better.
pub fn score(receiver: &CareReceiver, care_giver: &CareGiver) -> f64 {
    let mut score = haversine_km(care_giver.home_location, receiver.home_location);
    if receiver.preferred_care_giver == Some(care_giver.id) {
        score -= PREFERRED_CARE_GIVER_BONUS;
    }
    score
}

/// Picks the best feasible care giver for one role of a visit, or `None`.
#[allow(clippy::too_many_arguments)]
async fn select_care_giver(
    store: &Store,
    settings: &SystemSettings,
    travel: &mut TravelEstimator,
    receiver: &CareReceiver,
    template: &VisitTemplate,
    date: NaiveDate,
    start: chrono::NaiveTime,
    end: chrono::NaiveTime,
    exclude: Option<Uuid>,
) -> Option<CareGiver> {
    let mut best: Option<(f64, CareGiver)> = None;
    for candidate in candidates(
        store,
        settings,
        receiver,
        &template.requirements,
        template.double_handed,
        exclude,
    ) {
        let outcome = feasibility::is_available(
            store,
            settings,
            travel,
            candidate.id,
            date,
            start,
            end,
            receiver.home_location,
            None,
        )
        .await;
        if !outcome.available {
            debug!(
                "candidate {} rejected for visit {} on {date}: {}",
                candidate.name,
                template.visit_number,
                outcome.reason()
            );
            continue;
        }
        let candidate_score = score(receiver, &candidate);
        // Strict comparison keeps the earlier candidate on ties, preserving
        // the id-ordered iteration as the tie-break.
        if best.as_ref().map_or(true, |(s, _)| candidate_score < *s) {
            best = Some((candidate_score, candidate));
        }
    }
    best.map(|(_, cg)| cg)
}

/// Tries to place one visit occurrence without committing anything on
/// failure. Returns the appointment to insert, or a human-readable reason.
async fn place_visit(
    store: &Store,
    settings: &SystemSettings,
    travel: &mut TravelEstimator,
    receiver: &CareReceiver,
    template: &VisitTemplate,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Appointment, String> {
    let start = template.preferred_time;
    let Some(end) = template.end_time() else {
        return Err("visit would cross midnight".to_string());
    };

    let Some(primary) =
        select_care_giver(store, settings, travel, receiver, template, date, start, end, None).await
    else {
        return Err("no available care giver found".to_string());
    };

    let secondary = if template.double_handed {
        let Some(second) = select_care_giver(
            store,
            settings,
            travel,
            receiver,
            template,
            date,
            start,
            end,
            Some(primary.id),
        )
        .await
        else {
            // The primary is not committed when no second care giver fits.
            return Err("no second care giver available for double-handed visit".to_string());
        };
        Some(second.id)
    } else {
        None
    };

    let resolved = availability::resolve_for(&store.availability, &primary, date);
    Ok(Appointment {
        id: Uuid::new_v4(),
        care_receiver: receiver.id,
        care_giver: primary.id,
        secondary_care_giver: secondary,
        date,
        start_time: start,
        end_time: end,
        duration_minutes: template.duration_minutes,
        visit_number: template.visit_number,
        requirements: template.requirements.clone(),
        double_handed: template.double_handed,
        priority: template.priority,
        status: AppointmentStatus::Scheduled,
        cancellation_reason: None,
        invalidation_reason: None,
        invalidated_at: None,
        snapshot: Some(resolved.snapshot_for(DayOfWeek::of(date))),
        created_at: now,
    })
}

/// Generates appointments for one care receiver over `[from, to]`.
///
/// Each created appointment is visible to the feasibility checks of later
/// visits in the same run. Occurrences whose `(receiver, date,
/// visit_number)` slot is already occupied are skipped, which makes re-runs
/// over the same range produce no duplicates.
pub async fn generate_for_receiver(
    store: &Store,
    settings: &SystemSettings,
    travel: &mut TravelEstimator,
    receiver_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> Result<ReceiverRun, EngineError> {
    let receiver = store
        .care_receiver(receiver_id)
        .ok_or(EngineError::ReceiverNotFound(receiver_id))?;

    let mut scheduled = Vec::new();
    let mut failed = Vec::new();

    for date in recurrence::days_inclusive(from, to) {
        for template in &receiver.visits {
            if !recurrence::occurs_on(template, receiver.created_at, date) {
                continue;
            }
            if store.slot_occupied(receiver.id, date, template.visit_number) {
                debug!(
                    "visit {} for {} on {date} already has an appointment, skipping",
                    template.visit_number, receiver.name
                );
                continue;
            }
            match place_visit(store, settings, travel, &receiver, template, date, now).await {
                Ok(appointment) => {
                    store.insert_appointment(appointment.clone());
                    scheduled.push(appointment);
                }
                Err(reason) => failed.push(FailedVisit {
                    visit_number: template.visit_number,
                    date,
                    reason,
                }),
            }
        }
    }

    info!(
        "generated {} appointments for {} ({} unplaceable) over {from}..{to}",
        scheduled.len(),
        receiver.name,
        failed.len()
    );

    Ok(ReceiverRun {
        care_receiver_id: receiver_id,
        scheduled,
        failed,
        error: None,
    })
}

/// Bulk driver: runs [`generate_for_receiver`] for each id in the order
/// supplied, or for every active receiver when `receiver_ids` is `None`.
/// Unknown ids become result entries; the run continues.
pub async fn generate_range(
    store: &Store,
    settings: &SystemSettings,
    travel: &mut TravelEstimator,
    receiver_ids: Option<Vec<Uuid>>,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> GenerateOutcome {
    let ids = receiver_ids
        .unwrap_or_else(|| store.active_care_receivers().iter().map(|r| r.id).collect());

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        match generate_for_receiver(store, settings, travel, id, from, to, now).await {
            Ok(run) => results.push(run),
            Err(e) => results.push(ReceiverRun {
                care_receiver_id: id,
                scheduled: Vec::new(),
                failed: Vec::new(),
                error: Some(e.to_string()),
            }),
        }
    }

    let summary = RunSummary {
        total_scheduled: results.iter().map(|r| r.scheduled.len()).sum(),
        total_failed: results.iter().map(|r| r.failed.len()).sum(),
        care_receivers_processed: results.len(),
    };

    GenerateOutcome { results, summary }
}

/// Dry run for one visit occurrence: reports why it would fail, without
/// creating anything. `None` means it could be placed right now.
pub async fn probe_visit(
    store: &Store,
    settings: &SystemSettings,
    travel: &mut TravelEstimator,
    receiver: &CareReceiver,
    template: &VisitTemplate,
    date: NaiveDate,
) -> Option<String> {
    place_visit(store, settings, travel, receiver, template, date, Utc::now())
        .await
        .err()
}
