//! Post-hoc validation of existing appointments.
//!
//! Scans a date window for appointments whose preconditions have broken
//! since scheduling: a participant gone or deactivated, a newly added
//! holiday covering the date, or a double-handed visit left without its
//! second care giver. Broken appointments move to `needs_reassignment`;
//! previously flagged appointments whose issues have all cleared are
//! restored. Weekly-pattern changes and template edits are deliberately not
//! checked here; they are left for manual review.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::availability;
use crate::domain::{Appointment, AppointmentStatus};
use crate::store::{AppointmentFilter, Store};

/// One appointment the validator flagged this pass.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidAppointment {
    pub appointment_id: Uuid,
    pub date: NaiveDate,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValidationSummary {
    pub checked: usize,
    pub invalidated: usize,
    pub restored: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub summary: ValidationSummary,
    pub invalid: Vec<InvalidAppointment>,
    pub valid: Vec<Uuid>,
}

/// Issues currently breaking an appointment's preconditions. Empty means
/// the appointment stands.
fn appointment_issues(store: &Store, appointment: &Appointment) -> Vec<String> {
    let mut issues = Vec::new();

    match store.care_receiver(appointment.care_receiver) {
        None => issues.push("care receiver no longer exists".to_string()),
        Some(receiver) if !receiver.is_active => {
            issues.push(format!("care receiver {} is no longer active", receiver.name));
        }
        Some(_) => {}
    }

    check_care_giver(store, appointment.care_giver, "care giver", appointment.date, &mut issues);
    if let Some(secondary) = appointment.secondary_care_giver {
        check_care_giver(store, secondary, "secondary care giver", appointment.date, &mut issues);
    } else if appointment.double_handed {
        issues.push("double-handed visit has no second care giver".to_string());
    }

    issues
}

fn check_care_giver(
    store: &Store,
    id: Uuid,
    role: &str,
    date: NaiveDate,
    issues: &mut Vec<String>,
) {
    match store.care_giver(id) {
        None => issues.push(format!("{role} no longer exists")),
        Some(care_giver) if !care_giver.is_active => {
            issues.push(format!("{role} {} is no longer active", care_giver.name));
        }
        Some(care_giver) => {
            if availability::on_time_off(&store.availability, &care_giver, date) {
                issues.push(format!("{role} {} is on time off on {date}", care_giver.name));
            }
        }
    }
}

/// Validates every `scheduled` or `needs_reassignment` appointment dated in
/// `[from, to]`. Idempotent: a second pass over unchanged entities writes
/// nothing and reports the same partition.
pub fn validate_window(
    store: &Store,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> ValidationReport {
    let window = AppointmentFilter {
        from: Some(from),
        to: Some(to),
        ..Default::default()
    };

    let mut invalid = Vec::new();
    let mut valid = Vec::new();
    let mut invalidated = 0;
    let mut restored = 0;
    let mut checked = 0;

    for appointment in store.appointments_filtered(&window) {
        if !matches!(
            appointment.status,
            AppointmentStatus::Scheduled | AppointmentStatus::NeedsReassignment
        ) {
            continue;
        }
        checked += 1;

        let issues = appointment_issues(store, &appointment);
        if issues.is_empty() {
            if appointment.status == AppointmentStatus::NeedsReassignment {
                store.update_appointment(appointment.id, |a| {
                    a.status = AppointmentStatus::Scheduled;
                    a.invalidation_reason = None;
                    a.invalidated_at = None;
                });
                restored += 1;
            }
            valid.push(appointment.id);
        } else {
            let reason = issues.join("; ");
            // Only write when something actually changes, so repeated
            // passes are no-ops.
            if appointment.status != AppointmentStatus::NeedsReassignment
                || appointment.invalidation_reason.as_deref() != Some(reason.as_str())
            {
                store.update_appointment(appointment.id, |a| {
                    a.status = AppointmentStatus::NeedsReassignment;
                    a.invalidation_reason = Some(reason.clone());
                    a.invalidated_at = Some(now);
                });
                invalidated += 1;
            }
            invalid.push(InvalidAppointment {
                appointment_id: appointment.id,
                date: appointment.date,
                issues,
            });
        }
    }

    info!(
        "validated {checked} appointments over {from}..{to}: {} invalid, {restored} restored",
        invalid.len()
    );

    ValidationReport {
        summary: ValidationSummary {
            checked,
            invalidated,
            restored,
        },
        invalid,
        valid,
    }
}
