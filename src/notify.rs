//! Notification publication.
//!
//! Post-run summaries and appointment events go out over an unbounded
//! channel to a drain task. Delivery problems are logged and never reach
//! the publishing code path; a scheduling run must not fail because a
//! notification could not be sent.

use chrono::NaiveDate;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::AppointmentStatus;

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    ScheduleRunCompleted {
        care_receivers_processed: usize,
        total_scheduled: usize,
        total_failed: usize,
    },
    AppointmentCreated {
        appointment_id: Uuid,
        care_receiver: Uuid,
        date: NaiveDate,
    },
    AppointmentStatusChanged {
        appointment_id: Uuid,
        status: AppointmentStatus,
    },
    ValidationCompleted {
        checked: usize,
        invalidated: usize,
        restored: usize,
    },
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationEvent::ScheduleRunCompleted {
                care_receivers_processed,
                total_scheduled,
                total_failed,
            } => write!(
                f,
                "schedule run completed: {total_scheduled} scheduled, {total_failed} failed across {care_receivers_processed} care receivers"
            ),
            NotificationEvent::AppointmentCreated {
                appointment_id,
                care_receiver,
                date,
            } => write!(
                f,
                "appointment {appointment_id} created for care receiver {care_receiver} on {date}"
            ),
            NotificationEvent::AppointmentStatusChanged {
                appointment_id,
                status,
            } => write!(f, "appointment {appointment_id} moved to {status:?}"),
            NotificationEvent::ValidationCompleted {
                checked,
                invalidated,
                restored,
            } => write!(
                f,
                "validation completed: {checked} checked, {invalidated} invalidated, {restored} restored"
            ),
        }
    }
}

/// Fire-and-forget event publisher.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl Notifier {
    /// Spawns the drain task on the current runtime and returns the
    /// publishing handle.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                info!("notification: {event}");
            }
        });
        Self { tx }
    }

    /// Publishes an event. Failures are logged, never propagated.
    pub fn publish(&self, event: NotificationEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!("notification dropped: {e}");
        }
    }
}
