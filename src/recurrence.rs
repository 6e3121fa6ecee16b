//! Recurrence expansion of visit templates.
//!
//! A template occurs on a candidate day when the weekday matches and the
//! week offset from its anchor divides by the recurrence interval. The
//! anchor is the template's `recurrence_start_date` when set, otherwise the
//! day the care receiver was created. The stored recurrence label is
//! diagnostic; the interval field is authoritative.

use chrono::NaiveDate;

use crate::domain::{DayOfWeek, Recurrence, VisitTemplate};

/// True when `template` recurs on `date`.
pub fn occurs_on(template: &VisitTemplate, receiver_created: NaiveDate, date: NaiveDate) -> bool {
    if !template.days_of_week.contains(&DayOfWeek::of(date)) {
        return false;
    }
    // Templates are never expanded before their explicit start date.
    if let Some(start) = template.recurrence_start_date {
        if date < start {
            return false;
        }
    }
    if template.recurrence == Recurrence::Weekly {
        return true;
    }

    let anchor = template.recurrence_start_date.unwrap_or(receiver_created);
    let days = (date - anchor).num_days();
    if days < 0 {
        return false;
    }
    let weeks = days / 7;
    weeks % i64::from(template.recurrence_interval) == 0
}

/// All days in `[from, to]`, in increasing order.
pub fn days_inclusive(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take_while(move |d| *d <= to)
}

/// The dates `template` expands to over `[from, to]`.
pub fn expansion_dates(
    template: &VisitTemplate,
    receiver_created: NaiveDate,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<NaiveDate> {
    days_inclusive(from, to)
        .filter(|d| occurs_on(template, receiver_created, *d))
        .collect()
}
