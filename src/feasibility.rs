//! The feasibility oracle.
//!
//! Answers "can this care giver take this visit on this date at this time"
//! with an explanatory rejection. Checks run in a fixed order and
//! short-circuit on the first failure: existence, holiday, weekly pattern,
//! daily cap, intra-day overlap, then travel gaps on both sides.

use chrono::{NaiveDate, NaiveTime};
use std::fmt;
use uuid::Uuid;

use crate::availability;
use crate::domain::{DayOfWeek, GeoPoint, SystemSettings, hhmm};
use crate::geo::{minutes_between, TravelEstimator};
use crate::store::Store;

/// Why a care giver cannot take a visit. `Display` texts are suitable for
/// end-user reporting.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    UnknownCareGiver,
    Inactive,
    OnTimeOff { date: NaiveDate },
    NotWorkingWeekday { day: DayOfWeek },
    OutsideWorkingSlots { day: DayOfWeek },
    DailyCapReached { cap: usize },
    OverlappingAppointment { start: NaiveTime, end: NaiveTime },
    InsufficientTravelFromPrevious { gap: i64, required: i64 },
    InsufficientTravelToNext { gap: i64, required: i64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::UnknownCareGiver => write!(f, "care giver not found"),
            Rejection::Inactive => write!(f, "care giver is not active"),
            Rejection::OnTimeOff { date } => write!(f, "on time off on {date}"),
            Rejection::NotWorkingWeekday { day } => write!(f, "not working on {day}"),
            Rejection::OutsideWorkingSlots { day } => {
                write!(f, "no working slot on {day} covers the visit time")
            }
            Rejection::DailyCapReached { cap } => {
                write!(f, "daily limit of {cap} appointments reached")
            }
            Rejection::OverlappingAppointment { start, end } => write!(
                f,
                "overlaps an existing appointment {}-{}",
                hhmm::format(*start),
                hhmm::format(*end)
            ),
            Rejection::InsufficientTravelFromPrevious { gap, required } => write!(
                f,
                "insufficient travel time from previous appointment ({gap} min available, {required} min required)"
            ),
            Rejection::InsufficientTravelToNext { gap, required } => write!(
                f,
                "insufficient travel time to next appointment ({gap} min available, {required} min required)"
            ),
        }
    }
}

/// Outcome of a feasibility check.
#[derive(Debug, Clone)]
pub struct Feasibility {
    pub available: bool,
    pub rejection: Option<Rejection>,
    /// Ids of appointments the rejection stems from, when any.
    pub conflicts: Vec<Uuid>,
}

impl Feasibility {
    fn ok() -> Self {
        Self {
            available: true,
            rejection: None,
            conflicts: Vec::new(),
        }
    }

    fn rejected(rejection: Rejection) -> Self {
        Self {
            available: false,
            rejection: Some(rejection),
            conflicts: Vec::new(),
        }
    }

    fn rejected_by(rejection: Rejection, conflicts: Vec<Uuid>) -> Self {
        Self {
            available: false,
            rejection: Some(rejection),
            conflicts,
        }
    }

    /// The rejection as display text, empty for a feasible outcome.
    pub fn reason(&self) -> String {
        self.rejection.as_ref().map(ToString::to_string).unwrap_or_default()
    }
}

/// Runs the ordered feasibility checks for one care giver and visit window.
///
/// `exclude` leaves one appointment out of the cap, overlap and travel
/// checks, so an existing booking can be revalidated against its peers.
#[allow(clippy::too_many_arguments)]
pub async fn is_available(
    store: &Store,
    settings: &SystemSettings,
    travel: &mut TravelEstimator,
    care_giver_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    receiver_location: GeoPoint,
    exclude: Option<Uuid>,
) -> Feasibility {
    // 1. Existence and active flag.
    let Some(care_giver) = store.care_giver(care_giver_id) else {
        return Feasibility::rejected(Rejection::UnknownCareGiver);
    };
    if !care_giver.is_active {
        return Feasibility::rejected(Rejection::Inactive);
    }

    // 2. Holiday, at UTC day resolution, from both the versioned history
    //    and the inline list.
    if availability::on_time_off(&store.availability, &care_giver, date) {
        return Feasibility::rejected(Rejection::OnTimeOff { date });
    }

    // 3. Weekly pattern: the weekday must have a slot fully containing the
    //    visit window. Touching the slot boundaries is allowed.
    let day = DayOfWeek::of(date);
    let resolved = availability::resolve_for(&store.availability, &care_giver, date);
    if !resolved.works_on(day) {
        return Feasibility::rejected(Rejection::NotWorkingWeekday { day });
    }
    if resolved.slot_containing(day, start, end).is_none() {
        return Feasibility::rejected(Rejection::OutsideWorkingSlots { day });
    }

    // 4. Daily cap, counting both primary and secondary roles.
    let engagements = store.engagements_on(care_giver_id, date, exclude);
    if engagements.len() >= settings.max_appointments_per_day {
        return Feasibility::rejected(Rejection::DailyCapReached {
            cap: settings.max_appointments_per_day,
        });
    }

    // 5. Intra-day overlap, half-open: touching endpoints do not conflict.
    if let Some(conflict) = engagements.iter().find(|a| a.overlaps(start, end)) {
        return Feasibility::rejected_by(
            Rejection::OverlappingAppointment {
                start: conflict.start_time,
                end: conflict.end_time,
            },
            vec![conflict.id],
        );
    }

    // 6. Travel gap from the latest prior appointment. Skipped silently
    //    when the adjacent receiver has no known location.
    if let Some(prior) = engagements
        .iter()
        .filter(|a| a.end_time <= start)
        .max_by_key(|a| a.end_time)
    {
        if let Some(prior_location) = store.care_receiver(prior.care_receiver).map(|r| r.home_location)
        {
            let gap = minutes_between(prior.end_time, start);
            let required = travel.minutes(prior_location, receiver_location).await
                + settings.travel_time_buffer_minutes;
            if gap < required {
                return Feasibility::rejected_by(
                    Rejection::InsufficientTravelFromPrevious { gap, required },
                    vec![prior.id],
                );
            }
        }
    }

    // 7. Travel gap to the earliest following appointment.
    if let Some(next) = engagements
        .iter()
        .filter(|a| a.start_time >= end)
        .min_by_key(|a| a.start_time)
    {
        if let Some(next_location) = store.care_receiver(next.care_receiver).map(|r| r.home_location)
        {
            let gap = minutes_between(end, next.start_time);
            let required = travel.minutes(receiver_location, next_location).await
                + settings.travel_time_buffer_minutes;
            if gap < required {
                return Feasibility::rejected_by(
                    Rejection::InsufficientTravelToNext { gap, required },
                    vec![next.id],
                );
            }
        }
    }

    Feasibility::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Appointment, AppointmentStatus, CareGiver, CareReceiver, Gender, GenderPreference, TimeOff,
        TimeSlot, WeeklySchedule,
    };
    use std::collections::{BTreeMap, BTreeSet};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn all_week_schedule() -> WeeklySchedule {
        let mut days = BTreeMap::new();
        for d in DayOfWeek::ALL {
            days.insert(d, vec![TimeSlot::new(t(8, 0), t(18, 0))]);
        }
        WeeklySchedule(days)
    }

    fn care_giver(location: GeoPoint) -> CareGiver {
        CareGiver {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: None,
            phone: None,
            home_location: location,
            gender: Gender::Female,
            skills: BTreeSet::new(),
            can_drive: true,
            single_handed_only: false,
            max_receivers: None,
            weekly_schedule: all_week_schedule(),
            time_off: vec![],
            is_active: true,
        }
    }

    fn receiver_at(location: GeoPoint) -> CareReceiver {
        CareReceiver {
            id: Uuid::new_v4(),
            name: "X".into(),
            home_location: location,
            gender: Gender::Male,
            gender_preference: GenderPreference::NoPreference,
            preferred_care_giver: None,
            visits: vec![],
            created_at: day(2025, 12, 1),
            is_active: true,
        }
    }

    fn appointment(
        care_giver: Uuid,
        care_receiver: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            care_receiver,
            care_giver,
            secondary_care_giver: None,
            date,
            start_time: start,
            end_time: end,
            duration_minutes: minutes_between(start, end) as u32,
            visit_number: 1,
            requirements: BTreeSet::new(),
            double_handed: false,
            priority: 3,
            status: AppointmentStatus::Scheduled,
            cancellation_reason: None,
            invalidation_reason: None,
            invalidated_at: None,
            snapshot: None,
            created_at: chrono::Utc::now(),
        }
    }

    async fn check(
        store: &Store,
        cg: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        at: GeoPoint,
    ) -> Feasibility {
        let mut travel = TravelEstimator::offline();
        let settings = SystemSettings::default();
        is_available(store, &settings, &mut travel, cg, date, start, end, at, None).await
    }

    #[tokio::test]
    async fn accepts_inside_working_slot_including_boundaries() {
        let store = Store::new();
        let loc = GeoPoint::new(0.0, 0.0);
        let cg = care_giver(loc);
        let cg_id = cg.id;
        store.upsert_care_giver(cg);

        let monday = day(2026, 1, 5);
        // Exact slot start and exact slot end are both allowed.
        assert!(check(&store, cg_id, monday, t(8, 0), t(9, 0), loc).await.available);
        assert!(check(&store, cg_id, monday, t(17, 0), t(18, 0), loc).await.available);
        let out = check(&store, cg_id, monday, t(17, 30), t(18, 30), loc).await;
        assert!(!out.available);
        assert!(matches!(out.rejection, Some(Rejection::OutsideWorkingSlots { .. })));
    }

    #[tokio::test]
    async fn rejects_unknown_inactive_and_on_holiday() {
        let store = Store::new();
        let loc = GeoPoint::new(0.0, 0.0);

        let out = check(&store, Uuid::new_v4(), day(2026, 1, 5), t(9, 0), t(10, 0), loc).await;
        assert_eq!(out.rejection, Some(Rejection::UnknownCareGiver));

        let mut cg = care_giver(loc);
        cg.is_active = false;
        let inactive_id = cg.id;
        store.upsert_care_giver(cg);
        let out = check(&store, inactive_id, day(2026, 1, 5), t(9, 0), t(10, 0), loc).await;
        assert_eq!(out.rejection, Some(Rejection::Inactive));

        let mut cg = care_giver(loc);
        cg.time_off = vec![TimeOff {
            start: day(2026, 1, 5),
            end: day(2026, 1, 9),
            reason: None,
        }];
        let on_leave = cg.id;
        store.upsert_care_giver(cg);
        let out = check(&store, on_leave, day(2026, 1, 7), t(9, 0), t(10, 0), loc).await;
        assert!(matches!(out.rejection, Some(Rejection::OnTimeOff { .. })));
        assert!(check(&store, on_leave, day(2026, 1, 10), t(9, 0), t(10, 0), loc).await.available);
    }

    #[tokio::test]
    async fn daily_cap_counts_both_roles() {
        let store = Store::new();
        let loc = GeoPoint::new(0.0, 0.0);
        let cg = care_giver(loc);
        let cg_id = cg.id;
        store.upsert_care_giver(cg);
        let receiver = receiver_at(loc);
        let receiver_id = receiver.id;
        store.upsert_care_receiver(receiver).unwrap();

        let date = day(2026, 1, 5);
        // Cap of 8: four as primary, four as secondary, back to back.
        for i in 0..8u32 {
            let start = t(8 + i, 0);
            let end = t(9 + i, 0);
            let mut apt = appointment(cg_id, receiver_id, date, start, end);
            if i % 2 == 1 {
                apt.care_giver = Uuid::new_v4();
                apt.secondary_care_giver = Some(cg_id);
            }
            store.insert_appointment(apt);
        }

        let out = check(&store, cg_id, date, t(16, 30), t(17, 0), loc).await;
        assert_eq!(out.rejection, Some(Rejection::DailyCapReached { cap: 8 }));
    }

    #[tokio::test]
    async fn overlap_rejects_but_touching_endpoints_pass() {
        let store = Store::new();
        let loc = GeoPoint::new(0.0, 0.0);
        let cg = care_giver(loc);
        let cg_id = cg.id;
        store.upsert_care_giver(cg);
        let receiver = receiver_at(loc);
        let receiver_id = receiver.id;
        store.upsert_care_receiver(receiver).unwrap();

        let date = day(2026, 1, 5);
        let existing = appointment(cg_id, receiver_id, date, t(10, 0), t(11, 0));
        let existing_id = existing.id;
        store.insert_appointment(existing);

        let out = check(&store, cg_id, date, t(10, 30), t(11, 30), loc).await;
        assert!(matches!(out.rejection, Some(Rejection::OverlappingAppointment { .. })));
        assert_eq!(out.conflicts, vec![existing_id]);

        // Same location: travel requirement is just the buffer, and the
        // touching bookings leave a zero gap, so move the new visit clear
        // of the buffer window.
        assert!(check(&store, cg_id, date, t(11, 15), t(12, 0), loc).await.available);
    }

    #[tokio::test]
    async fn travel_gap_from_previous_appointment() {
        let store = Store::new();
        // ~4.95 km apart at the equator: 10 fallback minutes at 30 km/h.
        let loc_x = GeoPoint::new(0.0, 0.0);
        let loc_y = GeoPoint::new(0.0445, 0.0);

        let cg = care_giver(loc_x);
        let cg_id = cg.id;
        store.upsert_care_giver(cg);

        let x = receiver_at(loc_x);
        let x_id = x.id;
        store.upsert_care_receiver(x).unwrap();

        let date = day(2026, 1, 5);
        store.insert_appointment(appointment(cg_id, x_id, date, t(9, 0), t(10, 0)));

        // Gap 20 < travel 10 + buffer 15 = 25: rejected.
        let out = check(&store, cg_id, date, t(10, 20), t(11, 0), loc_y).await;
        match out.rejection {
            Some(Rejection::InsufficientTravelFromPrevious { gap, required }) => {
                assert_eq!(gap, 20);
                assert_eq!(required, 25);
            }
            other => panic!("unexpected rejection {other:?}"),
        }
        assert!(out.reason().contains("insufficient travel time from previous"));

        // Gap equal to the requirement is allowed.
        assert!(check(&store, cg_id, date, t(10, 25), t(11, 0), loc_y).await.available);
    }

    #[tokio::test]
    async fn travel_gap_to_next_appointment() {
        let store = Store::new();
        let loc_x = GeoPoint::new(0.0, 0.0);
        let loc_y = GeoPoint::new(0.0445, 0.0);

        let cg = care_giver(loc_x);
        let cg_id = cg.id;
        store.upsert_care_giver(cg);

        let x = receiver_at(loc_x);
        let x_id = x.id;
        store.upsert_care_receiver(x).unwrap();

        let date = day(2026, 1, 5);
        store.insert_appointment(appointment(cg_id, x_id, date, t(12, 0), t(13, 0)));

        // New visit at Y ending 11:40, next starts 12:00 at X: 20 < 25.
        let out = check(&store, cg_id, date, t(10, 40), t(11, 40), loc_y).await;
        assert!(matches!(out.rejection, Some(Rejection::InsufficientTravelToNext { .. })));

        assert!(check(&store, cg_id, date, t(10, 35), t(11, 35), loc_y).await.available);
    }
}
