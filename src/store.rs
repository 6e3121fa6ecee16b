//! In-memory persistence.
//!
//! `parking_lot::RwLock` maps per entity kind. Write sections are short and
//! per-map, which gives the serializability the engine expects from its
//! persistence layer: appointment inserts are atomic, and availability
//! versioning (see [`crate::availability`]) closes and opens versions for a
//! care giver under one write lock.

use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::availability::AvailabilityStore;
use crate::domain::{
    Appointment, AppointmentStatus, CareGiver, CareReceiver, SystemSettings, ValidationError,
};

#[derive(Default)]
pub struct Store {
    care_givers: RwLock<HashMap<Uuid, CareGiver>>,
    care_receivers: RwLock<HashMap<Uuid, CareReceiver>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    pub availability: AvailabilityStore,
    settings: RwLock<SystemSettings>,
}

/// Filters for the appointment listing surface.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub care_giver: Option<Uuid>,
    pub care_receiver: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all entities and resets settings. Used by demo-data loading.
    pub fn clear(&self) {
        self.care_givers.write().clear();
        self.care_receivers.write().clear();
        self.appointments.write().clear();
        self.availability.clear();
        *self.settings.write() = SystemSettings::default();
    }

    // ------------------------------------------------------------------
    // Care givers
    // ------------------------------------------------------------------

    pub fn upsert_care_giver(&self, care_giver: CareGiver) {
        self.care_givers.write().insert(care_giver.id, care_giver);
    }

    pub fn care_giver(&self, id: Uuid) -> Option<CareGiver> {
        self.care_givers.read().get(&id).cloned()
    }

    /// All active care givers, sorted by id. The sort fixes candidate
    /// iteration order so assignment runs are replayable.
    pub fn active_care_givers(&self) -> Vec<CareGiver> {
        let mut givers: Vec<CareGiver> = self
            .care_givers
            .read()
            .values()
            .filter(|cg| cg.is_active)
            .cloned()
            .collect();
        givers.sort_by_key(|cg| cg.id);
        givers
    }

    // ------------------------------------------------------------------
    // Care receivers
    // ------------------------------------------------------------------

    /// Validates and persists a care receiver. Visit templates are checked
    /// and sorted by visit number before the write.
    pub fn upsert_care_receiver(&self, mut receiver: CareReceiver) -> Result<(), ValidationError> {
        receiver.validate()?;
        self.care_receivers.write().insert(receiver.id, receiver);
        Ok(())
    }

    pub fn care_receiver(&self, id: Uuid) -> Option<CareReceiver> {
        self.care_receivers.read().get(&id).cloned()
    }

    /// All active care receivers, sorted by id.
    pub fn active_care_receivers(&self) -> Vec<CareReceiver> {
        let mut receivers: Vec<CareReceiver> = self
            .care_receivers
            .read()
            .values()
            .filter(|cr| cr.is_active)
            .cloned()
            .collect();
        receivers.sort_by_key(|cr| cr.id);
        receivers
    }

    // ------------------------------------------------------------------
    // Appointments
    // ------------------------------------------------------------------

    pub fn insert_appointment(&self, appointment: Appointment) {
        self.appointments.write().insert(appointment.id, appointment);
    }

    pub fn appointment(&self, id: Uuid) -> Option<Appointment> {
        self.appointments.read().get(&id).cloned()
    }

    /// Applies a mutation to an appointment, returning the updated copy.
    pub fn update_appointment<F>(&self, id: Uuid, mutate: F) -> Option<Appointment>
    where
        F: FnOnce(&mut Appointment),
    {
        let mut appointments = self.appointments.write();
        let appointment = appointments.get_mut(&id)?;
        mutate(appointment);
        Some(appointment.clone())
    }

    pub fn delete_appointment(&self, id: Uuid) -> bool {
        self.appointments.write().remove(&id).is_some()
    }

    /// Engaged (scheduled or in-progress) appointments on `date` that the
    /// care giver is assigned to in either role, sorted by start time.
    /// `exclude` leaves out one appointment, for revalidation of an
    /// existing booking.
    pub fn engagements_on(
        &self,
        care_giver: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Vec<Appointment> {
        let mut engaged: Vec<Appointment> = self
            .appointments
            .read()
            .values()
            .filter(|a| {
                a.date == date
                    && a.status.is_engaged()
                    && a.involves(care_giver)
                    && Some(a.id) != exclude
            })
            .cloned()
            .collect();
        engaged.sort_by_key(|a| (a.start_time, a.id));
        engaged
    }

    /// True when a non-cancelled, non-missed appointment already fills the
    /// `(receiver, date, visit_number)` slot. Guards generate re-runs
    /// against duplicates.
    pub fn slot_occupied(&self, care_receiver: Uuid, date: NaiveDate, visit_number: u8) -> bool {
        self.appointments.read().values().any(|a| {
            a.care_receiver == care_receiver
                && a.date == date
                && a.visit_number == visit_number
                && a.status.occupies_slot()
        })
    }

    /// Appointments matching the filter, sorted by (date, start, id).
    pub fn appointments_filtered(&self, filter: &AppointmentFilter) -> Vec<Appointment> {
        let mut matching: Vec<Appointment> = self
            .appointments
            .read()
            .values()
            .filter(|a| {
                filter.from.map_or(true, |from| a.date >= from)
                    && filter.to.map_or(true, |to| a.date <= to)
                    && filter.care_giver.map_or(true, |cg| a.involves(cg))
                    && filter.care_receiver.map_or(true, |cr| a.care_receiver == cr)
                    && filter.status.map_or(true, |s| a.status == s)
            })
            .cloned()
            .collect();
        matching.sort_by_key(|a| (a.date, a.start_time, a.id));
        matching
    }

    // ------------------------------------------------------------------
    // Settings singleton
    // ------------------------------------------------------------------

    pub fn load_settings(&self) -> SystemSettings {
        self.settings.read().clone()
    }

    /// Persists validated settings. Callers validate first; this is the raw
    /// write.
    pub fn save_settings(&self, settings: SystemSettings) {
        *self.settings.write() = settings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeoPoint, Gender, GenderPreference};
    use chrono::NaiveTime;
    use std::collections::BTreeSet;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn appointment(care_giver: Uuid, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            care_receiver: Uuid::new_v4(),
            care_giver,
            secondary_care_giver: None,
            date,
            start_time: start,
            end_time: end,
            duration_minutes: 60,
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

    #[test]
    fn engagements_count_secondary_role_and_exclude() {
        let store = Store::new();
        let cg = Uuid::new_v4();
        let date = day(2026, 1, 5);

        let primary = appointment(cg, date, t(9, 0), t(10, 0));
        let mut as_secondary = appointment(Uuid::new_v4(), date, t(11, 0), t(12, 0));
        as_secondary.secondary_care_giver = Some(cg);
        let mut cancelled = appointment(cg, date, t(13, 0), t(14, 0));
        cancelled.status = AppointmentStatus::Cancelled;
        let other_day = appointment(cg, day(2026, 1, 6), t(9, 0), t(10, 0));

        let primary_id = primary.id;
        for a in [primary, as_secondary, cancelled, other_day] {
            store.insert_appointment(a);
        }

        let engaged = store.engagements_on(cg, date, None);
        assert_eq!(engaged.len(), 2);
        assert!(engaged[0].start_time < engaged[1].start_time);

        let engaged = store.engagements_on(cg, date, Some(primary_id));
        assert_eq!(engaged.len(), 1);
    }

    #[test]
    fn slot_occupied_ignores_cancelled() {
        let store = Store::new();
        let receiver = Uuid::new_v4();
        let date = day(2026, 1, 5);

        let mut a = appointment(Uuid::new_v4(), date, t(9, 0), t(10, 0));
        a.care_receiver = receiver;
        a.visit_number = 2;
        a.status = AppointmentStatus::Cancelled;
        store.insert_appointment(a.clone());
        assert!(!store.slot_occupied(receiver, date, 2));

        a.id = Uuid::new_v4();
        a.status = AppointmentStatus::NeedsReassignment;
        store.insert_appointment(a);
        assert!(store.slot_occupied(receiver, date, 2));
        assert!(!store.slot_occupied(receiver, date, 1));
    }

    #[test]
    fn receiver_upsert_rejects_bad_sequence() {
        let store = Store::new();
        let mut receiver = CareReceiver {
            id: Uuid::new_v4(),
            name: "Margaret".into(),
            home_location: GeoPoint::new(-1.54, 53.79),
            gender: Gender::Female,
            gender_preference: GenderPreference::NoPreference,
            preferred_care_giver: None,
            visits: vec![],
            created_at: day(2025, 12, 1),
            is_active: true,
        };
        assert!(store.upsert_care_receiver(receiver.clone()).is_ok());

        receiver.visits = vec![crate::domain::VisitTemplate {
            visit_number: 2,
            preferred_time: t(9, 0),
            duration_minutes: 60,
            requirements: BTreeSet::new(),
            double_handed: false,
            priority: 3,
            days_of_week: crate::domain::DayOfWeek::every_day(),
            recurrence: crate::domain::Recurrence::Weekly,
            recurrence_interval: 1,
            recurrence_start_date: None,
        }];
        assert!(store.upsert_care_receiver(receiver).is_err());
    }

    #[test]
    fn active_listings_are_sorted_by_id() {
        let store = Store::new();
        for _ in 0..5 {
            let cg = CareGiver {
                id: Uuid::new_v4(),
                name: "cg".into(),
                email: None,
                phone: None,
                home_location: GeoPoint::new(0.0, 0.0),
                gender: Gender::Female,
                skills: BTreeSet::new(),
                can_drive: false,
                single_handed_only: false,
                max_receivers: None,
                weekly_schedule: Default::default(),
                time_off: vec![],
                is_active: true,
            };
            store.upsert_care_giver(cg);
        }
        let givers = store.active_care_givers();
        assert!(givers.windows(2).all(|w| w[0].id < w[1].id));
    }
}
