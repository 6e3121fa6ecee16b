//! Versioned availability history per care giver.
//!
//! Weekly schedules and holiday blocks are append-only
//! [`AvailabilityVersion`] records. At any instant a care giver has at most
//! one open version (`effective_to = None`, active); creating a new version
//! closes the open one in the same write section, so readers never observe
//! two simultaneously open versions.
//!
//! Care givers predating the versioned store fall back to the inline weekly
//! pattern and holiday list on their record, surfaced as a read-only
//! pseudo-version (version 0).

use chrono::{NaiveDate, NaiveTime};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{
    AvailabilityVersion, CareGiver, DayOfWeek, ScheduleSnapshot, TimeOff, TimeSlot, WeeklySchedule,
};

#[derive(Default)]
pub struct AvailabilityStore {
    versions: RwLock<HashMap<Uuid, Vec<AvailabilityVersion>>>,
}

impl AvailabilityStore {
    pub fn clear(&self) {
        self.versions.write().clear();
    }

    /// Appends a new open version, atomically closing any currently open
    /// version for the care giver. The whole transition happens under one
    /// write lock, making versioning linearizable per care giver.
    pub fn create_version(
        &self,
        care_giver: Uuid,
        schedule: WeeklySchedule,
        time_off: Vec<TimeOff>,
        effective_from: NaiveDate,
    ) -> AvailabilityVersion {
        let mut versions = self.versions.write();
        let history = versions.entry(care_giver).or_default();

        for existing in history.iter_mut() {
            if existing.effective_to.is_none() && existing.is_active {
                existing.effective_to = Some(effective_from);
                existing.is_active = false;
            }
        }

        let next_version = history.iter().map(|v| v.version).max().unwrap_or(0) + 1;
        let version = AvailabilityVersion {
            id: Uuid::new_v4(),
            care_giver,
            effective_from,
            effective_to: None,
            schedule,
            time_off,
            version: next_version,
            is_active: true,
        };
        history.push(version.clone());
        version
    }

    /// The active version in force on `at_date`: `effective_from ≤ at_date`
    /// and `effective_to` absent or `≥ at_date`. Ties go to the greatest
    /// `effective_from`.
    pub fn current_for(&self, care_giver: Uuid, at_date: NaiveDate) -> Option<AvailabilityVersion> {
        self.versions
            .read()
            .get(&care_giver)?
            .iter()
            .filter(|v| v.is_active && Self::in_force(v, at_date))
            .max_by_key(|v| v.effective_from)
            .cloned()
    }

    /// Like [`Self::current_for`] but ignoring `is_active`; historical
    /// audit of what schedule governed a past date.
    pub fn at(&self, care_giver: Uuid, at_date: NaiveDate) -> Option<AvailabilityVersion> {
        self.versions
            .read()
            .get(&care_giver)?
            .iter()
            .filter(|v| Self::in_force(v, at_date))
            .max_by_key(|v| v.effective_from)
            .cloned()
    }

    /// All versions for a care giver, newest `effective_from` first.
    pub fn history(&self, care_giver: Uuid) -> Vec<AvailabilityVersion> {
        let mut history = self
            .versions
            .read()
            .get(&care_giver)
            .cloned()
            .unwrap_or_default();
        history.sort_by(|a, b| b.effective_from.cmp(&a.effective_from));
        history
    }

    fn in_force(version: &AvailabilityVersion, at_date: NaiveDate) -> bool {
        version.effective_from <= at_date && version.effective_to.map_or(true, |to| to >= at_date)
    }
}

/// A care giver's schedule as resolved for one date: either the versioned
/// store's current version or the synthesized legacy fallback.
#[derive(Debug, Clone)]
pub struct ResolvedSchedule {
    /// `None` for the legacy fallback.
    pub version_id: Option<Uuid>,
    pub version: u32,
    pub schedule: WeeklySchedule,
    pub time_off: Vec<TimeOff>,
}

impl ResolvedSchedule {
    pub fn on_time_off(&self, date: NaiveDate) -> bool {
        self.time_off.iter().any(|t| t.covers(date))
    }

    pub fn works_on(&self, day: DayOfWeek) -> bool {
        self.schedule.works_on(day)
    }

    pub fn slot_containing(&self, day: DayOfWeek, start: NaiveTime, end: NaiveTime) -> Option<&TimeSlot> {
        self.schedule.slot_containing(day, start, end)
    }

    /// The snapshot stored on appointments created under this schedule.
    pub fn snapshot_for(&self, day: DayOfWeek) -> ScheduleSnapshot {
        ScheduleSnapshot {
            version_id: self.version_id,
            version: self.version,
            weekday_slots: self.schedule.slots_for(day).to_vec(),
        }
    }
}

/// Resolves the schedule governing `care_giver` on `date`. The versioned
/// store is the source of truth; the inline pattern only serves care givers
/// with no version at all.
pub fn resolve_for(
    availability: &AvailabilityStore,
    care_giver: &CareGiver,
    date: NaiveDate,
) -> ResolvedSchedule {
    match availability.current_for(care_giver.id, date) {
        Some(version) => ResolvedSchedule {
            version_id: Some(version.id),
            version: version.version,
            schedule: version.schedule,
            time_off: version.time_off,
        },
        None => ResolvedSchedule {
            version_id: None,
            version: 0,
            schedule: care_giver.weekly_schedule.clone(),
            time_off: care_giver.time_off.clone(),
        },
    }
}

/// Day-resolution holiday check consulting both the versioned history and
/// the inline list on the care giver record.
pub fn on_time_off(availability: &AvailabilityStore, care_giver: &CareGiver, date: NaiveDate) -> bool {
    let versioned = availability
        .current_for(care_giver.id, date)
        .map_or(false, |v| v.on_time_off(date));
    versioned || care_giver.time_off.iter().any(|t| t.covers(date))
}
