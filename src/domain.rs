//! Domain model for domiciliary-care scheduling.
//!
//! Closed vocabularies (skills, weekdays, statuses, recurrence) are enums so
//! that handling stays exhaustive. Clock times are [`chrono::NaiveTime`]
//! values serialized as `"HH:MM"`; calendar days are [`chrono::NaiveDate`]
//! values interpreted as UTC days throughout.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Serde adapter for `"HH:MM"` clock strings.
///
/// Parsing is strict: exactly five characters, 24-hour form, minutes below
/// sixty. `"9:00"` and `"24:00"` are both rejected.
pub mod hhmm {
    use chrono::{NaiveTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format!("{:02}:{:02}", time.hour(), time.minute()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(de)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Parses an `"HH:MM"` string.
    pub fn parse(s: &str) -> Result<NaiveTime, String> {
        let bytes = s.as_bytes();
        let valid = bytes.len() == 5
            && bytes[2] == b':'
            && bytes.iter().enumerate().all(|(i, b)| i == 2 || b.is_ascii_digit());
        if !valid {
            return Err(format!("invalid HH:MM time: {s:?}"));
        }
        let hour: u32 = s[..2].parse().map_err(|_| format!("invalid HH:MM time: {s:?}"))?;
        let minute: u32 = s[3..].parse().map_err(|_| format!("invalid HH:MM time: {s:?}"))?;
        NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| format!("invalid HH:MM time: {s:?}"))
    }

    /// Formats a time back to `"HH:MM"`.
    pub fn format(time: NaiveTime) -> String {
        format!("{:02}:{:02}", time.hour(), time.minute())
    }
}

/// A geographic point as (longitude, latitude) in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }
}

/// The closed skill vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    PersonalCare,
    MedicationManagement,
    DementiaCare,
    MobilityAssistance,
    MealPreparation,
    Companionship,
    HouseholdTasks,
    SpecializedMedical,
}

impl Skill {
    pub const ALL: [Skill; 8] = [
        Skill::PersonalCare,
        Skill::MedicationManagement,
        Skill::DementiaCare,
        Skill::MobilityAssistance,
        Skill::MealPreparation,
        Skill::Companionship,
        Skill::HouseholdTasks,
        Skill::SpecializedMedical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::PersonalCare => "personal_care",
            Skill::MedicationManagement => "medication_management",
            Skill::DementiaCare => "dementia_care",
            Skill::MobilityAssistance => "mobility_assistance",
            Skill::MealPreparation => "meal_preparation",
            Skill::Companionship => "companionship",
            Skill::HouseholdTasks => "household_tasks",
            Skill::SpecializedMedical => "specialized_medical",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// A care receiver's preference for the gender of assigned care givers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenderPreference {
    Male,
    Female,
    #[default]
    #[serde(rename = "No Preference")]
    NoPreference,
}

impl GenderPreference {
    /// True when `gender` satisfies this preference.
    pub fn accepts(&self, gender: Gender) -> bool {
        match self {
            GenderPreference::Male => gender == Gender::Male,
            GenderPreference::Female => gender == Gender::Female,
            GenderPreference::NoPreference => true,
        }
    }
}

/// Days of the week, Monday-first (en-GB convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// The weekday of a UTC calendar day.
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }

    pub fn every_day() -> BTreeSet<DayOfWeek> {
        Self::ALL.iter().copied().collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence label on a visit template. The interval field is authoritative
/// for expansion; this label is diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    #[default]
    Weekly,
    Biweekly,
    Monthly,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Missed,
    NeedsReview,
    NeedsReassignment,
}

impl AppointmentStatus {
    /// Statuses that consume a care giver's time: counted for the daily cap
    /// and for intra-day overlap detection.
    pub fn is_engaged(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::InProgress)
    }

    /// Statuses that keep a `(receiver, date, visit_number)` slot occupied,
    /// so a repeated generate run will not materialize a duplicate.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Missed)
    }
}

/// A working interval within a day, inclusive start to inclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// True when `[start, end]` lies fully inside this slot. Touching either
    /// boundary is allowed.
    pub fn contains(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start <= start && end <= self.end
    }
}

/// A weekly working pattern: slots per weekday.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklySchedule(pub BTreeMap<DayOfWeek, Vec<TimeSlot>>);

impl WeeklySchedule {
    pub fn slots_for(&self, day: DayOfWeek) -> &[TimeSlot] {
        self.0.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when the weekday has at least one slot.
    pub fn works_on(&self, day: DayOfWeek) -> bool {
        !self.slots_for(day).is_empty()
    }

    /// The first slot that fully contains `[start, end]`, if any.
    pub fn slot_containing(&self, day: DayOfWeek, start: NaiveTime, end: NaiveTime) -> Option<&TimeSlot> {
        self.slots_for(day).iter().find(|slot| slot.contains(start, end))
    }

    /// True when no weekday has any slot.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

/// A holiday or other absence block, compared at UTC day resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOff {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TimeOff {
    /// True when `date` falls inside `[start, end]`, endpoints included.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareGiver {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub home_location: GeoPoint,
    pub gender: Gender,
    #[serde(default)]
    pub skills: BTreeSet<Skill>,
    #[serde(default)]
    pub can_drive: bool,
    /// When true this care giver never takes part in a double-handed visit,
    /// not even as primary.
    #[serde(default)]
    pub single_handed_only: bool,
    /// Soft cap on distinct receivers; not presently enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_receivers: Option<u32>,
    /// Inline default weekly pattern, superseded by the availability store
    /// once a version exists.
    #[serde(default)]
    pub weekly_schedule: WeeklySchedule,
    /// Inline holiday list, superseded alongside the weekly pattern.
    #[serde(default)]
    pub time_off: Vec<TimeOff>,
    pub is_active: bool,
}

impl CareGiver {
    pub fn has_skills(&self, required: &BTreeSet<Skill>) -> bool {
        required.is_subset(&self.skills)
    }

    /// Required skills the care giver lacks.
    pub fn missing_skills(&self, required: &BTreeSet<Skill>) -> Vec<Skill> {
        required.difference(&self.skills).copied().collect()
    }
}

fn default_priority() -> u8 {
    3
}

fn default_interval() -> u32 {
    1
}

/// A recurring daily visit owned by a care receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitTemplate {
    /// 1-indexed, sequential, unique within the receiver.
    pub visit_number: u8,
    #[serde(with = "hhmm")]
    pub preferred_time: NaiveTime,
    pub duration_minutes: u32,
    #[serde(default)]
    pub requirements: BTreeSet<Skill>,
    #[serde(default)]
    pub double_handed: bool,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "DayOfWeek::every_day")]
    pub days_of_week: BTreeSet<DayOfWeek>,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default = "default_interval")]
    pub recurrence_interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_start_date: Option<NaiveDate>,
}

impl VisitTemplate {
    /// End of the visit window, or `None` when it would cross midnight.
    pub fn end_time(&self) -> Option<NaiveTime> {
        crate::geo::add_minutes(self.preferred_time, self.duration_minutes as i64)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(15..=240).contains(&self.duration_minutes) {
            return Err(ValidationError::DurationOutOfRange {
                visit_number: self.visit_number,
                minutes: self.duration_minutes,
            });
        }
        if !(1..=5).contains(&self.priority) {
            return Err(ValidationError::PriorityOutOfRange {
                visit_number: self.visit_number,
                priority: self.priority,
            });
        }
        if !(1..=52).contains(&self.recurrence_interval) {
            return Err(ValidationError::IntervalOutOfRange {
                visit_number: self.visit_number,
                interval: self.recurrence_interval,
            });
        }
        if self.days_of_week.is_empty() {
            return Err(ValidationError::NoDaysOfWeek {
                visit_number: self.visit_number,
            });
        }
        if self.end_time().is_none() {
            return Err(ValidationError::CrossesMidnight {
                visit_number: self.visit_number,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareReceiver {
    pub id: Uuid,
    pub name: String,
    pub home_location: GeoPoint,
    pub gender: Gender,
    #[serde(default)]
    pub gender_preference: GenderPreference,
    /// Back-reference only; never ownership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_care_giver: Option<Uuid>,
    #[serde(default)]
    pub visits: Vec<VisitTemplate>,
    /// Anchor day for templates without an explicit recurrence start.
    pub created_at: NaiveDate,
    pub is_active: bool,
}

impl CareReceiver {
    /// Validates every template and the visit-number sequence, then sorts
    /// templates by visit number. An explicit write-time step; callers must
    /// invoke it before persisting.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        for visit in &self.visits {
            visit.validate()?;
        }
        self.visits.sort_by_key(|v| v.visit_number);
        let sequential = self
            .visits
            .iter()
            .enumerate()
            .all(|(i, v)| v.visit_number as usize == i + 1);
        if !sequential {
            return Err(ValidationError::VisitNumbersNotSequential);
        }
        Ok(())
    }

    pub fn visit(&self, visit_number: u8) -> Option<&VisitTemplate> {
        self.visits.iter().find(|v| v.visit_number == visit_number)
    }
}

/// One immutable entry of a care giver's availability history, valid over
/// `[effective_from, effective_to)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityVersion {
    pub id: Uuid,
    pub care_giver: Uuid,
    pub effective_from: NaiveDate,
    /// `None` while this is the open (current) version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<NaiveDate>,
    pub schedule: WeeklySchedule,
    #[serde(default)]
    pub time_off: Vec<TimeOff>,
    /// Monotone per care giver; 0 is reserved for the synthesized legacy
    /// fallback.
    pub version: u32,
    pub is_active: bool,
}

impl AvailabilityVersion {
    /// True when `date` lies inside any absence block, at day resolution.
    pub fn on_time_off(&self, date: NaiveDate) -> bool {
        self.time_off.iter().any(|t| t.covers(date))
    }

    /// True when some slot of the weekday pattern contains `time`.
    pub fn available_at(&self, day: DayOfWeek, time: NaiveTime) -> bool {
        self.schedule
            .slots_for(day)
            .iter()
            .any(|slot| slot.start <= time && time <= slot.end)
    }
}

/// Availability context captured when an appointment was created, so the
/// assignment remains auditable after the care giver's schedule changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    /// `None` when assignment used the synthesized legacy fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<Uuid>,
    pub version: u32,
    /// The primary care giver's slots for the appointment's weekday.
    pub weekday_slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub care_receiver: Uuid,
    pub care_giver: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_care_giver: Option<Uuid>,
    /// The UTC calendar day.
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
    pub visit_number: u8,
    #[serde(default)]
    pub requirements: BTreeSet<Skill>,
    #[serde(default)]
    pub double_handed: bool,
    pub priority: u8,
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ScheduleSnapshot>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Appointment {
    /// Half-open overlap: touching endpoints do not conflict.
    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start_time < end && start < self.end_time
    }

    /// True when the care giver is assigned in either role.
    pub fn involves(&self, care_giver: Uuid) -> bool {
        self.care_giver == care_giver || self.secondary_care_giver == Some(care_giver)
    }
}

/// The settings singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub max_distance_km: f64,
    pub travel_time_buffer_minutes: i64,
    pub max_appointments_per_day: usize,
    /// Informational working-hours window; not enforced by the oracle.
    pub working_hours: TimeSlot,
    pub preferred_caregiver_weight: f64,
    pub distance_weight: f64,
    pub availability_weight: f64,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            max_distance_km: 20.0,
            travel_time_buffer_minutes: 15,
            max_appointments_per_day: 8,
            working_hours: TimeSlot::new(
                NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            ),
            preferred_caregiver_weight: 0.4,
            distance_weight: 0.3,
            availability_weight: 0.3,
        }
    }
}

impl SystemSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let sum = self.preferred_caregiver_weight + self.distance_weight + self.availability_weight;
        if (sum - 1.0).abs() > 0.01 {
            return Err(ValidationError::WeightsDoNotSumToOne { sum });
        }
        if self.working_hours.end <= self.working_hours.start {
            return Err(ValidationError::WorkingHoursInverted);
        }
        Ok(())
    }
}

/// Rejected writes: invariant breaches detected before persisting.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    DurationOutOfRange { visit_number: u8, minutes: u32 },
    PriorityOutOfRange { visit_number: u8, priority: u8 },
    IntervalOutOfRange { visit_number: u8, interval: u32 },
    NoDaysOfWeek { visit_number: u8 },
    CrossesMidnight { visit_number: u8 },
    VisitNumbersNotSequential,
    WeightsDoNotSumToOne { sum: f64 },
    WorkingHoursInverted,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DurationOutOfRange { visit_number, minutes } => write!(
                f,
                "visit {visit_number}: duration {minutes} minutes outside the 15-240 range"
            ),
            ValidationError::PriorityOutOfRange { visit_number, priority } => {
                write!(f, "visit {visit_number}: priority {priority} outside the 1-5 range")
            }
            ValidationError::IntervalOutOfRange { visit_number, interval } => write!(
                f,
                "visit {visit_number}: recurrence interval {interval} outside the 1-52 range"
            ),
            ValidationError::NoDaysOfWeek { visit_number } => {
                write!(f, "visit {visit_number}: days of week must not be empty")
            }
            ValidationError::CrossesMidnight { visit_number } => {
                write!(f, "visit {visit_number}: visit must not cross midnight")
            }
            ValidationError::VisitNumbersNotSequential => {
                write!(f, "visit numbers must form the sequence 1..n with no gaps or duplicates")
            }
            ValidationError::WeightsDoNotSumToOne { sum } => {
                write!(f, "scoring weights must sum to 1.0, got {sum:.3}")
            }
            ValidationError::WorkingHoursInverted => {
                write!(f, "working hours must end after they start")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn template(visit_number: u8) -> VisitTemplate {
        VisitTemplate {
            visit_number,
            preferred_time: t(9, 0),
            duration_minutes: 60,
            requirements: BTreeSet::new(),
            double_handed: false,
            priority: 3,
            days_of_week: DayOfWeek::every_day(),
            recurrence: Recurrence::Weekly,
            recurrence_interval: 1,
            recurrence_start_date: None,
        }
    }

    #[test]
    fn hhmm_parse_is_strict() {
        assert_eq!(hhmm::parse("09:30"), Ok(t(9, 30)));
        assert_eq!(hhmm::parse("23:59"), Ok(t(23, 59)));
        assert!(hhmm::parse("9:30").is_err());
        assert!(hhmm::parse("24:00").is_err());
        assert!(hhmm::parse("12:60").is_err());
        assert!(hhmm::parse("12-30").is_err());
    }

    #[test]
    fn hhmm_roundtrip() {
        assert_eq!(hhmm::format(hhmm::parse("07:05").unwrap()), "07:05");
    }

    #[test]
    fn slot_boundaries_are_inclusive() {
        let slot = TimeSlot::new(t(8, 0), t(12, 0));
        assert!(slot.contains(t(8, 0), t(9, 0)));
        assert!(slot.contains(t(11, 0), t(12, 0)));
        assert!(!slot.contains(t(7, 59), t(9, 0)));
        assert!(!slot.contains(t(11, 30), t(12, 1)));
    }

    #[test]
    fn appointment_overlap_allows_touching_endpoints() {
        let apt = Appointment {
            id: Uuid::new_v4(),
            care_receiver: Uuid::new_v4(),
            care_giver: Uuid::new_v4(),
            secondary_care_giver: None,
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            start_time: t(9, 0),
            end_time: t(10, 0),
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
        };
        assert!(!apt.overlaps(t(10, 0), t(11, 0)));
        assert!(!apt.overlaps(t(8, 0), t(9, 0)));
        assert!(apt.overlaps(t(9, 30), t(10, 30)));
        assert!(apt.overlaps(t(8, 30), t(9, 1)));
    }

    #[test]
    fn template_validation_bounds() {
        let mut v = template(1);
        v.duration_minutes = 10;
        assert!(matches!(v.validate(), Err(ValidationError::DurationOutOfRange { .. })));

        let mut v = template(1);
        v.priority = 6;
        assert!(matches!(v.validate(), Err(ValidationError::PriorityOutOfRange { .. })));

        let mut v = template(1);
        v.days_of_week.clear();
        assert!(matches!(v.validate(), Err(ValidationError::NoDaysOfWeek { .. })));

        let mut v = template(1);
        v.preferred_time = t(23, 30);
        v.duration_minutes = 60;
        assert!(matches!(v.validate(), Err(ValidationError::CrossesMidnight { .. })));

        assert!(template(1).validate().is_ok());
    }

    #[test]
    fn receiver_visit_numbers_must_be_sequential() {
        let mut receiver = CareReceiver {
            id: Uuid::new_v4(),
            name: "Robert".into(),
            home_location: GeoPoint::new(-1.54, 53.79),
            gender: Gender::Male,
            gender_preference: GenderPreference::NoPreference,
            preferred_care_giver: None,
            visits: vec![template(2), template(1)],
            created_at: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            is_active: true,
        };
        // Out of order but sequential: validate sorts and accepts.
        assert!(receiver.validate().is_ok());
        assert_eq!(receiver.visits[0].visit_number, 1);

        receiver.visits = vec![template(1), template(3)];
        assert_eq!(receiver.validate(), Err(ValidationError::VisitNumbersNotSequential));

        receiver.visits = vec![template(1), template(1)];
        assert_eq!(receiver.validate(), Err(ValidationError::VisitNumbersNotSequential));
    }

    #[test]
    fn settings_weights_must_sum_to_one() {
        let mut settings = SystemSettings::default();
        assert!(settings.validate().is_ok());

        settings.distance_weight = 0.5;
        assert!(matches!(
            settings.validate(),
            Err(ValidationError::WeightsDoNotSumToOne { .. })
        ));

        let mut settings = SystemSettings::default();
        settings.working_hours = TimeSlot::new(t(18, 0), t(8, 0));
        assert_eq!(settings.validate(), Err(ValidationError::WorkingHoursInverted));
    }

    #[test]
    fn availability_version_lookups() {
        let mut days = BTreeMap::new();
        days.insert(DayOfWeek::Monday, vec![TimeSlot::new(t(8, 0), t(12, 0))]);
        let version = AvailabilityVersion {
            id: Uuid::new_v4(),
            care_giver: Uuid::new_v4(),
            effective_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            effective_to: None,
            schedule: WeeklySchedule(days),
            time_off: vec![TimeOff {
                start: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2026, 2, 3).unwrap(),
                reason: None,
            }],
            version: 1,
            is_active: true,
        };

        assert!(version.available_at(DayOfWeek::Monday, t(8, 0)));
        assert!(version.available_at(DayOfWeek::Monday, t(12, 0)));
        assert!(!version.available_at(DayOfWeek::Monday, t(12, 1)));
        assert!(!version.available_at(DayOfWeek::Tuesday, t(9, 0)));

        assert!(version.on_time_off(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()));
        assert!(version.on_time_off(NaiveDate::from_ymd_opt(2026, 2, 3).unwrap()));
        assert!(!version.on_time_off(NaiveDate::from_ymd_opt(2026, 2, 4).unwrap()));
    }

    #[test]
    fn gender_preference_accepts() {
        assert!(GenderPreference::NoPreference.accepts(Gender::Male));
        assert!(GenderPreference::Female.accepts(Gender::Female));
        assert!(!GenderPreference::Female.accepts(Gender::Male));
    }

    #[test]
    fn skill_wire_names() {
        let json = serde_json::to_string(&Skill::PersonalCare).unwrap();
        assert_eq!(json, "\"personal_care\"");
        let skill: Skill = serde_json::from_str("\"dementia_care\"").unwrap();
        assert_eq!(skill, Skill::DementiaCare);
    }

    #[test]
    fn status_classification() {
        assert!(AppointmentStatus::Scheduled.is_engaged());
        assert!(AppointmentStatus::InProgress.is_engaged());
        assert!(!AppointmentStatus::NeedsReassignment.is_engaged());
        assert!(AppointmentStatus::NeedsReassignment.occupies_slot());
        assert!(!AppointmentStatus::Cancelled.occupies_slot());
        assert!(!AppointmentStatus::Missed.occupies_slot());
    }
}
