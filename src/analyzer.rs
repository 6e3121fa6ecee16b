//! Diagnostic analysis of unscheduled visits.
//!
//! Shares the feasibility rules with the assignment engine but keeps going
//! after the first failure: every active care giver gets the full list of
//! rejection reasons plus a match score, so an operator can see who is
//! closest to assignable and what would have to change.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::availability;
use crate::domain::{CareGiver, CareReceiver, DayOfWeek, SystemSettings, VisitTemplate};
use crate::geo::{haversine_km, minutes_between, TravelEstimator};
use crate::store::Store;

const MISSING_SKILL_PENALTY: i32 = 25;
const GENDER_PENALTY: i32 = 30;
const SINGLE_HANDED_PENALTY: i32 = 50;
const NO_SCHEDULE_PENALTY: i32 = 100;
const WEEKDAY_PENALTY: i32 = 40;
const SLOT_PENALTY: i32 = 30;
const HOLIDAY_PENALTY: i32 = 100;
const DISTANCE_PENALTY: i32 = 20;
const DAILY_CAP_PENALTY: i32 = 30;
const OVERLAP_PENALTY: i32 = 40;
const TRAVEL_GAP_PENALTY: i32 = 25;

/// One care giver's assessment for a specific visit occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateAssessment {
    pub id: Uuid,
    pub name: String,
    pub can_assign: bool,
    pub rejection_reasons: Vec<String>,
    /// 100 minus accumulated penalties, clamped to [0, 100].
    pub match_score: i32,
    pub distance_km: f64,
}

/// Assesses every active care giver for `(receiver, template, date)`.
/// Assignable care givers sort first, then descending score, id last.
pub async fn analyze_visit(
    store: &Store,
    settings: &SystemSettings,
    travel: &mut TravelEstimator,
    receiver: &CareReceiver,
    template: &VisitTemplate,
    date: NaiveDate,
) -> Vec<CandidateAssessment> {
    let mut assessments = Vec::new();
    for care_giver in store.active_care_givers() {
        assessments.push(assess(store, settings, travel, receiver, template, date, &care_giver).await);
    }

    assessments.sort_by(|a, b| {
        b.can_assign
            .cmp(&a.can_assign)
            .then(b.match_score.cmp(&a.match_score))
            .then(a.id.cmp(&b.id))
    });
    assessments
}

async fn assess(
    store: &Store,
    settings: &SystemSettings,
    travel: &mut TravelEstimator,
    receiver: &CareReceiver,
    template: &VisitTemplate,
    date: NaiveDate,
    care_giver: &CareGiver,
) -> CandidateAssessment {
    let mut score = 100i32;
    let mut reasons = Vec::new();

    let start = template.preferred_time;
    // Validated templates never cross midnight; degrade to a same-time
    // window rather than panic if one slips through.
    let end = template.end_time().unwrap_or(start);

    let missing = care_giver.missing_skills(&template.requirements);
    if !missing.is_empty() {
        score -= MISSING_SKILL_PENALTY * missing.len() as i32;
        let named: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        reasons.push(format!("missing required skills: {}", named.join(", ")));
    }

    if !receiver.gender_preference.accepts(care_giver.gender) {
        score -= GENDER_PENALTY;
        reasons.push("does not match the receiver's gender preference".to_string());
    }

    if template.double_handed && care_giver.single_handed_only {
        score -= SINGLE_HANDED_PENALTY;
        reasons.push("works single-handed only; cannot join a double-handed visit".to_string());
    }

    let day = DayOfWeek::of(date);
    let resolved = availability::resolve_for(&store.availability, care_giver, date);
    if resolved.schedule.is_empty() {
        score -= NO_SCHEDULE_PENALTY;
        reasons.push("has no availability schedule".to_string());
    } else if !resolved.works_on(day) {
        score -= WEEKDAY_PENALTY;
        reasons.push(format!("not working on {day}"));
    } else if resolved.slot_containing(day, start, end).is_none() {
        score -= SLOT_PENALTY;
        reasons.push("visit time falls outside the working slots".to_string());
    }

    if availability::on_time_off(&store.availability, care_giver, date) {
        score -= HOLIDAY_PENALTY;
        reasons.push(format!("on time off on {date}"));
    }

    let distance_km = haversine_km(care_giver.home_location, receiver.home_location);
    if distance_km > settings.max_distance_km {
        score -= DISTANCE_PENALTY;
        reasons.push(format!(
            "{distance_km:.1} km away, beyond the {:.0} km radius",
            settings.max_distance_km
        ));
    } else {
        let bonus = 10.0 * (settings.max_distance_km - distance_km) / settings.max_distance_km;
        score += bonus.round() as i32;
    }

    let engagements = store.engagements_on(care_giver.id, date, None);
    if engagements.len() >= settings.max_appointments_per_day {
        score -= DAILY_CAP_PENALTY;
        reasons.push(format!(
            "already at the daily limit of {} appointments",
            settings.max_appointments_per_day
        ));
    }

    if engagements.iter().any(|a| a.overlaps(start, end)) {
        score -= OVERLAP_PENALTY;
        reasons.push("overlaps an existing appointment".to_string());
    }

    if let Some(reason) =
        travel_gap_issue(store, settings, travel, receiver, start, end, &engagements).await
    {
        score -= TRAVEL_GAP_PENALTY;
        reasons.push(reason);
    }

    CandidateAssessment {
        id: care_giver.id,
        name: care_giver.name.clone(),
        can_assign: reasons.is_empty(),
        rejection_reasons: reasons,
        match_score: score.clamp(0, 100),
        distance_km,
    }
}

/// Checks travel slack against the adjacent appointments, mirroring the
/// oracle's rules 6 and 7.
async fn travel_gap_issue(
    store: &Store,
    settings: &SystemSettings,
    travel: &mut TravelEstimator,
    receiver: &CareReceiver,
    start: chrono::NaiveTime,
    end: chrono::NaiveTime,
    engagements: &[crate::domain::Appointment],
) -> Option<String> {
    if let Some(prior) = engagements
        .iter()
        .filter(|a| a.end_time <= start)
        .max_by_key(|a| a.end_time)
    {
        if let Some(prior_location) = store.care_receiver(prior.care_receiver).map(|r| r.home_location)
        {
            let gap = minutes_between(prior.end_time, start);
            let required = travel.minutes(prior_location, receiver.home_location).await
                + settings.travel_time_buffer_minutes;
            if gap < required {
                return Some(format!(
                    "insufficient travel time from the previous appointment ({gap} of {required} min)"
                ));
            }
        }
    }

    if let Some(next) = engagements
        .iter()
        .filter(|a| a.start_time >= end)
        .min_by_key(|a| a.start_time)
    {
        if let Some(next_location) = store.care_receiver(next.care_receiver).map(|r| r.home_location)
        {
            let gap = minutes_between(end, next.start_time);
            let required = travel.minutes(receiver.home_location, next_location).await
                + settings.travel_time_buffer_minutes;
            if gap < required {
                return Some(format!(
                    "insufficient travel time to the next appointment ({gap} of {required} min)"
                ));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Appointment, AppointmentStatus, Gender, GenderPreference, GeoPoint, Recurrence, Skill,
        TimeOff, TimeSlot, WeeklySchedule,
    };
    use chrono::NaiveTime;
    use std::collections::{BTreeMap, BTreeSet};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn all_week() -> WeeklySchedule {
        let mut days = BTreeMap::new();
        for d in DayOfWeek::ALL {
            days.insert(d, vec![TimeSlot::new(t(8, 0), t(18, 0))]);
        }
        WeeklySchedule(days)
    }

    fn care_giver(name: &str, longitude: f64) -> CareGiver {
        CareGiver {
            id: Uuid::new_v4(),
            name: name.into(),
            email: None,
            phone: None,
            home_location: GeoPoint::new(longitude, 0.0),
            gender: Gender::Female,
            skills: BTreeSet::from([Skill::PersonalCare, Skill::DementiaCare]),
            can_drive: true,
            single_handed_only: false,
            max_receivers: None,
            weekly_schedule: all_week(),
            time_off: vec![],
            is_active: true,
        }
    }

    fn receiver() -> CareReceiver {
        CareReceiver {
            id: Uuid::new_v4(),
            name: "Robert".into(),
            home_location: GeoPoint::new(0.0, 0.0),
            gender: Gender::Male,
            gender_preference: GenderPreference::NoPreference,
            preferred_care_giver: None,
            visits: vec![],
            created_at: day(2025, 12, 1),
            is_active: true,
        }
    }

    fn template() -> VisitTemplate {
        VisitTemplate {
            visit_number: 1,
            preferred_time: t(9, 0),
            duration_minutes: 60,
            requirements: BTreeSet::from([Skill::PersonalCare]),
            double_handed: false,
            priority: 3,
            days_of_week: DayOfWeek::every_day(),
            recurrence: Recurrence::Weekly,
            recurrence_interval: 1,
            recurrence_start_date: None,
        }
    }

    async fn analyze(store: &Store, template: &VisitTemplate) -> Vec<CandidateAssessment> {
        let mut travel = TravelEstimator::offline();
        analyze_visit(
            store,
            &SystemSettings::default(),
            &mut travel,
            &receiver(),
            template,
            day(2026, 1, 5),
        )
        .await
    }

    #[tokio::test]
    async fn clean_candidate_gets_distance_bonus_and_assignability() {
        let store = Store::new();
        store.upsert_care_giver(care_giver("Ada", 0.01)); // ~1.1 km

        let report = analyze(&store, &template()).await;
        assert_eq!(report.len(), 1);
        let ada = &report[0];
        assert!(ada.can_assign);
        assert!(ada.rejection_reasons.is_empty());
        // 100 + round(10 * (20 - 1.1)/20) = 109, clamped to 100.
        assert_eq!(ada.match_score, 100);
        assert!(ada.distance_km < 1.2);
    }

    #[tokio::test]
    async fn missing_skills_penalize_per_skill_and_block() {
        let store = Store::new();
        let mut cg = care_giver("Ada", 0.01);
        cg.skills = BTreeSet::new();
        store.upsert_care_giver(cg);

        let mut v = template();
        v.requirements = BTreeSet::from([Skill::PersonalCare, Skill::MedicationManagement]);

        let report = analyze(&store, &v).await;
        let ada = &report[0];
        assert!(!ada.can_assign);
        // 100 - 2*25 + 9 bonus = 59.
        assert_eq!(ada.match_score, 59);
        assert!(ada.rejection_reasons[0].contains("personal_care"));
        assert!(ada.rejection_reasons[0].contains("medication_management"));
    }

    #[tokio::test]
    async fn holiday_outweighs_everything() {
        let store = Store::new();
        let mut cg = care_giver("Ada", 0.01);
        cg.time_off = vec![TimeOff {
            start: day(2026, 1, 1),
            end: day(2026, 1, 31),
            reason: None,
        }];
        store.upsert_care_giver(cg);

        let report = analyze(&store, &template()).await;
        let ada = &report[0];
        assert!(!ada.can_assign);
        // 100 - 100 + 9 bonus = 9.
        assert_eq!(ada.match_score, 9);
        assert!(ada.rejection_reasons[0].contains("on time off"));
    }

    #[tokio::test]
    async fn no_schedule_and_wrong_weekday_are_distinct_findings() {
        let store = Store::new();
        let mut bare = care_giver("Bare", 0.01);
        bare.weekly_schedule = WeeklySchedule::default();
        let bare_id = bare.id;
        store.upsert_care_giver(bare);

        let mut weekender = care_giver("Weekender", 0.01);
        weekender.weekly_schedule = WeeklySchedule(BTreeMap::from([(
            DayOfWeek::Saturday,
            vec![TimeSlot::new(t(8, 0), t(18, 0))],
        )]));
        let weekender_id = weekender.id;
        store.upsert_care_giver(weekender);

        // 2026-01-05 is a Monday.
        let report = analyze(&store, &template()).await;
        let bare = report.iter().find(|a| a.id == bare_id).unwrap();
        assert_eq!(bare.match_score, 9); // 100 - 100 + 9
        assert!(bare.rejection_reasons[0].contains("no availability schedule"));

        let weekender = report.iter().find(|a| a.id == weekender_id).unwrap();
        assert_eq!(weekender.match_score, 69); // 100 - 40 + 9
        assert!(weekender.rejection_reasons[0].contains("not working on Monday"));
    }

    #[tokio::test]
    async fn sorted_assignable_first_then_by_score() {
        let store = Store::new();
        store.upsert_care_giver(care_giver("Near", 0.01));
        store.upsert_care_giver(care_giver("Far", 0.15)); // ~16.7 km, still in radius
        let mut blocked = care_giver("Blocked", 0.01);
        blocked.gender = Gender::Male;
        store.upsert_care_giver(blocked);

        let mut picky = receiver();
        picky.gender_preference = GenderPreference::Female;

        let mut travel = TravelEstimator::offline();
        let report = analyze_visit(
            &store,
            &SystemSettings::default(),
            &mut travel,
            &picky,
            &template(),
            day(2026, 1, 5),
        )
        .await;

        assert_eq!(report.len(), 3);
        assert!(report[0].can_assign);
        assert!(report[1].can_assign);
        assert_eq!(report[2].name, "Blocked");
        assert!(!report[2].can_assign);
        // 100 - 30 gender + 9 distance bonus.
        assert_eq!(report[2].match_score, 79);
        assert!(report[0].match_score >= report[1].match_score);
    }

    #[tokio::test]
    async fn overlap_and_cap_penalties_apply() {
        let store = Store::new();
        let cg = care_giver("Busy", 0.01);
        let cg_id = cg.id;
        store.upsert_care_giver(cg);

        let r = receiver();
        let r_id = r.id;
        store.upsert_care_receiver(r.clone()).unwrap();

        store.insert_appointment(Appointment {
            id: Uuid::new_v4(),
            care_receiver: r_id,
            care_giver: cg_id,
            secondary_care_giver: None,
            date: day(2026, 1, 5),
            start_time: t(9, 30),
            end_time: t(10, 30),
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
        });

        let report = analyze(&store, &template()).await;
        let busy = &report[0];
        assert!(!busy.can_assign);
        // 100 - 40 overlap + 9 bonus = 69.
        assert_eq!(busy.match_score, 69);
        assert!(busy
            .rejection_reasons
            .iter()
            .any(|reason| reason.contains("overlaps")));
    }
}
