//! Demo data generators.
//!
//! Seeded generation of a care-giver pool and care-receiver roster around
//! Leeds, with availability versions created through the versioned store so
//! the generated world matches what entity creation would produce.

use chrono::{NaiveDate, NaiveTime};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::domain::{
    CareGiver, CareReceiver, DayOfWeek, Gender, GenderPreference, GeoPoint, Recurrence, Skill,
    TimeOff, TimeSlot, VisitTemplate, WeeklySchedule,
};
use crate::dto::DemoLoadReport;
use crate::store::Store;

/// Leeds city centre; demo locations scatter around it.
const CENTRE: GeoPoint = GeoPoint {
    longitude: -1.5491,
    latitude: 53.8008,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Small,
    Large,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "LARGE" => Ok(DemoData::Large),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Large => "LARGE",
        }
    }

    fn parameters(&self) -> DemoParameters {
        match self {
            DemoData::Small => DemoParameters {
                care_giver_count: 8,
                care_receiver_count: 6,
            },
            DemoData::Large => DemoParameters {
                care_giver_count: 40,
                care_receiver_count: 30,
            },
        }
    }
}

struct DemoParameters {
    care_giver_count: usize,
    care_receiver_count: usize,
}

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec!["SMALL", "LARGE"]
}

/// Populates the store with a seeded demo world.
pub fn seed(store: &Store, demo: DemoData) -> DemoLoadReport {
    let params = demo.parameters();
    let mut rng = StdRng::seed_from_u64(0);

    let schedule_start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let names = generate_name_permutations(&mut rng);

    let mut care_giver_ids = Vec::new();
    for i in 0..params.care_giver_count {
        let name = names[i % names.len()].clone();
        let gender = if rng.gen_bool(0.5) { Gender::Female } else { Gender::Male };

        let skill_count = rng.gen_range(2..=4);
        let mut skills: BTreeSet<Skill> = Skill::ALL
            .choose_multiple(&mut rng, skill_count)
            .copied()
            .collect();
        // Personal care is near-universal in a domiciliary pool.
        if rng.gen_bool(0.8) {
            skills.insert(Skill::PersonalCare);
        }

        let time_off = if rng.gen_bool(0.25) {
            let offset = rng.gen_range(10..40);
            let start = schedule_start + chrono::Duration::days(offset);
            vec![TimeOff {
                start,
                end: start + chrono::Duration::days(rng.gen_range(2..7)),
                reason: Some("annual leave".to_string()),
            }]
        } else {
            vec![]
        };

        let care_giver = CareGiver {
            id: Uuid::new_v4(),
            name: name.clone(),
            email: Some(format!(
                "{}@example.org",
                name.to_lowercase().replace(' ', ".")
            )),
            phone: None,
            home_location: scatter(&mut rng, 0.12),
            gender,
            skills,
            can_drive: rng.gen_bool(0.8),
            single_handed_only: rng.gen_bool(0.15),
            max_receivers: None,
            weekly_schedule: WeeklySchedule::default(),
            time_off: vec![],
            is_active: true,
        };
        let id = care_giver.id;
        store.upsert_care_giver(care_giver);

        // Versioned availability is the source of truth; seed it at
        // creation like the entity-creation flow does.
        store
            .availability
            .create_version(id, pick_schedule(&mut rng), time_off, schedule_start);
        care_giver_ids.push(id);
    }

    for i in 0..params.care_receiver_count {
        let name = names[(i + params.care_giver_count) % names.len()].clone();
        let gender = if rng.gen_bool(0.5) { Gender::Female } else { Gender::Male };
        let gender_preference = match rng.gen_range(0..10) {
            0 => GenderPreference::Female,
            1 => GenderPreference::Male,
            _ => GenderPreference::NoPreference,
        };
        let preferred_care_giver = if rng.gen_bool(0.3) {
            care_giver_ids.choose(&mut rng).copied()
        } else {
            None
        };

        let visit_count = rng.gen_range(1..=3);
        let visit_times = [
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        ];
        let visits = (0..visit_count)
            .map(|n| {
                let requirement_count = rng.gen_range(1..=2);
                VisitTemplate {
                    visit_number: n as u8 + 1,
                    preferred_time: visit_times[n],
                    duration_minutes: *[30, 45, 60, 90].choose(&mut rng).unwrap(),
                    requirements: Skill::ALL
                        .choose_multiple(&mut rng, requirement_count)
                        .copied()
                        .collect(),
                    double_handed: rng.gen_bool(0.1),
                    priority: rng.gen_range(1..=5),
                    days_of_week: pick_days(&mut rng),
                    recurrence: Recurrence::Weekly,
                    recurrence_interval: 1,
                    recurrence_start_date: None,
                }
            })
            .collect();

        let receiver = CareReceiver {
            id: Uuid::new_v4(),
            name,
            home_location: scatter(&mut rng, 0.08),
            gender,
            gender_preference,
            preferred_care_giver,
            visits,
            created_at: schedule_start,
            is_active: true,
        };
        // Generated visit numbers are sequential by construction.
        store
            .upsert_care_receiver(receiver)
            .expect("demo data produces valid receivers");
    }

    DemoLoadReport {
        demo_set: demo.as_str().to_string(),
        care_givers: params.care_giver_count,
        care_receivers: params.care_receiver_count,
    }
}

fn scatter(rng: &mut StdRng, spread: f64) -> GeoPoint {
    GeoPoint::new(
        CENTRE.longitude + rng.gen_range(-spread..spread),
        CENTRE.latitude + rng.gen_range(-spread..spread),
    )
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn pick_schedule(rng: &mut StdRng) -> WeeklySchedule {
    let weekdays = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
    ];

    let mut days = BTreeMap::new();
    match rng.gen_range(0..3) {
        // Full time, weekdays.
        0 => {
            for d in weekdays {
                days.insert(d, vec![TimeSlot::new(t(7, 0), t(19, 0))]);
            }
        }
        // Split shift with a midday break, weekdays plus Saturday.
        1 => {
            for d in weekdays {
                days.insert(
                    d,
                    vec![
                        TimeSlot::new(t(7, 0), t(13, 0)),
                        TimeSlot::new(t(16, 0), t(21, 0)),
                    ],
                );
            }
            days.insert(DayOfWeek::Saturday, vec![TimeSlot::new(t(8, 0), t(14, 0))]);
        }
        // Evenings and weekends.
        _ => {
            for d in DayOfWeek::ALL {
                days.insert(d, vec![TimeSlot::new(t(14, 0), t(22, 0))]);
            }
        }
    }
    WeeklySchedule(days)
}

fn pick_days(rng: &mut StdRng) -> BTreeSet<DayOfWeek> {
    match rng.gen_range(0..3) {
        0 => DayOfWeek::every_day(),
        1 => [
            DayOfWeek::Monday,
            DayOfWeek::Tuesday,
            DayOfWeek::Wednesday,
            DayOfWeek::Thursday,
            DayOfWeek::Friday,
        ]
        .into_iter()
        .collect(),
        _ => [DayOfWeek::Monday, DayOfWeek::Wednesday, DayOfWeek::Friday]
            .into_iter()
            .collect(),
    }
}

const FIRST_NAMES: &[&str] = &[
    "Amy", "Beth", "Carl", "Dan", "Elsie", "Flo", "Gus", "Hugo", "Iris", "Jay",
];
const LAST_NAMES: &[&str] = &[
    "Barker", "Clarke", "Firth", "Hardy", "Kaur", "Lee", "Oakes", "Patel", "Shaw", "Wood",
];

fn generate_name_permutations(rng: &mut StdRng) -> Vec<String> {
    let mut names = Vec::with_capacity(FIRST_NAMES.len() * LAST_NAMES.len());
    for first in FIRST_NAMES {
        for last in LAST_NAMES {
            names.push(format!("{} {}", first, last));
        }
    }
    names.shuffle(rng);
    names
}
