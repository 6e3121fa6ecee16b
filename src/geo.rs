//! Geo and time utilities.
//!
//! Haversine distances, clock arithmetic, UTC day normalization, and the
//! travel-time estimator. Travel times come from an external driving
//! directions service when one is configured; any failure falls back to a
//! 30 km/h haversine estimate so a scheduling run never aborts on a routing
//! outage.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::GeoPoint;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed driving speed for the fallback estimate, in km/h.
const FALLBACK_SPEED_KMPH: f64 = 30.0;

/// Great-circle distance in kilometers between two points.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    if a.latitude == b.latitude && a.longitude == b.longitude {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Driving minutes assuming [`FALLBACK_SPEED_KMPH`], rounded up.
pub fn estimate_minutes(from: GeoPoint, to: GeoPoint) -> i64 {
    (haversine_km(from, to) / FALLBACK_SPEED_KMPH * 60.0).ceil() as i64
}

/// Normalizes an instant to the UTC calendar day it falls on.
pub fn utc_day(instant: DateTime<Utc>) -> NaiveDate {
    instant.date_naive()
}

/// Adds minutes to a clock time, carrying hours. Returns `None` when the
/// result would reach or pass midnight; visits never cross midnight.
pub fn add_minutes(time: NaiveTime, minutes: i64) -> Option<NaiveTime> {
    let (result, wrapped) = time.overflowing_add_signed(Duration::minutes(minutes));
    (wrapped == 0).then_some(result)
}

/// Whole minutes from `from` to `to` on the same day.
pub fn minutes_between(from: NaiveTime, to: NaiveTime) -> i64 {
    (to - from).num_minutes()
}

/// Connection details for the external driving-directions service.
#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
}

impl RoutingConfig {
    /// Reads `ROUTE_API_URL` and `ROUTE_API_TOKEN` from the environment.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ROUTE_API_URL").ok(),
            token: std::env::var("ROUTE_API_TOKEN").ok(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.token.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    /// Driving duration in seconds.
    duration: f64,
}

/// Microdegree cache key, enough precision to distinguish addresses.
fn coord_key(p: GeoPoint) -> (i64, i64) {
    ((p.longitude * 1e7).round() as i64, ((p.latitude) * 1e7).round() as i64)
}

/// Travel-time source with request-scoped memoization.
///
/// The feasibility oracle may ask for the same leg several times per
/// candidate; the memo keeps that at one external call per `(from, to)`
/// pair without introducing cross-request state.
pub struct TravelEstimator {
    config: RoutingConfig,
    client: reqwest::Client,
    cache: HashMap<((i64, i64), (i64, i64)), i64>,
}

impl TravelEstimator {
    pub fn new(config: RoutingConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            cache: HashMap::new(),
        }
    }

    /// An estimator that never calls out; always uses the haversine fallback.
    pub fn offline() -> Self {
        Self::new(RoutingConfig::default())
    }

    /// Driving minutes from `from` to `to`, as an integer minute count.
    pub async fn minutes(&mut self, from: GeoPoint, to: GeoPoint) -> i64 {
        let key = (coord_key(from), coord_key(to));
        if let Some(&cached) = self.cache.get(&key) {
            return cached;
        }

        let minutes = match self.lookup(from, to).await {
            Some(minutes) => minutes,
            None => estimate_minutes(from, to),
        };
        self.cache.insert(key, minutes);
        minutes
    }

    /// Asks the external directions service, if configured. `None` on any
    /// failure; callers fall back to the estimate.
    async fn lookup(&self, from: GeoPoint, to: GeoPoint) -> Option<i64> {
        let (base_url, token) = match (&self.config.base_url, &self.config.token) {
            (Some(url), Some(token)) => (url, token),
            _ => return None,
        };

        let response = self
            .client
            .get(format!("{}/route", base_url.trim_end_matches('/')))
            .query(&[
                ("from", format!("{},{}", from.longitude, from.latitude)),
                ("to", format!("{},{}", to.longitude, to.latitude)),
            ])
            .bearer_auth(token)
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("directions service returned status {}, using estimate", r.status());
                return None;
            }
            Err(e) => {
                warn!("directions service unreachable ({e}), using estimate");
                return None;
            }
        };

        match response.json::<DirectionsResponse>().await {
            Ok(directions) => {
                let minutes = (directions.duration / 60.0).ceil() as i64;
                debug!(
                    "directions service: ({:.4},{:.4}) -> ({:.4},{:.4}) = {} min",
                    from.longitude, from.latitude, to.longitude, to.latitude, minutes
                );
                Some(minutes)
            }
            Err(e) => {
                warn!("directions response unparseable ({e}), using estimate");
                None
            }
        }
    }
}
