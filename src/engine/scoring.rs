use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::rider::Rider;
use crate::models::zone::GeoPoint;

const RATING_WEIGHT: f64 = 0.45;
const PROXIMITY_WEIGHT: f64 = 0.35;
const EXPERIENCE_WEIGHT: f64 = 0.20;

/// Rating assumed for riders nobody has rated yet.
const UNRATED_SCORE: f64 = 0.6;
/// Deliveries at which the experience score reaches one half.
const EXPERIENCE_HALF_POINT: f64 = 20.0;

#[derive(Debug, Clone, Serialize)]
pub struct RiderScore {
    pub rider_id: Uuid,
    pub total: f64,
    pub rating_score: f64,
    pub proximity_score: f64,
    pub experience_score: f64,
}

pub fn score_rider(rider: &Rider, dropoff: Option<&GeoPoint>) -> RiderScore {
    let rating_score = rating_score(rider);
    let proximity_score = proximity_score(rider.location.as_ref(), dropoff);
    let experience_score = experience_score(rider.total_deliveries);

    RiderScore {
        rider_id: rider.id,
        total: rating_score * RATING_WEIGHT
            + proximity_score * PROXIMITY_WEIGHT
            + experience_score * EXPERIENCE_WEIGHT,
        rating_score,
        proximity_score,
        experience_score,
    }
}

/// Best candidate first. Equal scores fall back to id order so the ranking
/// is stable between runs.
pub fn rank_riders(riders: &[Rider], dropoff: Option<&GeoPoint>) -> Vec<RiderScore> {
    let mut scores: Vec<RiderScore> = riders
        .iter()
        .map(|rider| score_rider(rider, dropoff))
        .collect();

    scores.sort_by(|a, b| match b.total.total_cmp(&a.total) {
        Ordering::Equal => a.rider_id.cmp(&b.rider_id),
        other => other,
    });
    scores
}

fn rating_score(rider: &Rider) -> f64 {
    if rider.rating_count == 0 {
        return UNRATED_SCORE;
    }
    (rider.rating / 5.0).clamp(0.0, 1.0)
}

fn proximity_score(rider: Option<&GeoPoint>, dropoff: Option<&GeoPoint>) -> f64 {
    match (rider, dropoff) {
        (Some(rider), Some(dropoff)) => 1.0 / (1.0 + haversine_km(rider, dropoff).max(0.0)),
        _ => 0.5,
    }
}

fn experience_score(total_deliveries: u64) -> f64 {
    let deliveries = total_deliveries as f64;
    deliveries / (deliveries + EXPERIENCE_HALF_POINT)
}
