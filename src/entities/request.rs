use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Location;
use crate::error::{validation_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideKind {
    Instant,
    Prebook,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TripRequest {
    pub token: Uuid,
    pub pickup: Location,
    pub destination: Location,
    pub distance_km: f64,
    pub kind: RideKind,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub requested_at: DateTime<Utc>,
}

impl TripRequest {
    pub fn new(
        pickup: Location,
        destination: Location,
        distance_km: f64,
        kind: RideKind,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Self, Error> {
        let request = Self {
            token: Uuid::new_v4(),
            pickup,
            destination,
            distance_km,
            kind,
            scheduled_at,
            requested_at: Utc::now(),
        };

        request.validate()?;

        Ok(request)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.pickup.has_address() {
            return Err(validation_error("pickup address is required"));
        }

        if !self.destination.has_address() {
            return Err(validation_error("destination address is required"));
        }

        if self.distance_km < 0.0 || !self.distance_km.is_finite() {
            return Err(validation_error("distance must be a finite non-negative number"));
        }

        Ok(())
    }

    pub fn is_prebook(&self) -> bool {
        self.kind == RideKind::Prebook
    }
}

#[test]
fn request_with_empty_pickup_is_rejected() {
    let pickup = Location::new(12.6870, 78.6250, "  ");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

    let err = TripRequest::new(pickup, destination, 2.1, RideKind::Instant, None).unwrap_err();
    assert_eq!(err.code, 102);
}

#[test]
fn request_with_negative_distance_is_rejected() {
    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

    let err = TripRequest::new(pickup, destination, -2.0, RideKind::Instant, None).unwrap_err();
    assert_eq!(err.code, 102);
}

#[test]
fn request_with_non_finite_distance_is_rejected() {
    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

    let err = TripRequest::new(pickup, destination, f64::INFINITY, RideKind::Instant, None)
        .unwrap_err();
    assert_eq!(err.code, 102);
}
