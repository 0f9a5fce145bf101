use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::TripRequest;
use crate::error::Error;
use crate::fare::{compute_fare, ADVANCE_FEE};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    pub token: Uuid,
    pub request_token: Uuid,
    pub distance_km: f64,
    pub base_fare: i64,
    pub advance_fee: i64,
}

impl Quote {
    pub fn new(request: &TripRequest) -> Result<Self, Error> {
        let base_fare = compute_fare(request.distance_km)?;

        let advance_fee = if request.is_prebook() { ADVANCE_FEE } else { 0 };

        Ok(Self {
            token: Uuid::new_v4(),
            request_token: request.token,
            distance_km: request.distance_km,
            base_fare,
            advance_fee,
        })
    }

    pub fn total_due(&self) -> i64 {
        self.base_fare + self.advance_fee
    }
}

#[test]
fn quote_carries_advance_fee_only_for_prebook() {
    use crate::entities::{Location, RideKind};

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

    let instant =
        TripRequest::new(pickup.clone(), destination.clone(), 3.0, RideKind::Instant, None)
            .unwrap();
    let quote = Quote::new(&instant).unwrap();
    assert_eq!(quote.base_fare, 70);
    assert_eq!(quote.advance_fee, 0);
    assert_eq!(quote.total_due(), 70);

    let prebook = TripRequest::new(
        pickup,
        destination,
        3.0,
        RideKind::Prebook,
        Some(chrono::Utc::now() + chrono::Duration::hours(4)),
    )
    .unwrap();
    let quote = Quote::new(&prebook).unwrap();
    assert_eq!(quote.advance_fee, 10);
    assert_eq!(quote.total_due(), 80);
}
