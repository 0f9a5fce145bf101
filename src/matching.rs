use async_trait::async_trait;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::sync::Arc;
use std::time::Duration;

use crate::entities::{DriverAssignment, TripRequest};
use crate::error::Error;

/// Produces a driver for a submitted trip request. A real dispatcher
/// would search a live driver pool; the bundled implementations stand
/// in for one behind the same seam.
#[async_trait]
pub trait DriverMatcher {
    async fn find_driver(&self, request: &TripRequest) -> Result<DriverAssignment, Error>;
}

pub type DynMatcher = Arc<dyn DriverMatcher + Send + Sync>;

pub const DEFAULT_MATCH_DELAY: Duration = Duration::from_millis(2000);

const CANDIDATES: [(&str, &str, &str, &str); 5] = [
    ("Rajesh Kumar", "Maruti Swift Dzire", "TN 23 AB 1234", "+91 98765 43210"),
    ("Suresh Babu", "Hyundai Xcent", "TN 23 CD 4521", "+91 98431 22870"),
    ("Mohammed Farook", "Tata Indigo", "TN 23 EF 0976", "+91 99442 18356"),
    ("Venkatesan R", "Maruti Wagon R", "TN 23 GH 3310", "+91 97890 55214"),
    ("Anand Krishnan", "Toyota Etios", "TN 23 JK 7842", "+91 98406 71133"),
];

/// Waits out a fixed matching latency, then fabricates an assignment
/// from a small local candidate pool.
pub struct SimulatedMatcher {
    delay: Duration,
}

impl SimulatedMatcher {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_DELAY)
    }
}

#[async_trait]
impl DriverMatcher for SimulatedMatcher {
    #[tracing::instrument(skip(self, request))]
    async fn find_driver(&self, request: &TripRequest) -> Result<DriverAssignment, Error> {
        tracing::info!("searching for a driver near {:?}...", request.pickup.address);

        tokio::time::sleep(self.delay).await;

        let mut rng = rand::thread_rng();

        let (driver_name, vehicle, license_plate, phone) =
            CANDIDATES[rng.gen_range(0..CANDIDATES.len())];

        let rating_dist: Normal<f64> = Normal::new(4.4, 0.35).unwrap();
        let rating = rating_dist.sample(&mut rng).clamp(3.5, 5.0);
        let rating = (rating * 10.0).round() / 10.0;

        let eta_minutes = rng.gen_range(2..=8);

        Ok(DriverAssignment {
            driver_name: driver_name.into(),
            rating,
            vehicle: vehicle.into(),
            license_plate: license_plate.into(),
            phone: phone.into(),
            eta_minutes,
        })
    }
}

/// Hands back a preset assignment, by default with no latency at all.
pub struct FixedMatcher {
    assignment: DriverAssignment,
    delay: Duration,
}

impl FixedMatcher {
    pub fn new(assignment: DriverAssignment) -> Self {
        Self {
            assignment,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(assignment: DriverAssignment, delay: Duration) -> Self {
        Self { assignment, delay }
    }
}

#[async_trait]
impl DriverMatcher for FixedMatcher {
    async fn find_driver(&self, _request: &TripRequest) -> Result<DriverAssignment, Error> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(self.assignment.clone())
    }
}

#[test]
fn simulated_matcher_stays_within_the_candidate_pool() {
    use crate::entities::{Location, RideKind};
    use tokio_test::block_on;

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");
    let request = TripRequest::new(pickup, destination, 2.0, RideKind::Instant, None).unwrap();

    let matcher = SimulatedMatcher::new(Duration::ZERO);

    for _ in 0..25 {
        let assignment = block_on(matcher.find_driver(&request)).unwrap();

        assert!(CANDIDATES
            .iter()
            .any(|(name, _, _, _)| *name == assignment.driver_name));
        assert!(assignment.rating >= 3.5 && assignment.rating <= 5.0);
        assert!(assignment.eta_minutes >= 2 && assignment.eta_minutes <= 8);
    }
}

#[test]
fn fixed_matcher_returns_its_assignment() {
    use crate::entities::{Location, RideKind};
    use tokio_test::block_on;

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");
    let request = TripRequest::new(pickup, destination, 2.0, RideKind::Instant, None).unwrap();

    let assignment = DriverAssignment {
        driver_name: "Rajesh Kumar".into(),
        rating: 4.8,
        vehicle: "Maruti Swift Dzire".into(),
        license_plate: "TN 23 AB 1234".into(),
        phone: "+91 98765 43210".into(),
        eta_minutes: 3,
    };

    let matcher = FixedMatcher::new(assignment);
    let found = block_on(matcher.find_driver(&request)).unwrap();

    assert_eq!(found.driver_name, "Rajesh Kumar");
    assert_eq!(found.license_plate, "TN 23 AB 1234");
}
