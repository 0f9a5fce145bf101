use super::Engine;

use async_trait::async_trait;

use crate::{
    api::{Earnings, HistoryAPI},
    auth::{Role, User},
    entities::Ride,
    error::Error,
    fare::compute_commission,
};

#[async_trait]
impl HistoryAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn ride_history(&self, user: User) -> Result<Vec<Ride>, Error> {
        let rides = self.rides.lock().await;

        let mut history: Vec<Ride> = rides
            .values()
            .filter(|ride| ride.passenger_id == user.id || user.is_admin())
            .cloned()
            .collect();

        history.sort_by(|a, b| b.request.requested_at.cmp(&a.request.requested_at));

        Ok(history)
    }

    #[tracing::instrument(skip(self))]
    async fn earnings_summary(&self, user: User) -> Result<Earnings, Error> {
        self.authorize(&user, Role::Driver)?;

        let rides = self.rides.lock().await;

        let gross: i64 = rides
            .values()
            .filter_map(|ride| ride.record.as_ref())
            .map(|record| record.fare)
            .sum();

        Ok(Earnings {
            gross,
            commission_due: compute_commission(gross as f64),
        })
    }
}

#[test]
fn history_is_newest_first_and_scoped_to_the_passenger() {
    use crate::api::{QuoteAPI, RequestAPI, RideAPI};
    use crate::entities::{Location, RideKind};
    use crate::matching::SimulatedMatcher;
    use std::sync::Arc;
    use tokio_test::block_on;

    block_on(async {
        let engine = Engine::new(Arc::new(SimulatedMatcher::default()));
        let user = User::new(
            "Priya Raman",
            Some("priya@example.com".into()),
            None,
            Role::Passenger,
        );
        let stranger = User::new(
            "Karthik Subramani",
            Some("karthik@example.com".into()),
            None,
            Role::Passenger,
        );
        let admin = User::new("Meena Devi", Some("meena@example.com".into()), None, Role::Admin);

        let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
        let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

        let mut ride_ids = vec![];
        for distance_km in [2.0, 5.0] {
            let request = engine
                .create_request(
                    user.clone(),
                    pickup.clone(),
                    destination.clone(),
                    distance_km,
                    RideKind::Instant,
                    None,
                )
                .await
                .unwrap();
            let quote = engine.create_quote(user.clone(), request.token).await.unwrap();
            let ride = engine.create_ride(user.clone(), quote.token).await.unwrap();

            ride_ids.push(ride.id);
        }

        let history = engine.ride_history(user).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, ride_ids[1]);
        assert_eq!(history[1].id, ride_ids[0]);

        let history = engine.ride_history(stranger).await.unwrap();
        assert!(history.is_empty());

        let history = engine.ride_history(admin).await.unwrap();
        assert_eq!(history.len(), 2);
    });
}

#[test]
fn earnings_are_gated_and_sum_completed_fares() {
    use crate::api::{QuoteAPI, RequestAPI, RideAPI};
    use crate::entities::{DriverAssignment, Location, RideKind};
    use crate::matching::FixedMatcher;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::block_on;

    block_on(async {
        let assignment = DriverAssignment {
            driver_name: "Rajesh Kumar".into(),
            rating: 4.8,
            vehicle: "Maruti Swift Dzire".into(),
            license_plate: "TN 23 AB 1234".into(),
            phone: "+91 98765 43210".into(),
            eta_minutes: 3,
        };

        let engine = Engine::new(Arc::new(FixedMatcher::new(assignment)));
        let user = User::new(
            "Priya Raman",
            Some("priya@example.com".into()),
            None,
            Role::Passenger,
        );
        let driver = User::new("Suresh Babu", None, Some("+91 98431 22870".into()), Role::Driver);

        let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
        let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

        let request = engine
            .create_request(user.clone(), pickup, destination, 5.0, RideKind::Instant, None)
            .await
            .unwrap();
        let quote = engine.create_quote(user.clone(), request.token).await.unwrap();
        let ride = engine.create_ride(user.clone(), quote.token).await.unwrap();

        engine.submit_ride(user.clone(), ride.id).await.unwrap();

        let mut ride = engine.find_ride(user.clone(), ride.id).await.unwrap();
        for _ in 0..100 {
            if ride.assignment.is_some() {
                break;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
            ride = engine.find_ride(user.clone(), ride.id).await.unwrap();
        }

        engine.begin_trip(user.clone(), ride.id).await.unwrap();
        engine.complete_trip(user.clone(), ride.id).await.unwrap();

        let err = engine.earnings_summary(user).await.unwrap_err();
        assert_eq!(err.code, 104);

        let earnings = engine.earnings_summary(driver).await.unwrap();
        assert_eq!(earnings.gross, 90);
        assert_eq!(earnings.commission_due, 9.0);
    });
}
