use super::{publish, Engine, RideEvent};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::RideAPI,
    auth::{Role, User},
    entities::Ride,
    error::{invalid_input_error, Error},
};

#[async_trait]
impl RideAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_ride(&self, user: User, quote_token: Uuid) -> Result<Ride, Error> {
        self.authorize(&user, Role::Passenger)?;

        // the ride takes sole ownership of its quote and request
        let quote = self
            .quotes
            .lock()
            .await
            .remove(&quote_token)
            .ok_or_else(|| invalid_input_error())?;

        let request = self
            .requests
            .lock()
            .await
            .remove(&quote.request_token)
            .ok_or_else(|| invalid_input_error())?;

        let ride = Ride::new(user.id, request, quote);

        self.rides.lock().await.insert(ride.id, ride.clone());

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let rides = self.rides.lock().await;
        let ride = rides.get(&id).ok_or_else(|| invalid_input_error())?;

        self.authorize_ride(&user, ride)?;

        Ok(ride.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn submit_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut rides = self.rides.lock().await;
        let ride = rides.get_mut(&id).ok_or_else(|| invalid_input_error())?;

        self.authorize_ride(&user, ride)?;

        if let Some(ticket) = ride.submit()? {
            self.start_search(ride.id, ticket, ride.request.clone());
            publish(&self.events_tx, RideEvent::SearchStarted { ride_id: ride.id });
        }

        Ok(ride.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn confirm_advance_payment(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut rides = self.rides.lock().await;
        let ride = rides.get_mut(&id).ok_or_else(|| invalid_input_error())?;

        self.authorize_ride(&user, ride)?;

        let ticket = ride.confirm_advance_payment()?;

        tracing::info!("collected advance of {:?} for ride {:?}", ride.quote.advance_fee, id);

        self.start_search(ride.id, ticket, ride.request.clone());
        publish(&self.events_tx, RideEvent::SearchStarted { ride_id: ride.id });

        Ok(ride.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut rides = self.rides.lock().await;
        let ride = rides.get_mut(&id).ok_or_else(|| invalid_input_error())?;

        self.authorize_ride(&user, ride)?;

        let fee = ride.cancel()?;

        publish(&self.events_tx, RideEvent::RideCancelled { ride_id: id, fee });

        Ok(ride.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn abandon_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut rides = self.rides.lock().await;
        let ride = rides.get_mut(&id).ok_or_else(|| invalid_input_error())?;

        self.authorize_ride(&user, ride)?;

        let fee = ride.abandon()?;

        publish(&self.events_tx, RideEvent::RideCancelled { ride_id: id, fee });

        Ok(ride.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn begin_trip(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut rides = self.rides.lock().await;
        let ride = rides.get_mut(&id).ok_or_else(|| invalid_input_error())?;

        self.authorize_ride(&user, ride)?;

        ride.begin_trip()?;

        Ok(ride.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn complete_trip(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut rides = self.rides.lock().await;
        let ride = rides.get_mut(&id).ok_or_else(|| invalid_input_error())?;

        self.authorize_ride(&user, ride)?;

        let fare = ride.complete_trip()?;

        publish(&self.events_tx, RideEvent::TripCompleted { ride_id: id, fare });

        Ok(ride.clone())
    }
}

#[test]
fn instant_ride_reaches_completion_through_the_engine() {
    use crate::api::{QuoteAPI, RequestAPI};
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
        let events = engine.events();
        let user = User::new(
            "Priya Raman",
            Some("priya@example.com".into()),
            None,
            Role::Passenger,
        );

        let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
        let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

        let request = engine
            .create_request(user.clone(), pickup, destination, 2.0, RideKind::Instant, None)
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

        assert_eq!(ride.status.name(), "driver_found");
        assert_eq!(
            ride.assignment.as_ref().unwrap().driver_name,
            "Rajesh Kumar"
        );

        engine.begin_trip(user.clone(), ride.id).await.unwrap();
        let ride = engine.complete_trip(user.clone(), ride.id).await.unwrap();

        assert!(ride.is_completed());
        assert_eq!(ride.record.as_ref().unwrap().fare, 60);

        let mut found = 0;
        while let Ok(event) = events.try_recv() {
            if let RideEvent::DriverFound { ride_id, assignment: _ } = event {
                assert_eq!(ride_id, ride.id);
                found += 1;
            }
        }
        assert_eq!(found, 1);
    });
}

#[test]
fn cancelling_during_search_blocks_a_late_match() {
    use crate::api::{QuoteAPI, RequestAPI};
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

        let engine = Engine::new(Arc::new(FixedMatcher::with_delay(
            assignment,
            Duration::from_millis(100),
        )));
        let events = engine.events();
        let user = User::new(
            "Priya Raman",
            Some("priya@example.com".into()),
            None,
            Role::Passenger,
        );

        let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
        let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

        let request = engine
            .create_request(user.clone(), pickup, destination, 2.0, RideKind::Instant, None)
            .await
            .unwrap();
        let quote = engine.create_quote(user.clone(), request.token).await.unwrap();
        let ride = engine.create_ride(user.clone(), quote.token).await.unwrap();

        engine.submit_ride(user.clone(), ride.id).await.unwrap();
        let ride = engine.cancel_ride(user.clone(), ride.id).await.unwrap();
        assert_eq!(ride.status.name(), "booking");

        tokio::time::sleep(Duration::from_millis(250)).await;

        let ride = engine.find_ride(user.clone(), ride.id).await.unwrap();
        assert_eq!(ride.status.name(), "booking");
        assert!(ride.assignment.is_none());

        while let Ok(event) = events.try_recv() {
            if let RideEvent::DriverFound { ride_id: _, assignment: _ } = event {
                panic!("stale search completion must not assign a driver");
            }
        }
    });
}

#[test]
fn resubmitted_search_accepts_only_the_fresh_ticket() {
    use crate::api::{QuoteAPI, RequestAPI};
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

        let engine = Engine::new(Arc::new(FixedMatcher::with_delay(
            assignment,
            Duration::from_millis(50),
        )));
        let events = engine.events();
        let user = User::new(
            "Priya Raman",
            Some("priya@example.com".into()),
            None,
            Role::Passenger,
        );

        let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
        let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

        let request = engine
            .create_request(user.clone(), pickup, destination, 2.0, RideKind::Instant, None)
            .await
            .unwrap();
        let quote = engine.create_quote(user.clone(), request.token).await.unwrap();
        let ride = engine.create_ride(user.clone(), quote.token).await.unwrap();

        engine.submit_ride(user.clone(), ride.id).await.unwrap();
        engine.cancel_ride(user.clone(), ride.id).await.unwrap();
        engine.submit_ride(user.clone(), ride.id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;

        let ride = engine.find_ride(user.clone(), ride.id).await.unwrap();
        assert_eq!(ride.status.name(), "driver_found");
        assert!(ride.assignment.is_some());

        let mut found = 0;
        while let Ok(event) = events.try_recv() {
            if let RideEvent::DriverFound { ride_id: _, assignment: _ } = event {
                found += 1;
            }
        }
        assert_eq!(found, 1);
    });
}

#[test]
fn prebook_ride_searches_only_after_the_advance() {
    use crate::api::{QuoteAPI, RequestAPI};
    use crate::entities::{DriverAssignment, Location, RideKind};
    use crate::matching::FixedMatcher;
    use chrono::Utc;
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

        let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
        let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

        let request = engine
            .create_request(
                user.clone(),
                pickup,
                destination,
                2.0,
                RideKind::Prebook,
                Some(Utc::now() + chrono::Duration::hours(4)),
            )
            .await
            .unwrap();
        let quote = engine.create_quote(user.clone(), request.token).await.unwrap();
        assert_eq!(quote.advance_fee, 10);

        let ride = engine.create_ride(user.clone(), quote.token).await.unwrap();

        let ride = engine.submit_ride(user.clone(), ride.id).await.unwrap();
        assert_eq!(ride.status.name(), "awaiting_advance_payment");

        engine
            .confirm_advance_payment(user.clone(), ride.id)
            .await
            .unwrap();

        let mut ride = engine.find_ride(user.clone(), ride.id).await.unwrap();
        for _ in 0..100 {
            if ride.assignment.is_some() {
                break;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
            ride = engine.find_ride(user.clone(), ride.id).await.unwrap();
        }

        assert_eq!(ride.status.name(), "driver_found");
        assert!(ride.advance_paid);
    });
}

#[test]
fn consuming_a_request_invalidates_its_other_quotes() {
    use crate::api::{QuoteAPI, RequestAPI};
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

        let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
        let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

        let request = engine
            .create_request(user.clone(), pickup, destination, 2.0, RideKind::Instant, None)
            .await
            .unwrap();

        let first = engine.create_quote(user.clone(), request.token).await.unwrap();
        let second = engine.create_quote(user.clone(), request.token).await.unwrap();

        engine.create_ride(user.clone(), first.token).await.unwrap();

        let err = engine.create_ride(user.clone(), second.token).await.unwrap_err();
        assert_eq!(err.code, 101);
    });
}

#[test]
fn strangers_cannot_touch_a_ride() {
    use crate::api::{QuoteAPI, RequestAPI};
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

        let request = engine
            .create_request(user.clone(), pickup, destination, 2.0, RideKind::Instant, None)
            .await
            .unwrap();
        let quote = engine.create_quote(user.clone(), request.token).await.unwrap();
        let ride = engine.create_ride(user.clone(), quote.token).await.unwrap();

        let err = engine.find_ride(stranger.clone(), ride.id).await.unwrap_err();
        assert_eq!(err.code, 104);

        let err = engine.cancel_ride(stranger, ride.id).await.unwrap_err();
        assert_eq!(err.code, 104);

        let found = engine.find_ride(admin, ride.id).await.unwrap();
        assert_eq!(found.id, ride.id);
    });
}
