use super::Engine;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    api::RequestAPI,
    auth::{Role, User},
    entities::{Location, RideKind, TripRequest},
    error::{invalid_input_error, Error},
};

#[async_trait]
impl RequestAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_request(
        &self,
        user: User,
        pickup: Location,
        destination: Location,
        distance_km: f64,
        kind: RideKind,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<TripRequest, Error> {
        self.authorize(&user, Role::Passenger)?;

        let request = TripRequest::new(pickup, destination, distance_km, kind, scheduled_at)?;

        self.requests
            .lock()
            .await
            .insert(request.token, request.clone());

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn find_request(&self, user: User, token: Uuid) -> Result<TripRequest, Error> {
        self.authorize(&user, Role::Passenger)?;

        let requests = self.requests.lock().await;
        let request = requests.get(&token).ok_or_else(|| invalid_input_error())?;

        Ok(request.clone())
    }
}

#[test]
fn request_round_trips_through_the_store() {
    use crate::matching::SimulatedMatcher;
    use std::sync::Arc;
    use tokio_test::block_on;

    let engine = Engine::new(Arc::new(SimulatedMatcher::default()));
    let user = User::new(
        "Priya Raman",
        Some("priya@example.com".into()),
        None,
        Role::Passenger,
    );

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

    let request = block_on(engine.create_request(
        user.clone(),
        pickup,
        destination,
        2.0,
        RideKind::Instant,
        None,
    ))
    .unwrap();

    let found = block_on(engine.find_request(user, request.token)).unwrap();
    assert_eq!(found.token, request.token);
    assert_eq!(found.distance_km, 2.0);
}

#[test]
fn malformed_request_is_rejected_before_it_is_stored() {
    use crate::matching::SimulatedMatcher;
    use std::sync::Arc;
    use tokio_test::block_on;

    let engine = Engine::new(Arc::new(SimulatedMatcher::default()));
    let user = User::new(
        "Priya Raman",
        Some("priya@example.com".into()),
        None,
        Role::Passenger,
    );

    let pickup = Location::new(12.6870, 78.6250, "");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

    let err = block_on(engine.create_request(
        user,
        pickup,
        destination,
        2.0,
        RideKind::Instant,
        None,
    ))
    .unwrap_err();

    assert_eq!(err.code, 102);
}

#[test]
fn drivers_cannot_create_requests() {
    use crate::matching::SimulatedMatcher;
    use std::sync::Arc;
    use tokio_test::block_on;

    let engine = Engine::new(Arc::new(SimulatedMatcher::default()));
    let driver = User::new("Suresh Babu", None, Some("+91 98431 22870".into()), Role::Driver);

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

    let err = block_on(engine.create_request(
        driver,
        pickup,
        destination,
        2.0,
        RideKind::Instant,
        None,
    ))
    .unwrap_err();

    assert_eq!(err.code, 104);
}
