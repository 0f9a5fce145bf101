use std::env;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dotenv::dotenv;
use uuid::Uuid;

use tonga::api::{DynAPI, HistoryAPI, QuoteAPI, RequestAPI, RideAPI};
use tonga::auth::{IdentityGateway, Profile, Role, User};
use tonga::engine::{Engine, RideEvent};
use tonga::entities::{Location, Ride, RideKind};
use tonga::external::LocalIdentity;
use tonga::fare::format_currency;
use tonga::matching::{SimulatedMatcher, DEFAULT_MATCH_DELAY};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let match_delay = env::var("TONGA_MATCH_DELAY_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_MATCH_DELAY);

    let identity = LocalIdentity::new();

    let mut sessions = identity.subscribe();
    tokio::spawn(async move {
        while sessions.changed().await.is_ok() {
            match sessions.borrow().as_ref() {
                Some(session) => tracing::info!("session opened for {:?}", session.user.name),
                None => tracing::info!("session closed"),
            }
        }
    });

    let engine = Engine::new(Arc::new(SimulatedMatcher::new(match_delay)));
    let events = engine.events();
    let api = Arc::new(engine) as DynAPI;

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RideEvent::SearchStarted { ride_id } => {
                    tracing::info!("ride {:?} is searching for a driver...", ride_id);
                }
                RideEvent::DriverFound { ride_id, assignment } => {
                    tracing::info!(
                        "ride {:?} matched with {:?} driving a {:?} ({:?}), arriving in {:?} minutes",
                        ride_id,
                        assignment.driver_name,
                        assignment.vehicle,
                        assignment.license_plate,
                        assignment.eta_minutes
                    );
                }
                RideEvent::RideCancelled { ride_id, fee } => {
                    tracing::info!(
                        "ride {:?} cancelled, fees so far {}",
                        ride_id,
                        format_currency(fee)
                    );
                }
                RideEvent::TripCompleted { ride_id, fare } => {
                    tracing::info!(
                        "ride {:?} completed, fare {}",
                        ride_id,
                        format_currency(fare)
                    );
                }
            }
        }
    });

    let passenger = identity
        .sign_up_with_password(
            "priya@example.com".into(),
            "secret123".into(),
            Profile {
                name: "Priya Raman".into(),
                phone: Some("+91 98400 11223".into()),
                role: Role::Passenger,
            },
        )
        .await
        .unwrap()
        .user;

    let driver = identity
        .sign_up_with_password(
            "suresh@example.com".into(),
            "secret123".into(),
            Profile {
                name: "Suresh Babu".into(),
                phone: Some("+91 98431 22870".into()),
                role: Role::Driver,
            },
        )
        .await
        .unwrap()
        .user;

    // a second passenger signs in over the phone verification path
    let handle = identity
        .start_phone_verification("+91 97510 44556".into())
        .await
        .unwrap();
    let code = identity.verification_code(&handle).await.unwrap();
    let walk_in = identity
        .confirm_phone_verification(handle, code)
        .await
        .unwrap()
        .user;

    let mut journeys = vec![];

    journeys.push(tokio::spawn(book_cancel_and_rebook(
        api.clone(),
        passenger.clone(),
    )));
    journeys.push(tokio::spawn(book_and_ride(
        api.clone(),
        walk_in.clone(),
        RideKind::Prebook,
    )));

    futures::future::join_all(journeys).await;

    let history = api.ride_history(passenger.clone()).await.unwrap();
    tracing::info!("{:?} has {:?} rides on record", passenger.name, history.len());

    let snapshot = serde_json::to_string_pretty(&history[0]).unwrap();
    tracing::info!("latest ride:\n{}", snapshot);

    let earnings = api.earnings_summary(driver).await.unwrap();
    tracing::info!(
        "platform gross {} with commission due ₹{:.2}",
        format_currency(earnings.gross),
        earnings.commission_due
    );

    identity.end_session().await;
}

async fn book_and_ride(api: DynAPI, user: User, kind: RideKind) -> Ride {
    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");

    let scheduled_at = match kind {
        RideKind::Instant => None,
        RideKind::Prebook => Some(Utc::now() + chrono::Duration::hours(4)),
    };

    let request = api
        .create_request(user.clone(), pickup, destination, 4.5, kind, scheduled_at)
        .await
        .unwrap();
    let quote = api.create_quote(user.clone(), request.token).await.unwrap();

    tracing::info!(
        "quoted {} for {:?} km",
        format_currency(quote.base_fare),
        quote.distance_km
    );

    let ride = api.create_ride(user.clone(), quote.token).await.unwrap();
    api.submit_ride(user.clone(), ride.id).await.unwrap();

    if kind == RideKind::Prebook {
        tracing::info!(
            "paying {} advance to hold the booking...",
            format_currency(ride.quote.advance_fee)
        );

        api.confirm_advance_payment(user.clone(), ride.id)
            .await
            .unwrap();
    }

    let ride = await_driver(&api, &user, ride.id).await;

    api.begin_trip(user.clone(), ride.id).await.unwrap();
    api.complete_trip(user.clone(), ride.id).await.unwrap()
}

/// Cancels mid-search and books again, leaving the first search to
/// finish against a ticket that is no longer valid.
async fn book_cancel_and_rebook(api: DynAPI, user: User) -> Ride {
    let pickup = Location::new(12.6870, 78.6250, "Gandhi Road, Vaniyambadi");
    let destination = Location::new(12.5690, 78.5740, "Ambur New Bus Stand");

    let request = api
        .create_request(
            user.clone(),
            pickup,
            destination,
            2.0,
            RideKind::Instant,
            None,
        )
        .await
        .unwrap();
    let quote = api.create_quote(user.clone(), request.token).await.unwrap();
    let ride = api.create_ride(user.clone(), quote.token).await.unwrap();

    api.submit_ride(user.clone(), ride.id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    tracing::info!("{:?} changed their mind mid-search...", user.name);
    api.cancel_ride(user.clone(), ride.id).await.unwrap();

    api.submit_ride(user.clone(), ride.id).await.unwrap();

    let ride = await_driver(&api, &user, ride.id).await;

    api.begin_trip(user.clone(), ride.id).await.unwrap();
    api.complete_trip(user.clone(), ride.id).await.unwrap()
}

async fn await_driver(api: &DynAPI, user: &User, ride_id: Uuid) -> Ride {
    let mut ride = api.find_ride(user.clone(), ride_id).await.unwrap();

    while ride.assignment.is_none() {
        tokio::time::sleep(Duration::from_millis(200)).await;
        ride = api.find_ride(user.clone(), ride_id).await.unwrap();
    }

    ride
}
