mod history_api;
mod quote_api;
mod request_api;
mod ride_api;

use async_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    api::API,
    auth::{Role, User},
    entities::{DriverAssignment, Quote, Ride, TripRequest},
    error::{unauthorized_error, Error},
    matching::DynMatcher,
};

#[derive(Clone, Debug)]
pub enum RideEvent {
    SearchStarted { ride_id: Uuid },
    DriverFound { ride_id: Uuid, assignment: DriverAssignment },
    RideCancelled { ride_id: Uuid, fee: i64 },
    TripCompleted { ride_id: Uuid, fare: i64 },
}

pub struct Engine {
    matcher: DynMatcher,
    requests: Mutex<HashMap<Uuid, TripRequest>>,
    quotes: Mutex<HashMap<Uuid, Quote>>,
    rides: Arc<Mutex<HashMap<Uuid, Ride>>>,
    events_tx: Sender<RideEvent>,
    events_rx: Receiver<RideEvent>,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(matcher: DynMatcher) -> Self {
        let (events_tx, events_rx) = async_channel::unbounded();

        Self {
            matcher,
            requests: Mutex::new(HashMap::new()),
            quotes: Mutex::new(HashMap::new()),
            rides: Arc::new(Mutex::new(HashMap::new())),
            events_tx,
            events_rx,
        }
    }

    pub fn events(&self) -> Receiver<RideEvent> {
        self.events_rx.clone()
    }
}

impl Engine {
    pub fn authorize(&self, user: &User, role: Role) -> Result<(), Error> {
        if user.role == role || user.is_admin() {
            return Ok(());
        }

        Err(unauthorized_error())
    }

    fn authorize_ride(&self, user: &User, ride: &Ride) -> Result<(), Error> {
        if user.id == ride.passenger_id || user.is_admin() {
            return Ok(());
        }

        Err(unauthorized_error())
    }

    /// Hands the request to the matcher on a background task. The
    /// ticket pins the completion to the search that spawned it, so a
    /// ride cancelled or resubmitted in the meantime is left alone.
    fn start_search(&self, ride_id: Uuid, ticket: Uuid, request: TripRequest) {
        let matcher = self.matcher.clone();
        let rides = self.rides.clone();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let assignment = match matcher.find_driver(&request).await {
                Ok(assignment) => assignment,
                Err(err) => {
                    tracing::warn!("matcher failed to produce a driver: {:?}", err);
                    return;
                }
            };

            let mut rides = rides.lock().await;

            let ride = match rides.get_mut(&ride_id) {
                Some(ride) => ride,
                None => {
                    tracing::warn!("ride {:?} is gone, discarding match...", ride_id);
                    return;
                }
            };

            match ride.assign_driver(ticket, assignment.clone()) {
                Ok(_) => {
                    tracing::info!("assigned {:?} to ride {:?}", assignment.driver_name, ride_id);
                    publish(&events, RideEvent::DriverFound { ride_id, assignment });
                }
                Err(_) => match ride.search_ticket() {
                    Some(_) => {
                        tracing::warn!("ride {:?} was resubmitted, discarding the earlier match...", ride_id);
                    }
                    None => {
                        tracing::warn!("ride {:?} is no longer searching, discarding match...", ride_id);
                    }
                },
            }
        });
    }
}

fn publish(events: &Sender<RideEvent>, event: RideEvent) {
    if events.try_send(event).is_err() {
        tracing::warn!("event channel closed, dropping event...");
    }
}

impl API for Engine {}

#[test]
fn new_engine() {
    use crate::matching::SimulatedMatcher;

    let engine = Engine::new(Arc::new(SimulatedMatcher::default()));

    assert!(engine.events().is_empty());
}
