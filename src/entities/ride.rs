use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{DriverAssignment, Quote, RideKind, TripRequest};
use crate::error::{invalid_invocation_error, Error};
use crate::fare::CANCELLATION_FEE;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub status: Status,
    pub passenger_id: Uuid,
    pub request: TripRequest,
    pub quote: Quote,
    pub advance_paid: bool,
    pub fees_charged: i64,
    pub assignment: Option<DriverAssignment>,
    pub record: Option<TripRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Booking,
    AwaitingAdvancePayment {
        fee: i64,
    },
    Searching {
        ticket: Uuid,
    },
    DriverFound,
    Ongoing,
    Completed,
    Cancelled {
        fee: i64,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TripRecord {
    pub fare: i64,
    pub distance_km: f64,
    pub driver_name: String,
    pub completed_at: DateTime<Utc>,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Booking => "booking".into(),
            Self::AwaitingAdvancePayment { fee: _ } => "awaiting_advance_payment".into(),
            Self::Searching { ticket: _ } => "searching".into(),
            Self::DriverFound => "driver_found".into(),
            Self::Ongoing => "ongoing".into(),
            Self::Completed => "completed".into(),
            Self::Cancelled { fee: _ } => "cancelled".into(),
        }
    }
}

impl Ride {
    pub fn new(passenger_id: Uuid, request: TripRequest, quote: Quote) -> Self {
        let status = Status::Booking;

        Self {
            id: Uuid::new_v4(),
            status,
            passenger_id,
            request,
            quote,
            advance_paid: false,
            fees_charged: 0,
            assignment: None,
            record: None,
        }
    }

    pub fn is_searching(&self) -> bool {
        match &self.status {
            Status::Searching { ticket: _ } => true,
            _ => false,
        }
    }

    pub fn is_completed(&self) -> bool {
        match &self.status {
            Status::Completed => true,
            _ => false,
        }
    }

    pub fn search_ticket(&self) -> Option<Uuid> {
        match self.status {
            Status::Searching { ticket } => Some(ticket),
            _ => None,
        }
    }

    /// Returns the search ticket when the ride enters `Searching`
    /// directly, or `None` when an advance payment is still owed.
    #[tracing::instrument]
    pub fn submit(&mut self) -> Result<Option<Uuid>, Error> {
        match self.status {
            Status::Booking => {
                self.request.validate()?;

                match self.request.kind {
                    RideKind::Instant => {
                        let ticket = Uuid::new_v4();
                        self.status = Status::Searching { ticket };
                        Ok(Some(ticket))
                    }
                    RideKind::Prebook => {
                        // a cancelled prebook keeps its advance on resubmission
                        if self.advance_paid {
                            let ticket = Uuid::new_v4();
                            self.status = Status::Searching { ticket };
                            return Ok(Some(ticket));
                        }

                        self.status = Status::AwaitingAdvancePayment {
                            fee: self.quote.advance_fee,
                        };
                        Ok(None)
                    }
                }
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    #[tracing::instrument]
    pub fn confirm_advance_payment(&mut self) -> Result<Uuid, Error> {
        match self.status {
            Status::AwaitingAdvancePayment { fee: _ } => {
                let ticket = Uuid::new_v4();
                self.advance_paid = true;
                self.status = Status::Searching { ticket };
                Ok(ticket)
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    /// Completes a driver search. The ticket must match the one issued
    /// when the search started, so a completion racing a cancellation
    /// lands here as an invalid invocation instead of reviving the ride.
    #[tracing::instrument]
    pub fn assign_driver(
        &mut self,
        ticket: Uuid,
        assignment: DriverAssignment,
    ) -> Result<(), Error> {
        match self.status {
            Status::Searching { ticket: current } => {
                if current != ticket {
                    return Err(invalid_invocation_error());
                }

                self.status = Status::DriverFound;
                self.assignment = Some(assignment);
                Ok(())
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    #[tracing::instrument]
    pub fn begin_trip(&mut self) -> Result<(), Error> {
        match self.status {
            Status::DriverFound => {
                self.status = Status::Ongoing;
                Ok(())
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    #[tracing::instrument]
    pub fn complete_trip(&mut self) -> Result<i64, Error> {
        match self.status {
            Status::Ongoing => {
                let fare = self.quote.base_fare;
                let driver_name = match self.assignment.take() {
                    Some(assignment) => assignment.driver_name,
                    None => "".into(),
                };

                self.record = Some(TripRecord {
                    fare,
                    distance_km: self.request.distance_km,
                    driver_name,
                    completed_at: Utc::now(),
                });
                self.status = Status::Completed;

                Ok(fare)
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    /// Returns the ride to `Booking` so it can be corrected and
    /// resubmitted. Returns the fee charged by this cancellation.
    #[tracing::instrument]
    pub fn cancel(&mut self) -> Result<i64, Error> {
        match self.status {
            Status::AwaitingAdvancePayment { fee: _ } => {
                self.status = Status::Booking;
                Ok(0)
            }
            Status::Searching { ticket: _ } => {
                self.status = Status::Booking;
                Ok(0)
            }
            Status::DriverFound => {
                self.fees_charged += CANCELLATION_FEE;
                self.assignment = None;
                self.status = Status::Booking;
                Ok(CANCELLATION_FEE)
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    /// Ends the ride for good. Returns the total fees owed on it.
    #[tracing::instrument]
    pub fn abandon(&mut self) -> Result<i64, Error> {
        match self.status {
            Status::Booking => {
                self.status = Status::Cancelled {
                    fee: self.fees_charged,
                };
                Ok(self.fees_charged)
            }
            Status::Searching { ticket: _ } => {
                self.status = Status::Cancelled {
                    fee: self.fees_charged,
                };
                Ok(self.fees_charged)
            }
            Status::DriverFound => {
                self.fees_charged += CANCELLATION_FEE;
                self.assignment = None;
                self.status = Status::Cancelled {
                    fee: self.fees_charged,
                };
                Ok(self.fees_charged)
            }
            _ => Err(invalid_invocation_error()),
        }
    }
}

#[test]
fn instant_ride_walks_the_happy_path() {
    use crate::entities::Location;

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");
    let request = TripRequest::new(pickup, destination, 2.0, RideKind::Instant, None).unwrap();
    let quote = Quote::new(&request).unwrap();

    let mut ride = Ride::new(Uuid::new_v4(), request, quote);
    assert_eq!(ride.status.name(), "booking");

    let ticket = ride.submit().unwrap().unwrap();
    assert!(ride.is_searching());

    let assignment = DriverAssignment {
        driver_name: "Rajesh Kumar".into(),
        rating: 4.8,
        vehicle: "Maruti Swift Dzire".into(),
        license_plate: "TN 23 AB 1234".into(),
        phone: "+91 98765 43210".into(),
        eta_minutes: 3,
    };
    ride.assign_driver(ticket, assignment).unwrap();
    assert_eq!(ride.status.name(), "driver_found");
    assert!(ride.assignment.is_some());

    ride.begin_trip().unwrap();
    assert_eq!(ride.status.name(), "ongoing");
    assert!(ride.assignment.is_some());

    let fare = ride.complete_trip().unwrap();
    assert_eq!(fare, 60);
    assert!(ride.is_completed());
    assert!(ride.assignment.is_none());

    let record = ride.record.unwrap();
    assert_eq!(record.fare, 60);
    assert_eq!(record.driver_name, "Rajesh Kumar");
}

#[test]
fn prebook_ride_waits_for_the_advance() {
    use crate::entities::Location;

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");
    let request = TripRequest::new(
        pickup,
        destination,
        2.0,
        RideKind::Prebook,
        Some(Utc::now() + chrono::Duration::hours(4)),
    )
    .unwrap();
    let quote = Quote::new(&request).unwrap();

    let mut ride = Ride::new(Uuid::new_v4(), request, quote);

    assert!(ride.submit().unwrap().is_none());
    assert_eq!(ride.status.name(), "awaiting_advance_payment");

    let json = serde_json::to_value(&ride).unwrap();
    assert_eq!(json["status"]["name"], "awaiting_advance_payment");
    assert_eq!(json["status"]["fee"], 10);

    ride.confirm_advance_payment().unwrap();
    assert!(ride.advance_paid);
    assert!(ride.is_searching());
}

#[test]
fn cancelled_prebook_resubmits_without_a_second_advance() {
    use crate::entities::Location;

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");
    let request = TripRequest::new(
        pickup,
        destination,
        2.0,
        RideKind::Prebook,
        Some(Utc::now() + chrono::Duration::hours(4)),
    )
    .unwrap();
    let quote = Quote::new(&request).unwrap();

    let mut ride = Ride::new(Uuid::new_v4(), request, quote);

    assert!(ride.submit().unwrap().is_none());
    let first = ride.confirm_advance_payment().unwrap();

    assert_eq!(ride.cancel().unwrap(), 0);
    assert_eq!(ride.status.name(), "booking");

    let second = ride.submit().unwrap().unwrap();
    assert!(ride.is_searching());
    assert_ne!(first, second);
    assert!(ride.advance_paid);
    assert_eq!(ride.fees_charged, 0);
}

#[test]
fn stale_search_ticket_cannot_assign_a_driver() {
    use crate::entities::Location;

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");
    let request = TripRequest::new(pickup, destination, 2.0, RideKind::Instant, None).unwrap();
    let quote = Quote::new(&request).unwrap();

    let mut ride = Ride::new(Uuid::new_v4(), request, quote);

    let stale = ride.submit().unwrap().unwrap();
    assert_eq!(ride.cancel().unwrap(), 0);
    let fresh = ride.submit().unwrap().unwrap();
    assert_ne!(stale, fresh);

    let assignment = DriverAssignment {
        driver_name: "Rajesh Kumar".into(),
        rating: 4.8,
        vehicle: "Maruti Swift Dzire".into(),
        license_plate: "TN 23 AB 1234".into(),
        phone: "+91 98765 43210".into(),
        eta_minutes: 3,
    };

    let err = ride.assign_driver(stale, assignment.clone()).unwrap_err();
    assert_eq!(err.code, 100);
    assert!(ride.is_searching());
    assert!(ride.assignment.is_none());

    ride.assign_driver(fresh, assignment).unwrap();
    assert_eq!(ride.status.name(), "driver_found");
}

#[test]
fn cancelling_a_found_driver_charges_the_fee() {
    use crate::entities::Location;

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");
    let request = TripRequest::new(pickup, destination, 2.0, RideKind::Instant, None).unwrap();
    let quote = Quote::new(&request).unwrap();

    let mut ride = Ride::new(Uuid::new_v4(), request, quote);

    let ticket = ride.submit().unwrap().unwrap();
    let assignment = DriverAssignment {
        driver_name: "Rajesh Kumar".into(),
        rating: 4.8,
        vehicle: "Maruti Swift Dzire".into(),
        license_plate: "TN 23 AB 1234".into(),
        phone: "+91 98765 43210".into(),
        eta_minutes: 3,
    };
    ride.assign_driver(ticket, assignment).unwrap();

    let fee = ride.cancel().unwrap();
    assert_eq!(fee, 5);
    assert_eq!(ride.status.name(), "booking");
    assert!(ride.assignment.is_none());
    assert_eq!(ride.fees_charged, 5);
}

#[test]
fn abandoning_a_found_driver_ends_the_ride_with_the_fee() {
    use crate::entities::Location;

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");
    let request = TripRequest::new(pickup, destination, 2.0, RideKind::Instant, None).unwrap();
    let quote = Quote::new(&request).unwrap();

    let mut ride = Ride::new(Uuid::new_v4(), request, quote);

    let ticket = ride.submit().unwrap().unwrap();
    let assignment = DriverAssignment {
        driver_name: "Rajesh Kumar".into(),
        rating: 4.8,
        vehicle: "Maruti Swift Dzire".into(),
        license_plate: "TN 23 AB 1234".into(),
        phone: "+91 98765 43210".into(),
        eta_minutes: 3,
    };
    ride.assign_driver(ticket, assignment).unwrap();

    let fee = ride.abandon().unwrap();
    assert_eq!(fee, 5);
    assert_eq!(ride.status.name(), "cancelled");
    assert!(ride.assignment.is_none());

    let err = ride.submit().unwrap_err();
    assert_eq!(err.code, 100);
}

#[test]
fn out_of_order_events_are_rejected() {
    use crate::entities::Location;

    let pickup = Location::new(12.6870, 78.6250, "Vaniyambadi Bus Stand");
    let destination = Location::new(12.6930, 78.6390, "Vaniyambadi Railway Station");
    let request = TripRequest::new(pickup, destination, 2.0, RideKind::Instant, None).unwrap();
    let quote = Quote::new(&request).unwrap();

    let mut ride = Ride::new(Uuid::new_v4(), request, quote);

    assert_eq!(ride.begin_trip().unwrap_err().code, 100);
    assert_eq!(ride.complete_trip().unwrap_err().code, 100);
    assert_eq!(ride.confirm_advance_payment().unwrap_err().code, 100);

    ride.submit().unwrap();
    assert_eq!(ride.begin_trip().unwrap_err().code, 100);
}
