mod assignment;
mod location;
mod quote;
mod request;
mod ride;

pub use assignment::DriverAssignment;
pub use location::Location;
pub use quote::Quote;
pub use request::{RideKind, TripRequest};
pub use ride::Ride;
