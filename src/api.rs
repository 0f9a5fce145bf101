use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Location, Quote, Ride, RideKind, TripRequest};
use crate::error::Error;

#[async_trait]
pub trait RequestAPI {
    async fn create_request(
        &self,
        user: User,
        pickup: Location,
        destination: Location,
        distance_km: f64,
        kind: RideKind,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<TripRequest, Error>;

    async fn find_request(&self, user: User, token: Uuid) -> Result<TripRequest, Error>;
}

#[async_trait]
pub trait QuoteAPI {
    async fn create_quote(&self, user: User, request_token: Uuid) -> Result<Quote, Error>;

    async fn find_quote(&self, user: User, quote_token: Uuid) -> Result<Quote, Error>;
}

#[async_trait]
pub trait RideAPI {
    async fn create_ride(&self, user: User, quote_token: Uuid) -> Result<Ride, Error>;

    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn submit_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn confirm_advance_payment(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn abandon_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn begin_trip(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn complete_trip(&self, user: User, id: Uuid) -> Result<Ride, Error>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Earnings {
    pub gross: i64,
    pub commission_due: f64,
}

#[async_trait]
pub trait HistoryAPI {
    async fn ride_history(&self, user: User) -> Result<Vec<Ride>, Error>;

    async fn earnings_summary(&self, user: User) -> Result<Earnings, Error>;
}

pub trait API: RequestAPI + QuoteAPI + RideAPI + HistoryAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
