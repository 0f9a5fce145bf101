use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::{QuoteAPI, RequestAPI},
    auth::{Role, User},
    entities::Quote,
    error::{invalid_input_error, Error},
};

#[async_trait]
impl QuoteAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_quote(&self, user: User, request_token: Uuid) -> Result<Quote, Error> {
        let request = self.find_request(user.clone(), request_token).await?;

        let quote = Quote::new(&request)?;

        self.quotes.lock().await.insert(quote.token, quote.clone());

        Ok(quote)
    }

    #[tracing::instrument(skip(self))]
    async fn find_quote(&self, user: User, quote_token: Uuid) -> Result<Quote, Error> {
        self.authorize(&user, Role::Passenger)?;

        let quotes = self.quotes.lock().await;
        let quote = quotes.get(&quote_token).ok_or_else(|| invalid_input_error())?;

        Ok(quote.clone())
    }
}

#[test]
fn each_quote_gets_its_own_token() {
    use crate::entities::{Location, RideKind};
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

    let first = block_on(engine.create_quote(user.clone(), request.token)).unwrap();
    let second = block_on(engine.create_quote(user.clone(), request.token)).unwrap();

    assert_ne!(first.token, second.token);
    assert_eq!(first.base_fare, second.base_fare);
    assert_eq!(first.base_fare, 60);

    let found = block_on(engine.find_quote(user, second.token)).unwrap();
    assert_eq!(found.token, second.token);
}

#[test]
fn quote_for_an_unknown_request_is_rejected() {
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

    let err = block_on(engine.create_quote(user, Uuid::new_v4())).unwrap_err();
    assert_eq!(err.code, 101);
}
