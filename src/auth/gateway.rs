use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::auth::{Role, Session};
use crate::error::Error;

#[derive(Clone, Debug)]
pub struct Profile {
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Clone, Debug)]
pub struct VerificationHandle {
    pub token: Uuid,
    pub phone: String,
}

/// Capability surface the booking core expects from the identity
/// provider. Role claims on the resulting session come from the
/// provider's directory, never from anything the client stores.
#[async_trait]
pub trait IdentityGateway {
    async fn sign_in_with_password(
        &self,
        identifier: String,
        secret: String,
    ) -> Result<Session, Error>;

    async fn sign_up_with_password(
        &self,
        identifier: String,
        secret: String,
        profile: Profile,
    ) -> Result<Session, Error>;

    async fn start_phone_verification(
        &self,
        phone_number: String,
    ) -> Result<VerificationHandle, Error>;

    async fn confirm_phone_verification(
        &self,
        handle: VerificationHandle,
        code: String,
    ) -> Result<Session, Error>;

    fn current_session(&self) -> Option<Session>;

    fn subscribe(&self) -> watch::Receiver<Option<Session>>;

    async fn end_session(&self);
}
