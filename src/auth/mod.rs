mod gateway;
mod session;
mod user;

pub use gateway::{IdentityGateway, Profile, VerificationHandle};
pub use session::Session;
pub use user::{Role, User};
