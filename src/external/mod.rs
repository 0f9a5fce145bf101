mod identity;

pub use identity::LocalIdentity;
