pub mod api;
pub mod auth;
pub mod engine;
pub mod entities;
pub mod error;
pub mod external;
pub mod fare;
pub mod matching;
