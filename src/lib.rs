// Reel client - Library root

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

pub use auth::AuthState;
pub use client::AuthedClient;
pub use error::ApiError;
pub use session::{AuthOutcome, Session};
