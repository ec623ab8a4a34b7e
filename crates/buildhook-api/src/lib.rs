//! HTTP build trigger server for buildhook.
//!
//! Accepts build requests, runs them in the background and delivers the
//! outcome to the caller's callback URL and an optional chat channel.

pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use state::AppState;

#[cfg(test)]
pub(crate) mod testing;
