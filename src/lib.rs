//! Library exports for authsession, shared between the binary and tests.

pub mod api;
pub mod client;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod guards;
pub mod models;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;

pub use error::SessionError;
