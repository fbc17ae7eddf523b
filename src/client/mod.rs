pub mod classify;
pub mod client;
pub mod interceptor;

pub use client::{ApiRequest, ApiResponse, AuthClient};
pub use interceptor::SilentList;
