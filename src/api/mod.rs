pub mod base;
pub mod http_api;

// Re-export from base.rs so we can do "use crate::api::*;"
pub use base::*;
pub use http_api::HttpAuthApi;
