//! The three seams the session uses to reach the rest of the application:
//! a notification sink, a navigator and the permission cache.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::models::IdentitySnapshot;

/// Where user-visible errors go (a toast in a UI, a line on stderr in a CLI).
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

/// Performs "redirect to X" on behalf of the guards.
pub trait Navigator: Send + Sync {
    fn redirect(&self, location: &str);
}

/// Identity-keyed permission data owned by the application.
///
/// `load` may run in the background after login or initialization;
/// `clear` is called synchronously on logout.
#[async_trait]
pub trait PermissionCache: Send + Sync {
    async fn load(&self, identity: &IdentitySnapshot) -> Result<(), String>;
    fn clear(&self);
}

/// Logs notifications instead of displaying them.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        warn!(event_name = "notification", "{}", message);
    }
}

/// Logs redirects instead of navigating.
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, location: &str) {
        info!("Redirecting to '{}'", location);
    }
}

/// A permission cache that holds nothing.
pub struct NoPermissionCache;

#[async_trait]
impl PermissionCache for NoPermissionCache {
    async fn load(&self, _identity: &IdentitySnapshot) -> Result<(), String> {
        Ok(())
    }

    fn clear(&self) {}
}
