pub mod coordinator;
pub mod session;
pub mod state;
pub mod validity;

pub use coordinator::{RefreshCoordinator, RefreshRole, RefreshTicket};
pub use session::{Session, SESSION_EXPIRED_MESSAGE};
pub use state::{SessionPhase, SessionState};
