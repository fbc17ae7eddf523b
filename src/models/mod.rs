pub mod credentials;
pub mod identity;
pub mod record;

pub use credentials::{CredentialPair, LoginGrant};
pub use identity::IdentitySnapshot;
pub use record::{PersistedSession, PersistedSessionV1};
