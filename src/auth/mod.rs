// Authentication module
// Bearer attachment, credential types and single-flight token refresh

mod attacher;
mod coordinator;
mod refresh;
mod types;

pub use attacher::attach;
pub use coordinator::{AuthState, RefreshCoordinator, SessionLease};
pub use refresh::{exchange, RenewedCredentials, REFRESH_PATH};
pub use types::{CredentialPair, LoginRequest, SignupRequest, TokenResponse};
