//! Credential authentication and API token authorization.
//!
//! # Responsibility
//! - Turn credentials into an authenticated `User` or a session token.
//! - Decide whether a presented token string satisfies a policy.
//!
//! # Invariants
//! - Both paths resolve records through a service context only.
//! - Failure reasons go to the log; callers see a single error kind.
//! - Neither path extends a token's lifetime.

mod authenticator;
mod authorizer;

pub use authenticator::{Authenticator, CredentialsAuthenticator, UserAuthenticator};
pub use authorizer::{ApiTokenAuthorizer, AuthorizationPolicy, ResolvedToken, TokenPolicy};

use chrono::Utc;

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
