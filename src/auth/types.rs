// Authentication types

use serde::{Deserialize, Serialize};

use crate::models::User;

/// Access credential plus, for renewable sessions, a refresh credential
#[derive(Clone, PartialEq)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: Option<String>,
}

impl CredentialPair {
    /// A session without a refresh credential can never be renewed
    pub fn is_renewable(&self) -> bool {
        self.refresh.is_some()
    }
}

// Never print the secrets themselves
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Login request body
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Signup request body
#[derive(Serialize)]
pub struct SignupRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Renewal request body
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Body returned by login, signup and refresh
#[derive(Deserialize, Default)]
pub struct TokenResponse {
    pub access_token: Option<String>,

    /// Legacy single-token field, kept by the backend for old clients
    pub token: Option<String>,

    pub refresh_token: Option<String>,

    pub user: Option<User>,
}

impl TokenResponse {
    /// Access credential, preferring `access_token` over legacy `token`
    pub fn access_credential(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.token.as_deref().filter(|t| !t.is_empty()))
    }

    pub fn refresh_credential(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}
