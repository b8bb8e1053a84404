use serde_json::json;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::auth::{AuthState, LoginRequest, SignupRequest, TokenResponse};
use crate::client::AuthedClient;
use crate::error::ApiError;
use crate::models::{DashboardPage, PlaybackVerification, ProfileResponse, User, VideoStream};
use crate::store::CredentialStore;
use crate::transport::{ApiRequest, ApiResponse, Transport};

pub const LOGIN_PATH: &str = "/auth/login";
pub const SIGNUP_PATH: &str = "/auth/signup";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const PROFILE_PATH: &str = "/auth/me";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const VERIFY_PLAYBACK_PATH: &str = "/video/verify-token";

/// Result of login and signup. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Success { user: Option<User> },
    Failure { message: String },
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            AuthOutcome::Failure { message } => Some(message),
            AuthOutcome::Success { .. } => None,
        }
    }
}

/// Public surface for the view layer
pub struct Session {
    client: AuthedClient,

    /// Profile of the signed-in user, as last reported by the server
    user: RwLock<Option<User>>,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CredentialStore>) -> Self {
        Self::with_client(AuthedClient::new(transport, store))
    }

    pub fn with_client(client: AuthedClient) -> Self {
        Self {
            client,
            user: RwLock::new(None),
        }
    }

    pub fn client(&self) -> &AuthedClient {
        &self.client
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> AuthOutcome {
        let body = json!(SignupRequest {
            name,
            email,
            password
        });
        let request = ApiRequest::post(SIGNUP_PATH)
            .with_json(body)
            .without_refresh();
        self.authenticate(request, "Signup failed").await
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        let body = json!(LoginRequest { email, password });
        let request = ApiRequest::post(LOGIN_PATH)
            .with_json(body)
            .without_refresh();
        self.authenticate(request, "Login failed").await
    }

    async fn authenticate(&self, request: ApiRequest, default_message: &str) -> AuthOutcome {
        let failure = |message: Option<&str>| AuthOutcome::Failure {
            message: message.unwrap_or(default_message).to_string(),
        };

        let data: TokenResponse = match self.client.execute_json(request).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "{}", default_message);
                return failure(e.server_message());
            }
        };

        let Some(access_token) = data.access_credential() else {
            tracing::warn!("Credential response does not contain an access token");
            return failure(None);
        };

        {
            // A new session supersedes any refresh still in flight
            let _lease = self.client.coordinator().reset().await;
            if let Err(e) = self
                .client
                .tokens()
                .save_tokens(access_token, data.refresh_credential())
                .await
            {
                tracing::error!(error = %e, "Failed to persist credentials");
                return failure(None);
            }
        }

        tracing::info!(
            renewable = data.refresh_credential().is_some(),
            "Signed in"
        );

        *self.user.write().await = data.user.clone();
        self.client.coordinator().publish(AuthState::Authenticated);

        AuthOutcome::Success { user: data.user }
    }

    /// Sign out. The remote call is best effort; local credentials are
    /// cleared regardless of its outcome.
    pub async fn logout(&self) {
        let request = ApiRequest::post(LOGOUT_PATH).without_refresh();
        if let Err(e) = self.client.execute(request).await {
            tracing::debug!(error = %e, "Remote logout failed, clearing local session anyway");
        }

        self.end_session().await;
        tracing::info!("Signed out");
    }

    async fn end_session(&self) {
        {
            let _lease = self.client.coordinator().reset().await;
            if let Err(e) = self.client.tokens().clear().await {
                tracing::error!(error = %e, "Failed to clear credentials");
            }
        }
        *self.user.write().await = None;
        self.client.coordinator().publish(AuthState::Unauthenticated);
    }

    /// Restore a persisted session at startup.
    ///
    /// An expired access token is renewed transparently by the profile
    /// request; if that fails the session is torn down.
    pub async fn restore(&self) -> Option<User> {
        match self.client.tokens().access_token().await {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored credentials");
                return None;
            }
        }

        match self.get_profile().await {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "Stored session is no longer valid");
                self.end_session().await;
                None
            }
        }
    }

    pub async fn get_profile(&self) -> Result<User, ApiError> {
        let profile: ProfileResponse = self
            .track(
                self.client
                    .execute_json(ApiRequest::get(PROFILE_PATH))
                    .await,
            )
            .await?;
        *self.user.write().await = Some(profile.user.clone());
        self.client.coordinator().publish(AuthState::Authenticated);
        Ok(profile.user)
    }

    /// Generic authenticated request for feature-specific calls
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let result = self.client.execute(request).await;
        self.track(result).await
    }

    pub async fn dashboard(&self, page: u32, limit: u32) -> Result<DashboardPage, ApiError> {
        let request = ApiRequest::get(DASHBOARD_PATH)
            .with_query("page", page)
            .with_query("limit", limit);
        self.request(request).await?.json()
    }

    pub async fn video_stream(&self, video_id: &str) -> Result<VideoStream, ApiError> {
        let request = ApiRequest::get(format!("/video/{}/stream", video_id));
        self.request(request).await?.json()
    }

    /// Check a playback token.
    ///
    /// The backend answers 401 for a rejected playback token as well as for
    /// an expired access token, so this request never starts a refresh by
    /// itself. On 401 the session is checked through the profile endpoint,
    /// which renews the access token if needed, and the request is reissued
    /// once only when that produced a different access token.
    pub async fn verify_playback_token(
        &self,
        playback_token: &str,
    ) -> Result<PlaybackVerification, ApiError> {
        let presented = self.client.tokens().access_token().await.ok().flatten();

        let rejected = match self.send_verification(playback_token).await {
            Err(e) if e.is_unauthorized() => e,
            other => return other,
        };

        self.get_profile().await?;

        let current = self.client.tokens().access_token().await.ok().flatten();
        if current.is_some() && current != presented {
            tracing::debug!("Access token renewed, reissuing playback verification");
            return self.send_verification(playback_token).await;
        }

        Err(rejected)
    }

    async fn send_verification(
        &self,
        playback_token: &str,
    ) -> Result<PlaybackVerification, ApiError> {
        let request = ApiRequest::post(VERIFY_PLAYBACK_PATH)
            .with_json(json!({ "playback_token": playback_token }))
            .without_refresh();
        self.client.execute_json(request).await
    }

    pub async fn current_user(&self) -> Option<User> {
        if self.client.coordinator().auth_state() == AuthState::Unauthenticated {
            return None;
        }
        self.user.read().await.clone()
    }

    /// True while an access credential is stored
    pub async fn is_authenticated(&self) -> bool {
        matches!(self.client.tokens().access_token().await, Ok(Some(_)))
    }

    /// Observe sign-in and forced sign-out
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.client.coordinator().subscribe()
    }

    /// Forget the cached profile once the coordinator has ended the session
    async fn track<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if matches!(result, Err(ApiError::Unauthorized { .. }))
            && self.client.coordinator().auth_state() == AuthState::Unauthenticated
        {
            *self.user.write().await = None;
        }
        result
    }
}
