use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::auth::{self, RefreshCoordinator};
use crate::error::ApiError;
use crate::store::{CredentialStore, TokenService};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// HTTP client that authenticates every request and recovers from
/// expired access tokens.
///
/// Request flow: attach the stored bearer token, send, and on a 401 for a
/// request that may still be refreshed hand it to the refresh coordinator.
/// Every other outcome reaches the caller unchanged; there is no retry for
/// transport errors or other statuses.
pub struct AuthedClient {
    transport: Arc<dyn Transport>,
    tokens: TokenService,
    coordinator: RefreshCoordinator,
}

impl AuthedClient {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CredentialStore>) -> Self {
        let tokens = TokenService::new(store);
        let coordinator = RefreshCoordinator::new(transport.clone(), tokens.clone());
        Self {
            transport,
            tokens,
            coordinator,
        }
    }

    /// Execute a request, returning success responses only
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let request = auth::attach(&self.tokens, request).await;

        let response = match self.transport.send(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    request_id = %request.id(),
                    path = %request.path,
                    error_kind = e.kind(),
                    "Request failed before a response was received"
                );
                return Err(e.into());
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED && request.can_refresh() {
            let failure = ApiError::from_status(status.as_u16(), response.body());
            return self.coordinator.recover(request, failure).await;
        }

        if !status.is_success() {
            tracing::debug!(
                request_id = %request.id(),
                path = %request.path,
                status = %status,
                "Request returned error status"
            );
        }

        response.into_result()
    }

    /// Execute a request and decode the JSON body
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ApiError> {
        self.execute(request).await?.json()
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }
}
