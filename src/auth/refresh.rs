// Token renewal exchange

use reqwest::header::HeaderValue;

use super::types::{RefreshRequest, TokenResponse};
use crate::error::{ApiError, RefreshError};
use crate::transport::{ApiRequest, Transport};

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Credentials issued by a successful renewal
#[derive(Clone)]
pub struct RenewedCredentials {
    pub access_token: String,

    /// Present only when the server rotates the refresh credential
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for RenewedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewedCredentials")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Exchange a refresh credential for a new access credential.
///
/// Goes straight to the transport: no credential is attached and a 401
/// here is a refresh failure, never a reason to refresh again.
pub async fn exchange(
    transport: &dyn Transport,
    refresh_token: &str,
) -> Result<RenewedCredentials, RefreshError> {
    tracing::info!("Refreshing access token...");

    let body = serde_json::to_value(RefreshRequest { refresh_token })
        .map_err(|e| ApiError::Internal(e.into()))?;
    let request = ApiRequest::post(REFRESH_PATH)
        .with_json(body)
        .without_refresh();

    let response = transport
        .send(&request)
        .await
        .map_err(ApiError::from)?
        .into_result()?;

    let data: TokenResponse = response.json()?;

    let access_token = data
        .access_credential()
        .ok_or_else(|| {
            ApiError::InvalidResponse("Refresh response does not contain access_token".to_string())
        })?
        .to_string();

    // The token ends up in a header on every replay
    if HeaderValue::from_str(&format!("Bearer {}", access_token)).is_err() {
        return Err(ApiError::InvalidResponse(
            "Refresh response contains an access_token that is not a valid header value"
                .to_string(),
        )
        .into());
    }

    tracing::info!(
        rotated_refresh = data.refresh_credential().is_some(),
        "Access token refreshed"
    );

    Ok(RenewedCredentials {
        access_token,
        refresh_token: data.refresh_credential().map(str::to_string),
    })
}
