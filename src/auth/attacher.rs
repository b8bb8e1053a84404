// Bearer credential injection

use crate::store::TokenService;
use crate::transport::ApiRequest;

/// Attach the stored access credential as `Authorization: Bearer <token>`.
///
/// Without a stored credential the request passes through unchanged. A
/// store read failure counts as "no credential": the server will answer
/// 401 and the normal refresh path takes over.
pub async fn attach(tokens: &TokenService, mut request: ApiRequest) -> ApiRequest {
    match tokens.access_token().await {
        Ok(Some(token)) => {
            if let Err(e) = request.set_bearer(&token) {
                tracing::warn!(
                    request_id = %request.id(),
                    error = %e,
                    "Stored access token is not a valid header value, sending unauthenticated"
                );
            }
        }
        Ok(None) => {
            tracing::debug!(request_id = %request.id(), "No access token stored");
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request.id(),
                error = %e,
                "Failed to read access token, sending unauthenticated"
            );
        }
    }

    request
}
