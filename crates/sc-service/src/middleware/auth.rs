//! Caller identity middleware.
//!
//! Authentication happens at the gateway, which forwards the verified user
//! identifier in the `x-user-id` header. This middleware lifts it into an
//! [`AuthenticatedUser`] request extension for handlers.

use crate::errors::ScError;
use axum::{extract::Request, middleware::Next, response::IntoResponse};
use common::types::UserId;
use tracing::instrument;

/// Header carrying the gateway-verified user identifier.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Maximum accepted length of a user identifier.
const MAX_USER_ID_LENGTH: usize = 256;

/// Authenticated caller of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

fn extract_user_id(req: &Request) -> Result<UserId, ScError> {
    let value = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "sc.middleware.auth", "Missing caller identity header");
            ScError::Unauthenticated("missing caller identity".to_string())
        })?;

    if value.len() > MAX_USER_ID_LENGTH {
        return Err(ScError::Unauthenticated(
            "invalid caller identity".to_string(),
        ));
    }
    Ok(UserId::new(value))
}

/// Reject requests without a caller identity.
///
/// # Response
///
/// - 401 Unauthorized when the header is missing, blank or oversized
/// - Otherwise continues with `AuthenticatedUser` in the request extensions
#[instrument(skip_all, name = "sc.middleware.auth")]
pub async fn require_user(mut req: Request, next: Next) -> Result<impl IntoResponse, ScError> {
    let user_id = extract_user_id(&req)?;
    req.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(next.run(req).await)
}
