//! Client-session identity.
//!
//! Every browser session carries a stable opaque id in the `x-client-id`
//! header; it scopes job ownership and owner-wide eviction. There is no
//! authentication here, only separation between concurrent sessions.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use plpack_models::OwnerKey;

use crate::error::ApiError;

/// Header carrying the session id.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Maximum accepted id length.
const MAX_CLIENT_ID_LEN: usize = 128;

/// Extracted session identity.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub owner: OwnerKey,
}

/// Validate a raw client id value.
fn parse_client_id(value: &str) -> Result<OwnerKey, ApiError> {
    let value = value.trim();
    if value.is_empty() || value.len() > MAX_CLIENT_ID_LEN {
        return Err(ApiError::bad_request("Invalid client id"));
    }
    // Ids double as directory names; keep them to a safe alphabet
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::bad_request("Invalid client id"));
    }
    Ok(OwnerKey::from_string(value))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CLIENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::bad_request("Missing x-client-id header"))?;

        Ok(Self {
            owner: parse_client_id(value)?,
        })
    }
}
