use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::api::SharedState;
use crate::errors::{FlowieError, Result};

/// The authenticated caller, resolved from an `Authorization: Bearer` header.
///
/// Rejects with 401 when the header is missing, the token does not verify,
/// or the user's sessions were revoked after the token was issued.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| FlowieError::Unauthorized("Missing bearer token".into()))?;
    let value = header
        .to_str()
        .map_err(|_| FlowieError::Unauthorized("Malformed Authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| FlowieError::Unauthorized("Missing bearer token".into()))
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = FlowieError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.auth.verify_access_token(token, state.clock.now())?;
        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| FlowieError::Unauthorized("Invalid access token".into()))?;

        let user = state
            .db
            .call(move |db| db.get_user(user_id))
            .await
            .map_err(|e| match e {
                FlowieError::NotFound { .. } => {
                    FlowieError::Unauthorized("Invalid access token".into())
                }
                other => other,
            })?;

        if user.token_version != claims.ver {
            return Err(FlowieError::Unauthorized("Session has been revoked".into()));
        }

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
        })
    }
}
