use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::{Payload, SharedState};
use crate::auth::password::{
    hash_password_async, verify_password_async, verify_unknown_account_async,
};
use crate::auth::{AuthUser, TokenPair, hash_refresh_token};
use crate::errors::{FlowieError, Result};
use crate::models::{Employee, Login, RefreshSession, Register};
use crate::validation::Validate;

#[derive(Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub employee: Employee,
}

fn invalid_credentials() -> FlowieError {
    FlowieError::Unauthorized("Invalid email or password".into())
}

pub async fn register(
    State(state): State<SharedState>,
    Payload(cmd): Payload<Register>,
) -> Result<impl IntoResponse> {
    cmd.validate(&state.validation_context())?;
    let password_hash = hash_password_async(cmd.password.clone()).await?;

    let now = state.clock.now();
    let auth = state.auth.clone();
    let session = state
        .db
        .call(move |db| {
            let (user, employee) =
                db.create_user_with_employee(&cmd.email, &password_hash, &cmd.name, now)?;
            let tokens = auth.issue_tokens(db, &user, now)?;
            Ok(SessionResponse { tokens, employee })
        })
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn login(
    State(state): State<SharedState>,
    Payload(cmd): Payload<Login>,
) -> Result<impl IntoResponse> {
    let email = cmd.email.clone();
    let user = match state
        .db
        .call(move |db| db.get_user_by_email(&email))
        .await?
    {
        Some(user) => user,
        None => {
            verify_unknown_account_async(cmd.password).await?;
            return Err(invalid_credentials());
        }
    };

    if !verify_password_async(cmd.password, user.password_hash.clone()).await? {
        tracing::info!(user_id = user.id, "login rejected");
        return Err(invalid_credentials());
    }

    let now = state.clock.now();
    let auth = state.auth.clone();
    let session = state
        .db
        .call(move |db| {
            let employee = db.get_employee_by_user(user.id)?;
            let tokens = auth.issue_tokens(db, &user, now)?;
            Ok(SessionResponse { tokens, employee })
        })
        .await?;
    Ok(Json(session))
}

/// Exchange a refresh token for a new pair. The presented token is spent
/// only if the new pair was stored.
pub async fn refresh(
    State(state): State<SharedState>,
    Payload(cmd): Payload<RefreshSession>,
) -> Result<impl IntoResponse> {
    let token_hash = hash_refresh_token(cmd.refresh_token.trim());
    let now = state.clock.now();
    let auth = state.auth.clone();
    let tokens = state
        .db
        .call(move |db| {
            db.in_transaction(|db| {
                let user = db.consume_refresh_token(&token_hash, now)?;
                auth.issue_tokens(db, &user, now)
            })
        })
        .await?;
    Ok(Json(tokens))
}

pub async fn logout(State(state): State<SharedState>, user: AuthUser) -> Result<impl IntoResponse> {
    let user_id = user.user_id;
    state
        .db
        .call(move |db| db.revoke_user_sessions(user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
