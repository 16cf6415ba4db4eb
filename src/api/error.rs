//! HTTP mapping of [`FlowieError`] to `application/problem+json` bodies.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{FlowieError, ValidationErrors};

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

#[derive(Debug, Serialize)]
struct Problem {
    #[serde(rename = "type")]
    kind: &'static str,
    title: &'static str,
    status: u16,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<ValidationErrors>,
}

impl IntoResponse for FlowieError {
    fn into_response(self) -> Response {
        let (status, title, detail, errors) = match &self {
            FlowieError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed",
                "One or more fields are invalid".to_string(),
                Some(errors.clone()),
            ),
            FlowieError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, "Not found", self.to_string(), None)
            }
            FlowieError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized", reason.clone(), None)
            }
            FlowieError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
                self.to_string(),
                None,
            ),
            FlowieError::Database(_) | FlowieError::Other(_) => {
                tracing::error!(error = ?self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "An unexpected error occurred".to_string(),
                    None,
                )
            }
        };

        let problem = Problem {
            kind: "about:blank",
            title,
            status: status.as_u16(),
            detail,
            errors,
        };
        let mut response = (status, Json(problem)).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        match self {
            FlowieError::RateLimited { retry_after_secs } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            }
            FlowieError::Unauthorized(_) => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            _ => {}
        }
        response
    }
}

/// JSON request body whose rejections render as problem bodies.
#[derive(Debug)]
pub struct Payload<T>(pub T);

impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = FlowieError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| FlowieError::validation("body", rejection.body_text()))?;
        Ok(Payload(value))
    }
}

/// Query string whose rejections render as problem bodies.
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = FlowieError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| FlowieError::validation("query", rejection.body_text()))?;
        Ok(QueryParams(value))
    }
}

/// Path parameters whose rejections render as problem bodies.
#[derive(Debug)]
pub struct PathParam<T>(pub T);

impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = FlowieError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| FlowieError::validation("path", rejection.body_text()))?;
        Ok(PathParam(value))
    }
}
