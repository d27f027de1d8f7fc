use std::path::PathBuf;

use axum::extract::{FromRequest, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::sessions::{current_user, SessionUser};
use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod body_map;
pub mod forms;
pub mod heartbeat;
pub mod responses;

/// Location of the static admin page, shared with the router as an extension.
#[derive(Clone)]
pub struct AdminPage(pub PathBuf);

pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} id")))
}

/// JSON request body whose rejections (bad syntax, wrong content type)
/// answer with the API error body instead of axum's plain text.
pub struct JsonBody(pub Value);

#[axum::async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

pub(crate) fn parse_body<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    serde_json::from_value(body).map_err(|err| ApiError::BadRequest(format!("Invalid body: {err}")))
}

/// Serves the admin page to admins and sends everyone else to the login page.
pub async fn admin_page_handler(
    State(state): State<AppState>,
    axum::Extension(AdminPage(path)): axum::Extension<AdminPage>,
    headers: HeaderMap,
) -> Response {
    match current_user(&state, &headers).await {
        Some(SessionUser::Admin { .. }) => {}
        _ => return Redirect::to("/").into_response(),
    }
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Html(contents).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_integers() {
        assert_eq!(parse_id("12", "form").unwrap(), 12);
        match parse_id("abc", "form") {
            Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "Invalid form id"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
