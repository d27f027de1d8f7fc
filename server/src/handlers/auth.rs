use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{parse_body, JsonBody};
use crate::credentials::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::sessions::{
    clear_session_cookie, create_session, current_user, destroy_session, session_cookie,
    session_id_from_headers, SessionUser,
};
use crate::state::AppState;
use crate::storage::NewParticipant;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    age: Option<Value>,
    #[serde(default)]
    sex: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    gender_other: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Form posts send the age as a string; anything that is not a whole
/// number is dropped.
fn parse_age(value: Option<Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

async fn run_blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::Internal(format!("blocking task failed: {err}")))
}

pub async fn register_handler(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<Value>> {
    let request: RegisterRequest = parse_body(body)?;
    let (Some(email), Some(password)) = (non_empty(request.email), request.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::BadRequest("Email and password are required".into()));
    };

    let hash_input = password.clone();
    let password_hash = run_blocking(move || hash_password(&hash_input))
        .await?
        .map_err(ApiError::Internal)?;
    let participant = state
        .storage
        .create_participant(
            NewParticipant {
                email,
                age: parse_age(request.age),
                sex: non_empty(request.sex),
                gender: non_empty(request.gender),
                gender_other: non_empty(request.gender_other),
                password_hash,
            },
            Utc::now(),
        )
        .await?;
    info!(participant_id = participant.id, code = %participant.code, "participant registered");

    if let Err(err) = state
        .mailer
        .send_credentials(&participant.email, &participant.code, &password)
        .await
    {
        warn!(participant_id = participant.id, error = %err, "credentials email failed");
    }

    Ok(Json(json!({
        "ok": true,
        "code": participant.code,
        "email": participant.email,
        "createdAt": participant.created_at,
    })))
}

pub async fn login_handler(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let request: LoginRequest = parse_body(body)?;
    let (Some(username), Some(password)) = (
        request.username.filter(|u| !u.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::BadRequest("Missing username or password".into()));
    };
    let now = Utc::now();

    if state.auth.is_admin(&username, &password) {
        let session_id = create_session(
            &state,
            SessionUser::Admin {
                username: username.clone(),
            },
            now,
        )
        .await;
        info!(admin = %username, "admin logged in");
        let cookie = session_cookie(&session_id, state.auth.secure_cookies);
        return Ok((
            AppendHeaders([(SET_COOKIE, cookie)]),
            Json(json!({ "ok": true, "role": "admin" })),
        )
            .into_response());
    }

    let invalid = || ApiError::Unauthorized("Invalid code or password".into());
    let participant = state
        .storage
        .find_participant_by_code(username.trim())
        .await?
        .ok_or_else(invalid)?;
    let stored_hash = participant.password_hash.clone();
    if !run_blocking(move || verify_password(&password, &stored_hash)).await? {
        warn!(code = %participant.code, "participant login rejected");
        return Err(invalid());
    }

    let session_id = create_session(
        &state,
        SessionUser::Participant {
            id: participant.id,
            code: participant.code.clone(),
        },
        now,
    )
    .await;
    info!(participant_id = participant.id, "participant logged in");
    let cookie = session_cookie(&session_id, state.auth.secure_cookies);
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({ "ok": true, "role": "participant", "code": participant.code })),
    )
        .into_response())
}

pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(session_id) = session_id_from_headers(&headers) {
        destroy_session(&state, &session_id).await;
    }
    (
        AppendHeaders([(SET_COOKIE, clear_session_cookie(state.auth.secure_cookies))]),
        Json(json!({ "ok": true })),
    )
        .into_response()
}

pub async fn me_handler(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let user = current_user(&state, &headers).await;
    Json(json!({ "user": user }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ages_accept_numbers_and_numeric_strings() {
        assert_eq!(parse_age(Some(json!(34))), Some(34));
        assert_eq!(parse_age(Some(json!(" 41 "))), Some(41));
        assert_eq!(parse_age(Some(json!("forty"))), None);
        assert_eq!(parse_age(Some(json!(null))), None);
        assert_eq!(parse_age(None), None);
    }

    #[test]
    fn blank_fields_become_none() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some(" x ".into())), Some("x".into()));
    }
}
