//! Cookie-backed login sessions held in memory.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::ParticipantRef;

pub const SESSION_COOKIE: &str = "studyboard_sid";
pub const SESSION_TTL_HOURS: i64 = 24;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum SessionUser {
    Admin { username: String },
    Participant { id: i64, code: String },
}

#[derive(Clone, Debug)]
pub struct LoginSession {
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn normalize_session_id(value: &str) -> Option<String> {
    let parsed = Uuid::parse_str(value).ok()?;
    Some(parsed.to_string())
}

pub async fn create_session(state: &AppState, user: SessionUser, now: DateTime<Utc>) -> String {
    let session_id = new_session_id();
    let session = LoginSession {
        user,
        expires_at: now + Duration::hours(SESSION_TTL_HOURS),
    };
    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), session);
    session_id
}

pub async fn lookup_session(
    state: &AppState,
    session_id: &str,
    now: DateTime<Utc>,
) -> Option<SessionUser> {
    {
        let sessions = state.sessions.read().await;
        match sessions.get(session_id) {
            Some(session) if session.expires_at > now => return Some(session.user.clone()),
            Some(_) => {}
            None => return None,
        }
    }
    state.sessions.write().await.remove(session_id);
    None
}

pub async fn destroy_session(state: &AppState, session_id: &str) {
    state.sessions.write().await.remove(session_id);
}

/// Drops every expired session and returns how many were removed.
pub async fn purge_expired(state: &AppState, now: DateTime<Utc>) -> usize {
    let mut sessions = state.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|_, session| session.expires_at > now);
    before - sessions.len()
}

pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| normalize_session_id(value.trim()))
}

pub fn session_cookie(session_id: &str, secure: bool) -> String {
    let max_age = SESSION_TTL_HOURS * 60 * 60;
    let mut cookie =
        format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<SessionUser> {
    let session_id = session_id_from_headers(headers)?;
    lookup_session(state, &session_id, Utc::now()).await
}

/// Logged-in user of either role; 401 without a live session.
pub struct AuthUser(pub SessionUser);

/// Admin session; 403 for participants.
pub struct AdminUser(pub String);

/// Participant session; 403 for admins.
pub struct ParticipantUser(pub ParticipantRef);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        current_user(state, &parts.headers)
            .await
            .map(AuthUser)
            .ok_or_else(|| ApiError::Unauthorized("Not logged in".into()))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        match AuthUser::from_request_parts(parts, state).await?.0 {
            SessionUser::Admin { username } => Ok(AdminUser(username)),
            SessionUser::Participant { .. } => Err(ApiError::Forbidden),
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for ParticipantUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        match AuthUser::from_request_parts(parts, state).await?.0 {
            SessionUser::Participant { id, code } => Ok(ParticipantUser(ParticipantRef { id, code })),
            SessionUser::Admin { .. } => Err(ApiError::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::HeaderValue;

    use super::*;
    use crate::config::AuthConfig;
    use crate::mailer::LogMailer;
    use crate::sqlite::SqliteStorage;

    fn state() -> AppState {
        AppState::new(
            Arc::new(SqliteStorage::open_in_memory().unwrap()),
            Arc::new(LogMailer),
            AuthConfig::default(),
        )
    }

    #[test]
    fn normalizes_uuid() {
        let id = Uuid::new_v4();
        let upper = id.to_string().to_uppercase();
        assert_eq!(normalize_session_id(&upper), Some(id.to_string()));
        assert_eq!(normalize_session_id("nope"), None);
    }

    #[test]
    fn finds_cookie_among_others() {
        let id = new_session_id();
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            COOKIE,
            HeaderValue::from_str(&format!("a=1; {SESSION_COOKIE}={id}; b=2")).unwrap(),
        );
        assert_eq!(session_id_from_headers(&headers), Some(id));
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("abc", true);
        assert!(cookie.starts_with("studyboard_sid=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn sessions_expire() {
        let state = state();
        let now = Utc::now();
        let user = SessionUser::Participant {
            id: 7,
            code: "P-123456".into(),
        };
        let id = create_session(&state, user.clone(), now).await;
        assert_eq!(lookup_session(&state, &id, now).await, Some(user));

        let later = now + Duration::hours(SESSION_TTL_HOURS + 1);
        assert_eq!(lookup_session(&state, &id, later).await, None);
        assert!(state.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn purge_keeps_live_sessions() {
        let state = state();
        let now = Utc::now();
        let admin = SessionUser::Admin {
            username: "root".into(),
        };
        create_session(&state, admin.clone(), now - Duration::hours(30)).await;
        let live = create_session(&state, admin, now).await;
        assert_eq!(purge_expired(&state, now).await, 1);
        assert!(state.sessions.read().await.contains_key(&live));

        destroy_session(&state, &live).await;
        assert!(state.sessions.read().await.is_empty());
    }

    #[test]
    fn user_json_carries_role() {
        let json = serde_json::to_value(SessionUser::Participant {
            id: 3,
            code: "P-100001".into(),
        })
        .unwrap();
        assert_eq!(json["role"], "participant");
        assert_eq!(json["code"], "P-100001");
    }
}
