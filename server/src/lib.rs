use std::path::PathBuf;

use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

pub mod config;
pub mod credentials;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod logic;
pub mod mailer;
pub mod sessions;
pub mod sqlite;
pub mod state;
pub mod storage;

use crate::handlers::admin::{participants_handler, table_rows_handler, tables_handler};
use crate::handlers::auth::{login_handler, logout_handler, me_handler, register_handler};
use crate::handlers::body_map::{
    body_map_history_handler, body_map_version_handler, latest_body_map_handler,
    overlay_handler, save_body_map_handler,
};
use crate::handlers::forms::{
    create_form_handler, get_form_handler, list_forms_handler, update_form_handler,
};
use crate::handlers::heartbeat::{health_handler, ws_handler};
use crate::handlers::responses::{
    available_forms_handler, get_response_handler, submit_response_handler,
};
use crate::handlers::{admin_page_handler, AdminPage};
use crate::state::AppState;

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/me", get(me_handler))
        .route(
            "/admin/forms",
            get(list_forms_handler).post(create_form_handler),
        )
        .route(
            "/admin/forms/:id",
            get(get_form_handler).put(update_form_handler),
        )
        .route("/admin/participants", get(participants_handler))
        .route("/admin/db/tables", get(tables_handler))
        .route("/admin/db/table/:name", get(table_rows_handler))
        .route("/admin/body-maps/latest", get(overlay_handler))
        .route("/forms/available", get(available_forms_handler))
        .route("/forms/:id/response", get(get_response_handler))
        .route("/forms/:id/responses", post(submit_response_handler))
        .route("/body-map", post(save_body_map_handler))
        .route("/body-map/latest", get(latest_body_map_handler))
        .route("/body-map/versions", get(body_map_history_handler))
        .route("/body-map/:id", get(body_map_version_handler))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// Full application router. Static files are served only when a public
/// directory is given.
pub fn build_router(state: AppState, public_dir: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .nest("/api", api_router())
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));
    if let Some(public_dir) = public_dir {
        let admin_page = public_dir.join("admin.html");
        app = app
            .route("/admin.html", get(admin_page_handler))
            .layer(Extension(AdminPage(admin_page)))
            .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true));
    }
    app.with_state(state)
}
