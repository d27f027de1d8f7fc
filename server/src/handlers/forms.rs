use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use super::{parse_body, parse_id, JsonBody};
use crate::error::ApiResult;
use crate::forms::FormInput;
use crate::sessions::AdminUser;
use crate::state::AppState;
use crate::storage::FormWithQuestions;

fn form_and_questions(saved: FormWithQuestions) -> Json<Value> {
    Json(json!({ "form": saved.form, "questions": saved.questions }))
}

pub async fn create_form_handler(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<Value>> {
    let now = Utc::now();
    let form = parse_body::<FormInput>(body)?.into_new_form(now)?;
    let created = state.storage.create_form(form, now).await?;
    info!(
        admin = %admin,
        form_id = created.form.id,
        questions = created.questions.len(),
        "form created"
    );
    Ok(form_and_questions(created))
}

pub async fn update_form_handler(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<Value>> {
    let form_id = parse_id(&form_id, "form")?;
    let now = Utc::now();
    let form = parse_body::<FormInput>(body)?.into_new_form(now)?;
    let replaced = state.storage.replace_form(form_id, form, now).await?;
    info!(admin = %admin, form_id, questions = replaced.questions.len(), "form replaced");
    Ok(form_and_questions(replaced))
}

pub async fn list_forms_handler(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let forms = state.storage.list_forms().await?;
    Ok(Json(json!({ "forms": forms })))
}

pub async fn get_form_handler(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let form_id = parse_id(&form_id, "form")?;
    let form = state.storage.get_form(form_id).await?;
    Ok(Json(json!({ "form": form })))
}
