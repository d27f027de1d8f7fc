use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;

use super::{parse_id, JsonBody};
use crate::error::ApiResult;
use crate::forms::FormError;
use crate::sessions::ParticipantUser;
use crate::state::AppState;

pub async fn available_forms_handler(
    _participant: ParticipantUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let forms = state.storage.list_available_forms(Utc::now()).await?;
    Ok(Json(json!({ "forms": forms })))
}

pub async fn get_response_handler(
    ParticipantUser(participant): ParticipantUser,
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let form_id = parse_id(&form_id, "form")?;
    let response = state.storage.get_response(form_id, participant.id).await?;
    Ok(Json(json!({ "response": response })))
}

/// `answers` missing or null counts as an empty submission.
fn answers_from_body(body: Value) -> Result<Map<String, Value>, FormError> {
    match body {
        Value::Object(mut fields) => match fields.remove("answers") {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(answers)) => Ok(answers),
            Some(_) => Err(FormError::AnswersNotObject),
        },
        Value::Null => Ok(Map::new()),
        _ => Err(FormError::AnswersNotObject),
    }
}

pub async fn submit_response_handler(
    ParticipantUser(participant): ParticipantUser,
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<Value>> {
    let form_id = parse_id(&form_id, "form")?;
    let answers = answers_from_body(body)?;
    let participant_id = participant.id;
    let response_id = state
        .storage
        .submit_response(form_id, participant, answers, Utc::now())
        .await?;
    info!(form_id, participant_id, response_id, "form response saved");
    Ok(Json(json!({ "ok": true, "responseId": response_id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_body_shapes() {
        assert!(answers_from_body(json!({})).unwrap().is_empty());
        assert!(answers_from_body(json!({"answers": null})).unwrap().is_empty());
        assert_eq!(
            answers_from_body(json!({"answers": {"3": "x"}})).unwrap()["3"],
            json!("x")
        );
        assert_eq!(
            answers_from_body(json!({"answers": ["x"]})),
            Err(FormError::AnswersNotObject)
        );
    }
}
