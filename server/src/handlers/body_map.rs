use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use studyboard_shared::api::{
    BodyMapHistoryResponse, BodyMapOverlayResponse, BodyMapVersion, BodyMapVersionSummary,
    LatestBodyMapResponse, ParticipantBodyMap, SaveBodyMapResponse,
};
use studyboard_shared::DrawingPayload;
use tracing::info;

use super::{parse_body, parse_id, JsonBody};
use crate::error::{ApiError, ApiResult};
use crate::logic::sanitize_payload;
use crate::sessions::{AdminUser, ParticipantUser};
use crate::state::AppState;
use crate::storage::BodyMapRecord;

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn version_body(record: BodyMapRecord) -> BodyMapVersion {
    BodyMapVersion {
        id: record.id,
        created_at: timestamp(record.created_at),
        payload: record.payload,
    }
}

pub async fn save_body_map_handler(
    ParticipantUser(participant): ParticipantUser,
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<SaveBodyMapResponse>> {
    let payload = sanitize_payload(parse_body::<DrawingPayload>(body)?)?;
    let strokes = payload.shapes.len();
    let saved = state
        .storage
        .save_body_map(participant.id, payload, Utc::now())
        .await?;
    info!(
        participant_id = participant.id,
        version_id = saved.id,
        strokes,
        "body map saved"
    );
    Ok(Json(SaveBodyMapResponse {
        ok: true,
        id: saved.id,
        created_at: timestamp(saved.created_at),
    }))
}

pub async fn latest_body_map_handler(
    ParticipantUser(participant): ParticipantUser,
    State(state): State<AppState>,
) -> ApiResult<Json<LatestBodyMapResponse>> {
    let latest = state.storage.latest_body_map(participant.id).await?;
    Ok(Json(LatestBodyMapResponse {
        version: latest.map(version_body),
    }))
}

pub async fn body_map_history_handler(
    ParticipantUser(participant): ParticipantUser,
    State(state): State<AppState>,
) -> ApiResult<Json<BodyMapHistoryResponse>> {
    let versions = state
        .storage
        .list_body_map_versions(participant.id)
        .await?
        .into_iter()
        .map(|summary| BodyMapVersionSummary {
            id: summary.id,
            created_at: timestamp(summary.created_at),
        })
        .collect();
    Ok(Json(BodyMapHistoryResponse { versions }))
}

pub async fn body_map_version_handler(
    ParticipantUser(participant): ParticipantUser,
    State(state): State<AppState>,
    Path(version_id): Path<String>,
) -> ApiResult<Json<BodyMapVersion>> {
    let version_id = parse_id(&version_id, "body map version")?;
    let record = state
        .storage
        .body_map_version(participant.id, version_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Body map version not found".into()))?;
    Ok(Json(version_body(record)))
}

pub async fn overlay_handler(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<BodyMapOverlayResponse>> {
    let layers = state
        .storage
        .latest_body_maps()
        .await?
        .into_iter()
        .map(|latest| ParticipantBodyMap {
            participant_id: latest.record.participant_id,
            participant_code: latest.participant_code,
            version: version_body(latest.record),
        })
        .collect();
    Ok(Json(BodyMapOverlayResponse { layers }))
}
