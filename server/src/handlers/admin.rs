use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::sessions::AdminUser;
use crate::state::AppState;
use crate::storage::{is_valid_table_name, TableRows};

pub async fn participants_handler(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let participants = state.storage.list_participants().await?;
    Ok(Json(json!({ "participants": participants })))
}

pub async fn tables_handler(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let tables = state.storage.list_tables().await?;
    Ok(Json(json!({ "tables": tables })))
}

pub async fn table_rows_handler(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> ApiResult<Json<TableRows>> {
    if !is_valid_table_name(&table) {
        return Err(ApiError::BadRequest("Invalid table name".into()));
    }
    let rows = state.storage.table_rows(&table).await?;
    Ok(Json(rows))
}
