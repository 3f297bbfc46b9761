use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;
use taskboard_core::board::{BoardQuery, BoardViewModel};
use taskboard_core::types::SortMode;

use super::{error_response, outcome_json, service_error, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BoardParams {
    search: Option<String>,
    sort: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateLaneBody {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct RenameBody {
    name: String,
}

#[derive(Deserialize)]
pub struct CreateCardBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCardBody {
    path: String,
    content: String,
}

#[derive(Deserialize)]
pub struct RenameCardBody {
    path: String,
    name: String,
}

#[derive(Deserialize)]
pub struct MoveCardBody {
    path: String,
    lane: String,
    #[serde(default)]
    position: Option<usize>,
}

#[derive(Deserialize)]
pub struct CardPathParams {
    path: String,
}

/// Re-read the board. Parameters that are left out keep their last value.
pub async fn get_board(
    State(state): State<AppState>,
    Query(params): Query<BoardParams>,
) -> Result<Json<Arc<BoardViewModel>>, ApiError> {
    let query = if params.search.is_none() && params.sort.is_none() {
        None
    } else {
        let current = state.service.current_query();
        let sort = match params.sort.as_deref() {
            None => current.sort,
            Some(value) => SortMode::from_query(value).ok_or_else(|| {
                error_response(
                    StatusCode::BAD_REQUEST,
                    "taskboard.api.board",
                    format!("Unknown sort mode: {}", value),
                )
            })?,
        };
        Some(BoardQuery {
            search: params.search.unwrap_or(current.search),
            sort,
        })
    };
    state
        .service
        .refresh(query)
        .map(Json)
        .map_err(|e| service_error("taskboard.api.board", e))
}

pub async fn current_board(
    State(state): State<AppState>,
) -> Result<Json<Arc<BoardViewModel>>, ApiError> {
    match state.service.state().current() {
        Some(model) => Ok(Json(model)),
        None => state
            .service
            .refresh(None)
            .map(Json)
            .map_err(|e| service_error("taskboard.api.board", e)),
    }
}

pub async fn create_lane(
    State(state): State<AppState>,
    Json(body): Json<CreateLaneBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .create_lane(body.name.as_deref())
        .map(outcome_json)
        .map_err(|e| service_error("taskboard.api.lane", e))
}

pub async fn rename_lane(
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(body): Json<RenameBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .rename_lane(&lane, &body.name)
        .map(outcome_json)
        .map_err(|e| service_error("taskboard.api.lane", e))
}

pub async fn delete_lane(
    State(state): State<AppState>,
    Path(lane): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .delete_lane(&lane)
        .map(outcome_json)
        .map_err(|e| service_error("taskboard.api.lane", e))
}

pub async fn create_card(
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(body): Json<CreateCardBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .create_card(&lane, body.name.as_deref(), body.content.as_deref())
        .map(outcome_json)
        .map_err(|e| service_error("taskboard.api.card", e))
}

pub async fn update_card(
    State(state): State<AppState>,
    Json(body): Json<UpdateCardBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .update_card(&body.path, &body.content)
        .map(outcome_json)
        .map_err(|e| service_error("taskboard.api.card", e))
}

pub async fn rename_card(
    State(state): State<AppState>,
    Json(body): Json<RenameCardBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .rename_card(&body.path, &body.name)
        .map(outcome_json)
        .map_err(|e| service_error("taskboard.api.card", e))
}

pub async fn move_card(
    State(state): State<AppState>,
    Json(body): Json<MoveCardBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .move_card(&body.path, &body.lane, body.position)
        .map(outcome_json)
        .map_err(|e| service_error("taskboard.api.card", e))
}

pub async fn delete_card(
    State(state): State<AppState>,
    Query(params): Query<CardPathParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .delete_card(&params.path)
        .map(outcome_json)
        .map_err(|e| service_error("taskboard.api.card", e))
}
