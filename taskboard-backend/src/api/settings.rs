use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use taskboard_core::config::PluginSettings;

use super::{service_error, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TagColorBody {
    color: String,
}

#[derive(Deserialize)]
pub struct LaneOrderBody {
    cards: Vec<String>,
}

pub async fn get_settings(State(state): State<AppState>) -> Json<PluginSettings> {
    Json(state.service.settings())
}

/// Replace the settings. Returns them as stored (normalized).
pub async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<PluginSettings>,
) -> Result<Json<PluginSettings>, ApiError> {
    state
        .service
        .update_settings(settings)
        .map(Json)
        .map_err(|e| service_error("taskboard.api.settings", e))
}

pub async fn set_tag_color(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Json(body): Json<TagColorBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .set_tag_color(&tag, &body.color)
        .map_err(|e| service_error("taskboard.api.tag_color", e))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn clear_tag_color(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state
        .service
        .clear_tag_color(&tag)
        .map_err(|e| service_error("taskboard.api.tag_color", e))?;
    Ok(Json(serde_json::json!({ "success": true, "removed": removed })))
}

pub async fn set_lane_order(
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(body): Json<LaneOrderBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .service
        .set_lane_order(&lane, body.cards)
        .map_err(|e| service_error("taskboard.api.sort_order", e))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn clear_lane_order(
    State(state): State<AppState>,
    Path(lane): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state
        .service
        .clear_lane_order(&lane)
        .map_err(|e| service_error("taskboard.api.sort_order", e))?;
    Ok(Json(serde_json::json!({ "success": true, "removed": removed })))
}
