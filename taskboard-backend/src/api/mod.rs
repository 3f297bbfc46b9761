use axum::{
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use taskboard_core::service::ServiceError;
use taskboard_core::storage::MutationOutcome;

mod board;
mod events;
mod settings;

use crate::state::AppState;

/// Axum REST API routes.
///
///   GET    /board?search=&sort=        -> refresh and return the view model
///   GET    /board/current              -> last published view model
///   POST   /lanes                      -> create lane
///   PUT    /lanes/{lane}               -> rename lane
///   DELETE /lanes/{lane}               -> delete lane and its cards
///   POST   /lanes/{lane}/cards         -> create card
///   PUT    /cards                      -> replace card content
///   DELETE /cards?path=...             -> delete card
///   POST   /cards/rename               -> rename card
///   POST   /cards/move                 -> move card to another lane
///   GET    /settings, PUT /settings    -> plugin settings
///   PUT    /tag-colors/{tag}           -> colour override for the current board
///   DELETE /tag-colors/{tag}           -> drop the override
///   PUT    /sort-order/{lane}          -> manual card order of a lane
///   DELETE /sort-order/{lane}          -> drop the manual order
///   GET    /events                     -> SSE stream of changes, notices, refreshes
///   GET    /status                     -> health check
///   GET    /logs                       -> recent backend log entries
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/board", get(board::get_board))
        .route("/board/current", get(board::current_board))
        .route("/lanes", post(board::create_lane))
        .route(
            "/lanes/{lane}",
            put(board::rename_lane).delete(board::delete_lane),
        )
        .route("/lanes/{lane}/cards", post(board::create_card))
        .route("/cards", put(board::update_card).delete(board::delete_card))
        .route("/cards/rename", post(board::rename_card))
        .route("/cards/move", post(board::move_card))
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route(
            "/tag-colors/{tag}",
            put(settings::set_tag_color).delete(settings::clear_tag_color),
        )
        .route(
            "/sort-order/{lane}",
            put(settings::set_lane_order).delete(settings::clear_lane_order),
        )
        .route("/events", get(events::sse_events))
        .route("/status", get(events::status))
        .route("/logs", get(events::list_logs))
}

// ── Shared types and helpers used across sub-modules ────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Mutation result as the board view expects it.
fn outcome_json(outcome: MutationOutcome) -> Json<serde_json::Value> {
    match outcome {
        MutationOutcome::Applied { path } => Json(serde_json::json!({
            "applied": true,
            "path": path,
        })),
        MutationOutcome::NoEffect { reason } => Json(serde_json::json!({
            "applied": false,
            "reason": reason,
        })),
    }
}

fn error_response(status: StatusCode, target: &'static str, error: String) -> ApiError {
    log_api_issue(status, target, &error);
    (status, Json(ErrorResponse { error }))
}

fn service_error(target: &'static str, e: ServiceError) -> ApiError {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, target, e.to_string())
}

fn log_api_issue(status: StatusCode, target: &'static str, message: impl AsRef<str>) {
    let message = message.as_ref();
    if status.is_server_error() {
        log::error!(target: target, "{}", message);
    } else {
        log::warn!(target: target, "{}", message);
    }
}
