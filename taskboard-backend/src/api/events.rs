use axum::{
    extract::State,
    response::{sse::Event, Json, Sse},
};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream, WatchStream};
use tokio_stream::StreamExt;

use crate::state::AppState;

fn json_event<T: Serialize>(name: &str, payload: &T) -> Option<Result<Event, Infallible>> {
    match serde_json::to_string(payload) {
        Ok(json) => Some(Ok(Event::default().event(name).data(json))),
        Err(e) => {
            log::warn!(target: "taskboard.api.events", "Failed to encode {} event: {}", name, e);
            None
        }
    }
}

/// SSE endpoint. Streams three kinds of events:
///   `change`  - a lane or card changed on disk
///   `notice`  - outcome of a user action
///   `refresh` - a new board model was published (`{"generation": n}`)
pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let changes = BroadcastStream::new(state.event_tx.subscribe())
        .filter_map(|result| result.ok().and_then(|event| json_event("change", &event)));

    let notices = BroadcastStream::new(state.service.subscribe_notices())
        .filter_map(|result| result.ok().and_then(|notice| json_event("notice", &notice)));

    let refreshes = WatchStream::new(state.service.state().subscribe()).filter_map(|model| {
        model.and_then(|m| json_event("refresh", &serde_json::json!({ "generation": m.generation })))
    });

    // Keep-alive every 30 seconds
    let keep_alive = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok(Event::default().comment("keep-alive")));

    Sse::new(changes.merge(notices).merge(refreshes).merge(keep_alive))
}

pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "port": state.port,
        "bind_address": state.bind_address,
        "boardRoot": state.service.board_root(),
        "generation": state.service.state().published_generation(),
    }))
}

pub async fn list_logs() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "entries": crate::log_bridge::recent_entries(),
        "filePath": crate::log_bridge::log_file_path(),
    }))
}
