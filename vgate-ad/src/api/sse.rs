//! Server-Sent Events for gate activity

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events - decisions, overrides, purges and policy changes as they
/// happen
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    vgate_common::sse::create_gate_event_stream(&state.event_bus, "vgate-ad")
}
