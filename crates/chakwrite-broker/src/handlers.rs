use std::convert::Infallible;
use std::sync::atomic::Ordering;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::Stream;
use serde_json::{json, Value};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use chakwrite_broker::dispatcher::Dispatch;
use chakwrite_broker::metrics::BrokerMetrics;
use chakwrite_common::{CompletionResult, Message};

use crate::state::AppState;

pub async fn healthz(State(st): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "context": st.context.state().await,
        "pending": st.correlator.pending_count(),
    }))
}

/// One wire message from the page. The reply shape depends on the action:
/// a JSON body for requests, `202` for fire-and-forget, `204` when the
/// background does not handle the action. A body that is JSON but not a
/// valid message gets `400` with a failed result.
pub async fn post_message(State(st): State<AppState>, Json(raw): Json<Value>) -> Response {
    let message = match parse_message(raw) {
        Ok(message) => message,
        Err(reply) => return (StatusCode::BAD_REQUEST, Json(reply)).into_response(),
    };
    let action = message.action();
    tracing::debug!(action, "page message received");

    match st.dispatcher.handle(message).await {
        Dispatch::Completion(result) => (StatusCode::OK, Json(result)).into_response(),
        Dispatch::InitialState(state) => (StatusCode::OK, Json(state)).into_response(),
        Dispatch::Accepted => StatusCode::ACCEPTED.into_response(),
        Dispatch::NotHandled => StatusCode::NO_CONTENT.into_response(),
    }
}

fn parse_message(raw: Value) -> Result<Message, CompletionResult> {
    let action = raw
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    serde_json::from_value(raw).map_err(|e| {
        tracing::warn!(action=%action, error=%e, "malformed page message");
        CompletionResult::failure(format!("malformed {action} message: {e}"))
    })
}

pub async fn post_command(State(st): State<AppState>, Path(name): Path<String>) -> Response {
    match st.dispatcher.run_command(&name) {
        Ok(cmd) => (
            StatusCode::ACCEPTED,
            Json(json!({ "command": cmd.name(), "type": cmd.operation() })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "message": format!("unknown command '{name}'"), "detail": e.to_string() } })),
        )
            .into_response(),
    }
}

/// Page-bound messages as server-sent events, one event per message, named
/// after its action.
pub async fn page_events(
    State(st): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("page attached");
    let stream = BroadcastStream::new(st.page.subscribe()).filter_map(|item| match item {
        Ok(message) => match Event::default().event(message.action()).json_data(&message) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!(error=%e, "failed to encode page event");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error=%e, "page stream lagged");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.metrics.render())
}

pub async fn track_requests(
    State(st): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Infallible> {
    st.metrics.requests_inflight.fetch_add(1, Ordering::Relaxed);
    let resp = next.run(req).await;
    st.metrics.requests_inflight.fetch_sub(1, Ordering::Relaxed);
    BrokerMetrics::inc(&st.metrics.requests_total);
    Ok(resp)
}
