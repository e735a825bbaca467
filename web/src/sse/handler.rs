use crate::params::sse::SubscribeParams;
use crate::AppState;
use async_stream::stream;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use log::*;
use std::convert::Infallible;

/// GET a long-lived stream of real-time events
#[utoipa::path(
    get,
    path = "/events",
    params(SubscribeParams),
    responses(
        (status = 200, description = "Stream of serialized events, one per SSE data frame", content_type = "text/event-stream", body = String),
    )
)]
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
    Query(params): Query<SubscribeParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let scope = params.scope;
    debug!("Establishing SSE connection for scope '{scope}'");

    let (mut rx, subscription) = app_state.broker.subscribe(scope.clone());

    // The stream owns the subscription: when the client disconnects axum drops
    // the stream and the client is unregistered.
    let stream = stream! {
        let _subscription = subscription;

        while let Some(message) = rx.recv().await {
            yield Ok::<Event, Infallible>(Event::default().data(message.as_ref()));
        }

        debug!("Event queue for scope '{scope}' closed, ending SSE stream");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
