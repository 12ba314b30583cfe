//! Live expense updates over Server-Sent Events

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{AppState, AuthUser};

/// GET /api/events - Stream the caller's expense events
///
/// Each event is the JSON of an `ExpenseEvent`. A subscriber that falls
/// behind gets a `refresh` event and should re-fetch everything.
pub async fn events(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.notifier.subscribe(user_id);
    debug!(user_id, "Event stream opened");

    let stream = stream::unfold(rx, move |mut rx| async move {
        match rx.recv().await {
            Ok(event) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                Some((Ok(Event::default().event("expense").data(json)), rx))
            }
            Err(broadcast::error::RecvError::Lagged(count)) => {
                warn!(user_id, "Event subscriber lagged by {} messages", count);
                Some((Ok(Event::default().event("refresh").data("{}")), rx))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
