use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    battle::coordinator::RoomUpdate,
    dto::{
        battle::{BattleResultSummary, RoomSnapshot},
        sse::{ClosedEvent, CompletedEvent, Handshake, ServerEvent},
    },
    error::ServiceError,
    state::SharedState,
};

/// Subscribe to a live room. The handshake and current snapshot are sent first.
pub async fn subscribe_room(
    state: &SharedState,
    room_id: Uuid,
) -> Result<(Vec<ServerEvent>, broadcast::Receiver<RoomUpdate>), ServiceError> {
    let handle = state.room(room_id).ok_or(ServiceError::RoomNotFound)?;
    // subscribe before reading the snapshot so no update falls in between
    let receiver = handle.subscribe();
    let view = handle.snapshot().await?;

    let mut initial = Vec::with_capacity(2);
    initial.extend(event(
        "handshake",
        &Handshake {
            room_id,
            message: format!("subscribed to room {}", handle.room_code()),
            degraded: state.is_degraded(),
        },
    ));
    initial.extend(event("snapshot", &RoomSnapshot::from(&view)));
    Ok((initial, receiver))
}

/// SSE payload for a room update, and whether it is the last one of the stream.
pub fn room_event(update: &RoomUpdate) -> (Option<ServerEvent>, bool) {
    match update {
        RoomUpdate::Snapshot(view) => (event("snapshot", &RoomSnapshot::from(view)), false),
        RoomUpdate::Completed { view, results } => (
            event(
                "completed",
                &CompletedEvent {
                    snapshot: RoomSnapshot::from(view),
                    results: results.iter().map(BattleResultSummary::from).collect(),
                },
            ),
            false,
        ),
        RoomUpdate::Closed { reason } => (
            event(
                "closed",
                &ClosedEvent {
                    reason: reason.as_str().to_owned(),
                },
            ),
            true,
        ),
    }
}

fn event<T: serde::Serialize>(name: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(Some(name.to_owned()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = name, error = %err, "failed to serialize SSE payload");
            None
        }
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a room subscription into an SSE response. The stream ends after the
/// room's `closed` event or when the client disconnects.
pub fn to_sse_stream(
    room_id: Uuid,
    initial: Vec<ServerEvent>,
    mut receiver: broadcast::Receiver<RoomUpdate>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(update) => {
                            let (payload, last) = room_event(&update);
                            let delivered = match payload {
                                Some(payload) => tx.send(Ok(to_event(payload))).await.is_ok(),
                                None => true,
                            };
                            if !delivered {
                                break;
                            }
                            if last {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // Skip lagged messages but keep the stream alive.
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }

        info!(room_id = %room_id, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
