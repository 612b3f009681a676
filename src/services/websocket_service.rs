use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{broadcast::{self, error::RecvError}, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    battle::coordinator::{RoomHandle, RoomUpdate},
    dto::{
        battle::{AnswerAccepted, BattleResultSummary, RoomSnapshot},
        ws::{ParticipantInbound, ParticipantOutbound},
    },
    error::ServiceError,
    state::SharedState,
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures while serving one participant message.
#[derive(Debug, Error)]
enum SessionError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// The room refused the action.
    #[error("action rejected: {0}")]
    Rejected(#[from] ServiceError),
}

/// What the read loop does after a message.
enum Flow {
    Continue,
    Left,
}

/// Handle the full lifecycle of a participant WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let identification = serde_json::from_str::<ParticipantInbound>(&initial_message)
        .ok()
        .and_then(|message| message.identification());
    let Some((room_id, user_id)) = identification else {
        warn!("first message was not identification");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let Some((handle, updates)) =
        identify(&state, room_id, user_id, &outbound_tx).await
    else {
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };
    info!(room_id = %room_id, user_id = %user_id, "participant connected");

    let mut forwarder = tokio::spawn(forward_updates(updates, outbound_tx.clone()));
    let mut room_closed = false;
    let mut left = false;

    loop {
        tokio::select! {
            _ = &mut forwarder => {
                room_closed = true;
                break;
            }
            message = receiver.next() => {
                let Some(message) = message else { break };
                match message {
                    Ok(Message::Text(text)) => {
                        debug!(room_id = %room_id, user_id = %user_id, payload = %text, "received participant message");
                        match handle_text(&handle, user_id, &text, &outbound_tx).await {
                            Ok(Flow::Continue) => {}
                            Ok(Flow::Left) => {
                                left = true;
                                let _ = outbound_tx.send(Message::Close(None));
                                break;
                            }
                            Err(SessionError::ConnectionClosed) => {
                                info!(user_id = %user_id, "connection closed while replying, terminating");
                                break;
                            }
                            Err(SessionError::Rejected(err)) => {
                                warn!(user_id = %user_id, error = %err, "participant action failed");
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = outbound_tx.send(Message::Pong(payload));
                    }
                    Ok(Message::Close(frame)) => {
                        info!(user_id = %user_id, "participant closed");
                        let _ = outbound_tx.send(Message::Close(frame));
                        break;
                    }
                    Ok(Message::Binary(_)) => {}
                    Ok(Message::Pong(_)) => {}
                    Err(err) => {
                        warn!(user_id = %user_id, error = %err, "websocket error");
                        break;
                    }
                }
            }
        }
    }

    if !room_closed {
        forwarder.abort();
    }
    if !room_closed && !left {
        match handle.disconnect(user_id).await {
            Ok(_) | Err(ServiceError::RoomClosed) | Err(ServiceError::NotParticipant) => {}
            Err(err) => {
                warn!(room_id = %room_id, user_id = %user_id, error = %err, "failed to record disconnect");
            }
        }
    }
    info!(room_id = %room_id, user_id = %user_id, "participant disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Attach the connection to its room and push the current snapshot.
async fn identify(
    state: &SharedState,
    room_id: Uuid,
    user_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
) -> Option<(RoomHandle, broadcast::Receiver<RoomUpdate>)> {
    let Some(handle) = state.room(room_id) else {
        let _ = send_message_to_websocket(
            tx,
            &rejection("identification", &ServiceError::RoomNotFound),
        );
        return None;
    };

    // subscribe first so no update is missed between the snapshot and the stream
    let updates = handle.subscribe();
    match handle.connect(user_id).await {
        Ok(view) => {
            send_message_to_websocket(tx, &ParticipantOutbound::Identified { room_id, user_id })
                .ok()?;
            send_message_to_websocket(
                tx,
                &ParticipantOutbound::Snapshot {
                    snapshot: RoomSnapshot::from(&view),
                },
            )
            .ok()?;
            Some((handle, updates))
        }
        Err(err) => {
            warn!(room_id = %room_id, user_id = %user_id, error = %err, "identification rejected");
            let _ = send_message_to_websocket(tx, &rejection("identification", &err));
            None
        }
    }
}

async fn handle_text(
    handle: &RoomHandle,
    user_id: Uuid,
    text: &str,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<Flow, SessionError> {
    let message = match serde_json::from_str::<ParticipantInbound>(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(user_id = %user_id, error = %err, "failed to parse participant message");
            let err = ServiceError::InvalidInput(err.to_string());
            send_message_to_websocket(tx, &rejection("parse", &err))?;
            return Ok(Flow::Continue);
        }
    };

    let (action, result) = match message {
        ParticipantInbound::Ready => ("ready", handle.set_ready(user_id).await.map(|_| Flow::Continue)),
        ParticipantInbound::Answer {
            question_index,
            chosen_option,
            time_taken,
        } => {
            let result = handle
                .submit_answer(user_id, question_index, chosen_option, time_taken)
                .await;
            match result {
                Ok(outcome) => {
                    send_message_to_websocket(
                        tx,
                        &ParticipantOutbound::AnswerAccepted {
                            answer: AnswerAccepted::from(&outcome),
                        },
                    )?;
                    ("answer", Ok(Flow::Continue))
                }
                Err(err) => ("answer", Err(err)),
            }
        }
        ParticipantInbound::Leave => ("leave", handle.leave(user_id).await.map(|_| Flow::Left)),
        ParticipantInbound::Identification { .. } => {
            warn!(user_id = %user_id, "ignoring duplicate identification message");
            return Ok(Flow::Continue);
        }
        ParticipantInbound::Unknown => {
            warn!(user_id = %user_id, "ignoring unknown participant message");
            return Ok(Flow::Continue);
        }
    };

    match result {
        Ok(flow) => Ok(flow),
        Err(err) => {
            send_message_to_websocket(tx, &rejection(action, &err))?;
            Err(err.into())
        }
    }
}

/// Push room updates to the socket until the room closes.
async fn forward_updates(
    mut updates: broadcast::Receiver<RoomUpdate>,
    tx: mpsc::UnboundedSender<Message>,
) {
    loop {
        let update = match updates.recv().await {
            Ok(update) => update,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "participant socket lagging behind room updates");
                continue;
            }
            Err(RecvError::Closed) => return,
        };

        let (message, last) = match update {
            RoomUpdate::Snapshot(view) => (
                ParticipantOutbound::Snapshot {
                    snapshot: RoomSnapshot::from(&view),
                },
                false,
            ),
            RoomUpdate::Completed { view, results } => (
                ParticipantOutbound::Completed {
                    snapshot: RoomSnapshot::from(&view),
                    results: results.iter().map(BattleResultSummary::from).collect(),
                },
                false,
            ),
            RoomUpdate::Closed { reason } => (
                ParticipantOutbound::Closed {
                    reason: reason.as_str().to_owned(),
                },
                true,
            ),
        };

        if send_message_to_websocket(&tx, &message).is_err() {
            return;
        }
        if last {
            let _ = tx.send(Message::Close(None));
            return;
        }
    }
}

fn rejection(action: &str, err: &ServiceError) -> ParticipantOutbound {
    ParticipantOutbound::Rejected {
        action: action.to_owned(),
        code: err.reason_code().to_owned(),
        message: err.to_string(),
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; only a closed writer is an error.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), SessionError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| SessionError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
