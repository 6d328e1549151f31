//! WebSocket endpoint.
//!
//! Each connection is split into a reader, a writer and the session actor.
//! The reader forwards text frames to the actor, the actor pushes replies and
//! notifications to the writer, and the connection ends when either the
//! client goes away or the actor stops.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use livesub_core::proto::{ProtocolError, ServerMessage};
use livesub_core::{MailboxReceiver, Session, SessionIo};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Credential for clients that cannot set headers.
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// The session is created before the upgrade so that bad credentials and a
/// full server are reported as plain HTTP errors.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
) -> Result<Response> {
    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or(params.token);

    let identity = state.auth.authenticate(credential.as_deref())?;
    let (session, mailbox) = state.broker.sessions().connect(identity)?;
    let capacity = state.config.broker.outbound_capacity;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session, mailbox, capacity)))
}

async fn handle_socket(
    socket: WebSocket,
    session: Session,
    mailbox: MailboxReceiver,
    capacity: usize,
) {
    let id = session.id();
    info!(session = id, subject = ?session.identity().subject(), "websocket connected");

    let (mut sink, mut stream) = socket.split();
    let (commands_tx, commands_rx) = mpsc::channel::<String>(capacity);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(capacity);
    let replies = outbound_tx.clone();

    let actor = tokio::spawn(session.run(
        SessionIo {
            commands: commands_rx,
            outbound: outbound_tx,
        },
        mailbox,
    ));

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(session = id, error = %e, "failed to encode server message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            _ = commands_tx.closed() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if commands_tx.send(text).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    let err = ProtocolError::invalid_json("binary frames are not supported");
                    if replies.send(err.into()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!(session = id, error = %e, "websocket error");
                    break;
                }
            },
        }
    }

    drop(commands_tx);
    drop(replies);
    let _ = actor.await;
    let _ = writer.await;

    info!(session = id, "websocket disconnected");
}
