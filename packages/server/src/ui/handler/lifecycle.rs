//! Connection lifecycle: `Connecting` -> `Authenticating` -> `Active` -> `Closed`.
//!
//! Every exit path goes through [`TeardownGuard`], which marks the connection
//! record disconnected, leaves the room, and unregisters the connection.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use serde::Serialize;
use thiserror::Error;
use tokio::{runtime::Handle, sync::mpsc};

use super::{
    handshake::{HandshakeError, parse_handshake},
    router::{INVALID_JSON_MESSAGE, route_frame},
};
use crate::{
    domain::{ConnectionId, ConnectionRecordId, Member, PusherChannel, RoomId},
    infrastructure::dto::websocket::{
        ConnectionMessage, ErrorMessage, RoomAssignedMessage, encode,
    },
    ui::state::AppState,
    usecase::{ActiveConnection, Assignment, DisconnectDeviceUseCase, Teardown},
};

/// Why a lifecycle ended abnormally.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("handshake rejected: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("room {0} does not exist")]
    RoomNotFound(String),
    #[error("peer closed before the handshake")]
    ClosedDuringHandshake,
}

/// Outbound channel of an Active connection. Relayed frames and replies both
/// go through it, so only the pusher task writes to the socket.
struct Outbound {
    tx: PusherChannel,
    rx: mpsc::UnboundedReceiver<String>,
}

enum Phase {
    Connecting,
    Authenticating,
    Active(ActiveConnection, Outbound),
    Closed(Result<(), LifecycleError>),
}

enum Inbound {
    Text(String),
    /// A data frame that cannot be JSON text
    Malformed,
    Skip,
    Closed,
}

/// Unwinds a connection, even if the lifecycle task never reaches `release`.
struct TeardownGuard {
    usecase: Arc<DisconnectDeviceUseCase>,
    pending: Option<Teardown>,
}

impl TeardownGuard {
    fn new(usecase: Arc<DisconnectDeviceUseCase>, connection_id: ConnectionId) -> Self {
        Self {
            usecase,
            pending: Some(Teardown::new(connection_id)),
        }
    }

    fn bind(&mut self, room_id: RoomId, record_id: Option<ConnectionRecordId>) {
        if let Some(teardown) = self.pending.as_mut() {
            teardown.room_id = Some(room_id);
            teardown.record_id = record_id;
        }
    }

    async fn release(mut self) {
        if let Some(teardown) = self.pending.clone() {
            // Disarmed only once the teardown finished; an interrupted run is
            // repeated from `drop`, which is safe since teardown is idempotent.
            self.usecase.execute(&teardown).await;
            self.pending = None;
        }
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        let Some(teardown) = self.pending.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(
                    "Connection {} unwound without teardown, scheduling it",
                    teardown.connection_id
                );
                let usecase = self.usecase.clone();
                handle.spawn(async move { usecase.execute(&teardown).await });
            }
            Err(_) => tracing::error!(
                "Connection {} dropped outside the runtime, teardown skipped",
                teardown.connection_id
            ),
        }
    }
}

/// Spawns a task that drains the outbound channel into the WebSocket sink.
///
/// Ends when the channel closes or a write fails.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn next_inbound(stream: &mut SplitStream<WebSocket>, connection_id: ConnectionId) -> Inbound {
    match stream.next().await {
        Some(Ok(Message::Text(text))) => Inbound::Text(text.as_str().to_owned()),
        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Inbound::Text(text),
            Err(_) => {
                tracing::warn!("Connection {} sent a non UTF-8 binary frame", connection_id);
                Inbound::Malformed
            }
        },
        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => Inbound::Skip,
        Some(Ok(Message::Close(_))) | None => Inbound::Closed,
        Some(Err(e)) => {
            tracing::warn!("WebSocket error on connection {}: {}", connection_id, e);
            Inbound::Closed
        }
    }
}

/// One connection's state machine and its transport halves.
struct Lifecycle {
    state: Arc<AppState>,
    connection_id: ConnectionId,
    client_address: String,
    sink: SplitSink<WebSocket, Message>,
    stream: SplitStream<WebSocket>,
}

/// Drive one upgraded WebSocket from greeting to teardown.
pub async fn run(socket: WebSocket, state: Arc<AppState>, client_address: String) {
    let connection_id = state.connect_device_usecase.accept(&client_address).await;
    let mut guard = TeardownGuard::new(state.disconnect_device_usecase.clone(), connection_id);

    let (sink, stream) = socket.split();
    let lifecycle = Lifecycle {
        state,
        connection_id,
        client_address,
        sink,
        stream,
    };

    match lifecycle.drive(&mut guard).await {
        Ok(()) => tracing::info!("Connection {} closed by peer", connection_id),
        Err(e) => tracing::warn!("Connection {} closed: {}", connection_id, e),
    }

    guard.release().await;
}

impl Lifecycle {
    async fn drive(mut self, guard: &mut TeardownGuard) -> Result<(), LifecycleError> {
        let mut phase = Phase::Connecting;
        loop {
            phase = match phase {
                Phase::Connecting => self.greet().await,
                Phase::Authenticating => self.authenticate(guard).await,
                Phase::Active(origin, outbound) => return self.serve(origin, outbound).await,
                Phase::Closed(outcome) => return outcome,
            };
        }
    }

    async fn greet(&mut self) -> Phase {
        match self.send(&ConnectionMessage::connected()).await {
            Ok(()) => Phase::Authenticating,
            Err(e) => Phase::Closed(Err(e)),
        }
    }

    async fn authenticate(&mut self, guard: &mut TeardownGuard) -> Phase {
        let text = loop {
            match next_inbound(&mut self.stream, self.connection_id).await {
                Inbound::Text(text) => break text,
                Inbound::Malformed => {
                    let e = HandshakeError::InvalidJson;
                    return self.reject(e.to_string(), e.into()).await;
                }
                Inbound::Skip => continue,
                Inbound::Closed => {
                    return Phase::Closed(Err(LifecycleError::ClosedDuringHandshake));
                }
            }
        };

        let handshake = match parse_handshake(&text) {
            Ok(handshake) => handshake,
            Err(e) => return self.reject(e.to_string(), e.into()).await,
        };

        let assignment = self
            .state
            .assign_room_usecase
            .execute(
                &handshake.device_id,
                &handshake.identity,
                handshake.room_id.as_deref(),
            )
            .await;
        let placement = match assignment {
            Assignment::Placed(placement) => placement,
            Assignment::RoomNotFound { requested } => {
                let message = format!("Room {} does not exist", requested);
                return self
                    .reject(message, LifecycleError::RoomNotFound(requested))
                    .await;
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let member = Member::new(
            self.connection_id,
            handshake.device_id.clone(),
            handshake.identity,
            tx.clone(),
        );
        let connect = &self.state.connect_device_usecase;
        let record_id = connect
            .record(&member, &placement.room_id, &self.client_address)
            .await;
        // Armed with the room before joining so an unwind from here on leaves it.
        guard.bind(placement.room_id.clone(), record_id);
        connect.join(member, &placement.room_id).await;

        // Peers can already queue frames on the channel; they are written
        // only after this ack because the pusher starts in `serve`.
        let ack = RoomAssignedMessage::new(placement.room_id.as_str(), placement.status);
        if let Err(e) = self.send(&ack).await {
            return Phase::Closed(Err(e));
        }

        Phase::Active(
            ActiveConnection {
                connection_id: self.connection_id,
                device_id: handshake.device_id,
                room_id: placement.room_id,
            },
            Outbound { tx, rx },
        )
    }

    async fn serve(
        self,
        origin: ActiveConnection,
        outbound: Outbound,
    ) -> Result<(), LifecycleError> {
        let Lifecycle {
            state,
            connection_id,
            sink,
            mut stream,
            ..
        } = self;
        tracing::info!(
            "Connection {} active in room {} as device {}",
            connection_id,
            origin.room_id,
            origin.device_id
        );

        let mut push_task = pusher_loop(outbound.rx, sink);
        let replies = outbound.tx;

        let receive = async {
            loop {
                match next_inbound(&mut stream, connection_id).await {
                    Inbound::Text(text) => {
                        tracing::debug!("Connection {} received: {}", connection_id, text);
                        if let Some(reply) = route_frame(&state, &origin, &text).await?
                            && replies.send(reply).is_err()
                        {
                            break;
                        }
                    }
                    Inbound::Malformed => {
                        let reply = encode(&ErrorMessage::new(INVALID_JSON_MESSAGE))?;
                        if replies.send(reply).is_err() {
                            break;
                        }
                    }
                    Inbound::Skip => continue,
                    Inbound::Closed => break,
                }
            }
            Ok::<(), LifecycleError>(())
        };

        let outcome = tokio::select! {
            outcome = receive => outcome,
            _ = &mut push_task => {
                tracing::debug!("Outbound side of connection {} stopped", connection_id);
                Ok(())
            }
        };
        push_task.abort();
        outcome
    }

    async fn send<T: Serialize>(&mut self, frame: &T) -> Result<(), LifecycleError> {
        let text = encode(frame)?;
        self.sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Report a fatal handshake problem to the client and close.
    async fn reject(&mut self, message: String, reason: LifecycleError) -> Phase {
        tracing::warn!("Rejecting connection {}: {}", self.connection_id, message);
        if let Err(e) = self.send(&ErrorMessage::new(message)).await {
            tracing::debug!("Could not deliver rejection to {}: {}", self.connection_id, e);
        }
        let _ = self.sink.send(Message::Close(None)).await;
        Phase::Closed(Err(reason))
    }
}
