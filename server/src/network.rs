//! TCP acceptance, per-connection read loops and envelope dispatch.
//!
//! I/O and dispatch are kept apart: the read loop only splits lines off the
//! socket, and [`dispatch`] applies one decoded line to the world. Dispatch
//! is therefore testable with nothing but a registry and a channel.

use crate::combat::{attempt_attack, AttackOutcome};
use crate::error::SessionError;
use crate::physics;
use crate::registry::Registry;
use log::{debug, error, info, warn};
use shared::{decode, encode, Envelope, ProtocolError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};

/// Accepts connections and spawns one reader task per client.
pub struct Server {
    listener: TcpListener,
    registry: Arc<Mutex<Registry>>,
}

/// Per-connection dispatch state. Holds no socket: outbound traffic goes
/// through the channel drained by the connection's writer task.
pub struct Connection {
    pub addr: SocketAddr,
    pub player_id: Option<u32>,
    pub outbound: mpsc::UnboundedSender<String>,
}

impl Connection {
    pub fn new(addr: SocketAddr, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            addr,
            player_id: None,
            outbound,
        }
    }

    /// Queues one envelope for this connection. A closed channel means the
    /// writer is gone; the read loop will notice on its own.
    fn send(&self, envelope: &Envelope) {
        match encode(envelope) {
            Ok(line) => {
                let _ = self.outbound.send(line);
            }
            Err(e) => error!("failed to encode envelope for {}: {}", self.addr, e),
        }
    }
}

impl Server {
    pub async fn bind(addr: &str, registry: Arc<Mutex<Registry>>) -> Result<Self, SessionError> {
        let listener = TcpListener::bind(addr).await?;
        info!("server listening on {}", listener.local_addr()?);
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SessionError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Connections arriving while the registry is full are
    /// closed before a handler is ever spawned; the authoritative capacity
    /// check still happens inside `register`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("listener shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if self.registry.lock().await.is_full() {
                                warn!("rejecting {}: server full", addr);
                                continue;
                            }
                            info!("connection from {}", addr);
                            let registry = Arc::clone(&self.registry);
                            let shutdown = shutdown.clone();
                            tokio::spawn(handle_connection(stream, addr, registry, shutdown));
                        }
                        Err(e) => error!("accept failed: {}", e),
                    }
                }
            }
        }
    }
}

/// Reads newline-framed envelopes from one client until end-of-stream, a
/// read error or shutdown, then tears the session down. Nothing here can
/// affect another connection or the tick loop.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<Mutex<Registry>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    // Writer task: the only place this socket is written. Queuing per
    // connection keeps a slow client from stalling anyone else.
    let writer = tokio::spawn(async move {
        while let Some(line) = outbound_rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut connection = Connection::new(addr, outbound_tx);
    let mut lines = BufReader::new(read_half).lines();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Err(e) = dispatch(&registry, &mut connection, &line).await {
                            warn!("closing {}: {}", addr, e);
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("{} reached end of stream", addr);
                        break;
                    }
                    Err(e) => {
                        debug!("read error from {}: {}", addr, e);
                        break;
                    }
                }
            }
        }
    }

    if let Some(id) = connection.player_id {
        let mut registry = registry.lock().await;
        if registry.unregister(id).is_some() {
            registry.broadcast(&Envelope::PlayerLeft { player_id: id }, None);
        }
    }
    writer.abort();
}

/// Decodes one line and applies it to the world.
///
/// Protocol errors are logged and skipped (the connection keeps reading);
/// messages referencing a departed player are silent no-ops; anything sent
/// before `connect` is ignored. Only capacity rejection at connect time is
/// fatal for the connection.
pub async fn dispatch(
    registry: &Arc<Mutex<Registry>>,
    connection: &mut Connection,
    line: &str,
) -> Result<(), SessionError> {
    let envelope = match decode(line) {
        Ok(envelope) => envelope,
        Err(ProtocolError::Empty) => return Ok(()),
        Err(e) => {
            warn!("dropping bad line from {}: {}", connection.addr, e);
            return Ok(());
        }
    };

    match envelope {
        Envelope::Connect { name } => handle_connect(registry, connection, name).await,

        Envelope::PlayerInput {
            action, direction, ..
        } => {
            let Some(id) = connection.player_id else {
                debug!("ignoring pre-connect message from {}", connection.addr);
                return Ok(());
            };
            let mut registry = registry.lock().await;
            // Absence is a normal race with disconnect.
            if let Some(player) = registry.find_mut(id) {
                physics::apply_input(player, action, direction);
            }
            Ok(())
        }

        Envelope::Attack { direction, .. } => {
            let Some(id) = connection.player_id else {
                debug!("ignoring pre-connect message from {}", connection.addr);
                return Ok(());
            };
            let mut registry = registry.lock().await;
            match attempt_attack(&mut registry, id, direction, Instant::now()) {
                Some(AttackOutcome::Rejected { remaining }) => {
                    debug!("player {} attack on cooldown ({:?} left)", id, remaining);
                }
                Some(AttackOutcome::Resolved { hits }) if !hits.is_empty() => {
                    debug!("player {} hit {:?}", id, hits);
                }
                _ => {}
            }
            Ok(())
        }

        Envelope::ChatMessage { text, .. } => {
            let Some(id) = connection.player_id else {
                debug!("ignoring pre-connect message from {}", connection.addr);
                return Ok(());
            };
            let mut registry = registry.lock().await;
            let name = registry.find(id).map(|player| player.name.clone());
            if let Some(name) = name {
                if !text.is_empty() {
                    registry.chat.append(format!("{}: {}", name, text), false);
                }
            }
            Ok(())
        }

        Envelope::RequestState { .. } => {
            let Some(_id) = connection.player_id else {
                debug!("ignoring pre-connect message from {}", connection.addr);
                return Ok(());
            };
            let registry = registry.lock().await;
            connection.send(&registry.snapshot());
            Ok(())
        }

        // Server-to-client kinds have no business arriving inbound.
        Envelope::PlayerJoined { .. } | Envelope::PlayerLeft { .. } | Envelope::GameState { .. } => {
            warn!(
                "unexpected server-bound message kind from {}",
                connection.addr
            );
            Ok(())
        }
    }
}

/// Admits a new session: registers under the lock (capacity check and insert
/// are one atomic step), acks the newcomer with its assigned id, announces
/// the join to everyone else and hands the newcomer its first snapshot.
async fn handle_connect(
    registry: &Arc<Mutex<Registry>>,
    connection: &mut Connection,
    name: String,
) -> Result<(), SessionError> {
    if connection.player_id.is_some() {
        warn!("{} sent connect twice", connection.addr);
        return Ok(());
    }

    let mut registry = registry.lock().await;
    let id = registry.register(name.clone(), connection.outbound.clone())?;
    connection.player_id = Some(id);

    connection.send(&Envelope::PlayerJoined {
        player_id: id,
        name: name.clone(),
    });
    registry.broadcast(&Envelope::PlayerJoined { player_id: id, name }, Some(id));
    connection.send(&registry.snapshot());

    Ok(())
}
