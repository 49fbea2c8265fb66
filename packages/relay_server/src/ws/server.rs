//! A multi-room signaling relay server.
//!
//! [`RelayServer`] is the single owner of the room registry and the connection
//! table. Sockets talk to it through a cloneable [`RelayServerHandle`], and every
//! command is processed to completion before the next one is taken, so joins,
//! leaves and disconnects on the same room never interleave.

use std::{
    collections::{BTreeMap, BTreeSet},
    io,
};

use relay::{
    RelayMessageError, RelaySendError, RelayTransport, membership,
    models::{ConnectionId, OutboundPayload, RoomName},
    registry::RoomRegistry,
};
use serde::Serialize;
use strum_macros::AsRefStr;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::ws::Msg;

/// A command received by the [`RelayServer`].
#[derive(Debug, AsRefStr)]
pub enum Command {
    /// Registers a new socket.
    Connect {
        /// Channel for messages to this connection.
        conn_tx: mpsc::UnboundedSender<Msg>,
        /// Channel to send back the assigned connection ID.
        res_tx: oneshot::Sender<ConnectionId>,
    },

    /// Tears a connection down and leaves every room it was in.
    Disconnect { conn: ConnectionId },

    /// Text frame received from a connection.
    Message { conn: ConnectionId, msg: Msg },

    Stats { res_tx: oneshot::Sender<RelayStats> },

    #[cfg(test)]
    RoomMembers {
        room: RoomName,
        res_tx: oneshot::Sender<BTreeSet<ConnectionId>>,
    },
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    pub connections: usize,
    pub rooms: usize,
    /// Connections accepted since startup.
    pub visitors: usize,
}

/// Socket-level half of the relay: live connections and their room groups.
#[derive(Debug, Default)]
pub struct WsTransport {
    connections: BTreeMap<ConnectionId, mpsc::UnboundedSender<Msg>>,
    groups: BTreeMap<RoomName, BTreeSet<ConnectionId>>,
}

impl WsTransport {
    /// Registers a socket under a freshly generated, unused connection ID.
    fn connect(&mut self, sender: mpsc::UnboundedSender<Msg>) -> ConnectionId {
        let id = loop {
            let id = ConnectionId::from(nanoid::nanoid!());
            if !self.connections.contains_key(&id) {
                break id;
            }
        };

        self.connections.insert(id.clone(), sender);

        id
    }

    /// Drops the socket and every room group it was part of.
    fn disconnect(&mut self, conn: &ConnectionId) {
        self.connections.remove(conn);
        self.groups.retain(|_, members| {
            members.remove(conn);
            !members.is_empty()
        });
    }

    fn is_connected(&self, conn: &ConnectionId) -> bool {
        self.connections.contains_key(conn)
    }

    fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn deliver(&self, conn: &ConnectionId, msg: &str) {
        if let Some(sender) = self.connections.get(conn) {
            // errors if client disconnected abruptly and hasn't been timed-out yet
            if sender.send(msg.to_owned()).is_err() {
                log::trace!("deliver: connection {conn} is closing, dropping message");
            }
        } else {
            log::debug!("deliver: no connection {conn}, dropping message");
        }
    }
}

impl RelayTransport for WsTransport {
    fn join(&mut self, conn: &ConnectionId, room: &str) {
        self.groups
            .entry(room.to_owned())
            .or_default()
            .insert(conn.clone());
    }

    fn leave(&mut self, conn: &ConnectionId, room: &str) {
        if let Some(members) = self.groups.get_mut(room) {
            members.remove(conn);
            if members.is_empty() {
                self.groups.remove(room);
            }
        }
    }

    fn rooms_of(&self, conn: &ConnectionId) -> Vec<RoomName> {
        self.groups
            .iter()
            .filter(|(_, members)| members.contains(conn))
            .map(|(room, _)| room.clone())
            .collect()
    }

    fn send(&self, conn: &ConnectionId, payload: &OutboundPayload) -> Result<(), RelaySendError> {
        let msg = serde_json::to_string(payload)?;
        log::trace!("send: {payload} to {conn}");
        self.deliver(conn, &msg);
        Ok(())
    }

    fn send_to_room_except(
        &self,
        room: &str,
        except: &ConnectionId,
        payload: &OutboundPayload,
    ) -> Result<(), RelaySendError> {
        let Some(members) = self.groups.get(room) else {
            log::debug!("send_to_room_except: no room '{room}', dropping {payload}");
            return Ok(());
        };

        let msg = serde_json::to_string(payload)?;
        log::trace!("send_to_room_except: {payload} to room '{room}' except {except}");

        for conn in members.iter().filter(|x| *x != except) {
            self.deliver(conn, &msg);
        }

        Ok(())
    }
}

/// A multi-room signaling relay.
///
/// Call and spawn [`run`](Self::run) to start processing commands.
#[derive(Debug)]
pub struct RelayServer {
    transport: WsTransport,
    registry: RoomRegistry,

    /// Tracks total number of historical connections established.
    visitor_count: usize,

    cmd_rx: flume::Receiver<Command>,
    token: CancellationToken,
}

impl RelayServer {
    #[must_use]
    pub fn new() -> (Self, RelayServerHandle) {
        let (cmd_tx, cmd_rx) = flume::unbounded();
        let token = CancellationToken::new();
        let handle = RelayServerHandle {
            cmd_tx,
            token: token.clone(),
        };

        (
            Self {
                transport: WsTransport::default(),
                registry: RoomRegistry::new(),
                visitor_count: 0,
                cmd_rx,
                token,
            },
            handle,
        )
    }

    fn connect(&mut self, conn_tx: mpsc::UnboundedSender<Msg>) -> ConnectionId {
        let conn = self.transport.connect(conn_tx);
        self.visitor_count += 1;

        log::info!("User connected: {conn}");
        log::debug!("Visitor count: {}", self.visitor_count);

        conn
    }

    fn disconnect(&mut self, conn: &ConnectionId) {
        if !self.transport.is_connected(conn) {
            log::debug!("disconnect: {conn} is not connected");
            return;
        }

        if let Err(e) = membership::disconnecting(&mut self.registry, &self.transport, conn) {
            log::error!("Failed to notify rooms of {conn} disconnecting: {e:?}");
        }

        self.transport.disconnect(conn);
        membership::disconnected(conn);
    }

    fn on_message(&mut self, conn: &ConnectionId, msg: &str) -> Result<(), RelayMessageError> {
        if !self.transport.is_connected(conn) {
            log::debug!("on_message: dropping message from disconnected {conn}");
            return Ok(());
        }

        relay::process_message(&mut self.registry, &mut self.transport, conn, msg)
    }

    fn stats(&self) -> RelayStats {
        RelayStats {
            connections: self.transport.connection_count(),
            rooms: self.registry.room_count(),
            visitors: self.visitor_count,
        }
    }

    fn process_command(&mut self, cmd: Command) {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("process_command: cmd={cmd:?}");
        } else {
            log::debug!("process_command: cmd={cmd}");
        }

        match cmd {
            Command::Connect { conn_tx, res_tx } => {
                let conn = self.connect(conn_tx);
                if res_tx.send(conn.clone()).is_err() {
                    log::debug!("Connection {conn} went away before it got its id");
                    self.disconnect(&conn);
                }
            }

            Command::Disconnect { conn } => self.disconnect(&conn),

            Command::Message { conn, msg } => match self.on_message(&conn, &msg) {
                Ok(()) => {}
                Err(RelayMessageError::InvalidPayload(payload, e)) => {
                    log::warn!("Dropping invalid message from {conn}: {payload:?} ({e})");
                }
                Err(e) => {
                    log::error!("Failed to process message from {conn}: {e:?}");
                }
            },

            Command::Stats { res_tx } => {
                let _ = res_tx.send(self.stats());
            }

            #[cfg(test)]
            Command::RoomMembers { room, res_tx } => {
                let _ = res_tx.send(self.registry.members_of(&room));
            }
        }
    }

    /// Processes commands until cancelled or every handle is dropped.
    ///
    /// # Errors
    ///
    /// * Never currently; kept fallible for the shutdown join
    pub async fn run(mut self) -> io::Result<()> {
        let token = self.token.clone();
        let cmd_rx = self.cmd_rx.clone();

        while let Ok(Ok(cmd)) = tokio::select!(
            () = token.cancelled() => {
                log::debug!("RelayServer was cancelled");
                Err(io::Error::new(io::ErrorKind::Interrupted, "Cancelled"))
            }
            cmd = cmd_rx.recv_async() => { Ok(cmd) }
        ) {
            self.process_command(cmd);
        }

        log::debug!("Stopped RelayServer");

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CommanderError {
    #[error("Failed to send command")]
    Send,
    #[error(transparent)]
    Recv(#[from] oneshot::error::RecvError),
}

impl From<flume::SendError<Command>> for CommanderError {
    fn from(_value: flume::SendError<Command>) -> Self {
        Self::Send
    }
}

/// Handle and command sender for the relay server.
#[derive(Debug, Clone)]
pub struct RelayServerHandle {
    cmd_tx: flume::Sender<Command>,
    token: CancellationToken,
}

impl RelayServerHandle {
    /// Register client message sender and obtain connection ID.
    ///
    /// # Errors
    ///
    /// * If the relay server has stopped
    pub async fn connect(
        &self,
        conn_tx: mpsc::UnboundedSender<Msg>,
    ) -> Result<ConnectionId, CommanderError> {
        log::trace!("Sending Connect command");

        let (res_tx, res_rx) = oneshot::channel();
        self.cmd_tx
            .send_async(Command::Connect { conn_tx, res_tx })
            .await?;

        Ok(res_rx.await?)
    }

    /// Hand a text frame from `conn` to the relay.
    ///
    /// # Errors
    ///
    /// * If the relay server has stopped
    pub async fn send_message(
        &self,
        conn: ConnectionId,
        msg: impl Into<Msg> + Send,
    ) -> Result<(), CommanderError> {
        log::trace!("Sending Message command");

        self.cmd_tx
            .send_async(Command::Message {
                conn,
                msg: msg.into(),
            })
            .await?;

        Ok(())
    }

    /// Unregister the connection and tell every room it was in.
    ///
    /// # Errors
    ///
    /// * If the relay server has stopped
    pub async fn disconnect(&self, conn: ConnectionId) -> Result<(), CommanderError> {
        log::trace!("Sending Disconnect command");

        self.cmd_tx.send_async(Command::Disconnect { conn }).await?;

        Ok(())
    }

    /// # Errors
    ///
    /// * If the relay server has stopped
    pub async fn stats(&self) -> Result<RelayStats, CommanderError> {
        let (res_tx, res_rx) = oneshot::channel();
        self.cmd_tx.send_async(Command::Stats { res_tx }).await?;

        Ok(res_rx.await?)
    }

    #[cfg(test)]
    pub async fn room_members(
        &self,
        room: impl Into<RoomName> + Send,
    ) -> Result<BTreeSet<ConnectionId>, CommanderError> {
        let (res_tx, res_rx) = oneshot::channel();
        self.cmd_tx
            .send_async(Command::RoomMembers {
                room: room.into(),
                res_tx,
            })
            .await?;

        Ok(res_rx.await?)
    }

    pub fn shutdown(&self) {
        log::debug!("Shutting down RelayServer");
        self.token.cancel();
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use relay::models::ChatBroadcastPayload;
    use serde_json::json;

    use super::*;

    struct Client {
        id: ConnectionId,
        rx: mpsc::UnboundedReceiver<Msg>,
    }

    impl Client {
        async fn connect(handle: &RelayServerHandle) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = handle.connect(tx).await.unwrap();
            Self { id, rx }
        }

        async fn send(&self, handle: &RelayServerHandle, frame: serde_json::Value) {
            handle
                .send_message(self.id.clone(), frame.to_string())
                .await
                .unwrap();
        }

        fn drain(&mut self) -> Vec<OutboundPayload> {
            let mut received = vec![];
            while let Ok(msg) = self.rx.try_recv() {
                received.push(serde_json::from_str(&msg).unwrap());
            }
            received
        }
    }

    fn start() -> (RelayServerHandle, tokio::task::JoinHandle<io::Result<()>>) {
        let (server, handle) = RelayServer::new();
        (handle, tokio::spawn(server.run()))
    }

    /// Commands are processed in order, so a round-trip query means every
    /// earlier command has been handled.
    async fn settle(handle: &RelayServerHandle) -> RelayStats {
        handle.stats().await.unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn connections_get_distinct_ids() {
        let (handle, _task) = start();

        let a = Client::connect(&handle).await;
        let b = Client::connect(&handle).await;

        assert_ne!(a.id, b.id);
        assert_eq!(
            settle(&handle).await,
            RelayStats {
                connections: 2,
                rooms: 0,
                visitors: 2,
            }
        );
    }

    #[test_log::test(tokio::test)]
    async fn joining_announces_newcomer_and_lists_participants() {
        let (handle, _task) = start();
        let mut a = Client::connect(&handle).await;
        let mut b = Client::connect(&handle).await;

        a.send(&handle, json!({"type": "join-room", "payload": "lobby"}))
            .await;
        b.send(&handle, json!({"type": "join-room", "payload": "lobby"}))
            .await;
        settle(&handle).await;

        assert_eq!(
            a.drain(),
            vec![
                OutboundPayload::ExistingParticipants(vec![]),
                OutboundPayload::UserConnected(b.id.clone()),
            ]
        );
        assert_eq!(
            b.drain(),
            vec![OutboundPayload::ExistingParticipants(vec![a.id.clone()])]
        );
        assert_eq!(
            handle.room_members("lobby").await.unwrap(),
            BTreeSet::from([a.id.clone(), b.id.clone()])
        );
    }

    #[test_log::test(tokio::test)]
    async fn chat_is_relayed_to_the_room_but_not_echoed() {
        let (handle, _task) = start();
        let mut a = Client::connect(&handle).await;
        let mut b = Client::connect(&handle).await;
        a.send(&handle, json!({"type": "join-room", "payload": "lobby"}))
            .await;
        b.send(&handle, json!({"type": "join-room", "payload": "lobby"}))
            .await;
        settle(&handle).await;
        a.drain();
        b.drain();

        a.send(
            &handle,
            json!({"type": "chat-message", "payload": {"room": "lobby", "message": "hi"}}),
        )
        .await;
        settle(&handle).await;

        assert_eq!(
            b.drain(),
            vec![OutboundPayload::ChatMessage(ChatBroadcastPayload {
                sender: a.id.clone(),
                message: "hi".into(),
            })]
        );
        assert!(a.drain().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn disconnect_leaves_all_rooms() {
        let (handle, _task) = start();
        let mut a = Client::connect(&handle).await;
        let b = Client::connect(&handle).await;
        a.send(&handle, json!({"type": "join-room", "payload": "lobby"}))
            .await;
        b.send(&handle, json!({"type": "join-room", "payload": "lobby"}))
            .await;
        b.send(&handle, json!({"type": "join-room", "payload": "desk"}))
            .await;
        settle(&handle).await;
        a.drain();

        handle.disconnect(b.id.clone()).await.unwrap();

        assert_eq!(
            settle(&handle).await,
            RelayStats {
                connections: 1,
                rooms: 1,
                visitors: 2,
            }
        );
        assert!(handle.room_members("desk").await.unwrap().is_empty());
        assert_eq!(
            a.drain(),
            vec![OutboundPayload::UserDisconnected(b.id.clone())]
        );
    }

    #[test_log::test(tokio::test)]
    async fn late_message_from_disconnected_connection_is_ignored() {
        let (handle, _task) = start();
        let a = Client::connect(&handle).await;

        handle.disconnect(a.id.clone()).await.unwrap();
        a.send(&handle, json!({"type": "join-room", "payload": "lobby"}))
            .await;

        assert_eq!(
            settle(&handle).await,
            RelayStats {
                connections: 0,
                rooms: 0,
                visitors: 1,
            }
        );
    }

    #[test_log::test(tokio::test)]
    async fn malformed_frames_do_not_stop_the_server() {
        let (handle, _task) = start();
        let mut a = Client::connect(&handle).await;

        handle.send_message(a.id.clone(), "not json").await.unwrap();
        a.send(&handle, json!({"type": "offer", "payload": {}})).await;
        a.send(&handle, json!({"type": "join-room", "payload": "lobby"}))
            .await;
        settle(&handle).await;

        assert_eq!(
            a.drain(),
            vec![OutboundPayload::ExistingParticipants(vec![])]
        );
    }

    #[test_log::test(tokio::test)]
    async fn shutdown_stops_the_server() {
        let (handle, task) = start();

        handle.shutdown();

        task.await.unwrap().unwrap();
        assert!(handle.stats().await.is_err());
    }
}
