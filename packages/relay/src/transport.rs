//! The seam between the relay core and the message transport.

use std::fmt;

use thiserror::Error;

use crate::models::{ConnectionId, OutboundPayload, RoomName};

/// Errors that can occur when handing a message to the transport.
#[derive(Debug, Error)]
pub enum RelaySendError {
    /// JSON serialization error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Delivery and room-grouping primitives provided by the transport.
///
/// Delivery is at-most-once and unacknowledged. Sending to a connection or
/// room that no longer exists is not an error; the message is dropped.
pub trait RelayTransport {
    /// Groups `conn` into `room` at the transport level.
    fn join(&mut self, conn: &ConnectionId, room: &str);

    /// Removes `conn` from the transport-level `room` group.
    fn leave(&mut self, conn: &ConnectionId, room: &str);

    /// Rooms `conn` is grouped into. Still valid while the connection is
    /// being torn down.
    fn rooms_of(&self, conn: &ConnectionId) -> Vec<RoomName>;

    /// Delivers a message to a single connection.
    ///
    /// # Errors
    ///
    /// * If the message fails to serialize
    fn send(&self, conn: &ConnectionId, payload: &OutboundPayload) -> Result<(), RelaySendError>;

    /// Delivers a message to every member of `room` except `except`.
    ///
    /// # Errors
    ///
    /// * If the message fails to serialize
    fn send_to_room_except(
        &self,
        room: &str,
        except: &ConnectionId,
        payload: &OutboundPayload,
    ) -> Result<(), RelaySendError>;
}

impl fmt::Debug for dyn RelayTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{RelayTransport}}")
    }
}
