//! Room membership and message relay for peer-to-peer call signaling.
//!
//! This crate is the transport-agnostic core of the signaling relay. Peers join
//! named rooms, learn who else is there, and exchange session offers, answers
//! and network candidates through the relay before talking to each other
//! directly. Chat and voice activity/mute updates are fanned out to the rest of
//! a room.
//!
//! # Main Components
//!
//! * [`RelayTransport`] - Delivery and room-grouping primitives the transport provides
//! * [`registry::RoomRegistry`] - Room name to member connections mapping
//! * [`membership`] - Join, leave and disconnect lifecycle
//! * [`router`] - Addressing rules for every relayed message
//! * [`process_message`] - Decodes a raw frame and dispatches it
//!
//! All state changes are expected to happen from a single owner, one event at a
//! time; nothing in this crate locks.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error;

pub mod membership;
pub mod models;
pub mod registry;
pub mod router;
mod transport;

pub use transport::*;

use crate::{
    models::{ConnectionId, InboundPayload},
    registry::RoomRegistry,
};

/// Errors that can occur when processing a relay message.
#[derive(Debug, Error)]
pub enum RelayMessageError {
    /// Frame does not decode into a known message
    #[error("Invalid payload: '{0}' ({1})")]
    InvalidPayload(String, String),
    /// Relay send error
    #[error(transparent)]
    RelaySend(#[from] RelaySendError),
}

/// Decodes a raw text frame from `conn` and relays it.
///
/// # Errors
///
/// * If the frame is not a known message with the required fields
/// * If a relayed message fails to serialize
pub fn process_message(
    registry: &mut RoomRegistry,
    transport: &mut impl RelayTransport,
    conn: &ConnectionId,
    body: &str,
) -> Result<(), RelayMessageError> {
    let payload: InboundPayload = serde_json::from_str(body)
        .map_err(|e| RelayMessageError::InvalidPayload(body.to_owned(), e.to_string()))?;

    message(registry, transport, conn, payload)
}

/// Dispatches a decoded message to the membership lifecycle or the router.
///
/// # Errors
///
/// * If a relayed message fails to serialize
pub fn message(
    registry: &mut RoomRegistry,
    transport: &mut impl RelayTransport,
    conn: &ConnectionId,
    message: InboundPayload,
) -> Result<(), RelayMessageError> {
    let message_type = message.to_string();
    log::debug!("Received message type {message_type} from {conn}");

    match message {
        InboundPayload::JoinRoom(room) => membership::join_room(registry, transport, conn, &room),
        InboundPayload::LeaveRoom(room) => {
            membership::leave_room(registry, transport, conn, &room)
        }
        InboundPayload::VoiceActivity(payload) => {
            router::voice_activity(&*transport, conn, payload)
        }
        InboundPayload::VoiceMuted(payload) => router::voice_muted(&*transport, conn, payload),
        InboundPayload::Offer(payload) => router::offer(&*transport, conn, payload),
        InboundPayload::Answer(payload) => router::answer(&*transport, conn, payload),
        InboundPayload::IceCandidate(payload) => {
            router::ice_candidate(&*transport, conn, payload)
        }
        InboundPayload::ChatMessage(payload) => {
            router::chat_message(&*transport, conn, payload)
        }
    }?;

    log::trace!("Successfully processed message type {message_type} from {conn}");

    Ok(())
}
