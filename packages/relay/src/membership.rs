//! Join/leave lifecycle of connections within rooms.
//!
//! Every function here mutates the transport-level room grouping and the
//! [`RoomRegistry`] in the same call so the two never drift apart.

use crate::{
    models::{ConnectionId, OutboundPayload},
    registry::RoomRegistry,
    transport::{RelaySendError, RelayTransport},
};

/// Joins `conn` to `room`.
///
/// The other members are told about the newcomer, and the newcomer receives the
/// list of everyone else already in the room. An empty room name is ignored.
///
/// # Errors
///
/// * If a message fails to serialize
pub fn join_room(
    registry: &mut RoomRegistry,
    transport: &mut impl RelayTransport,
    conn: &ConnectionId,
    room: &str,
) -> Result<(), RelaySendError> {
    if room.is_empty() {
        log::warn!("join_room: {conn} tried to join a room with an empty name");
        return Ok(());
    }

    transport.join(conn, room);

    if !registry.add_member(room, conn) {
        log::debug!("join_room: {conn} is already in room '{room}'");
    }

    transport.send_to_room_except(room, conn, &OutboundPayload::UserConnected(conn.clone()))?;

    let participants = registry
        .members_of(room)
        .into_iter()
        .filter(|x| x != conn)
        .collect::<Vec<_>>();

    log::debug!(
        "join_room: {conn} joined room '{room}' with {} existing participant(s)",
        participants.len()
    );

    transport.send(conn, &OutboundPayload::ExistingParticipants(participants))
}

/// Removes `conn` from `room` and tells the remaining members.
///
/// Does nothing if `conn` is not in the room.
///
/// # Errors
///
/// * If a message fails to serialize
pub fn leave_room(
    registry: &mut RoomRegistry,
    transport: &mut impl RelayTransport,
    conn: &ConnectionId,
    room: &str,
) -> Result<(), RelaySendError> {
    if !registry.remove_member(room, conn) {
        log::debug!("leave_room: {conn} is not in room '{room}'");
        return Ok(());
    }

    transport.leave(conn, room);

    log::debug!("leave_room: {conn} left room '{room}'");

    transport.send_to_room_except(room, conn, &OutboundPayload::UserDisconnected(conn.clone()))
}

/// Runs while the connection's room memberships are still enumerable.
///
/// Removes `conn` from every room it belonged to and announces the departure to
/// each room's remaining members.
///
/// # Errors
///
/// * If a message fails to serialize
pub fn disconnecting(
    registry: &mut RoomRegistry,
    transport: &impl RelayTransport,
    conn: &ConnectionId,
) -> Result<(), RelaySendError> {
    for room in transport.rooms_of(conn) {
        if registry.remove_member(&room, conn) {
            log::debug!("disconnecting: removed {conn} from room '{room}'");
            transport.send_to_room_except(
                &room,
                conn,
                &OutboundPayload::UserDisconnected(conn.clone()),
            )?;
        }
    }

    Ok(())
}

/// Runs after the transport has torn the connection down.
pub fn disconnected(conn: &ConnectionId) {
    log::info!("User disconnected: {conn}");
}
