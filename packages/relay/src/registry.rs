//! Authoritative mapping of rooms to their member connections.
//!
//! A room exists in the registry only while it has at least one member: it is
//! created by the first [`RoomRegistry::add_member`] naming it and removed the
//! moment [`RoomRegistry::remove_member`] takes out its last member.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ConnectionId, RoomName};

#[derive(Debug, Default, Clone)]
pub struct RoomRegistry {
    rooms: BTreeMap<RoomName, BTreeSet<ConnectionId>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn` to `room`, creating the room if needed.
    ///
    /// Returns `false` if the connection was already a member.
    pub fn add_member(&mut self, room: &str, conn: &ConnectionId) -> bool {
        self.rooms
            .entry(room.to_owned())
            .or_default()
            .insert(conn.clone())
    }

    /// Removes `conn` from `room`, dropping the room once it is empty.
    ///
    /// Returns `false` if the room or the member did not exist.
    pub fn remove_member(&mut self, room: &str, conn: &ConnectionId) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };

        let removed = members.remove(conn);

        if members.is_empty() {
            log::debug!("remove_member: room '{room}' is empty, removing it");
            self.rooms.remove(room);
        }

        removed
    }

    /// Snapshot of the current members of `room`. Empty if the room does not exist.
    #[must_use]
    pub fn members_of(&self, room: &str) -> BTreeSet<ConnectionId> {
        self.rooms.get(room).cloned().unwrap_or_default()
    }

    /// Every room `conn` is currently a member of.
    #[must_use]
    pub fn rooms_of(&self, conn: &ConnectionId) -> Vec<RoomName> {
        self.rooms
            .iter()
            .filter(|(_, members)| members.contains(conn))
            .map(|(room, _)| room.clone())
            .collect()
    }

    #[must_use]
    pub fn contains_room(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &RoomName> {
        self.rooms.keys()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
