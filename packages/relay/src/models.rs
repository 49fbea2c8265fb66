//! Wire types for the signaling relay.
//!
//! Every frame on the wire is a JSON object with a kebab-case `type` tag and a
//! `payload` holding the event data, e.g.
//! `{"type":"join-room","payload":"lobby"}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::AsRefStr;

/// Room name as supplied by clients. Case-sensitive.
pub type RoomName = String;

/// Opaque identifier assigned by the transport to a live connection.
///
/// Used both as the address for targeted messages and as the peer identity
/// reported in participant lists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A message received from a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum InboundPayload {
    JoinRoom(RoomName),
    LeaveRoom(RoomName),
    VoiceActivity(VoiceStatePayload),
    VoiceMuted(VoiceStatePayload),
    Offer(OfferPayload),
    Answer(AnswerPayload),
    IceCandidate(IceCandidatePayload),
    ChatMessage(ChatMessagePayload),
}

impl fmt::Display for InboundPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// A message delivered to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OutboundPayload {
    UserConnected(ConnectionId),
    UserDisconnected(ConnectionId),
    /// Sent only to a newly joined connection; never contains its own id.
    ExistingParticipants(Vec<ConnectionId>),
    VoiceActivity(UserIdPayload),
    VoiceMuted(UserIdPayload),
    Offer(OfferPayload),
    Answer(AnswerPayload),
    IceCandidate(IceCandidatePayload),
    ChatMessage(ChatBroadcastPayload),
}

impl fmt::Display for OutboundPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Speaking/mute state change announced to a room.
///
/// A missing or empty `room` means the update is not relayed anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStatePayload {
    pub user_id: ConnectionId,
    #[serde(default)]
    pub room: Option<RoomName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdPayload {
    pub user_id: ConnectionId,
}

/// Session offer.
///
/// Inbound, `user_id` is the target connection; outbound, it is the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPayload {
    pub user_id: ConnectionId,
    pub offer: Value,
}

/// Session answer. Same addressing convention as [`OfferPayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub user_id: ConnectionId,
    pub answer: Value,
}

/// Network path candidate. Same addressing convention as [`OfferPayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidatePayload {
    pub user_id: ConnectionId,
    pub candidate: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    #[serde(default)]
    pub room: Option<RoomName>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBroadcastPayload {
    pub sender: ConnectionId,
    pub message: String,
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test_log::test]
    fn join_room_payload_is_a_bare_room_name() {
        let payload: InboundPayload =
            serde_json::from_value(json!({"type": "join-room", "payload": "lobby"})).unwrap();

        assert_eq!(payload, InboundPayload::JoinRoom("lobby".into()));
        assert_eq!(payload.to_string(), "join-room");
    }

    #[test_log::test]
    fn voice_activity_room_is_optional() {
        let payload: InboundPayload = serde_json::from_value(
            json!({"type": "voice-activity", "payload": {"userId": "a"}}),
        )
        .unwrap();

        assert_eq!(
            payload,
            InboundPayload::VoiceActivity(VoiceStatePayload {
                user_id: "a".into(),
                room: None,
            })
        );
    }

    #[test_log::test]
    fn offer_requires_a_target() {
        let result = serde_json::from_value::<InboundPayload>(
            json!({"type": "offer", "payload": {"offer": {"sdp": "v=0"}}}),
        );

        assert!(result.is_err());
    }

    #[test_log::test]
    fn unknown_event_type_is_rejected() {
        let result =
            serde_json::from_value::<InboundPayload>(json!({"type": "hello", "payload": {}}));

        assert!(result.is_err());
    }

    #[test_log::test]
    fn outbound_frames_use_camel_case_fields() {
        let value = serde_json::to_value(OutboundPayload::IceCandidate(IceCandidatePayload {
            user_id: "a".into(),
            candidate: json!({"candidate": "candidate:1 1 udp"}),
        }))
        .unwrap();

        assert_eq!(
            value,
            json!({
                "type": "ice-candidate",
                "payload": {"userId": "a", "candidate": {"candidate": "candidate:1 1 udp"}},
            })
        );
    }

    #[test_log::test]
    fn existing_participants_is_a_list_of_ids() {
        let value = serde_json::to_value(OutboundPayload::ExistingParticipants(vec![
            "a".into(),
            "b".into(),
        ]))
        .unwrap();

        assert_eq!(
            value,
            json!({"type": "existing-participants", "payload": ["a", "b"]})
        );
    }
}
