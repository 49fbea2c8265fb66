//! Addressing rules for signaling and room broadcast messages.
//!
//! The router holds no state and never touches the room registry. Room-scoped
//! messages fan out through [`RelayTransport::send_to_room_except`], and
//! handshake messages go straight to the connection they name.

use crate::{
    models::{
        AnswerPayload, ChatBroadcastPayload, ChatMessagePayload, ConnectionId,
        IceCandidatePayload, OfferPayload, OutboundPayload, UserIdPayload, VoiceStatePayload,
    },
    transport::{RelaySendError, RelayTransport},
};

fn target_room(room: Option<&str>) -> Option<&str> {
    room.filter(|x| !x.is_empty())
}

/// # Errors
///
/// * If the message fails to serialize
pub fn voice_activity(
    transport: &impl RelayTransport,
    sender: &ConnectionId,
    payload: VoiceStatePayload,
) -> Result<(), RelaySendError> {
    let Some(room) = target_room(payload.room.as_deref()) else {
        log::trace!("voice_activity: no room from {sender}, dropping");
        return Ok(());
    };

    transport.send_to_room_except(
        room,
        sender,
        &OutboundPayload::VoiceActivity(UserIdPayload {
            user_id: payload.user_id,
        }),
    )
}

/// # Errors
///
/// * If the message fails to serialize
pub fn voice_muted(
    transport: &impl RelayTransport,
    sender: &ConnectionId,
    payload: VoiceStatePayload,
) -> Result<(), RelaySendError> {
    let Some(room) = target_room(payload.room.as_deref()) else {
        log::trace!("voice_muted: no room from {sender}, dropping");
        return Ok(());
    };

    transport.send_to_room_except(
        room,
        sender,
        &OutboundPayload::VoiceMuted(UserIdPayload {
            user_id: payload.user_id,
        }),
    )
}

/// Forwards an offer to its target, rewriting `user_id` to the sender.
///
/// # Errors
///
/// * If the message fails to serialize
pub fn offer(
    transport: &impl RelayTransport,
    sender: &ConnectionId,
    payload: OfferPayload,
) -> Result<(), RelaySendError> {
    log::debug!("offer: {sender} -> {}", payload.user_id);
    transport.send(
        &payload.user_id,
        &OutboundPayload::Offer(OfferPayload {
            user_id: sender.clone(),
            offer: payload.offer,
        }),
    )
}

/// Forwards an answer to its target, rewriting `user_id` to the sender.
///
/// # Errors
///
/// * If the message fails to serialize
pub fn answer(
    transport: &impl RelayTransport,
    sender: &ConnectionId,
    payload: AnswerPayload,
) -> Result<(), RelaySendError> {
    log::debug!("answer: {sender} -> {}", payload.user_id);
    transport.send(
        &payload.user_id,
        &OutboundPayload::Answer(AnswerPayload {
            user_id: sender.clone(),
            answer: payload.answer,
        }),
    )
}

/// Forwards a candidate to its target, rewriting `user_id` to the sender.
///
/// # Errors
///
/// * If the message fails to serialize
pub fn ice_candidate(
    transport: &impl RelayTransport,
    sender: &ConnectionId,
    payload: IceCandidatePayload,
) -> Result<(), RelaySendError> {
    log::trace!("ice_candidate: {sender} -> {}", payload.user_id);
    transport.send(
        &payload.user_id,
        &OutboundPayload::IceCandidate(IceCandidatePayload {
            user_id: sender.clone(),
            candidate: payload.candidate,
        }),
    )
}

/// # Errors
///
/// * If the message fails to serialize
pub fn chat_message(
    transport: &impl RelayTransport,
    sender: &ConnectionId,
    payload: ChatMessagePayload,
) -> Result<(), RelaySendError> {
    let Some(room) = target_room(payload.room.as_deref()) else {
        log::trace!("chat_message: no room from {sender}, dropping");
        return Ok(());
    };

    transport.send_to_room_except(
        room,
        sender,
        &OutboundPayload::ChatMessage(ChatBroadcastPayload {
            sender: sender.clone(),
            message: payload.message,
        }),
    )
}
