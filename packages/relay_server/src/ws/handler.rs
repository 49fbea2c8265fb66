use std::{
    str::Utf8Error,
    time::{Duration, Instant},
};

use actix_ws::Message;
use futures_util::{
    StreamExt as _,
    future::{Either, select},
};
use tokio::{pin, sync::mpsc, time::interval};

use super::server::{CommanderError, RelayServerHandle};

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Binary frames are accepted when they carry UTF-8 text.
fn binary_frame_text(bytes: &[u8]) -> Result<&str, Utf8Error> {
    std::str::from_utf8(bytes).map(str::trim)
}

/// Relay text frames between the socket and the relay server, respond to ping
/// messages, and monitor connection health to detect network issues and free up
/// resources.
///
/// # Errors
///
/// * If the relay server has stopped
#[allow(clippy::future_not_send)]
pub async fn handle_ws(
    relay_server: RelayServerHandle,
    mut session: actix_ws::Session,
    mut msg_stream: actix_ws::MessageStream,
) -> Result<(), CommanderError> {
    let mut last_heartbeat = Instant::now();
    let mut interval = interval(HEARTBEAT_INTERVAL);

    let (conn_tx, mut conn_rx) = mpsc::unbounded_channel();

    let conn_id = relay_server.connect(conn_tx).await?;

    log::debug!("Connection id: {conn_id}");

    let close_reason = loop {
        // most of the futures we process need to be stack-pinned to work with select()

        let tick = interval.tick();
        pin!(tick);

        let msg_rx = conn_rx.recv();
        pin!(msg_rx);

        let messages = select(msg_stream.next(), msg_rx);
        pin!(messages);

        match select(messages, tick).await {
            // commands & messages received from client
            Either::Left((Either::Left((Some(Ok(msg)), _)), _)) => match msg {
                Message::Ping(bytes) => {
                    last_heartbeat = Instant::now();
                    if let Err(e) = session.pong(&bytes).await {
                        log::debug!("Failed to pong {conn_id}: {e:?}");
                        break None;
                    }
                }

                Message::Pong(_) => {
                    last_heartbeat = Instant::now();
                }

                Message::Text(text) => {
                    last_heartbeat = Instant::now();
                    relay_server
                        .send_message(conn_id.clone(), text.trim())
                        .await?;
                }

                Message::Binary(bytes) => {
                    last_heartbeat = Instant::now();
                    match binary_frame_text(&bytes) {
                        Ok(text) => {
                            relay_server.send_message(conn_id.clone(), text).await?;
                        }
                        Err(e) => {
                            log::warn!("unexpected binary message from {conn_id}: {e:?}");
                        }
                    }
                }

                Message::Close(reason) => break reason,

                _ => {
                    break None;
                }
            },

            // client WebSocket stream error
            Either::Left((Either::Left((Some(Err(err)), _)), _)) => {
                log::error!("WebSocket stream error for {conn_id}: {err}");
                break None;
            }

            // client WebSocket stream ended
            Either::Left((Either::Left((None, _)), _)) => break None,

            // messages relayed from other participants
            Either::Left((Either::Right((Some(msg), _)), _)) => {
                if let Err(err) = session.text(msg).await {
                    log::error!("Failed to send text message to {conn_id}: {err:?}");
                    break None;
                }
            }

            // relay server dropped this connection's sender
            Either::Left((Either::Right((None, _)), _)) => {
                log::debug!("Relay server released {conn_id}");
                break None;
            }

            // heartbeat internal tick
            Either::Right((_inst, _)) => {
                // if no heartbeat ping/pong received recently, close the connection
                if Instant::now().duration_since(last_heartbeat) > CLIENT_TIMEOUT {
                    log::info!(
                        "client has not sent heartbeat in over {CLIENT_TIMEOUT:?}; disconnecting"
                    );
                    break None;
                }

                // send heartbeat ping
                let _ = session.ping(b"").await;
            }
        }
    };

    log::debug!("handle_ws: disconnecting {conn_id}");
    relay_server.disconnect(conn_id).await?;

    // attempt to close connection gracefully
    let _ = session.close(close_reason).await;

    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn utf8_binary_frame_is_read_as_trimmed_text() {
        let frame = b" {\"type\":\"join-room\",\"payload\":\"lobby\"}\n";

        assert_eq!(
            binary_frame_text(frame),
            Ok(r#"{"type":"join-room","payload":"lobby"}"#)
        );
    }

    #[test_log::test]
    fn non_utf8_binary_frame_is_rejected() {
        assert!(binary_frame_text(&[0xff, 0xfe, 0x00]).is_err());
    }
}
