use actix_web::{HttpRequest, HttpResponse, Result, get, web};

use crate::{relay_server_handle, ws::handler};

#[get("/ws")]
pub async fn websocket(
    req: HttpRequest,
    stream: web::Payload,
) -> Result<HttpResponse, actix_web::Error> {
    let relay_server = relay_server_handle().await?;
    let (res, session, msg_stream) = actix_ws::handle(&req, stream)?;

    // spawn websocket handler (and don't await it) so that the response is returned immediately
    actix_web::rt::spawn(async move {
        if let Err(e) = handler::handle_ws(relay_server, session, msg_stream).await {
            log::error!("WebSocket handler failed: {e:?}");
        }
    });

    Ok(res)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use actix_http::ws;
    use actix_web::{App, web::Bytes};
    use futures_util::{SinkExt as _, Stream, StreamExt as _};
    use pretty_assertions::assert_eq;
    use relay::models::{ChatBroadcastPayload, OutboundPayload};
    use serde_json::json;

    use super::*;
    use crate::test_utils::{install_relay_server, lock_relay_server};

    async fn next_payload<S>(conn: &mut S) -> OutboundPayload
    where
        S: Stream<Item = Result<ws::Frame, ws::ProtocolError>> + Unpin,
    {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), conn.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();

            match frame {
                ws::Frame::Text(bytes) => return serde_json::from_slice(&bytes).unwrap(),
                ws::Frame::Ping(_) | ws::Frame::Pong(_) => {}
                other => panic!("Unexpected frame: {other:?}"),
            }
        }
    }

    fn join_lobby() -> String {
        json!({"type": "join-room", "payload": "lobby"}).to_string()
    }

    #[test_log::test(actix_web::test)]
    async fn socket_frames_are_relayed_and_close_disconnects() {
        let _lock = lock_relay_server().await;
        let relay = install_relay_server().await;
        let mut srv = actix_test::start(|| App::new().service(websocket));

        let mut a = srv.ws_at("/ws").await.unwrap();
        let mut b = srv.ws_at("/ws").await.unwrap();

        a.send(ws::Message::Binary(Bytes::from(join_lobby())))
            .await
            .unwrap();
        assert_eq!(
            next_payload(&mut a).await,
            OutboundPayload::ExistingParticipants(vec![])
        );

        b.send(ws::Message::Text(join_lobby().into())).await.unwrap();
        let OutboundPayload::UserConnected(b_id) = next_payload(&mut a).await else {
            panic!("Expected user-connected");
        };
        let OutboundPayload::ExistingParticipants(participants) = next_payload(&mut b).await
        else {
            panic!("Expected existing-participants");
        };
        assert_eq!(participants.len(), 1);
        let a_id = participants[0].clone();

        // not UTF-8, dropped while the socket stays open
        a.send(ws::Message::Binary(Bytes::from_static(&[0xff, 0xfe])))
            .await
            .unwrap();
        a.send(ws::Message::Text(
            json!({"type": "chat-message", "payload": {"room": "lobby", "message": "hi"}})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
        assert_eq!(
            next_payload(&mut b).await,
            OutboundPayload::ChatMessage(ChatBroadcastPayload {
                sender: a_id,
                message: "hi".into(),
            })
        );

        b.send(ws::Message::Close(None)).await.unwrap();
        assert_eq!(
            next_payload(&mut a).await,
            OutboundPayload::UserDisconnected(b_id)
        );

        let stats = relay.stats().await.unwrap();
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.rooms, 1);
        assert_eq!(stats.visitors, 2);

        relay.shutdown();
    }
}
