use arena_core::wire::encode_ping;
use arena_core::{decode_server_msg, ServerMsg};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Message(ServerMsg),
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: Url,
    pub reconnect: Duration,
    pub ping_interval: Duration,
}

/// Keeps one push channel open for as long as `tx` has a receiver.
/// Each drop is reported as `Disconnected` and followed by a retry after
/// `config.reconnect`.
pub async fn channel_loop(config: ChannelConfig, tx: mpsc::Sender<ChannelEvent>) {
    loop {
        if tx.is_closed() {
            return;
        }
        let (mut ws, _) = match connect_async(config.url.clone()).await {
            Ok(value) => value,
            Err(err) => {
                warn!("channel_connect_error: {err}");
                tokio::time::sleep(config.reconnect).await;
                continue;
            }
        };
        info!("channel_connected: {}", config.url);
        if tx.send(ChannelEvent::Connected).await.is_err() {
            let _ = ws.close(None).await;
            return;
        }

        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + config.ping_interval,
            config.ping_interval,
        );
        loop {
            tokio::select! {
                incoming = ws.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => match decode_server_msg(&text) {
                            Ok(msg) => {
                                if tx.send(ChannelEvent::Message(msg)).await.is_err() {
                                    let _ = ws.close(None).await;
                                    return;
                                }
                            }
                            Err(err) => warn!("channel_decode_error: {err}"),
                        },
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!("channel_read_error: {err}");
                            break;
                        }
                    }
                }
                _ = ping.tick() => {
                    if ws.send(Message::Text(encode_ping())).await.is_err() {
                        warn!("channel_ping_error");
                        break;
                    }
                    debug!("channel_ping_sent");
                }
            }
        }
        let _ = ws.close(None).await;
        if tx.send(ChannelEvent::Disconnected).await.is_err() {
            return;
        }
        tokio::time::sleep(config.reconnect).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn next_event(rx: &mut mpsc::Receiver<ChannelEvent>) -> ChannelEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event before timeout")
            .expect("channel open")
    }

    #[tokio::test]
    async fn forwards_frames_skips_garbage_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            ws.send(Message::Text("not json".to_string()))
                .await
                .expect("send garbage");
            ws.send(Message::Text(
                r#"{"type":"event","data":{"event":"start","agent":"forger"}}"#.to_string(),
            ))
            .await
            .expect("send event");
            ws.close(None).await.expect("close");

            let (stream, _) = listener.accept().await.expect("second accept");
            let mut ws = accept_async(stream).await.expect("second handshake");
            ws.send(Message::Text(r#"{"type":"pong"}"#.to_string()))
                .await
                .expect("send pong");
            let _ = ws.next().await;
        });

        let (tx, mut rx) = mpsc::channel(16);
        let config = ChannelConfig {
            url: Url::parse(&format!("ws://{addr}/ws")).expect("url"),
            reconnect: Duration::from_millis(20),
            ping_interval: Duration::from_secs(60),
        };
        let client = tokio::spawn(channel_loop(config, tx));

        assert!(matches!(next_event(&mut rx).await, ChannelEvent::Connected));
        match next_event(&mut rx).await {
            ChannelEvent::Message(ServerMsg::Event(event)) => {
                assert_eq!(event.agent.as_deref(), Some("forger"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(next_event(&mut rx).await, ChannelEvent::Disconnected));
        assert!(matches!(next_event(&mut rx).await, ChannelEvent::Connected));
        assert!(matches!(
            next_event(&mut rx).await,
            ChannelEvent::Message(ServerMsg::Pong)
        ));

        drop(rx);
        client.abort();
        server.abort();
    }

    #[tokio::test]
    async fn sends_json_keepalive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => return text,
                    Some(Ok(_)) => continue,
                    _ => return String::new(),
                }
            }
        });

        let (tx, mut rx) = mpsc::channel(16);
        let config = ChannelConfig {
            url: Url::parse(&format!("ws://{addr}/ws")).expect("url"),
            reconnect: Duration::from_millis(20),
            ping_interval: Duration::from_millis(50),
        };
        let client = tokio::spawn(channel_loop(config, tx));
        assert!(matches!(next_event(&mut rx).await, ChannelEvent::Connected));

        let text = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("ping before timeout")
            .expect("server task");
        let value: serde_json::Value = serde_json::from_str(&text).expect("json ping");
        assert_eq!(value["type"], "ping");
        client.abort();
    }

    #[tokio::test]
    async fn secure_urls_attempt_a_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            drop(stream);
        });

        let url = Url::parse(&format!("wss://{addr}/ws")).expect("url");
        let err = connect_async(url).await.expect_err("plain socket cannot speak tls");
        assert!(matches!(err, tokio_tungstenite::tungstenite::Error::Io(_)));
        server.abort();
    }
}
