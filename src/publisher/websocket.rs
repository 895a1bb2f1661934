//! WebSocket subscriber transport
//!
//! Accepts TCP connections and upgrades them with `tokio-tungstenite`.
//! Each sample goes out as one text frame.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use super::{Subscriber, SubscriberSource};
use crate::constants::publisher::HANDSHAKE_TIMEOUT;
use crate::error::{PipelineError, SubscriberError};

fn classify(err: WsError) -> SubscriberError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => SubscriberError::Disconnected,
        WsError::Io(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
            ) =>
        {
            SubscriberError::Disconnected
        }
        other => SubscriberError::Transport(other.to_string()),
    }
}

/// Listening socket that yields upgraded WebSocket sessions
#[derive(Debug)]
pub struct WsSource {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl WsSource {
    /// Bind the subscriber listener
    pub async fn bind(addr: &str) -> Result<Self, PipelineError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| PipelineError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Self::from_listener(listener).map_err(|source| PipelineError::Bind {
            addr: addr.to_string(),
            source,
        })
    }

    /// Wrap an already bound listener
    pub fn from_listener(listener: TcpListener) -> std::io::Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound, useful when binding port 0
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl SubscriberSource for WsSource {
    type Subscriber = WsSubscriber;

    async fn accept(&mut self) -> Result<WsSubscriber, SubscriberError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| SubscriberError::Transport(e.to_string()))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, "Failed to set TCP_NODELAY: {}", e);
        }

        let ws = tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream))
            .await
            .map_err(|_| SubscriberError::Handshake(format!("upgrade from {peer} timed out")))?
            .map_err(|e| SubscriberError::Handshake(e.to_string()))?;

        debug!(%peer, "WebSocket upgrade complete");
        Ok(WsSubscriber { ws, peer })
    }
}

/// One upgraded WebSocket connection
#[derive(Debug)]
pub struct WsSubscriber {
    ws: WebSocketStream<TcpStream>,
    peer: SocketAddr,
}

#[async_trait]
impl Subscriber for WsSubscriber {
    async fn handshake(&mut self) -> Result<(), SubscriberError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(_) | Message::Binary(_))) => return Ok(()),
                Some(Ok(Message::Close(_))) | None => return Err(SubscriberError::Disconnected),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(classify(e)),
            }
        }
    }

    async fn send(&mut self, frame: String) -> Result<(), SubscriberError> {
        self.ws.send(Message::Text(frame)).await.map_err(classify)
    }

    async fn closed(&mut self) -> SubscriberError {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Close(_))) | None => return SubscriberError::Disconnected,
                // Anything the client says after the probe is ignored
                Some(Ok(_)) => {}
                Some(Err(e)) => return classify(e),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!(peer = %self.peer, "Error closing WebSocket: {}", e);
        }
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn source() -> WsSource {
        WsSource::bind("127.0.0.1:0").await.unwrap()
    }

    #[tokio::test]
    async fn test_bind_reports_local_addr() {
        let source = source().await;
        assert!(source.local_addr().port() > 0);
    }

    #[tokio::test]
    async fn test_bind_error_names_address() {
        let first = source().await;
        let addr = first.local_addr().to_string();
        let err = WsSource::bind(&addr).await.unwrap_err();
        assert!(err.to_string().contains(&addr));
    }

    #[tokio::test]
    async fn test_probe_then_frame() {
        let mut source = source().await;
        let url = format!("ws://{}", source.local_addr());

        let client = tokio::spawn(async move {
            let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
            ws.send(Message::Text("Connection opened".to_string()))
                .await
                .unwrap();
            match ws.next().await {
                Some(Ok(Message::Text(text))) => text,
                other => panic!("unexpected message: {other:?}"),
            }
        });

        let mut subscriber = source.accept().await.unwrap();
        subscriber.handshake().await.unwrap();
        subscriber.send("{\"msg_num\":\"2\"}".to_string()).await.unwrap();

        assert_eq!(client.await.unwrap(), "{\"msg_num\":\"2\"}");
    }

    #[tokio::test]
    async fn test_client_close_detected() {
        let mut source = source().await;
        let url = format!("ws://{}", source.local_addr());

        let client = tokio::spawn(async move {
            let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
            ws.send(Message::Text("ready".to_string())).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let mut subscriber = source.accept().await.unwrap();
        subscriber.handshake().await.unwrap();
        assert!(subscriber.closed().await.is_disconnect());
        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_plain_tcp_fails_upgrade() {
        use tokio::io::AsyncWriteExt;

        let mut source = source().await;
        let addr = source.local_addr();
        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"not a websocket\r\n\r\n").await.unwrap();
        });

        let err = source.accept().await.unwrap_err();
        assert!(matches!(err, SubscriberError::Handshake(_)));
        client.await.unwrap();
    }
}
