//! `tokio-tungstenite` implementation of [`FeedSocket`].

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chainfeed_core::error::TransportError;
use chainfeed_core::transport::FeedSocket;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open WebSocket connection to a node.
pub struct WsSocket {
    url: String,
    inner: WsStream,
}

impl WsSocket {
    /// Open a connection to `url` (`ws://` or `wss://`).
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        tracing::info!(url = %url, "connecting via WebSocket");
        let (inner, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            inner,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedSocket for WsSocket {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => tracing::debug!(url = %self.url, "dropping non-UTF-8 binary frame"),
                },
                Ok(Message::Ping(_)) => {
                    // tungstenite queues the pong; push it out now
                    if let Err(e) = self.inner.flush().await {
                        return Some(Err(TransportError::WebSocket(e.to_string())));
                    }
                }
                Ok(Message::Close(frame)) => {
                    tracing::debug!(url = %self.url, ?frame, "close frame received");
                    return None;
                }
                Ok(_) => {}
                Err(e) => return Some(Err(TransportError::WebSocket(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close(None).await {
            tracing::debug!(url = %self.url, error = %e, "error while closing socket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accepts one connection, answers every text frame with `ack:<text>`,
    /// sends a ping first, and closes after the first reply.
    async fn one_shot_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Ping(Vec::new().into())).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let reply = format!("ack:{}", text.as_str());
                    ws.send(Message::Text(reply.into())).await.unwrap();
                    ws.close(None).await.unwrap();
                    break;
                }
            }
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn text_round_trip_then_close() {
        let url = one_shot_server().await;
        let mut socket = WsSocket::connect(&url).await.unwrap();
        socket.send_text("hello".into()).await.unwrap();

        let reply = socket.next_text().await.unwrap().unwrap();
        assert_eq!(reply, "ack:hello");
        assert!(socket.next_text().await.is_none());
    }

    #[tokio::test]
    async fn connect_refused_is_websocket_error() {
        let err = WsSocket::connect("ws://127.0.0.1:1").await.err().unwrap();
        assert!(matches!(err, TransportError::WebSocket(_)));
    }
}
