//! Production [`Transport`]: `reqwest` for HTTP, `tokio-tungstenite` for sockets.

use async_trait::async_trait;

use chainfeed_core::{FeedSocket, JsonRpcRequest, JsonRpcResponse, Transport, TransportError};
use chainfeed_http::HttpRpcClient;
use chainfeed_ws::WsSocket;

#[derive(Debug, Clone)]
pub struct NetworkTransport {
    http: HttpRpcClient,
}

impl NetworkTransport {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            http: HttpRpcClient::with_defaults()?,
        })
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    async fn open_socket(&self, url: &str) -> Result<Box<dyn FeedSocket>, TransportError> {
        let socket = WsSocket::connect(url).await?;
        Ok(Box::new(socket))
    }

    async fn http_post(
        &self,
        url: &str,
        req: JsonRpcRequest,
    ) -> Result<JsonRpcResponse, TransportError> {
        self.http.post(url, &req).await
    }
}
