//! Websocket transport: one socket per session, whole messages at a time.

use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Error as WsError, client::IntoClientRequest, http::HeaderValue, protocol::Message,
    },
};
use tracing::debug;

/// One persistent, full-duplex, message-oriented connection.
///
/// `receive` suspends the caller until a full message arrives, the remote
/// closes, or an I/O error occurs; it never yields a partial message.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;
    async fn receive(&mut self) -> Result<String, TransportError>;
    async fn close(&mut self);
}

/// [`Transport`] backed by `tokio-tungstenite`.
pub struct WsTransport {
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    receive_timeout: Option<Duration>,
}

impl WsTransport {
    /// Opens one websocket connection. Fails fast; retry policy belongs to
    /// the caller.
    pub async fn open(
        url: &str,
        headers: &[(&'static str, String)],
        connect_timeout: Duration,
        receive_timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut request = url.into_client_request().map_err(classify_connect)?;
        for (name, value) in headers {
            let value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader((*name).to_string()))?;
            request.headers_mut().insert(*name, value);
        }

        let (stream, _response) = tokio::time::timeout(connect_timeout, connect_async(request))
            .await
            .map_err(|_| TransportError::Timeout(connect_timeout))?
            .map_err(classify_connect)?;
        debug!(%url, "websocket connected");

        Ok(Self {
            stream: Some(stream),
            receive_timeout,
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        debug!(frame = %text, "sending frame");
        stream.send(Message::Text(text)).await.map_err(classify_io)
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        let limit = self.receive_timeout;
        loop {
            let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
            let item = match limit {
                Some(limit) => tokio::time::timeout(limit, stream.next())
                    .await
                    .map_err(|_| TransportError::Timeout(limit))?,
                None => stream.next().await,
            };
            match item {
                None => return Err(TransportError::Closed),
                Some(Ok(Message::Text(text))) => {
                    debug!(frame = %text, "received frame");
                    return Ok(text);
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "remote closed the connection");
                    return Err(TransportError::Closed);
                }
                // Control frames and binary payloads are not protocol events.
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    return Err(TransportError::Closed);
                }
                Some(Err(err)) => return Err(TransportError::Ws(err)),
            }
        }
    }

    async fn close(&mut self) {
        // Idempotent: the stream is taken on the first call.
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
            debug!("websocket closed");
        }
    }
}

fn classify_connect(err: WsError) -> TransportError {
    if matches!(err, WsError::Tls(_)) {
        TransportError::Tls(err)
    } else if matches!(err, WsError::Url(_)) {
        TransportError::InvalidUrl(err)
    } else if matches!(err, WsError::Io(_) | WsError::Http(_)) {
        TransportError::Connect(err)
    } else {
        TransportError::Ws(err)
    }
}

fn classify_io(err: WsError) -> TransportError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        other => TransportError::Ws(other),
    }
}
