//! WebSocket transport seam
//!
//! Sessions only see [`Connector`] and [`Transport`]; the tungstenite
//! implementation is the production one and tests plug in scripted doubles.

use async_trait::async_trait;
use chord_common::{ClientError, ClientResult};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// A frame the session cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// The peer closed the connection
    Close(Option<u16>),
}

/// One open gateway connection
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> ClientResult<()>;

    /// Next frame, `None` once the stream has ended
    async fn recv(&mut self) -> Option<ClientResult<Frame>>;

    /// Close with `code`; 1000 invalidates the session server side
    async fn close(&mut self, code: u16) -> ClientResult<()>;
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn Transport>>;
}

/// Connects with `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn Transport>> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(ClientError::transient)?;
        tracing::debug!(url = %url, "WebSocket connected");
        Ok(Box::new(TungsteniteTransport { stream }))
    }
}

pub struct TungsteniteTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn send(&mut self, text: String) -> ClientResult<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(ClientError::transient)
    }

    async fn recv(&mut self) -> Option<ClientResult<Frame>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(ClientError::transient(err))),
            };

            match message {
                Message::Text(text) => return Some(Ok(Frame::Text(text))),
                Message::Binary(bytes) => {
                    // compressed and ETF transports are not negotiated
                    return Some(
                        String::from_utf8(bytes)
                            .map(Frame::Text)
                            .map_err(|_| ClientError::Decode("binary frame is not UTF-8".to_string())),
                    );
                }
                Message::Close(frame) => {
                    return Some(Ok(Frame::Close(frame.map(|frame| u16::from(frame.code)))));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    tracing::trace!("Control frame received");
                }
            }
        }
    }

    async fn close(&mut self, code: u16) -> ClientResult<()> {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: "".into(),
        };
        self.stream
            .close(Some(frame))
            .await
            .map_err(ClientError::transient)
    }
}

impl std::fmt::Debug for TungsteniteTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TungsteniteTransport").finish_non_exhaustive()
    }
}
