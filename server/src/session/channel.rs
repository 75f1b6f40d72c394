//! Transport abstraction for operator connections

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{
    self,
    error::ProtocolError,
    protocol::{frame::coding::CloseCode, CloseFrame},
    Message,
};
use tokio_tungstenite::WebSocketStream;

/// Errors that end an operator connection
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The peer or the transport dropped the connection
    #[error("connection closed by peer: {0}")]
    PeerClosed(String),

    /// Anything else that went wrong while reading or writing
    #[error("connection fault: {0}")]
    Fault(String),
}

impl ChannelError {
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, ChannelError::PeerClosed(_))
    }
}

impl From<tungstenite::Error> for ChannelError {
    fn from(err: tungstenite::Error) -> Self {
        match &err {
            tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                ChannelError::PeerClosed(err.to_string())
            }
            tungstenite::Error::Io(io_err) if is_disconnect(io_err) => {
                ChannelError::PeerClosed(err.to_string())
            }
            _ => ChannelError::Fault(err.to_string()),
        }
    }
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

/// A bidirectional text channel to one operator
#[async_trait]
pub trait ControlChannel: Send {
    /// Wait for the next text message.
    ///
    /// Returns `Ok(None)` when the peer ended the stream normally.
    async fn recv(&mut self) -> Result<Option<String>, ChannelError>;

    /// Send one text message
    async fn send(&mut self, text: String) -> Result<(), ChannelError>;

    /// Tell the peer the server is going away and close the channel
    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// WebSocket channel over any async byte stream
pub struct WsChannel<S> {
    inner: WebSocketStream<S>,
}

impl<S> WsChannel<S> {
    pub fn new(inner: WebSocketStream<S>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> ControlChannel for WsChannel<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn recv(&mut self) -> Result<Option<String>, ChannelError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.to_string())),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // tungstenite answers pings on its own
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), ChannelError> {
        self.inner.send(Message::text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "server shutting down".into(),
        };
        match self.inner.close(Some(frame)).await {
            Ok(()) => Ok(()),
            Err(e) => match ChannelError::from(e) {
                ChannelError::PeerClosed(_) => Ok(()),
                fault => Err(fault),
            },
        }
    }
}
