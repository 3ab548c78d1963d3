//! Framed message transport between the judge and its clients.
//!
//! Every message on a connection is a 4-byte big-endian signed length
//! followed by that many bytes of ASCII JSON. The JSON is always an object
//! `{"type": "data", "data": "<payload>"}`; other `type` values are
//! reserved for future control messages and abort the receiving operation
//! with a protocol error.
//!
//! Line-oriented text IO is deliberately avoided: a timeout mid-read can
//! leave a buffered line reader in an inconsistent state, while binary
//! frames are self-delimiting.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// TCP port the judge listens on.
pub const JUDGE_PORT: u16 = 10000;

/// A single framed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message kind; only `"data"` is currently understood.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload text.
    pub data: String,
}

impl Message {
    /// Build a `data` message carrying `payload`.
    #[must_use]
    pub fn data(payload: impl Into<String>) -> Self {
        Self {
            kind: "data".to_string(),
            data: payload.into(),
        }
    }

    /// Extract the payload of a `data` message.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for any other message kind.
    pub fn into_data(self) -> Result<String, WireError> {
        if self.kind == "data" {
            Ok(self.data)
        } else {
            Err(WireError::Protocol(format!(
                "unsupported message type {:?}",
                self.kind
            )))
        }
    }
}

/// Errors produced by the framed transport.
#[derive(Debug)]
pub enum WireError {
    /// The peer closed the connection.
    ConnectionClosed,
    /// The peer violated the framing or message contract.
    Protocol(String),
    /// The read deadline elapsed before a full frame arrived.
    Timeout,
    /// The slot has no live connection.
    NotConnected,
    /// Underlying socket failure.
    Io(std::io::Error),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::ConnectionClosed => write!(f, "connection closed by peer"),
            WireError::Protocol(what) => write!(f, "protocol error: {what}"),
            WireError::Timeout => write!(f, "read timed out"),
            WireError::NotConnected => write!(f, "player is not connected"),
            WireError::Io(e) => write!(f, "socket error: {e}"),
        }
    }
}

impl std::error::Error for WireError {}

/// Send one framed message, length prefix and body as one logical write.
///
/// `write_all` retries short writes until the whole frame is on the wire.
///
/// # Errors
///
/// Returns a [`WireError`] if the frame cannot be encoded or written.
pub async fn send_msg<W>(stream: &mut W, msg: &Message) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(msg).map_err(|e| WireError::Protocol(e.to_string()))?;
    let len = i32::try_from(body.len())
        .map_err(|_| WireError::Protocol(format!("frame too large: {} bytes", body.len())))?;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    stream.write_all(&frame).await.map_err(WireError::Io)?;
    stream.flush().await.map_err(WireError::Io)?;
    Ok(())
}

/// Wrap `payload` in a `data` message and send it.
///
/// # Errors
///
/// Returns a [`WireError`] if the frame cannot be written.
pub async fn send_data<W>(stream: &mut W, payload: &str) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    send_msg(stream, &Message::data(payload)).await
}

/// Receive one framed message.
///
/// Reads exactly four length bytes, then exactly the body, assembling
/// across short reads. A clean EOF at any point is reported as
/// [`WireError::ConnectionClosed`].
///
/// # Errors
///
/// Returns a [`WireError`] on EOF, socket failure, or a malformed frame.
pub async fn recv_msg<R>(stream: &mut R) -> Result<Message, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    read_full(stream, &mut len_buf).await?;
    let len = i32::from_be_bytes(len_buf);
    let len = usize::try_from(len)
        .map_err(|_| WireError::Protocol(format!("negative frame length {len}")))?;
    let mut body = vec![0u8; len];
    read_full(stream, &mut body).await?;
    serde_json::from_slice(&body).map_err(|e| WireError::Protocol(format!("malformed frame: {e}")))
}

/// Receive one message and require it to be a `data` message.
///
/// # Errors
///
/// Returns a [`WireError`] on transport failure or any other message kind.
pub async fn recv_data<R>(stream: &mut R) -> Result<String, WireError>
where
    R: AsyncRead + Unpin,
{
    recv_msg(stream).await?.into_data()
}

async fn read_full<R>(stream: &mut R, buf: &mut [u8]) -> Result<(), WireError>
where
    R: AsyncRead + Unpin,
{
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(WireError::ConnectionClosed)
        }
        Err(e) => Err(WireError::Io(e)),
    }
}
