//! Control-connection transport.
//!
//! The sink never touches sockets directly. It talks to a
//! [`ControlTransport`] that opens the RTSP control connection, writes
//! outgoing text, and reports everything that happens on the wire as a
//! [`TransportEvent`]:
//!
//! - **Connected**: the TCP connection to the source is up.
//! - **Error**: the connection failed or was lost.
//! - **Message**: a complete RTSP request or response arrived.
//! - **MalformedMessage**: a framed RTSP message that did not parse.
//! - **BinaryChunk**: a `$`-framed interleaved payload arrived
//!   (RFC 2326 §10.12).
//!
//! [`tcp::TcpControlTransport`] is the production implementation.

pub mod tcp;

use std::fmt;

use crate::error::Result;
use crate::protocol::RtspMessage;

pub use tcp::TcpControlTransport;

/// Opaque handle naming one control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something that happened on a control connection.
#[derive(Debug)]
pub enum TransportEvent {
    Connected {
        session: SessionId,
    },
    Error {
        session: SessionId,
        code: i32,
        detail: String,
    },
    Message {
        session: SessionId,
        message: RtspMessage,
    },
    /// Framed but unparsable. `is_request` is false when the start line
    /// looked like a status line.
    MalformedMessage {
        session: SessionId,
        is_request: bool,
        detail: String,
    },
    BinaryChunk {
        session: SessionId,
        channel: u8,
        data: Vec<u8>,
    },
}

impl TransportEvent {
    /// The connection this event belongs to.
    pub fn session(&self) -> SessionId {
        match self {
            Self::Connected { session }
            | Self::Error { session, .. }
            | Self::Message { session, .. }
            | Self::MalformedMessage { session, .. }
            | Self::BinaryChunk { session, .. } => *session,
        }
    }
}

/// Transport collaborator used by [`Sink`](crate::Sink).
///
/// `create_connection` returns immediately; the outcome arrives later as
/// a [`TransportEvent::Connected`] or [`TransportEvent::Error`].
pub trait ControlTransport {
    /// Begin connecting to `host:port` and return the new connection's handle.
    fn create_connection(&mut self, host: &str, port: u16) -> Result<SessionId>;

    /// Write raw bytes to the connection.
    fn send(&mut self, session: SessionId, data: &[u8]) -> Result<()>;

    /// Tear the connection down. Unknown handles are ignored.
    fn close(&mut self, session: SessionId);
}
