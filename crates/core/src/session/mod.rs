//! Sink-side session bookkeeping.
//!
//! A sink owns at most one control connection at a time. Over that
//! connection it negotiates a playback session:
//!
//! ```text
//! start              -> Connecting
//! TCP connected      -> Connected
//! SETUP 200 (M6)     -> Paused
//! PLAY 200 (M7)      -> Playing
//! error / stop       -> Stopped      (from any state)
//! ```
//!
//! - [`registry`]: requests waiting for a response, keyed by CSeq.
//! - [`transport`]: `Transport` header negotiation on SETUP.

pub mod registry;
pub mod transport;

use crate::protocol::message::int_attribute;
use crate::transport::SessionId;

pub use registry::{Exchange, PendingRequests};
pub use transport::{NegotiatedTransport, ServerPorts, TransportMode};

/// Lifecycle of the sink's control session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Not started.
    Undefined,
    /// Control connection requested, not yet established.
    Connecting,
    /// Control connection up; capability negotiation in progress.
    Connected,
    /// SETUP succeeded, PLAY outstanding.
    Paused,
    /// Media is flowing.
    Playing,
    /// Torn down by an error or a stop request.
    Stopped,
}

/// The control connection to the source.
#[derive(Debug)]
pub struct ControlSession {
    pub id: SessionId,
    /// Host the control connection was opened to.
    pub host: String,
    next_cseq: u32,
}

impl ControlSession {
    pub fn new(id: SessionId, host: &str) -> Self {
        ControlSession {
            id,
            host: host.to_string(),
            next_cseq: 1,
        }
    }

    /// CSeq the next outgoing request will carry.
    pub fn next_cseq(&self) -> u32 {
        self.next_cseq
    }

    /// Consume the current CSeq after a successful send.
    pub fn advance_cseq(&mut self) {
        self.next_cseq += 1;
    }
}

/// Playback session negotiated by SETUP (RFC 2326 §12.37).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSession {
    /// Session token with any `;option` suffix stripped.
    pub id: String,
    /// `timeout=` from the `Session` header, `None` when absent.
    pub timeout_secs: Option<i32>,
}

impl PlaybackSession {
    /// Build from a `Session` header value such as `abc123;timeout=60`.
    pub fn from_header(value: &str) -> Self {
        let id = value.split(';').next().unwrap_or(value).trim().to_string();
        PlaybackSession {
            id,
            timeout_secs: int_attribute(value, "timeout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_header_with_timeout() {
        let p = PlaybackSession::from_header("abc123;timeout=60");
        assert_eq!(p.id, "abc123");
        assert_eq!(p.timeout_secs, Some(60));
    }

    #[test]
    fn session_header_without_timeout() {
        let p = PlaybackSession::from_header("DEADBEEF");
        assert_eq!(p.id, "DEADBEEF");
        assert_eq!(p.timeout_secs, None);
    }

    #[test]
    fn cseq_strictly_increasing() {
        let mut c = ControlSession::new(SessionId(1), "h");
        let mut seen = Vec::new();
        for _ in 0..100 {
            seen.push(c.next_cseq());
            c.advance_cseq();
        }
        assert_eq!(seen[0], 1);
        assert!(seen.windows(2).all(|w| w[1] > w[0]));
    }
}
