//! Error types for the Wi-Fi Display sink library.

use std::fmt;

use crate::transport::SessionId;

/// Errors that can occur while driving a sink session.
///
/// Variants map to the layer that detected the failure:
///
/// - **Startup**: [`MalformedLocator`](Self::MalformedLocator),
///   [`CredentialsUnsupported`](Self::CredentialsUnsupported),
///   [`AlreadyStarted`](Self::AlreadyStarted).
/// - **Exchange**: [`Malformed`](Self::Malformed),
///   [`Unsupported`](Self::Unsupported), [`Timeout`](Self::Timeout). Each
///   of these ends the session that produced it.
/// - **Transport**: [`Io`](Self::Io), [`Transport`](Self::Transport).
/// - **Parser**: [`Parse`](Self::Parse) for inbound wire text.
/// - **Invariant**: [`DuplicateKey`](Self::DuplicateKey) signals a bug in
///   sequence-number bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The control locator did not have the form `rtsp://[user[:pass]@]host[:port][/path]`.
    #[error("malformed locator: {0}")]
    MalformedLocator(String),

    /// The control locator carried a user name or password.
    #[error("credentials in the control locator are not supported")]
    CredentialsUnsupported,

    /// A response or transport description lacked a required field.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// An exchange expecting `200 OK` got a different status.
    #[error("unsupported response status {status}")]
    Unsupported { status: u16 },

    /// A continuation was already registered for this (session, CSeq) pair.
    #[error("duplicate pending request for session {session}, cseq {cseq}")]
    DuplicateKey { session: SessionId, cseq: u32 },

    /// The transport reported a fatal error on the control connection.
    #[error("transport error on session {session} ({code}): {detail}")]
    Transport {
        session: SessionId,
        code: i32,
        detail: String,
    },

    /// Failed to parse an inbound RTSP message.
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// No response arrived for a pending request before the deadline.
    #[error("{exchange} request (cseq {cseq}) timed out")]
    Timeout { exchange: &'static str, cseq: u32 },

    /// An operation needed an active control connection and there was none.
    #[error("sink not started")]
    NotStarted,

    /// [`Sink::start`](crate::Sink::start) was called on a sink that already has a session.
    #[error("sink already started")]
    AlreadyStarted,
}

/// Specific kind of RTSP parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input was empty (no start line).
    EmptyMessage,
    /// Start line was neither `Method URI Version` nor `Version Status Reason`.
    InvalidStartLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// The header block or body was not valid UTF-8.
    InvalidEncoding,
    /// `Content-Length` was present but not a decimal integer.
    InvalidContentLength,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::InvalidStartLine => write!(f, "invalid start line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::InvalidEncoding => write!(f, "invalid encoding"),
            Self::InvalidContentLength => write!(f, "invalid content length"),
        }
    }
}

/// Convenience alias for `Result<T, SinkError>`.
pub type Result<T> = std::result::Result<T, SinkError>;
