use std::borrow::Cow;

use crate::error::{ParseErrorKind, Result, SinkError};

/// First line of an inbound RTSP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    /// `Method SP Request-URI SP RTSP-Version` (RFC 2326 §6.1).
    Request {
        method: String,
        uri: String,
        version: String,
    },
    /// `RTSP-Version SP Status-Code SP Reason-Phrase` (RFC 2326 §7.1).
    ///
    /// `status` is `None` when the second token is not a number.
    Response {
        version: String,
        status: Option<u16>,
        reason: String,
    },
}

/// A parsed inbound RTSP message, either a request issued by the source
/// or a response to one of the sink's own requests.
///
/// Header lookup is case-insensitive per RFC 2326 §4.2.
#[derive(Debug, Clone)]
pub struct RtspMessage {
    pub start: StartLine,
    /// Headers as ordered (name, value) pairs, names stored as received.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RtspMessage {
    /// Parse one complete message: start line, headers, blank line, body.
    ///
    /// Everything after the blank line is taken as the body; framing by
    /// `Content-Length` is the transport's job.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = split_head(raw);
        let head = std::str::from_utf8(head).map_err(|_| SinkError::Parse {
            kind: ParseErrorKind::InvalidEncoding,
        })?;

        let mut lines = head.lines();
        let start_line = lines
            .next()
            .filter(|l| !l.trim().is_empty())
            .ok_or(SinkError::Parse {
                kind: ParseErrorKind::EmptyMessage,
            })?;

        let start = parse_start_line(start_line)?;

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or(SinkError::Parse {
                kind: ParseErrorKind::InvalidHeader,
            })?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        Ok(RtspMessage {
            start,
            headers,
            body: body.to_vec(),
        })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.start, StartLine::Response { .. })
    }

    /// Status code of a response; `None` for requests or a non-numeric status.
    pub fn status_code(&self) -> Option<u16> {
        match &self.start {
            StartLine::Response { status, .. } => *status,
            StartLine::Request { .. } => None,
        }
    }

    /// Request method, or `None` for a response.
    pub fn method(&self) -> Option<&str> {
        match &self.start {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    pub fn uri(&self) -> Option<&str> {
        match &self.start {
            StartLine::Request { uri, .. } => Some(uri),
            StartLine::Response { .. } => None,
        }
    }

    /// Protocol version token from the start line.
    pub fn version(&self) -> &str {
        match &self.start {
            StartLine::Request { version, .. } | StartLine::Response { version, .. } => version,
        }
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The CSeq header (RFC 2326 §12.17), if present and numeric.
    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq").and_then(|v| v.parse().ok())
    }

    /// Body as text. Parameter bodies are ASCII; anything else is replaced lossily.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(pos) = find(raw, b"\r\n\r\n") {
        return (&raw[..pos + 2], &raw[pos + 4..]);
    }
    if let Some(pos) = find(raw, b"\n\n") {
        return (&raw[..pos + 1], &raw[pos + 2..]);
    }
    (raw, &[])
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_start_line(line: &str) -> Result<StartLine> {
    let invalid = || SinkError::Parse {
        kind: ParseErrorKind::InvalidStartLine,
    };

    if line.starts_with("RTSP/") {
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().ok_or_else(invalid)?.to_string();
        let status = parts.next().and_then(|s| s.trim().parse().ok());
        let reason = parts.next().unwrap_or("").trim().to_string();
        return Ok(StartLine::Response {
            version,
            status,
            reason,
        });
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [method, uri, version] => Ok(StartLine::Request {
            method: method.to_string(),
            uri: uri.to_string(),
            version: version.to_string(),
        }),
        _ => Err(invalid()),
    }
}

/// Look up `name` among the `;`-separated parameters of a header value.
///
/// Works for `Transport` (`RTP/AVP/UDP;unicast;server_port=6000-6001`) and
/// for `Session` (`abc123;timeout=60`). Names compare case-insensitively.
/// A parameter given without `=` yields an empty value.
///
/// ```
/// use wfd_sink::protocol::message::attribute;
///
/// assert_eq!(attribute("abc123;timeout=60", "timeout"), Some("60"));
/// assert_eq!(attribute("RTP/AVP;unicast", "unicast"), Some(""));
/// assert_eq!(attribute("RTP/AVP;unicast", "source"), None);
/// ```
pub fn attribute<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    value.split(';').find_map(|param| {
        let param = param.trim();
        let (key, val) = param.split_once('=').unwrap_or((param, ""));
        key.trim()
            .eq_ignore_ascii_case(name)
            .then_some(val.trim())
    })
}

/// Like [`attribute`], parsed as a signed integer.
pub fn int_attribute(value: &str, name: &str) -> Option<i32> {
    attribute(value, name).and_then(|v| v.parse().ok())
}
