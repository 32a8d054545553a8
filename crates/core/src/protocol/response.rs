use chrono::{DateTime, Utc};

use super::{RTSP_VERSION, serialize_message};

/// An RTSP response sent by the sink to a request issued by the source
/// (RFC 2326 §7).
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// Date: Wed, 14 Oct 2026 09:30:00 +0000\r\n
/// User-Agent: stagefright/1.1 (Linux;Android 4.1)\r\n
/// CSeq: 1\r\n
/// Public: org.wfa.wfd1.0, GET_PARAMETER, SET_PARAMETER\r\n
/// \r\n
/// ```
///
/// Uses a builder pattern: chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then call [`serialize`](Self::serialize).
/// `Content-Length` is computed automatically when a body is present.
#[must_use]
#[derive(Debug, Clone)]
pub struct RtspResponse {
    pub status_code: u16,
    pub status_text: String,
    /// Echoed CSeq. `None` only when the request's CSeq was unreadable.
    pub cseq: Option<u32>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RtspResponse {
    pub fn new(status_code: u16, status_text: &str, cseq: Option<u32>) -> Self {
        RtspResponse {
            status_code,
            status_text: status_text.to_string(),
            cseq,
            headers: Vec::new(),
            body: None,
        }
    }

    /// 200 OK.
    pub fn ok(cseq: u32) -> Self {
        Self::new(200, "OK", Some(cseq))
    }

    /// 400 Bad Request, used when the request's CSeq could not be read.
    pub fn bad_request() -> Self {
        Self::new(400, "Bad Request", None)
    }

    /// 405 Method Not Allowed.
    pub fn method_not_allowed(cseq: u32) -> Self {
        Self::new(405, "Method Not Allowed", Some(cseq))
    }

    /// 505 RTSP Version not supported.
    pub fn version_not_supported(cseq: u32) -> Self {
        Self::new(505, "RTSP Version not supported", Some(cseq))
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize with the current time in the `Date` header.
    pub fn serialize(&self, user_agent: &str) -> String {
        self.serialize_at(user_agent, Utc::now())
    }

    pub fn serialize_at(&self, user_agent: &str, now: DateTime<Utc>) -> String {
        serialize_message(
            &format!("{} {} {}", RTSP_VERSION, self.status_code, self.status_text),
            self.cseq,
            user_agent,
            now,
            &self.headers,
            self.body.as_deref(),
        )
    }
}
