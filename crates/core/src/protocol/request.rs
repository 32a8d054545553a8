use chrono::{DateTime, Utc};

use super::{RTSP_VERSION, serialize_message};

/// An outgoing RTSP request issued by the sink (RFC 2326 §6).
///
/// ```text
/// SETUP rtsp://192.168.49.1/wfd1.0/streamid=0 RTSP/1.0\r\n
/// Date: Wed, 14 Oct 2026 09:30:00 +0000\r\n
/// User-Agent: stagefright/1.1 (Linux;Android 4.1)\r\n
/// CSeq: 3\r\n
/// Transport: RTP/AVP/UDP;unicast;client_port=15550\r\n
/// \r\n
/// ```
///
/// Built the same way as [`RtspResponse`](super::RtspResponse): chain
/// [`add_header`](Self::add_header), then [`serialize`](Self::serialize).
#[must_use]
#[derive(Debug, Clone)]
pub struct RtspRequest {
    pub method: String,
    pub uri: String,
    pub cseq: u32,
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    pub fn new(method: &str, uri: &str, cseq: u32) -> Self {
        RtspRequest {
            method: method.to_string(),
            uri: uri.to_string(),
            cseq,
            headers: Vec::new(),
        }
    }

    /// M2: `OPTIONS *` probing for Wi-Fi Display support.
    pub fn options(cseq: u32) -> Self {
        Self::new("OPTIONS", "*", cseq).add_header("Require", "org.wfa.wfd1.0")
    }

    pub fn describe(uri: &str, cseq: u32) -> Self {
        Self::new("DESCRIBE", uri, cseq).add_header("Accept", "application/sdp")
    }

    /// M6: SETUP carrying the sink's `Transport` request.
    pub fn setup(uri: &str, cseq: u32, transport: &str) -> Self {
        Self::new("SETUP", uri, cseq).add_header("Transport", transport)
    }

    /// M7: PLAY for the negotiated playback session.
    pub fn play(uri: &str, cseq: u32, session: &str) -> Self {
        Self::new("PLAY", uri, cseq).add_header("Session", session)
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Serialize with the current time in the `Date` header.
    pub fn serialize(&self, user_agent: &str) -> String {
        self.serialize_at(user_agent, Utc::now())
    }

    /// Serialize with an explicit `Date`.
    pub fn serialize_at(&self, user_agent: &str, now: DateTime<Utc>) -> String {
        serialize_message(
            &format!("{} {} {}", self.method, self.uri, RTSP_VERSION),
            Some(self.cseq),
            user_agent,
            now,
            &self.headers,
            None,
        )
    }
}
