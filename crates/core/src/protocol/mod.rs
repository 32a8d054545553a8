//! RTSP protocol text (RFC 2326) as spoken by a Wi-Fi Display sink.
//!
//! The sink is the RTSP *client* of the control connection, but the
//! source also issues requests to it on the same connection, so both
//! directions are handled here:
//!
//! - [`message`]: parses inbound requests and responses.
//! - [`request`]: builds the sink's own requests (OPTIONS, DESCRIBE,
//!   SETUP, PLAY).
//! - [`response`]: builds answers to the source's requests.
//!
//! ## Common header block
//!
//! Every outgoing message carries, right after its first line:
//!
//! ```text
//! Date: Wed, 14 Oct 2026 09:30:00 +0000\r\n
//! User-Agent: stagefright/1.1 (Linux;Android 4.1)\r\n
//! CSeq: 3\r\n
//! ```
//!
//! `CSeq` is left out only when the sequence number of the request being
//! answered could not be determined.
//!
//! ## Wi-Fi Display message names
//!
//! | Message | Direction | RTSP method |
//! |---------|-----------|-------------|
//! | M1 | source → sink | OPTIONS |
//! | M2 | sink → source | OPTIONS |
//! | M3 | source → sink | GET_PARAMETER |
//! | M4 | source → sink | SET_PARAMETER |
//! | M5 | source → sink | SET_PARAMETER (`wfd_trigger_method`) |
//! | M6 | sink → source | SETUP |
//! | M7 | sink → source | PLAY |

pub mod message;
pub mod request;
pub mod response;

use chrono::{DateTime, Utc};

pub use message::{RtspMessage, StartLine};
pub use request::RtspRequest;
pub use response::RtspResponse;

/// Protocol version token expected on every inbound request.
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// Default client identifier sent in the `User-Agent` header.
pub const USER_AGENT: &str = "stagefright/1.1 (Linux;Android 4.1)";

/// Render a timestamp for the `Date` header.
pub fn format_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S %z").to_string()
}

/// Assemble wire text: first line, common header block, message headers,
/// optional `Content-Length` and body.
fn serialize_message(
    first_line: &str,
    cseq: Option<u32>,
    user_agent: &str,
    now: DateTime<Utc>,
    headers: &[(String, String)],
    body: Option<&str>,
) -> String {
    let mut out = format!("{first_line}\r\n");
    out.push_str(&format!("Date: {}\r\n", format_date(now)));
    out.push_str(&format!("User-Agent: {user_agent}\r\n"));
    if let Some(cseq) = cseq {
        out.push_str(&format!("CSeq: {cseq}\r\n"));
    }

    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }

    match body {
        Some(body) => {
            out.push_str(&format!("Content-Length: {}\r\n", body.len()));
            out.push_str("\r\n");
            out.push_str(body);
        }
        None => out.push_str("\r\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_format() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap();
        assert_eq!(format_date(now), "Wed, 14 Oct 2026 09:30:00 +0000");
    }

    #[test]
    fn common_block_order() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap();
        let s = serialize_message("RTSP/1.0 200 OK", Some(4), "ua", now, &[], None);
        assert_eq!(
            s,
            "RTSP/1.0 200 OK\r\nDate: Wed, 14 Oct 2026 09:30:00 +0000\r\nUser-Agent: ua\r\nCSeq: 4\r\n\r\n"
        );
    }
}
