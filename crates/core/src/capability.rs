//! Wi-Fi Display capability negotiation (`text/parameters` bodies).
//!
//! The source queries the sink's capabilities with GET_PARAMETER (M3) and
//! then pushes the chosen configuration with SET_PARAMETER (M4). A later
//! SET_PARAMETER (M5) carries `wfd_trigger_method` to ask the sink to
//! SETUP, PLAY, PAUSE or TEARDOWN.
//!
//! Parameter bodies are `key: value` lines terminated by CRLF:
//!
//! ```text
//! wfd_video_formats: 00 00 02 10 0001FFFF 1FFFFFFF 00000FFF 00 0000 0000 00 none none\r\n
//! wfd_audio_codecs: LPCM 00000002 00\r\n
//! wfd_presentation_URL: rtsp://192.168.49.1/wfd1.0/streamid=0 none\r\n
//! wfd_client_rtp_ports: RTP/AVP/UDP;unicast 15550 0 mode=play\r\n
//! ```

use std::fmt;

use crate::locator::SCHEME;

/// Parameter carrying the presentation URL in M4.
pub const PRESENTATION_URL: &str = "wfd_presentation_URL";

/// Parameter carrying the trigger in M5.
pub const TRIGGER_METHOD: &str = "wfd_trigger_method";

/// Default receive port advertised in `wfd_client_rtp_ports`.
pub const DEFAULT_CLIENT_RTP_PORT: u16 = 15550;

/// The sink's advertised capabilities.
///
/// Only the receive port is configurable; everything else is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    pub video_formats: &'static str,
    pub audio_codecs: &'static str,
    pub client_rtp_port: u16,
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_RTP_PORT)
    }
}

impl CapabilitySet {
    pub fn new(client_rtp_port: u16) -> Self {
        CapabilitySet {
            video_formats: "48 00 02 02 0001DEFF 157C7FFF 00000FFF 00 0000 0000 00 none none",
            audio_codecs: "LPCM 00000003 00",
            client_rtp_port,
        }
    }

    /// Body returned in the M3 response.
    pub fn advertise(&self) -> String {
        let mut body = String::new();
        body.push_str(&format!("wfd_video_formats: {}\r\n", self.video_formats));
        body.push_str(&format!("wfd_audio_codecs: {}\r\n", self.audio_codecs));
        body.push_str("wfd_content_protection: none\r\n");
        body.push_str("wfd_coupled_sink: 00 none\r\n");
        body.push_str("wfd_uibc_capability: none\r\n");
        body.push_str("wfd_standby_resume_capability: none\r\n");
        body.push_str("wfd_lg_dlna_uuid: none\r\n");
        body.push_str(&format!(
            "wfd_client_rtp_ports: RTP/AVP/UDP;unicast {} 0 mode=play\r\n",
            self.client_rtp_port
        ));
        body
    }
}

/// Iterator over the `key: value` lines of a parameter body.
///
/// Splits on CRLF, so a value may itself contain `:` or a bare `\n`. The
/// final line does not need a terminator. Blank lines and lines without
/// a colon are skipped.
pub struct ParameterLines<'a> {
    rest: Option<&'a str>,
}

impl<'a> Iterator for ParameterLines<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.rest?;
            let line = match rest.split_once("\r\n") {
                Some((line, tail)) => {
                    self.rest = Some(tail);
                    line
                }
                None => {
                    self.rest = None;
                    rest
                }
            };
            if let Some((key, value)) = line.split_once(':') {
                return Some((key.trim(), value.trim()));
            }
        }
    }
}

pub fn parameters(body: &str) -> ParameterLines<'_> {
    ParameterLines { rest: Some(body) }
}

/// Extract the presentation authority (`host[:port]`) from an M4 body.
///
/// Returns the first `wfd_presentation_URL` whose value starts with
/// `rtsp://`. `None` means the caller keeps whatever it had before.
///
/// ```
/// use wfd_sink::capability::presentation_host;
///
/// let body = "wfd_presentation_URL: rtsp://192.168.49.1/wfd1.0/streamid=0 none\r\n";
/// assert_eq!(presentation_host(body).as_deref(), Some("192.168.49.1"));
/// ```
pub fn presentation_host(body: &str) -> Option<String> {
    parameters(body)
        .filter(|(key, _)| key.eq_ignore_ascii_case(PRESENTATION_URL))
        .find_map(|(_, value)| {
            let prefix = value.get(..SCHEME.len())?;
            if !prefix.eq_ignore_ascii_case(SCHEME) {
                return None;
            }
            let rest = &value[SCHEME.len()..];
            let end = rest
                .find(|c: char| c == '/' || c.is_whitespace())
                .unwrap_or(rest.len());
            let authority = &rest[..end];
            (!authority.is_empty()).then(|| authority.to_string())
        })
}

/// Action requested by `wfd_trigger_method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMethod {
    Setup,
    Play,
    Pause,
    Teardown,
}

impl TriggerMethod {
    fn from_value(value: &str) -> Option<Self> {
        match value {
            "SETUP" => Some(Self::Setup),
            "PLAY" => Some(Self::Play),
            "PAUSE" => Some(Self::Pause),
            "TEARDOWN" => Some(Self::Teardown),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Teardown => "TEARDOWN",
        };
        f.write_str(s)
    }
}

/// The trigger directive of an M5 body, if any.
pub fn trigger_method(body: &str) -> Option<TriggerMethod> {
    parameters(body)
        .find(|(key, _)| key.eq_ignore_ascii_case(TRIGGER_METHOD))
        .and_then(|(_, value)| TriggerMethod::from_value(value))
}
