use crate::error::{Result, SinkError};
use crate::protocol::message::attribute;

/// How media travels from the source to the sink.
///
/// Chosen per sink at construction time and sent in the SETUP request's
/// `Transport` header (RFC 2326 §12.39):
///
/// ```text
/// Interleaved:  Transport: RTP/AVP/TCP;interleaved=0-1
/// Udp:          Transport: RTP/AVP/UDP;unicast;client_port=15550
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// RTP/RTCP multiplexed onto the control connection as `$` frames.
    Interleaved,
    /// RTP on a separate UDP port owned by the media receiver.
    #[default]
    Udp,
}

impl TransportMode {
    /// `Transport` header value for the SETUP request.
    pub fn setup_header(&self, client_rtp_port: u16) -> String {
        match self {
            Self::Interleaved => "RTP/AVP/TCP;interleaved=0-1".to_string(),
            Self::Udp => format!("RTP/AVP/UDP;unicast;client_port={client_rtp_port}"),
        }
    }
}

/// The source's RTP/RTCP port pair from `server_port=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerPorts {
    pub rtp: u16,
    pub rtcp: u16,
}

impl ServerPorts {
    /// Parse `N-M` (M must be N+1) or `N` (RTCP implied at N+1).
    ///
    /// ```
    /// use wfd_sink::session::transport::ServerPorts;
    ///
    /// let p = ServerPorts::parse("6000-6001").unwrap();
    /// assert_eq!((p.rtp, p.rtcp), (6000, 6001));
    /// assert!(ServerPorts::parse("6000-6005").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self> {
        let malformed = || SinkError::Malformed(format!("invalid server_port description '{value}'"));

        let (rtp, rtcp) = match value.split_once('-') {
            Some((rtp, rtcp)) => {
                let rtp = parse_port(rtp).ok_or_else(malformed)?;
                let rtcp = parse_port(rtcp).ok_or_else(malformed)?;
                if rtcp != rtp + 1 {
                    return Err(malformed());
                }
                (rtp, rtcp)
            }
            None => {
                let rtp = parse_port(value).ok_or_else(malformed)?;
                (rtp, rtp + 1)
            }
        };

        let ports = ServerPorts {
            rtp: u16::try_from(rtp).map_err(|_| malformed())?,
            rtcp: u16::try_from(rtcp).map_err(|_| malformed())?,
        };

        if ports.rtp & 1 == 1 {
            tracing::warn!(rtp_port = ports.rtp, "source picked an odd numbered RTP port");
        }

        Ok(ports)
    }
}

/// A port in (0, 65535], widened so that `rtp + 1` can be range-checked.
fn parse_port(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let port: u32 = s.parse().ok()?;
    (1..=65535).contains(&port).then_some(port)
}

/// Outcome of transport negotiation on a SETUP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiatedTransport {
    /// Media arrives as `$` frames on the control connection.
    Interleaved,
    /// Media arrives over UDP.
    Udp {
        /// Host the source sends from (`source=`), else the control host.
        source: String,
        /// `None` when the response omitted `server_port`; no RTP link is
        /// established towards the source in that case.
        server_ports: Option<ServerPorts>,
    },
}

/// Validate the `Transport` header of a SETUP response.
///
/// In [`TransportMode::Interleaved`] there is nothing to check. In UDP mode
/// the header is required and `server_port`, when present, must describe a
/// valid adjacent port pair.
pub fn negotiate(
    mode: TransportMode,
    header: Option<&str>,
    control_host: &str,
) -> Result<NegotiatedTransport> {
    if mode == TransportMode::Interleaved {
        return Ok(NegotiatedTransport::Interleaved);
    }

    let header =
        header.ok_or_else(|| SinkError::Malformed("SETUP response missing Transport".into()))?;

    let source = attribute(header, "source")
        .filter(|s| !s.is_empty())
        .unwrap_or(control_host)
        .to_string();

    let server_ports = match attribute(header, "server_port") {
        Some(value) => Some(ServerPorts::parse(value)?),
        None => {
            tracing::info!(transport = header, "no server_port in Transport, not linking to source");
            None
        }
    };

    Ok(NegotiatedTransport::Udp {
        source,
        server_ports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_pair() {
        let p = ServerPorts::parse("6000-6001").unwrap();
        assert_eq!(p, ServerPorts { rtp: 6000, rtcp: 6001 });
    }

    #[test]
    fn non_adjacent_pair_rejected() {
        assert!(matches!(ServerPorts::parse("6000-6005"), Err(SinkError::Malformed(_))));
    }

    // Only the implied RTCP port is checked; the odd-port warning is a
    // tracing event and is not captured here.
    #[test]
    fn single_port_implies_next() {
        let p = ServerPorts::parse("6001").unwrap();
        assert_eq!(p, ServerPorts { rtp: 6001, rtcp: 6002 });
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(ServerPorts::parse("0-1").is_err());
        assert!(ServerPorts::parse("65535-65536").is_err());
        assert!(ServerPorts::parse("65535").is_err());
        assert!(ServerPorts::parse("70000").is_err());
        assert!(ServerPorts::parse("abc").is_err());
        assert!(ServerPorts::parse("").is_err());
    }

    #[test]
    fn interleaved_skips_validation() {
        let n = negotiate(TransportMode::Interleaved, None, "h").unwrap();
        assert_eq!(n, NegotiatedTransport::Interleaved);
        let n = negotiate(TransportMode::Interleaved, Some("server_port=1-9"), "h").unwrap();
        assert_eq!(n, NegotiatedTransport::Interleaved);
    }

    #[test]
    fn udp_requires_header() {
        assert!(matches!(
            negotiate(TransportMode::Udp, None, "h"),
            Err(SinkError::Malformed(_))
        ));
    }

    #[test]
    fn udp_with_ports_and_source() {
        let n = negotiate(
            TransportMode::Udp,
            Some("RTP/AVP/UDP;unicast;client_port=15550;server_port=6000-6001;source=10.0.0.9"),
            "10.0.0.1",
        )
        .unwrap();
        assert_eq!(
            n,
            NegotiatedTransport::Udp {
                source: "10.0.0.9".into(),
                server_ports: Some(ServerPorts { rtp: 6000, rtcp: 6001 }),
            }
        );
    }

    #[test]
    fn udp_without_server_port() {
        let n = negotiate(TransportMode::Udp, Some("RTP/AVP/UDP;unicast;client_port=15550"), "10.0.0.1")
            .unwrap();
        assert_eq!(
            n,
            NegotiatedTransport::Udp {
                source: "10.0.0.1".into(),
                server_ports: None,
            }
        );
    }

    #[test]
    fn udp_bad_server_port() {
        assert!(negotiate(TransportMode::Udp, Some("RTP/AVP/UDP;server_port=6000-6005"), "h").is_err());
    }

    #[test]
    fn setup_headers() {
        assert_eq!(
            TransportMode::Interleaved.setup_header(15550),
            "RTP/AVP/TCP;interleaved=0-1"
        );
        assert_eq!(
            TransportMode::Udp.setup_header(15550),
            "RTP/AVP/UDP;unicast;client_port=15550"
        );
    }
}
