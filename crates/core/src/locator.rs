//! Control-connection locator parsing.
//!
//! A locator names the RTSP control endpoint of the source:
//!
//! ```text
//! rtsp://[user[:pass]@]host[:port][/path]
//! ```
//!
//! The port defaults to 554 (RFC 2326 §3.2) and the path to `/`.

use crate::error::{Result, SinkError};

/// URL scheme of the control protocol, compared case-insensitively.
pub const SCHEME: &str = "rtsp://";

/// Default RTSP port (RFC 2326 §3.2).
pub const DEFAULT_PORT: u16 = 554;

/// A parsed control-connection locator.
///
/// All fields are populated; absent parts are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub user: String,
    pub pass: String,
}

impl Locator {
    /// Parse a locator string.
    ///
    /// ```
    /// use wfd_sink::locator::Locator;
    ///
    /// let loc = Locator::parse("rtsp://u:p@h:1234/x").unwrap();
    /// assert_eq!((loc.host.as_str(), loc.port, loc.path.as_str()), ("h", 1234, "/x"));
    /// assert_eq!((loc.user.as_str(), loc.pass.as_str()), ("u", "p"));
    ///
    /// assert!(Locator::parse("http://h/").is_err());
    /// ```
    pub fn parse(url: &str) -> Result<Self> {
        let rest = match url.get(..SCHEME.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(SCHEME) => &url[SCHEME.len()..],
            _ => return Err(SinkError::MalformedLocator(url.to_string())),
        };

        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, "/"),
        };

        let (credentials, host_port) = match authority.rfind('@') {
            Some(pos) => (Some(&authority[..pos]), &authority[pos + 1..]),
            None => (None, authority),
        };

        let (user, pass) = match credentials {
            Some(userpass) => match userpass.split_once(':') {
                Some((user, pass)) => (user, pass),
                None => (userpass, ""),
            },
            None => ("", ""),
        };

        let (host, port) = match host_port.split_once(':') {
            Some((host, port)) => {
                let port = parse_port(port)
                    .ok_or_else(|| SinkError::MalformedLocator(url.to_string()))?;
                (host, port)
            }
            None => (host_port, DEFAULT_PORT),
        };

        Ok(Locator {
            host: host.to_string(),
            port,
            path: path.to_string(),
            user: user.to_string(),
            pass: pass.to_string(),
        })
    }

    /// Whether the locator carried a user name or password.
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() || !self.pass.is_empty()
    }
}

/// Strict decimal port: digits only, no sign, no surrounding whitespace.
fn parse_port(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_defaults() {
        let loc = Locator::parse("rtsp://host").unwrap();
        assert_eq!(
            loc,
            Locator {
                host: "host".into(),
                port: 554,
                path: "/".into(),
                user: String::new(),
                pass: String::new(),
            }
        );
    }

    #[test]
    fn full_locator() {
        let loc = Locator::parse("rtsp://u:p@h:1234/x").unwrap();
        assert_eq!(loc.host, "h");
        assert_eq!(loc.port, 1234);
        assert_eq!(loc.path, "/x");
        assert_eq!(loc.user, "u");
        assert_eq!(loc.pass, "p");
        assert!(loc.has_credentials());
    }

    #[test]
    fn user_without_password() {
        let loc = Locator::parse("rtsp://admin@10.0.0.1/live").unwrap();
        assert_eq!(loc.user, "admin");
        assert_eq!(loc.pass, "");
        assert_eq!(loc.host, "10.0.0.1");
    }

    #[test]
    fn credentials_split_at_last_at_sign() {
        let loc = Locator::parse("rtsp://a@b:c@h:8554").unwrap();
        assert_eq!(loc.user, "a@b");
        assert_eq!(loc.pass, "c");
        assert_eq!(loc.host, "h");
        assert_eq!(loc.port, 8554);
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let loc = Locator::parse("RTSP://Host:7236/wfd1.0").unwrap();
        assert_eq!(loc.host, "Host");
        assert_eq!(loc.port, 7236);
        assert_eq!(loc.path, "/wfd1.0");
    }

    #[test]
    fn port_out_of_range() {
        assert!(matches!(
            Locator::parse("rtsp://h:99999/"),
            Err(SinkError::MalformedLocator(_))
        ));
    }

    #[test]
    fn port_must_be_decimal() {
        assert!(Locator::parse("rtsp://h:/").is_err());
        assert!(Locator::parse("rtsp://h:12ab/").is_err());
        assert!(Locator::parse("rtsp://h:+80/").is_err());
    }

    #[test]
    fn wrong_scheme_rejected() {
        assert!(Locator::parse("http://host/").is_err());
        assert!(Locator::parse("rtsp:/host").is_err());
        assert!(Locator::parse("").is_err());
    }

    #[test]
    fn path_keeps_colons_and_at_signs() {
        let loc = Locator::parse("rtsp://h/a:b@c").unwrap();
        assert_eq!(loc.host, "h");
        assert_eq!(loc.port, 554);
        assert_eq!(loc.path, "/a:b@c");
        assert!(!loc.has_credentials());
    }
}
