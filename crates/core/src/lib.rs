//! Sink-side RTSP control plane for Wi-Fi Display (Miracast) mirroring.
//!
//! The sink connects to a source's RTSP endpoint, answers its capability
//! queries, and drives SETUP and PLAY once the source triggers them.
//! Media is handed to a [`MediaReceiver`]; decoding is out of scope.
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::mpsc;
//!
//! use wfd_sink::{RtpReceiver, Sink, SinkConfig, Source, TcpControlTransport};
//!
//! let config = SinkConfig::default();
//! let (tx, rx) = mpsc::channel();
//! let media = RtpReceiver::new(config.client_rtp_port);
//! let mut sink = Sink::new(config, TcpControlTransport::new(tx), media);
//!
//! sink.start(Source::HostPort { host: "192.168.49.1".into(), port: 7236 })?;
//! sink.run(&rx, &AtomicBool::new(true))?;
//! # Ok::<(), wfd_sink::SinkError>(())
//! ```

pub mod capability;
pub mod error;
pub mod locator;
pub mod media;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod transport;

pub use error::{Result, SinkError};
pub use media::{MediaReceiver, RtpReceiver};
pub use session::{SinkState, TransportMode};
pub use sink::{Sink, SinkConfig, Source};
pub use transport::{ControlTransport, SessionId, TcpControlTransport, TransportEvent};
