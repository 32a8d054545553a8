//! Media receiving side of the sink.
//!
//! The control plane only needs two things from the media path: a local
//! RTP port to advertise in SETUP, and somewhere to hand interleaved
//! `$` frames. Both are behind the [`MediaReceiver`] trait.
//!
//! [`RtpReceiver`] is the bundled implementation. It reads RTP over UDP
//! (or accepts injected interleaved packets) and keeps reception counters.
//! Decoding and rendering are left to whatever consumes the packets.

pub mod rtp;

use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Result;
use crate::session::TransportMode;
use rtp::RtpHeader;

/// Media collaborator used by [`Sink`](crate::Sink).
pub trait MediaReceiver {
    /// Get ready to receive in `mode`. Called before the capability reply
    /// and again before SETUP, so it must be idempotent.
    fn init(&mut self, mode: TransportMode) -> Result<()>;

    /// Local UDP port for `client_port=` in the SETUP request.
    fn rtp_port(&self) -> u16;

    /// Hand over one interleaved packet. `is_rtp` is false for RTCP.
    fn inject(&mut self, is_rtp: bool, data: &[u8]);
}

/// Reception counters for one RTP stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub rtp_packets: u64,
    pub rtp_bytes: u64,
    pub rtcp_packets: u64,
    pub rtcp_bytes: u64,
    /// Packets that did not parse as RTP.
    pub malformed: u64,
    /// Packets missing from sequence-number gaps.
    pub lost: u64,
    pub last_sequence: Option<u16>,
    pub ssrc: Option<u32>,
}

impl ReceiverStats {
    fn record_rtp(&mut self, data: &[u8]) {
        let Some(header) = RtpHeader::parse(data) else {
            self.malformed += 1;
            tracing::trace!(len = data.len(), "dropping malformed RTP packet");
            return;
        };

        if self.ssrc != Some(header.ssrc) {
            if self.ssrc.is_some() {
                tracing::info!(
                    ssrc = format_args!("{:#010X}", header.ssrc),
                    "RTP source changed, resetting sequence tracking"
                );
            }
            self.ssrc = Some(header.ssrc);
            self.last_sequence = None;
        }

        if let Some(last) = self.last_sequence {
            let gap = header.sequence.wrapping_sub(last.wrapping_add(1));
            // Anything "behind" the last packet is a reorder or duplicate.
            if gap >= 0x8000 {
                self.count_rtp(data.len());
                return;
            }
            if gap != 0 {
                self.lost += u64::from(gap);
                tracing::debug!(expected = last.wrapping_add(1), got = header.sequence, gap, "RTP gap");
            }
        }

        self.last_sequence = Some(header.sequence);
        self.count_rtp(data.len());
        tracing::trace!(
            seq = header.sequence,
            pt = header.payload_type,
            payload = header.payload_len,
            "RTP packet"
        );
    }

    fn count_rtp(&mut self, len: usize) {
        self.rtp_packets += 1;
        self.rtp_bytes += len as u64;
    }

    fn record_rtcp(&mut self, data: &[u8]) {
        self.rtcp_packets += 1;
        self.rtcp_bytes += data.len() as u64;
    }
}

/// RTP receiver over UDP or interleaved TCP.
///
/// In UDP mode, [`init`](MediaReceiver::init) binds a socket on the
/// configured port (0 picks an ephemeral one) and starts a reader thread.
/// The thread stops when the receiver is dropped.
pub struct RtpReceiver {
    port: u16,
    socket: Option<Arc<UdpSocket>>,
    stats: Arc<Mutex<ReceiverStats>>,
    running: Arc<AtomicBool>,
}

impl RtpReceiver {
    pub fn new(port: u16) -> Self {
        RtpReceiver {
            port,
            socket: None,
            stats: Arc::new(Mutex::new(ReceiverStats::default())),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of the reception counters.
    pub fn stats(&self) -> ReceiverStats {
        self.stats.lock().clone()
    }

    fn bind(&mut self) -> Result<()> {
        let socket = UdpSocket::bind(("0.0.0.0", self.port))?;
        socket.set_read_timeout(Some(Duration::from_millis(50)))?;
        self.port = socket.local_addr()?.port();

        let socket = Arc::new(socket);
        self.socket = Some(socket.clone());
        self.running.store(true, Ordering::SeqCst);

        let stats = self.stats.clone();
        let running = self.running.clone();
        let port = self.port;
        thread::spawn(move || {
            let mut buf = vec![0u8; 65536];
            while running.load(Ordering::SeqCst) {
                match socket.recv_from(&mut buf) {
                    Ok((n, _)) => stats.lock().record_rtp(&buf[..n]),
                    Err(ref e)
                        if matches!(
                            e.kind(),
                            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                        ) => {}
                    Err(e) => {
                        tracing::warn!(port, error = %e, "RTP socket error");
                        break;
                    }
                }
            }
            tracing::debug!(port, "RTP reader exited");
        });

        tracing::info!(port = self.port, "RTP receiver listening");
        Ok(())
    }
}

impl MediaReceiver for RtpReceiver {
    fn init(&mut self, mode: TransportMode) -> Result<()> {
        match mode {
            TransportMode::Udp if self.socket.is_none() => self.bind(),
            _ => Ok(()),
        }
    }

    fn rtp_port(&self) -> u16 {
        self.port
    }

    fn inject(&mut self, is_rtp: bool, data: &[u8]) {
        let mut stats = self.stats.lock();
        if is_rtp {
            stats.record_rtp(data);
        } else {
            stats.record_rtcp(data);
        }
    }
}

impl Drop for RtpReceiver {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
