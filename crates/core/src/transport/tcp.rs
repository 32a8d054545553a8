use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::{ControlTransport, SessionId, TransportEvent};
use crate::error::{ParseErrorKind, Result, SinkError};
use crate::protocol::RtspMessage;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single RTSP body; parameter bodies are a few hundred bytes.
const MAX_BODY_LEN: usize = 1 << 20;

type Writers = Arc<Mutex<HashMap<SessionId, TcpStream>>>;

/// RTSP control connections over TCP, one reader thread per connection.
///
/// Every event is sent on the channel given at construction. The reader
/// thread frames the inbound byte stream into RTSP messages and
/// interleaved `$` chunks (RFC 2326 §10.12).
pub struct TcpControlTransport {
    events: Sender<TransportEvent>,
    writers: Writers,
    next_id: u32,
}

impl TcpControlTransport {
    pub fn new(events: Sender<TransportEvent>) -> Self {
        TcpControlTransport {
            events,
            writers: Arc::new(Mutex::new(HashMap::new())),
            next_id: 0,
        }
    }
}

impl ControlTransport for TcpControlTransport {
    fn create_connection(&mut self, host: &str, port: u16) -> Result<SessionId> {
        self.next_id += 1;
        let session = SessionId(self.next_id);

        let host = host.to_string();
        let writers = self.writers.clone();
        let events = self.events.clone();
        thread::Builder::new()
            .name(format!("rtsp-control-{session}"))
            .spawn(move || Connection::handle(session, &host, port, writers, events))?;

        Ok(session)
    }

    fn send(&mut self, session: SessionId, data: &[u8]) -> Result<()> {
        let mut writers = self.writers.lock();
        let stream = writers.get_mut(&session).ok_or(SinkError::NotStarted)?;
        stream.write_all(data)?;
        stream.flush()?;
        tracing::trace!(%session, bytes = data.len(), "sent");
        Ok(())
    }

    fn close(&mut self, session: SessionId) {
        if let Some(stream) = self.writers.lock().remove(&session) {
            let _ = stream.shutdown(Shutdown::Both);
            tracing::debug!(%session, "control connection closed");
        }
    }
}

/// One framed unit read from the control connection.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// Header block plus `Content-Length` bytes of body.
    Message(Vec<u8>),
    /// `$` channel length payload.
    Binary { channel: u8, data: Vec<u8> },
}

/// Read the next frame. `Ok(None)` means the peer closed the connection
/// between frames.
pub fn read_frame<R: BufRead>(reader: &mut R) -> io::Result<Option<Frame>> {
    // Skip stray line endings between messages.
    loop {
        let first = reader.fill_buf()?.first().copied();
        match first {
            None => return Ok(None),
            Some(b'\r' | b'\n') => reader.consume(1),
            Some(_) => break,
        }
    }

    if reader.fill_buf()?.first() == Some(&b'$') {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header)?;
        let len = u16::from_be_bytes([header[2], header[3]]) as usize;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        return Ok(Some(Frame::Binary {
            channel: header[1],
            data,
        }));
    }

    let mut head = Vec::new();
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-message",
            ));
        }
        head.extend_from_slice(&line);
        if line == b"\r\n" || line == b"\n" {
            break;
        }
    }

    let len = content_length(&head)?;
    if len > 0 {
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body)?;
        head.extend_from_slice(&body);
    }
    Ok(Some(Frame::Message(head)))
}

fn content_length(head: &[u8]) -> io::Result<usize> {
    let text = String::from_utf8_lossy(head);
    let Some(value) = text.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("Content-Length")
            .then(|| value.trim().to_string())
    }) else {
        return Ok(0);
    };

    let len: usize = value.parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            SinkError::Parse {
                kind: ParseErrorKind::InvalidContentLength,
            },
        )
    })?;
    if len > MAX_BODY_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "body too large"));
    }
    Ok(len)
}

fn error_code(e: &io::Error) -> i32 {
    e.raw_os_error().map(|c| -c).unwrap_or(-1)
}

/// Reader side of one control connection.
struct Connection {
    session: SessionId,
    reader: BufReader<TcpStream>,
    writers: Writers,
    events: Sender<TransportEvent>,
}

impl Connection {
    /// Thread entry point: connect, announce, then pump frames until EOF.
    fn handle(
        session: SessionId,
        host: &str,
        port: u16,
        writers: Writers,
        events: Sender<TransportEvent>,
    ) {
        let stream = match connect(host, port).and_then(|s| Ok((s.try_clone()?, s))) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(%session, host, port, error = %e, "connect failed");
                let _ = events.send(TransportEvent::Error {
                    session,
                    code: error_code(&e),
                    detail: format!("connect to {host}:{port} failed: {e}"),
                });
                return;
            }
        };
        let (reader_stream, writer_stream) = stream;

        writers.lock().insert(session, writer_stream);
        tracing::info!(%session, host, port, "control connection established");
        if events.send(TransportEvent::Connected { session }).is_err() {
            return;
        }

        let mut conn = Connection {
            session,
            reader: BufReader::new(reader_stream),
            writers,
            events,
        };
        let (code, detail) = conn.run();

        // A connection removed by close() was shut down on purpose.
        if conn.writers.lock().remove(&session).is_some() {
            tracing::info!(%session, %detail, "control connection lost");
            let _ = conn.events.send(TransportEvent::Error {
                session,
                code,
                detail,
            });
        }
    }

    /// Frame loop. Returns the error code and reason for exiting.
    fn run(&mut self) -> (i32, String) {
        loop {
            let event = match read_frame(&mut self.reader) {
                Ok(Some(Frame::Message(raw))) => match RtspMessage::parse(&raw) {
                    Ok(message) => TransportEvent::Message {
                        session: self.session,
                        message,
                    },
                    Err(e) => {
                        tracing::warn!(session = %self.session, error = %e, "parse error");
                        TransportEvent::MalformedMessage {
                            session: self.session,
                            is_request: !raw.starts_with(b"RTSP/"),
                            detail: e.to_string(),
                        }
                    }
                },
                Ok(Some(Frame::Binary { channel, data })) => TransportEvent::BinaryChunk {
                    session: self.session,
                    channel,
                    data,
                },
                Ok(None) => return (-1, "connection closed by peer".to_string()),
                Err(e) => return (error_code(&e), format!("read error: {e}")),
            };

            if self.events.send(event).is_err() {
                return (-1, "event receiver dropped".to_string());
            }
        }
    }
}

fn connect(host: &str, port: u16) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frames_message_with_body() {
        let raw = b"SET_PARAMETER rtsp://localhost/wfd1.0 RTSP/1.0\r\n\
                    CSeq: 4\r\n\
                    Content-Length: 27\r\n\r\n\
                    wfd_trigger_method: SETUP\r\n\
                    OPTIONS * RTSP/1.0\r\nCSeq: 5\r\n\r\n";
        let mut r = Cursor::new(&raw[..]);

        let Some(Frame::Message(first)) = read_frame(&mut r).unwrap() else {
            panic!("expected message");
        };
        let msg = RtspMessage::parse(&first).unwrap();
        assert_eq!(msg.method(), Some("SET_PARAMETER"));
        assert_eq!(msg.body_text(), "wfd_trigger_method: SETUP\r\n");

        let Some(Frame::Message(second)) = read_frame(&mut r).unwrap() else {
            panic!("expected message");
        };
        assert_eq!(RtspMessage::parse(&second).unwrap().cseq(), Some(5));

        assert_eq!(read_frame(&mut r).unwrap(), None);
    }

    #[test]
    fn frames_interleaved_chunk() {
        let mut raw = vec![b'$', 1, 0, 3, 0xAA, 0xBB, 0xCC];
        raw.extend_from_slice(b"RTSP/1.0 200 OK\r\nCSeq: 2\r\n\r\n");
        let mut r = Cursor::new(raw);

        assert_eq!(
            read_frame(&mut r).unwrap(),
            Some(Frame::Binary {
                channel: 1,
                data: vec![0xAA, 0xBB, 0xCC],
            })
        );
        assert!(matches!(read_frame(&mut r).unwrap(), Some(Frame::Message(_))));
    }

    #[test]
    fn truncated_message_is_error() {
        let mut r = Cursor::new(&b"RTSP/1.0 200 OK\r\nCSeq: 2\r\n"[..]);
        assert!(read_frame(&mut r).is_err());

        let mut r = Cursor::new(&b"RTSP/1.0 200 OK\r\nContent-Length: 10\r\n\r\nabc"[..]);
        assert!(read_frame(&mut r).is_err());
    }

    #[test]
    fn bad_content_length() {
        let mut r = Cursor::new(&b"RTSP/1.0 200 OK\r\nContent-Length: lots\r\n\r\n"[..]);
        let err = read_frame(&mut r).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let inner = err.get_ref().and_then(|e| e.downcast_ref::<SinkError>());
        assert!(matches!(
            inner,
            Some(SinkError::Parse {
                kind: ParseErrorKind::InvalidContentLength
            })
        ));
    }

    #[test]
    fn unreadable_message_reported_not_skipped() {
        use std::net::TcpListener;
        use std::sync::mpsc;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();
        let mut transport = TcpControlTransport::new(tx);
        let session = transport.create_connection("127.0.0.1", port).unwrap();

        let (mut source, _) = listener.accept().unwrap();
        let timeout = Duration::from_secs(5);
        assert!(matches!(
            rx.recv_timeout(timeout).unwrap(),
            TransportEvent::Connected { .. }
        ));

        source
            .write_all(b"OPTIONS * RTSP/1.0\r\nCSeq: 1\r\nX-Bad header line\r\n\r\n")
            .unwrap();
        match rx.recv_timeout(timeout).unwrap() {
            TransportEvent::MalformedMessage {
                session: s,
                is_request,
                ..
            } => {
                assert_eq!(s, session);
                assert!(is_request);
            }
            other => panic!("unexpected event {other:?}"),
        }

        source
            .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 2\r\nbroken\r\n\r\n")
            .unwrap();
        assert!(matches!(
            rx.recv_timeout(timeout).unwrap(),
            TransportEvent::MalformedMessage {
                is_request: false,
                ..
            }
        ));

        transport.close(session);
    }
}
