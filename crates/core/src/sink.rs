use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::capability::{self, CapabilitySet, DEFAULT_CLIENT_RTP_PORT, TriggerMethod};
use crate::error::{Result, SinkError};
use crate::locator::{Locator, SCHEME};
use crate::media::MediaReceiver;
use crate::protocol::{RTSP_VERSION, RtspMessage, RtspRequest, RtspResponse, USER_AGENT};
use crate::session::transport::negotiate;
use crate::session::{
    ControlSession, Exchange, NegotiatedTransport, PendingRequests, PlaybackSession, SinkState,
    TransportMode,
};
use crate::transport::{ControlTransport, SessionId, TransportEvent};

/// How often [`Sink::run`] wakes up to check the `running` flag and deadlines.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Methods listed in the `Public` header of the M1 response.
const PUBLIC_METHODS: &str = "org.wfa.wfd1.0, GET_PARAMETER, SET_PARAMETER";

/// Sink-level configuration.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Interleaved TCP or separate UDP media transport.
    pub transport_mode: TransportMode,
    /// `User-Agent` sent on every outgoing message.
    pub user_agent: String,
    /// Preferred local RTP port handed to the media receiver. The port
    /// actually advertised is the one the receiver reports.
    pub client_rtp_port: u16,
    /// Path appended to the presentation host to form the SETUP/PLAY target.
    pub stream_suffix: String,
    /// Deadline for each outstanding request. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            transport_mode: TransportMode::default(),
            user_agent: USER_AGENT.to_string(),
            client_rtp_port: DEFAULT_CLIENT_RTP_PORT,
            stream_suffix: "wfd1.0/streamid=0".to_string(),
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Where to find the source's control endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Connect and wait for the source to drive negotiation (M1 onwards).
    HostPort { host: String, port: u16 },
    /// Connect and immediately DESCRIBE / SETUP / PLAY this locator.
    Uri(String),
}

/// Wi-Fi Display sink control plane.
///
/// Processes one [`TransportEvent`] at a time. Outgoing requests are sent
/// through the [`ControlTransport`] and parked in a [`PendingRequests`]
/// registry until the matching response arrives. Requests issued by the
/// source (OPTIONS, GET_PARAMETER, SET_PARAMETER) are answered inline.
///
/// A failed exchange is fatal: the control connection is closed, pending
/// requests are dropped, the sink moves to [`SinkState::Stopped`], and the
/// error is returned from [`handle_event`](Self::handle_event).
pub struct Sink<T: ControlTransport, M: MediaReceiver> {
    config: SinkConfig,
    transport: T,
    media: M,
    state: SinkState,
    control: Option<ControlSession>,
    setup_uri: Option<String>,
    pending: PendingRequests,
    playback: Option<PlaybackSession>,
    presentation_host: String,
    negotiated: Option<NegotiatedTransport>,
}

impl<T: ControlTransport, M: MediaReceiver> Sink<T, M> {
    pub fn new(config: SinkConfig, transport: T, media: M) -> Self {
        Sink {
            config,
            transport,
            media,
            state: SinkState::Undefined,
            control: None,
            setup_uri: None,
            pending: PendingRequests::new(),
            playback: None,
            presentation_host: String::new(),
            negotiated: None,
        }
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Handle of the active control connection.
    pub fn session_id(&self) -> Option<SessionId> {
        self.control.as_ref().map(|c| c.id)
    }

    /// Playback session negotiated by SETUP.
    pub fn playback(&self) -> Option<&PlaybackSession> {
        self.playback.as_ref()
    }

    /// Presentation `host[:port]` learned from M4, empty until received.
    pub fn presentation_host(&self) -> &str {
        &self.presentation_host
    }

    pub fn negotiated_transport(&self) -> Option<&NegotiatedTransport> {
        self.negotiated.as_ref()
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    /// Open the control connection.
    ///
    /// With [`Source::Uri`] the locator must parse and must not carry
    /// credentials. Neither failure touches the sink's state.
    pub fn start(&mut self, source: Source) -> Result<()> {
        if self.control.is_some() {
            return Err(SinkError::AlreadyStarted);
        }

        let (host, port, setup_uri) = match source {
            Source::HostPort { host, port } => (host, port, None),
            Source::Uri(uri) => {
                let locator = Locator::parse(&uri)?;
                if locator.has_credentials() {
                    return Err(SinkError::CredentialsUnsupported);
                }
                (locator.host, locator.port, Some(uri))
            }
        };

        let id = self.transport.create_connection(&host, port)?;
        tracing::info!(session = %id, %host, port, uri = ?setup_uri, "connecting to source");

        self.control = Some(ControlSession::new(id, &host));
        self.setup_uri = setup_uri;
        self.playback = None;
        self.negotiated = None;
        self.presentation_host.clear();
        self.set_state(SinkState::Connecting);
        Ok(())
    }

    /// Close the control connection and drop pending requests unhandled.
    pub fn stop(&mut self) {
        if self.state != SinkState::Stopped {
            tracing::info!(state = ?self.state, "stopping sink");
        }
        self.teardown();
    }

    /// Process one transport event to completion.
    pub fn handle_event(&mut self, event: TransportEvent) -> Result<()> {
        if self.state == SinkState::Stopped {
            tracing::trace!(session = %event.session(), "sink stopped, ignoring event");
            return Ok(());
        }

        if self.session_id() != Some(event.session()) {
            if let TransportEvent::Error {
                session,
                code,
                detail,
            } = &event
            {
                tracing::error!(%session, code, %detail, "error on unrelated session");
            } else {
                tracing::warn!(session = %event.session(), "event for unknown session");
            }
            return Ok(());
        }

        match event {
            TransportEvent::Connected { .. } => {
                let result = self.on_connected();
                self.or_fail(result)
            }
            TransportEvent::Error {
                session,
                code,
                detail,
            } => {
                tracing::error!(%session, code, %detail, "lost control connection");
                self.fail(SinkError::Transport {
                    session,
                    code,
                    detail,
                })
            }
            TransportEvent::Message { message, .. } => self.on_message(&message),
            TransportEvent::MalformedMessage {
                is_request, detail, ..
            } => {
                if !is_request {
                    tracing::warn!(%detail, "dropping unreadable response");
                    return Ok(());
                }
                tracing::warn!(%detail, "unreadable request from source");
                let result = self.send_response(RtspResponse::bad_request());
                self.or_fail(result)
            }
            TransportEvent::BinaryChunk { channel, data, .. } => {
                self.on_binary(channel, &data);
                Ok(())
            }
        }
    }

    /// Fail the session if any pending request has outlived the deadline.
    pub fn expire_pending(&mut self, now: Instant) -> Result<()> {
        let Some(timeout) = self.config.request_timeout else {
            return Ok(());
        };
        match self.pending.expired(now, timeout) {
            Some((session, cseq, exchange)) => {
                tracing::error!(%session, cseq, %exchange, ?timeout, "request timed out");
                self.fail(SinkError::Timeout {
                    exchange: exchange.name(),
                    cseq,
                })
            }
            None => Ok(()),
        }
    }

    /// Drive the sink from `events` until it stops or `running` is cleared.
    ///
    /// Returns the error that ended the session, if any.
    pub fn run(&mut self, events: &Receiver<TransportEvent>, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::SeqCst) && self.state != SinkState::Stopped {
            match events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => self.handle_event(event)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("transport event channel closed");
                    break;
                }
            }
            self.expire_pending(Instant::now())?;
        }
        self.stop();
        Ok(())
    }

    fn set_state(&mut self, state: SinkState) {
        tracing::debug!(old_state = ?self.state, new_state = ?state, "state transition");
        self.state = state;
    }

    fn teardown(&mut self) {
        if let Some(control) = self.control.take() {
            self.transport.close(control.id);
        }
        let dropped = self.pending.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded pending requests");
        }
        self.state = SinkState::Stopped;
    }

    fn fail(&mut self, err: SinkError) -> Result<()> {
        tracing::error!(error = %err, state = ?self.state, "session failed");
        self.teardown();
        Err(err)
    }

    fn or_fail(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Err(e) => self.fail(e),
            Ok(()) => Ok(()),
        }
    }

    fn on_connected(&mut self) -> Result<()> {
        tracing::info!("connected to source");
        self.set_state(SinkState::Connected);

        match self.setup_uri.clone() {
            Some(uri) => self.send_request(Exchange::Describe, |cseq| {
                RtspRequest::describe(&uri, cseq)
            }),
            None => Ok(()),
        }
    }

    fn on_message(&mut self, message: &RtspMessage) -> Result<()> {
        let result = self.dispatch(message);
        self.or_fail(result)
    }

    fn dispatch(&mut self, message: &RtspMessage) -> Result<()> {
        let Some(cseq) = message.cseq() else {
            if message.is_response() {
                tracing::warn!(status = ?message.status_code(), "dropping response without CSeq");
                return Ok(());
            }
            tracing::warn!(method = ?message.method(), "request without CSeq");
            return self.send_response(RtspResponse::bad_request());
        };

        if message.is_response() {
            return self.on_response(cseq, message);
        }

        let method = message.method().unwrap_or_default();
        tracing::debug!(method, cseq, uri = ?message.uri(), "request from source");

        if message.version() != RTSP_VERSION {
            tracing::warn!(version = message.version(), method, "unsupported RTSP version");
            return self.send_response(RtspResponse::version_not_supported(cseq));
        }

        match method {
            "OPTIONS" => self.on_options_request(cseq),
            "GET_PARAMETER" => self.on_get_parameter_request(cseq),
            "SET_PARAMETER" => self.on_set_parameter_request(cseq, message),
            _ => {
                tracing::warn!(method, cseq, "unsupported RTSP method");
                self.send_response(RtspResponse::method_not_allowed(cseq))
            }
        }
    }

    fn on_response(&mut self, cseq: u32, message: &RtspMessage) -> Result<()> {
        let session = self.session_id().ok_or(SinkError::NotStarted)?;
        let Some(exchange) = self.pending.resolve(session, cseq) else {
            tracing::warn!(%session, cseq, "received unsolicited response");
            return Ok(());
        };

        tracing::debug!(%exchange, cseq, status = ?message.status_code(), "response");

        let status = message
            .status_code()
            .ok_or_else(|| SinkError::Malformed(format!("{exchange} response without status code")))?;
        if status != 200 {
            return Err(SinkError::Unsupported { status });
        }

        match exchange {
            Exchange::Options => Ok(()),
            Exchange::Describe => {
                let uri = self.setup_uri.clone().unwrap_or_else(|| self.presentation_uri());
                self.send_setup(&uri)
            }
            Exchange::Setup => self.on_setup_response(message),
            Exchange::Play => {
                tracing::info!(playback = ?self.playback.as_ref().map(|p| &p.id), "playing");
                self.set_state(SinkState::Playing);
                Ok(())
            }
        }
    }

    fn on_setup_response(&mut self, message: &RtspMessage) -> Result<()> {
        let header = message
            .get_header("Session")
            .ok_or_else(|| SinkError::Malformed("SETUP response missing Session".into()))?;
        let playback = PlaybackSession::from_header(header);

        let control_host = self
            .control
            .as_ref()
            .map(|c| c.host.as_str())
            .unwrap_or_default();
        let negotiated = negotiate(
            self.config.transport_mode,
            message.get_header("Transport"),
            control_host,
        )?;

        tracing::info!(
            playback = %playback.id,
            timeout = ?playback.timeout_secs,
            transport = ?negotiated,
            "playback session established"
        );

        let session_token = playback.id.clone();
        self.playback = Some(playback);
        self.negotiated = Some(negotiated);
        self.set_state(SinkState::Paused);

        let uri = self.setup_uri.clone().unwrap_or_else(|| self.presentation_uri());
        self.send_request(Exchange::Play, |cseq| {
            RtspRequest::play(&uri, cseq, &session_token)
        })
    }

    fn on_options_request(&mut self, cseq: u32) -> Result<()> {
        self.send_response(RtspResponse::ok(cseq).add_header("Public", PUBLIC_METHODS))?;
        self.send_request(Exchange::Options, RtspRequest::options)
    }

    /// The advertised receive port is whatever the media receiver bound,
    /// so it matches the `client_port` later sent in SETUP.
    fn on_get_parameter_request(&mut self, cseq: u32) -> Result<()> {
        self.media.init(self.config.transport_mode)?;
        let body = CapabilitySet::new(self.media.rtp_port()).advertise();
        self.send_response(
            RtspResponse::ok(cseq)
                .add_header("Content-Type", "text/parameters")
                .with_body(body),
        )
    }

    fn on_set_parameter_request(&mut self, cseq: u32, message: &RtspMessage) -> Result<()> {
        let body = message.body_text();

        for (key, value) in capability::parameters(&body) {
            tracing::debug!(key, value, "parameter from source");
        }

        if let Some(host) = capability::presentation_host(&body) {
            tracing::info!(presentation = %host, "presentation URL received");
            self.presentation_host = host;
        }

        match capability::trigger_method(&body) {
            Some(TriggerMethod::Setup) => {
                let uri = self.presentation_uri();
                self.send_setup(&uri)?;
            }
            Some(other) => tracing::info!(trigger = %other, "ignoring trigger"),
            None => {}
        }

        self.send_response(RtspResponse::ok(cseq))
    }

    fn on_binary(&mut self, channel: u8, data: &[u8]) {
        if self.config.transport_mode != TransportMode::Interleaved {
            tracing::warn!(channel, len = data.len(), "binary data outside interleaved mode");
            return;
        }
        tracing::trace!(channel, len = data.len(), "interleaved chunk");
        self.media.inject(channel == 0, data);
    }

    /// `rtsp://<presentation-host>/<stream-suffix>`, using the control host
    /// until the source has announced a presentation URL.
    fn presentation_uri(&self) -> String {
        let host = if self.presentation_host.is_empty() {
            self.control.as_ref().map(|c| c.host.as_str()).unwrap_or_default()
        } else {
            self.presentation_host.as_str()
        };
        format!("{SCHEME}{host}/{}", self.config.stream_suffix)
    }

    fn send_setup(&mut self, uri: &str) -> Result<()> {
        let mode = self.config.transport_mode;
        self.media.init(mode)?;
        let transport = mode.setup_header(self.media.rtp_port());
        self.send_request(Exchange::Setup, |cseq| {
            RtspRequest::setup(uri, cseq, &transport)
        })
    }

    fn send_request(
        &mut self,
        exchange: Exchange,
        build: impl FnOnce(u32) -> RtspRequest,
    ) -> Result<()> {
        let control = self.control.as_mut().ok_or(SinkError::NotStarted)?;
        let cseq = control.next_cseq();
        let request = build(cseq);

        tracing::debug!(%exchange, cseq, uri = %request.uri, "sending request");
        self.transport
            .send(control.id, request.serialize(&self.config.user_agent).as_bytes())?;
        self.pending
            .register(control.id, cseq, exchange, Instant::now())?;
        control.advance_cseq();
        Ok(())
    }

    fn send_response(&mut self, response: RtspResponse) -> Result<()> {
        let session = self.session_id().ok_or(SinkError::NotStarted)?;
        tracing::debug!(status = response.status_code, cseq = ?response.cseq, "sending response");
        self.transport
            .send(session, response.serialize(&self.config.user_agent).as_bytes())
    }
}
