use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{Result, SinkError};
use crate::transport::SessionId;

/// Which of the sink's own requests a response answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// M2 `OPTIONS *`.
    Options,
    Describe,
    /// M6.
    Setup,
    /// M7.
    Play,
}

impl Exchange {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Describe => "DESCRIBE",
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    exchange: Exchange,
    sent_at: Instant,
}

/// Outstanding requests keyed by (connection, CSeq).
///
/// CSeq values are never reused on a connection, so a key names exactly
/// one in-flight request. Resolving removes the entry, so each pending
/// exchange is handled at most once.
#[derive(Debug, Default)]
pub struct PendingRequests {
    pending: HashMap<(SessionId, u32), Pending>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request that was just sent.
    pub fn register(
        &mut self,
        session: SessionId,
        cseq: u32,
        exchange: Exchange,
        sent_at: Instant,
    ) -> Result<()> {
        use std::collections::hash_map::Entry;

        match self.pending.entry((session, cseq)) {
            Entry::Occupied(_) => Err(SinkError::DuplicateKey { session, cseq }),
            Entry::Vacant(slot) => {
                slot.insert(Pending { exchange, sent_at });
                tracing::trace!(%session, cseq, %exchange, "pending request registered");
                Ok(())
            }
        }
    }

    /// Remove and return the exchange waiting on this key.
    pub fn resolve(&mut self, session: SessionId, cseq: u32) -> Option<Exchange> {
        self.pending.remove(&(session, cseq)).map(|p| p.exchange)
    }

    /// Oldest pending request sent more than `timeout` before `now`.
    pub fn expired(&self, now: Instant, timeout: Duration) -> Option<(SessionId, u32, Exchange)> {
        self.pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.sent_at) > timeout)
            .min_by_key(|(_, p)| p.sent_at)
            .map(|(&(session, cseq), p)| (session, cseq, p.exchange))
    }

    /// Drop every pending request without handling it.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: SessionId = SessionId(1);

    #[test]
    fn register_then_resolve_once() {
        let mut reg = PendingRequests::new();
        reg.register(S, 3, Exchange::Setup, Instant::now()).unwrap();
        assert_eq!(reg.resolve(S, 3), Some(Exchange::Setup));
        assert_eq!(reg.resolve(S, 3), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn unknown_key_is_not_found() {
        let mut reg = PendingRequests::new();
        reg.register(S, 1, Exchange::Options, Instant::now()).unwrap();
        assert_eq!(reg.resolve(S, 2), None);
        assert_eq!(reg.resolve(SessionId(2), 1), None);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn duplicate_key_rejected() {
        let mut reg = PendingRequests::new();
        let now = Instant::now();
        reg.register(S, 1, Exchange::Options, now).unwrap();
        assert!(matches!(
            reg.register(S, 1, Exchange::Play, now),
            Err(SinkError::DuplicateKey { cseq: 1, .. })
        ));
        assert_eq!(reg.resolve(S, 1), Some(Exchange::Options));
    }

    #[test]
    fn expiry_picks_oldest() {
        let mut reg = PendingRequests::new();
        let t0 = Instant::now();
        reg.register(S, 1, Exchange::Describe, t0).unwrap();
        reg.register(S, 2, Exchange::Setup, t0 + Duration::from_secs(5)).unwrap();

        let timeout = Duration::from_secs(10);
        assert_eq!(reg.expired(t0 + Duration::from_secs(9), timeout), None);
        assert_eq!(
            reg.expired(t0 + Duration::from_secs(20), timeout),
            Some((S, 1, Exchange::Describe))
        );
    }

    #[test]
    fn clear_drops_everything() {
        let mut reg = PendingRequests::new();
        let now = Instant::now();
        reg.register(S, 1, Exchange::Options, now).unwrap();
        reg.register(S, 2, Exchange::Describe, now).unwrap();
        assert_eq!(reg.clear(), 2);
        assert!(reg.is_empty());
    }
}
