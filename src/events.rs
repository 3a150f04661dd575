//! Structured event stream (§6.5). Logging itself is explicitly an
//! external collaborator (§1); this module only defines the event
//! vocabulary and a sink trait. The default sink forwards to the `log`
//! crate at a level appropriate to each kind, the way the teacher's own
//! code calls `log::debug!`/`log::warn!` directly rather than building a
//! custom logger.

use std::net::IpAddr;

/// One observable happening in the responder/querier (§6.5). TXT **values**
/// must never be carried in an event, only keys — values may contain
/// secrets (RFC 6763 §6).
#[derive(Clone)]
pub enum Event {
    ProbeSent {
        instance_id: String,
        attempt: u8,
    },
    ProbeConflictDetected {
        instance_id: String,
        winner: ConflictWinner,
    },
    TieBreakResolved {
        instance_id: String,
        outcome: crate::tie_break::TieBreakOutcome,
    },
    AnnouncementSent {
        instance_id: String,
        attempt: u8,
    },
    StateTransition {
        instance_id: String,
        from: &'static str,
        to: &'static str,
    },
    QueryReceived {
        qname: String,
        qtype: crate::wire::Type,
    },
    ResponseSent {
        instance_id: String,
        unicast: bool,
        record_count: usize,
    },
    ResponseSuppressedByKnownAnswer {
        instance_id: String,
        count: usize,
    },
    RateLimited {
        reason: RateLimitReason,
    },
    MalformedPacket {
        error: String,
        offset: usize,
    },
    GoodbyeSent {
        instance_id: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictWinner {
    Us,
    Them,
}

#[derive(Clone, Debug)]
pub enum RateLimitReason {
    PerRecord { instance_id: String, rrtype: crate::wire::Type },
    PerSourceIp { source: IpAddr },
}

/// Where [`Event`]s go. Implement this to wire Beacon into an application's
/// own logging/metrics; [`NullSink`] is the default (events are dropped).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Discards every event. Used when the caller hasn't configured a sink.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Forwards events to the `log` crate, matching the teacher's direct
/// `log::debug!`/`log::warn!` call style rather than a bespoke formatter.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Event) {
        match &event {
            Event::MalformedPacket { error, offset } => {
                log::debug!("malformed packet at offset {}: {}", offset, error);
            }
            Event::RateLimited { reason } => {
                log::debug!("rate limited: {:?}", reason);
            }
            Event::ProbeConflictDetected { instance_id, winner } => {
                log::info!("probe conflict on {}: winner={:?}", instance_id, winner);
            }
            Event::StateTransition { instance_id, from, to } => {
                log::debug!("{}: {} -> {}", instance_id, from, to);
            }
            Event::GoodbyeSent { instance_id } => {
                log::info!("goodbye sent for {}", instance_id);
            }
            _ => log::trace!("{:?}", event),
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // Manual impl only so TXT payloads can never leak into this path
        // even if a future variant is added carelessly; every branch names
        // its fields explicitly instead of deriving.
        match self {
            Event::ProbeSent { instance_id, attempt } => f
                .debug_struct("ProbeSent")
                .field("instance_id", instance_id)
                .field("attempt", attempt)
                .finish(),
            Event::ProbeConflictDetected { instance_id, winner } => f
                .debug_struct("ProbeConflictDetected")
                .field("instance_id", instance_id)
                .field("winner", winner)
                .finish(),
            Event::TieBreakResolved { instance_id, outcome } => f
                .debug_struct("TieBreakResolved")
                .field("instance_id", instance_id)
                .field("outcome", outcome)
                .finish(),
            Event::AnnouncementSent { instance_id, attempt } => f
                .debug_struct("AnnouncementSent")
                .field("instance_id", instance_id)
                .field("attempt", attempt)
                .finish(),
            Event::StateTransition { instance_id, from, to } => f
                .debug_struct("StateTransition")
                .field("instance_id", instance_id)
                .field("from", from)
                .field("to", to)
                .finish(),
            Event::QueryReceived { qname, qtype } => f
                .debug_struct("QueryReceived")
                .field("qname", qname)
                .field("qtype", qtype)
                .finish(),
            Event::ResponseSent { instance_id, unicast, record_count } => f
                .debug_struct("ResponseSent")
                .field("instance_id", instance_id)
                .field("unicast", unicast)
                .field("record_count", record_count)
                .finish(),
            Event::ResponseSuppressedByKnownAnswer { instance_id, count } => f
                .debug_struct("ResponseSuppressedByKnownAnswer")
                .field("instance_id", instance_id)
                .field("count", count)
                .finish(),
            Event::RateLimited { reason } => f
                .debug_struct("RateLimited")
                .field("reason", reason)
                .finish(),
            Event::MalformedPacket { error, offset } => f
                .debug_struct("MalformedPacket")
                .field("error", error)
                .field("offset", offset)
                .finish(),
            Event::GoodbyeSent { instance_id } => f
                .debug_struct("GoodbyeSent")
                .field("instance_id", instance_id)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_accepts_any_event_without_panicking() {
        let sink = NullSink;
        sink.emit(Event::GoodbyeSent {
            instance_id: "x._http._tcp.local".to_string(),
        });
    }
}
