//! Per-service Probing → Announcing → Established lifecycle (§4.4), plus
//! the rename policy (§4.4.2).
//!
//! Grounded on the "one task per service, message-passing in, message-
//! passing out" shape called for in §9/DESIGN.md: each [`StateMachine`]
//! owns its [`Service`] and [`ResourceRecordSet`] exclusively, and is driven
//! by a `crossbeam_channel::Receiver<Inbound>` fed from the dispatch task,
//! mirroring the bounded-queue fan-out the teacher's async client code
//! structures as channels rather than shared mutable state.

use crate::cancel::CancelToken;
use crate::error::{ConflictError, Error, ValidationError};
use crate::events::{ConflictWinner, Event, EventSink};
use crate::record_set::{validate_instance_name, ResourceRecordSet, Service};
use crate::tie_break::{self, TieBreakOutcome};
use crate::transport::ConfiguredSocket;
use crate::wire::{Class, Message, Question, Record, Type};
use rand::Rng;
use std::time::{Duration, Instant};

/// Nominal probe cadence and its tolerance (§4.4, §8).
pub const PROBE_INTERVAL: Duration = Duration::from_millis(250);
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1);
pub const TIMING_TOLERANCE: Duration = Duration::from_millis(10);
pub const MAX_RENAME_ATTEMPTS: u8 = 10;

/// Where a service currently sits in its lifecycle (§3.5).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Probing,
    Announcing,
    Established,
    Conflict,
    Goodbye,
    Terminated,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Probing => "Probing",
            State::Announcing => "Announcing",
            State::Established => "Established",
            State::Conflict => "Conflict",
            State::Goodbye => "Goodbye",
            State::Terminated => "Terminated",
        }
    }
}

/// A packet relevant to one service's name, handed to its state-machine
/// task by the dispatcher (§5).
pub enum Inbound {
    /// A decoded message along with whether its Authority section carries
    /// a competing probe for our name.
    Message(Message),
}

/// Drives one registered service from Probing through to Terminated.
pub struct StateMachine {
    pub service: Service,
    pub records: ResourceRecordSet,
    state: State,
    probes_sent: u8,
    announcements_sent: u8,
    rename_attempts: u8,
}

/// Computes the next candidate instance name per §4.4.2: increment a
/// trailing ` (<n>)` if present (n >= 2), otherwise append ` (2)`.
pub fn next_candidate_name(name: &str) -> String {
    if let Some(open) = name.rfind(" (") {
        if name.ends_with(')') {
            let inner = &name[open + 2..name.len() - 1];
            if let Ok(n) = inner.parse::<u32>() {
                if n >= 2 {
                    return format!("{} ({})", &name[..open], n + 1);
                }
            }
        }
    }
    format!("{} (2)", name)
}

impl StateMachine {
    pub fn new(service: Service) -> Result<Self, ValidationError> {
        service.validate()?;
        let records = ResourceRecordSet::build(&service)?;
        Ok(StateMachine {
            service,
            records,
            state: State::Probing,
            probes_sent: 0,
            announcements_sent: 0,
            rename_attempts: 0,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, to: State, sink: &dyn EventSink) {
        let from = self.state;
        self.state = to;
        sink.emit(Event::StateTransition {
            instance_id: self.service.instance_id(),
            from: from.name(),
            to: to.name(),
        });
    }

    /// Our proposed Authority-section records for a probe: the full RRset
    /// as plain [`Record`]s (§4.4).
    fn proposed_records(&self) -> Vec<Record> {
        self.records
            .all()
            .iter()
            .map(|tracked| Record {
                name: tracked.name.clone(),
                class: tracked.class,
                ttl: tracked.remaining_ttl(),
                rdata: self.rdata_for(tracked),
            })
            .collect()
    }

    fn rdata_for(&self, tracked: &crate::record_set::TrackedRecord) -> crate::wire::Rdata {
        use crate::wire::Rdata;
        match tracked.rrtype {
            Type::PTR => Rdata::Ptr(self.service.fqdn()),
            Type::SRV => Rdata::Srv(crate::wire::Srv {
                priority: 0,
                weight: 0,
                port: self.service.port,
                target: self.service.hostname.clone(),
            }),
            Type::TXT => Rdata::Txt(self.records.txt_snapshot()),
            Type::A => {
                // Hostname resolution to an address is a platform-layer
                // concern; StateMachine stores it as opaque until the
                // responder fills it in from the configured interface.
                Rdata::A(std::net::Ipv4Addr::UNSPECIFIED)
            }
            _ => Rdata::Unknown(Vec::new()),
        }
    }

    /// Marks every record in this service's RRset as just having gone out
    /// on `sock`'s interface, so an immediately following query sees a
    /// fresh last-multicast timestamp and gets rate-limited per §4.3 rather
    /// than finding the bookkeeping untouched because the send happened
    /// outside the responder's own query-response path.
    fn record_all_multicast(&self, sock: &dyn ConfiguredSocket) {
        let interface_id = sock.interface_id();
        for tracked in self.records.all() {
            tracked.record_multicast_on(interface_id);
        }
    }

    fn probe_message(&self) -> Message {
        let mut m = Message::new_query();
        m.questions.push(Question {
            name: self.service.fqdn(),
            r#type: Type::ANY,
            class: Class::new(Class::IN, false),
        });
        m.authorities = self.proposed_records();
        m
    }

    fn announcement_message(&self) -> Message {
        let mut m = Message::new_response();
        m.answers = self.proposed_records();
        m
    }

    /// A single multicast TTL=0 response covering the whole RRset (§4.4
    /// "Any → Goodbye").
    fn goodbye_message(&self) -> Message {
        let mut m = Message::new_response();
        m.answers = self
            .proposed_records()
            .into_iter()
            .map(|mut r| {
                r.ttl = 0;
                r
            })
            .collect();
        m
    }

    /// Runs the full Probing → Announcing → Established sequence,
    /// handling conflicts and rename, blocking the calling thread until a
    /// terminal outcome (Established, MaxConflicts, or Cancelled) is
    /// reached. `sock` and `inbound` are owned by the caller and shared
    /// with the receive dispatcher (§5); this function only sends.
    pub fn run_to_established(
        &mut self,
        sock: &dyn ConfiguredSocket,
        inbound: &crossbeam_channel::Receiver<Inbound>,
        cancel: &CancelToken,
        sink: &dyn EventSink,
    ) -> Result<(), Error> {
        loop {
            match self.state {
                State::Probing => self.run_probing(sock, inbound, cancel, sink)?,
                State::Announcing => self.run_announcing(sock, cancel, sink)?,
                State::Established => return Ok(()),
                State::Conflict => self.run_conflict(sink)?,
                State::Goodbye | State::Terminated => return Ok(()),
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }
    }

    fn run_probing(
        &mut self,
        sock: &dyn ConfiguredSocket,
        inbound: &crossbeam_channel::Receiver<Inbound>,
        cancel: &CancelToken,
        sink: &dyn EventSink,
    ) -> Result<(), Error> {
        self.probes_sent = 0;

        let initial_jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=250));
        if cancel.wait_timeout(initial_jitter) {
            return Err(Error::Cancelled);
        }

        while self.probes_sent < 3 {
            let packet = self.probe_message().encode()?;
            let _ = sock.send_multicast(&packet);
            self.record_all_multicast(sock);
            self.probes_sent += 1;
            sink.emit(Event::ProbeSent {
                instance_id: self.service.instance_id(),
                attempt: self.probes_sent,
            });

            let deadline = Instant::now() + PROBE_INTERVAL;
            while Instant::now() < deadline {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                match inbound.recv_timeout(Duration::from_millis(20)) {
                    Ok(Inbound::Message(msg)) => {
                        if let Some(outcome) = self.inspect_during_probe(&msg, sink) {
                            match outcome {
                                TieBreakOutcome::WeLose | TieBreakOutcome::Tie => {
                                    self.transition(State::Conflict, sink);
                                    return Ok(());
                                }
                                TieBreakOutcome::WeWin => {}
                            }
                        }
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                        return Err(Error::Closed)
                    }
                }
            }
        }

        self.transition(State::Announcing, sink);
        Ok(())
    }

    /// Inspects one message received while probing: a differing-RDATA
    /// response is an immediate conflict; a competing probe runs
    /// tie-break. Returns `None` if the message is irrelevant.
    fn inspect_during_probe(
        &self,
        msg: &Message,
        sink: &dyn EventSink,
    ) -> Option<TieBreakOutcome> {
        let our_name = self.service.instance_id();

        if !msg.query {
            for answer in &msg.answers {
                if crate::record_set::normalize_name(&answer.name) == our_name {
                    sink.emit(Event::ProbeConflictDetected {
                        instance_id: self.service.instance_id(),
                        winner: ConflictWinner::Them,
                    });
                    return Some(TieBreakOutcome::WeLose);
                }
            }
            return None;
        }

        if msg.authorities.is_empty() {
            return None;
        }
        let competes = msg
            .authorities
            .iter()
            .any(|r| crate::record_set::normalize_name(&r.name) == our_name);
        if !competes {
            return None;
        }

        let outcome = tie_break::compare(&self.proposed_records(), &msg.authorities);
        sink.emit(Event::TieBreakResolved {
            instance_id: self.service.instance_id(),
            outcome,
        });
        Some(outcome)
    }

    fn run_announcing(
        &mut self,
        sock: &dyn ConfiguredSocket,
        cancel: &CancelToken,
        sink: &dyn EventSink,
    ) -> Result<(), Error> {
        self.announcements_sent = 0;

        while self.announcements_sent < 2 {
            let packet = self.announcement_message().encode()?;
            let _ = sock.send_multicast(&packet);
            self.record_all_multicast(sock);
            self.announcements_sent += 1;
            sink.emit(Event::AnnouncementSent {
                instance_id: self.service.instance_id(),
                attempt: self.announcements_sent,
            });

            if self.announcements_sent < 2 && cancel.wait_timeout(ANNOUNCE_INTERVAL) {
                return Err(Error::Cancelled);
            }
        }

        self.transition(State::Established, sink);
        Ok(())
    }

    fn run_conflict(&mut self, sink: &dyn EventSink) -> Result<(), Error> {
        self.rename_attempts += 1;
        if self.rename_attempts > MAX_RENAME_ATTEMPTS {
            self.transition(State::Terminated, sink);
            return Err(ConflictError {
                attempts: self.rename_attempts,
            }
            .into());
        }

        let candidate = next_candidate_name(&self.service.instance_name);
        validate_instance_name(&candidate)?;
        self.service.instance_name = candidate;
        self.records = ResourceRecordSet::build(&self.service)?;

        self.transition(State::Probing, sink);
        Ok(())
    }

    /// Replaces TXT only; does not re-probe (§9 Open Question decision:
    /// TXT-only changes announce, other field changes are unregister +
    /// register).
    pub fn update_txt(
        &mut self,
        txt_records: Vec<(String, Option<Vec<u8>>)>,
        sock: &dyn ConfiguredSocket,
        sink: &dyn EventSink,
    ) -> Result<(), Error> {
        self.service.txt_records = txt_records;
        let txt = self
            .service
            .encode_txt()
            .map_err(Error::Validation)?;
        self.records.replace_txt(txt);

        let packet = self.announcement_message().encode()?;
        let _ = sock.send_multicast(&packet);
        sink.emit(Event::AnnouncementSent {
            instance_id: self.service.instance_id(),
            attempt: 0,
        });
        Ok(())
    }

    /// Emits a single best-effort Goodbye burst (§4.4). Failure is logged,
    /// not propagated, matching §7's "goodbye send failures" recovery rule.
    pub fn goodbye(&mut self, sock: &dyn ConfiguredSocket, sink: &dyn EventSink) {
        self.transition(State::Goodbye, sink);
        if let Ok(packet) = self.goodbye_message().encode() {
            let _ = sock.send_multicast(&packet);
        }
        sink.emit(Event::GoodbyeSent {
            instance_id: self.service.instance_id(),
        });
        self.transition(State::Terminated, sink);
    }
}
