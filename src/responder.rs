//! The public responder facade (§4.5, §6.1): `Options`, `Responder`, and
//! the response builder driving query handling.
//!
//! The shape — a functional-options `Options` struct feeding a handle
//! constructor, with register/update/unregister/close methods — follows §9's
//! "functional-options configuration" guidance and the teacher's own
//! `UdpClient`/`Resolver` pattern of a struct built once and then called
//! repeatedly.
//!
//! §5's concurrency model lives here too: `Responder::new` spawns one
//! long-lived receive task that decodes inbound packets and either routes
//! them to whichever service's [`StateMachine`] is currently probing (by
//! name, via `probe_senders`) or, for queries, straight into
//! [`Inner::handle_query`]. `register` runs probing/announcing on the
//! caller's thread, same as before, but now does so alongside a live socket
//! feed instead of an orphaned channel.

use crate::cancel::CancelToken;
use crate::error::{Error, NetworkError, ValidationError};
use crate::events::{Event, EventSink, NullSink, RateLimitReason};
use crate::rate_limit::PerSourceLimiter;
use crate::record_set::{normalize_name, Registry, RegistryEntry, Service};
use crate::state_machine::{Inbound, StateMachine};
use crate::transport::{is_acceptable_source, ConfiguredSocket, RECEIVE_POLL_INTERVAL};
use crate::wire::{Class, Message, Rdata, Record, Type};
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Responder configuration (§6.1). Every field has a documented default,
/// set via [`Options::default`] and overridden through the builder methods.
pub struct Options {
    pub hostname: String,
    /// Interface IDs this responder accepts traffic on. Empty means accept
    /// whatever the configured socket reports via `interface_id()` (§6.1's
    /// "single-transport" default); non-empty restricts the receive task to
    /// only those IDs, dropping anything else before it reaches dispatch.
    pub interfaces: Vec<u32>,
    pub rate_limit_enabled: bool,
    pub per_source_qps_threshold: u32,
    pub per_source_cooldown: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            hostname: "localhost.local".to_string(),
            interfaces: Vec::new(),
            rate_limit_enabled: true,
            per_source_qps_threshold: 100,
            per_source_cooldown: Duration::from_secs(60),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn interfaces(mut self, interfaces: Vec<u32>) -> Self {
        self.interfaces = interfaces;
        self
    }

    pub fn rate_limit_enabled(mut self, enabled: bool) -> Self {
        self.rate_limit_enabled = enabled;
        self
    }
}

/// Shared state behind every [`Responder`] handle, and the state the
/// background receive task operates on. Lives in its own `Arc` so the task
/// can outlive the builder chain that constructs the `Responder` in front
/// of it.
struct Inner {
    options: Options,
    sock: Arc<dyn ConfiguredSocket>,
    registry: Registry,
    source_limiter: PerSourceLimiter,
    sink: RwLock<Arc<dyn EventSink>>,
    cancel: CancelToken,
    send_lock: Mutex<()>,
    closed: AtomicBool,
    /// instance_id -> inbound channel for every service currently in
    /// Probing, populated/cleared by [`DispatchSink`] as state transitions
    /// happen (§5).
    probe_senders: RwLock<HashMap<String, Sender<Inbound>>>,
}

/// A live responder instance (§6.1). Owns its transport, registry, and
/// rate-limit state; multiple instances in the same process never share
/// state (§9 "no global mutable state").
pub struct Responder {
    inner: Arc<Inner>,
    receive_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Responder {
    pub fn new(options: Options, sock: Arc<dyn ConfiguredSocket>) -> Self {
        let inner = Arc::new(Inner {
            options,
            sock,
            registry: Registry::new(),
            source_limiter: PerSourceLimiter::new(),
            sink: RwLock::new(Arc::new(NullSink)),
            cancel: CancelToken::new(),
            send_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            probe_senders: RwLock::new(HashMap::new()),
        });

        let task_inner = inner.clone();
        let handle = thread::spawn(move || receive_loop(task_inner));

        Responder {
            inner,
            receive_thread: Mutex::new(Some(handle)),
        }
    }

    pub fn with_sink(self, sink: Arc<dyn EventSink>) -> Self {
        *self.inner.sink.write() = sink;
        self
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Blocks until the service reaches Established or fails (§6.1),
    /// running probing/announcing on the calling thread while the
    /// background receive task (spawned in [`Responder::new`]) feeds it
    /// competing probes and conflicting responses over its inbound channel.
    pub fn register(&self, mut service: Service) -> Result<(), Error> {
        self.ensure_open()?;

        if service.hostname.is_empty() {
            service.hostname = self.inner.options.hostname.clone();
        }

        let instance_id = service.instance_id();
        if self.inner.registry.contains(&instance_id) {
            return Err(ValidationError::ServiceAlreadyRegistered(instance_id).into());
        }

        let mut machine = StateMachine::new(service)?;
        let (tx, rx) = crossbeam_channel::unbounded::<Inbound>();
        let dispatch_sink = DispatchSink {
            sink: &self.inner.sink,
            probe_senders: &self.inner.probe_senders,
            tx: tx.clone(),
        };

        let result = machine.run_to_established(
            self.inner.sock.as_ref(),
            &rx,
            &self.inner.cancel,
            &dispatch_sink,
        );
        self.inner
            .probe_senders
            .write()
            .retain(|_, v| !v.same_channel(&tx));
        result?;

        let final_id = machine.service.instance_id();
        let entry = Arc::new(RegistryEntry {
            service: parking_lot::Mutex::new(machine.service),
            records: RwLock::new(machine.records),
            established: AtomicBool::new(true),
        });
        self.inner.registry.insert(final_id, entry);
        Ok(())
    }

    /// Replaces TXT records; always announces, never re-probes (§9 Open
    /// Question decision).
    pub fn update_service(
        &self,
        instance_name: &str,
        service_type: &str,
        txt_records: Vec<(String, Option<Vec<u8>>)>,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let instance_id = normalize_name(&format!("{}.{}", instance_name, service_type));
        let entry = self
            .inner
            .registry
            .get(&instance_id)
            .ok_or_else(|| Error::Validation(ValidationError::InvalidInstanceName(instance_id.clone())))?;

        let mut service_guard = entry.service.lock();
        service_guard.txt_records = txt_records.clone();
        let txt = service_guard.encode_txt().map_err(Error::Validation)?;
        drop(service_guard);

        let records = entry.records.read();
        records.replace_txt(txt);

        let mut announcement = Message::new_response();
        for tracked in records.all() {
            if tracked.rrtype != Type::TXT {
                continue;
            }
            announcement.answers.push(Record {
                name: tracked.name.clone(),
                class: tracked.class,
                ttl: tracked.remaining_ttl(),
                rdata: Rdata::Txt(records.txt_snapshot()),
            });
        }
        let packet = announcement.encode()?;
        {
            let _guard = self.inner.send_lock.lock().unwrap();
            let _ = self.inner.sock.send_multicast(&packet);
        }

        self.inner.sink.read().emit(Event::AnnouncementSent {
            instance_id,
            attempt: 0,
        });
        Ok(())
    }

    /// Triggers Goodbye for one service; idempotent (§3.4, §6.1).
    pub fn unregister(&self, instance_name: &str, service_type: &str) -> Result<(), Error> {
        let instance_id = normalize_name(&format!("{}.{}", instance_name, service_type));
        let Some(entry) = self.inner.registry.remove(&instance_id) else {
            return Ok(());
        };

        let records = entry.records.read();
        let mut goodbye = Message::new_response();
        for tracked in records.all() {
            goodbye.answers.push(Record {
                name: tracked.name.clone(),
                class: tracked.class,
                ttl: 0,
                rdata: Rdata::Unknown(Vec::new()),
            });
        }
        if let Ok(packet) = goodbye.encode() {
            let _guard = self.inner.send_lock.lock().unwrap();
            let _ = self.inner.sock.send_multicast(&packet);
        }
        self.inner.sink.read().emit(Event::GoodbyeSent { instance_id });
        Ok(())
    }

    /// Goodbye every registered service, stop the receive task, then mark
    /// this responder closed (§6.1). Idempotent: calling twice is a no-op
    /// the second time. Also run automatically on `Drop`.
    pub fn close(&self) -> Result<(), Error> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        for entry in self.inner.registry.all_established() {
            let records = entry.records.read();
            let mut goodbye = Message::new_response();
            for tracked in records.all() {
                goodbye.answers.push(Record {
                    name: tracked.name.clone(),
                    class: tracked.class,
                    ttl: 0,
                    rdata: Rdata::Unknown(Vec::new()),
                });
            }
            if let Ok(packet) = goodbye.encode() {
                let _guard = self.inner.send_lock.lock().unwrap();
                let _ = self.inner.sock.send_multicast(&packet);
            }
        }
        self.inner.cancel.cancel();

        if let Some(handle) = self.receive_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Handles one decoded inbound message: matches it against the
    /// registry, builds a response honoring known-answer suppression and
    /// the per-record rate limit, and sends it (§4.5). Normally called only
    /// from the background receive task; exposed so tests can drive it
    /// directly against a hand-built [`Message`].
    pub fn handle_query(&self, msg: &Message, source: SocketAddr, interface_id: u32) {
        self.inner.handle_query(msg, source, interface_id);
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Wraps the responder's configured sink to additionally keep
/// `probe_senders` in sync with state transitions: entering Probing (the
/// initial attempt, or after a rename) registers this registration's
/// channel under the current instance id; leaving it removes the entry.
/// This way the receive task only ever finds a channel for a service that
/// is actually probing right now, without `register` having to reach in
/// and fix up the map itself on every rename.
struct DispatchSink<'a> {
    sink: &'a RwLock<Arc<dyn EventSink>>,
    probe_senders: &'a RwLock<HashMap<String, Sender<Inbound>>>,
    tx: Sender<Inbound>,
}

impl EventSink for DispatchSink<'_> {
    fn emit(&self, event: Event) {
        if let Event::StateTransition { instance_id, to, .. } = &event {
            let mut senders = self.probe_senders.write();
            if *to == "Probing" {
                senders.insert(instance_id.clone(), self.tx.clone());
            } else {
                senders.retain(|_, v| !v.same_channel(&self.tx));
            }
        }
        self.sink.read().emit(event);
    }
}

/// The receive task (§5): decodes inbound packets and routes them to
/// whichever service is currently probing, and hands queries to
/// `handle_query`. Runs until `inner.cancel` is set, which `Responder::close`
/// does before joining this thread.
fn receive_loop(inner: Arc<Inner>) {
    loop {
        if inner.cancel.is_cancelled() {
            return;
        }

        match inner.sock.receive(RECEIVE_POLL_INTERVAL) {
            Ok(Some(datagram)) => {
                if !is_acceptable_source(datagram.source.ip()) {
                    continue;
                }

                let interface_id = inner.sock.interface_id();
                if !inner.options.interfaces.is_empty()
                    && !inner.options.interfaces.contains(&interface_id)
                {
                    continue;
                }

                if inner.options.rate_limit_enabled
                    && !inner.source_limiter.allow(
                        datagram.source.ip(),
                        inner.options.per_source_qps_threshold,
                        inner.options.per_source_cooldown,
                    )
                {
                    inner.sink.read().emit(Event::RateLimited {
                        reason: RateLimitReason::PerSourceIp {
                            source: datagram.source.ip(),
                        },
                    });
                    continue;
                }

                let msg = match Message::decode(&datagram.data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        inner.sink.read().emit(Event::MalformedPacket {
                            error: e.to_string(),
                            offset: e.offset,
                        });
                        continue;
                    }
                };

                dispatch_to_probing_services(&inner, &msg);

                if msg.query {
                    inner.handle_query(&msg, datagram.source, interface_id);
                }
            }
            Ok(None) => {}
            Err(NetworkError::Closed) => return,
            Err(e) => {
                log::debug!("receive error: {}", e);
            }
        }
    }
}

/// Routes `msg` to any service currently probing under a name the message
/// references: a competing probe carries the name in its Authority section,
/// a conflicting response carries it in Answer (§4.4).
fn dispatch_to_probing_services(inner: &Inner, msg: &Message) {
    let records = if msg.query {
        &msg.authorities
    } else {
        &msg.answers
    };
    if records.is_empty() {
        return;
    }

    let senders = inner.probe_senders.read();
    for record in records {
        if let Some(tx) = senders.get(&normalize_name(&record.name)) {
            let _ = tx.send(Inbound::Message(msg.clone()));
        }
    }
}

impl Inner {
    fn handle_query(&self, msg: &Message, source: SocketAddr, interface_id: u32) {
        if !msg.query {
            return;
        }

        for question in &msg.questions {
            self.sink.read().emit(Event::QueryReceived {
                qname: question.name.clone(),
                qtype: question.r#type,
            });

            let is_probe = !msg.authorities.is_empty();

            if normalize_name(&question.name) == "_services._dns-sd._udp.local"
                && matches!(question.r#type, Type::PTR | Type::ANY)
            {
                self.respond_to_enumeration_query(msg);
                continue;
            }

            let matches = self.match_question(question);

            for (entry, records_for_question) in matches {
                let response =
                    self.build_response(&entry, &records_for_question, msg, interface_id, is_probe);
                if response.answers.is_empty() && response.additionals.is_empty() {
                    continue;
                }

                let unicast =
                    question.class.flag() && !self.any_stale_beyond_quarter(&entry, interface_id);

                match response.encode() {
                    Ok(packet) => {
                        let _guard = self.send_lock.lock().unwrap();
                        let sent = if unicast {
                            self.sock.send_unicast(&packet, source)
                        } else {
                            self.sock.send_multicast(&packet)
                        };
                        if sent.is_ok() {
                            self.sink.read().emit(Event::ResponseSent {
                                instance_id: entry.service.lock().instance_id(),
                                unicast,
                                record_count: response.answers.len(),
                            });
                        }
                    }
                    Err(e) => log::warn!("failed to encode query response: {}", e),
                }
            }
        }
    }

    /// Answers `_services._dns-sd._udp.local` with one PTR per distinct
    /// registered service type (RFC 6763 §9 enumeration).
    fn respond_to_enumeration_query(&self, query: &Message) {
        let service_types = self.registry.established_service_types();
        if service_types.is_empty() {
            return;
        }

        let mut response = Message::new_response();
        for service_type in service_types {
            let record = Record {
                name: "_services._dns-sd._udp.local".to_string(),
                class: Class::new(Class::IN, false),
                ttl: 4500,
                rdata: Rdata::Ptr(service_type),
            };
            if !is_known_answer(query, &record) {
                response.answers.push(record);
            }
        }
        if response.answers.is_empty() {
            return;
        }

        match response.encode() {
            Ok(packet) => {
                let _guard = self.send_lock.lock().unwrap();
                let _ = self.sock.send_multicast(&packet);
            }
            Err(e) => log::warn!("failed to encode enumeration response: {}", e),
        }
    }

    fn any_stale_beyond_quarter(&self, entry: &Arc<RegistryEntry>, interface_id: u32) -> bool {
        let records = entry.records.read();
        records
            .all()
            .iter()
            .any(|r| r.stale_beyond_quarter_ttl(interface_id))
    }

    /// Which record kinds of `entry` satisfy `question`, per §4.5 matching
    /// rules.
    fn match_question(&self, question: &crate::wire::Question) -> Vec<(Arc<RegistryEntry>, Vec<Type>)> {
        let qname = normalize_name(&question.name);
        let mut out = Vec::new();

        for entry in self.registry.all_established() {
            let service = entry.service.lock();
            let service_type = normalize_name(&service.service_type);
            let fqdn = normalize_name(&service.fqdn());
            let hostname = normalize_name(&service.hostname);
            drop(service);

            let mut kinds = Vec::new();
            match question.r#type {
                Type::PTR if qname == service_type => kinds.push(Type::PTR),
                Type::SRV if qname == fqdn => kinds.push(Type::SRV),
                Type::TXT if qname == fqdn => kinds.push(Type::TXT),
                Type::A if qname == hostname => kinds.push(Type::A),
                Type::ANY => {
                    if qname == service_type {
                        kinds.push(Type::PTR);
                    }
                    if qname == fqdn {
                        kinds.push(Type::SRV);
                        kinds.push(Type::TXT);
                    }
                    if qname == hostname {
                        kinds.push(Type::A);
                    }
                }
                _ => {}
            }

            if !kinds.is_empty() {
                out.push((entry, kinds));
            }
        }

        out
    }

    fn build_response(
        &self,
        entry: &Arc<RegistryEntry>,
        kinds: &[Type],
        query: &Message,
        interface_id: u32,
        is_probe: bool,
    ) -> Message {
        let records = entry.records.read();
        let mut response = Message::new_response();

        let service = entry.service.lock().clone();

        for tracked in records.all() {
            if !kinds.contains(&tracked.rrtype) {
                continue;
            }

            let rdata = match tracked.rrtype {
                Type::PTR => Rdata::Ptr(service.fqdn()),
                Type::SRV => Rdata::Srv(crate::wire::Srv {
                    priority: 0,
                    weight: 0,
                    port: service.port,
                    target: service.hostname.clone(),
                }),
                Type::TXT => Rdata::Txt(records.txt_snapshot()),
                Type::A => Rdata::A(std::net::Ipv4Addr::UNSPECIFIED),
                _ => continue,
            };

            let record = Record {
                name: tracked.name.clone(),
                class: tracked.class,
                ttl: tracked.remaining_ttl(),
                rdata,
            };

            if is_known_answer(query, &record) {
                self.sink.read().emit(Event::ResponseSuppressedByKnownAnswer {
                    instance_id: entry.service.lock().instance_id(),
                    count: 1,
                });
                continue;
            }

            if self.options.rate_limit_enabled && !tracked.allow_multicast(interface_id, is_probe) {
                self.sink.read().emit(Event::RateLimited {
                    reason: RateLimitReason::PerRecord {
                        instance_id: entry.service.lock().instance_id(),
                        rrtype: tracked.rrtype,
                    },
                });
                continue;
            }

            response.answers.push(record);
            tracked.record_multicast_on(interface_id);
        }

        // Additional section: SRV, TXT, and A for a PTR answer (§4.5
        // aggregation). Unconditional on the rate limiter above, since a
        // peer resolving the service still needs these even when the PTR
        // answer itself was just suppressed.
        if kinds.contains(&Type::PTR) {
            for tracked in records.all() {
                if matches!(tracked.rrtype, Type::SRV | Type::TXT | Type::A) {
                    let rdata = match tracked.rrtype {
                        Type::SRV => Rdata::Srv(crate::wire::Srv {
                            priority: 0,
                            weight: 0,
                            port: service.port,
                            target: service.hostname.clone(),
                        }),
                        Type::TXT => Rdata::Txt(records.txt_snapshot()),
                        Type::A => Rdata::A(std::net::Ipv4Addr::UNSPECIFIED),
                        _ => unreachable!(),
                    };
                    response.additionals.push(Record {
                        name: tracked.name.clone(),
                        class: tracked.class,
                        ttl: tracked.remaining_ttl(),
                        rdata,
                    });
                }
            }
        }

        response
    }
}

/// Known-answer suppression (RFC 6762 §7.1, §4.5): true if `query`'s Answer
/// section already has `record` with TTL ≥ half of what we'd emit.
fn is_known_answer(query: &Message, record: &Record) -> bool {
    query.answers.iter().any(|known| {
        normalize_name(&known.name) == normalize_name(&record.name)
            && known.r#type() == record.r#type()
            && known.class.value() == record.class.value()
            && rdata_equivalent(&known.rdata, &record.rdata)
            && known.ttl as u64 * 2 >= record.ttl as u64
    })
}

/// Compares RDATA the way the wire does: domain names inside PTR/SRV RDATA
/// are case-insensitive and may or may not carry a trailing root dot
/// depending on whether they came off the wire or were built in memory.
fn rdata_equivalent(a: &Rdata, b: &Rdata) -> bool {
    match (a, b) {
        (Rdata::Ptr(x), Rdata::Ptr(y)) => normalize_name(x) == normalize_name(y),
        (Rdata::Srv(x), Rdata::Srv(y)) => {
            x.priority == y.priority
                && x.weight == y.weight
                && x.port == y.port
                && normalize_name(&x.target) == normalize_name(&y.target)
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeSocket;

    fn sample_service() -> Service {
        Service {
            instance_name: "MyWebServer".to_string(),
            service_type: "_http._tcp.local".to_string(),
            port: 8080,
            hostname: "host.local".to_string(),
            txt_records: vec![("version".to_string(), Some(b"1.0".to_vec()))],
        }
    }

    fn responder() -> (Responder, Arc<FakeSocket>) {
        let sock = Arc::new(FakeSocket::default());
        let responder = Responder::new(Options::new(), sock.clone());
        (responder, sock)
    }

    #[test]
    fn register_reaches_established_and_sends_probes_and_announcements() {
        let (responder, sock) = responder();
        responder.register(sample_service()).unwrap();

        let sent = sock.sent_multicast.lock().unwrap();
        assert_eq!(sent.len(), 5); // 3 probes + 2 announcements
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let (responder, _sock) = responder();
        responder.register(sample_service()).unwrap();
        let err = responder.register(sample_service()).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::ServiceAlreadyRegistered(_))
        ));
    }

    #[test]
    fn unregister_sends_goodbye_with_ttl_zero() {
        let (responder, sock) = responder();
        responder.register(sample_service()).unwrap();
        sock.sent_multicast.lock().unwrap().clear();

        responder
            .unregister("MyWebServer", "_http._tcp.local")
            .unwrap();

        let sent = sock.sent_multicast.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let decoded = Message::decode(&sent[0]).unwrap();
        assert!(decoded.answers.iter().all(|r| r.ttl == 0));
    }

    #[test]
    fn unregister_unknown_service_is_a_no_op() {
        let (responder, _sock) = responder();
        responder.unregister("Nope", "_http._tcp.local").unwrap();
    }

    #[test]
    fn close_is_idempotent() {
        let (responder, _sock) = responder();
        responder.close().unwrap();
        responder.close().unwrap();
    }

    #[test]
    fn close_sends_goodbye_for_every_registered_service() {
        let (responder, sock) = responder();
        responder.register(sample_service()).unwrap();
        sock.sent_multicast.lock().unwrap().clear();

        responder.close().unwrap();

        let sent = sock.sent_multicast.lock().unwrap();
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn query_for_service_type_gets_ptr_answer_with_srv_txt_a_additional() {
        let (responder, sock) = responder();
        responder.register(sample_service()).unwrap();
        sock.sent_multicast.lock().unwrap().clear();

        let mut query = Message::new_query();
        query.questions.push(crate::wire::Question {
            name: "_http._tcp.local.".to_string(),
            r#type: Type::PTR,
            class: Class::new(Class::IN, false),
        });

        // interface_id 1 is distinct from FakeSocket::interface_id() (0),
        // which is where registration's own probes/announcements recorded
        // their last-multicast timestamps; this keeps the rate limiter from
        // interfering with this test's own assertions.
        responder.handle_query(&query, "10.0.0.5:5353".parse().unwrap(), 1);

        let sent = sock.sent_multicast.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let decoded = Message::decode(&sent[0]).unwrap();
        assert_eq!(decoded.answers.len(), 1);
        assert_eq!(decoded.answers[0].r#type(), Type::PTR);
        assert_eq!(decoded.additionals.len(), 3);
    }

    #[test]
    fn known_answer_is_suppressed_from_response() {
        let (responder, sock) = responder();
        responder.register(sample_service()).unwrap();
        sock.sent_multicast.lock().unwrap().clear();

        let mut query = Message::new_query();
        query.questions.push(crate::wire::Question {
            name: "_http._tcp.local.".to_string(),
            r#type: Type::PTR,
            class: Class::new(Class::IN, false),
        });
        query.answers.push(Record {
            name: "_http._tcp.local.".to_string(),
            class: Class::new(Class::IN, false),
            ttl: 70,
            rdata: Rdata::Ptr("MyWebServer._http._tcp.local.".to_string()),
        });

        responder.handle_query(&query, "10.0.0.5:5353".parse().unwrap(), 1);

        let sent = sock.sent_multicast.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let decoded = Message::decode(&sent[0]).unwrap();
        assert_eq!(decoded.answers.len(), 0);
        assert_eq!(decoded.additionals.len(), 3);
    }

    #[test]
    fn a_record_query_gets_an_answer_instead_of_being_dropped() {
        let (responder, sock) = responder();
        responder.register(sample_service()).unwrap();
        sock.sent_multicast.lock().unwrap().clear();

        let mut query = Message::new_query();
        query.questions.push(crate::wire::Question {
            name: "host.local.".to_string(),
            r#type: Type::A,
            class: Class::new(Class::IN, false),
        });

        responder.handle_query(&query, "10.0.0.5:5353".parse().unwrap(), 1);

        let sent = sock.sent_multicast.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let decoded = Message::decode(&sent[0]).unwrap();
        assert_eq!(decoded.answers.len(), 1);
        assert_eq!(decoded.answers[0].r#type(), Type::A);
    }

    #[test]
    fn record_just_announced_is_rate_limited_on_the_very_next_query() {
        let (responder, sock) = responder();
        responder.register(sample_service()).unwrap();
        sock.sent_multicast.lock().unwrap().clear();

        let mut query = Message::new_query();
        query.questions.push(crate::wire::Question {
            name: "_http._tcp.local.".to_string(),
            r#type: Type::PTR,
            class: Class::new(Class::IN, false),
        });

        // interface 0 matches FakeSocket::interface_id(), the interface the
        // just-completed announcing phase recorded its last multicast on.
        responder.handle_query(&query, "10.0.0.5:5353".parse().unwrap(), 0);

        let sent = sock.sent_multicast.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let decoded = Message::decode(&sent[0]).unwrap();
        assert_eq!(decoded.answers.len(), 0); // PTR suppressed by the rate limit
        assert_eq!(decoded.additionals.len(), 3); // SRV/TXT/A aggregation is unaffected
    }

    #[test]
    fn source_outside_link_local_and_private_ranges_is_ignored_by_receive_task() {
        let (responder, sock) = responder();
        responder.register(sample_service()).unwrap();
        sock.sent_multicast.lock().unwrap().clear();
        sock.sent_unicast.lock().unwrap().clear();

        let mut query = Message::new_query();
        query.questions.push(crate::wire::Question {
            name: "_http._tcp.local.".to_string(),
            r#type: Type::PTR,
            class: Class::new(Class::IN, false),
        });
        sock.inbox.lock().unwrap().push(crate::transport::Inbound {
            data: query.encode().unwrap(),
            source: "8.8.8.8:5353".parse().unwrap(),
        });

        std::thread::sleep(Duration::from_millis(60));
        responder.close().unwrap();

        assert!(sock.sent_multicast.lock().unwrap().is_empty());
    }
}
