//! Service descriptions and the resource-record sets derived from them
//! (§3.2, §3.3), plus the concurrent [`Registry`] (§3.4).
//!
//! Validation here follows the teacher's `from_str`/regex-based validation
//! style (a `Regex` checked once via `lazy_static` equivalent, `thiserror`
//! variants naming the offending field) generalized from unicast-DNS-name
//! syntax to the DNS-SD `_service._proto.local` grammar of RFC 6763 §7.

use crate::error::ValidationError;
use crate::wire::{Class, TxtRecord, Type};
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PTR_TTL: Duration = Duration::from_secs(120);
const UNIQUE_TTL: Duration = Duration::from_secs(120);
const A_TTL: Duration = Duration::from_secs(4500);
const MAX_TXT_LEN: usize = 1300;

/// Normal per-record multicast cadence (§4.3): at most once per second.
const NORMAL_MULTICAST_INTERVAL: Duration = Duration::from_secs(1);
/// Relaxed cadence while defending a record during another host's probe
/// (§4.3, §4.4.1).
const PROBE_DEFENSE_INTERVAL: Duration = Duration::from_millis(250);

fn service_type_regex() -> &'static Regex {
    // `_<service>._<tcp|udp>.local` (RFC 6763 §7): each label starts with
    // an underscore and 1-15 further characters, terminated by the
    // transport label and `.local`.
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^_[A-Za-z0-9-]{1,15}\._(tcp|udp)\.local\.?$").unwrap()
    })
}

pub fn validate_service_type(service_type: &str) -> Result<(), ValidationError> {
    if service_type_regex().is_match(service_type) {
        Ok(())
    } else {
        Err(ValidationError::InvalidServiceType(service_type.to_string()))
    }
}

pub fn validate_instance_name(name: &str) -> Result<(), ValidationError> {
    let len = name.as_bytes().len();
    if len == 0 || len > 63 {
        return Err(ValidationError::InvalidInstanceName(name.to_string()));
    }
    if name.starts_with(' ') || name.ends_with(' ') {
        return Err(ValidationError::InvalidInstanceName(name.to_string()));
    }
    Ok(())
}

pub fn validate_port(port: u32) -> Result<(), ValidationError> {
    if port == 0 || port > 65535 {
        return Err(ValidationError::InvalidPort(port));
    }
    Ok(())
}

/// A service the caller wants advertised on the network (§3.2). Everything
/// but `txt_records` is immutable after registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub instance_name: String,
    pub service_type: String,
    pub port: u16,
    pub hostname: String,
    pub txt_records: Vec<(String, Option<Vec<u8>>)>,
}

impl Service {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_instance_name(&self.instance_name)?;
        validate_service_type(&self.service_type)?;
        validate_port(self.port as u32)?;

        let encoded = self.encode_txt()?;
        if encoded.encoded_len() > MAX_TXT_LEN {
            return Err(ValidationError::TxtRecordTooLarge(encoded.encoded_len()));
        }
        Ok(())
    }

    pub fn encode_txt(&self) -> Result<TxtRecord, ValidationError> {
        for (key, value) in &self.txt_records {
            let entry_len = key.len() + value.as_ref().map(|v| v.len() + 1).unwrap_or(0);
            if entry_len > 255 {
                return Err(ValidationError::TxtEntryTooLarge(key.clone(), entry_len));
            }
        }
        TxtRecord::from_entries(
            self.txt_records
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_deref())),
        )
        .map_err(|_| ValidationError::TxtRecordTooLarge(MAX_TXT_LEN + 1))
    }

    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.instance_name, self.service_type)
    }

    pub fn instance_id(&self) -> String {
        normalize_name(&self.fqdn())
    }
}

/// Lower-cases a name and strips a trailing root dot, so a name decoded off
/// the wire (which always ends in `.`) compares equal to the same name as
/// stored internally (which doesn't). DNS names are case-insensitive
/// (§4.5).
pub fn normalize_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// A single tracked record within a [`ResourceRecordSet`]: the owned wire
/// record plus its creation time and per-interface last-multicast map
/// (§3.3), which is the state the rate limiter (§4.3) consults.
pub struct TrackedRecord {
    pub name: String,
    pub class: Class,
    pub base_ttl: Duration,
    pub rrtype: Type,
    pub created_at: Instant,
    pub last_multicast: Mutex<HashMap<u32, Instant>>,
}

impl TrackedRecord {
    fn new(name: String, class: Class, base_ttl: Duration, rrtype: Type) -> Self {
        TrackedRecord {
            name,
            class,
            base_ttl,
            rrtype,
            created_at: Instant::now(),
            last_multicast: Mutex::new(HashMap::new()),
        }
    }

    /// Remaining TTL in whole seconds, clamped to zero, per §3.3.
    pub fn remaining_ttl(&self) -> u32 {
        let elapsed = self.created_at.elapsed();
        let base = self.base_ttl.as_secs() as u32;
        base.saturating_sub(elapsed.as_secs() as u32)
    }

    pub fn last_multicast_on(&self, interface_id: u32) -> Option<Instant> {
        self.last_multicast.lock().get(&interface_id).copied()
    }

    pub fn record_multicast_on(&self, interface_id: u32) {
        self.last_multicast
            .lock()
            .insert(interface_id, Instant::now());
    }

    /// Whether this record hasn't been refreshed on `interface_id` within a
    /// quarter of its TTL (§4.3, §6.5 "TTL/4 multicast-fallback").
    pub fn stale_beyond_quarter_ttl(&self, interface_id: u32) -> bool {
        let threshold = self.base_ttl / 4;
        match self.last_multicast_on(interface_id) {
            Some(last) => last.elapsed() >= threshold,
            None => true,
        }
    }

    /// Whether a multicast of this record on `interface_id` is allowed right
    /// now (§4.3): normally at most once per second, or every 250ms while
    /// `probe_defense` (defending against a competing probe). This consults
    /// the same per-interface timestamp `record_multicast_on` updates, so
    /// there's exactly one place that tracks "when did this record last go
    /// out" rather than a second copy kept in sync by convention.
    pub fn allow_multicast(&self, interface_id: u32, probe_defense: bool) -> bool {
        let threshold = if probe_defense {
            PROBE_DEFENSE_INTERVAL
        } else {
            NORMAL_MULTICAST_INTERVAL
        };
        match self.last_multicast_on(interface_id) {
            Some(last) => last.elapsed() >= threshold,
            None => true,
        }
    }
}

/// The four records derived from a [`Service`] at registration time
/// (§3.3). Rebuilt wholesale on rename; TXT alone is rebuilt on
/// `update_service`.
pub struct ResourceRecordSet {
    pub ptr: Arc<TrackedRecord>,
    pub srv: Arc<TrackedRecord>,
    pub txt: Arc<TrackedRecord>,
    pub a: Arc<TrackedRecord>,
    pub txt_payload: Mutex<TxtRecord>,
}

impl ResourceRecordSet {
    pub fn build(service: &Service) -> Result<Self, ValidationError> {
        let txt_payload = service.encode_txt()?;
        let fqdn = service.fqdn();

        Ok(ResourceRecordSet {
            ptr: Arc::new(TrackedRecord::new(
                service.service_type.clone(),
                Class::new(Class::IN, false),
                PTR_TTL,
                Type::PTR,
            )),
            srv: Arc::new(TrackedRecord::new(
                fqdn.clone(),
                Class::new(Class::IN, true),
                UNIQUE_TTL,
                Type::SRV,
            )),
            txt: Arc::new(TrackedRecord::new(
                fqdn,
                Class::new(Class::IN, true),
                UNIQUE_TTL,
                Type::TXT,
            )),
            a: Arc::new(TrackedRecord::new(
                service.hostname.clone(),
                Class::new(Class::IN, true),
                A_TTL,
                Type::A,
            )),
            txt_payload: Mutex::new(txt_payload),
        })
    }

    pub fn all(&self) -> [&Arc<TrackedRecord>; 4] {
        [&self.ptr, &self.srv, &self.txt, &self.a]
    }

    pub fn replace_txt(&self, txt: TxtRecord) {
        *self.txt_payload.lock() = txt;
    }

    pub fn txt_snapshot(&self) -> TxtRecord {
        self.txt_payload.lock().clone()
    }
}

/// One entry in the [`Registry`]: the service description as last
/// (re)registered, its derived record set, and whether it's visible to
/// query responses yet (§3.4 — only once Established).
pub struct RegistryEntry {
    pub service: Mutex<Service>,
    pub records: RwLock<ResourceRecordSet>,
    pub established: std::sync::atomic::AtomicBool,
}

/// instance_id -> entry, guarded by a readers-writer lock (§3.4, §5):
/// reads on the response-building path, writes from state-machine tasks.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, Arc<RegistryEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn insert(&self, instance_id: String, entry: Arc<RegistryEntry>) {
        self.entries.write().insert(instance_id, entry);
    }

    pub fn get(&self, instance_id: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.read().get(instance_id).cloned()
    }

    /// Idempotent: removing an absent id is a no-op, not an error (§3.4).
    pub fn remove(&self, instance_id: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.write().remove(instance_id)
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.entries.read().contains_key(instance_id)
    }

    /// Snapshot of every established entry whose service_type matches
    /// `service_type` (case-insensitive), for PTR/ANY query matching.
    pub fn established_by_service_type(&self, service_type: &str) -> Vec<Arc<RegistryEntry>> {
        let needle = normalize_name(service_type);
        self.entries
            .read()
            .values()
            .filter(|e| e.established.load(std::sync::atomic::Ordering::Acquire))
            .filter(|e| normalize_name(&e.service.lock().service_type) == needle)
            .cloned()
            .collect()
    }

    /// Every distinct established service_type, for `_services._dns-sd._udp.local` enumeration (RFC 6763 §9).
    pub fn established_service_types(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for entry in self.entries.read().values() {
            if !entry.established.load(std::sync::atomic::Ordering::Acquire) {
                continue;
            }
            let st = entry.service.lock().service_type.clone();
            if seen.insert(st.to_ascii_lowercase()) {
                out.push(st);
            }
        }
        out
    }

    pub fn all_established(&self) -> Vec<Arc<RegistryEntry>> {
        self.entries
            .read()
            .values()
            .filter(|e| e.established.load(std::sync::atomic::Ordering::Acquire))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_service() -> Service {
        Service {
            instance_name: "MyWebServer".to_string(),
            service_type: "_http._tcp.local".to_string(),
            port: 8080,
            hostname: "host.local".to_string(),
            txt_records: vec![
                ("version".to_string(), Some(b"1.0".to_vec())),
                ("path".to_string(), Some(b"/".to_vec())),
            ],
        }
    }

    #[test]
    fn valid_service_passes_validation() {
        sample_service().validate().unwrap();
    }

    #[test]
    fn instance_name_of_63_bytes_is_accepted_64_is_rejected() {
        let mut s = sample_service();
        s.instance_name = "a".repeat(63);
        s.validate().unwrap();

        s.instance_name = "a".repeat(64);
        assert!(matches!(
            s.validate(),
            Err(ValidationError::InvalidInstanceName(_))
        ));
    }

    #[test]
    fn bad_service_type_is_rejected() {
        let mut s = sample_service();
        s.service_type = "not-a-service-type".to_string();
        assert!(matches!(
            s.validate(),
            Err(ValidationError::InvalidServiceType(_))
        ));
    }

    #[test]
    fn txt_total_length_boundary_1300_accepted_1301_rejected() {
        let mut s = sample_service();
        // one key "k", value sized so the full encoded TXT is exactly 1300.
        // entry = len_byte(1) + "k=" (2) + value; encoded = len_byte(1) + entry.
        // total = 1 + 1 + 2 + value_len = 1300 => value_len = 1296.
        s.txt_records = vec![("k".to_string(), Some(vec![b'x'; 1296]))];
        let txt = s.encode_txt().unwrap();
        assert_eq!(txt.encoded_len(), 1300);
        s.validate().unwrap();

        s.txt_records = vec![("k".to_string(), Some(vec![b'x'; 1297]))];
        assert!(matches!(
            s.validate(),
            Err(ValidationError::TxtRecordTooLarge(_))
        ));
    }

    #[test]
    fn record_set_has_correct_classes_and_ttls() {
        let rrset = ResourceRecordSet::build(&sample_service()).unwrap();
        assert!(!rrset.ptr.class.flag());
        assert!(rrset.srv.class.flag());
        assert!(rrset.txt.class.flag());
        assert!(rrset.a.class.flag());
        assert_eq!(rrset.ptr.base_ttl, PTR_TTL);
        assert_eq!(rrset.a.base_ttl, A_TTL);
    }

    #[test]
    fn allow_multicast_blocks_second_send_within_a_second() {
        let rrset = ResourceRecordSet::build(&sample_service()).unwrap();
        rrset.a.record_multicast_on(1);
        assert!(!rrset.a.allow_multicast(1, false));
    }

    #[test]
    fn allow_multicast_probe_defense_allows_sooner_than_normal() {
        let rrset = ResourceRecordSet::build(&sample_service()).unwrap();
        rrset.a.record_multicast_on(1);
        std::thread::sleep(Duration::from_millis(260));
        assert!(rrset.a.allow_multicast(1, true));
        assert!(!rrset.a.allow_multicast(1, false));
    }

    #[test]
    fn allow_multicast_budgets_are_independent_per_interface() {
        let rrset = ResourceRecordSet::build(&sample_service()).unwrap();
        rrset.a.record_multicast_on(1);
        assert!(rrset.a.allow_multicast(2, false));
    }

    #[test]
    fn registry_remove_is_idempotent() {
        let registry = Registry::new();
        assert!(registry.remove("nonexistent").is_none());
        assert!(registry.remove("nonexistent").is_none());
    }

    #[test]
    fn registry_established_filter_excludes_unestablished() {
        let registry = Registry::new();
        let service = sample_service();
        let records = ResourceRecordSet::build(&service).unwrap();
        let entry = Arc::new(RegistryEntry {
            service: Mutex::new(service.clone()),
            records: RwLock::new(records),
            established: std::sync::atomic::AtomicBool::new(false),
        });
        registry.insert(service.instance_id(), entry);

        assert!(registry
            .established_by_service_type("_http._tcp.local")
            .is_empty());
    }
}
