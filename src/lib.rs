//! Beacon is a Multicast DNS (mDNS) / DNS-Service-Discovery (DNS-SD)
//! library implementing both querier and responder roles on IPv4
//! link-local networks, compliant with RFC 6762 and RFC 6763.
//!
//! The crate is organised leaves-first:
//!
//! - [`wire`] — the DNS message codec: name compression, typed RDATA,
//!   `Message` encode/decode, never panicking on adversarial input.
//! - [`transport`] — the multicast socket abstraction and its
//!   cancellable, deadline-based receive loop.
//! - [`record_set`] — `Service`, the derived `ResourceRecordSet`, and the
//!   concurrent `Registry`.
//! - [`rate_limit`] — the per-source-IP query rate limiter (§4.2). The
//!   per-record multicast limiter lives on `record_set::TrackedRecord`
//!   instead, next to the per-interface timestamps it shares state with.
//! - [`tie_break`] / [`state_machine`] — simultaneous-probe tie-breaking
//!   and the Probing → Announcing → Established lifecycle.
//! - [`responder`] / [`querier`] — the public facades applications use.
//! - [`events`] — the structured event stream consumed by an external
//!   logging/metrics collaborator.
//!
//! # Example
//!
//! ```no_run
//! use beacon::record_set::Service;
//! use beacon::responder::{Options, Responder};
//! use beacon::transport::MulticastSocket;
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//!
//! fn register_printer() -> Result<(), beacon::error::Error> {
//!     let sock = MulticastSocket::bind(Ipv4Addr::UNSPECIFIED, 1)?;
//!     let responder = Responder::new(Options::new(), Arc::new(sock));
//!
//!     responder.register(Service {
//!         instance_name: "MyPrinter".to_string(),
//!         service_type: "_http._tcp.local".to_string(),
//!         port: 8080,
//!         hostname: "myhost.local".to_string(),
//!         txt_records: vec![("path".to_string(), Some(b"/".to_vec()))],
//!     })?;
//!
//!     responder.close()
//! }
//! ```

pub mod cancel;
pub mod error;
pub mod events;
pub mod querier;
pub mod rate_limit;
pub mod record_set;
pub mod responder;
pub mod state_machine;
pub mod tie_break;
pub mod transport;
pub mod wire;

#[doc(inline)]
pub use crate::error::{Error, Result};
#[doc(inline)]
pub use crate::querier::Querier;
#[doc(inline)]
pub use crate::record_set::{Service, ResourceRecordSet};
#[doc(inline)]
pub use crate::responder::{Options, Responder};
#[doc(inline)]
pub use crate::wire::Message;
