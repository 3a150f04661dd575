//! The one-shot querier (§4.6): the inverse of the responder, building a
//! query, collecting deduplicated responses until a timeout, with no
//! cache retained between calls (caches are explicitly out of scope, §1).

use crate::cancel::CancelToken;
use crate::error::{Error, NetworkError};
use crate::transport::ConfiguredSocket;
use crate::wire::{Class, Message, Question, Record, Type};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A one-shot mDNS query facade over a [`ConfiguredSocket`] (§6.1).
pub struct Querier {
    sock: Arc<dyn ConfiguredSocket>,
}

impl Querier {
    pub fn new(sock: Arc<dyn ConfiguredSocket>) -> Self {
        Querier { sock }
    }

    /// Sends one query for `(name, qtype)` and accumulates unique
    /// resource records seen in responses until `timeout` elapses or
    /// `cancel` fires. Returns an empty list on timeout — that's not an
    /// error (§6.1).
    pub fn query(
        &self,
        name: &str,
        qtype: Type,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<Record>, Error> {
        let mut message = Message::new_query();
        message.questions.push(Question {
            name: name.to_string(),
            r#type: qtype,
            class: Class::new(Class::IN, false),
        });

        let packet = message.encode()?;
        self.sock
            .send_multicast(&packet)
            .map_err(Error::Network)?;

        let deadline = Instant::now() + timeout;
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let poll = remaining.min(Duration::from_millis(100));

            match self.sock.receive(poll) {
                Ok(Some(inbound)) => {
                    let Ok(response) = Message::decode(&inbound.data) else {
                        continue;
                    };
                    if response.query {
                        continue;
                    }
                    for record in response.answers.into_iter().chain(response.additionals) {
                        let key = dedup_key(&record);
                        if seen.insert(key) {
                            results.push(record);
                        }
                    }
                }
                Ok(None) => {}
                Err(NetworkError::Closed) => return Err(Error::Closed),
                Err(_) => {}
            }
        }

        Ok(results)
    }
}

fn dedup_key(record: &Record) -> (String, u16, u16, Vec<u8>) {
    let mut buf = Vec::new();
    let mut compressor = crate::wire::NameCompressor::new();
    let _ = record.rdata.write(&mut buf, &mut compressor);
    (
        crate::record_set::normalize_name(&record.name),
        record.r#type().to_u16(),
        record.class.value(),
        buf,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeSocket;
    use crate::transport::Inbound;
    use crate::wire::Rdata;

    #[test]
    fn query_returns_empty_on_timeout_with_no_responses() {
        let sock = Arc::new(FakeSocket::default());
        let querier = Querier::new(sock);
        let cancel = CancelToken::new();

        let results = querier
            .query("_http._tcp.local", Type::PTR, Duration::from_millis(50), &cancel)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn query_deduplicates_identical_records_across_responses() {
        let sock = Arc::new(FakeSocket::default());

        let mut response = Message::new_response();
        response.answers.push(Record {
            name: "_http._tcp.local.".to_string(),
            class: Class::new(Class::IN, false),
            ttl: 120,
            rdata: Rdata::Ptr("MyWebServer._http._tcp.local.".to_string()),
        });
        let packet = response.encode().unwrap();

        sock.inbox.lock().unwrap().push(Inbound {
            data: packet.clone(),
            source: "10.0.0.5:5353".parse().unwrap(),
        });
        sock.inbox.lock().unwrap().push(Inbound {
            data: packet,
            source: "10.0.0.5:5353".parse().unwrap(),
        });

        let querier = Querier::new(sock);
        let cancel = CancelToken::new();
        let results = querier
            .query("_http._tcp.local", Type::PTR, Duration::from_millis(150), &cancel)
            .unwrap();

        assert_eq!(results.len(), 1);
    }

    #[test]
    fn cancellation_stops_the_query_early() {
        let sock = Arc::new(FakeSocket::default());
        let querier = Querier::new(sock);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = querier
            .query("_http._tcp.local", Type::PTR, Duration::from_secs(5), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
