//! The `Message` type: header, questions, and the four resource-record
//! sections, plus `decode`/`encode_*` per §4.1.
//!
//! Grounded on the teacher's `dns::MessageParser`/`Message::to_vec` shape
//! (a struct wrapping the fields, a `parse` that walks sections in order,
//! `to_vec` that rebuilds them) but the encoder here compresses names via
//! [`NameCompressor`], which the teacher's encoder explicitly did not do.

use crate::error::{WireFormatError, WireFormatReason};
use crate::wire::enums::{Class, Type};
use crate::wire::name::{read_name, NameCompressor};
use crate::wire::rdata::Rdata;
use byteorder::{BigEndian, ByteOrder};

/// Messages larger than this are rejected outright by the decoder and never
/// produced by the encoder (§4.1).
pub const MAX_MESSAGE_LEN: usize = 9000;

const HEADER_LEN: usize = 12;

/// A question (query) entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Question {
    pub name: String,
    pub r#type: Type,
    pub class: Class,
}

/// A resource record: name, type, class (with cache-flush bit), TTL, RDATA.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub name: String,
    pub class: Class,
    pub ttl: u32,
    pub rdata: Rdata,
}

impl Record {
    pub fn r#type(&self) -> Type {
        self.rdata.r#type()
    }
}

/// A parsed or to-be-encoded mDNS message (§3.1, §4.1). The four sections
/// are plain `Vec`s; section counts are derived from their lengths rather
/// than stored separately, so there is no way to construct a message whose
/// header disagrees with its body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    /// Always 0 when Beacon is the sender (§4.1); left as-is when decoded
    /// from a peer so callers can inspect what they sent, if they care to.
    pub id: u16,
    pub query: bool,
    /// Preserved for callers that want to log it, but a non-zero opcode
    /// does not reject the message (RFC 6762 §18.3 / `WireFormatReason::UnknownOpcodeIgnored`).
    pub opcode: u8,
    /// Always set to true (1) on outgoing responses per §4.1; on a decoded
    /// message this reflects whatever the sender actually sent.
    pub authoritative: bool,
    pub truncated: bool,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additionals: Vec<Record>,
}

impl Message {
    pub fn new_query() -> Message {
        Message {
            query: true,
            ..Default::default()
        }
    }

    pub fn new_response() -> Message {
        Message {
            query: false,
            authoritative: true,
            ..Default::default()
        }
    }

    /// Decodes a complete message from `buf`. Rejects buffers over
    /// [`MAX_MESSAGE_LEN`] or shorter than a header, and any section whose
    /// declared count doesn't match what was actually present.
    pub fn decode(buf: &[u8]) -> Result<Message, WireFormatError> {
        if buf.len() > MAX_MESSAGE_LEN {
            return Err(WireFormatError::decode(
                "message",
                buf.len(),
                WireFormatReason::MessageTooLarge,
            ));
        }
        if buf.len() < HEADER_LEN {
            return Err(WireFormatError::decode(
                "message.header",
                buf.len(),
                WireFormatReason::TooShort,
            ));
        }

        let id = BigEndian::read_u16(&buf[0..2]);
        let flags = BigEndian::read_u16(&buf[2..4]);
        let qr = (flags >> 15) & 0x1;
        let opcode = ((flags >> 11) & 0xF) as u8;
        let aa = (flags >> 10) & 0x1;
        let tc = (flags >> 9) & 0x1;

        let qdcount = BigEndian::read_u16(&buf[4..6]) as usize;
        let ancount = BigEndian::read_u16(&buf[6..8]) as usize;
        let nscount = BigEndian::read_u16(&buf[8..10]) as usize;
        let arcount = BigEndian::read_u16(&buf[10..12]) as usize;

        let mut cursor = HEADER_LEN;

        let mut questions = Vec::with_capacity(qdcount.min(64));
        for _ in 0..qdcount {
            let (q, next) = read_question(buf, cursor)?;
            questions.push(q);
            cursor = next;
        }

        let mut answers = Vec::with_capacity(ancount.min(64));
        for _ in 0..ancount {
            let (r, next) = read_record(buf, cursor)?;
            answers.push(r);
            cursor = next;
        }

        let mut authorities = Vec::with_capacity(nscount.min(64));
        for _ in 0..nscount {
            let (r, next) = read_record(buf, cursor)?;
            authorities.push(r);
            cursor = next;
        }

        let mut additionals = Vec::with_capacity(arcount.min(64));
        for _ in 0..arcount {
            let (r, next) = read_record(buf, cursor)?;
            additionals.push(r);
            cursor = next;
        }

        Ok(Message {
            id,
            query: qr == 0,
            opcode,
            authoritative: aa == 1,
            truncated: tc == 1,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// Encodes the message. `id` is forced to 0 regardless of the field's
    /// current value, per §4.1 ("id MUST be 0 on transmission").
    ///
    /// Applies §4.1's size budgeting if the full message would exceed
    /// [`MAX_MESSAGE_LEN`]: the Additional section is dropped first (it's
    /// optional supplementary data), and if the message is still too large
    /// without it, Answer records are dropped from the end and the
    /// truncated (TC) bit is set. Only a message that can't fit even with
    /// zero answers returns [`WireFormatReason::MessageTooLarge`].
    pub fn encode(&self) -> Result<Vec<u8>, WireFormatError> {
        let full = self.encode_with(self.answers.len(), self.additionals.len(), false)?;
        if full.len() <= MAX_MESSAGE_LEN {
            return Ok(full);
        }

        let without_additionals = self.encode_with(self.answers.len(), 0, false)?;
        if without_additionals.len() <= MAX_MESSAGE_LEN {
            return Ok(without_additionals);
        }

        for keep in (0..self.answers.len()).rev() {
            let buf = self.encode_with(keep, 0, true)?;
            if buf.len() <= MAX_MESSAGE_LEN {
                return Ok(buf);
            }
        }

        Err(WireFormatError::encode(
            "message",
            0,
            WireFormatReason::MessageTooLarge,
        ))
    }

    /// Builds the wire form using the first `answer_count` answers and
    /// `additional_count` additionals, with the TC bit forced to
    /// `truncated` (ORed with `self.truncated`, so an already-truncated
    /// message stays marked that way). Section counts reflect exactly what
    /// was written, so the result always self-describes correctly.
    fn encode_with(
        &self,
        answer_count: usize,
        additional_count: usize,
        truncated: bool,
    ) -> Result<Vec<u8>, WireFormatError> {
        let mut buf = Vec::with_capacity(512);
        buf.extend_from_slice(&[0u8; HEADER_LEN]);

        let mut flags: u16 = 0;
        if !self.query {
            flags |= 1 << 15;
        }
        flags |= (self.opcode as u16 & 0xF) << 11;
        if self.authoritative {
            flags |= 1 << 10;
        }
        if self.truncated || truncated {
            flags |= 1 << 9;
        }
        BigEndian::write_u16(&mut buf[2..4], flags);

        let mut compressor = NameCompressor::new();

        for q in &self.questions {
            compressor.write_name(&mut buf, &q.name)?;
            write_u16(&mut buf, q.r#type.to_u16());
            write_u16(&mut buf, q.class.raw());
        }
        for r in &self.answers[..answer_count] {
            write_record(&mut buf, r, &mut compressor)?;
        }
        for r in &self.authorities {
            write_record(&mut buf, r, &mut compressor)?;
        }
        for r in &self.additionals[..additional_count] {
            write_record(&mut buf, r, &mut compressor)?;
        }

        write_section_count(&mut buf, 4, self.questions.len())?;
        write_section_count(&mut buf, 6, answer_count)?;
        write_section_count(&mut buf, 8, self.authorities.len())?;
        write_section_count(&mut buf, 10, additional_count)?;

        Ok(buf)
    }
}

fn write_section_count(buf: &mut [u8], at: usize, count: usize) -> Result<(), WireFormatError> {
    if count > u16::MAX as usize {
        return Err(WireFormatError::encode(
            "message.header",
            at,
            WireFormatReason::SectionCountMismatch,
        ));
    }
    BigEndian::write_u16(&mut buf[at..at + 2], count as u16);
    Ok(())
}

fn write_u16(buf: &mut Vec<u8>, v: u16) {
    let mut b = [0u8; 2];
    BigEndian::write_u16(&mut b, v);
    buf.extend_from_slice(&b);
}

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    let mut b = [0u8; 4];
    BigEndian::write_u32(&mut b, v);
    buf.extend_from_slice(&b);
}

fn read_question(buf: &[u8], start: usize) -> Result<(Question, usize), WireFormatError> {
    let (name, mut cursor) = read_name(buf, start)?;

    let raw_type = read_u16_at(buf, cursor, "question.type")?;
    cursor += 2;
    let raw_class = read_u16_at(buf, cursor, "question.class")?;
    cursor += 2;

    Ok((
        Question {
            name,
            r#type: Type::from_u16(raw_type),
            class: Class::from_raw(raw_class),
        },
        cursor,
    ))
}

fn read_record(buf: &[u8], start: usize) -> Result<(Record, usize), WireFormatError> {
    let (name, mut cursor) = read_name(buf, start)?;

    let raw_type = read_u16_at(buf, cursor, "record.type")?;
    cursor += 2;
    let raw_class = read_u16_at(buf, cursor, "record.class")?;
    cursor += 2;
    let ttl = read_u32_at(buf, cursor, "record.ttl")?;
    cursor += 4;
    let rdlength = read_u16_at(buf, cursor, "record.rdlength")? as usize;
    cursor += 2;

    let rdata = Rdata::parse(buf, cursor, rdlength, Type::from_u16(raw_type))?;
    cursor += rdlength;

    Ok((
        Record {
            name,
            class: Class::from_raw(raw_class),
            ttl,
            rdata,
        },
        cursor,
    ))
}

fn write_record(
    buf: &mut Vec<u8>,
    r: &Record,
    compressor: &mut NameCompressor,
) -> Result<(), WireFormatError> {
    compressor.write_name(buf, &r.name)?;
    write_u16(buf, r.r#type().to_u16());
    write_u16(buf, r.class.raw());
    write_u32(buf, r.ttl);

    let rdlength_at = buf.len();
    write_u16(buf, 0);
    let rdata_start = buf.len();
    r.rdata.write(buf, compressor)?;
    let rdlength = buf.len() - rdata_start;
    if rdlength > u16::MAX as usize {
        return Err(WireFormatError::encode(
            "record.rdlength",
            rdlength_at,
            WireFormatReason::MessageTooLarge,
        ));
    }
    BigEndian::write_u16(&mut buf[rdlength_at..rdlength_at + 2], rdlength as u16);

    Ok(())
}

fn read_u16_at(buf: &[u8], at: usize, field: &'static str) -> Result<u16, WireFormatError> {
    buf.get(at..at + 2)
        .map(BigEndian::read_u16)
        .ok_or_else(|| WireFormatError::decode(field, at, WireFormatReason::TruncatedRecord))
}

fn read_u32_at(buf: &[u8], at: usize, field: &'static str) -> Result<u32, WireFormatError> {
    buf.get(at..at + 4)
        .map(BigEndian::read_u32)
        .ok_or_else(|| WireFormatError::decode(field, at, WireFormatReason::TruncatedRecord))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::rdata::TxtRecord;
    use std::net::Ipv4Addr;

    fn sample_message() -> Message {
        let mut m = Message::new_response();
        m.answers.push(Record {
            name: "MyPrinter._http._tcp.local.".to_string(),
            class: Class::new(Class::IN, true),
            ttl: 120,
            rdata: Rdata::A(Ipv4Addr::new(192, 168, 1, 50)),
        });
        m.answers.push(Record {
            name: "_http._tcp.local.".to_string(),
            class: Class::new(Class::IN, false),
            ttl: 4500,
            rdata: Rdata::Ptr("MyPrinter._http._tcp.local.".to_string()),
        });
        m.additionals.push(Record {
            name: "MyPrinter._http._tcp.local.".to_string(),
            class: Class::new(Class::IN, true),
            ttl: 4500,
            rdata: Rdata::Txt(TxtRecord::empty()),
        });
        m
    }

    #[test]
    fn round_trips_a_ptr_and_txt_record() {
        let original = sample_message();
        let encoded = original.encode().unwrap();
        let decoded = Message::decode(&encoded).unwrap();

        assert_eq!(decoded.answers.len(), 2);
        assert_eq!(decoded.additionals.len(), 1);
        assert!(!decoded.query);
        assert!(decoded.authoritative);

        match &decoded.answers[0].rdata {
            Rdata::A(ip) => assert_eq!(*ip, Ipv4Addr::new(192, 168, 1, 50)),
            other => panic!("expected A record, got {:?}", other),
        }
        assert!(decoded.answers[0].class.flag());
    }

    #[test]
    fn id_is_forced_to_zero_on_encode() {
        let mut m = Message::new_query();
        m.id = 0xBEEF;
        let encoded = m.encode().unwrap();
        assert_eq!(BigEndian::read_u16(&encoded[0..2]), 0);
    }

    #[test]
    fn oversized_message_is_rejected_on_decode() {
        let buf = vec![0u8; MAX_MESSAGE_LEN + 1];
        let err = Message::decode(&buf).unwrap_err();
        assert_eq!(err.reason, WireFormatReason::MessageTooLarge);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let buf = vec![0u8; 4];
        let err = Message::decode(&buf).unwrap_err();
        assert_eq!(err.reason, WireFormatReason::TooShort);
    }

    #[test]
    fn compressed_names_are_shorter_than_uncompressed_equivalent() {
        let m = sample_message();
        let encoded = m.encode().unwrap();

        // Three records each carrying "MyPrinter._http._tcp.local." or a
        // suffix of it uncompressed would exceed this many bytes; with
        // compression the repeated suffix is only spelled out once.
        assert!(encoded.len() < 220);
    }

    #[test]
    fn section_counts_match_body_after_decode() {
        let m = sample_message();
        let encoded = m.encode().unwrap();
        let ancount = BigEndian::read_u16(&encoded[6..8]);
        let arcount = BigEndian::read_u16(&encoded[10..12]);
        assert_eq!(ancount, 2);
        assert_eq!(arcount, 1);
    }

    fn padded_record(name: String) -> Record {
        let value = vec![b'x'; 200];
        let txt = TxtRecord::from_entries(vec![("k", Some(value.as_slice()))]).unwrap();
        Record {
            name,
            class: Class::new(Class::IN, true),
            ttl: 120,
            rdata: Rdata::Txt(txt),
        }
    }

    #[test]
    fn encode_drops_additionals_when_message_would_exceed_size_cap() {
        let mut m = Message::new_response();
        for i in 0..30 {
            m.answers.push(padded_record(format!("answer-{}.local.", i)));
        }
        for i in 0..15 {
            m.additionals
                .push(padded_record(format!("additional-{}.local.", i)));
        }

        let encoded = m.encode().unwrap();
        assert!(encoded.len() <= MAX_MESSAGE_LEN);

        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(decoded.answers.len(), 30);
        assert_eq!(decoded.additionals.len(), 0);
        assert!(!decoded.truncated);
    }

    #[test]
    fn encode_truncates_answers_and_sets_tc_when_still_oversized_without_additionals() {
        let mut m = Message::new_response();
        for i in 0..50 {
            m.answers.push(padded_record(format!("answer-{}.local.", i)));
        }

        let encoded = m.encode().unwrap();
        assert!(encoded.len() <= MAX_MESSAGE_LEN);

        let decoded = Message::decode(&encoded).unwrap();
        assert!(decoded.answers.len() < 50);
        assert!(decoded.truncated);
    }
}
