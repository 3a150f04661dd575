//! RDATA variants the codec understands (§3.1): A, PTR, TXT, SRV. Anything
//! else is preserved as opaque bytes so a probe defending an unrecognised
//! RRset still round-trips correctly.

use crate::error::{WireFormatError, WireFormatReason};
use crate::wire::name::NameCompressor;
use byteorder::{ByteOrder, BigEndian};
use std::fmt;
use std::net::Ipv4Addr;

/// A single TXT record's RDATA: a sequence of length-prefixed strings, each
/// conventionally (not enforced) a `key` or `key=value` pair (RFC 6763 §6).
/// The canonical empty record is a single zero-length string, i.e. one
/// `0x00` byte, never zero strings (§3.2).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TxtRecord {
    raw: Vec<u8>,
}

impl TxtRecord {
    /// The canonical empty TXT record: a single zero-length string.
    pub fn empty() -> Self {
        TxtRecord { raw: vec![0] }
    }

    /// Builds a TXT record from an ordered list of `key`/`value` pairs. An
    /// empty `entries` still encodes the canonical single `0x00` byte.
    pub fn from_entries<'a, I>(entries: I) -> Result<Self, WireFormatError>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a [u8]>)>,
    {
        let mut raw = Vec::new();
        for (key, value) in entries {
            let mut entry = key.as_bytes().to_vec();
            if let Some(v) = value {
                entry.push(b'=');
                entry.extend_from_slice(v);
            }
            if entry.len() > 255 {
                return Err(WireFormatError::encode(
                    "txt.entry",
                    raw.len(),
                    WireFormatReason::LabelTooLong,
                ));
            }
            raw.push(entry.len() as u8);
            raw.extend_from_slice(&entry);
        }
        if raw.is_empty() {
            raw.push(0);
        }
        Ok(TxtRecord { raw })
    }

    pub fn from_raw(raw: Vec<u8>) -> Self {
        if raw.is_empty() {
            TxtRecord::empty()
        } else {
            TxtRecord { raw }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn encoded_len(&self) -> usize {
        self.raw.len()
    }

    /// Iterates over the raw `key`/`value` pairs (split on the first `=`).
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], Option<&[u8]>)> {
        TxtIter {
            raw: &self.raw,
            offset: 0,
        }
    }
}

struct TxtIter<'a> {
    raw: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for TxtIter<'a> {
    type Item = (&'a [u8], Option<&'a [u8]>);

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.raw.get(self.offset)? as usize;
        let start = self.offset + 1;
        let end = start.checked_add(len)?;
        let entry = self.raw.get(start..end)?;
        self.offset = end;

        if entry.is_empty() {
            return Some((&[], None));
        }

        match entry.iter().position(|&b| b == b'=') {
            Some(i) => Some((&entry[..i], Some(&entry[i + 1..]))),
            None => Some((entry, None)),
        }
    }
}

impl fmt::Display for TxtRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{}={}", String::from_utf8_lossy(k), String::from_utf8_lossy(v)),
                None => String::from_utf8_lossy(k).to_string(),
            })
            .collect();
        write!(f, "\"{}\"", parts.join(" "))
    }
}

/// SRV RDATA (RFC 2782): priority, weight, port, target name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Srv {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

impl fmt::Display for Srv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.priority, self.weight, self.port, self.target
        )
    }
}

/// Typed RDATA for the record types Beacon understands, plus an opaque
/// fallback for everything else.
#[derive(Clone, Debug, PartialEq)]
pub enum Rdata {
    A(Ipv4Addr),
    Ptr(String),
    Txt(TxtRecord),
    Srv(Srv),
    /// Preserved byte-for-byte; used for any type the codec does not
    /// interpret (§3.1).
    Unknown(Vec<u8>),
}

impl Rdata {
    /// Parses the RDATA of length `rdlength` starting at `start` in `buf`,
    /// given the accompanying record TYPE.
    pub fn parse(
        buf: &[u8],
        start: usize,
        rdlength: usize,
        r#type: crate::wire::enums::Type,
    ) -> Result<Rdata, WireFormatError> {
        use crate::wire::enums::Type;

        let end = start.checked_add(rdlength).ok_or_else(|| {
            WireFormatError::decode("rdata", start, WireFormatReason::TruncatedRecord)
        })?;
        let slice = buf.get(start..end).ok_or_else(|| {
            WireFormatError::decode("rdata", start, WireFormatReason::TruncatedRecord)
        })?;

        match r#type {
            Type::A => {
                if slice.len() != 4 {
                    return Err(WireFormatError::decode(
                        "rdata.a",
                        start,
                        WireFormatReason::TruncatedRecord,
                    ));
                }
                Ok(Rdata::A(Ipv4Addr::new(slice[0], slice[1], slice[2], slice[3])))
            }

            Type::PTR => {
                let (name, consumed_end) = crate::wire::name::read_name(buf, start)?;
                if consumed_end > end {
                    return Err(WireFormatError::decode(
                        "rdata.ptr",
                        start,
                        WireFormatReason::TruncatedRecord,
                    ));
                }
                Ok(Rdata::Ptr(name))
            }

            Type::TXT => Ok(Rdata::Txt(TxtRecord::from_raw(slice.to_vec()))),

            Type::SRV => {
                if rdlength < 7 {
                    return Err(WireFormatError::decode(
                        "rdata.srv",
                        start,
                        WireFormatReason::TruncatedRecord,
                    ));
                }
                let priority = BigEndian::read_u16(&buf[start..start + 2]);
                let weight = BigEndian::read_u16(&buf[start + 2..start + 4]);
                let port = BigEndian::read_u16(&buf[start + 4..start + 6]);
                let (target, consumed_end) = crate::wire::name::read_name(buf, start + 6)?;
                if consumed_end > end {
                    return Err(WireFormatError::decode(
                        "rdata.srv",
                        start,
                        WireFormatReason::TruncatedRecord,
                    ));
                }
                Ok(Rdata::Srv(Srv {
                    priority,
                    weight,
                    port,
                    target,
                }))
            }

            Type::ANY | Type::Unknown(_) => Ok(Rdata::Unknown(slice.to_vec())),
        }
    }

    pub fn write(
        &self,
        buf: &mut Vec<u8>,
        compressor: &mut NameCompressor,
    ) -> Result<(), WireFormatError> {
        match self {
            Rdata::A(ip) => {
                buf.extend_from_slice(&ip.octets());
            }
            Rdata::Ptr(name) => {
                compressor.write_name(buf, name)?;
            }
            Rdata::Txt(txt) => {
                buf.extend_from_slice(txt.as_bytes());
            }
            Rdata::Srv(srv) => {
                buf.extend_from_slice(&srv.priority.to_be_bytes());
                buf.extend_from_slice(&srv.weight.to_be_bytes());
                buf.extend_from_slice(&srv.port.to_be_bytes());
                // SRV/PTR targets are themselves compressible names, but we
                // deliberately write them uncompressed-relative-to-earlier
                // RDATA: compressing into the interior of a record whose
                // type we don't fully control the framing of is the
                // defensive posture §4.1 asks for. We still let them
                // compress against names written earlier in the message.
                compressor.write_name(buf, &srv.target)?;
            }
            Rdata::Unknown(bytes) => {
                buf.extend_from_slice(bytes);
            }
        }
        Ok(())
    }

    pub fn r#type(&self) -> crate::wire::enums::Type {
        use crate::wire::enums::Type;
        match self {
            Rdata::A(_) => Type::A,
            Rdata::Ptr(_) => Type::PTR,
            Rdata::Txt(_) => Type::TXT,
            Rdata::Srv(_) => Type::SRV,
            Rdata::Unknown(_) => Type::Unknown(0),
        }
    }
}

impl fmt::Display for Rdata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rdata::A(ip) => ip.fmt(f),
            Rdata::Ptr(name) => name.fmt(f),
            Rdata::Txt(txt) => txt.fmt(f),
            Rdata::Srv(srv) => srv.fmt(f),
            Rdata::Unknown(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_txt_is_single_zero_byte() {
        let txt = TxtRecord::empty();
        assert_eq!(txt.as_bytes(), &[0]);
        assert_eq!(txt.encoded_len(), 1);
    }

    #[test]
    fn from_entries_empty_iterator_is_still_canonical_empty() {
        let txt = TxtRecord::from_entries(std::iter::empty()).unwrap();
        assert_eq!(txt.as_bytes(), &[0]);
    }

    #[test]
    fn txt_iter_splits_key_value_on_first_equals() {
        let txt = TxtRecord::from_entries(vec![
            ("version", Some(b"1.0".as_ref())),
            ("path", Some(b"/".as_ref())),
        ])
        .unwrap();

        let parsed: Vec<_> = txt
            .iter()
            .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), v.map(|v| String::from_utf8_lossy(v).into_owned())))
            .collect();

        assert_eq!(
            parsed,
            vec![
                ("version".to_string(), Some("1.0".to_string())),
                ("path".to_string(), Some("/".to_string())),
            ]
        );
    }

    #[test]
    fn srv_rejects_rdlength_under_7() {
        let buf = [0u8; 6];
        let err = Rdata::parse(&buf, 0, 6, crate::wire::enums::Type::SRV).unwrap_err();
        assert_eq!(err.reason, WireFormatReason::TruncatedRecord);
    }

    #[test]
    fn unknown_type_is_preserved_opaque() {
        let buf = [1, 2, 3, 4, 5];
        let rdata = Rdata::parse(&buf, 0, 5, crate::wire::enums::Type::Unknown(999)).unwrap();
        assert_eq!(rdata, Rdata::Unknown(vec![1, 2, 3, 4, 5]));
    }
}
