//! Domain name reading/writing with RFC 1035 §4.1.4 compression.
//!
//! Grounded on the teacher's `io::DNSReadExt::read_qname` (label-at-a-time
//! Cursor walk with a single compression jump) but hardened per spec §3.1:
//! a bounded jump count (128) instead of a single jump, a running total
//! length cap of 255 bytes across jumps, and explicit [`WireFormatError`]
//! variants with byte offsets instead of a generic `io::Error`.

use crate::error::{WireFormatError, WireFormatReason};
use std::collections::HashMap;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;
const MAX_POINTER_CHAIN: u32 = 128;

/// Reads a (possibly compressed) domain name starting at `start`.
///
/// Returns the dotted, lower-case-preserving name (root is `"."`) and the
/// offset of the byte immediately following the name *as it appears at
/// `start`* (i.e. following the first terminating `0x00` or 2-byte pointer,
/// not following any jumped-to data).
pub fn read_name(buf: &[u8], start: usize) -> Result<(String, usize), WireFormatError> {
    let mut labels: Vec<&[u8]> = Vec::new();
    let mut cursor = start;
    let mut end_of_name: Option<usize> = None;
    let mut jumps: u32 = 0;
    let mut total_len: usize = 0;

    loop {
        let len = *buf.get(cursor).ok_or_else(|| {
            WireFormatError::decode("name", cursor, WireFormatReason::TruncatedRecord)
        })?;

        match len & 0xC0 {
            0x00 => {
                if len == 0 {
                    if end_of_name.is_none() {
                        end_of_name = Some(cursor + 1);
                    }
                    break;
                }

                let label_len = len as usize;
                if label_len > MAX_LABEL_LEN {
                    return Err(WireFormatError::decode(
                        "name.label",
                        cursor,
                        WireFormatReason::LabelTooLong,
                    ));
                }

                let label_start = cursor + 1;
                let label_end = label_start + label_len;
                let label = buf.get(label_start..label_end).ok_or_else(|| {
                    WireFormatError::decode(
                        "name.label",
                        label_start,
                        WireFormatReason::TruncatedRecord,
                    )
                })?;

                total_len += label_len + 1;
                if total_len > MAX_NAME_LEN {
                    return Err(WireFormatError::decode(
                        "name",
                        start,
                        WireFormatReason::NameTooLong,
                    ));
                }

                labels.push(label);
                cursor = label_end;
            }

            0xC0 => {
                let lo = *buf.get(cursor + 1).ok_or_else(|| {
                    WireFormatError::decode(
                        "name.pointer",
                        cursor,
                        WireFormatReason::TruncatedRecord,
                    )
                })?;
                let ptr = (((len & 0x3F) as usize) << 8) | lo as usize;

                if end_of_name.is_none() {
                    end_of_name = Some(cursor + 2);
                }

                // A pointer must refer strictly backward of its own
                // position: this both forbids forward references into
                // not-yet-parsed data and (combined with the jump-count
                // bound below) guarantees termination, since the cursor is
                // then strictly decreasing across jumps.
                if ptr >= cursor {
                    return Err(WireFormatError::decode(
                        "name.pointer",
                        cursor,
                        WireFormatReason::CompressionLoop,
                    ));
                }

                jumps += 1;
                if jumps > MAX_POINTER_CHAIN {
                    return Err(WireFormatError::decode(
                        "name.pointer",
                        cursor,
                        WireFormatReason::CompressionLoop,
                    ));
                }

                cursor = ptr;
            }

            _ => {
                return Err(WireFormatError::decode(
                    "name.label",
                    cursor,
                    WireFormatReason::BadHeader,
                ))
            }
        }
    }

    let name = labels_to_string(&labels)?;
    Ok((name, end_of_name.expect("loop only exits after setting end_of_name")))
}

fn labels_to_string(labels: &[&[u8]]) -> Result<String, WireFormatError> {
    if labels.is_empty() {
        return Ok(".".to_string());
    }

    let mut out = String::new();
    for label in labels {
        let s = std::str::from_utf8(label).map_err(|_| {
            WireFormatError::decode("name.label", 0, WireFormatReason::InvalidUtf8)
        })?;
        out.push_str(s);
        out.push('.');
    }
    Ok(out)
}

/// Tracks already-written name suffixes so [`write_name`] can emit
/// compression pointers instead of repeating labels, per §4.1's policy:
/// "emit a pointer when the remaining suffix matches and the offset fits in
/// 14 bits".
#[derive(Default)]
pub struct NameCompressor {
    // canonical (lower-cased) dotted suffix -> offset in the message.
    offsets: HashMap<String, u16>,
}

impl NameCompressor {
    pub fn new() -> Self {
        NameCompressor::default()
    }

    /// Writes `name` (a dotted name, root as "." or "") into `buf`,
    /// compressing against any suffix previously written through this
    /// compressor.
    pub fn write_name(&mut self, buf: &mut Vec<u8>, name: &str) -> Result<(), WireFormatError> {
        let labels = split_labels(name)?;

        // Find the longest suffix (by label count) that we've already
        // written at a pointer-reachable offset.
        let mut best_match: Option<(usize, u16)> = None; // (labels consumed, offset)
        for i in 0..labels.len() {
            let suffix = canonical_suffix(&labels[i..]);
            if let Some(&offset) = self.offsets.get(&suffix) {
                best_match = Some((i, offset));
                break;
            }
        }

        let (emit_upto, pointer) = match best_match {
            Some((i, offset)) => (i, Some(offset)),
            None => (labels.len(), None),
        };

        let mut offset_cursor = buf.len();
        for (i, label) in labels.iter().enumerate().take(emit_upto) {
            if offset_cursor <= 0x3FFF {
                let suffix = canonical_suffix(&labels[i..]);
                self.offsets.entry(suffix).or_insert(offset_cursor as u16);
            }

            if label.len() > MAX_LABEL_LEN {
                return Err(WireFormatError::encode(
                    "name.label",
                    buf.len(),
                    WireFormatReason::LabelTooLong,
                ));
            }

            buf.push(label.len() as u8);
            buf.extend_from_slice(label);
            offset_cursor = buf.len();
        }

        match pointer {
            Some(offset) => {
                buf.push(0xC0 | ((offset >> 8) as u8));
                buf.push((offset & 0xFF) as u8);
            }
            None => buf.push(0),
        }

        Ok(())
    }
}

fn split_labels(name: &str) -> Result<Vec<&[u8]>, WireFormatError> {
    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut labels = Vec::new();
    let mut total = 0usize;
    for label in trimmed.split('.') {
        if label.is_empty() {
            return Err(WireFormatError::encode(
                "name",
                0,
                WireFormatReason::BadHeader,
            ));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(WireFormatError::encode(
                "name.label",
                0,
                WireFormatReason::LabelTooLong,
            ));
        }
        total += label.len() + 1;
        if total > MAX_NAME_LEN {
            return Err(WireFormatError::encode(
                "name",
                0,
                WireFormatReason::NameTooLong,
            ));
        }
        labels.push(label.as_bytes());
    }
    Ok(labels)
}

fn canonical_suffix(labels: &[&[u8]]) -> String {
    labels
        .iter()
        .map(|l| String::from_utf8_lossy(l).to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(".")
}
