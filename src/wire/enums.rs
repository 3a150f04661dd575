//! Wire-level enums: record [`Type`] and the class/flag-bit field.
//!
//! Unlike a general-purpose DNS library, Beacon only needs a handful of
//! record types (§3.1) but must preserve anything else as opaque RDATA so a
//! probe can still defend an unrecognised RRset (§3.1).

use std::fmt;

/// DNS record / question type. Unknown values are preserved rather than
/// rejected, so the codec never has to refuse to parse a message containing
/// a record type it doesn't interpret.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum Type {
    A,
    PTR,
    TXT,
    SRV,
    /// Only valid as a question type.
    ANY,
    Unknown(u16),
}

impl Type {
    pub const A_VALUE: u16 = 1;
    pub const PTR_VALUE: u16 = 12;
    pub const TXT_VALUE: u16 = 16;
    pub const SRV_VALUE: u16 = 33;
    pub const ANY_VALUE: u16 = 255;

    pub fn from_u16(v: u16) -> Type {
        match v {
            Type::A_VALUE => Type::A,
            Type::PTR_VALUE => Type::PTR,
            Type::TXT_VALUE => Type::TXT,
            Type::SRV_VALUE => Type::SRV,
            Type::ANY_VALUE => Type::ANY,
            other => Type::Unknown(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Type::A => Type::A_VALUE,
            Type::PTR => Type::PTR_VALUE,
            Type::TXT => Type::TXT_VALUE,
            Type::SRV => Type::SRV_VALUE,
            Type::ANY => Type::ANY_VALUE,
            Type::Unknown(v) => v,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::A => write!(f, "A"),
            Type::PTR => write!(f, "PTR"),
            Type::TXT => write!(f, "TXT"),
            Type::SRV => write!(f, "SRV"),
            Type::ANY => write!(f, "ANY"),
            Type::Unknown(v) => write!(f, "TYPE{}", v),
        }
    }
}

/// The DNS class field as it appears on the wire: low 15 bits are the class
/// (`IN` = 1), the high bit is repurposed by mDNS as the cache-flush bit on
/// a resource record, or the "QU" unicast-response bit on a question (§3.1,
/// §6.3). Keeping both in one newtype avoids accidentally comparing a class
/// that still has the high bit set against `ClassIn`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Class(u16);

impl Class {
    pub const IN: u16 = 1;
    pub const ANY: u16 = 255;

    pub fn new(value: u16, flag: bool) -> Class {
        Class((value & 0x7FFF) | if flag { 0x8000 } else { 0 })
    }

    pub fn from_raw(raw: u16) -> Class {
        Class(raw)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    /// The class value with the flag bit masked out.
    pub fn value(self) -> u16 {
        self.0 & 0x7FFF
    }

    /// The cache-flush (on a resource record) or QU (on a question) bit.
    pub fn flag(self) -> bool {
        self.0 & 0x8000 != 0
    }

    pub fn with_flag(self, flag: bool) -> Class {
        Class::new(self.value(), flag)
    }

    pub fn is_in(self) -> bool {
        self.value() == Class::IN
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.value() {
            Class::IN => write!(f, "IN"),
            Class::ANY => write!(f, "ANY"),
            other => write!(f, "CLASS{}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_roundtrip() {
        for v in [1u16, 12, 16, 33, 255, 9999] {
            assert_eq!(Type::from_u16(v).to_u16(), v);
        }
    }

    #[test]
    fn class_masks_flag_independently_of_value() {
        let c = Class::new(Class::IN, true);
        assert_eq!(c.value(), Class::IN);
        assert!(c.flag());
        assert_eq!(c.raw(), 0x8001);

        let c2 = Class::new(Class::IN, false);
        assert!(!c2.flag());
        assert_eq!(c2.raw(), 1);
    }
}
