//! Error taxonomy for Beacon, per the propagation policy: structural, typed
//! errors instead of a generic string, so callers can match on what actually
//! went wrong (see DESIGN.md).

use std::fmt;
use std::io;
use thiserror::Error;

/// Which codec operation produced a [`WireFormatError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Decode,
    Encode,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Decode => write!(f, "decode"),
            Operation::Encode => write!(f, "encode"),
        }
    }
}

/// Why a [`WireFormatError`] was raised.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum WireFormatReason {
    TooShort,
    BadHeader,
    CompressionLoop,
    LabelTooLong,
    NameTooLong,
    SectionCountMismatch,
    TruncatedRecord,
    MessageTooLarge,
    InvalidUtf8,
    /// Informational: a non-zero OPCODE was seen and ignored per RFC 6762
    /// §18.3. The message is still accepted.
    UnknownOpcodeIgnored,
}

impl fmt::Display for WireFormatReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            WireFormatReason::TooShort => "buffer too short",
            WireFormatReason::BadHeader => "malformed header",
            WireFormatReason::CompressionLoop => "compression pointer loop",
            WireFormatReason::LabelTooLong => "label exceeds 63 bytes",
            WireFormatReason::NameTooLong => "name exceeds 255 bytes",
            WireFormatReason::SectionCountMismatch => "section count did not match records parsed",
            WireFormatReason::TruncatedRecord => "record truncated",
            WireFormatReason::MessageTooLarge => "message exceeds 9000 bytes",
            WireFormatReason::InvalidUtf8 => "label is not valid utf-8",
            WireFormatReason::UnknownOpcodeIgnored => "non-zero opcode ignored",
        };
        write!(f, "{}", s)
    }
}

/// Raised by the wire codec on adversarial or malformed input. Never causes
/// a panic; the offending packet is dropped by the caller and this error is
/// logged at debug level (see §7 of the spec).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed at offset {offset} ({field}): {reason}")]
pub struct WireFormatError {
    pub operation: Operation,
    pub field: &'static str,
    pub offset: usize,
    pub reason: WireFormatReason,
}

impl WireFormatError {
    pub fn decode(field: &'static str, offset: usize, reason: WireFormatReason) -> Self {
        WireFormatError {
            operation: Operation::Decode,
            field,
            offset,
            reason,
        }
    }

    pub fn encode(field: &'static str, offset: usize, reason: WireFormatReason) -> Self {
        WireFormatError {
            operation: Operation::Encode,
            field,
            offset,
            reason,
        }
    }

    /// True for the informational, message-still-accepted case.
    pub fn is_informational(&self) -> bool {
        matches!(self.reason, WireFormatReason::UnknownOpcodeIgnored)
    }
}

/// Transport-layer failures. Transient send failures are retried once by
/// the responder; receive errors other than timeout/cancel are logged and
/// the receive task continues unless the socket is closed.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("socket io error: {0}")]
    Io(#[from] io::Error),

    #[error("transport closed")]
    Closed,
}

/// Rejections of caller-supplied input (§3.2, §6.1). Each variant names the
/// offending field and value so the error is directly actionable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid service type '{0}': must match _<service>._<tcp|udp>.local")]
    InvalidServiceType(String),

    #[error("invalid instance name '{0}': must be 1-63 utf-8 bytes with no leading/trailing spaces")]
    InvalidInstanceName(String),

    #[error("invalid port {0}: must be in 1..=65535")]
    InvalidPort(u32),

    #[error("txt records encode to {0} bytes, exceeding the 1300 byte budget")]
    TxtRecordTooLarge(usize),

    #[error("txt entry '{0}' encodes to {1} bytes, exceeding the 255 byte budget")]
    TxtEntryTooLarge(String, usize),

    #[error("service '{0}' is already registered")]
    ServiceAlreadyRegistered(String),
}

/// Internal protocol error: a name conflict was discovered during probing.
/// Never surfaced directly; drives the state machine's rename loop and is
/// only visible to the caller as [`Error::MaxConflicts`] once the rename
/// bound is exhausted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("exceeded {attempts} conflict rename attempts")]
pub struct ConflictError {
    pub attempts: u8,
}

/// The top-level error type returned from the public API (§6.1).
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Wire(#[from] WireFormatError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("exceeded maximum conflict rename attempts ({attempts})")]
    MaxConflicts { attempts: u8 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("handle closed")]
    Closed,
}

impl From<ConflictError> for Error {
    fn from(e: ConflictError) -> Self {
        Error::MaxConflicts {
            attempts: e.attempts,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
