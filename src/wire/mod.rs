//! The wire codec layer (L1): domain names, record types, and the
//! `Message` envelope. Pure functions over byte slices, no I/O, no
//! knowledge of multicast or the state machine above it.

pub mod enums;
pub mod message;
pub mod name;
pub mod rdata;

pub use enums::{Class, Type};
pub use message::{Message, Question, Record, MAX_MESSAGE_LEN};
pub use name::{read_name, NameCompressor};
pub use rdata::{Rdata, Srv, TxtRecord};
