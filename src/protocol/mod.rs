//! Protocol module - GDL-90 wire protocol
//!
//! Every message on the wire is an independently framed datagram:
//! - 0x7E flag byte
//! - byte-stuffed (payload + CRC-16/CCITT, low byte first)
//! - 0x7E flag byte
//!
//! The payload starts with a one-byte message ID. Only the encode
//! direction is used in production; decoding exists for tests.

mod codec;
mod message;

pub use codec::*;
pub use message::*;

/// Flag byte delimiting every frame
pub const FLAG_BYTE: u8 = 0x7E;

/// Escape byte for byte-stuffing
pub const CONTROL_ESCAPE: u8 = 0x7D;

/// XOR applied to the byte following an escape
pub const ESCAPE_XOR: u8 = 0x20;

/// Message ID: heartbeat
pub const MSG_ID_HEARTBEAT: u8 = 0x00;

/// Message ID: ownship report
pub const MSG_ID_OWNSHIP: u8 = 0x0A;

/// Message ID: ForeFlight extension (AHRS uses sub-ID 0x01)
pub const MSG_ID_FOREFLIGHT: u8 = 0x65;

/// Sub-ID of the AHRS message within the ForeFlight extension
pub const SUB_ID_AHRS: u8 = 0x01;

/// Default port receivers listen on for GDL-90 telemetry
pub const DEFAULT_TELEMETRY_PORT: u16 = 4000;
