//! Channel abstraction for the PWDongle's two command front-ends
//!
//! The dongle talks to a host over USB-CDC serial and to a phone over a BLE
//! UART-style service. Both are treated as byte-oriented duplex channels:
//!
//! ```text
//! [StdioChannel / TcpChannel / MemoryChannel]  ← implements ByteChannel (raw I/O)
//!                    |
//!               [LineLink]                     ← framing, chunked writes, drain cap
//!                    |
//!            [command sessions]
//! ```

pub mod error;
pub mod framer;
pub mod link;
pub mod memory;
pub mod stdio;
pub mod tcp;

pub use error::TransportError;
pub use framer::{Line, LineFramer};
pub use link::LineLink;
pub use memory::{HostEnd, MemoryChannel};
pub use stdio::StdioChannel;
pub use tcp::TcpChannel;

use std::fmt;

/// Largest BLE notification payload with the default ATT MTU.
pub const BLE_CHUNK_SIZE: usize = 20;

/// Transport identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// USB CDC serial port
    Serial,
    /// BLE UART service
    Ble,
}

impl TransportKind {
    pub fn is_wireless(&self) -> bool {
        matches!(self, Self::Ble)
    }

    /// Default write chunk size (None means unlimited).
    pub fn default_chunk_size(&self) -> Option<usize> {
        match self {
            Self::Serial => None,
            Self::Ble => Some(BLE_CHUNK_SIZE),
        }
    }

    /// Line terminator appended to outgoing lines.
    pub fn line_ending(&self) -> &'static str {
        match self {
            Self::Serial => "\r\n",
            Self::Ble => "\n",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => f.write_str("Serial"),
            Self::Ble => f.write_str("BLE"),
        }
    }
}

/// The core channel trait: all back-ends implement this
///
/// Reads never block. A back-end with nothing to deliver returns `Ok(0)`.
pub trait ByteChannel {
    /// Copy available input into `buf`, returning how many bytes were read
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Send one chunk (one serial write or one BLE notification)
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransportError>;

    fn kind(&self) -> TransportKind;

    /// Whether a peer is attached (BLE central connected, serial open)
    fn is_connected(&self) -> bool {
        true
    }
}

impl<C: ByteChannel + ?Sized> ByteChannel for Box<C> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read_available(buf)
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write_chunk(data)
    }

    fn kind(&self) -> TransportKind {
        (**self).kind()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
