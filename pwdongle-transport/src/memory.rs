//! In-process channel pair, used by tests and the simulator.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::{ByteChannel, TransportKind};

#[derive(Debug, Default)]
struct Pipe {
    to_device: VecDeque<u8>,
    from_device: Vec<Vec<u8>>,
    connected: bool,
}

/// Device side of a memory pipe.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    kind: TransportKind,
    pipe: Arc<Mutex<Pipe>>,
}

/// Host (or phone) side of a memory pipe.
#[derive(Debug, Clone)]
pub struct HostEnd {
    pipe: Arc<Mutex<Pipe>>,
}

impl MemoryChannel {
    pub fn pair(kind: TransportKind) -> (MemoryChannel, HostEnd) {
        let pipe = Arc::new(Mutex::new(Pipe {
            connected: true,
            ..Pipe::default()
        }));
        (
            MemoryChannel {
                kind,
                pipe: pipe.clone(),
            },
            HostEnd { pipe },
        )
    }
}

impl ByteChannel for MemoryChannel {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut pipe = self.pipe.lock();
        let n = buf.len().min(pipe.to_device.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.to_device.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut pipe = self.pipe.lock();
        if !pipe.connected {
            return Err(TransportError::Closed);
        }
        pipe.from_device.push(data.to_vec());
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn is_connected(&self) -> bool {
        self.pipe.lock().connected
    }
}

impl HostEnd {
    /// Queue raw text for the device.
    pub fn send(&self, text: &str) {
        self.pipe.lock().to_device.extend(text.as_bytes());
    }

    /// Queue a line terminated with `\n`.
    pub fn send_line(&self, text: &str) {
        let mut pipe = self.pipe.lock();
        pipe.to_device.extend(text.as_bytes());
        pipe.to_device.push_back(b'\n');
    }

    /// Every write the device made since the last take, one entry per chunk.
    pub fn take_chunks(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pipe.lock().from_device)
    }

    /// Device output joined and split into lines (terminators removed).
    pub fn take_lines(&self) -> Vec<String> {
        let bytes: Vec<u8> = self.take_chunks().concat();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect()
    }

    pub fn disconnect(&self) {
        self.pipe.lock().connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_roundtrip() {
        let (mut dev, host) = MemoryChannel::pair(TransportKind::Serial);
        host.send_line("ABOUT");
        let mut buf = [0u8; 4];
        assert_eq!(dev.read_available(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ABOU");
        assert_eq!(dev.read_available(&mut buf).unwrap(), 2);
        assert_eq!(dev.read_available(&mut buf).unwrap(), 0);

        dev.write_chunk(b"OK: one\r\nOK: two\r\n").unwrap();
        assert_eq!(host.take_lines(), vec!["OK: one", "OK: two"]);
    }

    #[test]
    fn test_write_after_disconnect() {
        let (mut dev, host) = MemoryChannel::pair(TransportKind::Ble);
        host.disconnect();
        assert!(!dev.is_connected());
        assert!(matches!(dev.write_chunk(b"x"), Err(TransportError::Closed)));
    }
}
