//! Serial console emulated on the process's stdin/stdout.
//!
//! Stdin is read on a helper thread and handed over through an unbounded
//! channel so `read_available` never blocks the scheduler.

use std::io::{Read, Write};

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::debug;

use crate::error::TransportError;
use crate::{ByteChannel, TransportKind};

pub struct StdioChannel {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Bytes received but not yet handed out
    carry: Vec<u8>,
    eof: bool,
}

impl StdioChannel {
    /// Start the stdin reader thread.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let mut stdin = std::io::stdin();
            let mut buf = [0u8; 256];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("stdin read failed: {e}");
                        break;
                    }
                }
            }
        });
        Self {
            rx,
            carry: Vec::new(),
            eof: false,
        }
    }

    /// Stdin has been closed and every byte consumed.
    pub fn at_eof(&self) -> bool {
        self.eof && self.carry.is_empty()
    }
}

impl ByteChannel for StdioChannel {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.carry.is_empty() {
            match self.rx.try_recv() {
                Ok(data) => self.carry = data,
                Err(TryRecvError::Empty) => return Ok(0),
                Err(TryRecvError::Disconnected) => {
                    self.eof = true;
                    return Ok(0);
                }
            }
        }
        let n = buf.len().min(self.carry.len());
        buf[..n].copy_from_slice(&self.carry[..n]);
        self.carry.drain(..n);
        Ok(n)
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut out = std::io::stdout().lock();
        out.write_all(data)?;
        out.flush()?;
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn is_connected(&self) -> bool {
        !self.at_eof()
    }
}
