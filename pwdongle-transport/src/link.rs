//! Line-level wrapper over a [`ByteChannel`].
//!
//! `LineLink` adds framing on the read side and chunking on the write side.
//! Received lines queue up until the owner drains them; [`LineLink::drain`]
//! takes at most a fixed number per call so one chatty peer cannot starve the
//! rest of a cooperative scheduler.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::error::TransportError;
use crate::framer::{Line, LineFramer};
use crate::{ByteChannel, TransportKind};

const READ_BUF_SIZE: usize = 256;

pub struct LineLink<C: ByteChannel> {
    channel: C,
    framer: LineFramer,
    queue: VecDeque<Line>,
    chunk_size: Option<usize>,
}

impl<C: ByteChannel> LineLink<C> {
    pub fn new(channel: C) -> Self {
        let chunk_size = channel.kind().default_chunk_size();
        Self {
            channel,
            framer: LineFramer::new(),
            queue: VecDeque::new(),
            chunk_size,
        }
    }

    /// Override the write chunk size (e.g. after an MTU exchange).
    pub fn with_chunk_size(mut self, size: Option<usize>) -> Self {
        self.chunk_size = size.filter(|&s| s > 0);
        self
    }

    pub fn kind(&self) -> TransportKind {
        self.channel.kind()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Lines received but not yet drained.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Pull everything the channel has ready into the line queue.
    pub fn poll(&mut self) -> Result<(), TransportError> {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            let n = self.channel.read_available(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            let lines = self.framer.push(&buf[..n]);
            if !lines.is_empty() {
                trace!("{}: framed {} line(s)", self.kind(), lines.len());
            }
            self.queue.extend(lines);
        }
    }

    /// Next queued line, polling the channel first if the queue is empty.
    pub fn next_line(&mut self) -> Result<Option<Line>, TransportError> {
        if self.queue.is_empty() {
            self.poll()?;
        }
        Ok(self.queue.pop_front())
    }

    /// Take at most `max` lines; anything beyond stays queued for later.
    pub fn drain(&mut self, max: usize) -> Result<Vec<Line>, TransportError> {
        self.poll()?;
        let take = max.min(self.queue.len());
        if take < self.queue.len() {
            debug!(
                "{}: drain cap reached, {} line(s) deferred",
                self.kind(),
                self.queue.len() - take
            );
        }
        Ok(self.queue.drain(..take).collect())
    }

    /// Send `text` plus the transport's line ending, chunked as needed.
    pub fn send_line(&mut self, text: &str) -> Result<(), TransportError> {
        let mut data = Vec::with_capacity(text.len() + 2);
        data.extend_from_slice(text.as_bytes());
        data.extend_from_slice(self.kind().line_ending().as_bytes());
        self.send_raw(&data)
    }

    pub fn send_raw(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self.chunk_size {
            Some(size) => {
                for chunk in data.chunks(size) {
                    self.channel.write_chunk(chunk)?;
                }
                Ok(())
            }
            None => self.channel.write_chunk(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryChannel;

    #[test]
    fn test_ble_writes_are_chunked() {
        let (channel, host) = MemoryChannel::pair(TransportKind::Ble);
        let mut link = LineLink::new(channel);
        let text = "OK: Authorized. Please send NAME,DATA";
        link.send_line(text).unwrap();

        let chunks = host.take_chunks();
        assert!(chunks.iter().all(|c| c.len() <= 20));
        assert_eq!(chunks.len(), (text.len() + 1).div_ceil(20));
        let joined: Vec<u8> = chunks.concat();
        assert_eq!(joined, format!("{text}\n").into_bytes());
    }

    #[test]
    fn test_serial_writes_whole_line() {
        let (channel, host) = MemoryChannel::pair(TransportKind::Serial);
        let mut link = LineLink::new(channel);
        link.send_line("OK: Passwords updated").unwrap();
        let chunks = host.take_chunks();
        assert_eq!(chunks, vec![b"OK: Passwords updated\r\n".to_vec()]);
    }

    #[test]
    fn test_drain_cap_defers_excess() {
        let (channel, host) = MemoryChannel::pair(TransportKind::Ble);
        let mut link = LineLink::new(channel);
        host.send("a\nb\nc\nd\ne\n");

        let first = link.drain(2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].text, "a");
        assert_eq!(link.queued(), 3);

        let rest = link.drain(10).unwrap();
        let texts: Vec<_> = rest.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "d", "e"]);
    }

    #[test]
    fn test_next_line() {
        let (channel, host) = MemoryChannel::pair(TransportKind::Serial);
        let mut link = LineLink::new(channel);
        assert_eq!(link.next_line().unwrap(), None);
        host.send("HELP\r\n");
        assert_eq!(link.next_line().unwrap(), Some(Line::new("HELP", true)));
    }
}
