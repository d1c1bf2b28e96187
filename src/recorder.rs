//! Live-action macro recorder.
//!
//! While recording, every live action arriving over BLE is appended to the
//! target file as two lines: the gap since the previous action as a
//! `{{DELAY:n}}` token, then the action itself as a token. The result plays
//! back through the token interpreter with the original timing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::files::{FileError, FileStore};
use crate::macro_text::{MacroToken, MAX_DELAY_MS};

/// Millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Active {
    file: String,
    started_ms: u64,
    last_ms: u64,
}

pub struct Recorder {
    clock: Box<dyn Clock>,
    active: Option<Active>,
}

impl Recorder {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// File currently being recorded to.
    pub fn file(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.file.as_str())
    }

    /// Start recording into `file`, truncating it.
    pub fn start(&mut self, files: &mut dyn FileStore, file: &str) -> Result<(), FileError> {
        files.write(file, b"")?;
        let now = self.clock.now_ms();
        info!("Recording to {file}");
        self.active = Some(Active {
            file: file.to_string(),
            started_ms: now,
            last_ms: now,
        });
        Ok(())
    }

    /// Append one action. Does nothing when not recording.
    pub fn record(&mut self, files: &mut dyn FileStore, token: &MacroToken) -> Result<(), FileError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        let now = self.clock.now_ms();
        // DELAY tokens clamp on playback; longer pauses are split
        let mut gap = now.saturating_sub(active.last_ms);
        let mut entry = String::new();
        while gap > 0 {
            let step = gap.min(MAX_DELAY_MS as u64);
            entry.push_str(&format!("{}\n", MacroToken::Delay(step as u32)));
            gap -= step;
        }
        entry.push_str(&format!("{token}\n"));
        files.append(&active.file, entry.as_bytes())?;
        debug!("Recorded {token}");
        active.last_ms = now;
        Ok(())
    }

    /// Stop recording. Returns the file and the recording length in whole
    /// seconds.
    pub fn stop(&mut self) -> Option<(String, u64)> {
        let active = self.active.take()?;
        let secs = self.clock.now_ms().saturating_sub(active.started_ms) / 1000;
        info!("Recording saved to {} ({secs}s)", active.file);
        Some((active.file, secs))
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(Box::new(SystemClock::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::MemoryFileStore;
    use crate::macro_text::MouseCommand;

    fn recorder() -> (Recorder, ManualClock, MemoryFileStore) {
        let clock = ManualClock::new();
        (
            Recorder::new(Box::new(clock.clone())),
            clock,
            MemoryFileStore::new(),
        )
    }

    #[test]
    fn test_record_writes_delay_then_token() {
        let (mut rec, clock, mut files) = recorder();
        clock.set(1_000);
        rec.start(&mut files, "demo.txt").unwrap();
        clock.advance(250);
        rec.record(&mut files, &MacroToken::Key("enter".into())).unwrap();
        clock.advance(40);
        rec.record(&mut files, &MacroToken::Mouse(MouseCommand::MoveBy { dx: 5, dy: -2 }))
            .unwrap();

        assert_eq!(
            files.contents("demo.txt").unwrap(),
            "{{DELAY:250}}\n{{KEY:enter}}\n{{DELAY:40}}\n{{MOUSE:MOVE_REL:5,-2}}\n"
        );
    }

    #[test]
    fn test_start_truncates() {
        let (mut rec, _clock, mut files) = recorder();
        files.write("demo.txt", b"old content").unwrap();
        rec.start(&mut files, "demo.txt").unwrap();
        assert_eq!(files.contents("demo.txt").unwrap(), "");
        assert_eq!(rec.file(), Some("demo.txt"));
    }

    #[test]
    fn test_long_gaps_split() {
        let (mut rec, clock, mut files) = recorder();
        rec.start(&mut files, "r.txt").unwrap();
        clock.advance(12_000);
        rec.record(&mut files, &MacroToken::Text("x".into())).unwrap();
        assert_eq!(
            files.contents("r.txt").unwrap(),
            "{{DELAY:5000}}\n{{DELAY:5000}}\n{{DELAY:2000}}\n{{TEXT:x}}\n"
        );
    }

    #[test]
    fn test_stop_reports_seconds() {
        let (mut rec, clock, mut files) = recorder();
        assert_eq!(rec.stop(), None);
        rec.start(&mut files, "r.txt").unwrap();
        clock.advance(3_999);
        assert_eq!(rec.stop(), Some(("r.txt".to_string(), 3)));
        assert!(!rec.is_recording());
    }

    #[test]
    fn test_zero_gap_writes_no_delay() {
        let (mut rec, _clock, mut files) = recorder();
        rec.start(&mut files, "r.txt").unwrap();
        rec.record(&mut files, &MacroToken::Key("tab".into())).unwrap();
        assert_eq!(files.contents("r.txt").unwrap(), "{{KEY:tab}}\n");
    }

    #[test]
    fn test_record_when_idle_is_noop() {
        let (mut rec, _clock, mut files) = recorder();
        rec.record(&mut files, &MacroToken::Key("a".into())).unwrap();
        assert!(files.list().unwrap().is_empty());
    }
}
