//! Macro file playback.
//!
//! A file's dialect is guessed from its content: advanced script first,
//! then DuckyScript (only when the file has no `{{` tokens), and plain token
//! macro text otherwise.

use std::fmt;

use pwdongle_hid::{HidError, HidSink};
use thiserror::Error;
use tracing::{debug, info};

use crate::ducky::{is_ducky_script, DuckyInterpreter};
use crate::files::{FileError, FileStore};
use crate::macro_text::MacroEngine;
use crate::script::{is_advanced_script, ScriptEngine};

/// Per-byte pause when typing a file raw.
pub const DEFAULT_FILE_PACING_MS: u32 = 3;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Hid(#[from] HidError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Advanced,
    Ducky,
    Macro,
}

impl Dialect {
    pub fn detect(content: &str) -> Self {
        if is_advanced_script(content) {
            Dialect::Advanced
        } else if !content.contains("{{") && is_ducky_script(content) {
            Dialect::Ducky
        } else {
            Dialect::Macro
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Advanced => f.write_str("advanced script"),
            Dialect::Ducky => f.write_str("DuckyScript"),
            Dialect::Macro => f.write_str("token macro"),
        }
    }
}

/// Plays file content in whichever dialect it is written in.
#[derive(Debug)]
pub struct Player {
    script: ScriptEngine,
    ducky: DuckyInterpreter,
    file_pacing_ms: u32,
}

impl Default for Player {
    fn default() -> Self {
        Self::new(ScriptEngine::default(), DEFAULT_FILE_PACING_MS)
    }
}

impl Player {
    pub fn new(script: ScriptEngine, file_pacing_ms: u32) -> Self {
        Self {
            script,
            ducky: DuckyInterpreter::new(),
            file_pacing_ms,
        }
    }

    pub fn script(&self) -> &ScriptEngine {
        &self.script
    }

    pub fn play<S: HidSink>(
        &mut self,
        sink: &mut S,
        macros: &mut MacroEngine,
        content: &str,
    ) -> Result<Dialect, HidError> {
        let dialect = Dialect::detect(content);
        debug!("Playing {} bytes as {dialect}", content.len());
        match dialect {
            Dialect::Advanced => {
                self.script.run(sink, macros, content)?;
            }
            Dialect::Ducky => self.ducky.run(sink, content)?,
            Dialect::Macro => macros.run(sink, content)?,
        }
        Ok(dialect)
    }

    pub fn play_file<S: HidSink>(
        &mut self,
        sink: &mut S,
        macros: &mut MacroEngine,
        files: &dyn FileStore,
        name: &str,
    ) -> Result<Dialect, PlaybackError> {
        let data = files.read(name)?;
        let content = String::from_utf8_lossy(&data);
        info!("Playing {name}");
        Ok(self.play(sink, macros, &content)?)
    }

    /// Type a file byte for byte, with no token or script handling.
    pub fn type_raw<S: HidSink>(
        &self,
        sink: &mut S,
        files: &dyn FileStore,
        name: &str,
    ) -> Result<usize, PlaybackError> {
        let data = files.read(name)?;
        info!("Typing {name} ({} bytes)", data.len());
        for &byte in &data {
            sink.type_char(byte as char)?;
            if self.file_pacing_ms > 0 {
                sink.delay(self.file_pacing_ms)?;
            }
        }
        Ok(data.len())
    }
}
