//! Line protocol state machine.
//!
//! Each transport gets its own [`Session`], so a half-finished PWUPDATE on
//! the serial console never changes what a BLE line means (and vice versa).
//! Shared state (credentials, codes, files, the HID sink) is lent to the
//! session per line through a [`Context`].
//!
//! BLE line handling order:
//!
//! 1. SAVE_MACRO capture, when active
//! 2. live passthrough (`TYPE:`, `KEY:`, `MOUSE:`, `GAMEPAD:`) in any state
//! 3. the pending dialog step, if any
//! 4. IDLE commands
//! 5. relay to the token interpreter (dual relay) or `ERR: Unknown command`

use pwdongle_hid::{usage, Chord, HidError, HidSink};
use pwdongle_transport::{ByteChannel, Line, LineLink, TransportError, TransportKind};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DongleConfig;
use crate::credentials::CredentialStore;
use crate::files::{list_text_files, macro_file_name, FileError, FileStore};
use crate::macro_text::{GamepadCommand, MacroEngine, MacroToken, MouseCommand};
use crate::playback::{PlaybackError, Player};
use crate::recorder::Recorder;
use crate::security::{primary_persisted, AccessCodes, Pin};
use crate::store::KeyValueStore;

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Hid(#[from] HidError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A file vanished or failed to read mid-playback
    #[error(transparent)]
    File(#[from] FileError),
}

impl From<PlaybackError> for SessionError {
    fn from(e: PlaybackError) -> Self {
        match e {
            PlaybackError::Hid(e) => SessionError::Hid(e),
            PlaybackError::File(e) => SessionError::File(e),
        }
    }
}

/// Where response lines go.
pub trait Responder {
    fn reply(&mut self, line: &str) -> Result<(), TransportError>;
}

impl Responder for Vec<String> {
    fn reply(&mut self, line: &str) -> Result<(), TransportError> {
        self.push(line.to_string());
        Ok(())
    }
}

impl<C: ByteChannel> Responder for LineLink<C> {
    fn reply(&mut self, line: &str) -> Result<(), TransportError> {
        self.send_line(line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    PwUpdateWaitCode,
    PwUpdateWaitData,
    RetrievePwWaitCode,
    ChangeLoginWaitOld,
    ChangeLoginWaitNew,
    /// Collecting macro lines until an empty one
    SaveMacro { file: String, buffer: String },
}

/// Everything a session may touch while handling one line.
pub struct Context<'a, S: HidSink> {
    pub sink: &'a mut S,
    pub macros: &'a mut MacroEngine,
    pub player: &'a mut Player,
    pub store: &'a mut dyn KeyValueStore,
    pub credentials: &'a mut CredentialStore,
    pub codes: &'a mut AccessCodes,
    pub files: &'a mut Option<Box<dyn FileStore>>,
    pub recorder: &'a mut Recorder,
    pub config: &'a DongleConfig,
}

/// Strip a case-insensitive `VERB:` prefix.
fn strip_verb<'l>(line: &'l str, verb: &str) -> Option<&'l str> {
    let head = line.get(..verb.len())?;
    head.eq_ignore_ascii_case(verb).then(|| &line[verb.len()..])
}

#[derive(Debug)]
pub struct Session {
    kind: TransportKind,
    state: SessionState,
}

impl Session {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            state: SessionState::Idle,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    /// Drop any dialog in progress after a failed line.
    pub fn abort(&mut self) {
        self.set_state(SessionState::Idle);
    }

    fn set_state(&mut self, state: SessionState) {
        if state != self.state {
            debug!("{} session: {:?} -> {:?}", self.kind, self.state, state);
        }
        self.state = state;
    }

    /// Handle one received line.
    pub fn handle_line<S: HidSink>(
        &mut self,
        line: &Line,
        ctx: &mut Context<'_, S>,
        out: &mut dyn Responder,
    ) -> Result<(), SessionError> {
        if let SessionState::SaveMacro { file, buffer } = &mut self.state {
            if !line.text.trim().is_empty() {
                buffer.push_str(&line.text);
                buffer.push('\n');
                return Ok(());
            }
            let (file, buffer) = (std::mem::take(file), std::mem::take(buffer));
            self.set_state(SessionState::Idle);
            return save_macro(ctx, out, &file, &buffer);
        }

        let text = line.text.trim();
        if text.is_empty() {
            return Ok(());
        }
        debug!("{} line: {text}", self.kind);

        if self.kind == TransportKind::Ble && live_action(ctx, out, text)? {
            return Ok(());
        }

        match std::mem::take(&mut self.state) {
            SessionState::Idle => self.idle(line, text, ctx, out),
            SessionState::PwUpdateWaitCode => {
                if ctx.codes.is_primary(Pin::parse_lenient(text)) {
                    out.reply("OK: Authorized. Please send NAME,DATA")?;
                    self.set_state(SessionState::PwUpdateWaitData);
                } else {
                    self.reject(out)?;
                }
                Ok(())
            }
            SessionState::PwUpdateWaitData => {
                match ctx.credentials.update_from_csv(ctx.store, text) {
                    Ok(count) => {
                        info!("{} session: stored {count} credential(s)", self.kind);
                        out.reply("OK: Passwords updated")?;
                    }
                    Err(e) => {
                        warn!("Password update failed: {e}");
                        out.reply("ERROR: Failed to store passwords")?;
                    }
                }
                Ok(())
            }
            SessionState::RetrievePwWaitCode => {
                if ctx.codes.is_primary(Pin::parse_lenient(text)) {
                    for entry in ctx.credentials.export_lines() {
                        out.reply(&entry)?;
                    }
                    out.reply("OK: Retrieved passwords")?;
                    info!("{} session: credentials retrieved", self.kind);
                } else {
                    self.reject(out)?;
                }
                Ok(())
            }
            SessionState::ChangeLoginWaitOld => {
                if ctx.codes.is_primary(Pin::parse_lenient(text)) {
                    out.reply("OK: Code accepted. Please enter the new code.")?;
                    self.set_state(SessionState::ChangeLoginWaitNew);
                } else {
                    self.reject(out)?;
                }
                Ok(())
            }
            SessionState::ChangeLoginWaitNew => {
                match text.parse::<Pin>() {
                    Ok(pin) => match ctx.codes.set_primary(ctx.store, pin) {
                        Ok(()) => out.reply("OK: New login code set")?,
                        Err(e) => {
                            warn!("Saving login code failed: {e}");
                            out.reply("ERROR: Failed to store login code")?;
                        }
                    },
                    Err(_) => out.reply("ERR: Login code must be 4 digits")?,
                }
                Ok(())
            }
            SessionState::SaveMacro { .. } => Ok(()),
        }
    }

    fn reject(&mut self, out: &mut dyn Responder) -> Result<(), SessionError> {
        info!("{} session: incorrect code", self.kind);
        out.reply("ERR: Incorrect code")?;
        self.set_state(SessionState::Idle);
        Ok(())
    }

    fn idle<S: HidSink>(
        &mut self,
        line: &Line,
        text: &str,
        ctx: &mut Context<'_, S>,
        out: &mut dyn Responder,
    ) -> Result<(), SessionError> {
        let upper = text.to_ascii_uppercase();
        match upper.as_str() {
            "HELP" => return self.help(out),
            "ABOUT" => return self.about(ctx, out),
            "PWUPDATE" => {
                out.reply("OK: Enter the login code to authorize PW update")?;
                self.set_state(SessionState::PwUpdateWaitCode);
                return Ok(());
            }
            "RETRIEVEPW" | "RETRIVEPW" => {
                out.reply("OK: Enter the login code")?;
                self.set_state(SessionState::RetrievePwWaitCode);
                return Ok(());
            }
            "CHANGELOGIN" => {
                out.reply("OK: Enter current login code.")?;
                self.set_state(SessionState::ChangeLoginWaitOld);
                return Ok(());
            }
            _ => {}
        }

        if self.kind == TransportKind::Ble && self.ble_command(text, &upper, ctx, out)? {
            return Ok(());
        }

        if self.kind == TransportKind::Ble && ctx.config.dual_relay {
            debug!("Relaying {} byte(s) to the host", line.text.len());
            ctx.macros.run(ctx.sink, &line.text)?;
            if line.crlf {
                ctx.sink.tap(Chord::key(usage::ENTER))?;
            }
            return Ok(());
        }

        out.reply("ERR: Unknown command")?;
        Ok(())
    }

    /// File and recorder commands. Returns whether `text` was one.
    fn ble_command<S: HidSink>(
        &mut self,
        text: &str,
        upper: &str,
        ctx: &mut Context<'_, S>,
        out: &mut dyn Responder,
    ) -> Result<bool, SessionError> {
        match upper {
            "STOPRECORD" | "STOP" => {
                match ctx.recorder.stop() {
                    Some((file, secs)) => {
                        out.reply(&format!("OK: Recording saved to {file} ({secs}s)"))?
                    }
                    None => out.reply("ERROR: Not currently recording")?,
                }
                return Ok(true);
            }
            "LIST" => {
                let Some(files) = ctx.files.as_deref() else {
                    out.reply("ERROR: SD card not available")?;
                    return Ok(true);
                };
                match list_text_files(files) {
                    Ok(names) => {
                        for name in &names {
                            out.reply(&format!("FILE: {name}"))?;
                        }
                        out.reply(&format!("OK: {} files", names.len()))?;
                    }
                    Err(e) => {
                        warn!("Listing files failed: {e}");
                        out.reply("ERROR: Cannot read SD card")?;
                    }
                }
                return Ok(true);
            }
            _ => {}
        }

        let (verb, arg) = if let Some(arg) = strip_verb(text, "RECORD:") {
            ("RECORD", arg)
        } else if let Some(arg) = strip_verb(text, "PLAY:") {
            ("PLAY", arg)
        } else if let Some(arg) = strip_verb(text, "VIEW:") {
            ("VIEW", arg)
        } else if let Some(arg) = strip_verb(text, "SAVE_MACRO:") {
            ("SAVE_MACRO", arg)
        } else if matches!(upper, "RECORD" | "PLAY" | "VIEW" | "SAVE_MACRO") {
            out.reply("ERROR: Missing filename")?;
            return Ok(true);
        } else {
            return Ok(false);
        };

        if arg.trim().is_empty() {
            out.reply("ERROR: Missing filename")?;
            return Ok(true);
        }
        let Ok(file) = macro_file_name(arg) else {
            out.reply("ERROR: Invalid filename")?;
            return Ok(true);
        };
        let Some(files) = ctx.files.as_deref_mut() else {
            out.reply("ERROR: SD card not available")?;
            return Ok(true);
        };

        match verb {
            "RECORD" => {
                if let Some((prev, secs)) = ctx.recorder.stop() {
                    out.reply(&format!("OK: Recording saved to {prev} ({secs}s)"))?;
                }
                match ctx.recorder.start(files, &file) {
                    Ok(()) => out.reply(&format!("OK: Recording started to {file}"))?,
                    Err(e) => {
                        warn!("Cannot record to {file}: {e}");
                        out.reply("ERROR: Cannot create file on SD card")?;
                    }
                }
            }
            "PLAY" => {
                if !files.exists(&file) {
                    out.reply("ERROR: File not found")?;
                    return Ok(true);
                }
                out.reply(&format!("OK: Playing {file}"))?;
                ctx.player.play_file(ctx.sink, ctx.macros, files, &file)?;
                out.reply("OK: Playback complete")?;
            }
            "VIEW" => match files.read(&file) {
                Ok(data) => {
                    for l in String::from_utf8_lossy(&data).lines() {
                        out.reply(l)?;
                    }
                    out.reply("OK: End of file")?;
                }
                Err(FileError::NotFound(_)) => out.reply("ERROR: File not found")?,
                Err(e) => {
                    warn!("Cannot read {file}: {e}");
                    out.reply("ERROR: Cannot read SD card")?;
                }
            },
            _ => {
                out.reply("OK: Ready to receive macro. Send empty line to finish.")?;
                info!("Receiving macro for {file}");
                self.set_state(SessionState::SaveMacro {
                    file,
                    buffer: String::new(),
                });
            }
        }
        Ok(true)
    }

    fn help(&self, out: &mut dyn Responder) -> Result<(), SessionError> {
        out.reply("OK: Commands:")?;
        out.reply("  HELP - show this list")?;
        out.reply("  ABOUT - firmware and storage info")?;
        out.reply("  PWUPDATE - update passwords (requires login auth)")?;
        out.reply("  RETRIEVEPW - retrieve stored passwords (requires login auth)")?;
        out.reply("  CHANGELOGIN - change the 4-digit login code")?;
        if self.kind == TransportKind::Ble {
            out.reply("  TYPE:text - type text on connected PC")?;
            out.reply("  KEY:enter - send key to PC (KEY:ctrl+c for combos)")?;
            out.reply("  MOUSE:MOVE_REL:10,0 - mouse action")?;
            out.reply("  GAMEPAD:PRESS A - gamepad action")?;
            out.reply("  RECORD:name / STOPRECORD - record live actions")?;
            out.reply("  PLAY:name - play a macro file")?;
            out.reply("  LIST - list macro files")?;
            out.reply("  VIEW:name - show a macro file")?;
            out.reply("  SAVE_MACRO:name - upload a macro, empty line ends")?;
        }
        out.reply("Usage: send command, then follow prompts from device")?;
        Ok(())
    }

    fn about<S: HidSink>(
        &self,
        ctx: &Context<'_, S>,
        out: &mut dyn Responder,
    ) -> Result<(), SessionError> {
        out.reply(&format!("OK: PWDongle firmware v{FIRMWARE_VERSION}"))?;
        out.reply(&format!("Device: {}", ctx.config.device_name))?;
        out.reply(&format!("Transport: {}", self.kind))?;
        out.reply(&format!("Stored credentials: {}", ctx.credentials.len()))?;
        out.reply("Login code: **** (masked)")?;
        let persisted = primary_persisted(&*ctx.store);
        out.reply(if persisted { "Persisted: Yes" } else { "Persisted: No" })?;
        Ok(())
    }
}

/// `TYPE:`, `KEY:`, `MOUSE:` and `GAMEPAD:` lines. Returns whether `text`
/// was one of them.
fn live_action<S: HidSink>(
    ctx: &mut Context<'_, S>,
    out: &mut dyn Responder,
    text: &str,
) -> Result<bool, SessionError> {
    let (token, reply) = if let Some(typed) = text.strip_prefix("TYPE:") {
        ctx.sink.type_str(typed, ctx.macros.default_speed_ms())?;
        (MacroToken::Text(typed.to_string()), "OK: Typed to PC")
    } else if let Some(key) = text.strip_prefix("KEY:") {
        let token = MacroToken::Key(key.trim().to_string());
        ctx.macros.run_token(ctx.sink, &token)?;
        (token, "OK: Key sent to PC")
    } else if let Some(args) = text.strip_prefix("MOUSE:") {
        let token = MacroToken::Mouse(MouseCommand::parse(args));
        ctx.macros.run_token(ctx.sink, &token)?;
        (token, "OK: Mouse action sent")
    } else if let Some(args) = text.strip_prefix("GAMEPAD:") {
        let token = MacroToken::Gamepad(GamepadCommand::parse(args));
        ctx.macros.run_token(ctx.sink, &token)?;
        (token, "OK: Gamepad action sent")
    } else {
        return Ok(false);
    };

    if ctx.recorder.is_recording() {
        match ctx.files.as_deref_mut() {
            Some(files) => {
                if let Err(e) = ctx.recorder.record(files, &token) {
                    warn!("Recording write failed: {e}");
                }
            }
            None => warn!("Recording active without SD card"),
        }
    }
    out.reply(reply)?;
    Ok(true)
}

fn save_macro<S: HidSink>(
    ctx: &mut Context<'_, S>,
    out: &mut dyn Responder,
    file: &str,
    content: &str,
) -> Result<(), SessionError> {
    let Some(files) = ctx.files.as_deref_mut() else {
        out.reply("ERROR: SD card not available")?;
        return Ok(());
    };
    match files.write(file, content.as_bytes()) {
        Ok(()) => {
            info!("Saved macro {file} ({} bytes)", content.len());
            out.reply(&format!("OK: Macro saved to {file} ({} bytes)", content.len()))?;
        }
        Err(e) => {
            warn!("Cannot save {file}: {e}");
            out.reply("ERROR: Cannot create file on SD card")?;
        }
    }
    Ok(())
}
