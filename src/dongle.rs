//! Cooperative dongle runtime.
//!
//! One [`Dongle::poll`] call is one pass of the firmware main loop: at most
//! `ble_drain_cap` BLE lines, then every pending button event, then every
//! queued serial line. Nothing runs concurrently; HID delays block the pass.
//!
//! The button drives a small mode machine:
//!
//! ```text
//! PinEntry --primary--> Menu (short: next entry, long: type secret + Enter)
//!          --file-----> FileEntry (4 digits name dddd.txt, typed raw)
//!          --BLE/CDC/MSC--> Restart(mode)
//!          --other----> PinEntry (pad reset)
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use pwdongle_hid::{usage, Chord, HidSink};
use pwdongle_transport::{ByteChannel, LineLink};
use tracing::{debug, info, warn};

use crate::config::DongleConfig;
use crate::credentials::CredentialStore;
use crate::error::DongleError;
use crate::files::FileStore;
use crate::macro_text::MacroEngine;
use crate::playback::{PlaybackError, Player};
use crate::recorder::{Clock, Recorder};
use crate::script::ScriptEngine;
use crate::security::{request_boot, AccessCodes, BootMode, Pin, PinMatch, PinPad};
use crate::session::{Context, Session, SessionError};
use crate::store::KeyValueStore;

/// Debounced button input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Short,
    Long,
}

/// The dongle's screen.
pub trait StatusDisplay {
    fn show_status(&mut self, text: &str);

    fn redraw_menu(&mut self, entries: &[String], selected: usize);
}

/// Display that writes to the log.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl StatusDisplay for LogDisplay {
    fn show_status(&mut self, text: &str) {
        info!("[display] {text}");
    }

    fn redraw_menu(&mut self, entries: &[String], selected: usize) {
        match entries.get(selected) {
            Some(entry) => info!("[display] menu {}/{}: {entry}", selected + 1, entries.len()),
            None => info!("[display] menu: no stored credentials"),
        }
    }
}

#[derive(Debug, Default)]
struct Screen {
    statuses: Vec<String>,
    menu: Option<(Vec<String>, usize)>,
}

/// Display that keeps what it was shown. Clones share the same screen.
#[derive(Debug, Clone, Default)]
pub struct MemoryDisplay {
    screen: Arc<Mutex<Screen>>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status message so far, oldest first.
    pub fn statuses(&self) -> Vec<String> {
        self.screen.lock().statuses.clone()
    }

    pub fn last_status(&self) -> Option<String> {
        self.screen.lock().statuses.last().cloned()
    }

    /// Last menu drawn and its selection.
    pub fn menu(&self) -> Option<(Vec<String>, usize)> {
        self.screen.lock().menu.clone()
    }
}

impl StatusDisplay for MemoryDisplay {
    fn show_status(&mut self, text: &str) {
        self.screen.lock().statuses.push(text.to_string());
    }

    fn redraw_menu(&mut self, entries: &[String], selected: usize) {
        self.screen.lock().menu = Some((entries.to_vec(), selected));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    PinEntry(PinPad),
    /// File code accepted; the pad now names a file
    FileEntry(PinPad),
    Menu { selected: usize },
    /// Boot flag written; waiting for the host to restart us
    Restart(BootMode),
}

/// State every front-end shares.
struct Core<S: HidSink> {
    config: DongleConfig,
    sink: S,
    macros: MacroEngine,
    player: Player,
    store: Box<dyn KeyValueStore>,
    credentials: CredentialStore,
    codes: AccessCodes,
    files: Option<Box<dyn FileStore>>,
    recorder: Recorder,
}

impl<S: HidSink> Core<S> {
    fn context(&mut self) -> Context<'_, S> {
        Context {
            sink: &mut self.sink,
            macros: &mut self.macros,
            player: &mut self.player,
            store: &mut *self.store,
            credentials: &mut self.credentials,
            codes: &mut self.codes,
            files: &mut self.files,
            recorder: &mut self.recorder,
            config: &self.config,
        }
    }
}

struct Port {
    link: LineLink<Box<dyn ByteChannel>>,
    session: Session,
}

impl Port {
    fn new(link: LineLink<Box<dyn ByteChannel>>) -> Self {
        let session = Session::new(link.kind());
        Self { link, session }
    }

    /// Handle up to `max` queued lines. A line that fails is answered with an
    /// `ERROR:` reply where the link still works; later lines are still served.
    fn serve<S: HidSink>(&mut self, core: &mut Core<S>, max: usize) -> Result<(), DongleError> {
        for line in self.link.drain(max)? {
            let mut ctx = core.context();
            let Err(e) = self.session.handle_line(&line, &mut ctx, &mut self.link) else {
                continue;
            };
            warn!("{} line failed: {e}", self.session.kind());
            self.session.abort();
            if let Err(e) = core.sink.release_all() {
                debug!("Releasing keys after failure: {e}");
            }
            let reply = match e {
                SessionError::Hid(_) => "ERROR: HID output failed",
                SessionError::File(_) => "ERROR: File read failed",
                SessionError::Transport(_) => continue,
            };
            if let Err(e) = self.link.send_line(reply) {
                warn!("{}: cannot report failure: {e}", self.session.kind());
            }
        }
        Ok(())
    }
}

pub struct Dongle<S: HidSink> {
    core: Core<S>,
    serial: Option<Port>,
    ble: Option<Port>,
    mode: Mode,
    buttons: VecDeque<ButtonEvent>,
    display: Box<dyn StatusDisplay>,
}

impl<S: HidSink> Dongle<S> {
    /// Load codes and credentials from `store` and start at the PIN pad.
    pub fn new(
        config: DongleConfig,
        sink: S,
        mut store: Box<dyn KeyValueStore>,
    ) -> Result<Self, DongleError> {
        let mut codes = config.codes;
        codes.load_primary(&mut *store)?;
        let credentials = CredentialStore::load(&*store);
        info!("Loaded {} credential(s)", credentials.len());

        let core = Core {
            macros: MacroEngine::new(config.typing_speed_ms),
            player: Player::new(
                ScriptEngine::new(config.script_step_budget),
                config.file_pacing_ms,
            ),
            config,
            sink,
            store,
            credentials,
            codes,
            files: None,
            recorder: Recorder::default(),
        };
        let mut dongle = Self {
            core,
            serial: None,
            ble: None,
            mode: Mode::PinEntry(PinPad::new()),
            buttons: VecDeque::new(),
            display: Box::new(LogDisplay),
        };
        dongle.show_pad();
        Ok(dongle)
    }

    pub fn with_files(mut self, files: Box<dyn FileStore>) -> Self {
        self.core.files = Some(files);
        self
    }

    pub fn with_serial(mut self, channel: Box<dyn ByteChannel>) -> Self {
        self.serial = Some(Port::new(LineLink::new(channel)));
        self
    }

    pub fn with_ble(mut self, channel: Box<dyn ByteChannel>) -> Self {
        let link = LineLink::new(channel).with_chunk_size(Some(self.core.config.ble_chunk_size));
        self.ble = Some(Port::new(link));
        self
    }

    pub fn with_display(mut self, display: Box<dyn StatusDisplay>) -> Self {
        self.display = display;
        self.show_pad();
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.core.recorder = Recorder::new(clock);
        self
    }

    pub fn sink(&self) -> &S {
        &self.core.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.core.sink
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.core.credentials
    }

    pub fn codes(&self) -> &AccessCodes {
        &self.core.codes
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        &*self.core.store
    }

    /// Boot mode chosen at the PIN pad, if any.
    pub fn restart_requested(&self) -> Option<BootMode> {
        match self.mode {
            Mode::Restart(mode) => Some(mode),
            _ => None,
        }
    }

    pub fn push_button(&mut self, event: ButtonEvent) {
        self.buttons.push_back(event);
    }

    /// One main-loop pass. Returns the requested boot mode once a reserved
    /// code has been entered. HID and file failures are reported on the
    /// transport or the display; only reading a link fails the pass.
    pub fn poll(&mut self) -> Result<Option<BootMode>, DongleError> {
        if let Some(port) = self.ble.as_mut() {
            let cap = self.core.config.ble_drain_cap;
            port.serve(&mut self.core, cap)?;
        }

        while let Some(event) = self.buttons.pop_front() {
            self.handle_button(event);
        }

        if let Some(port) = self.serial.as_mut() {
            port.serve(&mut self.core, usize::MAX)?;
        }

        Ok(self.restart_requested())
    }

    fn handle_button(&mut self, event: ButtonEvent) {
        debug!("Button: {event:?}");
        match &mut self.mode {
            Mode::PinEntry(pad) | Mode::FileEntry(pad) => {
                let entered = match event {
                    ButtonEvent::Short => {
                        pad.increment();
                        None
                    }
                    ButtonEvent::Long => pad.accept(),
                };
                match entered {
                    Some(pin) if matches!(self.mode, Mode::FileEntry(_)) => {
                        self.type_file(&format!("{pin}.txt"));
                        self.show_pad();
                    }
                    Some(pin) => self.check_code(pin),
                    None => self.show_pad(),
                }
            }
            Mode::Menu { selected } => {
                let names = self.core.credentials.names();
                match event {
                    ButtonEvent::Short => {
                        if !names.is_empty() {
                            *selected = (*selected + 1) % names.len();
                        }
                        self.display.redraw_menu(&names, *selected);
                    }
                    ButtonEvent::Long => {
                        let index = *selected;
                        if let Err(e) = self.send_secret(index) {
                            warn!("Typing secret failed: {e}");
                            self.release_keys();
                            self.display.show_status("Send failed");
                        }
                        self.display.redraw_menu(&names, index);
                    }
                }
            }
            Mode::Restart(mode) => debug!("Restart to {mode} pending, ignoring button"),
        }
    }

    fn release_keys(&mut self) {
        if let Err(e) = self.core.sink.release_all() {
            debug!("Releasing keys after failure: {e}");
        }
    }

    fn check_code(&mut self, pin: Pin) {
        match self.core.codes.classify(pin) {
            PinMatch::Boot(mode) => match request_boot(&mut *self.core.store, mode) {
                Ok(()) => {
                    self.display
                        .show_status(&format!("Switching to {mode} mode. Wait..."));
                    self.mode = Mode::Restart(mode);
                }
                Err(e) => {
                    warn!("Cannot store boot flag: {e}");
                    self.display.show_status("Storage error");
                    self.mode = Mode::PinEntry(PinPad::new());
                    self.show_pad();
                }
            },
            PinMatch::FileMode => {
                info!("File typing mode");
                self.mode = Mode::FileEntry(PinPad::new());
                self.show_pad();
            }
            PinMatch::Primary => {
                info!("Login code accepted");
                self.core.credentials = CredentialStore::load(&*self.core.store);
                self.mode = Mode::Menu { selected: 0 };
                self.display.redraw_menu(&self.core.credentials.names(), 0);
            }
            PinMatch::Rejected => {
                info!("Wrong login code");
                self.display.show_status("WRONG CODE!");
                self.mode = Mode::PinEntry(PinPad::new());
                self.show_pad();
            }
        }
    }

    fn type_file(&mut self, name: &str) {
        let Some(files) = self.core.files.as_deref() else {
            self.display.show_status("SD card not available");
            return;
        };
        match self.core.player.type_raw(&mut self.core.sink, files, name) {
            Ok(_) => self.display.show_status("File typed"),
            Err(e) => {
                warn!("Typing {name} failed: {e}");
                if matches!(e, PlaybackError::Hid(_)) {
                    self.release_keys();
                }
                self.display.show_status("Typing failed");
            }
        }
    }

    fn send_secret(&mut self, index: usize) -> Result<(), DongleError> {
        let Some(entry) = self.core.credentials.get(index) else {
            return Ok(());
        };
        info!("Typing secret for {}", entry.name);
        let pace = self.core.macros.default_speed_ms();
        self.core.sink.type_str(&entry.secret, pace)?;
        self.core.sink.tap(Chord::key(usage::ENTER))?;
        self.display.show_status(&format!("Sent: {}", entry.name));
        Ok(())
    }

    fn show_pad(&mut self) {
        let text = match &self.mode {
            Mode::PinEntry(pad) => format!("Enter code: {}", pad.render()),
            Mode::FileEntry(pad) => format!("Enter file number: {}", pad.render()),
            _ => return,
        };
        self.display.show_status(&text);
    }
}
