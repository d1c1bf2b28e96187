//! Command handlers for the CLI application.
//!
//! - `run`: the dongle main loop (serial console, BLE link, HID output)
//! - `play`: play one macro or script file
//! - `check`: dry-run a file and print the HID actions
//! - `store`: inspect and edit the persistent key-value store
//! - `eval`: evaluate a script expression
//! - `unlock`: drive the PIN pad with simulated button presses

pub mod check;
pub mod eval;
pub mod play;
pub mod run;
pub mod store;
pub mod unlock;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use pwdongle::hid::{
    Capabilities, GadgetSink, GamepadAxis, GamepadButton, HatDirection, HidError, HidEvent,
    HidSink, MediaKey, MouseButton,
};
use pwdongle::{DongleConfig, JsonFileStore, KeyValueStore};
use tracing::{debug, info};

use crate::cli::{GadgetPaths, SinkKind};

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Set up Ctrl+C handler, returns flag that becomes false on interrupt
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .ok();

    running
}

/// Open the HID back-end picked on the command line.
pub fn open_sink(kind: SinkKind, gadget: &GadgetPaths) -> anyhow::Result<Box<dyn HidSink>> {
    match kind {
        SinkKind::Record => Ok(Box::new(LogSink)),
        SinkKind::Gadget => {
            let sink = GadgetSink::open(
                &gadget.keyboard_dev,
                gadget.mouse_dev.as_deref(),
                gadget.consumer_dev.as_deref(),
                gadget.gamepad_dev.as_deref(),
            )
            .with_context(|| {
                format!("opening gadget endpoint {}", gadget.keyboard_dev.display())
            })?;
            info!("HID gadget on {}", gadget.keyboard_dev.display());
            Ok(Box::new(sink))
        }
        SinkKind::Uinput => open_uinput(),
    }
}

#[cfg(all(feature = "uinput", target_os = "linux"))]
fn open_uinput() -> anyhow::Result<Box<dyn HidSink>> {
    let sink = pwdongle::hid::UinputSink::new("PWDongle").context("creating uinput device")?;
    Ok(Box::new(sink))
}

#[cfg(not(all(feature = "uinput", target_os = "linux")))]
fn open_uinput() -> anyhow::Result<Box<dyn HidSink>> {
    anyhow::bail!("uinput support not compiled in (rebuild with --features uinput)")
}

pub fn open_store(config: &DongleConfig) -> anyhow::Result<Box<dyn KeyValueStore>> {
    let store = JsonFileStore::open(&config.store_path)
        .with_context(|| format!("opening store {}", config.store_path.display()))?;
    Ok(Box::new(store))
}

/// Config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<DongleConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(DongleConfig::default_path);
    let config = DongleConfig::load(&path)
        .with_context(|| format!("loading config {}", path.display()))?;
    debug!("Config: {config:?}");
    Ok(config)
}

/// Sink that logs every action instead of sending it. Delays are not slept.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    fn log(&mut self, event: HidEvent) -> Result<(), HidError> {
        match event {
            HidEvent::Delay(_) => debug!("[hid] {event}"),
            _ => info!("[hid] {event}"),
        }
        Ok(())
    }
}

impl HidSink for LogSink {
    fn press_key(&mut self, code: u8) -> Result<(), HidError> {
        self.log(HidEvent::Press(code))
    }

    fn release_key(&mut self, code: u8) -> Result<(), HidError> {
        self.log(HidEvent::Release(code))
    }

    fn release_all(&mut self) -> Result<(), HidError> {
        self.log(HidEvent::ReleaseAll)
    }

    fn type_char(&mut self, ch: char) -> Result<(), HidError> {
        self.log(HidEvent::Type(ch))
    }

    fn move_mouse(&mut self, dx: i8, dy: i8) -> Result<(), HidError> {
        self.log(HidEvent::MouseMove { dx, dy })
    }

    fn mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), HidError> {
        self.log(HidEvent::MouseButton { button, down })
    }

    fn scroll(&mut self, vertical: i8, horizontal: i8) -> Result<(), HidError> {
        self.log(HidEvent::Scroll {
            vertical,
            horizontal,
        })
    }

    fn gamepad_button(&mut self, button: GamepadButton, down: bool) -> Result<(), HidError> {
        self.log(HidEvent::GamepadButton { button, down })
    }

    fn gamepad_axis(&mut self, axis: GamepadAxis, value: i8) -> Result<(), HidError> {
        self.log(HidEvent::GamepadAxis { axis, value })
    }

    fn gamepad_hat(&mut self, direction: HatDirection) -> Result<(), HidError> {
        self.log(HidEvent::GamepadHat(direction))
    }

    fn media_key(&mut self, key: MediaKey, down: bool) -> Result<(), HidError> {
        self.log(HidEvent::Media { key, down })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn delay(&mut self, ms: u32) -> Result<(), HidError> {
        self.log(HidEvent::Delay(ms))
    }
}
