//! Report-writing sink for Linux USB gadget HID endpoints (`/dev/hidgN`).
//!
//! Keeps the current keyboard, mouse and gamepad state and writes a full
//! report on every change, the way a configfs HID function expects.

use crate::error::HidError;
use crate::gamepad::{GamepadAxis, GamepadButton, HatDirection};
use crate::hid_codes::{char_to_hid, usage};
use crate::keys::{Capabilities, MediaKey};
use crate::mouse::MouseButton;
use crate::report::{ConsumerReport, GamepadReport, KeyboardReport, MouseReport};
use crate::HidSink;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};
use zerocopy::IntoBytes;

/// Gadget endpoints. Only the keyboard is mandatory.
pub struct GadgetSink<W: Write> {
    keyboard: W,
    mouse: Option<W>,
    consumer: Option<W>,
    gamepad: Option<W>,
    key_state: KeyboardReport,
    mouse_buttons: u8,
    pad_state: GamepadReport,
    /// Sleep on `delay`; off for tests
    real_time: bool,
}

impl GadgetSink<File> {
    /// Open gadget endpoints by path. Missing optional endpoints are skipped.
    pub fn open(
        keyboard: &Path,
        mouse: Option<&Path>,
        consumer: Option<&Path>,
        gamepad: Option<&Path>,
    ) -> Result<Self, HidError> {
        let open = |path: &Path| {
            OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|source| HidError::Open {
                    path: path.display().to_string(),
                    source,
                })
        };
        let optional = |path: Option<&Path>| -> Result<Option<File>, HidError> {
            match path {
                Some(p) if p.exists() => open(p).map(Some),
                Some(p) => {
                    debug!("HID endpoint {} not present", p.display());
                    Ok(None)
                }
                None => Ok(None),
            }
        };

        let mut sink = GadgetSink::new(open(keyboard)?);
        sink.mouse = optional(mouse)?;
        sink.consumer = optional(consumer)?;
        sink.gamepad = optional(gamepad)?;
        Ok(sink)
    }
}

impl<W: Write> GadgetSink<W> {
    pub fn new(keyboard: W) -> Self {
        Self {
            keyboard,
            mouse: None,
            consumer: None,
            gamepad: None,
            key_state: KeyboardReport::default(),
            mouse_buttons: 0,
            pad_state: GamepadReport::default(),
            real_time: true,
        }
    }

    pub fn with_mouse(mut self, writer: W) -> Self {
        self.mouse = Some(writer);
        self
    }

    pub fn with_consumer(mut self, writer: W) -> Self {
        self.consumer = Some(writer);
        self
    }

    pub fn with_gamepad(mut self, writer: W) -> Self {
        self.gamepad = Some(writer);
        self
    }

    /// Record delays without sleeping.
    pub fn without_delays(mut self) -> Self {
        self.real_time = false;
        self
    }

    pub fn keyboard_writer(&self) -> &W {
        &self.keyboard
    }

    pub fn mouse_writer(&self) -> Option<&W> {
        self.mouse.as_ref()
    }

    fn write_keyboard(&mut self) -> Result<(), HidError> {
        self.keyboard
            .write_all(self.key_state.as_bytes())
            .map_err(HidError::Write)
    }

    fn write_mouse(&mut self, x: i8, y: i8, wheel: i8, pan: i8) -> Result<(), HidError> {
        let report = MouseReport {
            buttons: self.mouse_buttons,
            x,
            y,
            wheel,
            pan,
        };
        match self.mouse.as_mut() {
            Some(w) => w.write_all(report.as_bytes()).map_err(HidError::Write),
            None => {
                trace!("No mouse endpoint, dropping report");
                Ok(())
            }
        }
    }

    fn write_gamepad(&mut self) -> Result<(), HidError> {
        match self.gamepad.as_mut() {
            Some(w) => w
                .write_all(self.pad_state.as_bytes())
                .map_err(HidError::Write),
            None => Ok(()),
        }
    }
}

impl<W: Write> HidSink for GadgetSink<W> {
    fn press_key(&mut self, code: u8) -> Result<(), HidError> {
        if !self.key_state.press(code) {
            debug!("Keyboard report full, dropping 0x{code:02X}");
            return Ok(());
        }
        self.write_keyboard()
    }

    fn release_key(&mut self, code: u8) -> Result<(), HidError> {
        self.key_state.release(code);
        self.write_keyboard()
    }

    fn release_all(&mut self) -> Result<(), HidError> {
        self.key_state.clear();
        self.write_keyboard()?;
        if self.mouse_buttons != 0 {
            self.mouse_buttons = 0;
            self.write_mouse(0, 0, 0, 0)?;
        }
        Ok(())
    }

    fn type_char(&mut self, ch: char) -> Result<(), HidError> {
        let Some((code, shift)) = char_to_hid(ch) else {
            trace!("No key for {ch:?}, skipping");
            return Ok(());
        };
        let held = self.key_state;
        if shift {
            self.key_state.press(usage::LEFT_SHIFT);
        }
        self.key_state.press(code);
        self.write_keyboard()?;
        self.key_state = held;
        self.write_keyboard()
    }

    fn move_mouse(&mut self, dx: i8, dy: i8) -> Result<(), HidError> {
        self.write_mouse(dx, dy, 0, 0)
    }

    fn mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), HidError> {
        if down {
            self.mouse_buttons |= button.mask();
        } else {
            self.mouse_buttons &= !button.mask();
        }
        self.write_mouse(0, 0, 0, 0)
    }

    fn scroll(&mut self, vertical: i8, horizontal: i8) -> Result<(), HidError> {
        self.write_mouse(0, 0, vertical, horizontal)
    }

    fn gamepad_button(&mut self, button: GamepadButton, down: bool) -> Result<(), HidError> {
        self.pad_state.set_button(button, down);
        self.write_gamepad()
    }

    fn gamepad_axis(&mut self, axis: GamepadAxis, value: i8) -> Result<(), HidError> {
        self.pad_state.set_axis(axis, value);
        self.write_gamepad()
    }

    fn gamepad_hat(&mut self, direction: HatDirection) -> Result<(), HidError> {
        self.pad_state.hat = direction.hid_value();
        self.write_gamepad()
    }

    fn media_key(&mut self, key: MediaKey, down: bool) -> Result<(), HidError> {
        let Some(w) = self.consumer.as_mut() else {
            return Ok(());
        };
        let report = ConsumerReport::new(if down { key.usage() } else { 0 });
        w.write_all(report.as_bytes()).map_err(HidError::Write)
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::keyboard_only();
        caps.mouse = self.mouse.is_some();
        caps.gamepad = self.gamepad.is_some();
        if self.consumer.is_some() {
            caps = caps.with_media(MediaKey::ALL);
        }
        caps
    }

    fn delay(&mut self, ms: u32) -> Result<(), HidError> {
        if self.real_time && ms > 0 {
            std::thread::sleep(Duration::from_millis(ms as u64));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid_codes::mods;

    #[test]
    fn test_type_char_writes_press_and_release() {
        let mut sink = GadgetSink::new(Vec::new()).without_delays();
        sink.type_char('A').unwrap();
        let written = sink.keyboard_writer();
        assert_eq!(written.len(), 16);
        assert_eq!(&written[..8], &[mods::LSHIFT, 0, 0x04, 0, 0, 0, 0, 0]);
        assert_eq!(&written[8..], &[0u8; 8]);
    }

    #[test]
    fn test_type_char_keeps_held_modifier() {
        let mut sink = GadgetSink::new(Vec::new()).without_delays();
        sink.press_key(usage::LEFT_CTRL).unwrap();
        sink.type_char('c').unwrap();
        let written = sink.keyboard_writer();
        // press ctrl, ctrl+c, ctrl still held
        assert_eq!(written.len(), 24);
        assert_eq!(written[16], mods::LCTRL);
        assert_eq!(written[18], 0);
    }

    #[test]
    fn test_unmapped_char_is_skipped() {
        let mut sink = GadgetSink::new(Vec::new()).without_delays();
        sink.type_char('\r').unwrap();
        assert!(sink.keyboard_writer().is_empty());
    }

    #[test]
    fn test_mouse_reports() {
        let mut sink = GadgetSink::new(Vec::new())
            .with_mouse(Vec::new())
            .without_delays();
        sink.mouse_button(MouseButton::Left, true).unwrap();
        sink.move_mouse(-3, 4).unwrap();
        let written = sink.mouse_writer().unwrap();
        assert_eq!(written.as_slice(), &[1, 0, 0, 0, 0, 1, 0xFD, 4, 0, 0]);
    }

    #[test]
    fn test_capabilities_follow_endpoints() {
        let sink = GadgetSink::new(Vec::<u8>::new());
        let caps = sink.capabilities();
        assert!(!caps.mouse);
        assert!(!caps.supports(MediaKey::Mute));

        let sink = GadgetSink::new(Vec::<u8>::new()).with_consumer(Vec::new());
        assert!(sink.capabilities().supports(MediaKey::Mute));
    }
}
