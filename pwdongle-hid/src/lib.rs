//! HID action layer for the PWDongle
//!
//! Everything the dongle does to the host ends up as calls on a
//! [`HidSink`]: key presses, typed characters, mouse motion, gamepad state
//! and media keys, interleaved with blocking delays that pace the host's
//! input buffers. Back-ends:
//!
//! - [`GadgetSink`] writes boot-protocol reports to USB gadget endpoints
//! - [`UinputSink`] drives a Linux virtual input device (feature `uinput`)
//! - [`RecordingSink`] records events for tests and dry runs

pub mod error;
pub mod gadget;
pub mod gamepad;
pub mod hid_codes;
pub mod keys;
pub mod mouse;
pub mod recording;
pub mod report;

#[cfg(all(feature = "uinput", target_os = "linux"))]
pub mod uinput;

pub use error::HidError;
pub use gadget::GadgetSink;
pub use gamepad::{GamepadAxis, GamepadButton, HatDirection};
pub use hid_codes::{char_to_hid, mods, usage};
pub use keys::{lookup_key, parse_chord, parse_modifier, Capabilities, Chord, MediaKey};
pub use mouse::{MouseButton, MouseTracker};
pub use recording::{HidEvent, RecordingSink};

#[cfg(all(feature = "uinput", target_os = "linux"))]
pub use uinput::UinputSink;

/// Timing constants for HID pacing (milliseconds).
pub mod timing {
    /// How long a tapped key is held down
    pub const KEY_HOLD_MS: u32 = 50;
    /// Pause after each mouse wheel click
    pub const SCROLL_STEP_MS: u32 = 10;
}

/// Sink for HID actions.
///
/// Methods map one-to-one onto report changes. Timing lives in the callers
/// (and in the provided helpers), except that `delay` itself blocks.
pub trait HidSink {
    fn press_key(&mut self, code: u8) -> Result<(), HidError>;

    fn release_key(&mut self, code: u8) -> Result<(), HidError>;

    fn release_all(&mut self) -> Result<(), HidError>;

    /// Type one character as press+release (Shift added as needed).
    /// Characters with no key are skipped.
    fn type_char(&mut self, ch: char) -> Result<(), HidError>;

    fn move_mouse(&mut self, dx: i8, dy: i8) -> Result<(), HidError>;

    fn mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), HidError>;

    fn scroll(&mut self, vertical: i8, horizontal: i8) -> Result<(), HidError>;

    fn gamepad_button(&mut self, button: GamepadButton, down: bool) -> Result<(), HidError>;

    fn gamepad_axis(&mut self, axis: GamepadAxis, value: i8) -> Result<(), HidError>;

    fn gamepad_hat(&mut self, direction: HatDirection) -> Result<(), HidError>;

    fn media_key(&mut self, key: MediaKey, down: bool) -> Result<(), HidError>;

    fn capabilities(&self) -> Capabilities;

    /// Block for `ms` milliseconds.
    fn delay(&mut self, ms: u32) -> Result<(), HidError>;

    /// Press modifiers, tap the key with a hold, release in reverse order.
    fn tap(&mut self, chord: Chord) -> Result<(), HidError> {
        for code in hid_codes::modifier_usages(chord.mods) {
            self.press_key(code)?;
        }
        self.press_key(chord.key)?;
        self.delay(timing::KEY_HOLD_MS)?;
        self.release_key(chord.key)?;
        for code in hid_codes::modifier_usages(chord.mods).rev() {
            self.release_key(code)?;
        }
        Ok(())
    }

    /// Tap a media key if the profile has it; otherwise do nothing.
    fn tap_media(&mut self, key: MediaKey) -> Result<(), HidError> {
        if !self.capabilities().supports(key) {
            tracing::debug!("Media key {} not available, skipping", key.display_name());
            return Ok(());
        }
        self.media_key(key, true)?;
        self.delay(timing::KEY_HOLD_MS)?;
        self.media_key(key, false)
    }

    /// Type a string with `pace_ms` between characters.
    fn type_str(&mut self, text: &str, pace_ms: u32) -> Result<(), HidError> {
        for ch in text.chars() {
            self.type_char(ch)?;
            if pace_ms > 0 {
                self.delay(pace_ms)?;
            }
        }
        Ok(())
    }
}

impl<S: HidSink + ?Sized> HidSink for &mut S {
    fn press_key(&mut self, code: u8) -> Result<(), HidError> {
        (**self).press_key(code)
    }
    fn release_key(&mut self, code: u8) -> Result<(), HidError> {
        (**self).release_key(code)
    }
    fn release_all(&mut self) -> Result<(), HidError> {
        (**self).release_all()
    }
    fn type_char(&mut self, ch: char) -> Result<(), HidError> {
        (**self).type_char(ch)
    }
    fn move_mouse(&mut self, dx: i8, dy: i8) -> Result<(), HidError> {
        (**self).move_mouse(dx, dy)
    }
    fn mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), HidError> {
        (**self).mouse_button(button, down)
    }
    fn scroll(&mut self, vertical: i8, horizontal: i8) -> Result<(), HidError> {
        (**self).scroll(vertical, horizontal)
    }
    fn gamepad_button(&mut self, button: GamepadButton, down: bool) -> Result<(), HidError> {
        (**self).gamepad_button(button, down)
    }
    fn gamepad_axis(&mut self, axis: GamepadAxis, value: i8) -> Result<(), HidError> {
        (**self).gamepad_axis(axis, value)
    }
    fn gamepad_hat(&mut self, direction: HatDirection) -> Result<(), HidError> {
        (**self).gamepad_hat(direction)
    }
    fn media_key(&mut self, key: MediaKey, down: bool) -> Result<(), HidError> {
        (**self).media_key(key, down)
    }
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }
    fn delay(&mut self, ms: u32) -> Result<(), HidError> {
        (**self).delay(ms)
    }
}

impl<S: HidSink + ?Sized> HidSink for Box<S> {
    fn press_key(&mut self, code: u8) -> Result<(), HidError> {
        (**self).press_key(code)
    }
    fn release_key(&mut self, code: u8) -> Result<(), HidError> {
        (**self).release_key(code)
    }
    fn release_all(&mut self) -> Result<(), HidError> {
        (**self).release_all()
    }
    fn type_char(&mut self, ch: char) -> Result<(), HidError> {
        (**self).type_char(ch)
    }
    fn move_mouse(&mut self, dx: i8, dy: i8) -> Result<(), HidError> {
        (**self).move_mouse(dx, dy)
    }
    fn mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), HidError> {
        (**self).mouse_button(button, down)
    }
    fn scroll(&mut self, vertical: i8, horizontal: i8) -> Result<(), HidError> {
        (**self).scroll(vertical, horizontal)
    }
    fn gamepad_button(&mut self, button: GamepadButton, down: bool) -> Result<(), HidError> {
        (**self).gamepad_button(button, down)
    }
    fn gamepad_axis(&mut self, axis: GamepadAxis, value: i8) -> Result<(), HidError> {
        (**self).gamepad_axis(axis, value)
    }
    fn gamepad_hat(&mut self, direction: HatDirection) -> Result<(), HidError> {
        (**self).gamepad_hat(direction)
    }
    fn media_key(&mut self, key: MediaKey, down: bool) -> Result<(), HidError> {
        (**self).media_key(key, down)
    }
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }
    fn delay(&mut self, ms: u32) -> Result<(), HidError> {
        (**self).delay(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_orders_modifiers() {
        let mut sink = RecordingSink::new();
        sink.tap(parse_chord("ctrl+alt+delete").unwrap()).unwrap();
        assert_eq!(
            sink.events(),
            &[
                HidEvent::Press(usage::LEFT_CTRL),
                HidEvent::Press(usage::LEFT_ALT),
                HidEvent::Press(usage::DELETE),
                HidEvent::Delay(timing::KEY_HOLD_MS),
                HidEvent::Release(usage::DELETE),
                HidEvent::Release(usage::LEFT_ALT),
                HidEvent::Release(usage::LEFT_CTRL),
            ]
        );
    }

    #[test]
    fn test_tap_media_respects_capabilities() {
        let mut sink = RecordingSink::with_capabilities(Capabilities::keyboard_only());
        sink.tap_media(MediaKey::Mute).unwrap();
        assert!(sink.events().is_empty());

        let mut sink = RecordingSink::new();
        sink.tap_media(MediaKey::Mute).unwrap();
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn test_type_str_paces() {
        let mut sink = RecordingSink::new();
        sink.type_str("ab", 5).unwrap();
        assert_eq!(sink.typed_text(), "ab");
        assert_eq!(sink.total_delay_ms(), 10);
    }
}
