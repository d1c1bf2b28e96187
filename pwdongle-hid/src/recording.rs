//! In-memory sink that records every action instead of sending it.

use crate::error::HidError;
use crate::gamepad::{GamepadAxis, GamepadButton, HatDirection};
use crate::hid_codes::key_name;
use crate::keys::{Capabilities, MediaKey};
use crate::mouse::MouseButton;
use crate::HidSink;
use std::fmt;

/// One recorded HID action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HidEvent {
    Press(u8),
    Release(u8),
    ReleaseAll,
    Type(char),
    MouseMove { dx: i8, dy: i8 },
    MouseButton { button: MouseButton, down: bool },
    Scroll { vertical: i8, horizontal: i8 },
    GamepadButton { button: GamepadButton, down: bool },
    GamepadAxis { axis: GamepadAxis, value: i8 },
    GamepadHat(HatDirection),
    Media { key: MediaKey, down: bool },
    Delay(u32),
}

impl fmt::Display for HidEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = |down: bool| if down { '↓' } else { '↑' };
        match self {
            HidEvent::Press(code) => write!(f, "↓{}", key_name(*code)),
            HidEvent::Release(code) => write!(f, "↑{}", key_name(*code)),
            HidEvent::ReleaseAll => write!(f, "↑*"),
            HidEvent::Type(ch) => write!(f, "type {ch:?}"),
            HidEvent::MouseMove { dx, dy } => write!(f, "mouse {dx:+} {dy:+}"),
            HidEvent::MouseButton { button, down } => write!(f, "{}mouse {button}", arrow(*down)),
            HidEvent::Scroll {
                vertical,
                horizontal,
            } => write!(f, "scroll {vertical:+} {horizontal:+}"),
            HidEvent::GamepadButton { button, down } => write!(f, "{}pad {button}", arrow(*down)),
            HidEvent::GamepadAxis { axis, value } => write!(f, "pad {axis}={value}"),
            HidEvent::GamepadHat(dir) => write!(f, "dpad {dir}"),
            HidEvent::Media { key, down } => write!(f, "{}{}", arrow(*down), key.display_name()),
            HidEvent::Delay(ms) => write!(f, "{ms}ms"),
        }
    }
}

/// Sink that appends every call to a list. Delays are recorded, not slept.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<HidEvent>,
    caps: Capabilities,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(caps: Capabilities) -> Self {
        Self {
            events: Vec::new(),
            caps,
        }
    }

    pub fn events(&self) -> &[HidEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<HidEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Concatenation of every typed character.
    pub fn typed_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                HidEvent::Type(ch) => Some(*ch),
                _ => None,
            })
            .collect()
    }

    /// Sum of all recorded delays.
    pub fn total_delay_ms(&self) -> u64 {
        self.events
            .iter()
            .map(|e| match e {
                HidEvent::Delay(ms) => *ms as u64,
                _ => 0,
            })
            .sum()
    }

    /// Events with delays filtered out.
    pub fn actions(&self) -> Vec<HidEvent> {
        self.events
            .iter()
            .filter(|e| !matches!(e, HidEvent::Delay(_)))
            .cloned()
            .collect()
    }

    /// Net relative mouse motion.
    pub fn mouse_motion(&self) -> (i32, i32) {
        self.events.iter().fold((0, 0), |(x, y), e| match e {
            HidEvent::MouseMove { dx, dy } => (x + *dx as i32, y + *dy as i32),
            _ => (x, y),
        })
    }

    fn push(&mut self, event: HidEvent) -> Result<(), HidError> {
        self.events.push(event);
        Ok(())
    }
}

impl HidSink for RecordingSink {
    fn press_key(&mut self, code: u8) -> Result<(), HidError> {
        self.push(HidEvent::Press(code))
    }

    fn release_key(&mut self, code: u8) -> Result<(), HidError> {
        self.push(HidEvent::Release(code))
    }

    fn release_all(&mut self) -> Result<(), HidError> {
        self.push(HidEvent::ReleaseAll)
    }

    fn type_char(&mut self, ch: char) -> Result<(), HidError> {
        self.push(HidEvent::Type(ch))
    }

    fn move_mouse(&mut self, dx: i8, dy: i8) -> Result<(), HidError> {
        self.push(HidEvent::MouseMove { dx, dy })
    }

    fn mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), HidError> {
        self.push(HidEvent::MouseButton { button, down })
    }

    fn scroll(&mut self, vertical: i8, horizontal: i8) -> Result<(), HidError> {
        self.push(HidEvent::Scroll {
            vertical,
            horizontal,
        })
    }

    fn gamepad_button(&mut self, button: GamepadButton, down: bool) -> Result<(), HidError> {
        self.push(HidEvent::GamepadButton { button, down })
    }

    fn gamepad_axis(&mut self, axis: GamepadAxis, value: i8) -> Result<(), HidError> {
        self.push(HidEvent::GamepadAxis { axis, value })
    }

    fn gamepad_hat(&mut self, direction: HatDirection) -> Result<(), HidError> {
        self.push(HidEvent::GamepadHat(direction))
    }

    fn media_key(&mut self, key: MediaKey, down: bool) -> Result<(), HidError> {
        self.push(HidEvent::Media { key, down })
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn delay(&mut self, ms: u32) -> Result<(), HidError> {
        self.push(HidEvent::Delay(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid_codes::usage;

    #[test]
    fn test_recording_helpers() {
        let mut sink = RecordingSink::new();
        sink.type_char('h').unwrap();
        sink.delay(20).unwrap();
        sink.move_mouse(10, -3).unwrap();
        sink.move_mouse(5, 0).unwrap();
        sink.type_char('i').unwrap();

        assert_eq!(sink.typed_text(), "hi");
        assert_eq!(sink.total_delay_ms(), 20);
        assert_eq!(sink.mouse_motion(), (15, -3));
        assert_eq!(sink.actions().len(), 4);
        assert_eq!(sink.take().len(), 5);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(HidEvent::Press(usage::ENTER).to_string(), "↓Enter");
        assert_eq!(HidEvent::Delay(50).to_string(), "50ms");
        assert_eq!(
            HidEvent::MouseMove { dx: 3, dy: -4 }.to_string(),
            "mouse +3 -4"
        );
    }
}
