//! Wire layouts of the boot-protocol style reports sent to the host.

use crate::gamepad::{GamepadAxis, GamepadButton, HatDirection};
use crate::hid_codes::{is_modifier, modifier_bit};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Boot keyboard report: 8 bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct KeyboardReport {
    pub modifiers: u8,
    pub reserved: u8,
    pub keys: [u8; 6],
}

impl KeyboardReport {
    /// Add a key to the report. Returns false if all six slots are taken.
    pub fn press(&mut self, code: u8) -> bool {
        if is_modifier(code) {
            self.modifiers |= modifier_bit(code);
            return true;
        }
        if self.keys.contains(&code) {
            return true;
        }
        match self.keys.iter_mut().find(|slot| **slot == 0) {
            Some(slot) => {
                *slot = code;
                true
            }
            None => false,
        }
    }

    pub fn release(&mut self, code: u8) {
        if is_modifier(code) {
            self.modifiers &= !modifier_bit(code);
            return;
        }
        for slot in self.keys.iter_mut().filter(|slot| **slot == code) {
            *slot = 0;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers == 0 && self.keys.iter().all(|&k| k == 0)
    }
}

/// Relative mouse report: 5 bytes (buttons, x, y, wheel, pan).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MouseReport {
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
    pub wheel: i8,
    pub pan: i8,
}

/// Consumer control report: one 16-bit usage, little endian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ConsumerReport {
    pub usage: [u8; 2],
}

impl ConsumerReport {
    pub fn new(usage: u16) -> Self {
        Self {
            usage: usage.to_le_bytes(),
        }
    }
}

/// Gamepad report, 9 bytes (16 button bits, hat, four stick axes, two triggers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct GamepadReport {
    pub buttons: [u8; 2],
    pub hat: u8,
    pub lx: i8,
    pub ly: i8,
    pub rx: i8,
    pub ry: i8,
    pub lt: i8,
    pub rt: i8,
}

impl Default for GamepadReport {
    fn default() -> Self {
        Self {
            buttons: [0; 2],
            hat: HatDirection::Centered.hid_value(),
            lx: 0,
            ly: 0,
            rx: 0,
            ry: 0,
            lt: 0,
            rt: 0,
        }
    }
}

impl GamepadReport {
    pub fn set_button(&mut self, button: GamepadButton, down: bool) {
        let mut bits = u16::from_le_bytes(self.buttons);
        let mask = 1u16 << button.index();
        if down {
            bits |= mask;
        } else {
            bits &= !mask;
        }
        self.buttons = bits.to_le_bytes();
    }

    pub fn set_axis(&mut self, axis: GamepadAxis, value: i8) {
        let slot = match axis {
            GamepadAxis::LeftX => &mut self.lx,
            GamepadAxis::LeftY => &mut self.ly,
            GamepadAxis::RightX => &mut self.rx,
            GamepadAxis::RightY => &mut self.ry,
            GamepadAxis::LeftTrigger => &mut self.lt,
            GamepadAxis::RightTrigger => &mut self.rt,
        };
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid_codes::{mods, usage};

    #[test]
    fn test_keyboard_report_layout() {
        let mut report = KeyboardReport::default();
        report.press(usage::LEFT_SHIFT);
        report.press(0x04);
        assert_eq!(report.as_bytes(), &[mods::LSHIFT, 0, 0x04, 0, 0, 0, 0, 0]);
        report.release(0x04);
        report.release(usage::LEFT_SHIFT);
        assert!(report.is_empty());
    }

    #[test]
    fn test_keyboard_report_rollover() {
        let mut report = KeyboardReport::default();
        for code in 0x04..0x0A {
            assert!(report.press(code));
        }
        assert!(!report.press(0x0A));
        // re-pressing a held key is fine
        assert!(report.press(0x04));
    }

    #[test]
    fn test_gamepad_report_layout() {
        let mut report = GamepadReport::default();
        report.set_button(GamepadButton::Y, true);
        report.set_button(GamepadButton::RightStick, true);
        report.set_axis(GamepadAxis::LeftX, -127);
        assert_eq!(report.as_bytes().len(), 9);
        assert_eq!(u16::from_le_bytes(report.buttons), (1 << 3) | (1 << 10));
        assert_eq!(report.as_bytes()[2], 8);
        assert_eq!(report.as_bytes()[3] as i8, -127);
    }

    #[test]
    fn test_mouse_report_size() {
        let report = MouseReport {
            buttons: 1,
            x: -5,
            y: 7,
            wheel: 0,
            pan: 0,
        };
        assert_eq!(report.as_bytes(), &[1, 0xFB, 7, 0, 0]);
    }
}
