//! Virtual keyboard/mouse using evdev/uinput
//!
//! Lets the dongle logic drive a Linux desktop directly, which is handy for
//! trying macros without USB gadget hardware.

use crate::error::HidError;
use crate::gamepad::{GamepadAxis, GamepadButton, HatDirection};
use crate::hid_codes::{char_to_hid, usage};
use crate::keys::{Capabilities, MediaKey};
use crate::mouse::MouseButton;
use crate::HidSink;
use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, EventType, InputEvent, Key, RelativeAxisType,
};
use std::time::Duration;

#[rustfmt::skip]
const LETTERS: [Key; 26] = [
    Key::KEY_A, Key::KEY_B, Key::KEY_C, Key::KEY_D, Key::KEY_E, Key::KEY_F,
    Key::KEY_G, Key::KEY_H, Key::KEY_I, Key::KEY_J, Key::KEY_K, Key::KEY_L,
    Key::KEY_M, Key::KEY_N, Key::KEY_O, Key::KEY_P, Key::KEY_Q, Key::KEY_R,
    Key::KEY_S, Key::KEY_T, Key::KEY_U, Key::KEY_V, Key::KEY_W, Key::KEY_X,
    Key::KEY_Y, Key::KEY_Z,
];

#[rustfmt::skip]
const DIGITS: [Key; 10] = [
    Key::KEY_1, Key::KEY_2, Key::KEY_3, Key::KEY_4, Key::KEY_5,
    Key::KEY_6, Key::KEY_7, Key::KEY_8, Key::KEY_9, Key::KEY_0,
];

#[rustfmt::skip]
const FUNCTION: [Key; 24] = [
    Key::KEY_F1, Key::KEY_F2, Key::KEY_F3, Key::KEY_F4, Key::KEY_F5, Key::KEY_F6,
    Key::KEY_F7, Key::KEY_F8, Key::KEY_F9, Key::KEY_F10, Key::KEY_F11, Key::KEY_F12,
    Key::KEY_F13, Key::KEY_F14, Key::KEY_F15, Key::KEY_F16, Key::KEY_F17, Key::KEY_F18,
    Key::KEY_F19, Key::KEY_F20, Key::KEY_F21, Key::KEY_F22, Key::KEY_F23, Key::KEY_F24,
];

/// Map a HID keyboard usage to the Linux input key code.
fn usage_to_key(code: u8) -> Option<Key> {
    let key = match code {
        0x04..=0x1D => LETTERS[(code - 0x04) as usize],
        0x1E..=0x27 => DIGITS[(code - 0x1E) as usize],
        usage::ENTER => Key::KEY_ENTER,
        usage::ESCAPE => Key::KEY_ESC,
        usage::BACKSPACE => Key::KEY_BACKSPACE,
        usage::TAB => Key::KEY_TAB,
        usage::SPACE => Key::KEY_SPACE,
        0x2D => Key::KEY_MINUS,
        0x2E => Key::KEY_EQUAL,
        0x2F => Key::KEY_LEFTBRACE,
        0x30 => Key::KEY_RIGHTBRACE,
        0x31 => Key::KEY_BACKSLASH,
        0x33 => Key::KEY_SEMICOLON,
        0x34 => Key::KEY_APOSTROPHE,
        0x35 => Key::KEY_GRAVE,
        0x36 => Key::KEY_COMMA,
        0x37 => Key::KEY_DOT,
        0x38 => Key::KEY_SLASH,
        usage::CAPS_LOCK => Key::KEY_CAPSLOCK,
        usage::F1..=usage::F12 => FUNCTION[(code - usage::F1) as usize],
        usage::F13..=usage::F24 => FUNCTION[12 + (code - usage::F13) as usize],
        usage::PRINT_SCREEN => Key::KEY_SYSRQ,
        usage::SCROLL_LOCK => Key::KEY_SCROLLLOCK,
        usage::PAUSE => Key::KEY_PAUSE,
        usage::INSERT => Key::KEY_INSERT,
        usage::HOME => Key::KEY_HOME,
        usage::PAGE_UP => Key::KEY_PAGEUP,
        usage::DELETE => Key::KEY_DELETE,
        usage::END => Key::KEY_END,
        usage::PAGE_DOWN => Key::KEY_PAGEDOWN,
        usage::RIGHT => Key::KEY_RIGHT,
        usage::LEFT => Key::KEY_LEFT,
        usage::DOWN => Key::KEY_DOWN,
        usage::UP => Key::KEY_UP,
        usage::NUM_LOCK => Key::KEY_NUMLOCK,
        usage::APPLICATION => Key::KEY_COMPOSE,
        usage::LEFT_CTRL => Key::KEY_LEFTCTRL,
        usage::LEFT_SHIFT => Key::KEY_LEFTSHIFT,
        usage::LEFT_ALT => Key::KEY_LEFTALT,
        usage::LEFT_GUI => Key::KEY_LEFTMETA,
        usage::RIGHT_CTRL => Key::KEY_RIGHTCTRL,
        usage::RIGHT_SHIFT => Key::KEY_RIGHTSHIFT,
        usage::RIGHT_ALT => Key::KEY_RIGHTALT,
        usage::RIGHT_GUI => Key::KEY_RIGHTMETA,
        _ => return None,
    };
    Some(key)
}

fn media_to_key(key: MediaKey) -> Key {
    match key {
        MediaKey::VolumeUp => Key::KEY_VOLUMEUP,
        MediaKey::VolumeDown => Key::KEY_VOLUMEDOWN,
        MediaKey::Mute => Key::KEY_MUTE,
        MediaKey::PlayPause => Key::KEY_PLAYPAUSE,
        MediaKey::Stop => Key::KEY_STOPCD,
        MediaKey::NextTrack => Key::KEY_NEXTSONG,
        MediaKey::PrevTrack => Key::KEY_PREVIOUSSONG,
    }
}

fn button_to_key(button: MouseButton) -> Key {
    match button {
        MouseButton::Left => Key::BTN_LEFT,
        MouseButton::Right => Key::BTN_RIGHT,
        MouseButton::Middle => Key::BTN_MIDDLE,
        MouseButton::Back => Key::BTN_SIDE,
        MouseButton::Forward => Key::BTN_EXTRA,
    }
}

/// Virtual keyboard+mouse device. Gamepad calls are ignored.
pub struct UinputSink {
    device: VirtualDevice,
}

impl UinputSink {
    /// Create the virtual device
    ///
    /// # Arguments
    /// * `name` - Device name (shown in `evtest` and input settings)
    pub fn new(name: &str) -> Result<Self, HidError> {
        let mut keys = AttributeSet::<Key>::new();
        for code in 0x04..=usage::RIGHT_GUI {
            if let Some(key) = usage_to_key(code) {
                keys.insert(key);
            }
        }
        for media in MediaKey::ALL {
            keys.insert(media_to_key(*media));
        }
        for button in [
            MouseButton::Left,
            MouseButton::Right,
            MouseButton::Middle,
            MouseButton::Back,
            MouseButton::Forward,
        ] {
            keys.insert(button_to_key(button));
        }

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);
        axes.insert(RelativeAxisType::REL_WHEEL);
        axes.insert(RelativeAxisType::REL_HWHEEL);

        let device = VirtualDeviceBuilder::new()
            .map_err(HidError::CreateDevice)?
            .name(name)
            .with_keys(&keys)
            .map_err(HidError::CreateDevice)?
            .with_relative_axes(&axes)
            .map_err(HidError::CreateDevice)?
            .build()
            .map_err(HidError::CreateDevice)?;

        Ok(Self { device })
    }

    fn emit(&mut self, events: &[InputEvent]) -> Result<(), HidError> {
        self.device.emit(events).map_err(HidError::EmitEvent)
    }

    fn key_event(key: Key, down: bool) -> InputEvent {
        InputEvent::new_now(EventType::KEY, key.code(), down as i32)
    }

    fn rel_event(axis: RelativeAxisType, value: i32) -> InputEvent {
        InputEvent::new_now(EventType::RELATIVE, axis.0, value)
    }
}

impl HidSink for UinputSink {
    fn press_key(&mut self, code: u8) -> Result<(), HidError> {
        match usage_to_key(code) {
            Some(key) => self.emit(&[Self::key_event(key, true)]),
            None => Ok(()),
        }
    }

    fn release_key(&mut self, code: u8) -> Result<(), HidError> {
        match usage_to_key(code) {
            Some(key) => self.emit(&[Self::key_event(key, false)]),
            None => Ok(()),
        }
    }

    fn release_all(&mut self) -> Result<(), HidError> {
        let events: Vec<InputEvent> = (0x04..=usage::RIGHT_GUI)
            .filter_map(usage_to_key)
            .map(|key| Self::key_event(key, false))
            .collect();
        self.emit(&events)
    }

    fn type_char(&mut self, ch: char) -> Result<(), HidError> {
        let Some((code, shift)) = char_to_hid(ch) else {
            return Ok(());
        };
        let Some(key) = usage_to_key(code) else {
            return Ok(());
        };
        let mut events = Vec::with_capacity(4);
        if shift {
            events.push(Self::key_event(Key::KEY_LEFTSHIFT, true));
        }
        events.push(Self::key_event(key, true));
        self.emit(&events)?;
        events.clear();
        events.push(Self::key_event(key, false));
        if shift {
            events.push(Self::key_event(Key::KEY_LEFTSHIFT, false));
        }
        self.emit(&events)
    }

    fn move_mouse(&mut self, dx: i8, dy: i8) -> Result<(), HidError> {
        self.emit(&[
            Self::rel_event(RelativeAxisType::REL_X, dx as i32),
            Self::rel_event(RelativeAxisType::REL_Y, dy as i32),
        ])
    }

    fn mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), HidError> {
        self.emit(&[Self::key_event(button_to_key(button), down)])
    }

    fn scroll(&mut self, vertical: i8, horizontal: i8) -> Result<(), HidError> {
        let mut events = Vec::with_capacity(2);
        if vertical != 0 {
            events.push(Self::rel_event(RelativeAxisType::REL_WHEEL, vertical as i32));
        }
        if horizontal != 0 {
            events.push(Self::rel_event(
                RelativeAxisType::REL_HWHEEL,
                horizontal as i32,
            ));
        }
        if events.is_empty() {
            return Ok(());
        }
        self.emit(&events)
    }

    fn gamepad_button(&mut self, _button: GamepadButton, _down: bool) -> Result<(), HidError> {
        Ok(())
    }

    fn gamepad_axis(&mut self, _axis: GamepadAxis, _value: i8) -> Result<(), HidError> {
        Ok(())
    }

    fn gamepad_hat(&mut self, _direction: HatDirection) -> Result<(), HidError> {
        Ok(())
    }

    fn media_key(&mut self, key: MediaKey, down: bool) -> Result<(), HidError> {
        self.emit(&[Self::key_event(media_to_key(key), down)])
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::all();
        caps.gamepad = false;
        caps
    }

    fn delay(&mut self, ms: u32) -> Result<(), HidError> {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms as u64));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_to_key_table() {
        assert_eq!(usage_to_key(0x04), Some(Key::KEY_A));
        assert_eq!(usage_to_key(0x1D), Some(Key::KEY_Z));
        assert_eq!(usage_to_key(0x27), Some(Key::KEY_0));
        assert_eq!(usage_to_key(usage::F12), Some(Key::KEY_F12));
        assert_eq!(usage_to_key(usage::F24), Some(Key::KEY_F24));
        assert_eq!(usage_to_key(usage::LEFT_GUI), Some(Key::KEY_LEFTMETA));
        assert_eq!(usage_to_key(0x32), None);
    }
}
