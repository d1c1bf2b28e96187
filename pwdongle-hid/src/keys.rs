//! Named keys, modifier combos and media keys.
//!
//! Key names are resolved through one static table built on first use.
//! Lookups are case-insensitive. A single printable character is also a
//! valid key name and resolves through [`char_to_hid`], carrying Shift
//! when the character needs it.

use crate::hid_codes::{char_to_hid, key_name, mods, usage};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// A key plus the modifiers held around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    /// Modifier mask (see [`mods`])
    pub mods: u8,
    /// Keyboard usage code
    pub key: u8,
}

impl Chord {
    pub const fn key(key: u8) -> Self {
        Self { mods: 0, key }
    }

    pub const fn with_mods(mods: u8, key: u8) -> Self {
        Self { mods, key }
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bit, name) in [
            (mods::LCTRL, "ctrl"),
            (mods::LSHIFT, "shift"),
            (mods::LALT, "alt"),
            (mods::LGUI, "gui"),
            (mods::RCTRL, "rctrl"),
            (mods::RSHIFT, "rshift"),
            (mods::RALT, "ralt"),
            (mods::RGUI, "rgui"),
        ] {
            if self.mods & bit != 0 {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", key_name(self.key).to_ascii_lowercase())
    }
}

#[rustfmt::skip]
static NAMED_KEYS: LazyLock<HashMap<&'static str, u8>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    let entries: &[(&str, u8)] = &[
        ("enter", usage::ENTER), ("return", usage::ENTER),
        ("esc", usage::ESCAPE), ("escape", usage::ESCAPE),
        ("backspace", usage::BACKSPACE), ("bksp", usage::BACKSPACE),
        ("tab", usage::TAB), ("space", usage::SPACE),
        ("capslock", usage::CAPS_LOCK), ("caps", usage::CAPS_LOCK),
        ("printscreen", usage::PRINT_SCREEN), ("prtsc", usage::PRINT_SCREEN),
        ("scrolllock", usage::SCROLL_LOCK), ("pause", usage::PAUSE),
        ("break", usage::PAUSE),
        ("insert", usage::INSERT), ("ins", usage::INSERT),
        ("home", usage::HOME), ("end", usage::END),
        ("pageup", usage::PAGE_UP), ("pgup", usage::PAGE_UP),
        ("pagedown", usage::PAGE_DOWN), ("pgdn", usage::PAGE_DOWN),
        ("delete", usage::DELETE), ("del", usage::DELETE),
        ("right", usage::RIGHT), ("rightarrow", usage::RIGHT),
        ("left", usage::LEFT), ("leftarrow", usage::LEFT),
        ("down", usage::DOWN), ("downarrow", usage::DOWN),
        ("up", usage::UP), ("uparrow", usage::UP),
        ("numlock", usage::NUM_LOCK),
        ("menu", usage::APPLICATION), ("app", usage::APPLICATION),
        ("ctrl", usage::LEFT_CTRL), ("control", usage::LEFT_CTRL),
        ("shift", usage::LEFT_SHIFT),
        ("alt", usage::LEFT_ALT), ("option", usage::LEFT_ALT),
        ("gui", usage::LEFT_GUI), ("win", usage::LEFT_GUI),
        ("windows", usage::LEFT_GUI), ("cmd", usage::LEFT_GUI),
        ("command", usage::LEFT_GUI), ("meta", usage::LEFT_GUI),
        ("super", usage::LEFT_GUI),
        ("rctrl", usage::RIGHT_CTRL), ("rshift", usage::RIGHT_SHIFT),
        ("ralt", usage::RIGHT_ALT), ("altgr", usage::RIGHT_ALT),
        ("rgui", usage::RIGHT_GUI),
    ];
    map.extend(entries.iter().copied());

    const FN_NAMES: [&str; 24] = [
        "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
        "f13", "f14", "f15", "f16", "f17", "f18", "f19", "f20", "f21", "f22", "f23", "f24",
    ];
    for (i, name) in FN_NAMES.iter().enumerate() {
        let code = if i < 12 {
            usage::F1 + i as u8
        } else {
            usage::F13 + (i - 12) as u8
        };
        map.insert(*name, code);
    }
    map
});

/// Parse a modifier name to its report bit.
pub fn parse_modifier(name: &str) -> Option<u8> {
    match name.trim().to_ascii_lowercase().as_str() {
        "ctrl" | "control" | "lctrl" | "lcontrol" => Some(mods::LCTRL),
        "shift" | "lshift" => Some(mods::LSHIFT),
        "alt" | "lalt" | "option" | "loption" => Some(mods::LALT),
        "gui" | "win" | "windows" | "super" | "cmd" | "command" | "meta" | "lgui" | "lwin" => {
            Some(mods::LGUI)
        }
        "rctrl" | "rcontrol" => Some(mods::RCTRL),
        "rshift" => Some(mods::RSHIFT),
        "ralt" | "roption" | "altgr" => Some(mods::RALT),
        "rgui" | "rwin" | "rsuper" | "rcmd" => Some(mods::RGUI),
        _ => None,
    }
}

/// Resolve a single key name (`enter`, `f5`, `a`, `!`).
pub fn lookup_key(name: &str) -> Option<Chord> {
    let name = name.trim();
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return char_to_hid(ch).map(|(code, shift)| {
            Chord::with_mods(if shift { mods::LSHIFT } else { 0 }, code)
        });
    }
    NAMED_KEYS
        .get(name.to_ascii_lowercase().as_str())
        .map(|&code| Chord::key(code))
}

/// Parse `mod+mod+key` (or a bare key name) into a chord.
///
/// Returns `None` if any part is unknown.
pub fn parse_chord(spec: &str) -> Option<Chord> {
    let spec = spec.trim();
    if spec.is_empty() {
        return None;
    }
    // `ctrl++` means ctrl and the plus key
    let (mod_part, key_part) = if spec == "+" {
        ("", "+")
    } else if let Some(prefix) = spec.strip_suffix("++") {
        (prefix, "+")
    } else {
        match spec.rsplit_once('+') {
            Some((m, k)) => (m, k),
            None => ("", spec),
        }
    };

    let mut chord = lookup_key(key_part)?;
    for name in mod_part.split('+').filter(|s| !s.trim().is_empty()) {
        chord.mods |= parse_modifier(name)?;
    }
    Some(chord)
}

/// Consumer-page media keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKey {
    VolumeUp,
    VolumeDown,
    Mute,
    PlayPause,
    Stop,
    NextTrack,
    PrevTrack,
}

impl MediaKey {
    pub const ALL: &'static [MediaKey] = &[
        MediaKey::VolumeUp,
        MediaKey::VolumeDown,
        MediaKey::Mute,
        MediaKey::PlayPause,
        MediaKey::Stop,
        MediaKey::NextTrack,
        MediaKey::PrevTrack,
    ];

    /// Consumer control usage ID
    pub fn usage(&self) -> u16 {
        match self {
            MediaKey::VolumeUp => 0x00E9,
            MediaKey::VolumeDown => 0x00EA,
            MediaKey::Mute => 0x00E2,
            MediaKey::PlayPause => 0x00CD,
            MediaKey::Stop => 0x00B7,
            MediaKey::NextTrack => 0x00B5,
            MediaKey::PrevTrack => 0x00B6,
        }
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MediaKey::VolumeUp => "VolumeUp",
            MediaKey::VolumeDown => "VolumeDown",
            MediaKey::Mute => "Mute",
            MediaKey::PlayPause => "PlayPause",
            MediaKey::Stop => "Stop",
            MediaKey::NextTrack => "Next",
            MediaKey::PrevTrack => "Prev",
        }
    }
}

impl FromStr for MediaKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VOL_UP" | "VOLUP" | "VOLUME_UP" => Ok(MediaKey::VolumeUp),
            "VOL_DOWN" | "VOLDOWN" | "VOLUME_DOWN" => Ok(MediaKey::VolumeDown),
            "MUTE" => Ok(MediaKey::Mute),
            "PLAY_PAUSE" | "PLAYPAUSE" | "PLAY" | "PAUSE" => Ok(MediaKey::PlayPause),
            "STOP" => Ok(MediaKey::Stop),
            "NEXT" | "NEXT_TRACK" => Ok(MediaKey::NextTrack),
            "PREV" | "PREVIOUS" | "PREV_TRACK" => Ok(MediaKey::PrevTrack),
            _ => Err(format!("unknown media key: \"{s}\"")),
        }
    }
}

/// What a HID profile can actually emit beyond the plain keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub mouse: bool,
    pub gamepad: bool,
    media: u8,
}

impl Capabilities {
    /// Keyboard only, no mouse, gamepad or media keys.
    pub const fn keyboard_only() -> Self {
        Self {
            mouse: false,
            gamepad: false,
            media: 0,
        }
    }

    /// Every optional feature present.
    pub fn all() -> Self {
        Self {
            mouse: true,
            gamepad: true,
            media: MediaKey::ALL.iter().fold(0, |acc, k| acc | k.bit()),
        }
    }

    pub fn with_media(mut self, keys: &[MediaKey]) -> Self {
        for key in keys {
            self.media |= key.bit();
        }
        self
    }

    pub fn without_media(mut self, key: MediaKey) -> Self {
        self.media &= !key.bit();
        self
    }

    pub fn supports(&self, key: MediaKey) -> bool {
        self.media & key.bit() != 0
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}
