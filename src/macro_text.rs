//! Token macro parsing and interpretation.
//!
//! Macro text is typed literally except for `{{KIND:ARGS}}` directives:
//!
//! ```text
//! {{DELAY:500}}              - pause (0..=5000 ms)
//! {{SPEED:20}}               - per-character delay for the rest of the pass (0..=200 ms)
//! {{KEY:ctrl+alt+delete}}    - tap a key or modifier combo
//! {{TEXT:hello}}             - type text at the current speed
//! {{MOUSE:MOVE:100,200}}     - RESET, MOVE, MOVE_REL, DOWN, UP, CLICK, SCROLL, HSCROLL
//! {{GAMEPAD:PRESS A}}        - PRESS, RELEASE, DPAD, LS, RS, LT, RT
//! {{AUDIO:VOL_UP:3}}         - VOL_UP, VOL_DOWN, MUTE, PLAY_PAUSE, STOP, NEXT, PREV
//! ```
//!
//! Nothing here fails on bad input. Unknown token kinds are typed back as
//! `{{body}}`, unknown key/button names do nothing, and malformed numbers
//! read as 0. Only sink I/O errors stop a macro.

use std::fmt;

use pwdongle_hid::timing::SCROLL_STEP_MS;
use pwdongle_hid::{
    parse_chord, GamepadAxis, GamepadButton, HatDirection, HidError, HidSink, MediaKey,
    MouseButton, MouseTracker,
};
use tracing::debug;

use crate::token::{Scan, TokenScanner};

pub const MAX_DELAY_MS: u32 = 5000;
pub const MAX_SPEED_MS: u32 = 200;
pub const MAX_AUDIO_REPEAT: u32 = 10;

/// Parse a leading integer the forgiving way: optional sign, then digits,
/// anything after is ignored, no digits at all is 0.
pub fn to_int(s: &str) -> i64 {
    let s = s.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, b| {
            acc.saturating_mul(10).saturating_add((b - b'0') as i64)
        });
    if negative {
        -value
    } else {
        value
    }
}

fn clamp_u32(value: i64, max: u32) -> u32 {
    value.clamp(0, max as i64) as u32
}

fn clamp_i8(value: i64) -> i8 {
    value.clamp(-127, 127) as i8
}

fn to_i32(s: &str) -> i32 {
    to_int(s).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Parse `x,y` into two integers.
fn parse_pair(args: &str) -> Option<(i32, i32)> {
    let (x, y) = args.split_once(',')?;
    Some((to_i32(x), to_i32(y)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Down,
    Up,
    Click,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MouseCommand {
    Reset,
    MoveTo { x: i32, y: i32 },
    MoveBy { dx: i32, dy: i32 },
    Button {
        button: MouseButton,
        action: ButtonAction,
    },
    Scroll(i32),
    HScroll(i32),
    /// Unrecognized verb or arguments (ignored when run)
    Invalid(String),
}

impl MouseCommand {
    pub fn parse(args: &str) -> Self {
        let (verb, rest) = match args.split_once(':') {
            Some((v, r)) => (v, r),
            None => (args, ""),
        };
        let invalid = || MouseCommand::Invalid(args.to_string());
        let verb = verb.trim().to_ascii_uppercase();
        match verb.as_str() {
            "RESET" => MouseCommand::Reset,
            "MOVE" => parse_pair(rest).map_or_else(invalid, |(x, y)| MouseCommand::MoveTo { x, y }),
            "MOVE_REL" => {
                parse_pair(rest).map_or_else(invalid, |(dx, dy)| MouseCommand::MoveBy { dx, dy })
            }
            "DOWN" | "UP" | "CLICK" => {
                let action = match verb.as_str() {
                    "DOWN" => ButtonAction::Down,
                    "UP" => ButtonAction::Up,
                    _ => ButtonAction::Click,
                };
                let name = if rest.trim().is_empty() { "left" } else { rest };
                match name.parse::<MouseButton>() {
                    Ok(button) => MouseCommand::Button { button, action },
                    Err(_) => invalid(),
                }
            }
            "SCROLL" => MouseCommand::Scroll(to_i32(rest)),
            "HSCROLL" => MouseCommand::HScroll(to_i32(rest)),
            _ => invalid(),
        }
    }
}

impl fmt::Display for MouseCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseCommand::Reset => write!(f, "RESET"),
            MouseCommand::MoveTo { x, y } => write!(f, "MOVE:{x},{y}"),
            MouseCommand::MoveBy { dx, dy } => write!(f, "MOVE_REL:{dx},{dy}"),
            MouseCommand::Button { button, action } => {
                let verb = match action {
                    ButtonAction::Down => "DOWN",
                    ButtonAction::Up => "UP",
                    ButtonAction::Click => "CLICK",
                };
                write!(f, "{verb}:{}", button.to_string().to_ascii_uppercase())
            }
            MouseCommand::Scroll(n) => write!(f, "SCROLL:{n}"),
            MouseCommand::HScroll(n) => write!(f, "HSCROLL:{n}"),
            MouseCommand::Invalid(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GamepadCommand {
    Press(GamepadButton),
    Release(GamepadButton),
    Dpad(HatDirection),
    Stick { left: bool, x: i8, y: i8 },
    Trigger { left: bool, value: i8 },
    Invalid(String),
}

impl GamepadCommand {
    /// Words may be separated by spaces, `:` or `,` (`PRESS A`, `LS:10,-20`).
    pub fn parse(args: &str) -> Self {
        let normalized = args.replace([':', ','], " ");
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let invalid = || GamepadCommand::Invalid(args.to_string());
        let Some(verb) = words.first() else {
            return invalid();
        };
        let arg = |i: usize| words.get(i).copied().unwrap_or("0");
        match verb.to_ascii_uppercase().as_str() {
            "PRESS" | "RELEASE" => {
                let Some(name) = words.get(1) else {
                    return invalid();
                };
                match name.parse::<GamepadButton>() {
                    Ok(b) if verb.eq_ignore_ascii_case("PRESS") => GamepadCommand::Press(b),
                    Ok(b) => GamepadCommand::Release(b),
                    Err(_) => invalid(),
                }
            }
            "DPAD" | "HAT" => match words.get(1).map(|d| d.parse::<HatDirection>()) {
                Some(Ok(dir)) => GamepadCommand::Dpad(dir),
                _ => invalid(),
            },
            "LS" | "RS" => GamepadCommand::Stick {
                left: verb.eq_ignore_ascii_case("LS"),
                x: clamp_i8(to_int(arg(1))),
                y: clamp_i8(to_int(arg(2))),
            },
            "LT" | "RT" => GamepadCommand::Trigger {
                left: verb.eq_ignore_ascii_case("LT"),
                value: clamp_i8(to_int(arg(1))),
            },
            _ => invalid(),
        }
    }
}

impl fmt::Display for GamepadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GamepadCommand::Press(b) => write!(f, "PRESS {b}"),
            GamepadCommand::Release(b) => write!(f, "RELEASE {b}"),
            GamepadCommand::Dpad(d) => write!(f, "DPAD {}", d.to_string().to_ascii_uppercase()),
            GamepadCommand::Stick { left, x, y } => {
                write!(f, "{} {x} {y}", if *left { "LS" } else { "RS" })
            }
            GamepadCommand::Trigger { left, value } => {
                write!(f, "{} {value}", if *left { "LT" } else { "RT" })
            }
            GamepadCommand::Invalid(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCommand {
    Tap { key: MediaKey, repeat: u32 },
    Invalid(String),
}

impl AudioCommand {
    pub fn parse(args: &str) -> Self {
        let (verb, count) = match args.split_once(':') {
            Some((v, n)) => (v, Some(n)),
            None => (args, None),
        };
        match verb.parse::<MediaKey>() {
            Ok(key) => {
                let repeat = match (key, count) {
                    (MediaKey::VolumeUp | MediaKey::VolumeDown, Some(n)) => {
                        to_int(n).clamp(1, MAX_AUDIO_REPEAT as i64) as u32
                    }
                    _ => 1,
                };
                AudioCommand::Tap { key, repeat }
            }
            Err(_) => AudioCommand::Invalid(args.to_string()),
        }
    }
}

/// One parsed `{{...}}` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroToken {
    Delay(u32),
    Speed(u32),
    /// Key or combo spec, resolved when run
    Key(String),
    Text(String),
    Mouse(MouseCommand),
    Gamepad(GamepadCommand),
    Audio(AudioCommand),
    /// Not a directive; typed back as `{{body}}`
    Unknown(String),
}

impl MacroToken {
    /// Parse a token body (the text between `{{` and `}}`).
    pub fn parse(body: &str) -> Self {
        if let Some(ms) = body.strip_prefix("DELAY:") {
            MacroToken::Delay(clamp_u32(to_int(ms), MAX_DELAY_MS))
        } else if let Some(ms) = body.strip_prefix("SPEED:") {
            MacroToken::Speed(clamp_u32(to_int(ms), MAX_SPEED_MS))
        } else if let Some(key) = body.strip_prefix("KEY:") {
            MacroToken::Key(key.to_string())
        } else if let Some(text) = body.strip_prefix("TEXT:") {
            MacroToken::Text(text.to_string())
        } else if let Some(args) = body.strip_prefix("MOUSE:") {
            MacroToken::Mouse(MouseCommand::parse(args))
        } else if let Some(args) = body.strip_prefix("GAMEPAD:") {
            MacroToken::Gamepad(GamepadCommand::parse(args))
        } else if let Some(args) = body.strip_prefix("AUDIO:") {
            MacroToken::Audio(AudioCommand::parse(args))
        } else {
            MacroToken::Unknown(body.to_string())
        }
    }
}

impl fmt::Display for MacroToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroToken::Delay(ms) => write!(f, "{{{{DELAY:{ms}}}}}"),
            MacroToken::Speed(ms) => write!(f, "{{{{SPEED:{ms}}}}}"),
            MacroToken::Key(k) => write!(f, "{{{{KEY:{k}}}}}"),
            MacroToken::Text(t) => write!(f, "{{{{TEXT:{t}}}}}"),
            MacroToken::Mouse(m) => write!(f, "{{{{MOUSE:{m}}}}}"),
            MacroToken::Gamepad(g) => write!(f, "{{{{GAMEPAD:{g}}}}}"),
            MacroToken::Audio(AudioCommand::Tap { key, repeat }) => {
                let verb = match key {
                    MediaKey::VolumeUp => "VOL_UP",
                    MediaKey::VolumeDown => "VOL_DOWN",
                    MediaKey::Mute => "MUTE",
                    MediaKey::PlayPause => "PLAY_PAUSE",
                    MediaKey::Stop => "STOP",
                    MediaKey::NextTrack => "NEXT",
                    MediaKey::PrevTrack => "PREV",
                };
                if *repeat > 1 {
                    write!(f, "{{{{AUDIO:{verb}:{repeat}}}}}")
                } else {
                    write!(f, "{{{{AUDIO:{verb}}}}}")
                }
            }
            MacroToken::Audio(AudioCommand::Invalid(s)) => write!(f, "{{{{AUDIO:{s}}}}}"),
            MacroToken::Unknown(body) => write!(f, "{{{{{body}}}}}"),
        }
    }
}

/// Runs macro text against a sink.
///
/// Holds what survives between passes: the configured default typing speed
/// and the mouse position estimate. The `SPEED` override lives only for the
/// pass that set it.
#[derive(Debug, Clone)]
pub struct MacroEngine {
    default_speed_ms: u32,
    mouse: MouseTracker,
}

impl Default for MacroEngine {
    fn default() -> Self {
        Self::new(0)
    }
}

impl MacroEngine {
    pub fn new(default_speed_ms: u32) -> Self {
        Self {
            default_speed_ms: default_speed_ms.min(MAX_SPEED_MS),
            mouse: MouseTracker::new(),
        }
    }

    pub fn default_speed_ms(&self) -> u32 {
        self.default_speed_ms
    }

    pub fn mouse_position(&self) -> (i32, i32) {
        self.mouse.position()
    }

    /// Interpret a complete piece of macro text.
    pub fn run<S: HidSink>(&mut self, sink: &mut S, text: &str) -> Result<(), HidError> {
        let mut pass = MacroPass::new(self, sink);
        for ch in text.chars() {
            pass.feed(ch)?;
        }
        pass.finish()
    }

    /// Execute one already-parsed token at the default speed.
    pub fn run_token<S: HidSink>(&mut self, sink: &mut S, token: &MacroToken) -> Result<(), HidError> {
        let mut speed = self.default_speed_ms;
        self.execute(sink, token, &mut speed)
    }

    fn execute<S: HidSink>(
        &mut self,
        sink: &mut S,
        token: &MacroToken,
        speed: &mut u32,
    ) -> Result<(), HidError> {
        match token {
            MacroToken::Delay(ms) => {
                if *ms > 0 {
                    sink.delay(*ms)?;
                }
            }
            MacroToken::Speed(ms) => *speed = *ms,
            MacroToken::Key(spec) => match parse_chord(spec) {
                Some(chord) => sink.tap(chord)?,
                None => debug!("Unknown key \"{spec}\", ignoring"),
            },
            MacroToken::Text(text) => sink.type_str(text, *speed)?,
            MacroToken::Mouse(cmd) => self.mouse_command(sink, cmd)?,
            MacroToken::Gamepad(cmd) => gamepad_command(sink, cmd)?,
            MacroToken::Audio(AudioCommand::Tap { key, repeat }) => {
                for _ in 0..*repeat {
                    sink.tap_media(*key)?;
                }
            }
            MacroToken::Audio(AudioCommand::Invalid(args)) => {
                debug!("Unknown audio command \"{args}\", ignoring");
            }
            MacroToken::Unknown(body) => {
                debug!("Unknown token \"{body}\", typing literally");
                sink.type_str(&format!("{{{{{body}}}}}"), *speed)?;
            }
        }
        Ok(())
    }

    fn mouse_command<S: HidSink>(&mut self, sink: &mut S, cmd: &MouseCommand) -> Result<(), HidError> {
        if !sink.capabilities().mouse {
            debug!("Mouse not available, skipping {cmd}");
            return Ok(());
        }
        let steps = match cmd {
            MouseCommand::Reset => self.mouse.reset(),
            MouseCommand::MoveTo { x, y } => self.mouse.move_to(*x, *y),
            MouseCommand::MoveBy { dx, dy } => self.mouse.move_by(*dx, *dy),
            MouseCommand::Button { button, action } => {
                match action {
                    ButtonAction::Down => sink.mouse_button(*button, true)?,
                    ButtonAction::Up => sink.mouse_button(*button, false)?,
                    ButtonAction::Click => {
                        sink.mouse_button(*button, true)?;
                        sink.mouse_button(*button, false)?;
                    }
                }
                return Ok(());
            }
            MouseCommand::Scroll(n) | MouseCommand::HScroll(n) => {
                let step: i8 = if *n < 0 { -1 } else { 1 };
                let vertical = matches!(cmd, MouseCommand::Scroll(_));
                for _ in 0..n.unsigned_abs() {
                    if vertical {
                        sink.scroll(step, 0)?;
                    } else {
                        sink.scroll(0, step)?;
                    }
                    sink.delay(SCROLL_STEP_MS)?;
                }
                return Ok(());
            }
            MouseCommand::Invalid(args) => {
                debug!("Unknown mouse command \"{args}\", ignoring");
                return Ok(());
            }
        };
        for (dx, dy) in steps {
            sink.move_mouse(dx, dy)?;
        }
        Ok(())
    }
}

fn gamepad_command<S: HidSink>(sink: &mut S, cmd: &GamepadCommand) -> Result<(), HidError> {
    if !sink.capabilities().gamepad {
        debug!("Gamepad not available, skipping {cmd}");
        return Ok(());
    }
    match cmd {
        GamepadCommand::Press(b) => sink.gamepad_button(*b, true),
        GamepadCommand::Release(b) => sink.gamepad_button(*b, false),
        GamepadCommand::Dpad(d) => sink.gamepad_hat(*d),
        GamepadCommand::Stick { left, x, y } => {
            let (ax, ay) = if *left {
                (GamepadAxis::LeftX, GamepadAxis::LeftY)
            } else {
                (GamepadAxis::RightX, GamepadAxis::RightY)
            };
            sink.gamepad_axis(ax, *x)?;
            sink.gamepad_axis(ay, *y)
        }
        GamepadCommand::Trigger { left, value } => {
            let axis = if *left {
                GamepadAxis::LeftTrigger
            } else {
                GamepadAxis::RightTrigger
            };
            sink.gamepad_axis(axis, *value)
        }
        GamepadCommand::Invalid(args) => {
            debug!("Unknown gamepad command \"{args}\", ignoring");
            Ok(())
        }
    }
}

/// One interpretation pass, fed a character at a time.
pub struct MacroPass<'a, S: HidSink> {
    engine: &'a mut MacroEngine,
    sink: &'a mut S,
    scanner: TokenScanner,
    speed: u32,
    /// The previous output was a token; a line break right after it is a
    /// separator, not text
    after_token: bool,
}

impl<'a, S: HidSink> MacroPass<'a, S> {
    pub fn new(engine: &'a mut MacroEngine, sink: &'a mut S) -> Self {
        let speed = engine.default_speed_ms;
        Self {
            engine,
            sink,
            scanner: TokenScanner::new(),
            speed,
            after_token: false,
        }
    }

    pub fn feed(&mut self, ch: char) -> Result<(), HidError> {
        match self.scanner.feed(ch) {
            Scan::Pending => Ok(()),
            Scan::Literal(c) => self.literal(c),
            Scan::Literal2(a, b) => {
                self.literal(a)?;
                self.literal(b)
            }
            Scan::Token(body) => {
                let token = MacroToken::parse(&body);
                debug!("Token: {token:?}");
                self.after_token = true;
                self.engine.execute(&mut *self.sink, &token, &mut self.speed)
            }
        }
    }

    /// Flush anything left open as literal text.
    pub fn finish(mut self) -> Result<(), HidError> {
        if let Some(rest) = self.scanner.finish() {
            for c in rest.chars() {
                self.literal(c)?;
            }
        }
        Ok(())
    }

    fn literal(&mut self, ch: char) -> Result<(), HidError> {
        if self.after_token {
            match ch {
                '\r' => return Ok(()),
                '\n' => {
                    self.after_token = false;
                    return Ok(());
                }
                _ => self.after_token = false,
            }
        }
        self.sink.type_char(ch)?;
        if self.speed > 0 {
            self.sink.delay(self.speed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwdongle_hid::mouse::MOUSE_EXTENT;
    use pwdongle_hid::timing::KEY_HOLD_MS;
    use pwdongle_hid::{usage, Capabilities, HidEvent, RecordingSink};

    fn run(text: &str) -> RecordingSink {
        let mut sink = RecordingSink::new();
        MacroEngine::new(0).run(&mut sink, text).unwrap();
        sink
    }

    // --- to_int tests ---

    #[test]
    fn test_to_int_lenient() {
        assert_eq!(to_int("42"), 42);
        assert_eq!(to_int(" -17ms"), -17);
        assert_eq!(to_int("+5"), 5);
        assert_eq!(to_int("abc"), 0);
        assert_eq!(to_int(""), 0);
        assert_eq!(to_int("99999999999999999999999"), i64::MAX);
    }

    // --- token parse tests ---

    #[test]
    fn test_parse_clamps() {
        assert_eq!(MacroToken::parse("DELAY:99999"), MacroToken::Delay(5000));
        assert_eq!(MacroToken::parse("DELAY:-5"), MacroToken::Delay(0));
        assert_eq!(MacroToken::parse("SPEED:500"), MacroToken::Speed(200));
        assert_eq!(MacroToken::parse("DELAY:abc"), MacroToken::Delay(0));
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(
            MacroToken::parse("delay:100"),
            MacroToken::Unknown("delay:100".into())
        );
    }

    #[test]
    fn test_parse_mouse() {
        assert_eq!(
            MouseCommand::parse("MOVE:100,200"),
            MouseCommand::MoveTo { x: 100, y: 200 }
        );
        assert_eq!(
            MouseCommand::parse("move_rel:-5,7"),
            MouseCommand::MoveBy { dx: -5, dy: 7 }
        );
        assert_eq!(
            MouseCommand::parse("CLICK:right"),
            MouseCommand::Button {
                button: MouseButton::Right,
                action: ButtonAction::Click
            }
        );
        assert_eq!(MouseCommand::parse("SCROLL:-3"), MouseCommand::Scroll(-3));
        assert!(matches!(MouseCommand::parse("MOVE:100"), MouseCommand::Invalid(_)));
        assert!(matches!(MouseCommand::parse("DOWN:thumb"), MouseCommand::Invalid(_)));
    }

    #[test]
    fn test_parse_gamepad() {
        assert_eq!(
            GamepadCommand::parse("PRESS A"),
            GamepadCommand::Press(GamepadButton::A)
        );
        assert_eq!(
            GamepadCommand::parse("LS 300 -50"),
            GamepadCommand::Stick {
                left: true,
                x: 127,
                y: -50
            }
        );
        assert_eq!(
            GamepadCommand::parse("RT:-200"),
            GamepadCommand::Trigger {
                left: false,
                value: -127
            }
        );
        assert_eq!(
            GamepadCommand::parse("DPAD up"),
            GamepadCommand::Dpad(HatDirection::Up)
        );
        assert!(matches!(GamepadCommand::parse("PRESS"), GamepadCommand::Invalid(_)));
    }

    #[test]
    fn test_parse_audio() {
        assert_eq!(
            AudioCommand::parse("VOL_UP:25"),
            AudioCommand::Tap {
                key: MediaKey::VolumeUp,
                repeat: 10
            }
        );
        assert_eq!(
            AudioCommand::parse("MUTE"),
            AudioCommand::Tap {
                key: MediaKey::Mute,
                repeat: 1
            }
        );
        assert!(matches!(AudioCommand::parse("LOUDER"), AudioCommand::Invalid(_)));
    }

    #[test]
    fn test_token_display() {
        assert_eq!(MacroToken::Delay(120).to_string(), "{{DELAY:120}}");
        assert_eq!(
            MacroToken::Mouse(MouseCommand::MoveBy { dx: 3, dy: -4 }).to_string(),
            "{{MOUSE:MOVE_REL:3,-4}}"
        );
        assert_eq!(MacroToken::Unknown("FOO:bar".into()).to_string(), "{{FOO:bar}}");
    }

    // --- interpreter tests ---

    #[test]
    fn test_brace_free_text_is_identity() {
        let text = "Hello, World! 123 {not a token} }} done\n";
        let sink = run(text);
        assert_eq!(sink.typed_text(), text);
        assert!(sink
            .events()
            .iter()
            .all(|e| matches!(e, HidEvent::Type(_))));
    }

    #[test]
    fn test_key_token_single_tap() {
        let sink = run("{{KEY:a}}");
        assert_eq!(
            sink.events(),
            &[
                HidEvent::Press(0x04),
                HidEvent::Delay(KEY_HOLD_MS),
                HidEvent::Release(0x04),
            ]
        );
        assert_eq!(sink.typed_text(), "");
    }

    #[test]
    fn test_unknown_token_typed_back() {
        let sink = run("{{FOO:bar}}");
        assert_eq!(sink.typed_text(), "{{FOO:bar}}");
    }

    #[test]
    fn test_unknown_key_ignored() {
        let sink = run("{{KEY:nosuchkey}}x");
        assert_eq!(sink.events(), &[HidEvent::Type('x')]);
    }

    #[test]
    fn test_delay_clamp_equivalence() {
        assert_eq!(run("{{DELAY:99999}}").events(), run("{{DELAY:5000}}").events());
        assert_eq!(run("{{SPEED:500}}ab").events(), run("{{SPEED:200}}ab").events());
    }

    #[test]
    fn test_speed_paces_text_and_resets_per_pass() {
        let mut engine = MacroEngine::new(0);
        let mut sink = RecordingSink::new();
        engine.run(&mut sink, "{{SPEED:20}}ab{{TEXT:cd}}").unwrap();
        assert_eq!(sink.typed_text(), "abcd");
        assert_eq!(sink.total_delay_ms(), 80);

        sink.clear();
        engine.run(&mut sink, "ef").unwrap();
        assert_eq!(sink.total_delay_ms(), 0);
    }

    #[test]
    fn test_line_break_after_token_is_separator() {
        let sink = run("{{KEY:enter}}\r\n{{DELAY:10}}\nHi\nthere");
        assert_eq!(sink.typed_text(), "Hi\nthere");
    }

    #[test]
    fn test_mouse_absolute_and_relative() {
        let mut engine = MacroEngine::new(0);
        let mut sink = RecordingSink::new();
        engine
            .run(&mut sink, "{{MOUSE:MOVE:300,10}}{{MOUSE:MOVE_REL:-20,5}}")
            .unwrap();
        assert_eq!(sink.mouse_motion(), (280, 15));
        assert_eq!(engine.mouse_position(), (280, 15));
        assert!(sink.events().iter().all(|e| match e {
            HidEvent::MouseMove { dx, dy } => dx.unsigned_abs() <= 127 && dy.unsigned_abs() <= 127,
            _ => true,
        }));
    }

    #[test]
    fn test_mouse_scroll_paced() {
        let sink = run("{{MOUSE:SCROLL:-2}}");
        assert_eq!(
            sink.events(),
            &[
                HidEvent::Scroll {
                    vertical: -1,
                    horizontal: 0
                },
                HidEvent::Delay(SCROLL_STEP_MS),
                HidEvent::Scroll {
                    vertical: -1,
                    horizontal: 0
                },
                HidEvent::Delay(SCROLL_STEP_MS),
            ]
        );
    }

    #[test]
    fn test_mouse_reset_reaches_origin() {
        let mut engine = MacroEngine::new(0);
        let mut sink = RecordingSink::new();
        engine
            .run(&mut sink, "{{MOUSE:MOVE:50,50}}{{MOUSE:RESET}}")
            .unwrap();
        assert_eq!(engine.mouse_position(), (0, 0));
        assert_eq!(sink.mouse_motion(), (50 - MOUSE_EXTENT, 50 - MOUSE_EXTENT));
    }

    #[test]
    fn test_mouse_extreme_relative_move_then_absolute() {
        let mut engine = MacroEngine::new(0);
        let mut sink = RecordingSink::new();
        engine
            .run(
                &mut sink,
                "{{MOUSE:MOVE_REL:-2147483648,0}}{{MOUSE:MOVE:10,0}}after",
            )
            .unwrap();
        assert_eq!(engine.mouse_position(), (10, 0));
        assert_eq!(sink.typed_text(), "after");
    }

    #[test]
    fn test_gamepad_tokens() {
        let sink = run("{{GAMEPAD:PRESS A}}{{GAMEPAD:LS 10 -10}}{{GAMEPAD:RELEASE A}}");
        assert_eq!(
            sink.events(),
            &[
                HidEvent::GamepadButton {
                    button: GamepadButton::A,
                    down: true
                },
                HidEvent::GamepadAxis {
                    axis: GamepadAxis::LeftX,
                    value: 10
                },
                HidEvent::GamepadAxis {
                    axis: GamepadAxis::LeftY,
                    value: -10
                },
                HidEvent::GamepadButton {
                    button: GamepadButton::A,
                    down: false
                },
            ]
        );
    }

    #[test]
    fn test_capability_gated_actions_are_noops() {
        let mut sink = RecordingSink::with_capabilities(Capabilities::keyboard_only());
        MacroEngine::new(0)
            .run(
                &mut sink,
                "{{AUDIO:MUTE}}{{MOUSE:CLICK:left}}{{GAMEPAD:PRESS A}}",
            )
            .unwrap();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_audio_repeat() {
        let sink = run("{{AUDIO:VOL_DOWN:3}}");
        let presses = sink
            .events()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    HidEvent::Media {
                        key: MediaKey::VolumeDown,
                        down: true
                    }
                )
            })
            .count();
        assert_eq!(presses, 3);
    }

    #[test]
    fn test_combo_key() {
        let sink = run("{{KEY:ctrl+alt+delete}}");
        let actions = sink.actions();
        assert_eq!(actions.first(), Some(&HidEvent::Press(usage::LEFT_CTRL)));
        assert_eq!(actions.last(), Some(&HidEvent::Release(usage::LEFT_CTRL)));
        assert_eq!(actions.len(), 6);
    }
}
