//! DuckyScript interpreter.
//!
//! Line oriented, no variables. Each line is one of `REM`, `DELAY n`,
//! `DEFAULT_DELAY n`, `STRING text`, `STRINGLN text`, `REPEAT n`, or a key
//! line such as `ENTER` or `CTRL ALT DELETE`.
//!
//! `DEFAULT_DELAY` is read but not applied between commands, and `REPEAT n`
//! only waits `n` times the command gap instead of replaying the previous
//! line. Scripts written against this dongle depend on both.

use std::fmt;

use pwdongle_hid::{lookup_key, parse_modifier, Chord, HidError, HidSink};
use tracing::debug;

use crate::macro_text::to_int;

/// Pause after every STRING or key line.
pub const COMMAND_GAP_MS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuckyCommand {
    Rem,
    Delay(u32),
    DefaultDelay(u32),
    String(String),
    StringLn(String),
    Repeat(u32),
    /// Modifier bits plus key; `None` when the key name is unknown
    Keys(Option<Chord>),
}

fn ms(arg: &str) -> u32 {
    to_int(arg).clamp(0, u32::MAX as i64) as u32
}

/// Single letters are taken unshifted, so `GUI R` means gui+r.
fn resolve_key(word: &str) -> Option<Chord> {
    let mut chars = word.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            lookup_key(&c.to_ascii_lowercase().to_string())
        }
        _ => lookup_key(word),
    }
}

impl DuckyCommand {
    /// Parse one (trimmed) line. Blank lines give `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(' ') {
            Some((w, r)) => (w, r),
            None => (line, ""),
        };
        let cmd = match word {
            "REM" => DuckyCommand::Rem,
            "DELAY" => DuckyCommand::Delay(ms(rest)),
            "DEFAULT_DELAY" | "DEFAULTDELAY" => DuckyCommand::DefaultDelay(ms(rest)),
            "STRING" => DuckyCommand::String(rest.to_string()),
            "STRINGLN" => DuckyCommand::StringLn(rest.to_string()),
            "REPEAT" => DuckyCommand::Repeat(ms(rest)),
            _ => {
                let words: Vec<&str> = line.split(' ').filter(|w| !w.is_empty()).collect();
                let chord = match words.split_last() {
                    Some((key, [])) => resolve_key(key),
                    Some((key, modifiers)) => resolve_key(key).map(|mut chord| {
                        for m in modifiers {
                            match parse_modifier(m) {
                                Some(bit) => chord.mods |= bit,
                                None => debug!("Unknown modifier \"{m}\", skipping"),
                            }
                        }
                        chord
                    }),
                    None => None,
                };
                DuckyCommand::Keys(chord)
            }
        };
        Some(cmd)
    }
}

impl fmt::Display for DuckyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuckyCommand::Rem => write!(f, "REM"),
            DuckyCommand::Delay(ms) => write!(f, "DELAY {ms}"),
            DuckyCommand::DefaultDelay(ms) => write!(f, "DEFAULT_DELAY {ms}"),
            DuckyCommand::String(s) => write!(f, "STRING {s}"),
            DuckyCommand::StringLn(s) => write!(f, "STRINGLN {s}"),
            DuckyCommand::Repeat(n) => write!(f, "REPEAT {n}"),
            DuckyCommand::Keys(Some(chord)) => write!(f, "{chord}"),
            DuckyCommand::Keys(None) => write!(f, "(unknown key)"),
        }
    }
}

/// Detection heuristic for DuckyScript content.
pub fn is_ducky_script(content: &str) -> bool {
    ["REM ", "DELAY ", "STRING ", "GUI ", "CTRL ", "ALT ", "ENTER"]
        .iter()
        .any(|marker| content.contains(marker))
}

/// Runs DuckyScript text against a sink.
#[derive(Debug, Default)]
pub struct DuckyInterpreter {
    default_delay_ms: u32,
}

impl DuckyInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last `DEFAULT_DELAY` seen (not applied).
    pub fn default_delay_ms(&self) -> u32 {
        self.default_delay_ms
    }

    pub fn run<S: HidSink>(&mut self, sink: &mut S, script: &str) -> Result<(), HidError> {
        for line in script.lines() {
            if let Some(cmd) = DuckyCommand::parse(line) {
                self.execute(sink, &cmd)?;
            }
        }
        Ok(())
    }

    pub fn execute<S: HidSink>(&mut self, sink: &mut S, cmd: &DuckyCommand) -> Result<(), HidError> {
        debug!("Ducky: {cmd}");
        match cmd {
            DuckyCommand::Rem => {}
            DuckyCommand::Delay(ms) => {
                if *ms > 0 {
                    sink.delay(*ms)?;
                }
            }
            DuckyCommand::DefaultDelay(ms) => self.default_delay_ms = *ms,
            DuckyCommand::String(text) => {
                sink.type_str(text, 0)?;
                sink.delay(COMMAND_GAP_MS)?;
            }
            DuckyCommand::StringLn(text) => {
                sink.type_str(text, 0)?;
                sink.type_char('\n')?;
                sink.delay(COMMAND_GAP_MS)?;
            }
            DuckyCommand::Repeat(n) => {
                let total = n.saturating_mul(COMMAND_GAP_MS);
                if total > 0 {
                    sink.delay(total)?;
                }
            }
            DuckyCommand::Keys(None) => {}
            DuckyCommand::Keys(Some(chord)) => {
                sink.tap(*chord)?;
                sink.delay(COMMAND_GAP_MS)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwdongle_hid::timing::KEY_HOLD_MS;
    use pwdongle_hid::{mods, usage, HidEvent, RecordingSink};

    fn run(script: &str) -> RecordingSink {
        let mut sink = RecordingSink::new();
        DuckyInterpreter::new().run(&mut sink, script).unwrap();
        sink
    }

    // --- parse tests ---

    #[test]
    fn test_parse_commands() {
        assert_eq!(DuckyCommand::parse("REM hello"), Some(DuckyCommand::Rem));
        assert_eq!(DuckyCommand::parse("DELAY 500"), Some(DuckyCommand::Delay(500)));
        assert_eq!(
            DuckyCommand::parse("DEFAULTDELAY 20"),
            Some(DuckyCommand::DefaultDelay(20))
        );
        assert_eq!(
            DuckyCommand::parse("STRING  two spaces"),
            Some(DuckyCommand::String(" two spaces".into()))
        );
        assert_eq!(DuckyCommand::parse("   "), None);
    }

    #[test]
    fn test_parse_key_lines() {
        assert_eq!(
            DuckyCommand::parse("GUI r"),
            Some(DuckyCommand::Keys(Some(Chord::with_mods(mods::LGUI, 0x15))))
        );
        assert_eq!(
            DuckyCommand::parse("CTRL ALT DELETE"),
            Some(DuckyCommand::Keys(Some(Chord::with_mods(
                mods::LCTRL | mods::LALT,
                usage::DELETE
            ))))
        );
        // single letters are unshifted
        assert_eq!(
            DuckyCommand::parse("CTRL C"),
            Some(DuckyCommand::Keys(Some(Chord::with_mods(mods::LCTRL, 0x06))))
        );
        assert_eq!(DuckyCommand::parse("FROB"), Some(DuckyCommand::Keys(None)));
    }

    #[test]
    fn test_unknown_modifier_skipped() {
        assert_eq!(
            DuckyCommand::parse("HYPER SHIFT TAB"),
            Some(DuckyCommand::Keys(Some(Chord::with_mods(
                mods::LSHIFT,
                usage::TAB
            ))))
        );
    }

    // --- detection tests ---

    #[test]
    fn test_is_ducky_script() {
        assert!(is_ducky_script("REM test\nSTRING hi"));
        assert!(is_ducky_script("GUI r"));
        assert!(is_ducky_script("ENTER"));
        assert!(!is_ducky_script("hello world"));
        assert!(!is_ducky_script("rem lowercase"));
    }

    // --- run tests ---

    #[test]
    fn test_string_timing() {
        let sink = run("STRING ab\nSTRINGLN c");
        assert_eq!(sink.typed_text(), "abc\n");
        assert_eq!(
            sink.total_delay_ms(),
            2 * COMMAND_GAP_MS as u64
        );
    }

    #[test]
    fn test_key_line_events() {
        let sink = run("GUI r");
        assert_eq!(
            sink.events(),
            &[
                HidEvent::Press(usage::LEFT_GUI),
                HidEvent::Press(0x15),
                HidEvent::Delay(KEY_HOLD_MS),
                HidEvent::Release(0x15),
                HidEvent::Release(usage::LEFT_GUI),
                HidEvent::Delay(COMMAND_GAP_MS),
            ]
        );
    }

    #[test]
    fn test_repeat_is_flat_delay() {
        let sink = run("REPEAT 5");
        assert_eq!(sink.events(), &[HidEvent::Delay(50)]);
    }

    #[test]
    fn test_default_delay_not_applied() {
        let mut sink = RecordingSink::new();
        let mut ducky = DuckyInterpreter::new();
        ducky
            .run(&mut sink, "DEFAULT_DELAY 250\nSTRING x\nENTER")
            .unwrap();
        assert_eq!(ducky.default_delay_ms(), 250);
        assert_eq!(
            sink.total_delay_ms(),
            (COMMAND_GAP_MS + KEY_HOLD_MS + COMMAND_GAP_MS) as u64
        );
    }

    #[test]
    fn test_comments_and_unknown_keys_do_nothing() {
        let sink = run("REM nothing here\nFROBNICATE\n\n");
        assert!(sink.events().is_empty());
    }
}
