//! Integration tests for file playback.
//!
//! Each dialect goes through the public `Player` entry point: detection,
//! dispatch to the right interpreter, and the HID actions that come out.

use pwdongle::hid::timing::KEY_HOLD_MS;
use pwdongle::hid::{usage, HidEvent, RecordingSink};
use pwdongle::playback::DEFAULT_FILE_PACING_MS;
use pwdongle::{Dialect, FileStore, MacroEngine, MemoryFileStore, Player, ScriptEngine};

const R: u8 = 0x15;

fn play(content: &str) -> (Dialect, RecordingSink) {
    let mut sink = RecordingSink::new();
    let dialect = Player::default()
        .play(&mut sink, &mut MacroEngine::new(0), content)
        .unwrap();
    (dialect, sink)
}

// ── Token macros ──

#[test]
fn macro_text_with_keys_and_delays() {
    let (dialect, sink) = play("Hello{{KEY:enter}}{{DELAY:100}}World");
    assert_eq!(dialect, Dialect::Macro);
    assert_eq!(sink.typed_text(), "HelloWorld");
    assert_eq!(sink.total_delay_ms(), KEY_HOLD_MS as u64 + 100);

    let actions = sink.actions();
    assert_eq!(actions[5], HidEvent::Press(usage::ENTER));
    assert_eq!(actions[6], HidEvent::Release(usage::ENTER));
    assert_eq!(actions[7], HidEvent::Type('W'));
}

#[test]
fn multi_line_macro_file_keeps_plain_newlines() {
    let (_, sink) = play("user{{KEY:tab}}\nsecret{{KEY:enter}}\nline one\nline two\n");
    assert_eq!(sink.typed_text(), "usersecretline one\nline two\n");
}

#[test]
fn default_speed_paces_macro_text() {
    let mut sink = RecordingSink::new();
    Player::default()
        .play(&mut sink, &mut MacroEngine::new(15), "abc")
        .unwrap();
    assert_eq!(sink.total_delay_ms(), 45);
}

// ── DuckyScript ──

#[test]
fn ducky_script_is_detected_and_run() {
    let (dialect, sink) = play("REM open a terminal\nGUI r\nDELAY 200\nSTRING cmd\nENTER\n");
    assert_eq!(dialect, Dialect::Ducky);
    assert_eq!(sink.typed_text(), "cmd");
    assert_eq!(
        sink.actions(),
        vec![
            HidEvent::Press(usage::LEFT_GUI),
            HidEvent::Press(R),
            HidEvent::Release(R),
            HidEvent::Release(usage::LEFT_GUI),
            HidEvent::Type('c'),
            HidEvent::Type('m'),
            HidEvent::Type('d'),
            HidEvent::Press(usage::ENTER),
            HidEvent::Release(usage::ENTER),
        ]
    );
    // two key lines and one STRING, each followed by the 10 ms gap
    assert_eq!(
        sink.total_delay_ms(),
        200 + 2 * KEY_HOLD_MS as u64 + 3 * 10
    );
}

#[test]
fn tokens_win_over_ducky_markers() {
    let (dialect, sink) = play("STRING {{KEY:a}}");
    assert_eq!(dialect, Dialect::Macro);
    assert_eq!(sink.typed_text(), "STRING ");
}

// ── Advanced scripts ──

#[test]
fn advanced_script_loops_and_branches() {
    let source = "\
VAR n = 0
LOOP 3
    n = n + 1
    IF n == 2 THEN
        two
    ELSE
        x
    ENDIF
ENDLOOP
FOR i = 1 TO 2
    {{KEY:tab}}
NEXT i
";
    let (dialect, sink) = play(source);
    assert_eq!(dialect, Dialect::Advanced);
    assert_eq!(sink.typed_text(), "xtwox");
    let tabs = sink
        .actions()
        .iter()
        .filter(|e| **e == HidEvent::Press(usage::TAB))
        .count();
    assert_eq!(tabs, 2);
}

#[test]
fn advanced_script_waits_and_gamepad_calls() {
    let (_, sink) = play("set_val(XB1_A, 100)\nwait(250)\nset_val(XB1_A, 0)");
    assert_eq!(sink.total_delay_ms(), 250);
    assert_eq!(
        sink.actions().len(),
        2,
        "one press and one release: {:?}",
        sink.actions()
    );
}

#[test]
fn runaway_script_is_cut_off() {
    let mut sink = RecordingSink::new();
    let mut player = Player::new(ScriptEngine::new(500), DEFAULT_FILE_PACING_MS);
    player
        .play(
            &mut sink,
            &mut MacroEngine::new(0),
            "LOOP 1000000\nx\nENDLOOP",
        )
        .unwrap();
    let typed = sink.typed_text();
    assert!(!typed.is_empty());
    assert!(typed.len() < 500);
}

// ── Files ──

#[test]
fn play_file_reads_from_store() {
    let files = MemoryFileStore::new().with_file("greet.txt", "Hi{{KEY:enter}}");
    let mut sink = RecordingSink::new();
    let dialect = Player::default()
        .play_file(&mut sink, &mut MacroEngine::new(0), &files, "greet.txt")
        .unwrap();
    assert_eq!(dialect, Dialect::Macro);
    assert_eq!(sink.typed_text(), "Hi");
}

#[test]
fn play_missing_file_is_an_error() {
    let files = MemoryFileStore::new();
    let mut sink = RecordingSink::new();
    let result = Player::default().play_file(
        &mut sink,
        &mut MacroEngine::new(0),
        &files,
        "nope.txt",
    );
    assert!(result.is_err());
    assert!(!files.exists("nope.txt"));
}

#[test]
fn raw_typing_ignores_tokens() {
    let files = MemoryFileStore::new().with_file("1234.txt", "a{{KEY:b}}");
    let mut sink = RecordingSink::new();
    let typed = Player::default().type_raw(&mut sink, &files, "1234.txt").unwrap();
    assert_eq!(typed, 10);
    assert_eq!(sink.typed_text(), "a{{KEY:b}}");
    assert_eq!(sink.total_delay_ms(), 10 * DEFAULT_FILE_PACING_MS as u64);
}
