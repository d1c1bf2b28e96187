//! Advanced script dialect.
//!
//! ```text
//! VAR count = 3
//! LOOP count
//!     IF count > 1 THEN
//!         Hello{{KEY:enter}}
//!     ELSE
//!         set_val(XB1_A, 100)
//!         wait(200)
//!         set_val(XB1_A, 0)
//!     ENDIF
//!     count = count - 1
//! ENDLOOP
//! FOR i = 1 TO 3
//!     {{KEY:tab}}
//! NEXT i
//! ```
//!
//! Source is compiled once into an [`Instr`] list and run with a program
//! counter and a stack of [`Frame`]s. Lines that are not script syntax are
//! handed to the token macro interpreter. Control flow is forgiving: an
//! ENDLOOP, NEXT or ENDIF with nothing to close does nothing.

use std::collections::HashMap;

use pwdongle_hid::{GamepadButton, HidError, HidSink};
use tracing::{debug, warn};

use crate::expr::{evaluate, evaluate_condition};
use crate::macro_text::MacroEngine;

pub const DEFAULT_STEP_BUDGET: u64 = 1_000_000;

/// Pause for `combo_run`, which has no combo table to run.
pub const COMBO_RUN_DELAY_MS: u32 = 100;

/// Right-hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Assign { name: String, value: Value },
    If(String),
    Else,
    EndIf,
    Loop(String),
    EndLoop,
    For { var: String, start: String, end: String },
    Next,
    Wait(String),
    SetVal { button: String, value: String },
    ComboRun(String),
    /// Call to a function with no meaning here (ignored)
    Call(String),
    /// Malformed control line (ignored)
    Invalid(String),
    /// Anything else, run as macro text
    Macro(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Loop { remaining: i32, body_start: usize },
    For { var: String, body_start: usize },
    If,
}

/// Result of one script run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRun {
    pub steps: u64,
    /// Stopped early because the step budget ran out
    pub exhausted: bool,
}

/// Heuristic for the advanced dialect (checked on the uppercased text).
pub fn is_advanced_script(content: &str) -> bool {
    let upper = content.to_uppercase();
    upper.contains("VAR ")
        || upper.lines().any(|l| l.trim_start().starts_with("IF "))
        || upper.contains("LOOP ")
        || upper.contains("FOR ")
        || upper.contains("WAIT(")
        || upper.contains("SET_VAL(")
        || content.find('=').is_some_and(|i| i > 0)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip a case-insensitive keyword followed by whitespace (or the end).
fn keyword<'a>(line: &'a str, word: &str) -> Option<&'a str> {
    let head = line.get(..word.len())?;
    if !head.eq_ignore_ascii_case(word) {
        return None;
    }
    let rest = &line[word.len()..];
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        _ => None,
    }
}

/// `name = value`, where `=` is not part of a comparison.
fn parse_assignment(line: &str) -> Option<(String, Value)> {
    let eq = line.find('=')?;
    let name = line[..eq].trim();
    let rest = &line[eq + 1..];
    if !is_identifier(name) || rest.starts_with('=') {
        return None;
    }
    let rest = rest.trim();
    let value = match rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(s) if rest.len() >= 2 => Value::Str(s.to_string()),
        _ => Value::Expr(rest.to_string()),
    };
    Some((name.to_string(), value))
}

/// `name(args)` or `name(args);` with no space before the paren.
fn parse_call(line: &str) -> Option<(String, String)> {
    let line = line.strip_suffix(';').unwrap_or(line).trim_end();
    let open = line.find('(')?;
    let name = &line[..open];
    let args = line[open + 1..].strip_suffix(')')?;
    is_identifier(name).then(|| (name.to_ascii_lowercase(), args.to_string()))
}

fn split_case_insensitive<'a>(s: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    let upper = s.to_ascii_uppercase();
    let i = upper.find(sep)?;
    Some((&s[..i], &s[i + sep.len()..]))
}

fn compile_line(line: &str) -> Option<Instr> {
    if line.is_empty() || line.starts_with("//") || keyword(line, "REM").is_some() {
        return None;
    }
    let instr = if let Some(rest) = keyword(line, "VAR") {
        match parse_assignment(rest) {
            Some((name, value)) => Instr::Assign { name, value },
            None => Instr::Invalid(line.to_string()),
        }
    } else if let Some(rest) = keyword(line, "IF") {
        let cond = match rest.len().checked_sub(4) {
            Some(i) if rest.is_char_boundary(i) && rest[i..].eq_ignore_ascii_case("THEN") => {
                rest[..i].trim()
            }
            _ => rest,
        };
        Instr::If(cond.to_string())
    } else if keyword(line, "ELSE") == Some("") {
        Instr::Else
    } else if keyword(line, "ENDIF") == Some("") {
        Instr::EndIf
    } else if let Some(rest) = keyword(line, "LOOP") {
        Instr::Loop(rest.to_string())
    } else if keyword(line, "ENDLOOP") == Some("") {
        Instr::EndLoop
    } else if let Some(rest) = keyword(line, "FOR") {
        let parsed = rest.split_once('=').and_then(|(var, range)| {
            let var = var.trim();
            let (start, end) = split_case_insensitive(range, " TO ")?;
            is_identifier(var).then(|| Instr::For {
                var: var.to_string(),
                start: start.trim().to_string(),
                end: end.trim().to_string(),
            })
        });
        parsed.unwrap_or_else(|| Instr::Invalid(line.to_string()))
    } else if keyword(line, "NEXT").is_some_and(|v| v.is_empty() || is_identifier(v)) {
        Instr::Next
    } else if let Some((name, args)) = parse_call(line) {
        match name.as_str() {
            "wait" => Instr::Wait(args),
            "set_val" => match args.split_once(',') {
                Some((button, value)) => Instr::SetVal {
                    button: button.trim().to_string(),
                    value: value.trim().to_string(),
                },
                None => Instr::Invalid(line.to_string()),
            },
            "combo_run" => Instr::ComboRun(args.trim().to_string()),
            _ => Instr::Call(name),
        }
    } else if let Some((name, value)) = parse_assignment(line) {
        Instr::Assign { name, value }
    } else {
        Instr::Macro(line.to_string())
    };
    Some(instr)
}

/// Compile script source. Blank lines and comments produce nothing.
pub fn compile(source: &str) -> Vec<Instr> {
    source
        .lines()
        .filter_map(|l| compile_line(l.trim()))
        .collect()
}

/// Gamepad button named in a `set_val` call.
pub fn gpc_button(name: &str) -> Option<GamepadButton> {
    let button = match name.trim().to_ascii_uppercase().as_str() {
        "PS4_CROSS" | "XB1_A" => GamepadButton::A,
        "PS4_CIRCLE" | "XB1_B" => GamepadButton::B,
        "PS4_SQUARE" | "XB1_X" => GamepadButton::X,
        "PS4_TRIANGLE" | "XB1_Y" => GamepadButton::Y,
        "PS4_L1" | "XB1_LB" => GamepadButton::LeftShoulder,
        "PS4_R1" | "XB1_RB" => GamepadButton::RightShoulder,
        "PS4_L3" | "XB1_LS" => GamepadButton::LeftStick,
        "PS4_R3" | "XB1_RS" => GamepadButton::RightStick,
        "PS4_OPTIONS" | "XB1_MENU" => GamepadButton::Start,
        "PS4_SHARE" | "XB1_VIEW" => GamepadButton::Back,
        "PS4_PS" | "XB1_XBOX" => GamepadButton::Guide,
        _ => return None,
    };
    Some(button)
}

/// Variables and limits for running scripts.
#[derive(Debug, Clone)]
pub struct ScriptEngine {
    ints: HashMap<String, i32>,
    strings: HashMap<String, String>,
    step_budget: u64,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_BUDGET)
    }
}

impl ScriptEngine {
    pub fn new(step_budget: u64) -> Self {
        Self {
            ints: HashMap::new(),
            strings: HashMap::new(),
            step_budget,
        }
    }

    pub fn int_var(&self, name: &str) -> Option<i32> {
        self.ints.get(name).copied()
    }

    pub fn string_var(&self, name: &str) -> Option<&str> {
        self.strings.get(name).map(String::as_str)
    }

    /// Compile and run `source`. Variables start empty on every run.
    pub fn run<S: HidSink>(
        &mut self,
        sink: &mut S,
        macros: &mut MacroEngine,
        source: &str,
    ) -> Result<ScriptRun, HidError> {
        let program = compile(source);
        self.ints.clear();
        self.strings.clear();
        self.execute(sink, macros, &program)
    }

    pub fn execute<S: HidSink>(
        &mut self,
        sink: &mut S,
        macros: &mut MacroEngine,
        program: &[Instr],
    ) -> Result<ScriptRun, HidError> {
        let mut frames: Vec<Frame> = Vec::new();
        let mut skip_depth: u32 = 0;
        let mut pc = 0;
        let mut steps: u64 = 0;

        while let Some(instr) = program.get(pc) {
            if steps >= self.step_budget {
                warn!("Script stopped after {steps} steps (budget exhausted)");
                return Ok(ScriptRun {
                    steps,
                    exhausted: true,
                });
            }
            steps += 1;
            pc += 1;

            if skip_depth > 0 {
                match instr {
                    Instr::If(_) => skip_depth += 1,
                    Instr::Else if skip_depth == 1 => skip_depth = 0,
                    Instr::EndIf => {
                        skip_depth -= 1;
                        if skip_depth == 0 && frames.last() == Some(&Frame::If) {
                            frames.pop();
                        }
                    }
                    _ => {}
                }
                continue;
            }

            match instr {
                Instr::Assign { name, value } => match value {
                    Value::Str(s) => {
                        self.strings.insert(name.clone(), s.clone());
                    }
                    Value::Expr(e) => {
                        let v = evaluate(e, &self.ints);
                        self.ints.insert(name.clone(), v);
                    }
                },
                Instr::If(cond) => {
                    frames.push(Frame::If);
                    if !evaluate_condition(cond, &self.ints) {
                        skip_depth = 1;
                    }
                }
                Instr::Else => {
                    // reached from the taken branch: skip to ENDIF
                    if frames.last() == Some(&Frame::If) {
                        skip_depth = 1;
                    }
                }
                Instr::EndIf => {
                    if frames.last() == Some(&Frame::If) {
                        frames.pop();
                    }
                }
                Instr::Loop(count) => {
                    frames.push(Frame::Loop {
                        remaining: evaluate(count, &self.ints),
                        body_start: pc,
                    });
                }
                Instr::EndLoop => {
                    let Some(at) = frames
                        .iter()
                        .rposition(|f| matches!(f, Frame::Loop { .. }))
                    else {
                        debug!("ENDLOOP without LOOP, ignoring");
                        continue;
                    };
                    frames.truncate(at + 1);
                    if let Some(Frame::Loop {
                        remaining,
                        body_start,
                    }) = frames.last_mut()
                    {
                        *remaining -= 1;
                        if *remaining > 0 {
                            pc = *body_start;
                        } else {
                            frames.pop();
                        }
                    }
                }
                Instr::For { var, start, end } => {
                    let start = evaluate(start, &self.ints);
                    let end = evaluate(end, &self.ints);
                    self.ints.insert(var.clone(), start);
                    self.ints.insert(format!("__FOR_END_{var}"), end);
                    frames.push(Frame::For {
                        var: var.clone(),
                        body_start: pc,
                    });
                }
                Instr::Next => {
                    let Some(at) = frames
                        .iter()
                        .rposition(|f| matches!(f, Frame::For { .. }))
                    else {
                        debug!("NEXT without FOR, ignoring");
                        continue;
                    };
                    frames.truncate(at + 1);
                    if let Some(Frame::For { var, body_start }) = frames.last() {
                        let value = self.int_var(var).unwrap_or(0).wrapping_add(1);
                        let end = self.int_var(&format!("__FOR_END_{var}")).unwrap_or(0);
                        self.ints.insert(var.clone(), value);
                        if value <= end {
                            pc = *body_start;
                        } else {
                            frames.pop();
                        }
                    }
                }
                Instr::Wait(ms) => {
                    let ms = evaluate(ms, &self.ints);
                    if ms > 0 {
                        sink.delay(ms as u32)?;
                    }
                }
                Instr::SetVal { button, value } => {
                    let Some(b) = gpc_button(button) else {
                        debug!("Unknown set_val button \"{button}\", ignoring");
                        continue;
                    };
                    if sink.capabilities().gamepad {
                        sink.gamepad_button(b, evaluate(value, &self.ints) > 0)?;
                    }
                }
                Instr::ComboRun(name) => {
                    debug!("combo_run({name})");
                    sink.delay(COMBO_RUN_DELAY_MS)?;
                }
                Instr::Call(name) => debug!("Ignoring call to {name}()"),
                Instr::Invalid(line) => debug!("Ignoring malformed line \"{line}\""),
                Instr::Macro(text) => macros.run(sink, text)?,
            }
        }

        Ok(ScriptRun {
            steps,
            exhausted: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwdongle_hid::{HidEvent, RecordingSink};

    fn run(source: &str) -> (RecordingSink, ScriptEngine, ScriptRun) {
        let mut sink = RecordingSink::new();
        let mut engine = ScriptEngine::default();
        let outcome = engine
            .run(&mut sink, &mut MacroEngine::new(0), source)
            .unwrap();
        (sink, engine, outcome)
    }

    // --- detection tests ---

    #[test]
    fn test_is_advanced_script() {
        assert!(is_advanced_script("VAR x = 1"));
        assert!(is_advanced_script("if x > 1\nENDIF"));
        assert!(is_advanced_script("loop 3\nENDLOOP"));
        assert!(is_advanced_script("wait(100)"));
        assert!(is_advanced_script("x=5"));
        assert!(!is_advanced_script("=5"));
        assert!(!is_advanced_script("Hello{{KEY:enter}}"));
        assert!(!is_advanced_script("STRING hello\nENTER"));
    }

    // --- compile tests ---

    #[test]
    fn test_compile_lines() {
        let program = compile(
            "// comment\nREM note\n\nVAR name = \"Bob\"\nIF x >= 2 THEN\nx = x + 1\nwait(50);\nFOR i = 0 to 9\nNEXT i\nHello",
        );
        assert_eq!(
            program,
            vec![
                Instr::Assign {
                    name: "name".into(),
                    value: Value::Str("Bob".into())
                },
                Instr::If("x >= 2".into()),
                Instr::Assign {
                    name: "x".into(),
                    value: Value::Expr("x + 1".into())
                },
                Instr::Wait("50".into()),
                Instr::For {
                    var: "i".into(),
                    start: "0".into(),
                    end: "9".into()
                },
                Instr::Next,
                Instr::Macro("Hello".into()),
            ]
        );
    }

    #[test]
    fn test_comparison_is_not_assignment() {
        assert_eq!(compile("x == 1"), vec![Instr::Macro("x == 1".into())]);
        assert_eq!(compile("a b = 1"), vec![Instr::Macro("a b = 1".into())]);
    }

    #[test]
    fn test_call_needs_identifier() {
        assert_eq!(
            compile("Hello (world)"),
            vec![Instr::Macro("Hello (world)".into())]
        );
        assert_eq!(compile("beep(3)"), vec![Instr::Call("beep".into())]);
    }

    #[test]
    fn test_next_parsing() {
        assert_eq!(compile("NEXT"), vec![Instr::Next]);
        // Known limitation: a two-word text line starting with "Next" reads
        // as a loop closer, so such text needs a {{TEXT:..}} token.
        assert_eq!(compile("Next time"), vec![Instr::Next]);
        assert_eq!(
            compile("Next time around"),
            vec![Instr::Macro("Next time around".into())]
        );
    }

    // --- execution tests ---

    #[test]
    fn test_loop_runs_count_times() {
        let (sink, _, _) = run("LOOP 3\na\nENDLOOP");
        assert_eq!(sink.typed_text(), "aaa");
    }

    #[test]
    fn test_loop_zero_and_one_run_once() {
        assert_eq!(run("LOOP 0\na\nENDLOOP").0.typed_text(), "a");
        assert_eq!(run("LOOP 1\na\nENDLOOP").0.typed_text(), "a");
    }

    #[test]
    fn test_for_runs_inclusive() {
        let (sink, engine, _) = run("VAR total = 0\nFOR i = 0 TO 2\ntotal = total + i\nx\nNEXT i");
        assert_eq!(sink.typed_text(), "xxx");
        assert_eq!(engine.int_var("total"), Some(3));
        assert_eq!(engine.int_var("i"), Some(3));
        assert_eq!(engine.int_var("__FOR_END_i"), Some(2));
    }

    #[test]
    fn test_for_body_runs_at_least_once() {
        let (sink, _, _) = run("FOR i = 5 TO 1\nx\nNEXT i");
        assert_eq!(sink.typed_text(), "x");
    }

    #[test]
    fn test_if_else() {
        assert_eq!(run("IF 1 == 1 THEN\na\nELSE\nb\nENDIF\nc").0.typed_text(), "ac");
        assert_eq!(run("IF 1 == 2 THEN\na\nELSE\nb\nENDIF\nc").0.typed_text(), "bc");
        assert_eq!(run("IF 0\na\nENDIF\nc").0.typed_text(), "c");
    }

    #[test]
    fn test_nested_if_in_skipped_branch() {
        let src = "IF 0\nIF 1\na\nELSE\nb\nENDIF\nc\nELSE\nd\nENDIF\ne";
        assert_eq!(run(src).0.typed_text(), "de");
    }

    #[test]
    fn test_if_inside_loop() {
        let src = "VAR n = 0\nLOOP 4\nn = n + 1\nIF n % 2 == 0\ne\nELSE\no\nENDIF\nENDLOOP";
        assert_eq!(run(src).0.typed_text(), "oeoe");
    }

    #[test]
    fn test_nested_loops() {
        let src = "LOOP 2\nFOR j = 1 TO 3\nx\nNEXT j\ny\nENDLOOP";
        assert_eq!(run(src).0.typed_text(), "xxxyxxxy");
    }

    #[test]
    fn test_unbalanced_closers_are_inert() {
        assert_eq!(run("a\nENDLOOP\nNEXT\nENDIF\nb").0.typed_text(), "ab");
    }

    #[test]
    fn test_string_and_int_variables() {
        let (_, engine, _) = run("VAR greeting = \"hi there\"\ncount = 2 * 21");
        assert_eq!(engine.string_var("greeting"), Some("hi there"));
        assert_eq!(engine.int_var("count"), Some(42));
    }

    #[test]
    fn test_gpc_calls() {
        let (sink, _, _) = run("set_val(PS4_CROSS, 100)\nwait(20)\nset_val(XB1_A, 0)\ncombo_run(jump)");
        assert_eq!(
            sink.events(),
            &[
                HidEvent::GamepadButton {
                    button: GamepadButton::A,
                    down: true
                },
                HidEvent::Delay(20),
                HidEvent::GamepadButton {
                    button: GamepadButton::A,
                    down: false
                },
                HidEvent::Delay(COMBO_RUN_DELAY_MS),
            ]
        );
    }

    #[test]
    fn test_gpc_button_table() {
        assert_eq!(gpc_button("ps4_triangle"), Some(GamepadButton::Y));
        assert_eq!(gpc_button("XB1_RB"), Some(GamepadButton::RightShoulder));
        assert_eq!(gpc_button("PS4_PS"), Some(GamepadButton::Guide));
        assert_eq!(gpc_button("PS4_TOUCH"), None);
    }

    #[test]
    fn test_macro_lines_use_tokens() {
        let (sink, _, _) = run("VAR x = 1\nHi{{KEY:enter}}");
        assert_eq!(sink.typed_text(), "Hi");
        assert!(sink.events().contains(&HidEvent::Press(0x28)));
    }

    #[test]
    fn test_step_budget_stops_runaway_loop() {
        let mut sink = RecordingSink::new();
        let mut engine = ScriptEngine::new(100);
        let outcome = engine
            .run(
                &mut sink,
                &mut MacroEngine::new(0),
                "LOOP 1000000\nx\nENDLOOP",
            )
            .unwrap();
        assert!(outcome.exhausted);
        assert_eq!(outcome.steps, 100);
        assert!(sink.typed_text().len() < 100);
    }

    #[test]
    fn test_run_reports_steps() {
        let (_, _, outcome) = run("LOOP 2\na\nENDLOOP");
        assert!(!outcome.exhausted);
        assert_eq!(outcome.steps, 1 + 2 * 2);
    }
}
