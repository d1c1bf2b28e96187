//! Dry-run a file and print the actions it would send.

use std::path::Path;

use anyhow::Context;
use crossterm::style::{Color, Stylize};
use pwdongle::hid::{HidEvent, RecordingSink};
use pwdongle::{DongleConfig, MacroEngine, Player, ScriptEngine};

use super::CommandResult;

pub fn check(config: &DongleConfig, file: &Path, no_delays: bool) -> CommandResult {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    let mut sink = RecordingSink::new();
    let mut macros = MacroEngine::new(config.typing_speed_ms);
    let mut player = Player::new(
        ScriptEngine::new(config.script_step_budget),
        config.file_pacing_ms,
    );
    let dialect = player.play(&mut sink, &mut macros, &content)?;

    println!(
        "{} {} ({})",
        "File:".bold(),
        file.display(),
        dialect.to_string().with(Color::Cyan)
    );

    let events = if no_delays {
        sink.actions()
    } else {
        sink.events().to_vec()
    };
    for (i, event) in events.iter().enumerate() {
        let line = format!("{event}");
        let styled = match event {
            HidEvent::Delay(_) => line.with(Color::DarkGrey),
            HidEvent::Type(_) => line.with(Color::Green),
            HidEvent::Press(_) | HidEvent::Release(_) | HidEvent::ReleaseAll => {
                line.with(Color::Yellow)
            }
            _ => line.with(Color::Magenta),
        };
        println!("  {i:4}: {styled}");
    }

    let typed = sink.typed_text();
    println!();
    println!("{} {}", "Actions:".bold(), sink.actions().len());
    println!("{} {} ms", "Total delay:".bold(), sink.total_delay_ms());
    if !typed.is_empty() {
        println!("{} {typed:?}", "Typed text:".bold());
    }
    let (x, y) = sink.mouse_motion();
    if (x, y) != (0, 0) {
        println!("{} {x:+} {y:+}", "Mouse motion:".bold());
    }
    Ok(())
}
