//! PIN pad simulation.
//!
//! Enters a code with the two buttons the hardware has: a short press bumps
//! the current digit, a long press accepts it. Runs against a copy of the
//! store so nothing is written back.

use anyhow::anyhow;
use crossterm::style::{Color, Stylize};
use pwdongle::hid::RecordingSink;
use pwdongle::{
    ButtonEvent, Dongle, DongleConfig, KeyValueStore, MemoryDisplay, MemoryStore, Mode, Pin,
};

use super::{open_store, CommandResult};

pub fn unlock(config: DongleConfig, code: &str) -> CommandResult {
    let pin: Pin = code.parse().map_err(|e: String| anyhow!(e))?;

    let mut scratch = MemoryStore::new();
    for (namespace, entries) in open_store(&config)?.dump() {
        for (key, value) in entries {
            scratch.set(&namespace, &key, value)?;
        }
    }

    let display = MemoryDisplay::new();
    let mut dongle = Dongle::new(config, RecordingSink::new(), Box::new(scratch))?
        .with_display(Box::new(display.clone()));

    for digit in pin.digits() {
        for _ in 0..digit {
            dongle.push_button(ButtonEvent::Short);
        }
        dongle.push_button(ButtonEvent::Long);
    }
    dongle.poll()?;

    if let Some(status) = display.last_status() {
        println!("{} {status}", "Display:".bold());
    }
    match dongle.mode() {
        Mode::Menu { .. } => {
            println!("{}", "Unlocked".with(Color::Green).bold());
            match display.menu() {
                Some((entries, _)) if !entries.is_empty() => {
                    for (i, name) in entries.iter().enumerate() {
                        println!("  {:2}. {name}", i + 1);
                    }
                }
                _ => println!("  (no stored credentials)"),
            }
        }
        Mode::FileEntry(_) => println!("{}", "File mode".with(Color::Cyan).bold()),
        Mode::Restart(mode) => println!(
            "{} {mode} mode on next boot (not written)",
            "Restart:".with(Color::Yellow).bold()
        ),
        Mode::PinEntry(_) => println!("{}", "Rejected".with(Color::Red).bold()),
    }
    Ok(())
}
