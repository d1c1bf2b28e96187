//! Play a file through a HID back-end.

use std::path::Path;

use anyhow::Context;
use pwdongle::{DirFileStore, DongleConfig, MacroEngine, Player, ScriptEngine};

use super::{open_sink, CommandResult};
use crate::cli::{GadgetPaths, SinkKind};

pub fn play(
    config: &DongleConfig,
    file: &Path,
    sink: SinkKind,
    raw: bool,
    gadget: &GadgetPaths,
) -> CommandResult {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file name: {}", file.display()))?;
    let dir = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    let files = DirFileStore::open(dir)?;

    let mut sink = open_sink(sink, gadget)?;
    let mut macros = MacroEngine::new(config.typing_speed_ms);
    let mut player = Player::new(
        ScriptEngine::new(config.script_step_budget),
        config.file_pacing_ms,
    );

    if raw {
        let bytes = player.type_raw(&mut sink, &files, name)?;
        println!("Typed {bytes} bytes from {name}");
    } else {
        let dialect = player.play_file(&mut sink, &mut macros, &files, name)?;
        println!("Played {name} as {dialect}");
    }
    Ok(())
}
