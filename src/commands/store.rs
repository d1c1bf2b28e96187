//! Persistent store commands.

use anyhow::{anyhow, Context};
use crossterm::style::{Color, Stylize};
use pwdongle::security::SEC_NAMESPACE;
use pwdongle::{credentials, AccessCodes, DongleConfig, Pin};

use super::{open_store, CommandResult};

/// Print every namespace and key. Passwords and login code digits are
/// masked unless `show_secrets` is set.
pub fn list(config: &DongleConfig, show_secrets: bool) -> CommandResult {
    let store = open_store(config)?;
    let dump = store.dump();
    if dump.is_empty() {
        println!("Store is empty ({})", config.store_path.display());
        return Ok(());
    }

    for (namespace, entries) in dump {
        println!("{}", format!("[{namespace}]").with(Color::Cyan).bold());
        for (key, value) in entries {
            let shown = if !show_secrets && is_secret(&namespace, &key) {
                "****".to_string().with(Color::DarkGrey)
            } else {
                value.to_string().with(Color::White)
            };
            println!("  {key:<12} = {shown}");
        }
    }
    Ok(())
}

fn is_secret(namespace: &str, key: &str) -> bool {
    (namespace == credentials::NAMESPACE && key.starts_with("password_"))
        || namespace == SEC_NAMESPACE
}

pub fn clear(config: &DongleConfig, namespace: &str) -> CommandResult {
    let mut store = open_store(config)?;
    store
        .clear(namespace)
        .with_context(|| format!("clearing namespace {namespace}"))?;
    println!("Cleared [{namespace}]");
    Ok(())
}

pub fn set_pin(config: &DongleConfig, pin: &str) -> CommandResult {
    let pin: Pin = pin.parse().map_err(|e: String| anyhow!(e))?;
    let mut store = open_store(config)?;
    let mut codes = AccessCodes::default();
    codes
        .set_primary(&mut *store, pin)
        .context("saving login code")?;
    println!("Login code updated");
    Ok(())
}
