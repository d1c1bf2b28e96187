//! Dongle main loop.

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Context;
use pwdongle::security::take_boot_mode;
use pwdongle::transport::{StdioChannel, TcpChannel};
use pwdongle::{DirFileStore, Dongle, DongleConfig};
use tracing::{info, warn};

use super::{open_sink, open_store, setup_interrupt_handler, CommandResult};
use crate::cli::{GadgetPaths, SinkKind};

/// Pause between main-loop passes when nothing is pending
const IDLE_POLL: Duration = Duration::from_millis(5);

pub fn run(
    config: DongleConfig,
    sink: SinkKind,
    ble_addr: Option<String>,
    no_ble: bool,
    gadget: &GadgetPaths,
) -> CommandResult {
    let mut store = open_store(&config)?;
    if let Some(mode) = take_boot_mode(&mut *store).context("reading boot flags")? {
        info!("Booting in {mode} mode");
    }

    let files = match DirFileStore::open(&config.macro_dir) {
        Ok(files) => Some(files),
        Err(e) => {
            warn!("Macro directory unavailable: {e}");
            None
        }
    };

    let ble = if no_ble {
        None
    } else {
        let addr = ble_addr.unwrap_or_else(|| config.ble_addr.clone());
        Some(TcpChannel::bind(&addr).context("starting BLE link")?)
    };

    info!("{} ready", config.device_name);
    let sink = open_sink(sink, gadget)?;
    let mut dongle =
        Dongle::new(config, sink, store)?.with_serial(Box::new(StdioChannel::spawn()));
    if let Some(files) = files {
        dongle = dongle.with_files(Box::new(files));
    }
    if let Some(ble) = ble {
        dongle = dongle.with_ble(Box::new(ble));
    }

    let running = setup_interrupt_handler();
    while running.load(Ordering::SeqCst) {
        if let Some(mode) = dongle.poll()? {
            println!("Restart requested: {mode} mode on next boot");
            return Ok(());
        }
        std::thread::sleep(IDLE_POLL);
    }

    info!("Interrupted, shutting down");
    Ok(())
}
