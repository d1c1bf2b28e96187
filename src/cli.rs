// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pwdongle")]
#[command(author, version, about = "PWDongle host simulator and macro tools")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/pwdongle/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where HID actions go
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// Log actions instead of sending them
    Record,
    /// Linux USB gadget endpoints (/dev/hidgN)
    Gadget,
    /// Virtual input device (needs the `uinput` feature)
    Uinput,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the dongle: serial console on stdin/stdout, BLE link over TCP
    Run {
        /// HID back-end
        #[arg(long, value_enum, default_value_t = SinkKind::Record)]
        sink: SinkKind,

        /// BLE link listen address (default from config)
        #[arg(long)]
        ble_addr: Option<String>,

        /// Run without the BLE link
        #[arg(long)]
        no_ble: bool,

        #[command(flatten)]
        gadget: GadgetPaths,
    },

    /// Play a macro, DuckyScript or advanced script file
    #[command(visible_alias = "p")]
    Play {
        /// File to play
        file: PathBuf,

        /// HID back-end
        #[arg(long, value_enum, default_value_t = SinkKind::Record)]
        sink: SinkKind,

        /// Type the file byte for byte instead of interpreting it
        #[arg(long)]
        raw: bool,

        #[command(flatten)]
        gadget: GadgetPaths,
    },

    /// Show the HID actions a file would produce, without sending them
    #[command(visible_aliases = ["dry-run", "c"])]
    Check {
        /// File to check
        file: PathBuf,

        /// Hide delays
        #[arg(long)]
        no_delays: bool,
    },

    /// Inspect or change the persistent store
    #[command(subcommand)]
    Store(StoreCommands),

    /// Evaluate a script expression
    Eval {
        /// Expression, e.g. "(x + 2) * 3" or "x >= 5 && y != 0"
        expr: String,

        /// Evaluate as a condition (true/false)
        #[arg(long)]
        condition: bool,

        /// Integer variables as NAME=VALUE
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, i32)>,
    },

    /// Enter a code at the PIN pad, as button presses, and report the outcome
    Unlock {
        /// Four-digit code
        code: String,
    },
}

#[derive(Subcommand)]
pub enum StoreCommands {
    /// List every stored key (secrets masked)
    #[command(visible_alias = "ls")]
    List {
        /// Show secrets in clear text
        #[arg(long)]
        show_secrets: bool,
    },

    /// Remove every key in a namespace
    Clear {
        /// Namespace (devstore, SEC, BLE, CDC, MSC)
        namespace: String,
    },

    /// Set the login code
    SetPin {
        /// New four-digit code
        pin: String,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct GadgetPaths {
    /// Keyboard gadget endpoint
    #[arg(long, default_value = "/dev/hidg0")]
    pub keyboard_dev: PathBuf,

    /// Mouse gadget endpoint
    #[arg(long)]
    pub mouse_dev: Option<PathBuf>,

    /// Consumer control (media keys) gadget endpoint
    #[arg(long)]
    pub consumer_dev: Option<PathBuf>,

    /// Gamepad gadget endpoint
    #[arg(long)]
    pub gamepad_dev: Option<PathBuf>,
}

fn parse_var(s: &str) -> Result<(String, i32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got \"{s}\""))?;
    let value = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value for {name}: {e}"))?;
    Ok((name.trim().to_string(), value))
}
