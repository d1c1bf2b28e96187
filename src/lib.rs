// PWDongle - Shared Library
// Macro interpreters, credential store and the serial/BLE command protocol

pub mod config;
pub mod credentials;
pub mod dongle;
pub mod ducky;
pub mod error;
pub mod expr;
pub mod files;
pub mod macro_text;
pub mod playback;
pub mod recorder;
pub mod script;
pub mod security;
pub mod session;
pub mod store;
pub mod token;

pub use config::DongleConfig;
pub use credentials::{Credential, CredentialStore};
pub use dongle::{ButtonEvent, Dongle, LogDisplay, MemoryDisplay, Mode, StatusDisplay};
pub use ducky::DuckyInterpreter;
pub use error::DongleError;
pub use files::{DirFileStore, FileStore, MemoryFileStore};
pub use macro_text::{MacroEngine, MacroToken};
pub use playback::{Dialect, Player};
pub use recorder::{Clock, ManualClock, Recorder, SystemClock};
pub use script::ScriptEngine;
pub use security::{AccessCodes, BootMode, Pin, PinMatch, PinPad};
pub use session::{Context, Responder, Session, SessionState};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};

pub use pwdongle_hid as hid;
pub use pwdongle_transport as transport;
