//! Access codes, PIN entry and boot-mode flags.
//!
//! Five 4-digit codes gate what the dongle does after the PIN pad: the
//! primary PIN opens the credential menu, the others pick a boot mode or
//! the file-typing sub-mode. Codes are compared in plain text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::{KeyValueStore, StoreError};

/// Namespace holding the primary PIN (`code0`..`code3`).
pub const SEC_NAMESPACE: &str = "SEC";

/// Four decimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pin([u8; 4]);

impl Pin {
    /// Build from digits; each is reduced mod 10.
    pub const fn new(digits: [u8; 4]) -> Self {
        Self([digits[0] % 10, digits[1] % 10, digits[2] % 10, digits[3] % 10])
    }

    pub fn digits(&self) -> [u8; 4] {
        self.0
    }

    /// Read the first four digit characters of a line. Missing digits are 0,
    /// so "12" reads as 1200.
    pub fn parse_lenient(line: &str) -> Self {
        let mut digits = [0u8; 4];
        for (slot, d) in digits
            .iter_mut()
            .zip(line.chars().filter_map(|c| c.to_digit(10)))
        {
            *slot = d as u8;
        }
        Self(digits)
    }
}

impl FromStr for Pin {
    type Err = String;

    /// Exactly four digits, surrounding whitespace allowed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits: Vec<u8> = s.chars().filter_map(|c| c.to_digit(10)).map(|d| d as u8).collect();
        if digits.len() != 4 || s.chars().count() != 4 {
            return Err(format!("login code must be 4 digits, got \"{s}\""));
        }
        Ok(Self([digits[0], digits[1], digits[2], digits[3]]))
    }
}

impl TryFrom<String> for Pin {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Pin> for String {
    fn from(pin: Pin) -> Self {
        pin.to_string()
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in self.0 {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

/// Mode a reserved code reboots into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootMode {
    Ble,
    Cdc,
    Msc,
}

impl BootMode {
    pub const ALL: [BootMode; 3] = [BootMode::Ble, BootMode::Cdc, BootMode::Msc];

    /// Namespace and key of the persisted flag.
    pub fn flag(&self) -> (&'static str, &'static str) {
        match self {
            BootMode::Ble => ("BLE", "bootToBLE"),
            BootMode::Cdc => ("CDC", "bootToCDC"),
            BootMode::Msc => ("MSC", "bootToMSC"),
        }
    }
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootMode::Ble => "BLE",
            BootMode::Cdc => "serial (CDC)",
            BootMode::Msc => "mass storage",
        };
        f.write_str(name)
    }
}

/// Ask for `mode` on the next boot.
pub fn request_boot(store: &mut dyn KeyValueStore, mode: BootMode) -> Result<(), StoreError> {
    let (ns, key) = mode.flag();
    store.set_bool(ns, key, true)?;
    info!("Next boot: {mode}");
    Ok(())
}

/// Read and clear all boot flags. BLE wins over CDC over MSC if several
/// are set.
pub fn take_boot_mode(store: &mut dyn KeyValueStore) -> Result<Option<BootMode>, StoreError> {
    let mut requested = None;
    for mode in BootMode::ALL {
        let (ns, key) = mode.flag();
        if store.get_bool(ns, key) == Some(true) {
            if requested.is_none() {
                requested = Some(mode);
            }
            store.set_bool(ns, key, false)?;
        }
    }
    Ok(requested)
}

/// What an entered code unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMatch {
    Primary,
    Boot(BootMode),
    FileMode,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCodes {
    /// Primary PIN; persisted in the store, not the config
    #[serde(skip, default = "default_primary")]
    pub primary: Pin,
    #[serde(default = "default_cdc")]
    pub cdc: Pin,
    #[serde(default = "default_ble")]
    pub ble: Pin,
    #[serde(default = "default_file")]
    pub file: Pin,
    #[serde(default = "default_msc")]
    pub msc: Pin,
}

fn default_primary() -> Pin {
    Pin::new([1, 1, 2, 2])
}
fn default_cdc() -> Pin {
    Pin::new([7, 2, 7, 3])
}
fn default_ble() -> Pin {
    Pin::new([0, 0, 0, 0])
}
fn default_file() -> Pin {
    Pin::new([5, 5, 5, 0])
}
fn default_msc() -> Pin {
    Pin::new([0, 0, 0, 1])
}

impl Default for AccessCodes {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            cdc: default_cdc(),
            ble: default_ble(),
            file: default_file(),
            msc: default_msc(),
        }
    }
}

impl AccessCodes {
    /// Match order: BLE, file, MSC, CDC, primary.
    pub fn classify(&self, pin: Pin) -> PinMatch {
        if pin == self.ble {
            PinMatch::Boot(BootMode::Ble)
        } else if pin == self.file {
            PinMatch::FileMode
        } else if pin == self.msc {
            PinMatch::Boot(BootMode::Msc)
        } else if pin == self.cdc {
            PinMatch::Boot(BootMode::Cdc)
        } else if pin == self.primary {
            PinMatch::Primary
        } else {
            PinMatch::Rejected
        }
    }

    pub fn is_primary(&self, pin: Pin) -> bool {
        pin == self.primary
    }

    /// Load the primary PIN, writing the default first if any digit is
    /// missing.
    pub fn load_primary(&mut self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        let mut digits = [0u8; 4];
        for (i, slot) in digits.iter_mut().enumerate() {
            match store.get_int(SEC_NAMESPACE, &format!("code{i}")) {
                Some(d) => *slot = d.rem_euclid(10) as u8,
                None => {
                    debug!("No stored login code, writing default");
                    self.primary = default_primary();
                    return self.save_primary(store);
                }
            }
        }
        self.primary = Pin(digits);
        Ok(())
    }

    pub fn set_primary(&mut self, store: &mut dyn KeyValueStore, pin: Pin) -> Result<(), StoreError> {
        self.primary = pin;
        self.save_primary(store)?;
        info!("Login code changed");
        Ok(())
    }

    fn save_primary(&self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        for (i, d) in self.primary.digits().iter().enumerate() {
            store.set_int(SEC_NAMESPACE, &format!("code{i}"), *d as i64)?;
        }
        Ok(())
    }
}

/// Whether a primary PIN is stored.
pub fn primary_persisted(store: &dyn KeyValueStore) -> bool {
    (0..4).all(|i| store.get_int(SEC_NAMESPACE, &format!("code{i}")).is_some())
}

/// Two-button PIN entry: short press bumps the current digit, long press
/// accepts it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinPad {
    digits: [u8; 4],
    accepted: [bool; 4],
    cursor: usize,
    current: u8,
}

impl PinPad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_digit(&self) -> u8 {
        self.current
    }

    pub fn increment(&mut self) {
        self.current = (self.current + 1) % 10;
    }

    /// Accept the current digit. Returns the code once four are in, and
    /// resets the pad.
    pub fn accept(&mut self) -> Option<Pin> {
        self.digits[self.cursor] = self.current;
        self.accepted[self.cursor] = true;
        self.cursor += 1;
        self.current = 0;
        if self.cursor < 4 {
            return None;
        }
        let pin = Pin(self.digits);
        *self = Self::new();
        Some(pin)
    }

    /// Display form: accepted digits masked, current digit shown.
    pub fn render(&self) -> String {
        (0..4)
            .map(|i| {
                if self.accepted[i] {
                    "*".to_string()
                } else if i == self.cursor {
                    self.current.to_string()
                } else {
                    "_".to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn pin(s: &str) -> Pin {
        s.parse().unwrap()
    }

    // --- Pin tests ---

    #[test]
    fn test_pin_parse_strict() {
        assert_eq!(pin("1122").digits(), [1, 1, 2, 2]);
        assert_eq!(pin(" 0042 ").to_string(), "0042");
        assert!("123".parse::<Pin>().is_err());
        assert!("12345".parse::<Pin>().is_err());
        assert!("12a4".parse::<Pin>().is_err());
    }

    #[test]
    fn test_pin_parse_lenient() {
        assert_eq!(Pin::parse_lenient("1122"), pin("1122"));
        assert_eq!(Pin::parse_lenient("code: 7-2-7-3 please"), pin("7273"));
        assert_eq!(Pin::parse_lenient("12"), pin("1200"));
        assert_eq!(Pin::parse_lenient(""), pin("0000"));
        assert_eq!(Pin::parse_lenient("123456"), pin("1234"));
    }

    // --- AccessCodes tests ---

    #[test]
    fn test_classify_all_codes() {
        let codes = AccessCodes::default();
        assert_eq!(codes.classify(pin("1122")), PinMatch::Primary);
        assert_eq!(codes.classify(pin("7273")), PinMatch::Boot(BootMode::Cdc));
        assert_eq!(codes.classify(pin("0000")), PinMatch::Boot(BootMode::Ble));
        assert_eq!(codes.classify(pin("5550")), PinMatch::FileMode);
        assert_eq!(codes.classify(pin("0001")), PinMatch::Boot(BootMode::Msc));
        assert_eq!(codes.classify(pin("9999")), PinMatch::Rejected);
    }

    #[test]
    fn test_classify_order_when_codes_collide() {
        let codes = AccessCodes {
            primary: pin("0000"),
            ..AccessCodes::default()
        };
        // BLE is checked before the primary PIN
        assert_eq!(codes.classify(pin("0000")), PinMatch::Boot(BootMode::Ble));
    }

    #[test]
    fn test_primary_written_on_first_load() {
        let mut store = MemoryStore::new();
        assert!(!primary_persisted(&store));
        let mut codes = AccessCodes::default();
        codes.load_primary(&mut store).unwrap();
        assert!(primary_persisted(&store));
        assert_eq!(store.get_int(SEC_NAMESPACE, "code3"), Some(2));
    }

    #[test]
    fn test_primary_roundtrip() {
        let mut store = MemoryStore::new();
        let mut codes = AccessCodes::default();
        codes.set_primary(&mut store, pin("4321")).unwrap();

        let mut fresh = AccessCodes::default();
        fresh.load_primary(&mut store).unwrap();
        assert_eq!(fresh.primary, pin("4321"));
        assert!(fresh.is_primary(pin("4321")));
        assert!(!fresh.is_primary(pin("1122")));
    }

    #[test]
    fn test_codes_config_serde() {
        let codes: AccessCodes = toml::from_str("cdc = \"1234\"\nble = \"9876\"").unwrap();
        assert_eq!(codes.cdc, pin("1234"));
        assert_eq!(codes.ble, pin("9876"));
        assert_eq!(codes.file, pin("5550"));
        assert!(toml::from_str::<AccessCodes>("cdc = \"12\"").is_err());
    }

    // --- boot flag tests ---

    #[test]
    fn test_boot_flags_read_and_cleared() {
        let mut store = MemoryStore::new();
        assert_eq!(take_boot_mode(&mut store).unwrap(), None);
        request_boot(&mut store, BootMode::Msc).unwrap();
        assert_eq!(store.get_bool("MSC", "bootToMSC"), Some(true));
        assert_eq!(take_boot_mode(&mut store).unwrap(), Some(BootMode::Msc));
        assert_eq!(store.get_bool("MSC", "bootToMSC"), Some(false));
        assert_eq!(take_boot_mode(&mut store).unwrap(), None);
    }

    // --- PinPad tests ---

    fn enter(pad: &mut PinPad, code: &str) -> Option<Pin> {
        let mut result = None;
        for c in code.chars() {
            for _ in 0..c.to_digit(10).unwrap() {
                pad.increment();
            }
            result = pad.accept();
        }
        result
    }

    #[test]
    fn test_pin_pad_entry() {
        let mut pad = PinPad::new();
        assert_eq!(enter(&mut pad, "112"), None);
        assert_eq!(pad.cursor(), 3);
        assert_eq!(pad.render(), "* * * 0");
        assert_eq!(enter(&mut pad, "2"), Some(pin("1122")));
        // reset after completion
        assert_eq!(pad, PinPad::new());
    }

    #[test]
    fn test_pin_pad_digit_wraps() {
        let mut pad = PinPad::new();
        for _ in 0..11 {
            pad.increment();
        }
        assert_eq!(pad.current_digit(), 1);
        assert_eq!(pad.render(), "1 _ _ _");
    }
}
