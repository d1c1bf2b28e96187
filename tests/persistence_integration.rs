//! Integration tests for on-disk state.
//!
//! The JSON key-value store and the macro directory are used the way the
//! `run` command uses them, across simulated restarts.

use pwdongle::hid::RecordingSink;
use pwdongle::security::take_boot_mode;
use pwdongle::transport::{MemoryChannel, TransportKind};
use pwdongle::{
    ButtonEvent, DirFileStore, Dongle, DongleConfig, FileStore, JsonFileStore, KeyValueStore,
    Mode,
};

fn config(dir: &std::path::Path) -> DongleConfig {
    let mut config = DongleConfig::default();
    config.store_path = dir.join("store.json");
    config.macro_dir = dir.join("macros");
    config.typing_speed_ms = 0;
    config
}

fn enter(dongle: &mut Dongle<RecordingSink>, code: &str) {
    for d in code.chars().filter_map(|c| c.to_digit(10)) {
        for _ in 0..d {
            dongle.push_button(ButtonEvent::Short);
        }
        dongle.push_button(ButtonEvent::Long);
    }
    dongle.poll().unwrap();
}

#[test]
fn credentials_and_login_code_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    {
        let store = JsonFileStore::open(&config.store_path).unwrap();
        let (channel, host) = MemoryChannel::pair(TransportKind::Serial);
        let mut dongle = Dongle::new(config.clone(), RecordingSink::new(), Box::new(store))
            .unwrap()
            .with_serial(Box::new(channel));
        for line in ["PWUPDATE", "1122", "git,token123", "CHANGELOGIN", "1122", "3141"] {
            host.send_line(line);
            dongle.poll().unwrap();
        }
        assert_eq!(host.take_lines().last().unwrap(), "OK: New login code set");
    }

    let store = JsonFileStore::open(&config.store_path).unwrap();
    assert_eq!(store.get_int("SEC", "code0"), Some(3));
    let mut dongle = Dongle::new(config, RecordingSink::new(), Box::new(store)).unwrap();
    assert_eq!(dongle.credentials().names(), vec!["git".to_string()]);

    enter(&mut dongle, "3141");
    assert_eq!(dongle.mode(), &Mode::Menu { selected: 0 });
    dongle.push_button(ButtonEvent::Long);
    dongle.poll().unwrap();
    assert_eq!(dongle.sink().typed_text(), "token123");
}

#[test]
fn boot_flag_is_consumed_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    {
        let store = JsonFileStore::open(&config.store_path).unwrap();
        let mut dongle = Dongle::new(config.clone(), RecordingSink::new(), Box::new(store)).unwrap();
        enter(&mut dongle, "0001");
        assert!(dongle.restart_requested().is_some());
    }

    let mut store = JsonFileStore::open(&config.store_path).unwrap();
    assert_eq!(
        take_boot_mode(&mut store).unwrap(),
        Some(pwdongle::BootMode::Msc)
    );
    let mut store = JsonFileStore::open(&config.store_path).unwrap();
    assert_eq!(take_boot_mode(&mut store).unwrap(), None);
}

#[test]
fn macros_saved_over_ble_land_in_the_macro_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let files = DirFileStore::open(&config.macro_dir).unwrap();
    let store = JsonFileStore::open(&config.store_path).unwrap();
    let (channel, phone) = MemoryChannel::pair(TransportKind::Ble);
    let mut dongle = Dongle::new(config.clone(), RecordingSink::new(), Box::new(store))
        .unwrap()
        .with_ble(Box::new(channel))
        .with_files(Box::new(files));

    for line in ["SAVE_MACRO:greeting", "Hello{{KEY:enter}}", ""] {
        phone.send_line(line);
        dongle.poll().unwrap();
    }
    assert_eq!(
        phone.take_lines(),
        vec![
            "OK: Ready to receive macro. Send empty line to finish.",
            "OK: Macro saved to greeting.txt (19 bytes)",
        ]
    );

    let on_disk = std::fs::read_to_string(config.macro_dir.join("greeting.txt")).unwrap();
    assert_eq!(on_disk, "Hello{{KEY:enter}}\n");

    let reopened = DirFileStore::open(&config.macro_dir).unwrap();
    assert!(reopened.exists("greeting.txt"));
    assert_eq!(reopened.list().unwrap(), vec!["greeting.txt".to_string()]);
}
