//! Top-level error type for the dongle runtime

use pwdongle_hid::HidError;
use pwdongle_transport::TransportError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::files::FileError;
use crate::playback::PlaybackError;
use crate::session::SessionError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum DongleError {
    #[error("HID error: {0}")]
    Hid(#[from] HidError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<SessionError> for DongleError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Hid(e) => DongleError::Hid(e),
            SessionError::Transport(e) => DongleError::Transport(e),
            SessionError::File(e) => DongleError::File(e),
        }
    }
}

impl From<PlaybackError> for DongleError {
    fn from(e: PlaybackError) -> Self {
        match e {
            PlaybackError::File(e) => DongleError::File(e),
            PlaybackError::Hid(e) => DongleError::Hid(e),
        }
    }
}
