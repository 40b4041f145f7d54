use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "length of shm folder ({requested:?}, {requested_len} bytes) must match the prior value \
         ({current:?}, {current_len} bytes) of {symbol} at {address:#x} in {}",
        .path.display()
    )]
    LengthMismatch {
        path: PathBuf,
        symbol: String,
        address: u64,
        current: String,
        current_len: usize,
        requested: String,
        requested_len: usize,
    },

    #[error("Invalid shm folder {0:?}: {1}")]
    InvalidShmFolder(String, &'static str),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("No libraries were patched (searched: {searched})")]
    NothingPatched { searched: String },

    #[error("Failed to parse image {}: {message}", .path.display())]
    Image { path: PathBuf, message: String },

    #[error("Address {address:#x} (+{len} bytes) is not backed by file data")]
    AddressNotMapped { address: u64, len: usize },

    #[error("Failed to assemble {text:?} at {address:#x}: {message}")]
    Assemble {
        address: u64,
        text: String,
        message: String,
    },

    #[error("Invalid profile: {0}")]
    Profile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
