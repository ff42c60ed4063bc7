// (c) Roel Kluin, 2023, GPL v3

use std::io;
use thiserror::Error;

/// Errors of the k-mer engine. Commands wrap these in anyhow.
#[derive(Error, Debug)]
pub enum KmerError {
    #[error("hash table is full (capacity {capacity}); rerun with a larger -z")]
    CapacityExceeded { capacity: usize },

    #[error("invalid hash file: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid read: {0}")]
    Input(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl KmerError {
    pub fn format<S: Into<String>>(message: S) -> Self {
        KmerError::Format(message.into())
    }
    pub fn input<S: Into<String>>(message: S) -> Self {
        KmerError::Input(message.into())
    }
    pub fn config<S: Into<String>>(message: S) -> Self {
        KmerError::Config(message.into())
    }
}

impl From<bincode::Error> for KmerError {
    fn from(e: bincode::Error) -> KmerError {
        match *e {
            bincode::ErrorKind::Io(io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
                KmerError::format("short read")
            }
            bincode::ErrorKind::Io(io_err) => KmerError::Io(io_err),
            other => KmerError::Format(other.to_string()),
        }
    }
}

pub type KmerResult<T> = Result<T, KmerError>;
