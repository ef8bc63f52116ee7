//! Error types.

use std::io;
use thiserror::Error;

/// Errors produced by envelope encoding, decoding, and storage.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// A measurement value cannot be represented on the wire.
    #[error("non-finite measurement value for key '{key}': {value}")]
    NonFiniteMeasurement { key: String, value: f64 },

    /// A measurement key is empty.
    #[error("empty measurement key")]
    EmptyMeasurementKey,

    /// Serialization of an in-memory envelope failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The discriminator does not name any known envelope variant.
    #[error("unknown envelope discriminator: '{0}'")]
    UnknownDiscriminator(String),

    /// The byte stream is truncated, fails checksum, or fails field validation.
    #[error("corrupt envelope data: {0}")]
    CorruptData(String),

    /// Disk read or write failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;

impl EnvelopeError {
    /// True when the on-disk bytes that produced this error can never be
    /// decoded by any build, so the file holding them should be removed.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, EnvelopeError::CorruptData(_))
    }
}
