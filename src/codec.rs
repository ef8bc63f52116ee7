//! Envelope wire codec.
//!
//! The byte format is self-describing and versioned so that files written
//! before an SDK update still decode after it.
//!
//! # File Format
//! ```text
//! [Header: 20 bytes][discriminator: name_len bytes][body: body_len bytes]
//! ```
//!
//! Header (little-endian):
//! - magic: [u8; 4] (`BENV`)
//! - version: u16 (1)
//! - name_len: u16
//! - body_len: u32
//! - checksum: u64 (CRC64 over discriminator + body)
//!
//! The discriminator is the envelope type name; it selects the variant
//! layout before the body is touched. The body is bincode (serde mode,
//! standard config) of the variant's wire struct.

use crate::envelope::{kind_for, Envelope, EnvelopeKind, EventEnvelope, Measurements};
use crate::error::{EnvelopeError, Result};
use crc64fast::Digest;
use serde::{Deserialize, Serialize};

const CODEC_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
struct EnvelopeHeader {
    version: u16,
    name_len: u16,
    body_len: u32,
    checksum: u64,
}

impl EnvelopeHeader {
    const SIZE: usize = 4 + 2 + 2 + 4 + 8; // 20 bytes
    const MAGIC: [u8; 4] = *b"BENV";

    fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&Self::MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.name_len.to_le_bytes());
        buf[8..12].copy_from_slice(&self.body_len.to_le_bytes());
        buf[12..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    fn read_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(EnvelopeError::CorruptData(format!(
                "truncated header: {} of {} bytes",
                bytes.len(),
                Self::SIZE
            )));
        }

        let magic: [u8; 4] = bytes[0..4].try_into().unwrap();
        if magic != Self::MAGIC {
            return Err(EnvelopeError::CorruptData(
                "invalid magic bytes in header".to_string(),
            ));
        }

        let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        if version != CODEC_VERSION {
            return Err(EnvelopeError::CorruptData(format!(
                "unsupported codec version {version}"
            )));
        }

        Ok(Self {
            version,
            name_len: u16::from_le_bytes(bytes[6..8].try_into().unwrap()),
            body_len: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            checksum: u64::from_le_bytes(bytes[12..20].try_into().unwrap()),
        })
    }
}

/// On-wire body of an [`Envelope::Event`].
#[derive(Serialize, Deserialize)]
struct EventWire {
    data_type_name: String,
    measurements: Measurements,
}

fn crc64(name: &[u8], body: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(name);
    digest.write(body);
    digest.sum64()
}

fn validate_measurements(measurements: &Measurements) -> Result<()> {
    for (key, value) in measurements {
        if key.is_empty() {
            return Err(EnvelopeError::EmptyMeasurementKey);
        }
        if !value.is_finite() {
            return Err(EnvelopeError::NonFiniteMeasurement {
                key: key.clone(),
                value: *value,
            });
        }
    }
    Ok(())
}

/// Serializes an envelope into its durable byte representation.
///
/// Validation happens before any bytes are produced, so a failed encode
/// leaves nothing half-written.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    validate_measurements(envelope.measurements())?;

    let body = match envelope {
        Envelope::Event(event) => {
            let wire = EventWire {
                data_type_name: envelope.data_type_name().to_string(),
                measurements: event.measurements().clone(),
            };
            bincode::serde::encode_to_vec(&wire, bincode::config::standard())
                .map_err(|e| EnvelopeError::Encoding(e.to_string()))?
        }
    };

    let name = envelope.envelope_type_name().as_bytes();
    let header = EnvelopeHeader {
        version: CODEC_VERSION,
        name_len: name.len() as u16,
        body_len: body.len() as u32,
        checksum: crc64(name, &body),
    };

    let mut out = Vec::with_capacity(EnvelopeHeader::SIZE + name.len() + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Reconstructs an envelope from its byte representation.
///
/// Reads the discriminator first and dispatches to the matching variant
/// layout. Framing, checksum, or field failures are `CorruptData`;
/// a well-formed stream whose discriminator names no known variant is
/// `UnknownDiscriminator`.
pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    let header = EnvelopeHeader::read_from(bytes)?;

    let name_start = EnvelopeHeader::SIZE;
    let body_start = name_start + header.name_len as usize;
    let total = body_start + header.body_len as usize;
    if bytes.len() < total {
        return Err(EnvelopeError::CorruptData(format!(
            "truncated envelope: {} of {} bytes",
            bytes.len(),
            total
        )));
    }
    if bytes.len() > total {
        return Err(EnvelopeError::CorruptData(format!(
            "{} trailing bytes after envelope",
            bytes.len() - total
        )));
    }

    let name_bytes = &bytes[name_start..body_start];
    let body = &bytes[body_start..total];

    let found = crc64(name_bytes, body);
    if found != header.checksum {
        return Err(EnvelopeError::CorruptData(format!(
            "checksum mismatch: expected {:#018x}, found {found:#018x}",
            header.checksum
        )));
    }

    let name = std::str::from_utf8(name_bytes)
        .map_err(|e| EnvelopeError::CorruptData(format!("invalid UTF-8 in discriminator: {e}")))?;
    let kind =
        kind_for(name).ok_or_else(|| EnvelopeError::UnknownDiscriminator(name.to_string()))?;

    match kind {
        EnvelopeKind::Event => {
            let (wire, read): (EventWire, usize) =
                bincode::serde::decode_from_slice(body, bincode::config::standard())
                    .map_err(|e| EnvelopeError::CorruptData(format!("body decode failed: {e}")))?;
            if read != body.len() {
                return Err(EnvelopeError::CorruptData(format!(
                    "{} trailing bytes in body",
                    body.len() - read
                )));
            }
            if wire.data_type_name != Envelope::EVENT_DATA_TYPE {
                return Err(EnvelopeError::UnknownDiscriminator(wire.data_type_name));
            }
            Ok(Envelope::Event(EventEnvelope::with_measurements(
                wire.measurements,
            )))
        }
    }
}
