//! beacon-core: crash-safe telemetry envelopes and level-gated diagnostics
//! logging for SDK embedding.
//!
//! Producer code builds an [`Envelope`], optionally logs through the
//! [`log`] facility, and hands the envelope to an [`EnvelopeStore`] for
//! durable persistence. On the next startup the store enumerates pending
//! files and the recovered envelopes go to the external transport layer,
//! which deletes each file once delivery is acknowledged. Crash capture,
//! transport, and UI flows live outside this crate and consume it through
//! these interfaces plus the [`identity`] callback surface.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod log;
pub mod store;

pub use envelope::{Envelope, EventEnvelope, Measurements};
pub use error::{EnvelopeError, Result};
pub use identity::{CallbackRegistry, Component, PresentationAnchor};
pub use log::LogLevel;
pub use store::EnvelopeStore;
