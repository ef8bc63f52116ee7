//! Telemetry envelope model.
//!
//! Envelopes are a closed set of tagged variants. The two discriminator
//! strings — the outer envelope type and the inner payload type — are
//! derived from the variant itself, so they are fixed at construction and
//! cannot drift afterwards.
//!
//! # Invariants
//! - Discriminators are functions of the variant, never stored fields
//! - A decoded discriminator must resolve to exactly one known variant
//! - `measurements` is the only mutable state

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Numeric measurements attached to an envelope, keyed by metric name.
///
/// Keys are unique and insertion order is irrelevant.
pub type Measurements = FxHashMap<String, f64>;

/// One telemetry event occurrence.
///
/// Carries only the measurements map; the discriminators live on
/// [`Envelope`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventEnvelope {
    measurements: Measurements,
}

impl EventEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_measurements(measurements: Measurements) -> Self {
        Self { measurements }
    }

    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    /// Replaces the whole measurements map.
    pub fn set_measurements(&mut self, measurements: Measurements) {
        self.measurements = measurements;
    }

    /// Inserts or overwrites a single measurement.
    pub fn set_measurement(&mut self, key: impl Into<String>, value: f64) {
        self.measurements.insert(key.into(), value);
    }
}

/// The closed set of envelope variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Envelope {
    Event(EventEnvelope),
}

/// Wire tag for each envelope variant, resolved from the discriminator
/// string through [`kind_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnvelopeKind {
    Event,
}

/// Discriminator-to-variant lookup table, built on first use.
static DISCRIMINATORS: Lazy<FxHashMap<&'static str, EnvelopeKind>> = Lazy::new(|| {
    let mut table = FxHashMap::default();
    table.insert(Envelope::EVENT_ENVELOPE_TYPE, EnvelopeKind::Event);
    table
});

/// Resolves an envelope discriminator string to its variant tag.
pub(crate) fn kind_for(name: &str) -> Option<EnvelopeKind> {
    DISCRIMINATORS.get(name).copied()
}

impl Envelope {
    pub(crate) const EVENT_ENVELOPE_TYPE: &'static str = "EventEnvelope";
    pub(crate) const EVENT_DATA_TYPE: &'static str = "Event";

    /// Outer discriminator: identifies how the envelope wrapper decodes.
    pub fn envelope_type_name(&self) -> &'static str {
        match self {
            Envelope::Event(_) => Self::EVENT_ENVELOPE_TYPE,
        }
    }

    /// Inner discriminator: identifies the payload shape.
    pub fn data_type_name(&self) -> &'static str {
        match self {
            Envelope::Event(_) => Self::EVENT_DATA_TYPE,
        }
    }

    pub fn measurements(&self) -> &Measurements {
        match self {
            Envelope::Event(event) => event.measurements(),
        }
    }

    pub(crate) fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Event(_) => EnvelopeKind::Event,
        }
    }
}

impl From<EventEnvelope> for Envelope {
    fn from(event: EventEnvelope) -> Self {
        Envelope::Event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminators_derive_from_variant() {
        let envelope = Envelope::Event(EventEnvelope::new());
        assert_eq!(envelope.envelope_type_name(), "EventEnvelope");
        assert_eq!(envelope.data_type_name(), "Event");
    }

    #[test]
    fn test_lookup_table_resolves_known_variant() {
        assert_eq!(kind_for("EventEnvelope"), Some(EnvelopeKind::Event));
        assert_eq!(kind_for("NoSuchEnvelope"), None);
        assert_eq!(kind_for(""), None);
    }

    #[test]
    fn test_measurements_mutable_after_construction() {
        let mut event = EventEnvelope::new();
        assert!(event.measurements().is_empty());

        event.set_measurement("duration", 125.0);
        event.set_measurement("duration", 250.0);
        assert_eq!(event.measurements().len(), 1);
        assert_eq!(event.measurements()["duration"], 250.0);

        let mut replacement = Measurements::default();
        replacement.insert("count".to_string(), 3.0);
        event.set_measurements(replacement);
        assert_eq!(event.measurements().len(), 1);
        assert_eq!(event.measurements()["count"], 3.0);
    }
}
