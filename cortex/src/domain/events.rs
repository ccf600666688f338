// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the health memory bounded context
//! Returned with every outcome so callers can keep an audit trail of what
//! a request changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::{SignalId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HealthMemoryEvent {
    /// A new signal was persisted
    SignalRecorded {
        signal_id: SignalId,
        user_id: UserId,
        base_risk: f64,
        final_risk: f64,
        timestamp: DateTime<Utc>,
    },

    /// Base risk was amplified because the user repeated a similar complaint
    SignalReinforced {
        signal_id: SignalId,
        similar_count: usize,
        factor: f64,
        timestamp: DateTime<Utc>,
    },

    /// A historical signal lost influence
    WeightDecayed {
        signal_id: SignalId,
        old_weight: f64,
        new_weight: f64,
        persisted: bool,
        timestamp: DateTime<Utc>,
    },

    /// Recent risk rose above the baseline
    DeteriorationDetected {
        user_id: UserId,
        recent_avg: f64,
        baseline_avg: f64,
        timestamp: DateTime<Utc>,
    },
}

impl HealthMemoryEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HealthMemoryEvent::SignalRecorded { timestamp, .. } => *timestamp,
            HealthMemoryEvent::SignalReinforced { timestamp, .. } => *timestamp,
            HealthMemoryEvent::WeightDecayed { timestamp, .. } => *timestamp,
            HealthMemoryEvent::DeteriorationDetected { timestamp, .. } => *timestamp,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            HealthMemoryEvent::SignalRecorded { .. } => "signal_recorded",
            HealthMemoryEvent::SignalReinforced { .. } => "signal_reinforced",
            HealthMemoryEvent::WeightDecayed { .. } => "weight_decayed",
            HealthMemoryEvent::DeteriorationDetected { .. } => "deterioration_detected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = HealthMemoryEvent::WeightDecayed {
            signal_id: SignalId::new(),
            old_weight: 1.0,
            new_weight: 0.95,
            persisted: true,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "weight_decayed");

        let deserialized: HealthMemoryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.event_type(), deserialized.event_type());
        assert_eq!(event, deserialized);
    }
}
