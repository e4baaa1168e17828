//! Next-deadline selection.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::checkpoint::CheckpointRecord;
use super::time::{Millis, UNSET};
use crate::clock::Clock;

/// The next upcoming arrival deadline, or the empty value.
///
/// Never persisted; recomputed from the checkpoint list on every change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "typescript", derive(specta::Type))]
pub struct CountdownTarget {
    pub target_time: Millis,
    pub label: String,
}

impl CountdownTarget {
    /// The canonical "no active countdown" value.
    pub const NONE: CountdownTarget = CountdownTarget { target_time: UNSET, label: String::new() };

    pub fn new(target_time: Millis, label: impl Into<String>) -> Self {
        Self { target_time, label: label.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.target_time == UNSET && self.label.is_empty()
    }

    /// Sample `clock` once and select the next deadline.
    pub fn compute(checkpoints: &[CheckpointRecord], clock: &dyn Clock) -> Self {
        calculate_countdown(checkpoints, clock.now_ms_from_midnight())
    }

    /// Milliseconds left until the target, negative once it has passed.
    pub fn remaining(&self, now: Millis) -> Millis {
        self.target_time - now
    }
}

impl fmt::Display for CountdownTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("no countdown")
        } else {
            write!(f, "{} at {}", self.label, super::time::format_time(self.target_time))
        }
    }
}

/// Label shown for a checkpoint deadline.
pub fn arrival_label(number: u32) -> String {
    format!("arrive at PKC{number}")
}

/// Select the first checkpoint, in list order, whose arrival is still ahead of `now`.
///
/// The list is assumed chronological and is not sorted. Unset arrivals (`0`)
/// are never ahead of a time of day, so they are skipped by the same test.
pub fn calculate_countdown(checkpoints: &[CheckpointRecord], now: Millis) -> CountdownTarget {
    checkpoints
        .iter()
        .find(|record| record.arrival_time - now > 0)
        .map(|record| CountdownTarget::new(record.arrival_time, arrival_label(record.number)))
        .unwrap_or(CountdownTarget::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn with_arrivals(arrivals: &[Millis]) -> Vec<CheckpointRecord> {
        arrivals
            .iter()
            .enumerate()
            .map(|(index, arrival)| {
                let mut record = CheckpointRecord::new(index as u32 + 1, "");
                record.arrival_time = *arrival;
                record
            })
            .collect()
    }

    #[test]
    fn picks_first_arrival_after_now() {
        let checkpoints = with_arrivals(&[0, 36_000_000, 37_000_000]);
        let countdown = calculate_countdown(&checkpoints, 35_900_000);
        assert_eq!(countdown, CountdownTarget::new(36_000_000, "arrive at PKC2"));
    }

    #[test]
    fn uses_list_order_not_time_order() {
        let checkpoints = with_arrivals(&[0, 37_000_000, 36_000_000]);
        let countdown = calculate_countdown(&checkpoints, 35_900_000);
        assert_eq!(countdown.target_time, 37_000_000);
    }

    #[test]
    fn exhausted_deadlines_give_the_empty_value() {
        let checkpoints = with_arrivals(&[0, 35_000_000, 35_900_000]);
        let countdown = calculate_countdown(&checkpoints, 35_900_000);
        assert_eq!(countdown, CountdownTarget::NONE);
        assert!(countdown.is_empty());
    }

    #[test]
    fn unset_arrivals_give_the_empty_value() {
        assert!(calculate_countdown(&with_arrivals(&[0, 0, 0]), 0).is_empty());
        assert!(calculate_countdown(&[], 1_000).is_empty());
    }

    #[test]
    fn compute_samples_the_clock() {
        let checkpoints = with_arrivals(&[0, 36_000_000]);
        let clock = ManualClock::new(35_000_000);
        assert_eq!(CountdownTarget::compute(&checkpoints, &clock).target_time, 36_000_000);
        clock.set(36_000_000);
        assert!(CountdownTarget::compute(&checkpoints, &clock).is_empty());
    }

    #[test]
    fn wire_shape_matches_the_front_end() {
        let json = serde_json::to_string(&CountdownTarget::new(36_000_000, "arrive at PKC2")).unwrap();
        assert_eq!(json, r#"{"targetTime":36000000,"label":"arrive at PKC2"}"#);
    }
}
