//! Test helpers shared by unit tests, integration tests and benchmarks
//!
//! Provides notifier doubles that record or reject what they are asked to
//! show, and builders for checkpoint lists with known arrival times.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::notify::{NotificationOptions, Notifier};
use crate::types::{CheckpointList, CheckpointRecord, Millis};
use crate::{RallyError, Result};

/// Notifier that keeps every call in memory.
///
/// Clones share the same log, so a test can hand one clone to the worker and
/// inspect another.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<(String, NotificationOptions)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(title, options)` pair shown so far, oldest first.
    pub fn calls(&self) -> Vec<(String, NotificationOptions)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.calls().into_iter().map(|(title, _)| title).collect()
    }

    pub fn count_titled(&self, title: &str) -> usize {
        self.calls().iter().filter(|(shown, _)| shown == title).count()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, title: &str, options: &NotificationOptions) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((title.to_string(), options.clone()));
        Ok(())
    }
}

/// Notifier whose every call fails as if permission had been denied.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingNotifier;

#[async_trait::async_trait]
impl Notifier for FailingNotifier {
    async fn show(&self, _title: &str, _options: &NotificationOptions) -> Result<()> {
        Err(RallyError::notification_denied())
    }
}

/// Notifier that takes `delay` to show notifications titled `title`, then
/// records them in the wrapped [`RecordingNotifier`]. Other titles are
/// recorded straight away.
#[derive(Debug, Clone)]
pub struct SlowNotifier {
    inner: RecordingNotifier,
    title: String,
    delay: Duration,
}

impl SlowNotifier {
    pub fn new(inner: RecordingNotifier, title: impl Into<String>, delay: Duration) -> Self {
        Self { inner, title: title.into(), delay }
    }
}

#[async_trait::async_trait]
impl Notifier for SlowNotifier {
    async fn show(&self, title: &str, options: &NotificationOptions) -> Result<()> {
        if title == self.title {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.show(title, options).await
    }
}

/// Checkpoints numbered from 1 with the given arrival times (`0` = unset).
pub fn card_with_arrivals(arrivals: &[Millis]) -> CheckpointList {
    let records = arrivals
        .iter()
        .zip(1u32..)
        .map(|(&arrival_time, number)| CheckpointRecord {
            arrival_time,
            ..CheckpointRecord::new(number, format!("PKC {number}"))
        })
        .collect();
    CheckpointList::from_records(records)
}

/// A rally day: start at 09:00, then `legs` PKCs each driven in ten minutes
/// from a provisional start one minute after the previous arrival.
pub fn rally_day(legs: u32) -> CheckpointList {
    let mut checkpoints = CheckpointList::new_card(1);
    let mut start: Millis = 9 * 3_600_000;
    let _ = checkpoints.set_field(1, crate::types::CheckpointField::ProvisionalStartTime, start);
    for _ in 0..legs {
        let number = checkpoints.push_checkpoint("");
        let _ = checkpoints.set_field(number, crate::types::CheckpointField::ProvisionalStartTime, start);
        let _ = checkpoints.set_field(number, crate::types::CheckpointField::DrivingTime, 600_000);
        start += 660_000;
    }
    checkpoints
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("rallycard=debug").try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_notifier_clones_share_their_log() {
        let recorder = RecordingNotifier::new();
        let handle = recorder.clone();
        handle.show("5 minutes left", &NotificationOptions::new("arrive at PKC2", "t")).await.unwrap();
        assert_eq!(recorder.titles(), vec!["5 minutes left"]);
        assert_eq!(recorder.count_titled("5 minutes left"), 1);
        assert!(!recorder.is_empty());
    }

    #[test]
    fn arrival_builder_numbers_from_one() {
        let card = card_with_arrivals(&[0, 36_000_000, 37_000_000]);
        let numbers: Vec<u32> = card.iter().map(|record| record.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(card[2].arrival_time, 37_000_000);
    }

    #[test]
    fn rally_day_arrivals_are_ten_minutes_after_each_start() {
        let card = rally_day(2);
        assert_eq!(card.len(), 3);
        assert_eq!(card[1].arrival_time, 9 * 3_600_000 + 600_000);
        assert_eq!(card[2].arrival_time, 9 * 3_600_000 + 660_000 + 600_000);
    }
}
