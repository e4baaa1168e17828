//! Lead-time notification scheduling.
//!
//! Every `panels` snapshot replaces the schedule: outstanding timers are
//! cancelled first, then the countdown is recomputed and one timer is armed
//! per lead time that still lies in the future. Cancelling before re-arming is
//! what keeps a stale timer from firing for a deadline that has moved.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::channel::ChannelEndpoint;
use crate::clock::Clock;
use crate::config::SchedulerSettings;
use crate::notify::{NotificationOptions, Notifier};
use crate::types::{BroadcastMessage, CheckpointRecord, CountdownTarget, Millis};

/// One armed warning.
#[derive(Debug)]
struct LeadTimer {
    lead: Millis,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl LeadTimer {
    fn cancel(self) {
        self.cancel.cancel();
        trace!(lead_ms = self.lead, finished = self.handle.is_finished(), "Lead timer cancelled");
    }
}

/// Worker-side scheduler state.
pub struct NotificationScheduler {
    endpoint: ChannelEndpoint,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    timers: Vec<LeadTimer>,
    countdown: CountdownTarget,
    shutdown: CancellationToken,
}

impl NotificationScheduler {
    pub fn new(
        endpoint: ChannelEndpoint,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            endpoint,
            notifier,
            clock,
            settings,
            timers: Vec::new(),
            countdown: CountdownTarget::NONE,
            shutdown,
        }
    }

    /// Route one incoming message. Kinds the worker does not handle are ignored.
    ///
    /// Never waits on the notifier, so a slow notification cannot hold back
    /// the next snapshot.
    pub fn handle(&mut self, message: &BroadcastMessage) {
        match message {
            BroadcastMessage::Panels(checkpoints) => {
                self.on_panels(checkpoints);
            }
            BroadcastMessage::NotifyTest(body) => self.on_notify_test(body),
            other => trace!(kind = %other.kind(), "Worker ignoring message"),
        }
    }

    /// Replace the schedule from a complete checkpoint snapshot and broadcast the countdown.
    pub fn on_panels(&mut self, checkpoints: &[CheckpointRecord]) -> CountdownTarget {
        self.cancel_timers();

        let now = self.clock.now_ms_from_midnight();
        let countdown = crate::types::calculate_countdown(checkpoints, now);
        if countdown.is_empty() {
            debug!(checkpoints = checkpoints.len(), "No upcoming deadline");
        } else {
            for lead in self.settings.lead_times_ms.clone() {
                let delay = countdown.target_time - now - lead;
                if delay > 0 {
                    self.arm(lead, delay, &countdown.label);
                } else {
                    trace!(lead_ms = lead, delay_ms = delay, "Lead time already passed");
                }
            }
            info!(
                target_time = countdown.target_time,
                label = %countdown.label,
                armed = self.timers.len(),
                "Countdown scheduled"
            );
        }

        self.countdown = countdown.clone();
        self.endpoint.publish(BroadcastMessage::Countdown(countdown.clone()));
        countdown
    }

    /// Show a diagnostic notification right away, on its own task.
    pub fn on_notify_test(&self, body: &str) {
        let options = NotificationOptions::new(body, self.settings.notification_tag.clone());
        let title = self.settings.test_title.clone();
        debug!(%title, "Firing test notification");
        tokio::spawn(fire_after(
            Duration::ZERO,
            self.shutdown.child_token(),
            Arc::clone(&self.notifier),
            title,
            options,
        ));
    }

    /// Cancel every outstanding timer. Safe to call repeatedly.
    pub fn cancel_timers(&mut self) {
        for timer in self.timers.drain(..) {
            timer.cancel();
        }
    }

    /// Lead times with a timer that has neither fired nor been cancelled.
    pub fn armed_leads(&self) -> Vec<Millis> {
        self.timers
            .iter()
            .filter(|timer| !timer.handle.is_finished())
            .map(|timer| timer.lead)
            .collect()
    }

    /// The countdown computed from the last snapshot.
    pub fn countdown(&self) -> &CountdownTarget {
        &self.countdown
    }

    fn arm(&mut self, lead: Millis, delay: Millis, label: &str) {
        let cancel = self.shutdown.child_token();
        let title = SchedulerSettings::lead_title(lead);
        let options = NotificationOptions::new(label, self.settings.notification_tag.clone());
        let notifier = Arc::clone(&self.notifier);
        let delay = Duration::from_millis(delay.unsigned_abs());
        debug!(lead_ms = lead, delay_ms = delay.as_millis() as u64, %title, "Arming lead timer");

        let handle = tokio::spawn(fire_after(delay, cancel.clone(), notifier, title, options));
        self.timers.push(LeadTimer { lead, cancel, handle });
    }
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

async fn fire_after(
    delay: Duration,
    cancel: CancellationToken,
    notifier: Arc<dyn Notifier>,
    title: String,
    options: NotificationOptions,
) {
    if !delay.is_zero() {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        info!(%title, body = %options.body, "Lead time reached");
    }
    let shown = tokio::select! {
        _ = cancel.cancelled() => return,
        shown = notifier.show(&title, &options) => shown,
    };
    if let Err(err) = shown {
        warn!(error = %err, %title, "Notification not shown");
    }
}
