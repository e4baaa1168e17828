//! Live countdown shown by a page.
//!
//! The presenter keeps the last `countdown` received from the worker and
//! re-derives the display from that fixed target on every tick. Drift never
//! accumulates because nothing is decremented.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::channel::{ChannelEndpoint, Subscription};
use crate::clock::Clock;
use crate::config::PresenterSettings;
use crate::types::{BroadcastMessage, CountdownTarget, MS_PER_MINUTE, Millis, MessageKind, ms_to_parts};

/// How long a passed deadline stays on screen by default.
pub const HIDE_AFTER_LATE_MS: Millis = 5 * MS_PER_MINUTE;

/// What a page renders for the active countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownDisplay {
    pub label: String,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    /// Signed time to the deadline at the moment of rendering.
    pub remaining: Millis,
}

impl CountdownDisplay {
    pub fn is_late(&self) -> bool {
        self.remaining < 0
    }
}

impl fmt::Display for CountdownDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_late() {
            f.write_str("late ")?;
        }
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// [`countdown_display_with`] using the default late window.
pub fn countdown_display(target: &CountdownTarget, now: Millis) -> Option<CountdownDisplay> {
    countdown_display_with(target, now, HIDE_AFTER_LATE_MS)
}

/// Derive the display for `target` at `now`.
///
/// Returns `None` when there is no countdown or the deadline passed at least
/// `hide_after_late` ago. Once late the digits stay at zero.
pub fn countdown_display_with(
    target: &CountdownTarget,
    now: Millis,
    hide_after_late: Millis,
) -> Option<CountdownDisplay> {
    if target.is_empty() {
        return None;
    }
    let remaining = target.remaining(now);
    if remaining <= -hide_after_late {
        return None;
    }
    let parts = ms_to_parts(remaining.max(0));
    Some(CountdownDisplay {
        label: target.label.clone(),
        hours: parts.hours,
        minutes: parts.minutes,
        seconds: parts.seconds,
        remaining,
    })
}

/// Keeps a page's countdown display current.
pub struct CountdownPresenter {
    target: watch::Receiver<CountdownTarget>,
    display: watch::Receiver<Option<CountdownDisplay>>,
    subscription: Option<Subscription>,
    cancel: CancellationToken,
}

impl fmt::Debug for CountdownPresenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountdownPresenter")
            .field("target", &*self.target.borrow())
            .field("display", &*self.display.borrow())
            .finish()
    }
}

impl CountdownPresenter {
    /// Subscribe to `countdown` on `endpoint` and start ticking.
    pub fn spawn(endpoint: &ChannelEndpoint, clock: Arc<dyn Clock>, settings: &PresenterSettings) -> Self {
        let (target_tx, target_rx) = watch::channel(CountdownTarget::NONE);
        let (display_tx, display_rx) = watch::channel(None);

        let subscription = endpoint.subscribe(MessageKind::Countdown, move |message| {
            if let BroadcastMessage::Countdown(target) = message {
                target_tx.send_replace(target.clone());
            }
        });

        let cancel = CancellationToken::new();
        tokio::spawn(tick_task(
            target_rx.clone(),
            display_tx,
            clock,
            settings.clone(),
            cancel.clone(),
        ));

        Self { target: target_rx, display: display_rx, subscription: Some(subscription), cancel }
    }

    /// The last countdown received from the worker.
    pub fn target(&self) -> CountdownTarget {
        self.target.borrow().clone()
    }

    /// The display as of the last tick.
    pub fn current(&self) -> Option<CountdownDisplay> {
        self.display.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<CountdownDisplay>> {
        self.display.clone()
    }

    /// Stream of display changes, starting with the current one.
    pub fn displays(&self) -> WatchStream<Option<CountdownDisplay>> {
        WatchStream::new(self.display.clone())
    }

    /// Stop ticking and unsubscribe.
    pub fn dispose(&mut self) {
        self.cancel.cancel();
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }
}

impl Drop for CountdownPresenter {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn tick_task(
    mut target: watch::Receiver<CountdownTarget>,
    display: watch::Sender<Option<CountdownDisplay>>,
    clock: Arc<dyn Clock>,
    settings: PresenterSettings,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(settings.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(tick_ms = settings.tick_interval_ms, "Countdown presenter started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            changed = target.changed() => {
                if changed.is_err() {
                    break;
                }
                trace!(countdown = %*target.borrow(), "Countdown target changed");
            }
        }

        let next = countdown_display_with(
            &target.borrow_and_update(),
            clock.now_ms_from_midnight(),
            settings.hide_after_late_ms,
        );
        display.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
    debug!("Countdown presenter stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::BroadcastHub;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn target() -> CountdownTarget {
        CountdownTarget::new(36_000_000, "arrive at PKC2")
    }

    #[test]
    fn empty_countdown_is_hidden() {
        assert_eq!(countdown_display(&CountdownTarget::NONE, 35_000_000), None);
    }

    #[test]
    fn late_window_boundary() {
        let shown = countdown_display(&target(), 36_000_000 + 299_999).expect("still shown");
        assert!(shown.is_late());
        assert_eq!(shown.to_string(), "late 00:00:00");
        assert_eq!(countdown_display(&target(), 36_000_000 + 300_000), None);
        assert_eq!(countdown_display(&target(), 36_000_000 + 300_001), None);
    }

    #[test]
    fn digits_come_from_the_remaining_time() {
        let display = countdown_display(&target(), 36_000_000 - 3_725_000).expect("shown");
        assert_eq!((display.hours, display.minutes, display.seconds), (1, 2, 5));
        assert_eq!(display.to_string(), "01:02:05");
        assert_eq!(display.label, "arrive at PKC2");

        let at_deadline = countdown_display(&target(), 36_000_000).expect("shown");
        assert!(!at_deadline.is_late());
        assert_eq!(at_deadline.to_string(), "00:00:00");
    }

    #[test]
    fn custom_late_window() {
        assert!(countdown_display_with(&target(), 36_000_000 + 59_999, 60_000).is_some());
        assert!(countdown_display_with(&target(), 36_000_000 + 60_000, 60_000).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn presenter_follows_countdown_messages_and_ticks() {
        let hub = BroadcastHub::new("presenter", 8);
        let page = hub.open_context("page");
        let worker = hub.open_context("worker");
        let clock = ManualClock::new(35_990_000);
        let mut presenter =
            CountdownPresenter::spawn(&page, Arc::new(clock.clone()), &PresenterSettings::default());
        let mut display = presenter.watch();

        worker.publish(BroadcastMessage::Countdown(target()));
        display.changed().await.expect("display update");
        assert_eq!(presenter.current().map(|d| d.to_string()), Some("00:00:10".to_string()));
        assert_eq!(presenter.target(), target());

        clock.advance(4_000);
        display.changed().await.expect("tick update");
        assert_eq!(presenter.current().map(|d| d.to_string()), Some("00:00:06".to_string()));

        worker.publish(BroadcastMessage::Countdown(CountdownTarget::NONE));
        display.changed().await.expect("hidden");
        assert_eq!(presenter.current(), None);

        presenter.dispose();
        assert_eq!(page.subscription_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn display_hides_once_late_window_elapses() {
        let hub = BroadcastHub::new("presenter-late", 8);
        let page = hub.open_context("page");
        let worker = hub.open_context("worker");
        let clock = ManualClock::new(36_000_000 + 299_000);
        let presenter =
            CountdownPresenter::spawn(&page, Arc::new(clock.clone()), &PresenterSettings::default());
        let mut display = presenter.watch();

        worker.publish(BroadcastMessage::Countdown(target()));
        display.changed().await.expect("shown");
        assert!(presenter.current().is_some_and(|d| d.is_late()));

        clock.advance(1_000);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        display.changed().await.expect("hidden");
        assert_eq!(presenter.current(), None);
    }
}
