//! Background notification worker
//!
//! The worker owns the [`NotificationScheduler`] and is fed from its own
//! endpoint on the broadcast channel. Callbacks only enqueue; a single task
//! drains the queue, so messages are handled one at a time in arrival order.
//! The worker keeps no card state between messages: every `panels` snapshot
//! is complete, so a restarted worker recovers on the next edit.

mod scheduler;

pub use scheduler::NotificationScheduler;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::channel::{BroadcastHub, ChannelEndpoint};
use crate::clock::Clock;
use crate::config::SchedulerSettings;
use crate::notify::Notifier;
use crate::types::{BroadcastMessage, MessageKind};

/// Label of the worker's endpoint.
pub const WORKER_CONTEXT: &str = "notification-worker";

/// Spawns the worker task.
pub struct NotificationWorker;

impl NotificationWorker {
    /// Attach a worker to `hub` and start processing.
    ///
    /// Subscriptions are registered before this returns, so anything published
    /// afterwards reaches the worker.
    pub fn spawn(
        hub: &BroadcastHub,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> WorkerHandle {
        let endpoint = hub.open_context(WORKER_CONTEXT);
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        for kind in [MessageKind::Panels, MessageKind::NotifyTest] {
            let queue_tx = queue_tx.clone();
            let _ = endpoint.subscribe(kind, move |message| {
                let _ = queue_tx.send(message.clone());
            });
        }

        let cancel = CancellationToken::new();
        let scheduler = NotificationScheduler::new(
            endpoint.clone(),
            notifier,
            clock,
            settings,
            cancel.child_token(),
        );
        let join = tokio::spawn(Self::run(scheduler, queue_rx, cancel.clone()));

        WorkerHandle { endpoint, cancel, join }
    }

    async fn run(
        mut scheduler: NotificationScheduler,
        mut queue: mpsc::UnboundedReceiver<BroadcastMessage>,
        cancel: CancellationToken,
    ) {
        info!("Notification worker started");
        let mut handled = 0u64;

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Notification worker cancelled");
                    break;
                }
                message = queue.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            handled += 1;
            scheduler.handle(&message);
        }

        scheduler.cancel_timers();
        info!(handled, "Notification worker stopped");
    }
}

/// Handle to a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    endpoint: ChannelEndpoint,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn endpoint(&self) -> &ChannelEndpoint {
        &self.endpoint
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Stop the worker, cancel its pending notifications and detach it from the channel.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.endpoint.close();
        if let Err(err) = self.join.await {
            debug!(error = %err, "Worker task did not finish cleanly");
        }
    }
}
