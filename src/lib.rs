//! Rally time card with a live countdown to the next checkpoint.
//!
//! Drivers keep the times of every checkpoint (PKC) on a card. Pages edit the
//! card and publish complete snapshots over a named broadcast channel; a
//! background worker picks the next arrival deadline, warns ahead of it and
//! sends the countdown back for every page to display.
//!
//! # Features
//!
//! - **Time model**: millisecond offsets from local midnight, `0` meaning unset
//! - **Broadcast channel**: in-process pub/sub between independent contexts
//! - **Lead-time warnings**: 5 and 1 minute before each deadline by default
//! - **Live countdown**: recomputed every second from a fixed target
//! - **Desktop notifications**: behind the `desktop` feature
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rallycard::{
//!     BroadcastHub, CheckpointField, LocalClock, LogNotifier, NotificationWorker, PageContext,
//!     RallyConfig, parse_time,
//! };
//!
//! #[tokio::main]
//! async fn main() -> rallycard::Result<()> {
//!     let config = RallyConfig::default();
//!     let hub = BroadcastHub::named(&config.channel_name);
//!     let worker = NotificationWorker::spawn(
//!         &hub,
//!         Arc::new(LogNotifier),
//!         Arc::new(LocalClock),
//!         config.scheduler.clone(),
//!     );
//!
//!     let page = PageContext::open(&hub, None);
//!     page.add_checkpoint("Start")?;
//!     let pkc = page.add_checkpoint("PKC 2")?;
//!     page.edit(pkc, CheckpointField::ProvisionalStartTime, parse_time("09:30")?)?;
//!     page.edit(pkc, CheckpointField::DrivingTime, 12 * 60_000)?;
//!
//!     worker.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Contexts and the bus between them
pub mod channel;
pub mod page;
pub mod worker;

// Host seams
pub mod clock;
pub mod notify;

// Ambient
pub mod config;
pub mod logging;
pub mod store;

pub use error::*;
pub use types::*;

pub use channel::{BroadcastHub, ChannelEndpoint, ContextId, Subscription};
pub use clock::{Clock, LocalClock, ManualClock};
pub use config::{PresenterSettings, RallyConfig, SchedulerSettings};
#[cfg(feature = "desktop")]
pub use notify::DesktopNotifier;
pub use notify::{
    FixedPermission, GatedNotifier, LogNotifier, NotificationOptions, Notifier, Permission, PermissionGate,
};
pub use page::{CountdownDisplay, CountdownPresenter, PageContext, countdown_display};
pub use store::CardStore;
pub use worker::{NotificationScheduler, NotificationWorker, WorkerHandle};
