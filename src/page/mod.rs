//! Page context: the editing side of the time card.
//!
//! Every edit normalizes the touched checkpoint, persists the card when a
//! store is attached and publishes a complete `panels` snapshot. Snapshots
//! from other pages replace the local copy wholesale.

mod presenter;

pub use presenter::{
    CountdownDisplay, CountdownPresenter, HIDE_AFTER_LATE_MS, countdown_display, countdown_display_with,
};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::channel::{BroadcastHub, ChannelEndpoint, Subscription};
use crate::clock::Clock;
use crate::config::PresenterSettings;
use crate::store::CardStore;
use crate::types::{
    BroadcastMessage, Card, CardInfo, CheckpointField, CheckpointList, CheckpointRecord, Millis,
    MessageKind,
};
use crate::{RallyError, Result};

/// Label of page endpoints.
pub const PAGE_CONTEXT: &str = "page";

/// One open page.
pub struct PageContext {
    card: Arc<Mutex<Card>>,
    endpoint: ChannelEndpoint,
    store: Option<CardStore>,
    subscriptions: Vec<Subscription>,
}

fn lock(card: &Mutex<Card>) -> MutexGuard<'_, Card> {
    card.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PageContext {
    /// Open a page on `hub`, loading the card from `store` when one is given.
    pub fn open(hub: &BroadcastHub, store: Option<CardStore>) -> Self {
        let card = store.as_ref().map(CardStore::load_or_default).unwrap_or_default();
        info!(
            channel = hub.name(),
            checkpoints = card.checkpoints.len(),
            persisted = store.is_some(),
            "Page opened"
        );
        let card = Arc::new(Mutex::new(card));
        let endpoint = hub.open_context(PAGE_CONTEXT);

        let panels_card = Arc::clone(&card);
        let panels = endpoint.subscribe(MessageKind::Panels, move |message| {
            if let BroadcastMessage::Panels(checkpoints) = message {
                debug!(checkpoints = checkpoints.len(), "Checkpoints replaced by another page");
                lock(&panels_card).checkpoints = checkpoints.clone();
            }
        });
        let info_card = Arc::clone(&card);
        let card_info = endpoint.subscribe(MessageKind::CardInfo, move |message| {
            if let BroadcastMessage::CardInfo(info) = message {
                debug!("Card info replaced by another page");
                lock(&info_card).info = info.clone();
            }
        });

        Self { card, endpoint, store, subscriptions: vec![panels, card_info] }
    }

    pub fn endpoint(&self) -> &ChannelEndpoint {
        &self.endpoint
    }

    /// Snapshot of the current card.
    pub fn card(&self) -> Card {
        lock(&self.card).clone()
    }

    pub fn checkpoints(&self) -> CheckpointList {
        lock(&self.card).checkpoints.clone()
    }

    /// Start a presenter on this page's endpoint.
    pub fn presenter(&self, clock: Arc<dyn Clock>, settings: &PresenterSettings) -> CountdownPresenter {
        CountdownPresenter::spawn(&self.endpoint, clock, settings)
    }

    /// Set one time field of checkpoint `number`.
    pub fn edit(&self, number: u32, field: CheckpointField, value: Millis) -> Result<()> {
        self.commit(|card| card.checkpoints.set_field(number, field, value))?;
        debug!(number, %field, value, "Checkpoint edited");
        Ok(())
    }

    pub fn rename(&self, number: u32, name: &str) -> Result<()> {
        self.commit(|card| card.checkpoints.rename(number, name))
    }

    /// Append a checkpoint and return its number.
    pub fn add_checkpoint(&self, name: &str) -> Result<u32> {
        let number = self.commit(|card| Ok(card.checkpoints.push_checkpoint(name)))?;
        info!(number, "Checkpoint added");
        Ok(number)
    }

    pub fn remove_checkpoint(&self, number: u32) -> Result<CheckpointRecord> {
        let removed = self.commit(|card| card.checkpoints.remove(number))?;
        info!(number, "Checkpoint removed");
        Ok(removed)
    }

    /// Replace the whole checkpoint list.
    pub fn replace_checkpoints(&self, checkpoints: CheckpointList) -> Result<()> {
        self.commit(|card| {
            card.checkpoints = checkpoints;
            card.checkpoints.normalize_all();
            Ok(())
        })
    }

    /// Replace the card metadata, persist it and broadcast it.
    pub fn publish_card_info(&self, info: CardInfo) -> Result<()> {
        let card = {
            let mut card = lock(&self.card);
            card.info = info.clone();
            card.clone()
        };
        self.persist(&card);
        self.send(BroadcastMessage::CardInfo(info))
    }

    /// Re-send the current checkpoints, e.g. so a freshly started worker schedules them.
    pub fn publish_panels(&self) -> Result<()> {
        let checkpoints = self.checkpoints();
        self.send(BroadcastMessage::Panels(checkpoints))
    }

    /// Ask the worker for an immediate diagnostic notification.
    pub fn request_test_notification(&self, body: &str) -> Result<()> {
        self.send(BroadcastMessage::NotifyTest(body.to_string()))
    }

    /// Unsubscribe and detach from the channel.
    pub fn close(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
        self.endpoint.close();
    }

    fn commit<T>(&self, edit: impl FnOnce(&mut Card) -> Result<T>) -> Result<T> {
        let (output, card) = {
            let mut card = lock(&self.card);
            let output = edit(&mut card)?;
            (output, card.clone())
        };
        self.persist(&card);
        self.send(BroadcastMessage::Panels(card.checkpoints))?;
        Ok(output)
    }

    fn persist(&self, card: &Card) {
        if let Some(store) = &self.store
            && let Err(err) = store.save(card)
        {
            warn!(path = %store.path().display(), error = %err, "Card not persisted");
        }
    }

    fn send(&self, message: BroadcastMessage) -> Result<()> {
        if self.endpoint.is_closed() {
            return Err(RallyError::Channel { channel: self.endpoint.hub().name().to_string() });
        }
        self.endpoint.publish(message);
        Ok(())
    }
}

impl Drop for PageContext {
    fn drop(&mut self) {
        self.close();
    }
}
