//! Named publish/subscribe bus between execution contexts
//!
//! A [`BroadcastHub`] is one named channel. Every context (a page, the
//! notification worker) opens its own [`ChannelEndpoint`] on it. Messages
//! published on an endpoint reach every *other* endpoint of the hub; the
//! publisher never observes its own messages.
//!
//! Delivery is asynchronous: each endpoint runs a dispatcher task that drains
//! the hub and invokes the callbacks registered for the message kind, in
//! subscription order. Messages from one publisher arrive in send order.
//! Delivery is at most once: an endpoint that falls more than the hub capacity
//! behind skips the overflow and logs a warning.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::types::{BroadcastMessage, MessageKind};

/// Channel name shared by every context of one installation.
pub const DEFAULT_CHANNEL_NAME: &str = "rally-time-card";

/// Messages buffered per endpoint before a slow endpoint starts losing them.
pub const DEFAULT_CAPACITY: usize = 64;

/// Callback invoked for every delivered message of a subscribed kind.
///
/// Runs on the endpoint's dispatcher task and must not block.
pub type MessageCallback = Arc<dyn Fn(&BroadcastMessage) + Send + Sync>;

/// Identifier of one endpoint on a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Envelope {
    origin: ContextId,
    message: Arc<BroadcastMessage>,
}

struct HubInner {
    name: String,
    sender: broadcast::Sender<Envelope>,
    next_context: AtomicU64,
}

/// One named broadcast channel.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("name", &self.inner.name)
            .field("endpoints", &self.inner.sender.receiver_count())
            .finish()
    }
}

fn registry() -> MutexGuard<'static, HashMap<String, BroadcastHub>> {
    static HUBS: OnceLock<Mutex<HashMap<String, BroadcastHub>>> = OnceLock::new();
    HUBS.get_or_init(Default::default).lock().unwrap_or_else(PoisonError::into_inner)
}

impl BroadcastHub {
    /// Create a standalone hub that is not registered process-wide.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(HubInner {
                name: name.into(),
                sender,
                next_context: AtomicU64::new(1),
            }),
        }
    }

    /// The process-wide hub for `name`, opened on first use and never closed.
    pub fn named(name: &str) -> Self {
        registry()
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(channel = name, "Opening broadcast channel");
                Self::new(name, DEFAULT_CAPACITY)
            })
            .clone()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of endpoints currently attached.
    pub fn endpoint_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    /// Attach a new context to this hub.
    ///
    /// Must be called from within a tokio runtime: the endpoint's dispatcher
    /// task is spawned immediately, so messages published from now on are
    /// queued for it even before the first subscription.
    pub fn open_context(&self, label: impl Into<String>) -> ChannelEndpoint {
        let id = ContextId(self.inner.next_context.fetch_add(1, Ordering::Relaxed));
        let label = label.into();
        let subscribers: Arc<Mutex<SubscriberTable>> = Arc::default();
        let cancel = CancellationToken::new();

        let stream = BroadcastStream::new(self.inner.sender.subscribe());
        tokio::spawn(dispatch_task(
            id,
            label.clone(),
            stream,
            Arc::clone(&subscribers),
            cancel.clone(),
        ));
        debug!(channel = %self.inner.name, context = %id, label = %label, "Context attached");

        ChannelEndpoint {
            inner: Arc::new(EndpointInner {
                id,
                label,
                hub: self.clone(),
                subscribers,
                next_subscription: AtomicU64::new(1),
                cancel,
            }),
        }
    }
}

#[derive(Default)]
struct SubscriberTable {
    entries: Vec<SubscriberEntry>,
}

struct SubscriberEntry {
    id: u64,
    kind: MessageKind,
    callback: MessageCallback,
}

impl SubscriberTable {
    fn matching(&self, kind: MessageKind) -> Vec<MessageCallback> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }
}

fn lock_table(table: &Mutex<SubscriberTable>) -> MutexGuard<'_, SubscriberTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn dispatch_task(
    id: ContextId,
    label: String,
    mut stream: BroadcastStream<Envelope>,
    subscribers: Arc<Mutex<SubscriberTable>>,
    cancel: CancellationToken,
) {
    trace!(context = %id, label = %label, "Dispatcher started");
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(envelope)) => {
                if envelope.origin == id {
                    continue;
                }
                let kind = envelope.message.kind();
                // Callbacks run outside the lock so they may subscribe or cancel
                let callbacks = lock_table(&subscribers).matching(kind);
                trace!(context = %id, %kind, from = %envelope.origin, callbacks = callbacks.len(), "Delivering message");
                for callback in callbacks {
                    callback(envelope.message.as_ref());
                }
            }
            Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                warn!(context = %id, label = %label, missed, "Endpoint lagged, messages dropped");
            }
            None => break,
        }
    }
    trace!(context = %id, label = %label, "Dispatcher stopped");
}

struct EndpointInner {
    id: ContextId,
    label: String,
    hub: BroadcastHub,
    subscribers: Arc<Mutex<SubscriberTable>>,
    next_subscription: AtomicU64,
    cancel: CancellationToken,
}

impl Drop for EndpointInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// One context's view of a [`BroadcastHub`].
///
/// Clones share the same context: they publish under the same origin and
/// share subscriptions. The endpoint closes when [`close`](Self::close) is
/// called or the last clone is dropped.
#[derive(Clone)]
pub struct ChannelEndpoint {
    inner: Arc<EndpointInner>,
}

impl fmt::Debug for ChannelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEndpoint")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("channel", &self.inner.hub.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ChannelEndpoint {
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.inner.hub
    }

    /// Run `callback` for every message of `kind` published by other contexts.
    ///
    /// The subscription lives as long as the endpoint unless the returned
    /// handle is cancelled. Dropping the handle does not unsubscribe.
    pub fn subscribe<F>(&self, kind: MessageKind, callback: F) -> Subscription
    where
        F: Fn(&BroadcastMessage) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        lock_table(&self.inner.subscribers).entries.push(SubscriberEntry {
            id,
            kind,
            callback: Arc::new(callback),
        });
        debug!(context = %self.inner.id, %kind, subscription = id, "Subscribed");
        Subscription { id, kind, table: Arc::downgrade(&self.inner.subscribers) }
    }

    /// Send `message` to every other context on the hub.
    ///
    /// Fire and forget: with no other context attached the message is dropped.
    pub fn publish(&self, message: BroadcastMessage) {
        let kind = message.kind();
        if self.is_closed() {
            debug!(context = %self.inner.id, %kind, "Publish on closed endpoint ignored");
            return;
        }
        let envelope = Envelope { origin: self.inner.id, message: Arc::new(message) };
        match self.inner.hub.inner.sender.send(envelope) {
            Ok(receivers) => {
                trace!(context = %self.inner.id, %kind, receivers, "Published");
            }
            Err(_) => {
                trace!(context = %self.inner.id, %kind, "Published with no listeners");
            }
        }
    }

    /// Number of live subscriptions on this endpoint.
    pub fn subscription_count(&self) -> usize {
        lock_table(&self.inner.subscribers).entries.len()
    }

    /// Stop dispatching and drop every subscription.
    pub fn close(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();
        lock_table(&self.inner.subscribers).entries.clear();
        debug!(context = %self.inner.id, label = %self.inner.label, "Context closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

/// Handle to one registered callback.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    kind: MessageKind,
    table: Weak<Mutex<SubscriberTable>>,
}

impl Subscription {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Remove the callback. Messages already being dispatched may still reach it.
    pub fn cancel(self) {
        if let Some(table) = self.table.upgrade() {
            lock_table(&table).entries.retain(|entry| entry.id != self.id);
            debug!(subscription = self.id, kind = %self.kind, "Unsubscribed");
        }
    }

    /// Whether the callback is still registered.
    pub fn is_active(&self) -> bool {
        self.table
            .upgrade()
            .is_some_and(|table| lock_table(&table).entries.iter().any(|entry| entry.id == self.id))
    }
}
