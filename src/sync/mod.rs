//! Real-time delivery of store changes
//!
//! A [`SyncChannel`] owns one store subscription and hands each change to a
//! [`ChangeListener`]. Delivery is at-least-once: listeners must tolerate
//! repeated and stale events.
//!
//! The subscription behind a channel can be swapped through a
//! [`SubscriptionHandle`] while the channel is being pumped elsewhere, e.g.
//! to follow the player across the map.

mod observable;

pub use observable::Observable;

use crate::store::{ChangeEvent, ChangeStream, LootBoxFilter, LootBoxStore, StoreResult};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::future::{self, Either};
use futures::{FutureExt, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;

/// Receives store changes
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// One live subscription
pub struct SyncChannel {
    stream: ChangeStream,
    /// Events drained from a replaced stream, delivered first
    backlog: VecDeque<ChangeEvent>,
    replacements: UnboundedReceiver<ChangeStream>,
    replace_tx: UnboundedSender<ChangeStream>,
    delivered: u64,
}

/// Replaces the subscription feeding a [`SyncChannel`]
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    tx: UnboundedSender<ChangeStream>,
}

impl SubscriptionHandle {
    /// Hand the channel a new stream; `false` if the channel is gone
    pub fn replace(&self, stream: ChangeStream) -> bool {
        self.tx.unbounded_send(stream).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for SyncChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncChannel")
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}

impl SyncChannel {
    /// Subscribe to boxes matching `filter`
    pub async fn open<S>(store: &S, filter: LootBoxFilter) -> StoreResult<Self>
    where
        S: LootBoxStore + ?Sized,
    {
        let stream = store.subscribe_loot_boxes(filter).await?;
        log::debug!("Opened loot box subscription");
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: ChangeStream) -> Self {
        let (replace_tx, replacements) = mpsc::unbounded();
        Self {
            stream,
            backlog: VecDeque::new(),
            replacements,
            replace_tx,
            delivered: 0,
        }
    }

    /// A handle for swapping this channel's subscription
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            tx: self.replace_tx.clone(),
        }
    }

    fn swap_stream(&mut self, stream: ChangeStream) {
        while let Some(Some(event)) = self.stream.next().now_or_never() {
            self.backlog.push_back(event);
        }
        self.stream = stream;
        log::debug!(
            "Loot box subscription replaced ({} queued event(s) kept)",
            self.backlog.len()
        );
    }

    fn apply_replacements(&mut self) {
        while let Some(Some(stream)) = self.replacements.next().now_or_never() {
            self.swap_stream(stream);
        }
    }

    /// Events handed out so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Wait for the next change; `None` once the subscription has ended
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        loop {
            self.apply_replacements();
            if let Some(event) = self.backlog.pop_front() {
                self.delivered += 1;
                return Some(event);
            }

            let next = match future::select(self.replacements.next(), self.stream.next()).await {
                Either::Left((Some(stream), _)) => Either::Left(stream),
                // This channel holds a sender, so replacements never end
                Either::Left((None, pending)) => Either::Right(pending.await),
                Either::Right((event, _)) => Either::Right(event),
            };

            match next {
                Either::Left(stream) => self.swap_stream(stream),
                Either::Right(event) => {
                    if event.is_some() {
                        self.delivered += 1;
                    }
                    return event;
                }
            }
        }
    }

    /// Deliver every change that is ready now, without waiting
    pub fn pump_ready(&mut self, listener: &dyn ChangeListener) -> usize {
        self.apply_replacements();
        let mut count = 0;
        while let Some(event) = self.backlog.pop_front() {
            self.delivered += 1;
            listener.on_change(&event);
            count += 1;
        }
        while let Some(Some(event)) = self.stream.next().now_or_never() {
            self.delivered += 1;
            listener.on_change(&event);
            count += 1;
        }
        count
    }

    /// Deliver changes until the subscription ends
    pub async fn run(mut self, listener: Arc<dyn ChangeListener>) -> u64 {
        while let Some(event) = self.next_event().await {
            listener.on_change(&event);
        }
        log::debug!("Loot box subscription ended after {} events", self.delivered);
        self.delivered
    }
}
