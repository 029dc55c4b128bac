//! Subscription registry and event fan-out for one store instance.
//!
//! Every mutation path calls [`WatchSet::notify`] synchronously, in commit
//! order, while still holding the store's write lock; all subscribers
//! therefore observe the same total order of events. Delivery itself is
//! non-blocking: each subscription has a bounded channel fed with `try_send`,
//! and a subscriber that lets its buffer fill up is closed rather than
//! allowed to stall the writer or its peers.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::task::Context;
use std::task::Poll;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;
use tracing::trace;

use crate::SelectionPredicate;
use crate::WatchEvent;

#[derive(Debug)]
enum SubscriptionState {
    /// Registered but not started: live events pile up here until the replay
    /// snapshot has been delivered.
    Pending { buffered: Vec<WatchEvent> },
    Live,
    Closed,
}

#[derive(Debug)]
struct Subscription {
    id: u64,
    predicate: SelectionPredicate,
    tx: mpsc::Sender<WatchEvent>,
    state: Mutex<SubscriptionState>,
}

impl Subscription {
    /// Non-blocking enqueue. Returns false when the subscriber's buffer is
    /// full or its receiver is gone, either of which closes it.
    fn deliver(
        &self,
        event: WatchEvent,
    ) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                debug!("closing watch subscription {}: {}", self.id, e);
                false
            }
        }
    }
}

/// Owns all watch subscriptions of one store. Shares the store's lifetime;
/// handles are opaque ids, raw subscriptions never escape.
#[derive(Debug)]
pub struct WatchSet {
    capacity: usize,
    subscriptions: DashMap<u64, Arc<Subscription>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    dropped_events: AtomicU64,
}

impl WatchSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Registers a subscription in the not-started state and returns its
    /// handle plus the receiving half of its channel. No events flow until
    /// [`WatchSet::start`].
    pub fn new_watch(
        &self,
        predicate: SelectionPredicate,
    ) -> (u64, mpsc::Receiver<WatchEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscriptions.insert(
            id,
            Arc::new(Subscription {
                id,
                predicate,
                tx,
                state: Mutex::new(SubscriptionState::Pending { buffered: Vec::new() }),
            }),
        );
        trace!("registered watch subscription {id}");
        (id, rx)
    }

    /// Flips the subscription live and returns everything it must observe
    /// before any live event: the replay snapshot in order, then whatever
    /// `notify` buffered while the snapshot was being assembled. The caller
    /// stages these on the stream side, so a replay larger than the channel
    /// capacity never overflows it; only live delivery contends for the
    /// bounded buffer. The state lock is held across the flip, so no event
    /// committed concurrently can slip between replay and live.
    #[must_use]
    pub fn start(
        &self,
        id: u64,
        initial_events: Vec<WatchEvent>,
    ) -> Vec<WatchEvent> {
        let Some(subscription) = self.subscriptions.get(&id).map(|e| e.value().clone()) else {
            return Vec::new();
        };

        let mut state = subscription.state.lock();
        let mut staged = initial_events;
        if let SubscriptionState::Pending { buffered } =
            std::mem::replace(&mut *state, SubscriptionState::Live)
        {
            staged.extend(buffered);
        }
        staged
    }

    /// Fans one committed event out to every matching subscription. Invoked
    /// synchronously from the mutation path, so invocation order is commit
    /// order. Never blocks on a subscriber.
    pub fn notify(
        &self,
        event: &WatchEvent,
    ) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let mut stale = Vec::new();
        for entry in self.subscriptions.iter() {
            let subscription = entry.value();

            match subscription.predicate.matches(&event.object) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    // Skipped for this subscriber, but observable: counted
                    // and logged instead of silently dropped.
                    self.dropped_events.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "predicate error on subscription {}, event skipped: {e}",
                        subscription.id
                    );
                    continue;
                }
            }

            let mut state = subscription.state.lock();
            match &mut *state {
                SubscriptionState::Pending { buffered } => buffered.push(event.clone()),
                SubscriptionState::Live => {
                    if !subscription.deliver(event.clone()) {
                        *state = SubscriptionState::Closed;
                        stale.push(subscription.id);
                    }
                }
                SubscriptionState::Closed => stale.push(subscription.id),
            }
        }

        // Removal outside the iteration; DashMap shards stay unlocked.
        for id in stale {
            self.subscriptions.remove(&id);
        }
    }

    /// Detaches one subscription. Its receiver sees end-of-stream.
    pub fn remove(
        &self,
        id: u64,
    ) {
        if self.subscriptions.remove(&id).is_some() {
            trace!("removed watch subscription {id}");
        }
    }

    /// Closes every outstanding subscription. Idempotent; called when the
    /// owning store is destroyed.
    pub fn cleanup(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        if count > 0 {
            debug!("watch set cleanup closed {count} subscription(s)");
        }
    }

    /// Events skipped because a subscriber's predicate failed to evaluate.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Drop for WatchSet {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// The caller-facing half of a subscription: a stream of events that
/// deregisters itself from the owning [`WatchSet`] when stopped or dropped.
/// Replay events are staged here and yielded before anything from the live
/// channel.
#[derive(Debug)]
pub struct WatchStream {
    id: u64,
    set: Weak<WatchSet>,
    staged: VecDeque<WatchEvent>,
    rx: mpsc::Receiver<WatchEvent>,
}

impl WatchStream {
    pub(crate) fn new(
        id: u64,
        set: Weak<WatchSet>,
        staged: Vec<WatchEvent>,
        rx: mpsc::Receiver<WatchEvent>,
    ) -> Self {
        Self {
            id,
            set,
            staged: staged.into(),
            rx,
        }
    }

    /// Cancels the subscription. Events already buffered remain readable;
    /// nothing new is enqueued afterwards.
    pub fn stop(&self) {
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }
}

impl Stream for WatchStream {
    type Item = WatchEvent;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(event) = this.staged.pop_front() {
            return Poll::Ready(Some(event));
        }
        this.rx.poll_recv(cx)
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.stop();
    }
}
