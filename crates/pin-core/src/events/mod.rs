//! Discovery bus shared by independently mounted charts
//!
//! Charts have no common parent state, so they find each other's annotations
//! by broadcasting typed requests and letting every other live chart answer
//! synchronously. By the time a request call returns, every subscriber has
//! already run, so the caller reads a complete snapshot with no async round
//! trip.
//!
//! Subscribers are held weakly. A chart that is dropped stops answering even if
//! its [`Subscription`] was leaked, and dead entries are pruned on every
//! dispatch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::annotations::{AnnotationId, Position};
use crate::error::BusError;

/// Identifier of one mounted chart instance
pub type InstanceId = Uuid;

/// Messages carried on the bus
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// Every other instance appends its annotation positions
    RequestPositions { requester: InstanceId },
    /// Every instance adds its annotation count
    CountRequest,
    /// Every instance closes all of its annotations
    CloseAll { origin: InstanceId },
}

/// One annotation position reported by an instance
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEntry {
    pub instance: InstanceId,
    pub id: AnnotationId,
    pub position: Position,
}

/// Positions gathered from all other instances for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryResponse {
    entries: Vec<PositionEntry>,
}

impl DiscoveryResponse {
    pub fn entries(&self) -> &[PositionEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<PositionEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only view of a response handed to each subscriber.
///
/// Entries are stamped with the answering instance's id; a subscriber cannot
/// remove or rewrite what others reported.
pub struct ResponseSink<'a> {
    instance: InstanceId,
    entries: &'a mut Vec<PositionEntry>,
    count: &'a mut usize,
}

impl<'a> ResponseSink<'a> {
    pub fn push_position(&mut self, id: &str, position: Position) {
        self.entries.push(PositionEntry {
            instance: self.instance,
            id: id.to_string(),
            position,
        });
    }

    pub fn add_count(&mut self, count: usize) {
        *self.count += count;
    }

    /// Instance the sink is answering for
    pub fn instance(&self) -> InstanceId {
        self.instance
    }
}

/// Trait for chart instances listening on the bus
pub trait BusSubscriber: Send + Sync {
    /// Handle one message; answers go into `sink`
    fn on_message(&self, message: &BusMessage, sink: &mut ResponseSink<'_>);
}

struct Registration {
    token: u64,
    instance: InstanceId,
    subscriber: Weak<dyn BusSubscriber>,
}

#[derive(Default)]
struct DispatchState {
    depth: usize,
    deferred: VecDeque<BusMessage>,
}

/// Process-wide, injectable request/response bus
pub struct DiscoveryBus {
    subscribers: RwLock<Vec<Registration>>,
    dispatch: Mutex<DispatchState>,
    active_drags: AtomicUsize,
    next_token: AtomicU64,
}

impl DiscoveryBus {
    /// Create a new bus
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            dispatch: Mutex::new(DispatchState::default()),
            active_drags: AtomicUsize::new(0),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register `subscriber` as `instance`; dropping the returned guard unregisters it
    pub fn subscribe(
        self: &Arc<Self>,
        instance: InstanceId,
        subscriber: Weak<dyn BusSubscriber>,
    ) -> Subscription {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().push(Registration {
            token,
            instance,
            subscriber,
        });
        tracing::debug!("Bus subscriber {} registered as token {}", instance, token);

        Subscription {
            bus: Arc::downgrade(self),
            token,
            instance,
        }
    }

    fn unsubscribe(&self, token: u64) {
        self.subscribers.write().retain(|r| r.token != token);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|r| r.subscriber.strong_count() > 0);
        subscribers.len()
    }

    /// Collect every other instance's annotation positions.
    ///
    /// Fails with [`BusError::Reentrant`] when called from inside another
    /// dispatch; callers treat that as an empty result.
    pub fn request_all_positions(
        &self,
        requester: InstanceId,
    ) -> Result<DiscoveryResponse, BusError> {
        let message = BusMessage::RequestPositions { requester };
        let mut response = DiscoveryResponse::default();
        let mut count = 0;

        let dispatch = self.enter()?;
        for (instance, subscriber) in self.live_subscribers() {
            if instance == requester {
                continue;
            }
            let mut sink = ResponseSink {
                instance,
                entries: &mut response.entries,
                count: &mut count,
            };
            subscriber.on_message(&message, &mut sink);
        }
        dispatch.finish();

        tracing::trace!("Position request from {} gathered {} entries", requester, response.len());
        Ok(response)
    }

    /// Total annotations across all instances, including the caller.
    ///
    /// Advisory only: returns `None` while any drag is active so the badge does
    /// not flood the bus every frame, and when called from inside a dispatch.
    pub fn count_all_annotations(&self) -> Option<usize> {
        if self.is_drag_active() {
            return None;
        }

        let mut entries = Vec::new();
        let mut count = 0;

        let Ok(dispatch) = self.enter() else {
            tracing::warn!("Ignoring nested annotation count request");
            return None;
        };
        for (instance, subscriber) in self.live_subscribers() {
            let mut sink = ResponseSink {
                instance,
                entries: &mut entries,
                count: &mut count,
            };
            subscriber.on_message(&BusMessage::CountRequest, &mut sink);
        }
        dispatch.finish();

        Some(count)
    }

    /// Ask every instance, including `origin`, to close all annotations.
    ///
    /// Fire-and-forget. When issued from inside another dispatch the message is
    /// queued and delivered once the outermost dispatch finishes.
    pub fn broadcast_close_all(&self, origin: InstanceId) {
        let message = BusMessage::CloseAll { origin };

        let Ok(dispatch) = self.enter() else {
            tracing::debug!("Deferring close-all from {} until current dispatch ends", origin);
            self.dispatch.lock().deferred.push_back(message);
            return;
        };
        self.deliver(&message);
        dispatch.finish();
    }

    /// Mark a drag as active until the returned guard is dropped
    pub fn begin_drag(self: &Arc<Self>) -> DragActivity {
        self.active_drags.fetch_add(1, Ordering::SeqCst);
        DragActivity { bus: self.clone() }
    }

    pub fn is_drag_active(&self) -> bool {
        self.active_drags.load(Ordering::SeqCst) > 0
    }

    fn deliver(&self, message: &BusMessage) {
        let mut entries = Vec::new();
        let mut count = 0;
        for (instance, subscriber) in self.live_subscribers() {
            let mut sink = ResponseSink {
                instance,
                entries: &mut entries,
                count: &mut count,
            };
            subscriber.on_message(message, &mut sink);
        }
    }

    fn enter(&self) -> Result<DispatchGuard<'_>, BusError> {
        let mut state = self.dispatch.lock();
        if state.depth > 0 {
            return Err(BusError::Reentrant);
        }
        state.depth += 1;
        Ok(DispatchGuard { bus: self })
    }

    /// Deliver everything queued while the current dispatch ran
    fn flush_deferred(&self) {
        loop {
            let next = self.dispatch.lock().deferred.pop_front();
            match next {
                // Still inside the dispatch, so messages queued by this delivery wait their turn
                Some(message) => self.deliver(&message),
                None => return,
            }
        }
    }

    /// Snapshot of live subscribers; the lock is released before any callback runs
    fn live_subscribers(&self) -> Vec<(InstanceId, Arc<dyn BusSubscriber>)> {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|r| r.subscriber.strong_count() > 0);
        subscribers
            .iter()
            .filter_map(|r| r.subscriber.upgrade().map(|s| (r.instance, s)))
            .collect()
    }
}

impl Default for DiscoveryBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the bus as dispatching; the depth is reset on drop, including
/// when a subscriber panics mid-dispatch
struct DispatchGuard<'a> {
    bus: &'a DiscoveryBus,
}

impl DispatchGuard<'_> {
    /// End the dispatch normally, flushing deferred messages first
    fn finish(self) {
        self.bus.flush_deferred();
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.bus.dispatch.lock();
        state.depth = 0;
        if !state.deferred.is_empty() {
            tracing::warn!(
                "Dropping {} deferred bus messages after an aborted dispatch",
                state.deferred.len()
            );
            state.deferred.clear();
        }
    }
}

/// Keeps a subscriber registered; unregisters on drop
pub struct Subscription {
    bus: Weak<DiscoveryBus>,
    token: u64,
    instance: InstanceId,
}

impl Subscription {
    pub fn instance(&self) -> InstanceId {
        self.instance
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.token);
            tracing::debug!("Bus subscriber {} unregistered", self.instance);
        }
    }
}

/// Marks a drag in progress on the bus while alive
pub struct DragActivity {
    bus: Arc<DiscoveryBus>,
}

impl Drop for DragActivity {
    fn drop(&mut self) {
        self.bus.active_drags.fetch_sub(1, Ordering::SeqCst);
    }
}
