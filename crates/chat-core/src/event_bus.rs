//! Event bus between the session manager and the presentation layer.
//!
//! Single-threaded (WASM constraint), interior mutability via RefCell.
//! Events are pushed to subscribers as they are emitted and also kept in a
//! bounded buffer for hosts that poll with `drain`. When the buffer is full
//! the oldest event is dropped.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use chat_types::event::SessionEvent;

pub type Subscriber = Rc<dyn Fn(&SessionEvent)>;

/// Buffered events kept for `drain` before the oldest are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct BusInner {
    queue: RefCell<VecDeque<SessionEvent>>,
    capacity: usize,
    subscribers: RefCell<Vec<(SubscriptionId, Subscriber)>>,
    next_id: Cell<u64>,
}

/// Shared event bus: clone-cheap via Rc.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Rc::new(BusInner {
                queue: RefCell::new(VecDeque::new()),
                capacity: capacity.max(1),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Publish an event. Subscribers run synchronously, in registration order.
    pub fn emit(&self, event: SessionEvent) {
        {
            let mut queue = self.inner.queue.borrow_mut();
            if queue.len() >= self.inner.capacity {
                queue.pop_front();
            }
            queue.push_back(event.clone());
        }
        // Snapshot so a subscriber may (un)subscribe or emit re-entrantly.
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        for subscriber in subscribers {
            subscriber(&event);
        }
    }

    pub fn subscribe(&self, subscriber: impl Fn(&SessionEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(subscriber)));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Drain all buffered events.
    pub fn drain(&self) -> Vec<SessionEvent> {
        self.inner.queue.borrow_mut().drain(..).collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
