// Keybind Rule Streams
// Push streams of matched events, one per registered rule

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::event::KeyPressEvent;
use crate::rule::Matcher;
use crate::sequence::SequenceProgress;

/// Receives the matches of one rule.
///
/// An `Err` from `on_next` is logged at error level and dropped; it never
/// reaches other subscribers or the shared event source.
pub trait Observer: Send {
    fn on_next(&mut self, event: &KeyPressEvent) -> anyhow::Result<()>;

    /// Called once when the rule is removed, overwritten or shut down
    fn on_complete(&mut self) {}
}

impl<F> Observer for F
where
    F: FnMut(&KeyPressEvent) -> anyhow::Result<()> + Send,
{
    fn on_next(&mut self, event: &KeyPressEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// An observer plus a completion that could not be delivered yet
pub(crate) struct ObserverCell<O: ?Sized = dyn Observer> {
    completion_pending: AtomicBool,
    observer: Mutex<O>,
}

pub(crate) type SharedObserver = Arc<ObserverCell>;

impl<O: Observer> ObserverCell<O> {
    fn new(observer: O) -> Self {
        Self {
            completion_pending: AtomicBool::new(false),
            observer: Mutex::new(observer),
        }
    }
}

impl ObserverCell {
    /// Deliver `on_complete` exactly once.
    ///
    /// If the observer is busy in `on_next` (it removed or replaced its own
    /// rule), the delivery that holds it runs the completion on return.
    fn complete(&self) {
        self.completion_pending.store(true, Ordering::SeqCst);
        if let Some(mut observer) = self.observer.try_lock() {
            if self.completion_pending.swap(false, Ordering::SeqCst) {
                observer.on_complete();
            }
        }
    }

    fn take_pending_completion(&self) -> bool {
        self.completion_pending.swap(false, Ordering::SeqCst)
    }
}

struct SubscriberSlot {
    id: u64,
    /// Sequence matching state owned by this subscription
    progress: SequenceProgress,
    observer: SharedObserver,
}

struct StreamState {
    subscribers: Vec<SubscriberSlot>,
    completed: bool,
    next_id: u64,
}

/// Stream of events matched by one rule.
///
/// The stream is lazy: nothing is matched until it has a subscriber, and
/// every subscription carries its own matching state. It completes exactly
/// once, when its rule is removed, overwritten, or the manager shuts down.
#[derive(Clone)]
pub struct RuleStream {
    id: Arc<str>,
    state: Arc<Mutex<StreamState>>,
}

impl RuleStream {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: Arc::from(id),
            state: Arc::new(Mutex::new(StreamState {
                subscribers: Vec::new(),
                completed: false,
                next_id: 0,
            })),
        }
    }

    /// An already completed stream, handed out for rejected registrations
    pub(crate) fn inert(id: &str) -> Self {
        let stream = Self::new(id);
        stream.state.lock().completed = true;
        stream
    }

    /// Id of the rule this stream belongs to
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Start receiving matches.
    ///
    /// Subscribing to a completed stream completes the observer right away.
    pub fn subscribe(&self, observer: impl Observer + 'static) -> Subscription {
        let observer: SharedObserver = Arc::new(ObserverCell::new(observer));
        {
            let mut state = self.state.lock();
            if !state.completed {
                let id = state.next_id;
                state.next_id += 1;
                state.subscribers.push(SubscriberSlot {
                    id,
                    progress: SequenceProgress::new(),
                    observer,
                });
                return Subscription {
                    state: Arc::downgrade(&self.state),
                    id,
                };
            }
        }
        observer.complete();
        Subscription {
            state: Weak::new(),
            id: 0,
        }
    }

    /// Subscribe an infallible handler
    pub fn for_each(&self, mut handler: impl FnMut(&KeyPressEvent) + Send + 'static) -> Subscription {
        self.subscribe(move |event: &KeyPressEvent| -> anyhow::Result<()> {
            handler(event);
            Ok(())
        })
    }

    /// Run the rule's matcher for every subscriber.
    ///
    /// `admit` is the priority decision for this event; it is consulted only
    /// once some subscriber matched. Returns the observers to notify.
    pub(crate) fn evaluate(
        &self,
        matcher: &Matcher,
        event: &KeyPressEvent,
        mut admit: impl FnMut() -> bool,
    ) -> Vec<SharedObserver> {
        let mut state = self.state.lock();
        if state.completed || state.subscribers.is_empty() {
            return Vec::new();
        }

        match matcher {
            Matcher::Combination(combo) => {
                if !combo.matches(event) || !admit() {
                    return Vec::new();
                }
                state
                    .subscribers
                    .iter()
                    .map(|slot| Arc::clone(&slot.observer))
                    .collect()
            }
            Matcher::Sequence(sequence) => {
                let mut hits = Vec::new();
                for slot in state.subscribers.iter_mut() {
                    if slot.progress.advance(sequence, event).is_some() {
                        hits.push(Arc::clone(&slot.observer));
                    }
                }
                if hits.is_empty() || !admit() {
                    return Vec::new();
                }
                hits
            }
        }
    }

    /// Complete the stream; returns false if it was already completed
    pub(crate) fn complete(&self) -> bool {
        let drained = {
            let mut state = self.state.lock();
            if state.completed {
                return false;
            }
            state.completed = true;
            std::mem::take(&mut state.subscribers)
        };
        log::debug!("shortcut '{}' stream completed", self.id);
        for slot in drained {
            slot.observer.complete();
        }
        true
    }
}

impl fmt::Debug for RuleStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RuleStream")
            .field("id", &self.id)
            .field("subscribers", &state.subscribers.len())
            .field("completed", &state.completed)
            .finish()
    }
}

/// Hand one match to an observer, containing any failure
pub(crate) fn deliver(rule_id: &str, cell: &SharedObserver, event: &KeyPressEvent) {
    {
        let Some(mut observer) = cell.observer.try_lock() else {
            log::warn!(
                "shortcut '{}' observer re-entered while handling a match; '{}' dropped",
                rule_id,
                event.key()
            );
            return;
        };
        if let Err(e) = observer.on_next(event) {
            log::error!("shortcut '{}' observer failed: {:#}", rule_id, e);
        }
    }

    // The stream completed while on_next held the observer
    if cell.take_pending_completion() {
        log::debug!("shortcut '{}' completed from its own observer", rule_id);
        cell.observer.lock().on_complete();
    }
}

/// Handle to one subscription of a [`RuleStream`]
#[derive(Debug)]
pub struct Subscription {
    state: Weak<Mutex<StreamState>>,
    id: u64,
}

impl Subscription {
    /// Returns true while the subscription still receives matches
    pub fn is_active(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let state = state.lock();
        state.subscribers.iter().any(|s| s.id == self.id)
    }

    /// Stop receiving matches; returns false if already inactive
    pub fn unsubscribe(self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let mut state = state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|s| s.id != self.id);
        state.subscribers.len() != before
    }
}
