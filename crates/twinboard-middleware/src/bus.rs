//! Single-slot, latest-value mailbox bus.
//!
//! Each topic owns exactly one slot holding the most recently published
//! payload. There is no queue: a publish overwrites whatever was there, and a
//! fetch copies the slot without consuming it. Readers are never notified;
//! every consumer pulls on its own schedule.
//!
//! Slots are [`ArcSwap`] cells, so a publish is a single atomic pointer swap
//! and a concurrent fetch observes either the whole previous payload or the
//! whole new one, never a mix. Neither side takes a lock.
//!
//! | Operation | Cost | Blocks |
//! |---|---|---|
//! | [`MailboxBus::register`] | map insert, startup only | no |
//! | [`MailboxBus::subscribe`] | map lookup, startup only | no |
//! | [`Publisher::publish`] | one allocation + pointer swap | never |
//! | [`Subscriber::fetch`] | pointer load + copy | never |
//!
//! Continuous setpoints suit this overwrite law. Discrete one-shot events do
//! not; carry them as a [`PulseCounter`][crate::pulse::PulseCounter] sequence
//! inside the payload instead.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::debug;
use twinboard_types::ConfigError;

/// Anything that can live in a mailbox slot.
///
/// `Default` is the value observed before the first publish and must be the
/// payload's safe state.
pub trait Payload: Copy + Default + Send + Sync + 'static {}

impl<T: Copy + Default + Send + Sync + 'static> Payload for T {}

struct Slot<T> {
    value: ArcSwap<T>,
    publishes: Arc<AtomicU64>,
}

struct TopicEntry {
    size: usize,
    type_id: TypeId,
    publishes: Arc<AtomicU64>,
    slot: Arc<dyn Any + Send + Sync>,
}

/// Registry of named topics.
///
/// Build it once at startup, hand out [`Publisher`] / [`Subscriber`] handles
/// to the tasks, and keep it for introspection. The handles hold their slot
/// directly and stay valid for the rest of the process.
#[derive(Default)]
pub struct MailboxBus {
    topics: HashMap<String, TopicEntry>,
}

impl MailboxBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create topic `name` sized for `T` and return its only publisher.
    ///
    /// Topics must be registered before anyone subscribes to them.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::SizeMismatch`] – `name` exists with a different size.
    /// * [`ConfigError::TypeMismatch`] – same size, different payload type.
    /// * [`ConfigError::DuplicatePublisher`] – `name` already has a writer.
    pub fn register<T: Payload>(&mut self, name: &str) -> Result<Publisher<T>, ConfigError> {
        let size = std::mem::size_of::<T>();
        if let Some(entry) = self.topics.get(name) {
            check_shape::<T>(name, entry)?;
            return Err(ConfigError::DuplicatePublisher(name.to_string()));
        }

        let publishes = Arc::new(AtomicU64::new(0));
        let slot = Arc::new(Slot {
            value: ArcSwap::from_pointee(T::default()),
            publishes: Arc::clone(&publishes),
        });
        self.topics.insert(
            name.to_string(),
            TopicEntry {
                size,
                type_id: TypeId::of::<T>(),
                publishes,
                slot: slot.clone(),
            },
        );
        debug!(topic = name, size, "topic registered");
        Ok(Publisher {
            topic: Arc::from(name),
            slot,
        })
    }

    /// Bind a reader to an existing topic.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::UnknownTopic`] – `name` was never registered.
    /// * [`ConfigError::SizeMismatch`] / [`ConfigError::TypeMismatch`] – `T`
    ///   does not match the registration.
    pub fn subscribe<T: Payload>(&self, name: &str) -> Result<Subscriber<T>, ConfigError> {
        let entry = self
            .topics
            .get(name)
            .ok_or_else(|| ConfigError::UnknownTopic(name.to_string()))?;
        check_shape::<T>(name, entry)?;
        let slot = downcast_slot::<T>(name, entry)?;
        debug!(topic = name, "topic subscribed");
        Ok(Subscriber {
            topic: Arc::from(name),
            last_seen: slot.publishes.load(Ordering::Acquire),
            slot,
        })
    }

    /// Registered topic names in sorted order.
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of publishes since startup, or `None` for an unknown topic.
    pub fn publish_count(&self, name: &str) -> Option<u64> {
        self.topics
            .get(name)
            .map(|entry| entry.publishes.load(Ordering::Acquire))
    }

    /// Registered payload size of `name` in bytes.
    pub fn topic_size(&self, name: &str) -> Option<usize> {
        self.topics.get(name).map(|entry| entry.size)
    }
}

impl fmt::Debug for MailboxBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxBus")
            .field("topics", &self.topic_names())
            .finish()
    }
}

fn check_shape<T: Payload>(name: &str, entry: &TopicEntry) -> Result<(), ConfigError> {
    let size = std::mem::size_of::<T>();
    if entry.size != size {
        return Err(ConfigError::SizeMismatch {
            topic: name.to_string(),
            registered: entry.size,
            requested: size,
        });
    }
    if entry.type_id != TypeId::of::<T>() {
        return Err(ConfigError::TypeMismatch {
            topic: name.to_string(),
        });
    }
    Ok(())
}

fn downcast_slot<T: Payload>(name: &str, entry: &TopicEntry) -> Result<Arc<Slot<T>>, ConfigError> {
    Arc::clone(&entry.slot)
        .downcast::<Slot<T>>()
        .map_err(|_| ConfigError::TypeMismatch {
            topic: name.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// The single writer of one topic. Not `Clone`.
pub struct Publisher<T: Payload> {
    topic: Arc<str>,
    slot: Arc<Slot<T>>,
}

impl<T: Payload> Publisher<T> {
    /// Overwrite the topic's slot with `value`. Never blocks.
    pub fn publish(&self, value: T) {
        self.slot.value.store(Arc::new(value));
        self.slot.publishes.fetch_add(1, Ordering::AcqRel);
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<T: Payload> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher").field("topic", &self.topic).finish()
    }
}

/// A reader of one topic. Each subscriber tracks its own "seen" position, so
/// several subscribers of the same topic never interfere.
#[derive(Clone)]
pub struct Subscriber<T: Payload> {
    topic: Arc<str>,
    slot: Arc<Slot<T>>,
    last_seen: u64,
}

impl<T: Payload> Subscriber<T> {
    /// Copy of the latest payload, or `T::default()` before the first
    /// publish. Repeated fetches without an intervening publish are equal.
    pub fn fetch(&self) -> T {
        **self.slot.value.load()
    }

    /// Like [`fetch`](Self::fetch) but only returns a value if something was
    /// published since this subscriber last called `fetch_new`.
    pub fn fetch_new(&mut self) -> Option<T> {
        let seq = self.slot.publishes.load(Ordering::Acquire);
        if seq == self.last_seen {
            return None;
        }
        self.last_seen = seq;
        Some(self.fetch())
    }

    /// Whether a publish happened since the last [`fetch_new`](Self::fetch_new).
    pub fn has_update(&self) -> bool {
        self.slot.publishes.load(Ordering::Acquire) != self.last_seen
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<T: Payload> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("topic", &self.topic).finish()
    }
}
