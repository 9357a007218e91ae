//! Typed notifications from a region to its host
//!
//! Subscribers register per event type. Publishing takes a snapshot of the
//! subscribers and releases the registry before any handler runs, so a handler
//! may subscribe or publish itself. A handler that is already running is not
//! re-entered by the events it causes.

use std::any::{type_name, Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

type SharedHandler = Arc<Mutex<Box<dyn EventHandler>>>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Region-wide event bus
pub struct EventBus {
    subscribers: RwLock<AHashMap<TypeId, Vec<(SubscriptionId, SharedHandler)>>>,
    next_id: AtomicU64,
}

/// Notification payload
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

pub trait EventHandler: Send {
    fn handle(&mut self, event: &dyn Event);
}

/// Notifications published to the host application
pub mod events {
    use super::{Any, Event};
    use crate::record::{ModelKey, Record};
    use crate::settings::ViewId;

    /// The active view changed; `created` is true when the view was built
    /// for the first time by this switch
    #[derive(Debug, Clone)]
    pub struct ViewChange {
        pub view: ViewId,
        pub created: bool,
    }

    /// A different report was selected
    #[derive(Debug, Clone)]
    pub struct ReportChange {
        pub report_id: String,
        pub report_name: String,
    }

    /// The settings of the current report were replaced by a sync response
    #[derive(Debug, Clone)]
    pub struct ReportSettingsChange {
        pub report_id: String,
        pub report_name: String,
    }

    /// The selection of the active view changed
    #[derive(Debug, Clone)]
    pub struct SelectionChange {
        pub selected_records: Vec<Record>,
        pub model: Option<ModelKey>,
    }

    // Implement Event trait for all event types
    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        ViewChange,
        ReportChange,
        ReportSettingsChange,
        SelectionChange
    );
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(AHashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for events of type `E`
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .push((id, Arc::new(Mutex::new(handler))));
        id
    }

    /// Register a closure that only sees events of type `E`
    pub fn on<E, F>(&self, mut f: F) -> SubscriptionId
    where
        E: Event,
        F: FnMut(&E) + Send + 'static,
    {
        self.subscribe::<E>(handler_from_fn(move |event: &dyn Event| {
            if let Some(event) = event.as_any().downcast_ref::<E>() {
                f(event);
            }
        }))
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        for handlers in subscribers.values_mut() {
            if let Some(pos) = handlers.iter().position(|(sub, _)| *sub == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn publish<E: Event>(&self, event: E) {
        let handlers: Vec<SharedHandler> = self
            .subscribers
            .read()
            .get(&TypeId::of::<E>())
            .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in handlers {
            match handler.try_lock() {
                Some(mut handler) => handler.handle(&event),
                None => debug!("Skipping re-entrant delivery of {}", type_name::<E>()),
            }
        }
    }

    /// Number of handlers subscribed to `E`
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscribers
            .read()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

struct FnHandler<F>(F);

impl<F> EventHandler for FnHandler<F>
where
    F: FnMut(&dyn Event) + Send,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.0)(event);
    }
}

/// Box a closure as a handler that sees every event it is subscribed to
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + 'static,
{
    Box::new(FnHandler(f))
}
