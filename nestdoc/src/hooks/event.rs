use crate::collection::Document;
use crate::common::timestamp_millis;
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, Handle, HandlerId};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Payload of a lifecycle event.
///
/// `document` is the document as written, or a re-read snapshot for the
/// `.full` variants. `old` is only present for the variants that ask for the
/// previous state.
#[derive(Clone)]
pub struct LifecycleEvent {
    inner: Arc<LifecycleEventInner>,
}

struct LifecycleEventInner {
    name: String,
    id: String,
    document: Option<Document>,
    old: Option<Document>,
    timestamp: u128,
}

impl LifecycleEvent {
    pub fn new(name: &str, id: &str, document: Option<Document>, old: Option<Document>) -> Self {
        LifecycleEvent {
            inner: Arc::new(LifecycleEventInner {
                name: name.to_string(),
                id: id.to_string(),
                document,
                old,
                timestamp: timestamp_millis(),
            }),
        }
    }

    /// Fully qualified event name, e.g. `project.task.updated.full`.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn document(&self) -> Option<&Document> {
        self.inner.document.as_ref()
    }

    pub fn old(&self) -> Option<&Document> {
        self.inner.old.as_ref()
    }

    pub fn timestamp(&self) -> u128 {
        self.inner.timestamp
    }
}

impl Debug for LifecycleEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEvent")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("document", &self.document())
            .field("old", &self.old())
            .field("timestamp", &self.timestamp())
            .finish()
    }
}

pub trait LifecycleEventCallback: Send + Sync + Fn(LifecycleEvent) -> NestdocResult<()> {}

impl<F> LifecycleEventCallback for F where F: Send + Sync + Fn(LifecycleEvent) -> NestdocResult<()> {}

/// Listener subscribed to one event name of an [EventDispatcher].
#[derive(Clone)]
pub struct EventListener {
    on_event: Arc<dyn LifecycleEventCallback>,
}

impl EventListener {
    pub fn new(on_event: impl LifecycleEventCallback + 'static) -> Self {
        EventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<LifecycleEvent> for EventListener {
    fn handle(&self, event: &Event<LifecycleEvent>) -> Result<(), BasuError> {
        match (self.on_event)(event.data.clone()) {
            Ok(_) => Ok(()),
            Err(e) => Err(BasuError::HandlerError(Error::from(e))),
        }
    }
}

impl Debug for EventListener {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListener").finish()
    }
}

/// Something able to deliver lifecycle events to listeners.
pub trait EventNotifier: Send + Sync {
    /// Delivers `event` to the listeners of `name`.
    fn dispatch(&self, name: &str, event: LifecycleEvent) -> NestdocResult<()>;

    /// Whether at least one listener is subscribed to exactly `name`.
    fn is_observed(&self, name: &str) -> bool;
}

/// Shared handle on an [EventNotifier].
#[derive(Clone)]
pub struct Events {
    inner: Arc<dyn EventNotifier>,
}

impl Events {
    pub fn new<T: EventNotifier + 'static>(inner: T) -> Self {
        Events {
            inner: Arc::new(inner),
        }
    }

    pub fn dispatch(&self, name: &str, event: LifecycleEvent) -> NestdocResult<()> {
        self.inner.dispatch(name, event)
    }

    pub fn is_observed(&self, name: &str) -> bool {
        self.inner.is_observed(name)
    }
}

impl Default for Events {
    fn default() -> Self {
        Events::new(EventDispatcher::new())
    }
}

impl Debug for Events {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Events").finish()
    }
}

/// Handle returned by [EventDispatcher::subscribe].
pub struct SubscriberRef {
    name: String,
    handler_id: HandlerId,
}

impl SubscriberRef {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Debug for SubscriberRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRef")
            .field("name", &self.name)
            .finish()
    }
}

/// [EventNotifier] backed by a `basu` event bus, one event type per
/// fully qualified event name.
///
/// # Examples
///
/// ```rust,ignore
/// let events = EventDispatcher::new();
/// let subscriber = events.subscribe("project.task.updated.full", EventListener::new(|event| {
///     println!("task {} is now {:?}", event.id(), event.document());
///     Ok(())
/// }))?;
/// assert!(events.is_observed("project.task.updated.full"));
/// events.unsubscribe(subscriber)?;
/// ```
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        EventDispatcher {
            inner: Arc::new(EventDispatcherInner::new()),
        }
    }

    pub fn subscribe(&self, name: &str, listener: EventListener) -> NestdocResult<SubscriberRef> {
        self.inner.subscribe(name, listener)
    }

    pub fn unsubscribe(&self, subscriber: SubscriberRef) -> NestdocResult<()> {
        self.inner.unsubscribe(subscriber)
    }

    /// Number of listeners subscribed to `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.inner.listener_count(name)
    }

    /// Removes every listener.
    pub fn close(&self) -> NestdocResult<()> {
        self.inner.close()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        EventDispatcher::new()
    }
}

impl EventNotifier for EventDispatcher {
    fn dispatch(&self, name: &str, event: LifecycleEvent) -> NestdocResult<()> {
        self.inner.publish(name, event)
    }

    fn is_observed(&self, name: &str) -> bool {
        self.inner.listener_count(name) > 0
    }
}

struct EventDispatcherInner {
    event_bus: EventBus<LifecycleEvent>,
}

impl EventDispatcherInner {
    fn new() -> Self {
        EventDispatcherInner {
            event_bus: EventBus::new(),
        }
    }

    fn subscribe(&self, name: &str, listener: EventListener) -> NestdocResult<SubscriberRef> {
        match self.event_bus.subscribe(name, Box::new(listener)) {
            Ok(handler_id) => Ok(SubscriberRef {
                name: name.to_string(),
                handler_id,
            }),
            Err(e) => Err(Self::nestdoc_error(e)),
        }
    }

    #[inline]
    fn unsubscribe(&self, subscriber: SubscriberRef) -> NestdocResult<()> {
        match self
            .event_bus
            .unsubscribe(&subscriber.name, &subscriber.handler_id)
        {
            Ok(_) => Ok(()),
            Err(e) => Err(Self::nestdoc_error(e)),
        }
    }

    #[inline]
    fn publish(&self, name: &str, event: LifecycleEvent) -> NestdocResult<()> {
        if self.listener_count(name) == 0 {
            return Ok(());
        }

        let basu_event = Event::new(event);
        match self.event_bus.publish(name, &basu_event) {
            Ok(_) => Ok(()),
            Err(e) => Err(Self::nestdoc_error(e)),
        }
    }

    #[inline]
    fn listener_count(&self, name: &str) -> usize {
        match self.event_bus.get_handler_count(name) {
            Ok(count) => count,
            Err(BasuError::EventTypeNotFOUND) => 0,
            Err(e) => {
                log::warn!("Failed to count listeners of {}: {}, assuming none", name, e);
                0
            }
        }
    }

    #[inline]
    fn close(&self) -> NestdocResult<()> {
        match self.event_bus.clear() {
            Ok(_) => Ok(()),
            Err(e) => Err(Self::nestdoc_error(e)),
        }
    }

    fn nestdoc_error(e: BasuError) -> NestdocError {
        let message = match e {
            BasuError::EventTypeNotFOUND => {
                "Event bus error: no listener was ever subscribed to this event".to_string()
            }
            BasuError::MutexPoisoned => {
                "Event bus error: internal mutex poisoned".to_string()
            }
            BasuError::HandlerError(e) => format!("Event listener error: {}", e),
        };
        log::error!("{}", message);
        NestdocError::new(&message, ErrorKind::EventError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::common::{atomic, Atomic};

    fn recording(seen: Atomic<Vec<String>>) -> EventListener {
        EventListener::new(move |event: LifecycleEvent| {
            seen.write().push(format!("{}:{}", event.name(), event.id()));
            Ok(())
        })
    }

    #[test]
    fn test_unobserved_by_default() {
        let events = EventDispatcher::new();
        assert!(!events.is_observed("project.created"));
        assert_eq!(events.listener_count("project.created"), 0);
        assert!(events
            .dispatch("project.created", LifecycleEvent::new("project.created", "p1", None, None))
            .is_ok());
    }

    #[test]
    fn test_subscribe_dispatch_unsubscribe() {
        let seen = atomic(Vec::new());
        let events = EventDispatcher::new();
        let subscriber = events
            .subscribe("project.created", recording(seen.clone()))
            .unwrap();
        assert!(events.is_observed("project.created"));
        assert!(!events.is_observed("project.created.full"));

        let event = LifecycleEvent::new("project.created", "p1", Some(doc! { id: "p1" }), None);
        events.dispatch("project.created", event).unwrap();
        assert_eq!(*seen.read(), vec!["project.created:p1".to_string()]);

        assert_eq!(subscriber.name(), "project.created");
        events.unsubscribe(subscriber).unwrap();
        assert!(!events.is_observed("project.created"));
    }

    #[test]
    fn test_listener_failure_maps_to_event_error() {
        let events = EventDispatcher::new();
        events
            .subscribe(
                "project.deleted",
                EventListener::new(|_: LifecycleEvent| {
                    Err(NestdocError::new("listener down", ErrorKind::InternalError))
                }),
            )
            .unwrap();

        let result =
            events.dispatch("project.deleted", LifecycleEvent::new("project.deleted", "p1", None, None));
        if let Err(err) = result {
            assert_eq!(err.kind(), &ErrorKind::EventError);
        }
    }

    #[test]
    fn test_close_removes_listeners() {
        let events = EventDispatcher::new();
        events
            .subscribe("project.updated", recording(atomic(Vec::new())))
            .unwrap();
        events.close().unwrap();
        assert!(!events.is_observed("project.updated"));
    }

    #[test]
    fn test_event_payload() {
        let event = LifecycleEvent::new(
            "project.updated_old",
            "p1",
            Some(doc! { v: 2 }),
            Some(doc! { v: 1 }),
        );
        assert_eq!(event.old().unwrap().get("v").as_i64(), Some(&1));
        assert_eq!(event.document().unwrap().get("v").as_i64(), Some(&2));
        assert!(format!("{:?}", event).contains("project.updated_old"));
    }
}
