use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::models::PlayedMove;
use crate::players::PlayerAgent;

/// Kinds of notifications published by the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GameStarted,
    GameFinished,
    Load,
    MoveRequest,
    MoveDone,
    IllegalMove,
}

/// Notifications published by the console controller. `MoveDone` carries the
/// agent that did *not* just move, so it can mirror the opponent's move.
#[derive(Clone)]
pub enum ConsoleEvent {
    GameStarted,
    GameFinished,
    Load,
    MoveRequest {
        player: Rc<dyn PlayerAgent>,
    },
    MoveDone {
        player: Rc<dyn PlayerAgent>,
        mv: PlayedMove,
    },
    IllegalMove {
        player: Rc<dyn PlayerAgent>,
        notation: String,
    },
}

impl ConsoleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ConsoleEvent::GameStarted => EventKind::GameStarted,
            ConsoleEvent::GameFinished => EventKind::GameFinished,
            ConsoleEvent::Load => EventKind::Load,
            ConsoleEvent::MoveRequest { .. } => EventKind::MoveRequest,
            ConsoleEvent::MoveDone { .. } => EventKind::MoveDone,
            ConsoleEvent::IllegalMove { .. } => EventKind::IllegalMove,
        }
    }
}

type Handler = Rc<dyn Fn(&ConsoleEvent)>;

/// Token returned by [`MessageBroker::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    kind: EventKind,
    id: usize,
}

/// In-memory publish/subscribe bus decoupling the controller from the UI
/// components. Delivery is synchronous, in subscription order, and
/// in-process only.
#[derive(Default)]
pub struct MessageBroker {
    topics: RefCell<HashMap<EventKind, Vec<(usize, Handler)>>>,
    next_id: Cell<usize>,
}

impl MessageBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&ConsoleEvent) + 'static,
    ) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.topics
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push((id, Rc::new(handler)));
        Subscription { kind, id }
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        if let Some(handlers) = self.topics.borrow_mut().get_mut(&subscription.kind) {
            handlers.retain(|(id, _)| *id != subscription.id);
        }
    }

    /// Delivers `event` to all current subscribers of its kind. The handler
    /// list is snapshotted first, so handlers may subscribe or publish
    /// without aliasing the registry.
    pub fn publish(&self, event: &ConsoleEvent) {
        let handlers: Vec<Handler> = self
            .topics
            .borrow()
            .get(&event.kind())
            .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        debug!("publishing {:?} to {} subscribers", event.kind(), handlers.len());
        for handler in handlers {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_subscription_order() {
        let broker = MessageBroker::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            broker.subscribe(EventKind::GameStarted, move |_| {
                seen.borrow_mut().push(tag);
            });
        }
        broker.publish(&ConsoleEvent::GameStarted);
        assert_eq!(seen.borrow().as_slice(), ["first", "second", "third"]);
    }

    #[test]
    fn delivers_only_matching_kind() {
        let broker = MessageBroker::new();
        let hits = Rc::new(RefCell::new(0));
        {
            let hits = hits.clone();
            broker.subscribe(EventKind::Load, move |_| *hits.borrow_mut() += 1);
        }
        broker.publish(&ConsoleEvent::GameStarted);
        broker.publish(&ConsoleEvent::GameFinished);
        assert_eq!(*hits.borrow(), 0);
        broker.publish(&ConsoleEvent::Load);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let broker = MessageBroker::new();
        let hits = Rc::new(RefCell::new(0));
        let subscription = {
            let hits = hits.clone();
            broker.subscribe(EventKind::GameStarted, move |_| *hits.borrow_mut() += 1)
        };
        broker.publish(&ConsoleEvent::GameStarted);
        broker.unsubscribe(subscription);
        broker.publish(&ConsoleEvent::GameStarted);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn publish_with_no_subscribers_is_a_noop() {
        let broker = MessageBroker::new();
        broker.publish(&ConsoleEvent::GameFinished);
    }

    #[test]
    fn handlers_may_subscribe_during_delivery() {
        let broker = Rc::new(MessageBroker::new());
        let hits = Rc::new(RefCell::new(0));
        {
            let broker2 = broker.clone();
            let hits = hits.clone();
            broker.subscribe(EventKind::GameStarted, move |_| {
                let hits = hits.clone();
                broker2.subscribe(EventKind::GameStarted, move |_| {
                    *hits.borrow_mut() += 1;
                });
            });
        }
        broker.publish(&ConsoleEvent::GameStarted);
        assert_eq!(*hits.borrow(), 0); // registered mid-delivery, sees later events
        broker.publish(&ConsoleEvent::GameStarted);
        assert_eq!(*hits.borrow(), 1);
    }
}
