pub mod broker;
pub mod controller;

pub use broker::{ConsoleEvent, EventKind, MessageBroker, Subscription};
pub use controller::{ConsoleController, MoveReply};
