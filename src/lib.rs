//! Browser-based chess game console.
//!
//! The core is the turn-coordination state machine in
//! [`console::ConsoleController`]: it arbitrates whose turn it is, validates
//! proposed moves against the rules engine, rejects illegal moves and drives
//! the asynchronous request/response cycle between two [`players::PlayerAgent`]
//! implementations. Everything else — the actix-web shell, the websocket
//! session actors, persistence — is glue around that loop.

pub mod console;
pub mod error;
pub mod game;
pub mod models;
pub mod persistence;
pub mod players;
pub mod routes;
pub mod websocket;

pub use console::{ConsoleController, ConsoleEvent, EventKind, MessageBroker, MoveReply};
pub use error::ConsoleError;
pub use models::{GameState, PlayedMove};
pub use players::{ComputerAgent, HumanAgent, PlayerAgent, RemoteAgent};
