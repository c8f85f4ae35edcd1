use std::collections::HashMap;
use std::sync::Mutex;

use actix::Addr;

use crate::persistence::FileStore;
use crate::websocket::ChessSocket;

/// Application state shared between connections.
pub struct AppState {
    /// All live websocket sessions, by connection id.
    pub sessions: Mutex<HashMap<String, Addr<ChessSocket>>>,
    /// Hosted games waiting for a second player, by game id.
    pub open_games: Mutex<HashMap<String, Addr<ChessSocket>>>,
    pub store: FileStore,
}

impl AppState {
    pub fn new(store: FileStore) -> Self {
        AppState {
            sessions: Mutex::new(HashMap::new()),
            open_games: Mutex::new(HashMap::new()),
            store,
        }
    }
}
