use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;
use crate::game::utils::color_to_string;
use crate::models::GameState;

/// Snapshot of one session's game, written after every accepted move.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SavedGame {
    pub player_color: String,
    pub moves: Vec<String>,
}

impl SavedGame {
    pub fn capture(state: &GameState) -> SavedGame {
        SavedGame {
            player_color: color_to_string(state.player_color()),
            moves: state.history().into_iter().map(|mv| mv.san).collect(),
        }
    }
}

/// Keyed storage for saved games. Keys are user-scoped names; a missing
/// entry is `Ok(None)`, an unreadable one is an error so the caller can
/// discard it and start fresh.
pub trait GameStore {
    fn load(&self, user: &str) -> Result<Option<SavedGame>, ConsoleError>;
    fn save(&self, user: &str, saved: &SavedGame) -> Result<(), ConsoleError>;
    fn clear(&self, user: &str) -> Result<(), ConsoleError>;
}

/// One JSON file per user under the data directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    fn path_for(&self, user: &str) -> PathBuf {
        let name: String = user
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl GameStore for FileStore {
    fn load(&self, user: &str) -> Result<Option<SavedGame>, ConsoleError> {
        let path = self.path_for(user);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ConsoleError::Store(err)),
        };
        let saved = serde_json::from_str(&text)
            .map_err(|err| ConsoleError::CorruptedSave(err.to_string()))?;
        Ok(Some(saved))
    }

    fn save(&self, user: &str, saved: &SavedGame) -> Result<(), ConsoleError> {
        fs::create_dir_all(&self.dir)?;
        let text = serde_json::to_string(saved)?;
        fs::write(self.path_for(user), text)?;
        debug!("saved game for {} ({} plies)", user, saved.moves.len());
        Ok(())
    }

    fn clear(&self, user: &str) -> Result<(), ConsoleError> {
        match fs::remove_file(self.path_for(user)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ConsoleError::Store(err)),
        }
    }
}

/// In-memory store for tests and ephemeral setups.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for MemoryStore {
    fn load(&self, user: &str) -> Result<Option<SavedGame>, ConsoleError> {
        match self.entries.lock().unwrap().get(user) {
            Some(text) => {
                let saved = serde_json::from_str(text)
                    .map_err(|err| ConsoleError::CorruptedSave(err.to_string()))?;
                Ok(Some(saved))
            }
            None => Ok(None),
        }
    }

    fn save(&self, user: &str, saved: &SavedGame) -> Result<(), ConsoleError> {
        let text = serde_json::to_string(saved)?;
        self.entries.lock().unwrap().insert(user.to_string(), text);
        Ok(())
    }

    fn clear(&self, user: &str) -> Result<(), ConsoleError> {
        self.entries.lock().unwrap().remove(user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SavedGame {
        SavedGame {
            player_color: "white".to_string(),
            moves: vec!["e4".to_string(), "e5".to_string()],
        }
    }

    #[test]
    fn capture_snapshots_color_and_history() {
        let state = GameState::new();
        state.set_player_color(chess::Color::Black);
        state.play("e4").unwrap();
        state.play("e5").unwrap();
        let saved = SavedGame::capture(&state);
        assert_eq!(saved.player_color, "black");
        assert_eq!(saved.moves, vec!["e4".to_string(), "e5".to_string()]);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load("alice").unwrap().is_none());
        store.save("alice", &sample()).unwrap();
        assert_eq!(store.load("alice").unwrap(), Some(sample()));
        store.clear("alice").unwrap();
        assert!(store.load("alice").unwrap().is_none());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("chess-console-{}", uuid::Uuid::new_v4()));
        let store = FileStore::new(&dir);
        assert!(store.load("alice").unwrap().is_none());
        store.save("alice", &sample()).unwrap();
        assert_eq!(store.load("alice").unwrap(), Some(sample()));
        store.clear("alice").unwrap();
        assert!(store.load("alice").unwrap().is_none());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn file_store_reports_corrupted_entries() {
        let dir = std::env::temp_dir().join(format!("chess-console-{}", uuid::Uuid::new_v4()));
        let store = FileStore::new(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(store.path_for("alice"), "not json at all").unwrap();
        assert!(matches!(
            store.load("alice"),
            Err(ConsoleError::CorruptedSave(_))
        ));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn file_store_scopes_keys_to_safe_names() {
        let store = FileStore::new("/tmp/games");
        assert_eq!(
            store.path_for("../etc/passwd"),
            PathBuf::from("/tmp/games/___etc_passwd.json")
        );
    }
}
