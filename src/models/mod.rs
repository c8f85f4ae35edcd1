pub mod app_state;
pub mod game_state;
pub mod messages;

pub use app_state::AppState;
pub use game_state::{GameState, PlayedMove};
pub use messages::{ChessSocketMessage, ClientMessage, LastMove, ServerMessage};
