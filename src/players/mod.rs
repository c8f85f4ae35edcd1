mod computer;
mod human;
mod remote;

pub use computer::ComputerAgent;
pub use human::HumanAgent;
pub use remote::{RemoteAgent, RemoteUpdate};

use crate::console::MoveReply;
use crate::models::PlayedMove;

/// Capability contract for a move-producing player, human or automated.
///
/// Which concrete agents sit in the two seats is fixed when the session is
/// constructed and never switched at runtime.
pub trait PlayerAgent {
    /// Display name shown in the UI and the logs.
    fn name(&self) -> &str;

    /// Asks the agent for a move in the position `fen`. The agent must
    /// eventually submit a move through `reply` — or never answer, in which
    /// case the game simply waits.
    fn move_request(&self, fen: &str, reply: MoveReply);

    /// Tells the agent that the other side played `mv`.
    fn move_done(&self, _mv: &PlayedMove) {}
}
