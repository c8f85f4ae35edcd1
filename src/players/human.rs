use std::cell::RefCell;
use std::rc::Rc;

use log::{info, warn};

use crate::console::MoveReply;
use crate::players::PlayerAgent;

/// Agent fed by move input from the local UI.
///
/// The console's request is parked until the user produces a move; the
/// request stays open after a rejection so the user can retry.
pub struct HumanAgent {
    name: String,
    pending: RefCell<Option<MoveReply>>,
}

impl HumanAgent {
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(HumanAgent {
            name: name.into(),
            pending: RefCell::new(None),
        })
    }

    /// True while the console is waiting on this agent.
    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Feeds a move from the UI into the pending request. Returns false if
    /// the console has not asked this agent to move.
    pub fn play(&self, notation: &str) -> bool {
        let reply = match self.pending.borrow().as_ref() {
            Some(reply) => reply.clone(),
            None => {
                warn!("{}: no move request pending", self.name);
                return false;
            }
        };
        reply.submit(notation);
        true
    }
}

impl PlayerAgent for HumanAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn move_request(&self, _fen: &str, reply: MoveReply) {
        info!("{} to move", self.name);
        *self.pending.borrow_mut() = Some(reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_without_a_request_is_refused() {
        let agent = HumanAgent::new("alice");
        assert!(!agent.has_pending());
        assert!(!agent.play("e4"));
    }
}
