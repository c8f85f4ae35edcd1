use std::cell::RefCell;
use std::rc::Rc;

use actix::prelude::*;
use log::{info, warn};

use crate::console::MoveReply;
use crate::game::utils::game_status;
use crate::models::{GameState, PlayedMove};
use crate::players::PlayerAgent;

/// Updates pushed from the hosting session to the remote end of the game.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub enum RemoteUpdate {
    /// It is the remote side's turn in the position `fen`.
    MoveRequest { fen: String },
    /// The hosting side played an accepted move.
    MoveDone {
        from: String,
        to: String,
        san: String,
        fen: String,
        status: String,
    },
    /// The remote side's proposal was rejected; it is still to move.
    IllegalMove { notation: String },
}

/// Agent bridging the opponent seat to another connected session.
///
/// Move requests are forwarded over an actix mailbox; the remote session
/// answers through [`RemoteAgent::play`]. A request issued before anyone has
/// joined is buffered and flushed on attach.
pub struct RemoteAgent {
    name: String,
    state: GameState,
    link: RefCell<Option<Recipient<RemoteUpdate>>>,
    queued_fen: RefCell<Option<String>>,
    pending: RefCell<Option<MoveReply>>,
}

impl RemoteAgent {
    pub fn new(name: impl Into<String>, state: GameState) -> Rc<Self> {
        Rc::new(RemoteAgent {
            name: name.into(),
            state,
            link: RefCell::new(None),
            queued_fen: RefCell::new(None),
            pending: RefCell::new(None),
        })
    }

    pub fn is_attached(&self) -> bool {
        self.link.borrow().is_some()
    }

    /// Links the remote session and flushes a buffered move request.
    pub fn attach(&self, link: Recipient<RemoteUpdate>) {
        *self.link.borrow_mut() = Some(link);
        let queued = self.queued_fen.borrow_mut().take();
        if let Some(fen) = queued {
            info!("{}: flushing buffered move request", self.name);
            self.push(RemoteUpdate::MoveRequest { fen });
        }
    }

    /// Feeds a move received from the remote session into the pending
    /// request. Returns false if it is not the remote side's turn.
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

    /// Tells the remote side its proposal was rejected.
    pub fn notify_illegal(&self, notation: &str) {
        self.push(RemoteUpdate::IllegalMove {
            notation: notation.to_string(),
        });
    }

    fn push(&self, update: RemoteUpdate) {
        if let Some(link) = self.link.borrow().as_ref() {
            link.do_send(update);
        }
    }
}

impl PlayerAgent for RemoteAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn move_request(&self, fen: &str, reply: MoveReply) {
        *self.pending.borrow_mut() = Some(reply);
        if self.is_attached() {
            self.push(RemoteUpdate::MoveRequest {
                fen: fen.to_string(),
            });
        } else {
            info!("{}: nobody connected yet, buffering move request", self.name);
            *self.queued_fen.borrow_mut() = Some(fen.to_string());
        }
    }

    fn move_done(&self, mv: &PlayedMove) {
        self.push(RemoteUpdate::MoveDone {
            from: mv.from.to_string(),
            to: mv.to.to_string(),
            san: mv.san.clone(),
            fen: self.state.fen(),
            status: game_status(&self.state),
        });
    }
}
