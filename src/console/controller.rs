use std::cell::Cell;
use std::rc::{Rc, Weak};

use chess::Color;
use log::{error, info, warn};

use crate::console::{ConsoleEvent, MessageBroker};
use crate::error::ConsoleError;
use crate::game::utils::{color_to_string, game_status, parse_color};
use crate::models::GameState;
use crate::persistence::SavedGame;
use crate::players::PlayerAgent;

struct ControllerInner {
    state: GameState,
    broker: MessageBroker,
    player: Rc<dyn PlayerAgent>,
    opponent: Rc<dyn PlayerAgent>,
    awaiting_response: Cell<bool>,
    request_seq: Cell<u64>,
}

/// Reply handle handed to the agent whose move was requested. The agent
/// submits its move through it, possibly several times after rejections.
/// A reply that arrives after its request was resolved is dropped.
#[derive(Clone)]
pub struct MoveReply {
    controller: Weak<ControllerInner>,
    seq: u64,
}

impl MoveReply {
    pub fn submit(&self, notation: &str) {
        let inner = match self.controller.upgrade() {
            Some(inner) => inner,
            None => {
                warn!("dropping move {:?}: console is gone", notation);
                return;
            }
        };
        if self.seq != inner.request_seq.get() {
            warn!("dropping stale move {:?}: request already resolved", notation);
            return;
        }
        ConsoleController { inner }.move_response(notation);
    }
}

/// Identity of the two fixed agents is pointer identity of their handles.
fn same_agent(a: &Rc<dyn PlayerAgent>, b: &Rc<dyn PlayerAgent>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

/// The turn-coordination state machine.
///
/// Owns the game state, the notification bus and the two player agents for
/// the lifetime of a session. Drives the request → validate → apply → notify
/// loop: exactly one move request is outstanding at any time, illegal moves
/// are published and keep the turn with the same agent, and the loop halts
/// when the rules engine reports the game over.
#[derive(Clone)]
pub struct ConsoleController {
    inner: Rc<ControllerInner>,
}

impl ConsoleController {
    /// `player` is the local player, `opponent` the other seat;
    /// `player_color` maps them onto white/black.
    pub fn new(
        player: Rc<dyn PlayerAgent>,
        opponent: Rc<dyn PlayerAgent>,
        player_color: Color,
    ) -> Self {
        Self::with_state(GameState::new(), player, opponent, player_color)
    }

    pub fn with_state(
        state: GameState,
        player: Rc<dyn PlayerAgent>,
        opponent: Rc<dyn PlayerAgent>,
        player_color: Color,
    ) -> Self {
        state.set_player_color(player_color);
        state.set_orientation(player_color);
        ConsoleController {
            inner: Rc::new(ControllerInner {
                state,
                broker: MessageBroker::new(),
                player,
                opponent,
                awaiting_response: Cell::new(false),
                request_seq: Cell::new(0),
            }),
        }
    }

    pub fn state(&self) -> GameState {
        self.inner.state.clone()
    }

    pub fn broker(&self) -> &MessageBroker {
        &self.inner.broker
    }

    pub fn player(&self) -> Rc<dyn PlayerAgent> {
        self.inner.player.clone()
    }

    pub fn opponent(&self) -> Rc<dyn PlayerAgent> {
        self.inner.opponent.clone()
    }

    /// The agent playing white.
    pub fn player_white(&self) -> Rc<dyn PlayerAgent> {
        if self.inner.state.player_color() == Color::White {
            self.inner.player.clone()
        } else {
            self.inner.opponent.clone()
        }
    }

    /// The agent playing black.
    pub fn player_black(&self) -> Rc<dyn PlayerAgent> {
        if self.inner.state.player_color() == Color::Black {
            self.inner.player.clone()
        } else {
            self.inner.opponent.clone()
        }
    }

    /// The agent whose color is to move in the authoritative position.
    pub fn player_to_move(&self) -> Rc<dyn PlayerAgent> {
        match self.inner.state.turn() {
            Color::White => self.player_white(),
            Color::Black => self.player_black(),
        }
    }

    /// The other of the two fixed agents. An agent that is not part of this
    /// session is a programmer error: it is logged and yields `None`.
    pub fn opponent_of(&self, agent: &Rc<dyn PlayerAgent>) -> Option<Rc<dyn PlayerAgent>> {
        if same_agent(agent, &self.inner.player) {
            Some(self.inner.opponent.clone())
        } else if same_agent(agent, &self.inner.opponent) {
            Some(self.inner.player.clone())
        } else {
            error!("agent {:?} is not part of this game", agent.name());
            None
        }
    }

    /// True while a move request is outstanding.
    pub fn awaiting_response(&self) -> bool {
        self.inner.awaiting_response.get()
    }

    /// Resets the state, assigns the local player color and kicks off the
    /// first move request.
    pub fn start_game(&self, player_color: Color) {
        info!("starting new game, local player is {}", color_to_string(player_color));
        let state = &self.inner.state;
        state.reset();
        state.set_player_color(player_color);
        state.set_orientation(player_color);
        state.set_game_started(true);
        self.inner.awaiting_response.set(false);
        self.inner.broker.publish(&ConsoleEvent::GameStarted);
        self.next_move();
    }

    /// Replays a saved game into a fresh state and resumes play from there.
    /// Any replay failure leaves the caller to fall back to `start_game`.
    pub fn resume(&self, saved: &SavedGame) -> Result<(), ConsoleError> {
        let player_color = parse_color(&saved.player_color).ok_or_else(|| {
            ConsoleError::CorruptedSave(format!("unknown color {:?}", saved.player_color))
        })?;
        let state = &self.inner.state;
        state.reset();
        state.set_player_color(player_color);
        state.set_orientation(player_color);
        for notation in &saved.moves {
            state.play(notation).map_err(|err| {
                ConsoleError::CorruptedSave(format!("replay failed at {:?}: {}", notation, err))
            })?;
        }
        state.set_ply_viewed(state.ply_count());
        state.set_game_started(true);
        if state.game_over() {
            state.set_game_finished(true);
        }
        info!("resumed game at ply {}", state.ply_count());
        self.inner.awaiting_response.set(false);
        self.inner.broker.publish(&ConsoleEvent::Load);
        self.next_move();
        Ok(())
    }

    /// Publishes a `MoveRequest` for the agent to move, then dispatches
    /// `move_request` to it through a scheduler yield. The yield decouples
    /// move generation from move application even for agents that answer
    /// instantly, so an accepted move never re-enters the controller on the
    /// requesting call stack.
    pub fn next_move(&self) {
        let state = &self.inner.state;
        if state.game_finished() || state.game_over() {
            return;
        }
        if self.inner.awaiting_response.get() {
            warn!("move request already outstanding, not issuing another");
            return;
        }
        self.inner.awaiting_response.set(true);
        let seq = self.inner.request_seq.get() + 1;
        self.inner.request_seq.set(seq);
        let agent = self.player_to_move();
        info!("requesting move from {}", agent.name());
        self.inner
            .broker
            .publish(&ConsoleEvent::MoveRequest { player: agent.clone() });
        let fen = state.fen();
        let reply = MoveReply {
            controller: Rc::downgrade(&self.inner),
            seq,
        };
        actix_rt::spawn(async move {
            agent.move_request(&fen, reply);
        });
    }

    /// Attempts to apply a move proposed by the agent to move. Rejection
    /// publishes `IllegalMove` and leaves the turn with the same agent;
    /// acceptance notifies the other agent, publishes `MoveDone`, and either
    /// requests the next move or halts on game over.
    pub fn move_response(&self, notation: &str) {
        if !self.inner.awaiting_response.get() {
            warn!("ignoring move {:?}: no move request outstanding", notation);
            return;
        }
        let state = &self.inner.state;
        let mover = self.player_to_move();
        let was_tracking = state.ply_viewed() == state.ply_count();
        let played = match state.play(notation) {
            Ok(played) => played,
            Err(err) => {
                info!("illegal move from {}: {}", mover.name(), err);
                self.inner.broker.publish(&ConsoleEvent::IllegalMove {
                    player: mover,
                    notation: notation.trim().to_string(),
                });
                return;
            }
        };
        // Follow live play only if the view was on the last ply already.
        if was_tracking {
            state.set_ply_viewed(state.ply_count());
        }
        self.inner.awaiting_response.set(false);
        let other = match self.opponent_of(&mover) {
            Some(other) => other,
            None => return,
        };
        other.move_done(&played);
        self.inner.broker.publish(&ConsoleEvent::MoveDone {
            player: other,
            mv: played,
        });
        if state.game_over() {
            info!("game over: {}", game_status(state));
            state.set_game_finished(true);
            self.inner.broker.publish(&ConsoleEvent::GameFinished);
        } else {
            self.next_move();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::HumanAgent;

    #[test]
    fn color_mapping_follows_player_color() {
        let alice = HumanAgent::new("alice");
        let bob = HumanAgent::new("bob");
        let console = ConsoleController::new(alice.clone(), bob.clone(), Color::White);
        assert_eq!(console.player_white().name(), "alice");
        assert_eq!(console.player_black().name(), "bob");
        assert_eq!(console.player_to_move().name(), "alice");

        let console = ConsoleController::new(alice, bob, Color::Black);
        assert_eq!(console.player_white().name(), "bob");
        assert_eq!(console.player_black().name(), "alice");
        assert_eq!(console.player_to_move().name(), "bob");
    }

    #[test]
    fn opponent_of_rejects_foreign_agents() {
        let alice = HumanAgent::new("alice");
        let bob = HumanAgent::new("bob");
        let console = ConsoleController::new(alice, bob, Color::White);
        let player = console.player();
        let opponent = console.opponent();
        assert_eq!(console.opponent_of(&player).unwrap().name(), "bob");
        assert_eq!(console.opponent_of(&opponent).unwrap().name(), "alice");

        let stranger: Rc<dyn PlayerAgent> = HumanAgent::new("mallory");
        assert!(console.opponent_of(&stranger).is_none());
    }
}
