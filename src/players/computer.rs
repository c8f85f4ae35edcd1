use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use chess::{Board, ChessMove, MoveGen};
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::console::MoveReply;
use crate::players::PlayerAgent;

/// Automated agent playing a uniformly random legal move, after an optional
/// think delay.
pub struct ComputerAgent {
    name: String,
    delay: Duration,
}

impl ComputerAgent {
    pub fn new(name: impl Into<String>, delay: Duration) -> Rc<Self> {
        Rc::new(ComputerAgent {
            name: name.into(),
            delay,
        })
    }
}

fn choose_move(board: &Board) -> Option<ChessMove> {
    let moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();
    moves.choose(&mut thread_rng()).copied()
}

impl PlayerAgent for ComputerAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn move_request(&self, fen: &str, reply: MoveReply) {
        let board = match Board::from_str(fen) {
            Ok(board) => board,
            Err(err) => {
                warn!("{}: unreadable position {:?}: {}", self.name, fen, err);
                return;
            }
        };
        // The console never asks for a move in a finished game, so a
        // position without legal moves is unreachable here in practice.
        let mv = match choose_move(&board) {
            Some(mv) => mv,
            None => {
                warn!("{}: no legal moves in {:?}", self.name, fen);
                return;
            }
        };
        let notation = mv.to_string();
        info!("{} plays {}", self.name, notation);
        let delay = self.delay;
        actix_rt::spawn(async move {
            if !delay.is_zero() {
                actix_rt::time::sleep(delay).await;
            }
            reply.submit(&notation);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chooses_a_legal_move() {
        let board = Board::default();
        let mv = choose_move(&board).unwrap();
        assert!(board.legal(mv));
    }

    #[test]
    fn has_nothing_to_play_when_mated() {
        let board =
            Board::from_str("r1bqkbnr/pppp1Qpp/2n5/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4")
                .unwrap();
        assert!(choose_move(&board).is_none());
    }
}
