use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use chess::{Board, ChessMove, Color, Game, GameResult, MoveGen, Piece, Square};
use log::debug;

use crate::error::ConsoleError;

/// A played half-move: source and destination squares plus the notation the
/// move was accepted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub from: Square,
    pub to: Square,
    pub san: String,
}

type Observer<T> = Rc<dyn Fn(T)>;

#[derive(Default)]
struct Observers {
    ply_viewed: RefCell<Vec<Observer<usize>>>,
    orientation: RefCell<Vec<Observer<Color>>>,
    player_color: RefCell<Vec<Observer<Color>>>,
}

fn notify<T: Copy>(observers: &RefCell<Vec<Observer<T>>>, value: T) {
    // Clone the list first so a handler may register further observers.
    let handlers: Vec<Observer<T>> = observers.borrow().clone();
    for handler in handlers {
        handler(value);
    }
}

struct StateInner {
    game: Game,
    /// FEN after each ply; index 0 is the starting position.
    fens: Vec<String>,
    history: Vec<PlayedMove>,
    ply_viewed: usize,
    orientation: Color,
    player_color: Color,
    game_started: bool,
    game_finished: bool,
}

/// State of one console session: the authoritative rules-engine handle plus
/// the view cursor (which ply is displayed, board orientation, which color
/// the local player controls).
///
/// The handle is cheap to clone and shares the underlying state; each session
/// lives on a single thread. `ply_viewed`, `orientation` and `player_color`
/// are observable: every assignment through the setter notifies the
/// registered observers, whether or not the value changed.
#[derive(Clone)]
pub struct GameState {
    inner: Rc<RefCell<StateInner>>,
    observers: Rc<Observers>,
}

impl GameState {
    /// A fresh game from the standard starting position.
    pub fn new() -> Self {
        Self::with_game(Game::new())
    }

    /// A game starting from an arbitrary FEN.
    pub fn from_fen(fen: &str) -> Result<Self, ConsoleError> {
        let board = Board::from_str(fen)
            .map_err(|err| ConsoleError::InvalidPosition(format!("{}: {}", fen, err)))?;
        Ok(Self::with_game(Game::new_with_board(board)))
    }

    fn with_game(game: Game) -> Self {
        let fen = game.current_position().to_string();
        GameState {
            inner: Rc::new(RefCell::new(StateInner {
                game,
                fens: vec![fen],
                history: Vec::new(),
                ply_viewed: 0,
                orientation: Color::White,
                player_color: Color::White,
                game_started: false,
                game_finished: false,
            })),
            observers: Rc::new(Observers::default()),
        }
    }

    /// Throws away the game and starts over from the standard starting
    /// position. Observers stay registered.
    pub fn reset(&self) {
        {
            let mut s = self.inner.borrow_mut();
            s.game = Game::new();
            let fen = s.game.current_position().to_string();
            s.fens = vec![fen];
            s.history.clear();
            s.ply_viewed = 0;
            s.game_started = false;
            s.game_finished = false;
        }
        notify(&self.observers.ply_viewed, 0);
    }

    /// Applies `notation` (SAN, or a coordinate pair like `e2e4`) to the
    /// authoritative position. On success the move is recorded in the
    /// history; threefold-repetition and fifty-move draws are declared
    /// automatically so `game_over` matches the rules engine's view.
    pub fn play(&self, notation: &str) -> Result<PlayedMove, ConsoleError> {
        let notation = notation.trim();
        let mut s = self.inner.borrow_mut();
        if s.game.result().is_some() {
            return Err(ConsoleError::IllegalMove(notation.to_string()));
        }
        let board = s.game.current_position();
        let mv = match ChessMove::from_san(&board, notation) {
            Ok(mv) => mv,
            Err(_) => match parse_coordinate(notation) {
                Some(mv) if board.legal(mv) => mv,
                _ => return Err(ConsoleError::IllegalMove(notation.to_string())),
            },
        };
        if !s.game.make_move(mv) {
            return Err(ConsoleError::IllegalMove(notation.to_string()));
        }
        if s.game.can_declare_draw() {
            s.game.declare_draw();
        }
        let played = PlayedMove {
            from: mv.get_source(),
            to: mv.get_dest(),
            san: notation.to_string(),
        };
        let fen = s.game.current_position().to_string();
        s.fens.push(fen);
        s.history.push(played.clone());
        debug!("played {} ({} plies)", played.san, s.history.len());
        Ok(played)
    }

    /// FEN of the authoritative current position.
    pub fn fen(&self) -> String {
        self.inner.borrow().game.current_position().to_string()
    }

    /// FEN at half-move `ply` of the history, 0 being the starting position.
    /// `None` outside `[0, ply_count]`. Never mutates the authoritative game.
    pub fn fen_of_ply(&self, ply: usize) -> Option<String> {
        self.inner.borrow().fens.get(ply).cloned()
    }

    /// Number of played half-moves.
    pub fn ply_count(&self) -> usize {
        self.inner.borrow().history.len()
    }

    /// The most recently played move, if any.
    pub fn last_move(&self) -> Option<PlayedMove> {
        self.inner.borrow().history.last().cloned()
    }

    pub fn history(&self) -> Vec<PlayedMove> {
        self.inner.borrow().history.clone()
    }

    /// The color to move in the authoritative position.
    pub fn turn(&self) -> Color {
        self.inner.borrow().game.side_to_move()
    }

    pub fn result(&self) -> Option<GameResult> {
        self.inner.borrow().game.result()
    }

    pub fn game_over(&self) -> bool {
        self.result().is_some()
    }

    pub fn in_check(&self) -> bool {
        self.inner.borrow().game.current_position().checkers().popcnt() > 0
    }

    /// Locations of all pieces matching the type/color filter. Read-only;
    /// the board component uses this to find the king for check marking.
    pub fn pieces(&self, piece: Piece, color: Color) -> Vec<Square> {
        let s = self.inner.borrow();
        let board = s.game.current_position();
        let mask = *board.pieces(piece) & *board.color_combined(color);
        mask.collect()
    }

    /// Destination squares of the legal moves starting on `from`.
    pub fn legal_targets(&self, from: Square) -> Vec<Square> {
        let s = self.inner.borrow();
        let board = s.game.current_position();
        MoveGen::new_legal(&board)
            .filter(|mv| mv.get_source() == from)
            .map(|mv| mv.get_dest())
            .collect()
    }

    pub fn ply_viewed(&self) -> usize {
        self.inner.borrow().ply_viewed
    }

    /// Moves the view cursor. The value is clamped into `[0, ply_count]`;
    /// observers are notified on every call.
    pub fn set_ply_viewed(&self, ply: usize) {
        let clamped = {
            let mut s = self.inner.borrow_mut();
            let v = ply.min(s.history.len());
            s.ply_viewed = v;
            v
        };
        notify(&self.observers.ply_viewed, clamped);
    }

    pub fn observe_ply_viewed(&self, observer: impl Fn(usize) + 'static) {
        self.observers.ply_viewed.borrow_mut().push(Rc::new(observer));
    }

    pub fn orientation(&self) -> Color {
        self.inner.borrow().orientation
    }

    /// Which side is shown at the bottom of the board.
    pub fn set_orientation(&self, orientation: Color) {
        self.inner.borrow_mut().orientation = orientation;
        notify(&self.observers.orientation, orientation);
    }

    pub fn observe_orientation(&self, observer: impl Fn(Color) + 'static) {
        self.observers.orientation.borrow_mut().push(Rc::new(observer));
    }

    pub fn player_color(&self) -> Color {
        self.inner.borrow().player_color
    }

    /// Which color the local player controls.
    pub fn set_player_color(&self, color: Color) {
        self.inner.borrow_mut().player_color = color;
        notify(&self.observers.player_color, color);
    }

    pub fn observe_player_color(&self, observer: impl Fn(Color) + 'static) {
        self.observers.player_color.borrow_mut().push(Rc::new(observer));
    }

    pub fn game_started(&self) -> bool {
        self.inner.borrow().game_started
    }

    pub fn set_game_started(&self, started: bool) {
        self.inner.borrow_mut().game_started = started;
    }

    pub fn game_finished(&self) -> bool {
        self.inner.borrow().game_finished
    }

    pub fn set_game_finished(&self, finished: bool) {
        self.inner.borrow_mut().game_finished = finished;
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses coordinate notation like `e2e4` or `e7e8q`.
fn parse_coordinate(notation: &str) -> Option<ChessMove> {
    if !notation.is_ascii() || notation.len() < 4 || notation.len() > 5 {
        return None;
    }
    let from = Square::from_str(&notation[0..2]).ok()?;
    let to = Square::from_str(&notation[2..4]).ok()?;
    let promotion = match notation.as_bytes().get(4) {
        None => None,
        Some(b'q') | Some(b'Q') => Some(Piece::Queen),
        Some(b'r') | Some(b'R') => Some(Piece::Rook),
        Some(b'b') | Some(b'B') => Some(Piece::Bishop),
        Some(b'n') | Some(b'N') => Some(Piece::Knight),
        Some(_) => return None,
    };
    Some(ChessMove::new(from, to, promotion))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn fresh_state() {
        let state = GameState::new();
        assert_eq!(state.ply_count(), 0);
        assert_eq!(state.ply_viewed(), 0);
        assert_eq!(state.fen(), START_FEN);
        assert_eq!(state.fen_of_ply(0), Some(START_FEN.to_string()));
        assert!(state.last_move().is_none());
        assert_eq!(state.turn(), Color::White);
        assert!(!state.game_over());
    }

    #[test]
    fn play_records_history_and_fens() {
        let state = GameState::new();
        let played = state.play("e4").unwrap();
        assert_eq!(played.from, Square::E2);
        assert_eq!(played.to, Square::E4);
        assert_eq!(played.san, "e4");
        assert_eq!(state.ply_count(), 1);
        assert_eq!(state.turn(), Color::Black);
        assert_eq!(state.fen_of_ply(0), Some(START_FEN.to_string()));
        assert!(state.fen_of_ply(1).is_some());
        assert!(state.fen_of_ply(2).is_none());
        assert_eq!(state.last_move().unwrap().san, "e4");
    }

    #[test]
    fn play_accepts_coordinate_notation() {
        let state = GameState::new();
        let played = state.play("e2e4").unwrap();
        assert_eq!(played.from, Square::E2);
        assert_eq!(played.to, Square::E4);
        assert_eq!(state.ply_count(), 1);
    }

    #[test]
    fn illegal_moves_leave_the_position_alone() {
        let state = GameState::new();
        let fen = state.fen();
        assert!(state.play("e5").is_err());
        assert!(state.play("e2e5").is_err());
        assert!(state.play("not a move").is_err());
        assert_eq!(state.ply_count(), 0);
        assert_eq!(state.fen(), fen);
    }

    #[test]
    fn from_fen_loads_a_position() {
        // Scholar's mate delivered; black to move and checkmated.
        let state = GameState::from_fen(
            "r1bqkbnr/pppp1Qpp/2n5/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4",
        )
        .unwrap();
        assert!(state.game_over());
        assert!(state.in_check());
        assert!(GameState::from_fen("definitely not a fen").is_err());
    }

    #[test]
    fn ply_viewed_is_clamped_into_range() {
        let state = GameState::new();
        state.set_ply_viewed(7);
        assert_eq!(state.ply_viewed(), 0);
        state.play("e4").unwrap();
        state.play("e5").unwrap();
        state.set_ply_viewed(7);
        assert_eq!(state.ply_viewed(), 2);
        state.set_ply_viewed(1);
        assert_eq!(state.ply_viewed(), 1);
    }

    #[test]
    fn setters_notify_observers_on_every_assignment() {
        let state = GameState::new();
        let seen = Rc::new(Cell::new(usize::MAX));
        let calls = Rc::new(Cell::new(0));
        {
            let seen = seen.clone();
            let calls = calls.clone();
            state.observe_ply_viewed(move |ply| {
                seen.set(ply);
                calls.set(calls.get() + 1);
            });
        }
        state.set_ply_viewed(3);
        assert_eq!(seen.get(), 0); // clamped
        assert_eq!(calls.get(), 1);
        state.set_ply_viewed(0); // same value, still notifies
        assert_eq!(calls.get(), 2);

        let flipped = Rc::new(Cell::new(Color::White));
        {
            let flipped = flipped.clone();
            state.observe_orientation(move |color| flipped.set(color));
        }
        state.set_orientation(Color::Black);
        assert_eq!(flipped.get(), Color::Black);

        let color = Rc::new(Cell::new(Color::White));
        {
            let color = color.clone();
            state.observe_player_color(move |c| color.set(c));
        }
        state.set_player_color(Color::Black);
        assert_eq!(color.get(), Color::Black);
    }

    #[test]
    fn pieces_finds_the_king() {
        let state = GameState::new();
        assert_eq!(state.pieces(Piece::King, Color::White), vec![Square::E1]);
        assert_eq!(state.pieces(Piece::King, Color::Black), vec![Square::E8]);
        assert_eq!(state.pieces(Piece::Pawn, Color::White).len(), 8);
    }

    #[test]
    fn legal_targets_from_a_square() {
        let state = GameState::new();
        let mut targets = state.legal_targets(Square::E2);
        targets.sort_by_key(|square| square.to_index());
        assert_eq!(targets, vec![Square::E3, Square::E4]);
        assert!(state.legal_targets(Square::E5).is_empty());
    }

    #[test]
    fn reset_clears_history_but_keeps_observers() {
        let state = GameState::new();
        let calls = Rc::new(Cell::new(0));
        {
            let calls = calls.clone();
            state.observe_ply_viewed(move |_| calls.set(calls.get() + 1));
        }
        state.play("e4").unwrap();
        state.set_ply_viewed(1);
        state.reset();
        assert_eq!(state.ply_count(), 0);
        assert_eq!(state.ply_viewed(), 0);
        assert_eq!(state.fen(), START_FEN);
        // one notification from the set, one from the reset
        assert_eq!(calls.get(), 2);
    }
}
