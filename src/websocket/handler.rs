use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use actix::prelude::*;
use actix_web::web;
use actix_web_actors::ws;
use chess::{Color, Piece, Square};
use log::{info, warn};
use uuid::Uuid;

use crate::console::{ConsoleController, ConsoleEvent, EventKind};
use crate::game::utils::{color_to_string, game_status, parse_color};
use crate::models::{
    AppState, ChessSocketMessage, ClientMessage, GameState, LastMove, ServerMessage,
};
use crate::persistence::{GameStore, SavedGame};
use crate::players::{ComputerAgent, HumanAgent, PlayerAgent, RemoteAgent, RemoteUpdate};

/// A second session joins a hosted game.
#[derive(Message)]
#[rtype(result = "()")]
pub struct JoinGame {
    pub guest: Addr<ChessSocket>,
    pub guest_name: String,
}

/// A move proposed by the guest of a hosted game.
#[derive(Message)]
#[rtype(result = "()")]
pub struct GuestMove {
    pub notation: String,
}

/// WebSocket session for one browser connection.
///
/// A session normally hosts its own console (human against the computer,
/// restored from the store). With `create`/`join` it can instead host a
/// two-browser game — the host owns the console and a [`RemoteAgent`] in the
/// opponent seat, the guest is a thin forwarder.
pub struct ChessSocket {
    id: String,
    user: String,
    game_id: String,
    app_state: web::Data<AppState>,
    console: Option<ConsoleController>,
    human: Option<Rc<HumanAgent>>,
    remote: Option<Rc<RemoteAgent>>,
    /// Set when this session joined someone else's game.
    host: Option<Addr<ChessSocket>>,
    /// Set when a guest joined this session's game.
    guest: Option<Addr<ChessSocket>>,
}

impl ChessSocket {
    pub fn new(id: String, user: String, app_state: web::Data<AppState>) -> Self {
        ChessSocket {
            id,
            user,
            game_id: String::new(),
            app_state,
            console: None,
            human: None,
            remote: None,
            host: None,
            guest: None,
        }
    }
}

fn push(addr: &Addr<ChessSocket>, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(text) => addr.do_send(ChessSocketMessage(text)),
        Err(err) => warn!("failed to serialize message: {}", err),
    }
}

fn error_message(error: &str) -> ServerMessage {
    let mut message = ServerMessage::new("error");
    message.error = Some(error.to_string());
    message
}

/// King square of the side to move, when it is in check.
fn check_square(state: &GameState) -> Option<String> {
    if state.in_check() {
        state
            .pieces(Piece::King, state.turn())
            .first()
            .map(|square| square.to_string())
    } else {
        None
    }
}

impl Actor for ChessSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let addr = ctx.address();
        self.app_state
            .sessions
            .lock()
            .unwrap()
            .insert(self.id.clone(), addr);
        let total_sessions = self.app_state.sessions.lock().unwrap().len();
        info!("WebSocket connection started: {}", self.id);
        info!("Total active sessions: {}", total_sessions);

        self.start_solo(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.app_state.sessions.lock().unwrap().remove(&self.id);
        if !self.game_id.is_empty() {
            self.app_state.open_games.lock().unwrap().remove(&self.game_id);
        }
        if let Some(guest) = self.guest.take() {
            push(&guest, &ServerMessage::new("opponent_left"));
        }
        let total_sessions = self.app_state.sessions.lock().unwrap().len();
        info!("WebSocket connection closed: {}", self.id);
        info!("Total active sessions: {}", total_sessions);
        Running::Stop
    }
}

impl Handler<ChessSocketMessage> for ChessSocket {
    type Result = ();

    fn handle(&mut self, msg: ChessSocketMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<JoinGame> for ChessSocket {
    type Result = ();

    fn handle(&mut self, msg: JoinGame, _ctx: &mut Self::Context) {
        let (console, remote) = match (self.console.clone(), self.remote.clone()) {
            (Some(console), Some(remote)) => (console, remote),
            _ => {
                warn!("join request for {} but no hosted game here", self.id);
                push(&msg.guest, &error_message("Game not found"));
                return;
            }
        };
        if remote.is_attached() {
            push(&msg.guest, &error_message("Game is full"));
            return;
        }
        info!("{} joined game {}", msg.guest_name, self.game_id);
        self.app_state.open_games.lock().unwrap().remove(&self.game_id);
        self.guest = Some(msg.guest.clone());

        let state = console.state();
        let mut message = ServerMessage::new("joined");
        message.game_id = Some(self.game_id.clone());
        message.color = Some(color_to_string(!state.player_color()));
        message.fen = Some(state.fen());
        message.game_status = Some(game_status(&state));
        push(&msg.guest, &message);

        // Attach last so a buffered move request lands after the greeting.
        remote.attach(msg.guest.recipient());
    }
}

impl Handler<GuestMove> for ChessSocket {
    type Result = ();

    fn handle(&mut self, msg: GuestMove, _ctx: &mut Self::Context) {
        match &self.remote {
            Some(remote) if remote.play(&msg.notation) => {}
            _ => {
                warn!("guest move {:?} with no pending request", msg.notation);
                if let Some(guest) = &self.guest {
                    push(guest, &error_message("No move request pending"));
                }
            }
        }
    }
}

impl Handler<RemoteUpdate> for ChessSocket {
    type Result = ();

    fn handle(&mut self, msg: RemoteUpdate, ctx: &mut Self::Context) {
        let message = match msg {
            RemoteUpdate::MoveRequest { fen } => {
                let mut message = ServerMessage::new("move_request");
                message.fen = Some(fen);
                message
            }
            RemoteUpdate::MoveDone {
                from,
                to,
                san,
                fen,
                status,
            } => {
                let mut message = ServerMessage::new("move_made");
                message.fen = Some(fen);
                message.game_status = Some(status);
                message.last_move = Some(LastMove { from, to, san });
                message
            }
            RemoteUpdate::IllegalMove { notation } => {
                let mut message = ServerMessage::new("illegal_move");
                message.error = Some(format!("illegal move {:?}", notation));
                message
            }
        };
        self.send_message(ctx, &message);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChessSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => {
                self.handle_message(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                warn!("Binary messages are not supported");
                self.send_error(ctx, "Binary messages are not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Connection closed: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            _ => {
                ctx.stop();
            }
        }
    }
}

impl ChessSocket {
    fn send_message(&self, ctx: &mut ws::WebsocketContext<Self>, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(text) => ctx.text(text),
            Err(err) => warn!("failed to serialize message: {}", err),
        }
    }

    fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, error: &str) {
        self.send_message(ctx, &error_message(error));
    }

    fn handle_message(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => match msg.action.as_str() {
                "new_game" => self.handle_new_game(msg, ctx),
                "move" => self.handle_move(msg, ctx),
                "view" => self.handle_view(msg, ctx),
                "flip" => self.handle_flip(ctx),
                "get_moves" => self.handle_get_moves(msg, ctx),
                "state" => self.handle_state(ctx),
                "create" => self.handle_create(msg, ctx),
                "join" => self.handle_join(msg, ctx),
                other => {
                    info!("Unknown action: {}", other);
                    self.send_error(ctx, &format!("Unknown action: {}", other));
                }
            },
            Err(err) => {
                warn!("Error parsing message: {}", err);
                self.send_error(ctx, &format!("Invalid message format: {}", err));
            }
        }
    }

    /// Builds the default per-session console: the user against the
    /// computer, restored from the store when a saved game exists. Corrupted
    /// saved state is discarded wholesale and a fresh game starts.
    fn start_solo(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let human = HumanAgent::new(self.user.clone());
        let computer = ComputerAgent::new("Computer", Duration::from_millis(400));
        let console = ConsoleController::new(human.clone(), computer, Color::White);
        self.subscribe_console(&console, true, ctx);

        let store = &self.app_state.store;
        match store.load(&self.user) {
            Ok(Some(saved)) => {
                if let Err(err) = console.resume(&saved) {
                    warn!("discarding saved game for {}: {}", self.user, err);
                    if let Err(err) = store.clear(&self.user) {
                        warn!("failed to clear saved game for {}: {}", self.user, err);
                    }
                    console.start_game(Color::White);
                }
            }
            Ok(None) => console.start_game(Color::White),
            Err(err) => {
                warn!("discarding saved game for {}: {}", self.user, err);
                if let Err(err) = store.clear(&self.user) {
                    warn!("failed to clear saved game for {}: {}", self.user, err);
                }
                console.start_game(Color::White);
            }
        }

        self.human = Some(human);
        self.remote = None;
        self.host = None;
        self.guest = None;
        self.game_id = String::new();
        self.console = Some(console);
    }

    /// Bridges console notifications and observable properties to the
    /// browser, and (for solo games) to the store.
    fn subscribe_console(
        &self,
        console: &ConsoleController,
        persist: bool,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let addr = ctx.address();
        let state = console.state();
        let broker = console.broker();

        {
            let addr = addr.clone();
            let state = state.clone();
            broker.subscribe(EventKind::GameStarted, move |_| {
                let mut message = ServerMessage::new("game_started");
                message.fen = Some(state.fen());
                message.color = Some(color_to_string(state.player_color()));
                message.game_status = Some(game_status(&state));
                push(&addr, &message);
            });
        }
        {
            let addr = addr.clone();
            let state = state.clone();
            broker.subscribe(EventKind::Load, move |_| {
                let mut message = ServerMessage::new("game_loaded");
                message.fen = Some(state.fen());
                message.ply_count = Some(state.ply_count());
                message.color = Some(color_to_string(state.player_color()));
                message.game_status = Some(game_status(&state));
                push(&addr, &message);
            });
        }
        {
            let addr = addr.clone();
            let state = state.clone();
            broker.subscribe(EventKind::MoveRequest, move |event| {
                if let ConsoleEvent::MoveRequest { player } = event {
                    let mut message = ServerMessage::new("move_request");
                    message.to_move = Some(player.name().to_string());
                    message.fen = Some(state.fen());
                    message.game_status = Some(game_status(&state));
                    push(&addr, &message);
                }
            });
        }
        {
            let addr = addr.clone();
            let state = state.clone();
            broker.subscribe(EventKind::MoveDone, move |event| {
                if let ConsoleEvent::MoveDone { mv, .. } = event {
                    let mut message = ServerMessage::new("move_made");
                    message.fen = Some(state.fen());
                    message.ply_count = Some(state.ply_count());
                    message.last_move = Some(LastMove {
                        from: mv.from.to_string(),
                        to: mv.to.to_string(),
                        san: mv.san.clone(),
                    });
                    message.game_status = Some(game_status(&state));
                    message.check_square = check_square(&state);
                    push(&addr, &message);
                }
            });
        }
        {
            let addr = addr.clone();
            broker.subscribe(EventKind::IllegalMove, move |event| {
                if let ConsoleEvent::IllegalMove { player, notation } = event {
                    let mut message = ServerMessage::new("illegal_move");
                    message.to_move = Some(player.name().to_string());
                    message.error = Some(format!("illegal move {:?}", notation));
                    push(&addr, &message);
                }
            });
        }
        {
            let addr = addr.clone();
            let state = state.clone();
            broker.subscribe(EventKind::GameFinished, move |_| {
                let mut message = ServerMessage::new("game_over");
                message.fen = Some(state.fen());
                message.game_status = Some(game_status(&state));
                push(&addr, &message);
            });
        }

        {
            let addr = addr.clone();
            let viewed = state.clone();
            state.observe_ply_viewed(move |ply| {
                let mut message = ServerMessage::new("view");
                message.ply = Some(ply);
                message.ply_count = Some(viewed.ply_count());
                message.fen = viewed.fen_of_ply(ply);
                push(&addr, &message);
            });
        }
        {
            let addr = addr.clone();
            state.observe_orientation(move |orientation| {
                let mut message = ServerMessage::new("orientation");
                message.color = Some(color_to_string(orientation));
                push(&addr, &message);
            });
        }

        if persist {
            let app_state = self.app_state.clone();
            let user = self.user.clone();
            let state = state.clone();
            let save = move |_: &ConsoleEvent| {
                let saved = SavedGame::capture(&state);
                if let Err(err) = app_state.store.save(&user, &saved) {
                    warn!("failed to save game for {}: {}", user, err);
                }
            };
            broker.subscribe(EventKind::MoveDone, save.clone());
            broker.subscribe(EventKind::GameStarted, save);
        }
    }

    fn handle_new_game(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let color = msg
            .color_preference
            .as_deref()
            .and_then(parse_color)
            .unwrap_or(Color::White);
        match self.console.clone() {
            Some(console) => console.start_game(color),
            None => self.send_error(ctx, "Not hosting a game"),
        }
    }

    fn handle_move(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let notation = match msg.notation {
            Some(notation) => notation,
            None => {
                self.send_error(ctx, "Move requires notation");
                return;
            }
        };
        // As a guest, moves go to the hosting session.
        if let Some(host) = self.host.clone() {
            host.do_send(GuestMove { notation });
            return;
        }
        match &self.human {
            Some(human) if human.play(&notation) => {}
            _ => self.send_error(ctx, "No move request pending"),
        }
    }

    fn handle_view(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let console = match self.console.clone() {
            Some(console) => console,
            None => {
                self.send_error(ctx, "Not hosting a game");
                return;
            }
        };
        let state = console.state();
        let ply = msg.ply.unwrap_or_else(|| state.ply_count());
        state.set_ply_viewed(ply);
    }

    fn handle_flip(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let console = match self.console.clone() {
            Some(console) => console,
            None => {
                self.send_error(ctx, "Not hosting a game");
                return;
            }
        };
        let state = console.state();
        let orientation = state.orientation();
        state.set_orientation(!orientation);
    }

    fn handle_get_moves(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let console = match self.console.clone() {
            Some(console) => console,
            None => {
                self.send_error(ctx, "Not hosting a game");
                return;
            }
        };
        let square_str = match msg.square {
            Some(square) => square,
            None => {
                self.send_error(ctx, "Get moves requires a square");
                return;
            }
        };
        let square = match Square::from_str(&square_str.to_lowercase()) {
            Ok(square) => square,
            Err(_) => {
                self.send_error(ctx, &format!("Invalid square: {}", square_str));
                return;
            }
        };
        let state = console.state();
        let mut message = ServerMessage::new("available_moves");
        message.fen = Some(state.fen());
        message.available_moves = Some(
            state
                .legal_targets(square)
                .iter()
                .map(|target| target.to_string())
                .collect(),
        );
        self.send_message(ctx, &message);
    }

    fn handle_state(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let console = match self.console.clone() {
            Some(console) => console,
            None => {
                self.send_error(ctx, "Not hosting a game");
                return;
            }
        };
        let state = console.state();
        let mut message = ServerMessage::new("state");
        message.fen = Some(state.fen());
        message.ply = Some(state.ply_viewed());
        message.ply_count = Some(state.ply_count());
        message.color = Some(color_to_string(state.player_color()));
        message.game_status = Some(game_status(&state));
        message.check_square = check_square(&state);
        message.last_move = state.last_move().map(|mv| LastMove {
            from: mv.from.to_string(),
            to: mv.to.to_string(),
            san: mv.san,
        });
        self.send_message(ctx, &message);
    }

    /// Opens a two-browser game: this session hosts the console with a
    /// remote agent in the opponent seat and waits for someone to join.
    fn handle_create(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let color = msg
            .color_preference
            .as_deref()
            .and_then(parse_color)
            .unwrap_or(Color::White);
        let game_id = Uuid::new_v4().to_string();
        info!("Creating game {} hosted by {}", game_id, self.user);

        let human = HumanAgent::new(self.user.clone());
        let state = GameState::new();
        let remote = RemoteAgent::new("Opponent", state.clone());
        let console = ConsoleController::with_state(state, human.clone(), remote.clone(), color);
        // Remote games are not persisted: a replay cannot re-link the guest.
        self.subscribe_console(&console, false, ctx);
        {
            let remote = remote.clone();
            console.broker().subscribe(EventKind::IllegalMove, move |event| {
                if let ConsoleEvent::IllegalMove { player, notation } = event {
                    if Rc::as_ptr(player) as *const () == Rc::as_ptr(&remote) as *const () {
                        remote.notify_illegal(notation);
                    }
                }
            });
        }

        self.app_state
            .open_games
            .lock()
            .unwrap()
            .insert(game_id.clone(), ctx.address());
        self.game_id = game_id.clone();
        self.human = Some(human);
        self.remote = Some(remote);
        self.host = None;
        self.guest = None;
        self.console = Some(console.clone());

        let mut message = ServerMessage::new("game_created");
        message.game_id = Some(game_id);
        message.color = Some(color_to_string(color));
        message.fen = Some(console.state().fen());
        self.send_message(ctx, &message);

        console.start_game(color);
    }

    /// Joins a hosted game as the remote side. This session keeps no console
    /// of its own; it forwards moves to the host and renders its pushes.
    fn handle_join(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let game_id = match msg.game_id {
            Some(game_id) => game_id,
            None => {
                self.send_error(ctx, "No game ID provided");
                return;
            }
        };
        let host = self
            .app_state
            .open_games
            .lock()
            .unwrap()
            .get(&game_id)
            .cloned();
        match host {
            Some(host) => {
                info!("{} joining game {}", self.user, game_id);
                self.game_id = game_id;
                self.console = None;
                self.human = None;
                self.remote = None;
                self.guest = None;
                self.host = Some(host.clone());
                host.do_send(JoinGame {
                    guest: ctx.address(),
                    guest_name: self.user.clone(),
                });
            }
            None => {
                info!("Cannot join game: no open game with ID {}", game_id);
                self.send_error(ctx, "Game not found");
            }
        }
    }
}
