//! Session restore: saved games replay into the console, corrupted state is
//! discarded wholesale.

use std::time::Duration;

use chess::Color;
use chess_console::console::ConsoleController;
use chess_console::persistence::{GameStore, MemoryStore, SavedGame};
use chess_console::players::{HumanAgent, PlayerAgent};

async fn settle() {
    actix_rt::time::sleep(Duration::from_millis(25)).await;
}

#[actix_rt::test]
async fn resume_replays_saved_history_and_requests_the_next_move() {
    let saved = SavedGame {
        player_color: "white".to_string(),
        moves: vec!["e4".to_string(), "e5".to_string()],
    };
    let human = HumanAgent::new("alice");
    let opponent = HumanAgent::new("bob");
    let console = ConsoleController::new(human.clone(), opponent, Color::White);
    console.resume(&saved).unwrap();
    settle().await;

    let state = console.state();
    assert_eq!(state.ply_count(), 2);
    assert_eq!(state.ply_viewed(), 2);
    assert_eq!(state.turn(), Color::White);
    assert!(state.game_started());
    assert!(!state.game_finished());
    assert!(human.has_pending()); // white to move again
}

#[actix_rt::test]
async fn resume_restores_the_saved_color_assignment() {
    let saved = SavedGame {
        player_color: "black".to_string(),
        moves: vec!["d4".to_string()],
    };
    let human = HumanAgent::new("alice");
    let opponent = HumanAgent::new("bob");
    let console = ConsoleController::new(human.clone(), opponent, Color::White);
    console.resume(&saved).unwrap();
    settle().await;

    let state = console.state();
    assert_eq!(state.player_color(), Color::Black);
    assert_eq!(state.orientation(), Color::Black);
    assert_eq!(console.player_white().name(), "bob");
    assert!(human.has_pending()); // black to move after 1. d4
}

#[actix_rt::test]
async fn corrupted_history_fails_resume_and_a_fresh_game_recovers() {
    let saved = SavedGame {
        player_color: "white".to_string(),
        moves: vec!["e4".to_string(), "Ke4".to_string()],
    };
    let human = HumanAgent::new("alice");
    let opponent = HumanAgent::new("bob");
    let console = ConsoleController::new(human, opponent, Color::White);
    assert!(console.resume(&saved).is_err());

    // the shell's recovery path: discard everything, start over as white
    console.start_game(Color::White);
    settle().await;
    let state = console.state();
    assert_eq!(state.ply_count(), 0);
    assert_eq!(state.player_color(), Color::White);
    assert!(state.game_started());
}

#[actix_rt::test]
async fn unknown_color_fails_resume() {
    let saved = SavedGame {
        player_color: "green".to_string(),
        moves: vec![],
    };
    let human = HumanAgent::new("alice");
    let opponent = HumanAgent::new("bob");
    let console = ConsoleController::new(human, opponent, Color::White);
    assert!(console.resume(&saved).is_err());
}

#[actix_rt::test]
async fn capture_and_resume_round_trip_through_a_store() {
    let store = MemoryStore::new();
    {
        let human = HumanAgent::new("alice");
        let opponent = HumanAgent::new("bob");
        let console = ConsoleController::new(human.clone(), opponent, Color::White);
        console.start_game(Color::White);
        settle().await;
        assert!(human.play("e4"));
        settle().await;
        store
            .save("alice", &SavedGame::capture(&console.state()))
            .unwrap();
    }

    let saved = store.load("alice").unwrap().unwrap();
    let human = HumanAgent::new("alice");
    let opponent = HumanAgent::new("bob");
    let console = ConsoleController::new(human, opponent, Color::White);
    console.resume(&saved).unwrap();
    settle().await;
    assert_eq!(console.state().ply_count(), 1);
    assert_eq!(console.state().last_move().unwrap().san, "e4");
}
