//! Integration tests for the multiplayer game server components
//!
//! These tests validate cross-component interactions: protocol encoding,
//! full matches driven through the simulation, matchmaking into live
//! rooms, and tournaments played to completion.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use server::game::{GameEvent, MatchSim};
use server::persistence::InMemoryRepository;
use server::session::{SessionConfig, SessionManager};
use shared::protocol::{ClientEvent, ServerEvent};
use shared::{
    Difficulty, Direction, GameMode, GameSettings, GameStatus, Participant, Side, CANVAS_WIDTH,
};

fn human(id: &str) -> Participant {
    Participant::Human {
        id: id.to_string(),
        name: id.to_string(),
    }
}

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Every frame on the wire is `{"event": ..., "data": ...}` and
    /// survives a round-trip.
    #[test]
    fn client_event_roundtrip() {
        let events = vec![
            ClientEvent::Authenticate {
                token: "u1:alice".to_string(),
            },
            ClientEvent::QueueJoin {
                mode: GameMode::SinglePlayer,
                settings: Some(GameSettings::default()),
                difficulty: Some(Difficulty::Hard),
            },
            ClientEvent::GameMove {
                direction: Direction::Up,
            },
            ClientEvent::GameLeave {
                game_id: "game-1".to_string(),
            },
            ClientEvent::TournamentJoin {
                tournament_id: "tournament-1".to_string(),
            },
        ];

        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let value: Value = serde_json::from_str(&json).unwrap();
            assert!(value.get("event").is_some(), "missing tag in {}", json);

            let back: ClientEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }

    /// Snapshot payloads use the camelCase field names clients expect.
    #[test]
    fn snapshot_field_names() {
        let sim = MatchSim::with_serve(
            "game-1".to_string(),
            &human("u1"),
            &human("u2"),
            GameMode::Multiplayer,
            GameSettings::default(),
            Side::Left,
        );
        let event = ServerEvent::GameStateUpdate {
            state: sim.state().clone(),
        };
        let value: Value = serde_json::to_value(&event).unwrap();

        let state = &value["data"]["state"];
        assert_eq!(state["gameId"], "game-1");
        assert!(state["ball"]["velocityX"].is_number());
        assert!(state["players"][0]["isReady"].is_boolean());
        assert_eq!(state["isPaused"], Value::Bool(false));
    }
}

/// MATCH SIMULATION TESTS
mod match_tests {
    use super::*;

    /// With nobody touching a paddle the serve crosses the left edge
    /// every rally: the ball re-serves toward the conceding side, so the
    /// right player runs the score to 11 and the match terminates with
    /// exactly one end event.
    #[test]
    fn full_match_runs_to_completion() {
        let mut sim = MatchSim::with_serve(
            "game-1".to_string(),
            &human("u1"),
            &human("u2"),
            GameMode::Multiplayer,
            GameSettings::default(),
            Side::Left,
        );
        sim.start(0).unwrap();
        // Move the left paddle out of the serve's path.
        let mut now = 0;
        for _ in 0..60 {
            now += 16;
            sim.handle_input("u1", Direction::Up, now).unwrap();
            sim.step(now);
        }

        let mut score_events = 0;
        let mut end_events = 0;
        while !sim.is_finished() {
            now += 16;
            assert!(now < 600_000, "match never completed");
            for event in sim.step(now) {
                match event {
                    GameEvent::Score { scores, .. } => {
                        score_events += 1;
                        assert_eq!(scores[0], 0);
                        assert!(scores[1] <= 11);
                    }
                    GameEvent::Ended { winner_id, stats } => {
                        end_events += 1;
                        assert_eq!(winner_id, "u2");
                        assert_eq!(stats.score, [0, 11]);
                    }
                }
            }
        }

        assert_eq!(score_events, 11);
        assert_eq!(end_events, 1);
        assert_eq!(sim.status(), GameStatus::Completed);
    }

    /// Inputs and physics flow through a normally played rally.
    #[test]
    fn rally_moves_ball_and_paddles() {
        let mut sim = MatchSim::with_serve(
            "game-1".to_string(),
            &human("u1"),
            &human("u2"),
            GameMode::Multiplayer,
            GameSettings::default(),
            Side::Right,
        );
        sim.start(0).unwrap();

        let start_x = sim.state().ball.x;
        let start_y = sim.state().players[1].paddle.y;
        let mut now = 0;
        for _ in 0..30 {
            now += 16;
            sim.handle_input("u2", Direction::Up, now).unwrap();
            sim.step(now);
        }

        assert!(sim.state().ball.x > start_x);
        assert!(sim.state().players[1].paddle.y < start_y);
        assert_eq!(sim.status(), GameStatus::InProgress);
    }
}

/// MATCHMAKING AND SESSION TESTS
mod session_tests {
    use super::*;
    use server::persistence::GameRepository;

    struct TestClient {
        user_id: String,
        rx: mpsc::UnboundedReceiver<ServerEvent>,
    }

    impl TestClient {
        fn drain(&mut self) -> Vec<ServerEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.rx.try_recv() {
                events.push(event);
            }
            events
        }

        fn matched_game(&mut self) -> Option<String> {
            self.drain().into_iter().find_map(|e| match e {
                ServerEvent::QueueMatched { game_id, .. } => Some(game_id),
                _ => None,
            })
        }
    }

    fn connect(manager: &mut SessionManager, id: &str) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        manager.handle_connect(id, id, tx, 0);
        let mut client = TestClient {
            user_id: id.to_string(),
            rx,
        };
        client.drain();
        client
    }

    fn queue(manager: &mut SessionManager, id: &str, mode: GameMode) {
        manager.handle_event(
            id,
            ClientEvent::QueueJoin {
                mode,
                settings: None,
                difficulty: None,
            },
            0,
        );
    }

    /// Five multiplayer hopefuls produce two rooms and one waiter.
    #[tokio::test]
    async fn fifo_pairing_from_the_queue() {
        let repository = Arc::new(InMemoryRepository::new());
        let mut manager = SessionManager::new(repository, SessionConfig::default());

        let mut clients: Vec<TestClient> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|id| connect(&mut manager, id))
            .collect();
        for client in &clients {
            queue(&mut manager, &client.user_id, GameMode::Multiplayer);
        }

        assert_eq!(manager.room_count(), 2);
        let games: Vec<Option<String>> =
            clients.iter_mut().map(TestClient::matched_game).collect();
        assert_eq!(games[0], games[1]);
        assert_eq!(games[2], games[3]);
        assert_ne!(games[0], games[2]);
        assert!(games[4].is_none(), "odd player should still be queued");
    }

    /// A single-player match against the AI runs from queue join to a
    /// broadcast game over, driven purely by ticks.
    #[tokio::test]
    async fn single_player_match_against_ai_ends() {
        let repository = Arc::new(InMemoryRepository::new());
        let mut manager = SessionManager::new(repository.clone(), SessionConfig::default());
        let mut client = connect(&mut manager, "solo");

        manager.handle_event(
            "solo",
            ClientEvent::QueueJoin {
                mode: GameMode::SinglePlayer,
                settings: None,
                difficulty: Some(Difficulty::Easy),
            },
            0,
        );
        let game_id = client.matched_game().expect("no AI match");
        manager.handle_event("solo", ClientEvent::GameReady { game_id: game_id.clone() }, 0);
        client.drain();

        // Never touching a paddle, the rally decides itself eventually.
        let mut now = 0;
        let mut ended = false;
        for _ in 0..40_000 {
            now += 16;
            manager.handle_tick(now);
            if manager.room_count() == 0 {
                ended = true;
                break;
            }
        }
        assert!(ended, "match never reached a terminal state");

        let game_over = client
            .drain()
            .into_iter()
            .any(|e| matches!(e, ServerEvent::GameEnd { .. }));
        assert!(game_over);
        assert_eq!(repository.game_history("solo").len(), 1);
        // The AI leaves no record of its own.
        assert!(repository.user_stats(shared::AI_PLAYER_ID).is_none());
    }
}

/// TOURNAMENT TESTS
mod tournament_tests {
    use server::tournament::{AdvanceOutcome, BracketManager, TournamentPlayer};

    fn player(id: &str, ranking: u32) -> TournamentPlayer {
        TournamentPlayer {
            user_id: id.to_string(),
            username: id.to_string(),
            ranking,
        }
    }

    /// An eight-player bracket plays all seven matches; favorites win
    /// every time and the top seed takes the title.
    #[test]
    fn eight_player_bracket_to_champion() {
        let mut manager = BracketManager::new();
        manager
            .create_tournament("t1".to_string(), "open".to_string(), 8)
            .unwrap();
        for i in 1..=8 {
            manager
                .join("t1", player(&format!("u{}", i), i * 100))
                .unwrap();
        }

        let mut playable = manager.start_tournament("t1").unwrap();
        let mut champion = None;
        let mut matches_played = 0;

        while let Some(current) = playable.pop() {
            // Higher seed (slot 0) always wins.
            let winner = current.slots[0].clone().unwrap();
            matches_played += 1;
            match manager
                .advance_winner("t1", current.round, current.match_number, &winner, [11, 0])
                .unwrap()
            {
                AdvanceOutcome::Waiting => {}
                AdvanceOutcome::NextMatchReady(next) => playable.push(next),
                AdvanceOutcome::TournamentComplete { winner_id } => {
                    champion = Some(winner_id);
                }
            }
        }

        assert_eq!(matches_played, 7);
        assert_eq!(champion.as_deref(), Some("u8"));
    }
}

/// GEOMETRY SANITY TESTS
mod physics_tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use server::physics;

    /// A serve toward the right edge eventually leaves the canvas when
    /// nobody defends, and the out side is reported correctly.
    #[test]
    fn undefended_serve_goes_out() {
        let settings = GameSettings::default();
        let mut ball = shared::BallState::new(&settings, Side::Right);
        assert_approx_eq!(ball.x, CANVAS_WIDTH / 2.0);

        let mut steps = 0;
        while !physics::out_of_bounds(&ball) {
            physics::advance_ball(&mut ball, 1.0 / 60.0);
            steps += 1;
            assert!(steps < 600, "ball never left the canvas");
        }
        assert_eq!(physics::out_side(&ball), Side::Right);
    }
}
