//! JSON event protocol carried over the persistent WebSocket connection.
//!
//! Frames are internally tagged so every message on the wire reads as
//! `{"event": "...", "data": {...}}`. The first client frame after the
//! socket opens must be `auth`; everything else is rejected until the
//! token has been resolved to a player identity.

use serde::{Deserialize, Serialize};

use crate::state::{Difficulty, Direction, GameMode, GameSettings, GameState};

/// Events a client may send to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "auth")]
    Authenticate { token: String },
    #[serde(rename = "queue:join")]
    QueueJoin {
        mode: GameMode,
        settings: Option<GameSettings>,
        difficulty: Option<Difficulty>,
    },
    #[serde(rename = "queue:leave")]
    QueueLeave,
    #[serde(rename = "game:join")]
    GameJoin { game_id: String },
    #[serde(rename = "game:ready")]
    GameReady { game_id: String },
    #[serde(rename = "game:move")]
    GameMove { direction: Direction },
    #[serde(rename = "game:pause")]
    GamePause { game_id: String },
    #[serde(rename = "game:resume")]
    GameResume { game_id: String },
    #[serde(rename = "game:leave")]
    GameLeave { game_id: String },
    #[serde(rename = "tournament:join")]
    TournamentJoin { tournament_id: String },
    #[serde(rename = "tournament:leave")]
    TournamentLeave { tournament_id: String },
}

/// Opponent summary delivered with a match notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentInfo {
    pub id: String,
    pub username: String,
    pub is_ai: bool,
}

/// Summary emitted exactly once when a match reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStats {
    pub winner_id: String,
    pub score: [u32; 2],
    pub duration_secs: u64,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub forfeited: bool,
}

/// Events the server may push to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "auth:ok")]
    Authenticated { user_id: String, username: String },
    #[serde(rename = "queue:joined")]
    QueueJoined { mode: GameMode, position: usize },
    #[serde(rename = "queue:left")]
    QueueLeft,
    #[serde(rename = "queue:matched")]
    QueueMatched {
        game_id: String,
        opponent: OpponentInfo,
    },
    #[serde(rename = "game:state")]
    GameStateUpdate { state: GameState },
    #[serde(rename = "game:score")]
    GameScore {
        player_index: usize,
        score: u32,
        scores: [u32; 2],
    },
    #[serde(rename = "game:start")]
    GameStart { game_id: String, timestamp_ms: u64 },
    #[serde(rename = "game:ready")]
    GameReadyAck { player_id: String, username: String },
    #[serde(rename = "game:paused")]
    GamePaused { paused_by: String },
    #[serde(rename = "game:resumed")]
    GameResumed,
    #[serde(rename = "game:end")]
    GameEnd { winner_id: String, stats: MatchStats },
    #[serde(rename = "player:online")]
    PlayerOnline { user_id: String, username: String },
    #[serde(rename = "player:offline")]
    PlayerOffline { user_id: String, username: String },
    #[serde(rename = "tournament:player-joined")]
    TournamentPlayerJoined {
        tournament_id: String,
        user_id: String,
        username: String,
    },
    #[serde(rename = "tournament:player-left")]
    TournamentPlayerLeft {
        tournament_id: String,
        user_id: String,
        username: String,
    },
    #[serde(rename = "tournament:complete")]
    TournamentComplete {
        tournament_id: String,
        winner_id: String,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GameMode, Participant, Side};

    #[test]
    fn test_client_event_wire_format() {
        let event = ClientEvent::QueueJoin {
            mode: GameMode::Multiplayer,
            settings: None,
            difficulty: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"queue:join\""));
        assert!(json.contains("\"MULTIPLAYER\""));

        let back: ClientEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_move_event_direction_encoding() {
        let json = r#"{"event":"game:move","data":{"direction":"up"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ClientEvent::GameMove {
                direction: crate::state::Direction::Up
            }
        );
    }

    #[test]
    fn test_server_event_roundtrip() {
        let events = vec![
            ServerEvent::QueueJoined {
                mode: GameMode::SinglePlayer,
                position: 1,
            },
            ServerEvent::GameScore {
                player_index: 1,
                score: 5,
                scores: [3, 5],
            },
            ServerEvent::GameEnd {
                winner_id: "u1".to_string(),
                stats: MatchStats {
                    winner_id: "u1".to_string(),
                    score: [11, 4],
                    duration_secs: 93,
                    started_at_ms: 1_000,
                    ended_at_ms: 94_000,
                    forfeited: false,
                },
            },
            ServerEvent::Error {
                message: "Game not found".to_string(),
            },
        ];

        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: ServerEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }

    #[test]
    fn test_game_state_snapshot_serializes_camel_case() {
        let state = crate::state::GameState::new(
            "g1".to_string(),
            &Participant::Human {
                id: "u1".to_string(),
                name: "alice".to_string(),
            },
            &Participant::Human {
                id: "u2".to_string(),
                name: "bob".to_string(),
            },
            crate::state::GameSettings::default(),
            Side::Right,
        );
        let event = ServerEvent::GameStateUpdate { state };
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"gameId\":\"g1\""));
        assert!(json.contains("\"velocityX\""));
        assert!(json.contains("\"isPaused\":false"));
    }

    #[test]
    fn test_malformed_event_is_rejected() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"event":"game:warp","data":{}}"#);
        assert!(result.is_err());
    }
}
