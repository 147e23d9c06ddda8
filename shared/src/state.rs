//! Serializable game state owned by the server simulation.
//!
//! The server mutates these structures once per tick and broadcasts them
//! verbatim; clients treat them as read-only snapshots.

use serde::{Deserialize, Serialize};

use crate::{
    AI_PLAYER_ID, AI_PLAYER_NAME, BALL_INITIAL_SPEED, BALL_RADIUS, CANVAS_HEIGHT, CANVAS_WIDTH,
    DEFAULT_MAX_SCORE, PADDLE_HEIGHT, PADDLE_OFFSET, PADDLE_SPEED, PADDLE_WIDTH, VALID_MAX_SCORES,
};

/// Which half of the playfield a paddle defends. Left is player index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn from_index(index: usize) -> Option<Side> {
        match index {
            0 => Some(Side::Left),
            1 => Some(Side::Right),
            _ => None,
        }
    }
}

/// Vertical movement command for a paddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    SinglePlayer,
    Multiplayer,
    Tournament,
}

/// AI opponent skill tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Match lifecycle. `Abandoned` is terminal and reachable from any
/// non-terminal state via forfeit before the match started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Waiting,
    InProgress,
    Paused,
    Completed,
    Abandoned,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Abandoned)
    }
}

/// One of the two match participants. Single-player rooms pair a human
/// with an `Ai` participant instead of carrying a nullable second id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Participant {
    Human { id: String, name: String },
    Ai { difficulty: Difficulty },
}

impl Participant {
    pub fn id(&self) -> &str {
        match self {
            Participant::Human { id, .. } => id,
            Participant::Ai { .. } => AI_PLAYER_ID,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Participant::Human { name, .. } => name,
            Participant::Ai { .. } => AI_PLAYER_NAME,
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, Participant::Ai { .. })
    }
}

/// Immutable settings snapshot a match is created with.
///
/// Speed and size knobs use a 1..=5 scale mapped through fixed multiplier
/// tables; 3 is the neutral setting for speeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    pub ball_speed: u8,
    pub ball_size: u8,
    pub paddle_speed: u8,
    pub paddle_size: u8,
    pub max_score: u32,
    pub power_ups_enabled: bool,
    pub theme: String,
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            ball_speed: 3,
            ball_size: 1,
            paddle_speed: 3,
            paddle_size: 1,
            max_score: DEFAULT_MAX_SCORE,
            power_ups_enabled: false,
            theme: "classic".to_string(),
        }
    }
}

impl GameSettings {
    pub fn ball_speed_multiplier(&self) -> f32 {
        scale_lookup(self.ball_speed, [0.6, 0.8, 1.0, 1.2, 1.4])
    }

    pub fn ball_size_multiplier(&self) -> f32 {
        scale_lookup(self.ball_size, [0.8, 0.9, 1.0, 1.1, 1.2])
    }

    pub fn paddle_speed_multiplier(&self) -> f32 {
        scale_lookup(self.paddle_speed, [0.7, 0.85, 1.0, 1.15, 1.3])
    }

    pub fn paddle_size_multiplier(&self) -> f32 {
        scale_lookup(self.paddle_size, [0.6, 0.8, 1.0, 1.2, 1.4])
    }

    /// Serve speed for a match played with these settings.
    pub fn initial_ball_speed(&self) -> f32 {
        BALL_INITIAL_SPEED * self.ball_speed_multiplier()
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        for knob in [
            self.ball_speed,
            self.ball_size,
            self.paddle_speed,
            self.paddle_size,
        ] {
            if !(1..=5).contains(&knob) {
                return Err("setting knobs must be in 1..=5");
            }
        }
        if !VALID_MAX_SCORES.contains(&self.max_score) {
            return Err("max score must be one of 5, 7, 11, 15, 21");
        }
        Ok(())
    }
}

fn scale_lookup(knob: u8, table: [f32; 5]) -> f32 {
    table[(knob.clamp(1, 5) - 1) as usize]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallState {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub radius: f32,
    /// Scalar speed; kept equal to the velocity magnitude by the physics step.
    pub speed: f32,
}

impl BallState {
    /// Ball centered on the canvas, serving horizontally toward `serve_to`.
    pub fn new(settings: &GameSettings, serve_to: Side) -> Self {
        let speed = settings.initial_ball_speed();
        let direction = match serve_to {
            Side::Left => -1.0,
            Side::Right => 1.0,
        };
        BallState {
            x: CANVAS_WIDTH / 2.0,
            y: CANVAS_HEIGHT / 2.0,
            velocity_x: speed * direction,
            velocity_y: 0.0,
            radius: BALL_RADIUS * settings.ball_size_multiplier(),
            speed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaddleState {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub velocity_y: f32,
    pub speed: f32,
}

impl PaddleState {
    pub fn new(side: Side, settings: &GameSettings) -> Self {
        let height = PADDLE_HEIGHT * settings.paddle_size_multiplier();
        let x = match side {
            Side::Left => PADDLE_OFFSET,
            Side::Right => CANVAS_WIDTH - PADDLE_OFFSET - PADDLE_WIDTH,
        };
        PaddleState {
            x,
            y: CANVAS_HEIGHT / 2.0 - height / 2.0,
            width: PADDLE_WIDTH,
            height,
            velocity_y: 0.0,
            speed: PADDLE_SPEED * settings.paddle_speed_multiplier(),
        }
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: String,
    pub username: String,
    pub paddle: PaddleState,
    pub score: u32,
    pub is_ready: bool,
    pub is_ai: bool,
    /// Unix millis of the last accepted input, 0 before any input.
    pub last_input_ms: u64,
}

impl PlayerState {
    pub fn new(participant: &Participant, side: Side, settings: &GameSettings) -> Self {
        PlayerState {
            id: participant.id().to_string(),
            username: participant.name().to_string(),
            paddle: PaddleState::new(side, settings),
            score: 0,
            is_ready: participant.is_ai(),
            is_ai: participant.is_ai(),
            last_input_ms: 0,
        }
    }
}

/// Authoritative state of one match. Created when a match begins and
/// mutated exclusively by the owning simulation's tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub game_id: String,
    pub status: GameStatus,
    pub timestamp_ms: u64,
    pub ball: BallState,
    pub players: [PlayerState; 2],
    pub score: [u32; 2],
    pub is_paused: bool,
    pub paused_by: Option<String>,
    pub settings: GameSettings,
}

impl GameState {
    pub fn new(
        game_id: String,
        left: &Participant,
        right: &Participant,
        settings: GameSettings,
        serve_to: Side,
    ) -> Self {
        GameState {
            game_id,
            status: GameStatus::Waiting,
            timestamp_ms: 0,
            ball: BallState::new(&settings, serve_to),
            players: [
                PlayerState::new(left, Side::Left, &settings),
                PlayerState::new(right, Side::Right, &settings),
            ],
            score: [0, 0],
            is_paused: false,
            paused_by: None,
            settings,
        }
    }

    pub fn player(&self, side: Side) -> &PlayerState {
        &self.players[side.index()]
    }

    pub fn player_mut(&mut self, side: Side) -> &mut PlayerState {
        &mut self.players[side.index()]
    }

    /// Side controlled by `player_id`, if they are in this match.
    pub fn side_of(&self, player_id: &str) -> Option<Side> {
        if self.players[0].id == player_id {
            Some(Side::Left)
        } else if self.players[1].id == player_id {
            Some(Side::Right)
        } else {
            None
        }
    }

    /// First side to have reached the configured win score, if any.
    pub fn winner(&self) -> Option<Side> {
        if self.score[0] >= self.settings.max_score {
            Some(Side::Left)
        } else if self.score[1] >= self.settings.max_score {
            Some(Side::Right)
        } else {
            None
        }
    }
}
