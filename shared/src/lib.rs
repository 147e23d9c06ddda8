//! Types and constants shared between the game server and its clients.
//!
//! Everything a client needs to interpret server broadcasts lives here:
//! the playfield constants, the serializable game state, the tunable
//! match settings, and the JSON event protocol.

pub mod protocol;
pub mod state;

pub use state::{
    BallState, Difficulty, Direction, GameMode, GameSettings, GameState, GameStatus, PaddleState,
    Participant, PlayerState, Side,
};

/// Playfield width in logical pixels.
pub const CANVAS_WIDTH: f32 = 800.0;
/// Playfield height in logical pixels.
pub const CANVAS_HEIGHT: f32 = 600.0;

pub const BALL_RADIUS: f32 = 8.0;
pub const BALL_INITIAL_SPEED: f32 = 300.0;
/// Multiplicative speed-up applied on every paddle hit.
pub const BALL_ACCELERATION: f32 = 1.05;
/// Hard cap: the ball never exceeds this multiple of its serve speed.
pub const BALL_MAX_SPEED_FACTOR: f32 = 2.0;

pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 80.0;
pub const PADDLE_SPEED: f32 = 400.0;
/// Horizontal distance between a paddle and its canvas edge.
pub const PADDLE_OFFSET: f32 = 20.0;

/// Physics updates per second.
pub const TICK_RATE: u32 = 60;
/// Maximum deflection angle off a paddle, in radians.
pub const MAX_BALL_ANGLE: f32 = std::f32::consts::FRAC_PI_4;

/// Per-tick velocity decay applied to the ball.
pub const FRICTION: f32 = 0.99;
/// Extra reach added to the ball radius during paddle collision tests.
pub const COLLISION_PADDING: f32 = 2.0;

pub const DEFAULT_MAX_SCORE: u32 = 11;
pub const VALID_MAX_SCORES: [u32; 5] = [5, 7, 11, 15, 21];

/// Synthetic identity used for the AI participant in single-player rooms.
pub const AI_PLAYER_ID: &str = "ai-opponent";
pub const AI_PLAYER_NAME: &str = "AI Opponent";
