//! Reaction-time-modeled AI opponent.
//!
//! The AI always defends the right side. Each invocation it either
//! releases a previously scheduled move (once its reaction delay has
//! elapsed) or computes a new one: predict where the ball will cross the
//! paddle line, fold the prediction off the walls, perturb it to model
//! human imprecision, and compare against the paddle center with a dead
//! zone to avoid jitter.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Difficulty, Direction, GameState, Side, CANVAS_HEIGHT};

use crate::physics;

/// Tier parameters: how long the AI "thinks" before acting, how often it
/// reads the trajectory correctly, and how far off its motor target is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiProfile {
    pub reaction_ms: u64,
    pub accuracy: f64,
    pub prediction_error: f32,
}

pub trait DifficultyProfile {
    fn profile(self) -> AiProfile;
}

impl DifficultyProfile for Difficulty {
    fn profile(self) -> AiProfile {
        match self {
            Difficulty::Easy => AiProfile {
                reaction_ms: 200,
                accuracy: 0.6,
                prediction_error: 50.0,
            },
            Difficulty::Medium => AiProfile {
                reaction_ms: 100,
                accuracy: 0.8,
                prediction_error: 20.0,
            },
            Difficulty::Hard => AiProfile {
                reaction_ms: 50,
                accuracy: 0.95,
                prediction_error: 5.0,
            },
        }
    }
}

/// Reaction-delay state machine: a computed move is held here until its
/// release time, then handed to the simulation exactly once.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingMove {
    Idle,
    Pending {
        direction: Direction,
        computed_at_ms: u64,
    },
}

pub struct AiOpponent {
    difficulty: Difficulty,
    profile: AiProfile,
    pending: PendingMove,
    rng: StdRng,
}

impl AiOpponent {
    pub fn new(difficulty: Difficulty) -> Self {
        Self::with_rng(difficulty, StdRng::from_entropy())
    }

    /// Seeded constructor for deterministic tests.
    pub fn with_seed(difficulty: Difficulty, seed: u64) -> Self {
        Self::with_rng(difficulty, StdRng::seed_from_u64(seed))
    }

    fn with_rng(difficulty: Difficulty, rng: StdRng) -> Self {
        AiOpponent {
            difficulty,
            profile: difficulty.profile(),
            pending: PendingMove::Idle,
            rng,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Changes the tier without disturbing anything but the pending move.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.profile = difficulty.profile();
        self.pending = PendingMove::Idle;
    }

    pub fn reset(&mut self) {
        self.pending = PendingMove::Idle;
    }

    /// Directional input for the current tick.
    ///
    /// A freshly computed move is withheld until `reaction_ms` has
    /// elapsed since it was computed; the hard tier releases immediately.
    pub fn next_input(&mut self, state: &GameState, now_ms: u64) -> Direction {
        match self.pending {
            PendingMove::Pending {
                direction,
                computed_at_ms,
            } => {
                if now_ms.saturating_sub(computed_at_ms) >= self.profile.reaction_ms {
                    self.pending = PendingMove::Idle;
                    direction
                } else {
                    Direction::Stay
                }
            }
            PendingMove::Idle => {
                let direction = self.calculate_move(state);
                if self.difficulty == Difficulty::Hard {
                    return direction;
                }
                self.pending = PendingMove::Pending {
                    direction,
                    computed_at_ms: now_ms,
                };
                Direction::Stay
            }
        }
    }

    fn calculate_move(&mut self, state: &GameState) -> Direction {
        let paddle = &state.player(Side::Right).paddle;

        if !physics::heading_toward(&state.ball, Side::Right) {
            return self.move_toward_center(state);
        }

        if physics::time_until_paddle(state, Side::Right).is_none() {
            return Direction::Stay;
        }

        let Some(predicted_y) = physics::intersection_y(&state.ball, paddle.x) else {
            return Direction::Stay;
        };

        let target_y = self.perturb(predicted_y);

        // Quarter-height dead zone keeps the paddle from oscillating
        // around the target.
        let threshold = paddle.height / 4.0;
        let difference = target_y - paddle.center_y();

        if difference < -threshold {
            Direction::Up
        } else if difference > threshold {
            Direction::Down
        } else {
            Direction::Stay
        }
    }

    /// With probability `1 - accuracy` the AI misreads the trajectory
    /// entirely; otherwise its aim is off by a small bounded amount.
    fn perturb(&mut self, predicted_y: f32) -> f32 {
        if self.rng.gen::<f64>() > self.profile.accuracy {
            predicted_y + (self.rng.gen::<f32>() - 0.5) * CANVAS_HEIGHT * 0.3
        } else {
            predicted_y + (self.rng.gen::<f32>() - 0.5) * 2.0 * self.profile.prediction_error
        }
    }

    fn move_toward_center(&self, state: &GameState) -> Direction {
        let paddle = &state.player(Side::Right).paddle;
        let threshold = paddle.height / 2.0;
        let difference = CANVAS_HEIGHT / 2.0 - paddle.center_y();

        if difference < -threshold {
            Direction::Up
        } else if difference > threshold {
            Direction::Down
        } else {
            Direction::Stay
        }
    }
}
