//! Authoritative match simulation.
//!
//! One `MatchSim` owns one `GameState` and advances it in fixed steps.
//! The simulation itself never touches a clock or a timer: every entry
//! point takes the current time in unix millis, so the session layer can
//! drive it from a tokio interval while tests drive it tick by tick.

use std::collections::HashMap;

use log::{debug, info};
use shared::protocol::MatchStats;
use shared::{Direction, GameMode, GameSettings, GameState, GameStatus, Participant, Side};
use thiserror::Error;

use crate::physics;

/// Wall-clock deltas above this are discarded instead of integrated, so a
/// stalled host cannot produce a physics explosion on the next tick.
pub const MAX_TICK_DELTA_SECS: f32 = 0.1;

#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("game cannot start from its current state")]
    NotStartable,
    #[error("game is not running")]
    NotRunning,
    #[error("game is not paused")]
    NotPaused,
    #[error("game already reached a terminal state")]
    Finished,
    #[error("unknown player: {0}")]
    UnknownPlayer(String),
}

/// Lifecycle events produced by a simulation step or a forfeit.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Score {
        player_index: usize,
        score: u32,
        scores: [u32; 2],
    },
    Ended {
        winner_id: String,
        stats: MatchStats,
    },
}

pub struct MatchSim {
    state: GameState,
    mode: GameMode,
    running: bool,
    started_at_ms: u64,
    last_update_ms: u64,
    paused_total_ms: u64,
    paused_since_ms: Option<u64>,
    /// Latest buffered input per player; drained every tick.
    input_buffer: HashMap<String, (Direction, u64)>,
    frame_count: u64,
}

impl MatchSim {
    /// New simulation with a random opening serve direction.
    pub fn new(
        game_id: String,
        left: &Participant,
        right: &Participant,
        mode: GameMode,
        settings: GameSettings,
    ) -> Self {
        let serve_to = if rand::random() {
            Side::Left
        } else {
            Side::Right
        };
        Self::with_serve(game_id, left, right, mode, settings, serve_to)
    }

    /// Deterministic constructor used by tests.
    pub fn with_serve(
        game_id: String,
        left: &Participant,
        right: &Participant,
        mode: GameMode,
        settings: GameSettings,
        serve_to: Side,
    ) -> Self {
        MatchSim {
            state: GameState::new(game_id, left, right, settings, serve_to),
            mode,
            running: false,
            started_at_ms: 0,
            last_update_ms: 0,
            paused_total_ms: 0,
            paused_since_ms: None,
            input_buffer: HashMap::new(),
            frame_count: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn game_id(&self) -> &str {
        &self.state.game_id
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn status(&self) -> GameStatus {
        self.state.status
    }

    pub fn is_finished(&self) -> bool {
        self.state.status.is_terminal()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Marks a player ready. Returns true once every player is ready.
    pub fn set_ready(&mut self, player_id: &str) -> Result<bool, GameError> {
        let side = self
            .state
            .side_of(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))?;
        self.state.player_mut(side).is_ready = true;
        Ok(self.state.players.iter().all(|p| p.is_ready))
    }

    /// Begins (or unpauses) the simulation. Valid from `Waiting` and
    /// `Paused`; calling it while already running is a no-op.
    pub fn start(&mut self, now_ms: u64) -> Result<(), GameError> {
        match self.state.status {
            GameStatus::InProgress => return Ok(()),
            GameStatus::Waiting | GameStatus::Paused => {}
            _ => return Err(GameError::NotStartable),
        }

        if self.started_at_ms == 0 {
            self.started_at_ms = now_ms;
            info!("game {} started", self.state.game_id);
        }
        self.state.status = GameStatus::InProgress;
        self.last_update_ms = now_ms;
        self.running = true;
        Ok(())
    }

    /// Buffers a directional input; the latest input per player within a
    /// tick wins. Inputs are only accepted while the match is running.
    pub fn handle_input(
        &mut self,
        player_id: &str,
        direction: Direction,
        timestamp_ms: u64,
    ) -> Result<(), GameError> {
        if self.state.side_of(player_id).is_none() {
            return Err(GameError::UnknownPlayer(player_id.to_string()));
        }
        if !self.running {
            return Err(GameError::NotRunning);
        }

        self.input_buffer
            .insert(player_id.to_string(), (direction, timestamp_ms));
        Ok(())
    }

    /// Halts the tick without losing any state.
    pub fn pause(&mut self, paused_by: &str, now_ms: u64) -> Result<(), GameError> {
        if self.state.status != GameStatus::InProgress {
            return Err(GameError::NotRunning);
        }

        self.state.status = GameStatus::Paused;
        self.state.is_paused = true;
        self.state.paused_by = Some(paused_by.to_string());
        self.paused_since_ms = Some(now_ms);
        self.running = false;
        debug!("game {} paused by {}", self.state.game_id, paused_by);
        Ok(())
    }

    /// Resumes after a pause. The reference clock is recomputed so paused
    /// wall time never enters the duration accounting.
    pub fn resume(&mut self, now_ms: u64) -> Result<(), GameError> {
        if self.state.status != GameStatus::Paused {
            return Err(GameError::NotPaused);
        }

        if let Some(since) = self.paused_since_ms.take() {
            self.paused_total_ms += now_ms.saturating_sub(since);
        }
        self.state.is_paused = false;
        self.state.paused_by = None;
        self.start(now_ms)
    }

    /// Ends the match immediately with the other player as winner,
    /// regardless of score.
    pub fn forfeit(&mut self, player_id: &str, now_ms: u64) -> Result<GameEvent, GameError> {
        if self.is_finished() {
            return Err(GameError::Finished);
        }
        let side = self
            .state
            .side_of(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))?;

        // A forfeit before the first serve abandons the match rather
        // than completing it.
        let terminal = if self.state.status == GameStatus::Waiting {
            GameStatus::Abandoned
        } else {
            GameStatus::Completed
        };
        info!("game {} forfeited by {}", self.state.game_id, player_id);
        Ok(self.end_match(side.opponent(), now_ms, terminal, true))
    }

    /// Advances the simulation to `now_ms`. Returns the lifecycle events
    /// this step produced; an empty vec is the common case.
    pub fn step(&mut self, now_ms: u64) -> Vec<GameEvent> {
        if !self.running {
            return Vec::new();
        }

        let dt = now_ms.saturating_sub(self.last_update_ms) as f32 / 1000.0;
        self.last_update_ms = now_ms;

        // A delta this large means the host stalled; dropping the frame
        // beats teleporting the ball.
        if dt > MAX_TICK_DELTA_SECS {
            debug!(
                "game {} skipping oversized tick ({:.0}ms)",
                self.state.game_id,
                dt * 1000.0
            );
            return Vec::new();
        }

        self.apply_buffered_inputs();

        physics::advance_ball(&mut self.state.ball, dt);
        for player in self.state.players.iter_mut() {
            physics::advance_paddle(&mut player.paddle, dt);
        }

        if let Some(side) = physics::paddle_collision(&self.state) {
            physics::resolve_paddle_collision(&mut self.state, side);
        }
        if physics::wall_collision(&self.state.ball) {
            physics::resolve_wall_collision(&mut self.state.ball);
        }

        let max_speed = physics::max_ball_speed(&self.state.settings);
        physics::cap_ball_speed(&mut self.state.ball, max_speed);

        let mut events = self.check_scoring();

        if let Some(winner) = self.state.winner() {
            events.push(self.end_match(winner, now_ms, GameStatus::Completed, false));
        }

        self.state.timestamp_ms = now_ms;
        self.frame_count += 1;
        events
    }

    fn apply_buffered_inputs(&mut self) {
        for (player_id, (direction, timestamp_ms)) in self.input_buffer.drain() {
            let Some(side) = self.state.side_of(&player_id) else {
                continue;
            };
            let player = self.state.player_mut(side);
            player.paddle.velocity_y = match direction {
                Direction::Up => -player.paddle.speed,
                Direction::Down => player.paddle.speed,
                Direction::Stay => 0.0,
            };
            player.last_input_ms = timestamp_ms;
        }
    }

    fn check_scoring(&mut self) -> Vec<GameEvent> {
        if !physics::out_of_bounds(&self.state.ball) {
            return Vec::new();
        }

        let conceding = physics::out_side(&self.state.ball);
        let scorer = conceding.opponent();

        self.state.score[scorer.index()] += 1;
        let new_score = self.state.score[scorer.index()];
        self.state.player_mut(scorer).score = new_score;

        self.state.ball = physics::reset_ball(&self.state.settings, conceding);

        vec![GameEvent::Score {
            player_index: scorer.index(),
            score: new_score,
            scores: self.state.score,
        }]
    }

    fn end_match(
        &mut self,
        winner: Side,
        now_ms: u64,
        terminal: GameStatus,
        forfeited: bool,
    ) -> GameEvent {
        self.running = false;
        self.input_buffer.clear();
        self.state.status = terminal;
        self.state.is_paused = false;
        self.state.paused_by = None;

        let winner_id = self.state.player(winner).id.clone();
        info!(
            "game {} over, winner {} ({}-{})",
            self.state.game_id, winner_id, self.state.score[0], self.state.score[1]
        );

        GameEvent::Ended {
            winner_id: winner_id.clone(),
            stats: MatchStats {
                winner_id,
                score: self.state.score,
                duration_secs: self.duration_secs(now_ms),
                started_at_ms: self.started_at_ms,
                ended_at_ms: now_ms,
                forfeited,
            },
        }
    }

    /// Elapsed play time, excluding any paused intervals.
    pub fn duration_secs(&self, now_ms: u64) -> u64 {
        if self.started_at_ms == 0 {
            return 0;
        }
        let mut paused = self.paused_total_ms;
        if let Some(since) = self.paused_since_ms {
            paused += now_ms.saturating_sub(since);
        }
        now_ms
            .saturating_sub(self.started_at_ms)
            .saturating_sub(paused)
            / 1000
    }
}
