//! Match history and player progression.
//!
//! The session layer records every completed match through a
//! `GameRepository`; the in-memory implementation backs tests and
//! standalone deployments. Progression rules: 10 XP per finished match
//! plus 5 for a win, win streaks reset on a loss.

use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;
use shared::protocol::MatchStats;
use shared::GameMode;

pub const XP_PER_GAME: u64 = 10;
pub const XP_WIN_BONUS: u64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedGame {
    pub game_id: String,
    pub mode: GameMode,
    pub player_ids: [String; 2],
    pub stats: MatchStats,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserStats {
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub xp: u64,
    pub win_streak: u32,
    pub best_win_streak: u32,
}

pub trait GameRepository: Send + Sync {
    fn save_completed_game(&self, record: CompletedGame);
    fn update_user_stats(&self, user_id: &str, won: bool);
    fn user_stats(&self, user_id: &str) -> Option<UserStats>;
    fn game_history(&self, user_id: &str) -> Vec<CompletedGame>;
}

#[derive(Default)]
pub struct InMemoryRepository {
    games: Mutex<Vec<CompletedGame>>,
    stats: Mutex<HashMap<String, UserStats>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameRepository for InMemoryRepository {
    fn save_completed_game(&self, record: CompletedGame) {
        debug!("recording game {}", record.game_id);
        self.games.lock().expect("repository poisoned").push(record);
    }

    fn update_user_stats(&self, user_id: &str, won: bool) {
        let mut stats = self.stats.lock().expect("repository poisoned");
        let entry = stats.entry(user_id.to_string()).or_default();

        entry.games_played += 1;
        entry.xp += XP_PER_GAME;
        if won {
            entry.wins += 1;
            entry.xp += XP_WIN_BONUS;
            entry.win_streak += 1;
            entry.best_win_streak = entry.best_win_streak.max(entry.win_streak);
        } else {
            entry.losses += 1;
            entry.win_streak = 0;
        }
    }

    fn user_stats(&self, user_id: &str) -> Option<UserStats> {
        self.stats
            .lock()
            .expect("repository poisoned")
            .get(user_id)
            .cloned()
    }

    fn game_history(&self, user_id: &str) -> Vec<CompletedGame> {
        self.games
            .lock()
            .expect("repository poisoned")
            .iter()
            .filter(|g| g.player_ids.iter().any(|id| id == user_id))
            .cloned()
            .collect()
    }
}
