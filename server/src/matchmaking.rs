//! FIFO matchmaking queues.
//!
//! One queue per game mode. Single-player entries never wait (the AI is
//! always available); multiplayer entries are paired strictly in arrival
//! order, and an odd remainder stays queued for the next arrival.

use std::collections::{HashMap, VecDeque};

use log::debug;
use shared::{Difficulty, GameMode, GameSettings};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QueueError {
    #[error("user {0} is already queued")]
    AlreadyQueued(String),
}

/// A waiting player together with the settings they asked for. When two
/// entries are paired, the earlier entry's settings win.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub user_id: String,
    pub username: String,
    pub settings: GameSettings,
    pub difficulty: Option<Difficulty>,
    pub enqueued_at_ms: u64,
}

#[derive(Default)]
pub struct MatchQueue {
    queues: HashMap<GameMode, VecDeque<QueueEntry>>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry and returns its 1-based position in that queue. A
    /// user may occupy at most one queue at a time across all modes.
    pub fn enqueue(&mut self, mode: GameMode, entry: QueueEntry) -> Result<usize, QueueError> {
        if self.contains(&entry.user_id) {
            return Err(QueueError::AlreadyQueued(entry.user_id.clone()));
        }

        debug!("user {} queued for {:?}", entry.user_id, mode);
        let queue = self.queues.entry(mode).or_default();
        queue.push_back(entry);
        Ok(queue.len())
    }

    /// Removes a user from whichever queue holds them.
    pub fn remove_user(&mut self, user_id: &str) -> Option<GameMode> {
        for (mode, queue) in self.queues.iter_mut() {
            if let Some(index) = queue.iter().position(|e| e.user_id == user_id) {
                queue.remove(index);
                debug!("user {} left the {:?} queue", user_id, mode);
                return Some(*mode);
            }
        }
        None
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.queues
            .values()
            .any(|q| q.iter().any(|e| e.user_id == user_id))
    }

    pub fn len(&self, mode: GameMode) -> usize {
        self.queues.get(&mode).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, mode: GameMode) -> bool {
        self.len(mode) == 0
    }

    /// Pops as many complete pairs as the queue holds, oldest first. An
    /// odd remainder stays put.
    pub fn take_pairs(&mut self, mode: GameMode) -> Vec<(QueueEntry, QueueEntry)> {
        let mut pairs = Vec::new();
        if let Some(queue) = self.queues.get_mut(&mode) {
            while queue.len() >= 2 {
                let first = queue.pop_front().expect("len checked");
                let second = queue.pop_front().expect("len checked");
                pairs.push((first, second));
            }
        }
        pairs
    }

    /// Empties a queue entirely. Used for single-player, where every
    /// entry gets an AI opponent immediately.
    pub fn drain(&mut self, mode: GameMode) -> Vec<QueueEntry> {
        self.queues
            .get_mut(&mode)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user_id: &str) -> QueueEntry {
        QueueEntry {
            user_id: user_id.to_string(),
            username: user_id.to_string(),
            settings: GameSettings::default(),
            difficulty: None,
            enqueued_at_ms: 0,
        }
    }

    #[test]
    fn test_positions_are_one_based_and_fifo() {
        let mut queue = MatchQueue::new();
        assert_eq!(queue.enqueue(GameMode::Multiplayer, entry("a")), Ok(1));
        assert_eq!(queue.enqueue(GameMode::Multiplayer, entry("b")), Ok(2));
        assert_eq!(queue.enqueue(GameMode::Multiplayer, entry("c")), Ok(3));
    }

    #[test]
    fn test_duplicate_enqueue_is_rejected_across_modes() {
        let mut queue = MatchQueue::new();
        queue.enqueue(GameMode::Multiplayer, entry("a")).unwrap();
        assert_eq!(
            queue.enqueue(GameMode::SinglePlayer, entry("a")),
            Err(QueueError::AlreadyQueued("a".to_string()))
        );
    }

    #[test]
    fn test_five_entries_yield_two_pairs_and_a_remainder() {
        let mut queue = MatchQueue::new();
        for id in ["a", "b", "c", "d", "e"] {
            queue.enqueue(GameMode::Multiplayer, entry(id)).unwrap();
        }

        let pairs = queue.take_pairs(GameMode::Multiplayer);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0.user_id, "a");
        assert_eq!(pairs[0].1.user_id, "b");
        assert_eq!(pairs[1].0.user_id, "c");
        assert_eq!(pairs[1].1.user_id, "d");

        // "e" waits for the next arrival.
        assert_eq!(queue.len(GameMode::Multiplayer), 1);
        assert!(queue.contains("e"));
    }

    #[test]
    fn test_remove_user_preserves_order() {
        let mut queue = MatchQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(GameMode::Multiplayer, entry(id)).unwrap();
        }

        assert_eq!(queue.remove_user("b"), Some(GameMode::Multiplayer));
        assert_eq!(queue.remove_user("b"), None);

        let pairs = queue.take_pairs(GameMode::Multiplayer);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.user_id, "a");
        assert_eq!(pairs[0].1.user_id, "c");
    }

    #[test]
    fn test_single_player_drain_takes_everyone() {
        let mut queue = MatchQueue::new();
        queue.enqueue(GameMode::SinglePlayer, entry("a")).unwrap();
        queue.enqueue(GameMode::SinglePlayer, entry("b")).unwrap();

        let drained = queue.drain(GameMode::SinglePlayer);
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty(GameMode::SinglePlayer));
    }
}
