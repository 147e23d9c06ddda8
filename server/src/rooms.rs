//! Game rooms: a running simulation plus everyone attached to it.

use std::collections::{HashMap, HashSet};

use log::debug;
use shared::{Difficulty, GameMode, GameSettings, GameStatus, Participant, Side};

use crate::ai::AiOpponent;
use crate::game::MatchSim;

/// Room lifecycle as seen by the session layer, derived from the
/// underlying simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// Created, at least one player not yet ready.
    Waiting,
    /// Every player readied up; the next tick starts the match.
    Ready,
    Playing,
    Finished,
}

/// Bracket slot a tournament room reports its result to.
#[derive(Debug, Clone, PartialEq)]
pub struct TournamentMatchRef {
    pub tournament_id: String,
    pub round: u32,
    pub match_number: u32,
}

pub struct GameRoom {
    pub sim: MatchSim,
    pub participants: [Participant; 2],
    /// Present iff the right-side participant is an AI.
    pub ai: Option<AiOpponent>,
    pub spectators: HashSet<String>,
    pub tournament_match: Option<TournamentMatchRef>,
    /// Participants currently inside their disconnect grace window.
    pub disconnected: HashSet<String>,
}

impl GameRoom {
    pub fn single_player(
        game_id: String,
        human: Participant,
        difficulty: Difficulty,
        settings: GameSettings,
    ) -> Self {
        let ai = Participant::Ai { difficulty };
        let sim = MatchSim::new(
            game_id,
            &human,
            &ai,
            GameMode::SinglePlayer,
            settings,
        );
        GameRoom {
            sim,
            participants: [human, ai],
            ai: Some(AiOpponent::new(difficulty)),
            spectators: HashSet::new(),
            tournament_match: None,
            disconnected: HashSet::new(),
        }
    }

    pub fn multiplayer(
        game_id: String,
        left: Participant,
        right: Participant,
        settings: GameSettings,
        tournament_match: Option<TournamentMatchRef>,
    ) -> Self {
        let mode = if tournament_match.is_some() {
            GameMode::Tournament
        } else {
            GameMode::Multiplayer
        };
        let sim = MatchSim::new(game_id, &left, &right, mode, settings);
        GameRoom {
            sim,
            participants: [left, right],
            ai: None,
            spectators: HashSet::new(),
            tournament_match,
            disconnected: HashSet::new(),
        }
    }

    pub fn game_id(&self) -> &str {
        self.sim.game_id()
    }

    pub fn status(&self) -> RoomStatus {
        match self.sim.status() {
            GameStatus::Waiting => {
                if self.sim.state().players.iter().all(|p| p.is_ready) {
                    RoomStatus::Ready
                } else {
                    RoomStatus::Waiting
                }
            }
            GameStatus::InProgress | GameStatus::Paused => RoomStatus::Playing,
            GameStatus::Completed | GameStatus::Abandoned => RoomStatus::Finished,
        }
    }

    pub fn mode(&self) -> GameMode {
        self.sim.mode()
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.id() == user_id)
    }

    pub fn participant_side(&self, user_id: &str) -> Option<Side> {
        self.participants
            .iter()
            .position(|p| p.id() == user_id)
            .and_then(Side::from_index)
    }

    pub fn opponent_of(&self, user_id: &str) -> Option<&Participant> {
        let side = self.participant_side(user_id)?;
        Some(&self.participants[side.opponent().index()])
    }

    /// Connected humans who should receive this room's broadcasts.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.participants
            .iter()
            .filter(|p| !p.is_ai())
            .map(Participant::id)
            .chain(self.spectators.iter().map(String::as_str))
            .filter(|id| !self.disconnected.contains(*id))
    }

    pub fn human_ids(&self) -> impl Iterator<Item = &str> {
        self.participants
            .iter()
            .filter(|p| !p.is_ai())
            .map(Participant::id)
    }
}

/// All live rooms, indexed by game id and by participant.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, GameRoom>,
    by_user: HashMap<String, String>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, room: GameRoom) {
        for id in room.human_ids() {
            self.by_user.insert(id.to_string(), room.game_id().to_string());
        }
        debug!("room {} opened ({:?})", room.game_id(), room.mode());
        self.rooms.insert(room.game_id().to_string(), room);
    }

    pub fn get(&self, game_id: &str) -> Option<&GameRoom> {
        self.rooms.get(game_id)
    }

    pub fn get_mut(&mut self, game_id: &str) -> Option<&mut GameRoom> {
        self.rooms.get_mut(game_id)
    }

    pub fn remove(&mut self, game_id: &str) -> Option<GameRoom> {
        let room = self.rooms.remove(game_id)?;
        for id in room.human_ids() {
            self.by_user.remove(id);
        }
        debug!("room {} closed", game_id);
        Some(room)
    }

    /// The room a user plays in, if any. Spectating does not count.
    pub fn room_of(&self, user_id: &str) -> Option<&str> {
        self.by_user.get(user_id).map(String::as_str)
    }

    pub fn room_of_mut(&mut self, user_id: &str) -> Option<&mut GameRoom> {
        let game_id = self.by_user.get(user_id)?.clone();
        self.rooms.get_mut(&game_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GameRoom> {
        self.rooms.values_mut()
    }

    /// Drops the participant index for a room whose match is over, so
    /// its players can queue again while spectators keep the room alive.
    pub fn detach_participants(&mut self, game_id: &str) {
        let Some(room) = self.rooms.get(game_id) else {
            return;
        };
        let ids: Vec<String> = room.human_ids().map(str::to_string).collect();
        for id in ids {
            if self.by_user.get(&id).map(String::as_str) == Some(game_id) {
                self.by_user.remove(&id);
            }
        }
    }

    /// Removes rooms whose matches reached a terminal state and have no
    /// spectators left watching the final frame.
    pub fn reclaim_finished(&mut self) -> Vec<GameRoom> {
        let finished: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.sim.is_finished() && room.spectators.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        finished
            .into_iter()
            .filter_map(|id| self.remove(&id))
            .collect()
    }
}
