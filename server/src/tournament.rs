//! Single-elimination tournament brackets.
//!
//! A tournament collects a power-of-two number of players during
//! registration, seeds round one by ranking (best against worst), and
//! then advances winners lazily: a parent match is created the first
//! time one of its feeder matches completes.

use std::collections::HashMap;

use log::info;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TournamentError {
    #[error("tournament {0} not found")]
    NotFound(String),
    #[error("match not found in round {round}, slot {match_number}")]
    MatchNotFound { round: u32, match_number: u32 },
    #[error("tournament is not accepting registrations")]
    RegistrationClosed,
    #[error("tournament is full")]
    Full,
    #[error("user {0} already registered")]
    AlreadyJoined(String),
    #[error("user {0} is not registered")]
    NotRegistered(String),
    #[error("player count {0} is not a power of two")]
    NotPowerOfTwo(usize),
    #[error("a bracket needs at least 2 players, got {0}")]
    TooSmall(usize),
    #[error("match already has a winner")]
    AlreadyDecided,
    #[error("winner {0} is not a participant of this match")]
    NotAParticipant(String),
    #[error("tournament is not in progress")]
    NotInProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TournamentStatus {
    Registration,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// Created but still waiting on at least one feeder match.
    Pending,
    /// Both slots filled; playable.
    Ready,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TournamentPlayer {
    pub user_id: String,
    pub username: String,
    pub ranking: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tournament {
    pub id: String,
    pub name: String,
    pub status: TournamentStatus,
    pub max_players: usize,
    pub players: Vec<TournamentPlayer>,
    pub winner_id: Option<String>,
}

/// One bracket slot. `match_number` is 1-based within its round; the
/// winner feeds slot `(match_number - 1) % 2` of parent match
/// `match_number.div_ceil(2)` in the next round.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketMatch {
    pub tournament_id: String,
    pub round: u32,
    pub match_number: u32,
    pub slots: [Option<String>; 2],
    pub status: MatchStatus,
    pub winner_id: Option<String>,
    /// Final score, recorded when the match completes.
    pub score: Option<[u32; 2]>,
    /// Live game backing this match, once one has been created.
    pub game_id: Option<String>,
}

impl BracketMatch {
    pub fn is_ready(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

/// What an `advance_winner` call unlocked.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// Parent match still waits on its sibling feeder.
    Waiting,
    /// Both feeders decided; the parent match can be played.
    NextMatchReady(BracketMatch),
    /// The final is decided.
    TournamentComplete { winner_id: String },
}

pub trait TournamentStore {
    fn get(&self, id: &str) -> Option<Tournament>;
    fn put(&mut self, tournament: Tournament);
    fn get_match(&self, tournament_id: &str, round: u32, match_number: u32)
        -> Option<BracketMatch>;
    fn put_match(&mut self, bracket_match: BracketMatch);
    fn matches(&self, tournament_id: &str) -> Vec<BracketMatch>;
}

#[derive(Default)]
pub struct InMemoryStore {
    tournaments: HashMap<String, Tournament>,
    matches: HashMap<(String, u32, u32), BracketMatch>,
}

impl TournamentStore for InMemoryStore {
    fn get(&self, id: &str) -> Option<Tournament> {
        self.tournaments.get(id).cloned()
    }

    fn put(&mut self, tournament: Tournament) {
        self.tournaments.insert(tournament.id.clone(), tournament);
    }

    fn get_match(
        &self,
        tournament_id: &str,
        round: u32,
        match_number: u32,
    ) -> Option<BracketMatch> {
        self.matches
            .get(&(tournament_id.to_string(), round, match_number))
            .cloned()
    }

    fn put_match(&mut self, bracket_match: BracketMatch) {
        self.matches.insert(
            (
                bracket_match.tournament_id.clone(),
                bracket_match.round,
                bracket_match.match_number,
            ),
            bracket_match,
        );
    }

    fn matches(&self, tournament_id: &str) -> Vec<BracketMatch> {
        let mut out: Vec<BracketMatch> = self
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| (m.round, m.match_number));
        out
    }
}

pub fn is_power_of_two(n: usize) -> bool {
    n > 0 && n.is_power_of_two()
}

/// Rounds needed for a full bracket of `players` (e.g. 8 players -> 3).
pub fn total_rounds(players: usize) -> u32 {
    players.trailing_zeros()
}

/// Draws round one for a power-of-two field: sorts by descending ranking
/// and pairs the strongest remaining seed with the weakest, so the top
/// two seeds cannot meet before the final.
pub fn generate_bracket(tournament_id: &str, players: &[TournamentPlayer]) -> Vec<BracketMatch> {
    let mut seeded = players.to_vec();
    seeded.sort_by(|a, b| b.ranking.cmp(&a.ranking));

    let count = seeded.len();
    (0..count / 2)
        .map(|i| BracketMatch {
            tournament_id: tournament_id.to_string(),
            round: 1,
            match_number: (i + 1) as u32,
            slots: [
                Some(seeded[i].user_id.clone()),
                Some(seeded[count - 1 - i].user_id.clone()),
            ],
            status: MatchStatus::Ready,
            winner_id: None,
            score: None,
            game_id: None,
        })
        .collect()
}

pub struct BracketManager<S: TournamentStore = InMemoryStore> {
    store: S,
}

impl BracketManager<InMemoryStore> {
    pub fn new() -> Self {
        BracketManager {
            store: InMemoryStore::default(),
        }
    }
}

impl Default for BracketManager<InMemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TournamentStore> BracketManager<S> {
    pub fn with_store(store: S) -> Self {
        BracketManager { store }
    }

    pub fn create_tournament(
        &mut self,
        id: String,
        name: String,
        max_players: usize,
    ) -> Result<Tournament, TournamentError> {
        if max_players < 2 {
            return Err(TournamentError::TooSmall(max_players));
        }
        if !is_power_of_two(max_players) {
            return Err(TournamentError::NotPowerOfTwo(max_players));
        }

        let tournament = Tournament {
            id,
            name,
            status: TournamentStatus::Registration,
            max_players,
            players: Vec::new(),
            winner_id: None,
        };
        self.store.put(tournament.clone());
        Ok(tournament)
    }

    pub fn tournament(&self, id: &str) -> Option<Tournament> {
        self.store.get(id)
    }

    pub fn matches(&self, tournament_id: &str) -> Vec<BracketMatch> {
        self.store.matches(tournament_id)
    }

    pub fn can_user_join(&self, tournament_id: &str, user_id: &str) -> bool {
        self.store.get(tournament_id).is_some_and(|t| {
            t.status == TournamentStatus::Registration
                && t.players.len() < t.max_players
                && !t.players.iter().any(|p| p.user_id == user_id)
        })
    }

    /// Registers a player. Returns the updated player count.
    pub fn join(
        &mut self,
        tournament_id: &str,
        player: TournamentPlayer,
    ) -> Result<usize, TournamentError> {
        let mut tournament = self
            .store
            .get(tournament_id)
            .ok_or_else(|| TournamentError::NotFound(tournament_id.to_string()))?;

        if tournament.status != TournamentStatus::Registration {
            return Err(TournamentError::RegistrationClosed);
        }
        if tournament.players.len() >= tournament.max_players {
            return Err(TournamentError::Full);
        }
        if tournament.players.iter().any(|p| p.user_id == player.user_id) {
            return Err(TournamentError::AlreadyJoined(player.user_id));
        }

        tournament.players.push(player);
        let count = tournament.players.len();
        self.store.put(tournament);
        Ok(count)
    }

    /// Withdraws a player; only possible before the bracket is drawn.
    pub fn leave(&mut self, tournament_id: &str, user_id: &str) -> Result<(), TournamentError> {
        let mut tournament = self
            .store
            .get(tournament_id)
            .ok_or_else(|| TournamentError::NotFound(tournament_id.to_string()))?;

        if tournament.status != TournamentStatus::Registration {
            return Err(TournamentError::RegistrationClosed);
        }
        let before = tournament.players.len();
        tournament.players.retain(|p| p.user_id != user_id);
        if tournament.players.len() == before {
            return Err(TournamentError::NotRegistered(user_id.to_string()));
        }
        self.store.put(tournament);
        Ok(())
    }

    /// Closes registration and draws round one, seeding the strongest
    /// ranking against the weakest (1v8, 2v7, ...). Returns the playable
    /// first-round matches.
    pub fn start_tournament(
        &mut self,
        tournament_id: &str,
    ) -> Result<Vec<BracketMatch>, TournamentError> {
        let mut tournament = self
            .store
            .get(tournament_id)
            .ok_or_else(|| TournamentError::NotFound(tournament_id.to_string()))?;

        if tournament.status != TournamentStatus::Registration {
            return Err(TournamentError::RegistrationClosed);
        }
        if tournament.players.len() < 2 {
            return Err(TournamentError::TooSmall(tournament.players.len()));
        }
        if !is_power_of_two(tournament.players.len()) {
            return Err(TournamentError::NotPowerOfTwo(tournament.players.len()));
        }

        let round_one = generate_bracket(tournament_id, &tournament.players);
        for bracket_match in &round_one {
            self.store.put_match(bracket_match.clone());
        }

        tournament.status = TournamentStatus::InProgress;
        let count = tournament.players.len();
        self.store.put(tournament);
        info!(
            "tournament {} started with {} players",
            tournament_id, count
        );
        Ok(round_one)
    }

    /// Links a live game to a bracket match and marks it in progress.
    pub fn mark_in_progress(
        &mut self,
        tournament_id: &str,
        round: u32,
        match_number: u32,
        game_id: &str,
    ) -> Result<(), TournamentError> {
        let mut bracket_match = self
            .store
            .get_match(tournament_id, round, match_number)
            .ok_or(TournamentError::MatchNotFound {
                round,
                match_number,
            })?;

        bracket_match.status = MatchStatus::InProgress;
        bracket_match.game_id = Some(game_id.to_string());
        self.store.put_match(bracket_match);
        Ok(())
    }

    /// Records a match result and propagates the winner up the bracket.
    /// A match that already has a winner rejects further results.
    pub fn advance_winner(
        &mut self,
        tournament_id: &str,
        round: u32,
        match_number: u32,
        winner_id: &str,
        score: [u32; 2],
    ) -> Result<AdvanceOutcome, TournamentError> {
        let mut tournament = self
            .store
            .get(tournament_id)
            .ok_or_else(|| TournamentError::NotFound(tournament_id.to_string()))?;
        if tournament.status != TournamentStatus::InProgress {
            return Err(TournamentError::NotInProgress);
        }

        let mut bracket_match = self
            .store
            .get_match(tournament_id, round, match_number)
            .ok_or(TournamentError::MatchNotFound {
                round,
                match_number,
            })?;

        if bracket_match.winner_id.is_some() {
            return Err(TournamentError::AlreadyDecided);
        }
        if !bracket_match
            .slots
            .iter()
            .any(|s| s.as_deref() == Some(winner_id))
        {
            return Err(TournamentError::NotAParticipant(winner_id.to_string()));
        }

        bracket_match.winner_id = Some(winner_id.to_string());
        bracket_match.status = MatchStatus::Completed;
        bracket_match.score = Some(score);
        self.store.put_match(bracket_match);

        let rounds = total_rounds(tournament.players.len());
        if round >= rounds {
            tournament.status = TournamentStatus::Completed;
            tournament.winner_id = Some(winner_id.to_string());
            self.store.put(tournament);
            info!("tournament {} won by {}", tournament_id, winner_id);
            return Ok(AdvanceOutcome::TournamentComplete {
                winner_id: winner_id.to_string(),
            });
        }

        // Parent is created lazily when its first feeder completes.
        let parent_number = match_number.div_ceil(2);
        let mut parent = self
            .store
            .get_match(tournament_id, round + 1, parent_number)
            .unwrap_or(BracketMatch {
                tournament_id: tournament_id.to_string(),
                round: round + 1,
                match_number: parent_number,
                slots: [None, None],
                status: MatchStatus::Pending,
                winner_id: None,
                score: None,
                game_id: None,
            });

        let slot = ((match_number - 1) % 2) as usize;
        parent.slots[slot] = Some(winner_id.to_string());
        if parent.is_ready() {
            parent.status = MatchStatus::Ready;
        }
        self.store.put_match(parent.clone());

        if parent.is_ready() {
            Ok(AdvanceOutcome::NextMatchReady(parent))
        } else {
            Ok(AdvanceOutcome::Waiting)
        }
    }
}
