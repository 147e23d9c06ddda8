//! Session manager: the single actor that owns all mutable server state.
//!
//! Connection tasks never touch rooms or queues directly; they send
//! `SessionMessage`s over a channel and receive `ServerEvent`s on their
//! own outbound channel. Every handler takes the current time explicitly
//! so tests can drive the whole session tick by tick without a runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use tokio::sync::mpsc;

use shared::protocol::{ClientEvent, MatchStats, OpponentInfo, ServerEvent};
use shared::{Difficulty, GameMode, GameSettings, GameStatus, Participant};

use crate::game::{GameError, GameEvent};
use crate::matchmaking::{MatchQueue, QueueEntry};
use crate::persistence::{CompletedGame, GameRepository};
use crate::rooms::{GameRoom, RoomRegistry, TournamentMatchRef};
use crate::tournament::{AdvanceOutcome, BracketManager, TournamentPlayer};

pub fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Messages from connection tasks into the session actor.
#[derive(Debug)]
pub enum SessionMessage {
    Connected {
        user_id: String,
        username: String,
        sender: mpsc::UnboundedSender<ServerEvent>,
    },
    Event {
        user_id: String,
        event: ClientEvent,
    },
    Disconnected {
        user_id: String,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Snapshots go out every Nth simulation frame.
    pub broadcast_divisor: u64,
    /// How long a disconnected player may reconnect before forfeiting.
    pub grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            broadcast_divisor: 2,
            grace_ms: 30_000,
        }
    }
}

struct Connection {
    username: String,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

type Outbox = Vec<(String, ServerEvent)>;

pub struct SessionManager {
    config: SessionConfig,
    rooms: RoomRegistry,
    queue: MatchQueue,
    connections: HashMap<String, Connection>,
    /// Disconnected players still inside their grace window.
    grace_deadlines: HashMap<String, u64>,
    repository: Arc<dyn GameRepository>,
    tournaments: BracketManager,
    next_game_id: u64,
    next_tournament_id: u64,
}

impl SessionManager {
    pub fn new(repository: Arc<dyn GameRepository>, config: SessionConfig) -> Self {
        SessionManager {
            config,
            rooms: RoomRegistry::new(),
            queue: MatchQueue::new(),
            connections: HashMap::new(),
            grace_deadlines: HashMap::new(),
            repository,
            tournaments: BracketManager::new(),
            next_game_id: 0,
            next_tournament_id: 0,
        }
    }

    /// Consumes messages and drives the simulation until every sender is
    /// dropped.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionMessage>, tick_rate: u32) {
        let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / tick_rate as f64));
        info!("session manager running at {} Hz", tick_rate);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.handle_tick(now_unix_millis());
                }
                message = rx.recv() => {
                    let Some(message) = message else { break };
                    match message {
                        SessionMessage::Connected { user_id, username, sender } => {
                            self.handle_connect(&user_id, &username, sender, now_unix_millis());
                        }
                        SessionMessage::Event { user_id, event } => {
                            self.handle_event(&user_id, event, now_unix_millis());
                        }
                        SessionMessage::Disconnected { user_id } => {
                            self.handle_disconnect(&user_id, now_unix_millis());
                        }
                    }
                }
            }
        }
        info!("session manager stopped");
    }

    pub fn handle_connect(
        &mut self,
        user_id: &str,
        username: &str,
        sender: mpsc::UnboundedSender<ServerEvent>,
        now_ms: u64,
    ) {
        info!("user {} connected as {}", user_id, username);
        let mut outbox: Outbox = Vec::new();

        for (other_id, _) in self.connections.iter() {
            outbox.push((
                other_id.clone(),
                ServerEvent::PlayerOnline {
                    user_id: user_id.to_string(),
                    username: username.to_string(),
                },
            ));
        }

        self.connections.insert(
            user_id.to_string(),
            Connection {
                username: username.to_string(),
                sender,
            },
        );
        outbox.push((
            user_id.to_string(),
            ServerEvent::Authenticated {
                user_id: user_id.to_string(),
                username: username.to_string(),
            },
        ));

        // Reconnection inside the grace window resumes the match.
        if self.grace_deadlines.remove(user_id).is_some() {
            if let Some(room) = self.rooms.room_of_mut(user_id) {
                room.disconnected.remove(user_id);
                if room.sim.resume(now_ms).is_ok() {
                    let game_id = room.game_id().to_string();
                    info!("user {} reconnected to game {}", user_id, game_id);
                    outbox.push((
                        user_id.to_string(),
                        ServerEvent::GameStateUpdate {
                            state: room.sim.state().clone(),
                        },
                    ));
                    for recipient in room.recipients() {
                        outbox.push((recipient.to_string(), ServerEvent::GameResumed));
                    }
                }
            }
        }

        self.flush(outbox);
    }

    pub fn handle_disconnect(&mut self, user_id: &str, now_ms: u64) {
        info!("user {} disconnected", user_id);
        let mut outbox: Outbox = Vec::new();

        let username = match self.connections.remove(user_id) {
            Some(connection) => connection.username,
            None => return,
        };
        self.queue.remove_user(user_id);
        for room in self.rooms.iter_mut() {
            room.spectators.remove(user_id);
        }

        for other_id in self.connections.keys() {
            outbox.push((
                other_id.clone(),
                ServerEvent::PlayerOffline {
                    user_id: user_id.to_string(),
                    username: username.clone(),
                },
            ));
        }

        let mut ended: Option<(String, GameEvent)> = None;
        if let Some(room) = self.rooms.room_of_mut(user_id) {
            match room.sim.status() {
                GameStatus::InProgress | GameStatus::Paused => {
                    // Pause and give the player a grace window to return.
                    let _ = room.sim.pause(user_id, now_ms);
                    room.disconnected.insert(user_id.to_string());
                    self.grace_deadlines
                        .insert(user_id.to_string(), now_ms + self.config.grace_ms);
                    for recipient in room.recipients() {
                        outbox.push((
                            recipient.to_string(),
                            ServerEvent::GamePaused {
                                paused_by: user_id.to_string(),
                            },
                        ));
                    }
                }
                GameStatus::Waiting => {
                    // Nothing played yet: abandon the room outright.
                    if let Ok(event) = room.sim.forfeit(user_id, now_ms) {
                        ended = Some((room.game_id().to_string(), event));
                    }
                }
                _ => {}
            }
        }
        if let Some((game_id, GameEvent::Ended { winner_id, stats })) = ended {
            self.handle_ended(&game_id, winner_id, stats, &mut outbox);
        }

        self.flush(outbox);
    }

    pub fn handle_event(&mut self, user_id: &str, event: ClientEvent, now_ms: u64) {
        let mut outbox: Outbox = Vec::new();

        match event {
            ClientEvent::Authenticate { .. } => {
                outbox.push((user_id.to_string(), error_event("Already authenticated")));
            }
            ClientEvent::QueueJoin {
                mode,
                settings,
                difficulty,
            } => self.on_queue_join(user_id, mode, settings, difficulty, now_ms, &mut outbox),
            ClientEvent::QueueLeave => {
                if self.queue.remove_user(user_id).is_some() {
                    outbox.push((user_id.to_string(), ServerEvent::QueueLeft));
                } else {
                    outbox.push((user_id.to_string(), error_event("Not in a queue")));
                }
            }
            ClientEvent::GameJoin { game_id } => self.on_game_join(user_id, &game_id, &mut outbox),
            ClientEvent::GameReady { game_id } => {
                self.on_game_ready(user_id, &game_id, now_ms, &mut outbox)
            }
            ClientEvent::GameMove { direction } => {
                match self.rooms.room_of_mut(user_id) {
                    Some(room) => match room.sim.handle_input(user_id, direction, now_ms) {
                        // Inputs during pause or countdown are dropped quietly.
                        Ok(()) | Err(GameError::NotRunning) => {}
                        Err(err) => {
                            outbox.push((user_id.to_string(), error_event(&err.to_string())))
                        }
                    },
                    None => outbox.push((user_id.to_string(), error_event("Not in a game"))),
                }
            }
            ClientEvent::GamePause { game_id } => {
                self.on_pause(user_id, &game_id, now_ms, &mut outbox)
            }
            ClientEvent::GameResume { game_id } => {
                self.on_resume(user_id, &game_id, now_ms, &mut outbox)
            }
            ClientEvent::GameLeave { game_id } => {
                self.on_game_leave(user_id, &game_id, now_ms, &mut outbox)
            }
            ClientEvent::TournamentJoin { tournament_id } => {
                self.on_tournament_join(user_id, &tournament_id, &mut outbox)
            }
            ClientEvent::TournamentLeave { tournament_id } => {
                self.on_tournament_leave(user_id, &tournament_id, &mut outbox)
            }
        }

        self.flush(outbox);
    }

    /// Advances every running room by one frame and enforces grace
    /// deadlines.
    pub fn handle_tick(&mut self, now_ms: u64) {
        let mut outbox: Outbox = Vec::new();
        let mut ended: Vec<(String, GameEvent)> = Vec::new();

        for room in self.rooms.iter_mut() {
            if let Some(ai) = room.ai.as_mut() {
                if room.sim.status() == GameStatus::InProgress {
                    let direction = ai.next_input(room.sim.state(), now_ms);
                    let _ = room
                        .sim
                        .handle_input(shared::AI_PLAYER_ID, direction, now_ms);
                }
            }

            let events = room.sim.step(now_ms);
            for event in events {
                match event {
                    GameEvent::Score {
                        player_index,
                        score,
                        scores,
                    } => {
                        for recipient in room.recipients() {
                            outbox.push((
                                recipient.to_string(),
                                ServerEvent::GameScore {
                                    player_index,
                                    score,
                                    scores,
                                },
                            ));
                        }
                    }
                    GameEvent::Ended { .. } => {
                        ended.push((room.game_id().to_string(), event));
                    }
                }
            }

            if room.sim.status() == GameStatus::InProgress
                && room.sim.frame_count() % self.config.broadcast_divisor == 0
            {
                let state = room.sim.state().clone();
                for recipient in room.recipients() {
                    outbox.push((
                        recipient.to_string(),
                        ServerEvent::GameStateUpdate {
                            state: state.clone(),
                        },
                    ));
                }
            }
        }

        for (game_id, event) in ended {
            if let GameEvent::Ended { winner_id, stats } = event {
                self.handle_ended(&game_id, winner_id, stats, &mut outbox);
            }
        }

        self.enforce_grace(now_ms, &mut outbox);
        self.rooms.reclaim_finished();
        self.flush(outbox);
    }

    /// Server-side tournament creation. Returns the new tournament id.
    pub fn create_tournament(
        &mut self,
        name: &str,
        max_players: usize,
    ) -> Result<String, crate::tournament::TournamentError> {
        self.next_tournament_id += 1;
        let id = format!("tournament-{}", self.next_tournament_id);
        self.tournaments
            .create_tournament(id.clone(), name.to_string(), max_players)?;
        info!("tournament {} open for {} players", id, max_players);
        Ok(id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn online_count(&self) -> usize {
        self.connections.len()
    }

    fn next_game_id(&mut self) -> String {
        self.next_game_id += 1;
        format!("game-{}", self.next_game_id)
    }

    fn on_queue_join(
        &mut self,
        user_id: &str,
        mode: GameMode,
        settings: Option<GameSettings>,
        difficulty: Option<Difficulty>,
        now_ms: u64,
        outbox: &mut Outbox,
    ) {
        if self.rooms.room_of(user_id).is_some() {
            outbox.push((user_id.to_string(), error_event("Already in a game")));
            return;
        }

        let settings = settings.unwrap_or_default();
        if let Err(reason) = settings.validate() {
            outbox.push((user_id.to_string(), error_event(reason)));
            return;
        }

        let username = self.username_of(user_id);
        let entry = QueueEntry {
            user_id: user_id.to_string(),
            username,
            settings,
            difficulty,
            enqueued_at_ms: now_ms,
        };
        match self.queue.enqueue(mode, entry) {
            Ok(position) => {
                outbox.push((
                    user_id.to_string(),
                    ServerEvent::QueueJoined { mode, position },
                ));
            }
            Err(err) => {
                outbox.push((user_id.to_string(), error_event(&err.to_string())));
                return;
            }
        }

        match mode {
            GameMode::SinglePlayer => {
                for entry in self.queue.drain(GameMode::SinglePlayer) {
                    let difficulty = entry.difficulty.unwrap_or(Difficulty::Medium);
                    self.open_single_player_room(entry, difficulty, outbox);
                }
            }
            GameMode::Multiplayer => {
                for (first, second) in self.queue.take_pairs(GameMode::Multiplayer) {
                    let left = Participant::Human {
                        id: first.user_id.clone(),
                        name: first.username.clone(),
                    };
                    let right = Participant::Human {
                        id: second.user_id.clone(),
                        name: second.username.clone(),
                    };
                    // Earlier entry's settings apply to the match.
                    self.open_multiplayer_room(left, right, first.settings, None, outbox);
                }
            }
            GameMode::Tournament => {
                // Tournament matches come from the bracket, not the queue.
                self.queue.remove_user(user_id);
                outbox.push((
                    user_id.to_string(),
                    error_event("Join a tournament to get tournament matches"),
                ));
            }
        }
    }

    fn on_game_join(&mut self, user_id: &str, game_id: &str, outbox: &mut Outbox) {
        let Some(room) = self.rooms.get_mut(game_id) else {
            outbox.push((user_id.to_string(), error_event("Game not found")));
            return;
        };

        if !room.is_participant(user_id) {
            room.spectators.insert(user_id.to_string());
            debug!("user {} spectating game {}", user_id, game_id);
        }
        outbox.push((
            user_id.to_string(),
            ServerEvent::GameStateUpdate {
                state: room.sim.state().clone(),
            },
        ));
    }

    fn on_game_ready(&mut self, user_id: &str, game_id: &str, now_ms: u64, outbox: &mut Outbox) {
        let username = self.username_of(user_id);
        let Some(room) = self.rooms.get_mut(game_id) else {
            outbox.push((user_id.to_string(), error_event("Game not found")));
            return;
        };

        match room.sim.set_ready(user_id) {
            Ok(all_ready) => {
                for recipient in room.recipients() {
                    outbox.push((
                        recipient.to_string(),
                        ServerEvent::GameReadyAck {
                            player_id: user_id.to_string(),
                            username: username.clone(),
                        },
                    ));
                }
                if all_ready && room.sim.start(now_ms).is_ok() {
                    let state = room.sim.state().clone();
                    for recipient in room.recipients() {
                        outbox.push((
                            recipient.to_string(),
                            ServerEvent::GameStart {
                                game_id: game_id.to_string(),
                                timestamp_ms: now_ms,
                            },
                        ));
                        outbox.push((
                            recipient.to_string(),
                            ServerEvent::GameStateUpdate {
                                state: state.clone(),
                            },
                        ));
                    }
                }
            }
            Err(err) => outbox.push((user_id.to_string(), error_event(&err.to_string()))),
        }
    }

    fn on_pause(&mut self, user_id: &str, game_id: &str, now_ms: u64, outbox: &mut Outbox) {
        let Some(room) = self.rooms.get_mut(game_id) else {
            outbox.push((user_id.to_string(), error_event("Game not found")));
            return;
        };
        if !room.is_participant(user_id) {
            outbox.push((user_id.to_string(), error_event("Not a player in this game")));
            return;
        }

        match room.sim.pause(user_id, now_ms) {
            Ok(()) => {
                for recipient in room.recipients() {
                    outbox.push((
                        recipient.to_string(),
                        ServerEvent::GamePaused {
                            paused_by: user_id.to_string(),
                        },
                    ));
                }
            }
            Err(err) => outbox.push((user_id.to_string(), error_event(&err.to_string()))),
        }
    }

    fn on_resume(&mut self, user_id: &str, game_id: &str, now_ms: u64, outbox: &mut Outbox) {
        let Some(room) = self.rooms.get_mut(game_id) else {
            outbox.push((user_id.to_string(), error_event("Game not found")));
            return;
        };
        if !room.is_participant(user_id) {
            outbox.push((user_id.to_string(), error_event("Not a player in this game")));
            return;
        }
        // A match paused by a disconnect resumes only on reconnection.
        if !room.disconnected.is_empty() {
            outbox.push((
                user_id.to_string(),
                error_event("Waiting for opponent to reconnect"),
            ));
            return;
        }

        match room.sim.resume(now_ms) {
            Ok(()) => {
                for recipient in room.recipients() {
                    outbox.push((recipient.to_string(), ServerEvent::GameResumed));
                }
            }
            Err(err) => outbox.push((user_id.to_string(), error_event(&err.to_string()))),
        }
    }

    fn on_game_leave(&mut self, user_id: &str, game_id: &str, now_ms: u64, outbox: &mut Outbox) {
        let Some(room) = self.rooms.get_mut(game_id) else {
            outbox.push((user_id.to_string(), error_event("Game not found")));
            return;
        };

        if !room.is_participant(user_id) {
            room.spectators.remove(user_id);
            return;
        }

        match room.sim.forfeit(user_id, now_ms) {
            Ok(GameEvent::Ended { winner_id, stats }) => {
                self.handle_ended(game_id, winner_id, stats, outbox);
            }
            Ok(_) => {}
            Err(err) => outbox.push((user_id.to_string(), error_event(&err.to_string()))),
        }
    }

    fn on_tournament_join(&mut self, user_id: &str, tournament_id: &str, outbox: &mut Outbox) {
        let username = self.username_of(user_id);
        // Ranking follows accumulated XP; newcomers seed lowest.
        let ranking = self
            .repository
            .user_stats(user_id)
            .map(|s| s.xp as u32)
            .unwrap_or(0);

        let player = TournamentPlayer {
            user_id: user_id.to_string(),
            username: username.clone(),
            ranking,
        };
        match self.tournaments.join(tournament_id, player) {
            Ok(count) => {
                for other_id in self.connections.keys() {
                    outbox.push((
                        other_id.clone(),
                        ServerEvent::TournamentPlayerJoined {
                            tournament_id: tournament_id.to_string(),
                            user_id: user_id.to_string(),
                            username: username.clone(),
                        },
                    ));
                }

                let full = self
                    .tournaments
                    .tournament(tournament_id)
                    .is_some_and(|t| count == t.max_players);
                if full {
                    self.start_tournament(tournament_id, outbox);
                }
            }
            Err(err) => outbox.push((user_id.to_string(), error_event(&err.to_string()))),
        }
    }

    fn on_tournament_leave(&mut self, user_id: &str, tournament_id: &str, outbox: &mut Outbox) {
        let username = self.username_of(user_id);
        match self.tournaments.leave(tournament_id, user_id) {
            Ok(()) => {
                for other_id in self.connections.keys() {
                    outbox.push((
                        other_id.clone(),
                        ServerEvent::TournamentPlayerLeft {
                            tournament_id: tournament_id.to_string(),
                            user_id: user_id.to_string(),
                            username: username.clone(),
                        },
                    ));
                }
            }
            Err(err) => outbox.push((user_id.to_string(), error_event(&err.to_string()))),
        }
    }

    fn start_tournament(&mut self, tournament_id: &str, outbox: &mut Outbox) {
        let round_one = match self.tournaments.start_tournament(tournament_id) {
            Ok(matches) => matches,
            Err(err) => {
                warn!("could not start tournament {}: {}", tournament_id, err);
                return;
            }
        };

        for bracket_match in round_one {
            self.open_bracket_room(tournament_id, bracket_match, outbox);
        }
    }

    fn open_bracket_room(
        &mut self,
        tournament_id: &str,
        bracket_match: crate::tournament::BracketMatch,
        outbox: &mut Outbox,
    ) {
        let [Some(first), Some(second)] = bracket_match.slots.clone() else {
            warn!(
                "bracket match {}/{} not ready",
                bracket_match.round, bracket_match.match_number
            );
            return;
        };

        let left = Participant::Human {
            id: first.clone(),
            name: self.username_of(&first),
        };
        let right = Participant::Human {
            id: second.clone(),
            name: self.username_of(&second),
        };
        let reference = TournamentMatchRef {
            tournament_id: tournament_id.to_string(),
            round: bracket_match.round,
            match_number: bracket_match.match_number,
        };
        let game_id = self.open_multiplayer_room(
            left,
            right,
            GameSettings::default(),
            Some(reference),
            outbox,
        );
        if let Err(err) = self.tournaments.mark_in_progress(
            tournament_id,
            bracket_match.round,
            bracket_match.match_number,
            &game_id,
        ) {
            warn!("could not link game {} to bracket: {}", game_id, err);
        }
    }

    fn open_single_player_room(
        &mut self,
        entry: QueueEntry,
        difficulty: Difficulty,
        outbox: &mut Outbox,
    ) {
        let game_id = self.next_game_id();
        let human = Participant::Human {
            id: entry.user_id.clone(),
            name: entry.username.clone(),
        };
        let room = GameRoom::single_player(game_id.clone(), human, difficulty, entry.settings);

        outbox.push((
            entry.user_id.clone(),
            ServerEvent::QueueMatched {
                game_id: game_id.clone(),
                opponent: opponent_info(&room.participants[1]),
            },
        ));
        self.rooms.insert(room);
    }

    fn open_multiplayer_room(
        &mut self,
        left: Participant,
        right: Participant,
        settings: GameSettings,
        tournament_match: Option<TournamentMatchRef>,
        outbox: &mut Outbox,
    ) -> String {
        let game_id = self.next_game_id();
        let room = GameRoom::multiplayer(
            game_id.clone(),
            left.clone(),
            right.clone(),
            settings,
            tournament_match,
        );

        outbox.push((
            left.id().to_string(),
            ServerEvent::QueueMatched {
                game_id: game_id.clone(),
                opponent: opponent_info(&right),
            },
        ));
        outbox.push((
            right.id().to_string(),
            ServerEvent::QueueMatched {
                game_id: game_id.clone(),
                opponent: opponent_info(&left),
            },
        ));
        self.rooms.insert(room);
        game_id
    }

    /// Fans out the end of a match: notify the room, record history and
    /// progression, and advance the bracket when applicable.
    fn handle_ended(
        &mut self,
        game_id: &str,
        winner_id: String,
        stats: MatchStats,
        outbox: &mut Outbox,
    ) {
        let Some(room) = self.rooms.get(game_id) else {
            return;
        };
        let mode = room.mode();
        let status = room.sim.status();
        let player_ids = [
            room.participants[0].id().to_string(),
            room.participants[1].id().to_string(),
        ];
        let humans: Vec<String> = room.human_ids().map(str::to_string).collect();
        let tournament_match = room.tournament_match.clone();

        for recipient in room.recipients() {
            outbox.push((
                recipient.to_string(),
                ServerEvent::GameEnd {
                    winner_id: winner_id.clone(),
                    stats: stats.clone(),
                },
            ));
        }

        // Abandoned matches are not part of anyone's record.
        if status == GameStatus::Completed {
            self.repository.save_completed_game(CompletedGame {
                game_id: game_id.to_string(),
                mode,
                player_ids,
                stats: stats.clone(),
            });
            for id in &humans {
                self.repository.update_user_stats(id, *id == winner_id);
            }
        }

        for id in &humans {
            self.grace_deadlines.remove(id);
        }
        // The room lingers for spectators, but its players may queue again.
        self.rooms.detach_participants(game_id);

        if let Some(reference) = tournament_match {
            self.advance_bracket(&reference, &winner_id, stats.score, outbox);
        }
    }

    fn advance_bracket(
        &mut self,
        reference: &TournamentMatchRef,
        winner_id: &str,
        score: [u32; 2],
        outbox: &mut Outbox,
    ) {
        let outcome = self.tournaments.advance_winner(
            &reference.tournament_id,
            reference.round,
            reference.match_number,
            winner_id,
            score,
        );
        match outcome {
            Ok(AdvanceOutcome::Waiting) => {}
            Ok(AdvanceOutcome::NextMatchReady(next)) => {
                self.open_bracket_room(&reference.tournament_id.clone(), next, outbox);
            }
            Ok(AdvanceOutcome::TournamentComplete { winner_id }) => {
                for other_id in self.connections.keys() {
                    outbox.push((
                        other_id.clone(),
                        ServerEvent::TournamentComplete {
                            tournament_id: reference.tournament_id.clone(),
                            winner_id: winner_id.clone(),
                        },
                    ));
                }
            }
            Err(err) => warn!(
                "bracket advance failed for {}: {}",
                reference.tournament_id, err
            ),
        }
    }

    fn enforce_grace(&mut self, now_ms: u64, outbox: &mut Outbox) {
        let expired: Vec<String> = self
            .grace_deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now_ms)
            .map(|(id, _)| id.clone())
            .collect();

        for user_id in expired {
            self.grace_deadlines.remove(&user_id);
            let Some(game_id) = self.rooms.room_of(&user_id).map(str::to_string) else {
                continue;
            };
            info!(
                "user {} did not return in time, forfeiting game {}",
                user_id, game_id
            );
            let forfeit = self
                .rooms
                .get_mut(&game_id)
                .and_then(|room| room.sim.forfeit(&user_id, now_ms).ok());
            if let Some(GameEvent::Ended { winner_id, stats }) = forfeit {
                self.handle_ended(&game_id, winner_id, stats, outbox);
            }
        }
    }

    fn username_of(&self, user_id: &str) -> String {
        self.connections
            .get(user_id)
            .map(|c| c.username.clone())
            .unwrap_or_else(|| user_id.to_string())
    }

    fn flush(&self, outbox: Outbox) {
        for (user_id, event) in outbox {
            if let Some(connection) = self.connections.get(&user_id) {
                // A failed send means the writer task is gone; the
                // disconnect message will clean up shortly.
                let _ = connection.sender.send(event);
            }
        }
    }
}

fn opponent_info(participant: &Participant) -> OpponentInfo {
    OpponentInfo {
        id: participant.id().to_string(),
        username: participant.name().to_string(),
        is_ai: participant.is_ai(),
    }
}

fn error_event(message: &str) -> ServerEvent {
    ServerEvent::Error {
        message: message.to_string(),
    }
}
