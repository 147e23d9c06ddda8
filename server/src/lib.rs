//! # Pong Game Server
//!
//! Authoritative server for real-time multiplayer Pong. The server owns
//! the only real copy of every match: clients send directional intents
//! and receive state snapshots, never positions of their own invention.
//!
//! ## Architecture
//!
//! All mutable state lives inside a single session actor
//! ([`session::SessionManager`]) fed by an unbounded message channel.
//! Connection tasks ([`network`]) parse WebSocket frames into protocol
//! events and forward them; a fixed-rate tick drives every room's
//! simulation ([`game::MatchSim`]) through pure physics routines
//! ([`physics`]). Because no state is shared between tasks there are no
//! locks around game data and no tick-versus-input races.
//!
//! ## Match lifecycle
//!
//! Players enter through the matchmaking queue ([`matchmaking`]) or a
//! tournament bracket ([`tournament`]), play inside a room ([`rooms`]),
//! and leave a record behind ([`persistence`]). Single-player rooms run
//! a server-side opponent ([`ai`]) that is fed into the simulation
//! through the same input path as a human.

pub mod ai;
pub mod game;
pub mod matchmaking;
pub mod network;
pub mod persistence;
pub mod physics;
pub mod rooms;
pub mod session;
pub mod tournament;
