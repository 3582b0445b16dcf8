//! Settlers - a hex settlement game engine
//!
//! This crate provides the core game logic, including:
//! - Hex geometry and a seeded board generator with harbors
//! - Player state, resources and development cards
//! - Game state machine with full rule enforcement and an event log
//! - Legal-action enumeration and snapshots for automated players
//!
//! # Architecture
//!
//! The engine does no I/O. Hosts (the websocket server, tests, bots) drive a
//! [`GameState`] by applying [`Action`]s and reading back [`GameEvent`]s.
//!
//! # Modules
//!
//! - [`hex`]: Axial hex coordinates and corner geometry
//! - [`generator`]: Board generation from a [`BoardConfig`]
//! - [`board`]: Tiles, nodes and edges with placement rules
//! - [`player`]: Player state, resource hands and development cards
//! - [`game`]: Game state machine
//! - [`legal`]: Legal actions for a player
//! - [`snapshot`]: Per-player views for decision clients
//! - [`bot`]: Heuristic bots

pub mod actions;
pub mod board;
pub mod bot;
pub mod config;
pub mod game;
pub mod generator;
pub mod hex;
pub mod legal;
pub mod player;
pub mod snapshot;

// Re-export commonly used types
pub use actions::{Action, EventKind, GameEvent};
pub use board::{Board, Building, BuildingKind, EdgeId, Harbor, NodeId, PlayerId, Resource, Tile, TileId, TileKind};
pub use bot::{Bot, BotDifficulty};
pub use config::{GameConfig, RuleConfig};
pub use game::{GameError, GameState, RobberTrigger, TurnPhase};
pub use generator::{generate, BoardConfig};
pub use hex::{HexCoord, Point};
pub use legal::legal_actions;
pub use player::{DevCard, DevCardKind, Player, PlayerColor, ResourceHand};
pub use snapshot::AgentSnapshot;
