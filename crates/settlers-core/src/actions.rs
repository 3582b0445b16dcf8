//! Game actions that players can take.
//!
//! This module defines every action the engine accepts and the events
//! appended to the game log when an action succeeds.
//!
//! Actions travel as `{"type": "<kind>", "payload": {...}}`; events as
//! `{"id", "gameId", "turn", "timestamp", "type", "details"}`.

use crate::board::{EdgeId, NodeId, PlayerId, Resource, TileId};
use crate::player::ResourceHand;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// All possible actions a player can take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    // ==================== Turn Actions ====================
    /// Roll the dice (must be done at start of turn)
    RollDice,
    /// Move the robber after a 7 or a knight
    MoveRobber { hex_id: TileId },

    // ==================== Building ====================
    BuildRoad {
        edge_id: EdgeId,
        player_id: PlayerId,
        /// Spend a free-road credit instead of resources
        #[serde(default)]
        free: bool,
    },
    BuildTown { node_id: NodeId, player_id: PlayerId },
    BuildCity { node_id: NodeId, player_id: PlayerId },

    // ==================== Trading ====================
    /// Trade with the bank at the player's best harbor ratio
    HarborTrade {
        player_id: PlayerId,
        give: Resource,
        receive: Resource,
    },

    // ==================== Development Cards ====================
    BuyDevCard { player_id: PlayerId },
    PlayKnight { player_id: PlayerId },
    PlayRoadBuilding { player_id: PlayerId },
    PlayYearOfPlenty {
        player_id: PlayerId,
        resources: [Resource; 2],
    },
    PlayMonopoly { player_id: PlayerId, resource: Resource },

    // ==================== Turn Management ====================
    EndTurn,
}

impl Action {
    /// Wire name of the action kind
    pub fn kind(&self) -> &'static str {
        match self {
            Action::RollDice => "rollDice",
            Action::MoveRobber { .. } => "moveRobber",
            Action::BuildRoad { .. } => "buildRoad",
            Action::BuildTown { .. } => "buildTown",
            Action::BuildCity { .. } => "buildCity",
            Action::HarborTrade { .. } => "harborTrade",
            Action::BuyDevCard { .. } => "buyDevCard",
            Action::PlayKnight { .. } => "playKnight",
            Action::PlayRoadBuilding { .. } => "playRoadBuilding",
            Action::PlayYearOfPlenty { .. } => "playYearOfPlenty",
            Action::PlayMonopoly { .. } => "playMonopoly",
            Action::EndTurn => "endTurn",
        }
    }

    /// The acting player named in the payload; `None` for actions that act as
    /// the current player
    pub fn player_id(&self) -> Option<PlayerId> {
        match *self {
            Action::RollDice | Action::MoveRobber { .. } | Action::EndTurn => None,
            Action::BuildRoad { player_id, .. }
            | Action::BuildTown { player_id, .. }
            | Action::BuildCity { player_id, .. }
            | Action::HarborTrade { player_id, .. }
            | Action::BuyDevCard { player_id }
            | Action::PlayKnight { player_id }
            | Action::PlayRoadBuilding { player_id }
            | Action::PlayYearOfPlenty { player_id, .. }
            | Action::PlayMonopoly { player_id, .. } => Some(player_id),
        }
    }
}

/// An entry in the game's append-only log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    /// Sequence number within the game, starting at 0
    pub id: u64,
    pub game_id: Uuid,
    pub turn: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "details",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum EventKind {
    DiceRolled {
        player: PlayerId,
        dice: [u8; 2],
        total: u8,
        /// Resources credited per player (empty on a 7)
        produced: BTreeMap<PlayerId, ResourceHand>,
    },

    /// Hands over the limit shed half after a 7
    CardsDiscarded {
        player: PlayerId,
        discarded: ResourceHand,
    },

    RobberMoved {
        player: PlayerId,
        from: Option<TileId>,
        to: TileId,
        stolen_from: Option<PlayerId>,
    },

    RoadBuilt {
        player: PlayerId,
        edge: EdgeId,
        free: bool,
    },

    TownBuilt { player: PlayerId, node: NodeId },

    CityBuilt { player: PlayerId, node: NodeId },

    /// Resources granted for the second setup town
    SetupResourcesGranted {
        player: PlayerId,
        resources: ResourceHand,
    },

    HarborTraded {
        player: PlayerId,
        gave: Resource,
        gave_count: u32,
        received: Resource,
    },

    DevCardBought { player: PlayerId },

    KnightPlayed { player: PlayerId },

    RoadBuildingPlayed { player: PlayerId },

    YearOfPlentyPlayed {
        player: PlayerId,
        resources: [Resource; 2],
    },

    MonopolyPlayed {
        player: PlayerId,
        resource: Resource,
        total_taken: u32,
    },

    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },

    LongestRoadChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        length: u32,
    },

    LargestArmyChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        knights: u32,
    },

    BoardRerolled,

    GameWon {
        player: PlayerId,
        victory_points: u32,
    },
}
