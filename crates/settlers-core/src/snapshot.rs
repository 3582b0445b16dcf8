//! Read-only view of a game handed to decision clients.
//!
//! The snapshot carries what an external agent needs to pick one action:
//! hands, public scores, open build sites and the legal candidates. The
//! viewer's own development cards are listed by kind; opponents' only as counts.

use crate::actions::Action;
use crate::board::{EdgeId, NodeId, PlayerId, Resource, TileId};
use crate::game::{GameState, TurnPhase};
use crate::legal::legal_actions;
use crate::player::{DevCardKind, ResourceHand};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSnapshot {
    pub game_id: Uuid,
    pub turn: u32,
    /// Player the snapshot was taken for
    pub viewer: PlayerId,
    pub current_player: PlayerId,
    pub phase: TurnPhase,
    pub players: Vec<PlayerView>,
    pub open_nodes: Vec<OpenNode>,
    pub open_edges: Vec<OpenEdge>,
    pub robber_tile: Option<TileId>,
    pub dev_cards_remaining: usize,
    pub last_roll: Option<[u8; 2]>,
    pub legal_actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub resources: ResourceHand,
    /// Victory points excluding hidden VP cards
    pub public_victory_points: u32,
    pub dev_cards: DevCardSummary,
    pub knights_played: u32,
    pub has_longest_road: bool,
    pub has_largest_army: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevCardSummary {
    pub playable: usize,
    pub locked: usize,
    pub played: u32,
    /// Card kinds in hand, only filled in for the viewer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<DevCardKind>>,
}

/// An empty buildable node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenNode {
    pub id: NodeId,
    pub tiles: Vec<TileView>,
    pub neighbors: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileView {
    pub id: TileId,
    pub resource: Option<Resource>,
    pub number: Option<u8>,
}

/// An unowned edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenEdge {
    pub id: EdgeId,
    pub nodes: [NodeId; 2],
}

impl AgentSnapshot {
    pub fn for_player(state: &GameState, viewer: PlayerId) -> Self {
        let board = &state.board;

        let players = state
            .players
            .iter()
            .map(|p| PlayerView {
                id: p.id,
                name: p.name.clone(),
                resources: p.resources.clone(),
                public_victory_points: p.public_vp(),
                dev_cards: DevCardSummary {
                    playable: p.dev_cards.iter().filter(|c| c.can_play).count(),
                    locked: p.dev_cards.iter().filter(|c| !c.can_play).count(),
                    played: p.played_count(),
                    hand: (p.id == viewer).then(|| p.dev_cards.iter().map(|c| c.kind).collect()),
                },
                knights_played: p.knights_played,
                has_longest_road: p.has_longest_road,
                has_largest_army: p.has_largest_army,
            })
            .collect();

        let open_nodes = board
            .nodes
            .iter()
            .filter(|n| n.can_build && n.building.is_none())
            .map(|n| OpenNode {
                id: n.id,
                tiles: n
                    .tiles
                    .iter()
                    .filter_map(|&t| {
                        board.tile(t).map(|tile| TileView {
                            id: t,
                            resource: tile.resource(),
                            number: tile.number,
                        })
                    })
                    .collect(),
                neighbors: board.neighbors(n.id),
            })
            .collect();

        let open_edges = board
            .edges
            .iter()
            .filter(|e| e.owner.is_none())
            .map(|e| OpenEdge {
                id: e.id,
                nodes: e.nodes,
            })
            .collect();

        Self {
            game_id: state.id,
            turn: state.turn,
            viewer,
            current_player: state.current_player,
            phase: state.phase,
            players,
            open_nodes,
            open_edges,
            robber_tile: board.robber_tile(),
            dev_cards_remaining: state.dev_cards_remaining(),
            last_roll: state.last_roll,
            legal_actions: legal_actions(state, viewer),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::player::DevCard;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_game_snapshot() {
        let state = GameState::new(GameConfig::default().with_seed(3).with_players(3)).unwrap();
        let snapshot = AgentSnapshot::for_player(&state, 0);

        assert_eq!(snapshot.players.len(), 3);
        assert_eq!(snapshot.open_nodes.len(), 54);
        assert_eq!(snapshot.open_edges.len(), 72);
        assert_eq!(snapshot.dev_cards_remaining, 25);
        assert_eq!(snapshot.robber_tile, state.board.robber_tile());
        assert_eq!(snapshot.legal_actions, legal_actions(&state, 0));
        assert!(AgentSnapshot::for_player(&state, 1).legal_actions.is_empty());
    }

    #[test]
    fn test_only_viewer_sees_card_kinds() {
        let mut state = GameState::new(GameConfig::default().with_seed(4).with_players(2)).unwrap();
        state.players[1].dev_cards.push(DevCard {
            kind: DevCardKind::VictoryPoint,
            can_play: false,
        });
        state.players[1].victory_points = 1;

        let mine = AgentSnapshot::for_player(&state, 1);
        assert_eq!(mine.players[1].dev_cards.hand, Some(vec![DevCardKind::VictoryPoint]));
        assert_eq!(mine.players[1].dev_cards.locked, 1);

        let theirs = AgentSnapshot::for_player(&state, 0);
        assert_eq!(theirs.players[1].dev_cards.hand, None);
        assert_eq!(theirs.players[1].public_victory_points, 0);
    }

    #[test]
    fn test_open_sites_shrink_after_building() {
        let mut state = GameState::new(GameConfig::default().with_seed(5).with_players(2)).unwrap();
        let node = state.board.valid_town_sites(0, true)[0];
        state.build_town(node, 0).unwrap();

        let snapshot = AgentSnapshot::for_player(&state, 0);
        assert!(snapshot.open_nodes.iter().all(|n| n.id != node));
        assert_eq!(snapshot.open_nodes.len(), 53);

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"openNodes\""));
        assert!(json.contains("\"legalActions\""));
    }
}
