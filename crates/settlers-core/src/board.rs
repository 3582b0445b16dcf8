//! Game board representation including tiles, nodes, edges and harbors.
//!
//! This module contains:
//! - Resource types and tile kinds
//! - The arena-style board: dense `tiles`, `nodes` and `edges` vectors
//! - Building types (towns, cities, roads)
//! - Harbor trading descriptors
//! - Board validation and query methods
//!
//! Node and edge ids are indices into their vectors. The generator guarantees
//! they are contiguous, so every lookup is a bounds-checked `get`.

use crate::hex::{HexCoord, Point};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Player identifier (index into the game's player list)
pub type PlayerId = u8;
/// Index into [`Board::tiles`]
pub type TileId = usize;
/// Index into [`Board::nodes`]
pub type NodeId = usize;
/// Index into [`Board::edges`]
pub type EdgeId = usize;

/// Tradeable resource types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Wood,
    Brick,
    Wheat,
    Sheep,
    Ore,
}

impl Resource {
    /// All resource types
    pub const ALL: [Resource; 5] = [
        Resource::Wood,
        Resource::Brick,
        Resource::Wheat,
        Resource::Sheep,
        Resource::Ore,
    ];
}

/// Type of hex tile on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TileKind {
    /// Produces a resource when its number is rolled
    Resource(Resource),
    /// No production; holds the robber at game start
    Desert,
    /// Surrounds the playable area; may carry a harbor
    Water,
}

impl TileKind {
    pub fn is_land(&self) -> bool {
        !matches!(self, TileKind::Water)
    }
}

/// Maritime trading bonus: `ratio` units of `resource` (or of anything, when
/// `resource` is `None`) buy one unit of any other resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Harbor {
    pub ratio: u32,
    pub resource: Option<Resource>,
}

impl Harbor {
    /// 3:1 trade any resource
    pub const fn generic() -> Self {
        Self {
            ratio: 3,
            resource: None,
        }
    }

    /// 2:1 trade for a specific resource
    pub const fn specific(resource: Resource) -> Self {
        Self {
            ratio: 2,
            resource: Some(resource),
        }
    }

    /// Whether this harbor improves the rate for `resource`
    pub fn applies_to(&self, resource: Resource) -> bool {
        self.resource.map_or(true, |r| r == resource)
    }
}

/// A single hex tile on the board
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    /// Position on the hex grid
    pub coord: HexCoord,
    /// Pixel center (pointy-top)
    pub center: Point,
    /// What type of tile (resource, desert, water)
    pub kind: TileKind,
    /// Dice number that triggers production (2-12, None for desert/water)
    pub number: Option<u8>,
    /// Whether the robber is currently on this tile
    pub has_robber: bool,
    /// Harbor carried by a water tile
    pub harbor: Option<Harbor>,
}

impl Tile {
    /// Check if this tile produces resources
    pub fn is_productive(&self) -> bool {
        matches!(self.kind, TileKind::Resource(_)) && !self.has_robber
    }

    /// Get the resource this tile produces, if any
    pub fn resource(&self) -> Option<Resource> {
        match self.kind {
            TileKind::Resource(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_land(&self) -> bool {
        self.kind.is_land()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildingKind {
    /// 1 VP, 1 resource per adjacent producing tile
    Town,
    /// 2 VP, 2 resources per adjacent producing tile
    City,
}

/// What's built on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub owner: PlayerId,
    pub kind: BuildingKind,
}

impl Building {
    /// Victory points provided by this building
    pub fn victory_points(&self) -> u32 {
        match self.kind {
            BuildingKind::Town => 1,
            BuildingKind::City => 2,
        }
    }

    /// Resource multiplier (how many resources per production)
    pub fn resource_multiplier(&self) -> u32 {
        match self.kind {
            BuildingKind::Town => 1,
            BuildingKind::City => 2,
        }
    }
}

/// An intersection where up to three tiles meet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub position: Point,
    /// Indices of the tiles touching this node (1-3)
    pub tiles: Vec<TileId>,
    pub building: Option<Building>,
    /// Harbors reachable from this node
    pub harbors: Vec<Harbor>,
    /// Incident edges, filled in once the edge list is final
    pub edges: Vec<EdgeId>,
    /// True iff at least one adjacent tile is land
    pub can_build: bool,
}

impl Node {
    pub fn owner(&self) -> Option<PlayerId> {
        self.building.map(|b| b.owner)
    }
}

/// A road slot between two adjacent nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub nodes: [NodeId; 2],
    pub owner: Option<PlayerId>,
}

impl Edge {
    /// The endpoint opposite `node`
    pub fn other_end(&self, node: NodeId) -> NodeId {
        if self.nodes[0] == node {
            self.nodes[1]
        } else {
            self.nodes[0]
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }
}

/// The complete game board
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Board {
    pub tiles: Vec<Tile>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Board {
    // ==================== Query Methods ====================

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Get all land tiles (non-water) with their ids
    pub fn land_tiles(&self) -> impl Iterator<Item = (TileId, &Tile)> {
        self.tiles.iter().enumerate().filter(|(_, t)| t.is_land())
    }

    /// The tile currently holding the robber
    pub fn robber_tile(&self) -> Option<TileId> {
        self.tiles.iter().position(|t| t.has_robber)
    }

    /// Edges incident to a node
    pub fn edges_at(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.nodes
            .get(node)
            .into_iter()
            .flat_map(|n| n.edges.iter())
            .filter_map(|&e| self.edges.get(e))
    }

    /// Nodes one edge away from `node`
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        self.edges_at(node).map(|e| e.other_end(node)).collect()
    }

    /// Nodes touching a tile
    pub fn nodes_of_tile(&self, tile: TileId) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.tiles.contains(&tile))
    }

    /// Number of towns and cities on the board
    pub fn building_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.building.is_some()).count()
    }

    /// Buildings owned by a player
    pub fn buildings_of(&self, player: PlayerId) -> impl Iterator<Item = (&Node, Building)> {
        self.nodes.iter().filter_map(move |n| match n.building {
            Some(b) if b.owner == player => Some((n, b)),
            _ => None,
        })
    }

    /// Get all harbors a player has access to (through their buildings)
    pub fn player_harbors(&self, player: PlayerId) -> Vec<Harbor> {
        let mut harbors = Vec::new();
        for (node, _) in self.buildings_of(player) {
            for harbor in &node.harbors {
                if !harbors.contains(harbor) {
                    harbors.push(*harbor);
                }
            }
        }
        harbors
    }

    /// Cheapest ratio at which `player` can trade away `resource`
    pub fn trade_ratio(&self, player: PlayerId, resource: Resource, bank_ratio: u32) -> u32 {
        self.player_harbors(player)
            .iter()
            .filter(|h| h.applies_to(resource))
            .map(|h| h.ratio)
            .fold(bank_ratio, u32::min)
    }

    /// Players with buildings on a tile's corners
    pub fn players_adjacent_to_tile(&self, tile: TileId) -> BTreeSet<PlayerId> {
        self.nodes_of_tile(tile).filter_map(Node::owner).collect()
    }

    // ==================== Validation Methods ====================

    /// Check if a node satisfies the distance rule (no adjacent buildings)
    pub fn satisfies_distance_rule(&self, node: NodeId) -> bool {
        self.neighbors(node)
            .into_iter()
            .all(|adj| self.nodes.get(adj).is_some_and(|n| n.building.is_none()))
    }

    /// Check if a node is connected to a player's road network
    pub fn is_connected_to_road(&self, node: NodeId, player: PlayerId) -> bool {
        self.edges_at(node).any(|e| e.owner == Some(player))
    }

    /// Check if an edge connects to a player's network (a building, or a road
    /// through a node not held by an opponent)
    pub fn is_connected_to_network(&self, edge: EdgeId, player: PlayerId) -> bool {
        let Some(edge) = self.edges.get(edge) else {
            return false;
        };
        for endpoint in edge.nodes {
            let owner = self.nodes.get(endpoint).and_then(Node::owner);
            if owner == Some(player) {
                return true;
            }
            if owner.is_none()
                && self
                    .edges_at(endpoint)
                    .any(|adj| adj.id != edge.id && adj.owner == Some(player))
            {
                return true;
            }
        }
        false
    }

    /// Whether a town may go on `node`: empty, buildable, distance rule, and
    /// (outside setup) connected to the player's roads
    pub fn is_valid_town_site(&self, node: NodeId, player: PlayerId, is_setup: bool) -> bool {
        self.nodes.get(node).is_some_and(|n| {
            n.building.is_none()
                && n.can_build
                && self.satisfies_distance_rule(node)
                && (is_setup || self.is_connected_to_road(node, player))
        })
    }

    /// Get valid town spots for a player, ordered by node id
    pub fn valid_town_sites(&self, player: PlayerId, is_setup: bool) -> Vec<NodeId> {
        (0..self.nodes.len())
            .filter(|&id| self.is_valid_town_site(id, player, is_setup))
            .collect()
    }

    /// Get valid road spots for a player, ordered by edge id
    pub fn valid_road_sites(&self, player: PlayerId) -> Vec<EdgeId> {
        self.edges
            .iter()
            .filter(|e| e.owner.is_none() && self.is_connected_to_network(e.id, player))
            .map(|e| e.id)
            .collect()
    }

    /// Get valid city upgrade spots for a player
    pub fn valid_city_sites(&self, player: PlayerId) -> Vec<NodeId> {
        self.buildings_of(player)
            .filter(|(_, b)| b.kind == BuildingKind::Town)
            .map(|(n, _)| n.id)
            .collect()
    }

    // ==================== Mutation Methods ====================

    /// Place a town (assumes validation already done)
    pub fn place_town(&mut self, node: NodeId, player: PlayerId) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.building = Some(Building {
                owner: player,
                kind: BuildingKind::Town,
            });
        }
    }

    /// Upgrade a town to a city
    pub fn upgrade_to_city(&mut self, node: NodeId, player: PlayerId) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.building = Some(Building {
                owner: player,
                kind: BuildingKind::City,
            });
        }
    }

    /// Place a road
    pub fn place_road(&mut self, edge: EdgeId, player: PlayerId) {
        if let Some(e) = self.edges.get_mut(edge) {
            e.owner = Some(player);
        }
    }

    /// Move the robber to a new tile
    pub fn move_robber(&mut self, tile: TileId) {
        for (id, t) in self.tiles.iter_mut().enumerate() {
            t.has_robber = id == tile;
        }
    }

    // ==================== Resource Distribution ====================

    /// Calculate resources produced for a dice roll
    pub fn resources_for_roll(&self, roll: u8) -> BTreeMap<PlayerId, BTreeMap<Resource, u32>> {
        let mut distribution: BTreeMap<PlayerId, BTreeMap<Resource, u32>> = BTreeMap::new();

        for node in &self.nodes {
            let Some(building) = node.building else {
                continue;
            };
            for &tile_id in &node.tiles {
                let Some(tile) = self.tiles.get(tile_id) else {
                    continue;
                };
                // Skip if wrong number, robber present, or not a resource tile
                if tile.number != Some(roll) || !tile.is_productive() {
                    continue;
                }
                if let Some(resource) = tile.resource() {
                    *distribution
                        .entry(building.owner)
                        .or_default()
                        .entry(resource)
                        .or_insert(0) += building.resource_multiplier();
                }
            }
        }

        distribution
    }

    // ==================== Longest Road Calculation ====================

    /// Calculate the longest road for a player
    pub fn longest_road(&self, player: PlayerId) -> u32 {
        let player_roads: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|e| e.owner == Some(player))
            .map(|e| e.id)
            .collect();

        let mut max_length = 0;

        // Try starting from each road
        for start_road in player_roads {
            let length = self.dfs_road_length(player, start_road, &mut HashSet::new());
            max_length = max_length.max(length);
        }

        max_length
    }

    /// DFS to find longest road path from a starting edge
    fn dfs_road_length(&self, player: PlayerId, current: EdgeId, visited: &mut HashSet<EdgeId>) -> u32 {
        if !visited.insert(current) {
            return 0;
        }

        let mut max_continuation = 0;

        for endpoint in self.edges[current].nodes {
            // Can't pass through enemy building
            if self.nodes[endpoint].owner().is_some_and(|o| o != player) {
                continue;
            }

            for adj in self.edges_at(endpoint) {
                if adj.id != current && adj.owner == Some(player) && !visited.contains(&adj.id) {
                    let continuation = self.dfs_road_length(player, adj.id, visited);
                    max_continuation = max_continuation.max(continuation);
                }
            }
        }

        visited.remove(&current);
        1 + max_continuation
    }
}
