//! Procedural board generation.
//!
//! `generate` turns a radius and an RNG into a [`Board`]: land hexes with
//! shuffled resources and number tokens, an optional ring of water hexes with
//! harbors, and the deduplicated node/edge graph over all tile corners.
//!
//! Corner deduplication uses a temporary `(rounded x, rounded y) -> NodeId`
//! table that is dropped once the arena vectors are built.

use crate::board::{Board, Edge, EdgeId, Harbor, Node, NodeId, Resource, Tile, TileId, TileKind};
use crate::hex::{HexCoord, Point};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Decimal places kept when keying corner points
const COORD_PRECISION: i32 = 3;

/// Placed harbors must be at least this many hex steps apart
const HARBOR_MIN_SEPARATION: u32 = 2;

/// Greedy harbor passes before settling for the fullest placement
const HARBOR_PLACEMENT_ATTEMPTS: usize = 32;

/// Resource multiset for the 19-hex board (None is the desert)
const BASE_RESOURCES: [Option<Resource>; 19] = [
    Some(Resource::Wood),
    Some(Resource::Wood),
    Some(Resource::Wood),
    Some(Resource::Wood),
    Some(Resource::Sheep),
    Some(Resource::Sheep),
    Some(Resource::Sheep),
    Some(Resource::Sheep),
    Some(Resource::Wheat),
    Some(Resource::Wheat),
    Some(Resource::Wheat),
    Some(Resource::Wheat),
    Some(Resource::Brick),
    Some(Resource::Brick),
    Some(Resource::Brick),
    Some(Resource::Ore),
    Some(Resource::Ore),
    Some(Resource::Ore),
    None,
];

/// Number tokens: one of each except 2 and 12, two of 3-6 and 8-11, never 7
const NUMBER_TOKENS: [u8; 18] = [2, 3, 3, 4, 4, 5, 5, 6, 6, 8, 8, 9, 9, 10, 10, 11, 11, 12];

/// Five 2:1 single-resource harbors and four generic 3:1 harbors
const HARBOR_SET: [Harbor; 9] = [
    Harbor::specific(Resource::Wood),
    Harbor::specific(Resource::Brick),
    Harbor::specific(Resource::Wheat),
    Harbor::specific(Resource::Sheep),
    Harbor::specific(Resource::Ore),
    Harbor::generic(),
    Harbor::generic(),
    Harbor::generic(),
    Harbor::generic(),
];

/// Board generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoardConfig {
    /// Land hexes lie within this many steps of the center
    pub radius: u32,
    /// Add a water ring at `radius + 1` carrying harbors
    pub harbors: bool,
    /// Pixel distance from a hex center to its corners
    pub hex_size: f64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            radius: 2,
            harbors: true,
            hex_size: 60.0,
        }
    }
}

/// Build a board. Deterministic for a given RNG state.
pub fn generate<R: Rng>(config: &BoardConfig, rng: &mut R) -> Board {
    let mut tiles = land_tiles(config, rng);
    let land_count = tiles.len();

    if config.harbors {
        for coord in HexCoord::ring(config.radius + 1) {
            tiles.push(Tile {
                coord,
                center: coord.to_pixel(config.hex_size),
                kind: TileKind::Water,
                number: None,
                has_robber: false,
                harbor: None,
            });
        }
        let placed = place_harbors(&tiles, rng);
        for (tile, harbor) in &placed {
            tiles[*tile].harbor = Some(*harbor);
        }
        if placed.len() < HARBOR_SET.len() {
            debug!(placed = placed.len(), "harbor placement incomplete");
        }
    }

    let mut arena = Arena::default();
    let tile_corners: Vec<[NodeId; 6]> = tiles
        .iter()
        .enumerate()
        .map(|(id, tile)| arena.add_tile(id, tile.coord.corners(config.hex_size)))
        .collect();

    for node in &mut arena.nodes {
        node.can_build = node.tiles.iter().any(|&t| tiles[t].is_land());
    }

    // Harbor descriptors go to the water tile's coastal corners
    for (tile_id, tile) in tiles.iter().enumerate() {
        let Some(harbor) = tile.harbor else {
            continue;
        };
        for &node in &tile_corners[tile_id] {
            if arena.nodes[node].can_build {
                arena.nodes[node].harbors.push(harbor);
            }
        }
    }

    reassign_stranded_harbors(&mut arena.nodes);
    let (nodes, edges) = arena.prune(&tiles);

    debug!(
        radius = config.radius,
        land = land_count,
        tiles = tiles.len(),
        nodes = nodes.len(),
        edges = edges.len(),
        "generated board"
    );

    let board = Board { tiles, nodes, edges };
    assert_eq!(
        board.tiles.iter().filter(|t| t.has_robber).count(),
        1,
        "generated board must hold exactly one robber"
    );
    board
}

/// Shuffle resources and numbers over the land hexes
fn land_tiles<R: Rng>(config: &BoardConfig, rng: &mut R) -> Vec<Tile> {
    let coords = HexCoord::within(config.radius);

    let mut resources = resource_pool(coords.len());
    resources.shuffle(rng);

    let producing = resources.iter().filter(|r| r.is_some()).count();
    let mut numbers = number_pool(producing);
    numbers.shuffle(rng);
    let mut numbers = numbers.into_iter();

    coords
        .into_iter()
        .zip(resources)
        .map(|(coord, resource)| {
            let center = coord.to_pixel(config.hex_size);
            match resource {
                Some(resource) => Tile {
                    coord,
                    center,
                    kind: TileKind::Resource(resource),
                    number: numbers.next(),
                    has_robber: false,
                    harbor: None,
                },
                // Robber starts on desert
                None => Tile {
                    coord,
                    center,
                    kind: TileKind::Desert,
                    number: None,
                    has_robber: true,
                    harbor: None,
                },
            }
        })
        .collect()
}

/// Resource labels for `count` hexes: exactly one desert, the rest cycling
/// through the base distribution
fn resource_pool(count: usize) -> Vec<Option<Resource>> {
    if count == 0 {
        return Vec::new();
    }
    let producing = BASE_RESOURCES.iter().filter(|r| r.is_some()).copied();
    std::iter::once(None)
        .chain(producing.cycle().take(count - 1))
        .collect()
}

fn number_pool(count: usize) -> Vec<u8> {
    NUMBER_TOKENS.iter().copied().cycle().take(count).collect()
}

/// Greedy, non-backtracking harbor placement over water hexes touching land.
///
/// Each pass walks the candidates around the ring from a random start and
/// drops each shuffled harbor on the first free candidate far enough from the
/// ones already placed. A pass may place fewer than the full set; the first
/// complete pass wins, otherwise the fullest one.
fn place_harbors<R: Rng>(tiles: &[Tile], rng: &mut R) -> Vec<(TileId, Harbor)> {
    let land: Vec<HexCoord> = tiles.iter().filter(|t| t.is_land()).map(|t| t.coord).collect();
    let mut candidates: Vec<TileId> = tiles
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_land() && t.coord.neighbors().iter().any(|n| land.contains(n)))
        .map(|(id, _)| id)
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }
    candidates.sort_by(|&a, &b| {
        let angle = |t: TileId| tiles[t].center.y.atan2(tiles[t].center.x);
        angle(a).total_cmp(&angle(b))
    });

    let mut best: Vec<(TileId, Harbor)> = Vec::new();
    for _ in 0..HARBOR_PLACEMENT_ATTEMPTS {
        let mut harbors = HARBOR_SET.to_vec();
        harbors.shuffle(rng);
        let mut order = candidates.clone();
        let start = rng.gen_range(0..order.len());
        order.rotate_left(start);

        let mut placed: Vec<(TileId, Harbor)> = Vec::new();
        for harbor in harbors {
            let spot = order.iter().copied().find(|&c| {
                placed.iter().all(|&(p, _)| {
                    p != c && tiles[p].coord.distance_to(&tiles[c].coord) >= HARBOR_MIN_SEPARATION
                })
            });
            if let Some(spot) = spot {
                placed.push((spot, harbor));
            }
        }

        if placed.len() > best.len() {
            best = placed;
        }
        if best.len() == HARBOR_SET.len() {
            break;
        }
    }
    best
}

/// Move harbors off nodes that will be pruned onto the nearest buildable node
fn reassign_stranded_harbors(nodes: &mut [Node]) {
    let stranded: Vec<NodeId> = nodes
        .iter()
        .filter(|n| !n.can_build && !n.harbors.is_empty())
        .map(|n| n.id)
        .collect();

    for from in stranded {
        let position = nodes[from].position;
        let nearest = nodes
            .iter()
            .filter(|n| n.can_build)
            .min_by(|a, b| {
                position
                    .distance_to(&a.position)
                    .total_cmp(&position.distance_to(&b.position))
            })
            .map(|n| n.id);
        let Some(to) = nearest else {
            continue;
        };
        let harbors = std::mem::take(&mut nodes[from].harbors);
        for harbor in harbors {
            if !nodes[to].harbors.contains(&harbor) {
                nodes[to].harbors.push(harbor);
            }
        }
    }
}

/// Node/edge vectors plus the lookup tables used while building them
#[derive(Default)]
struct Arena {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Tiles bordering each edge, parallel to `edges`
    edge_tiles: Vec<Vec<TileId>>,
    node_lookup: HashMap<(i64, i64), NodeId>,
    edge_lookup: HashMap<(NodeId, NodeId), EdgeId>,
}

impl Arena {
    /// Register a tile's corners and boundary segments, returning its corner node ids
    fn add_tile(&mut self, tile: TileId, corners: [Point; 6]) -> [NodeId; 6] {
        let ids = corners.map(|corner| self.node_at(corner, tile));
        for i in 0..6 {
            self.edge_between(ids[i], ids[(i + 1) % 6], tile);
        }
        ids
    }

    fn node_at(&mut self, position: Point, tile: TileId) -> NodeId {
        let key = position.rounded_key(COORD_PRECISION);
        let id = *self.node_lookup.entry(key).or_insert_with(|| {
            self.nodes.push(Node {
                id: self.nodes.len(),
                position,
                tiles: Vec::new(),
                building: None,
                harbors: Vec::new(),
                edges: Vec::new(),
                can_build: false,
            });
            self.nodes.len() - 1
        });
        if !self.nodes[id].tiles.contains(&tile) {
            self.nodes[id].tiles.push(tile);
        }
        id
    }

    fn edge_between(&mut self, a: NodeId, b: NodeId, tile: TileId) {
        let key = (a.min(b), a.max(b));
        let id = *self.edge_lookup.entry(key).or_insert_with(|| {
            self.edges.push(Edge {
                id: self.edges.len(),
                nodes: [key.0, key.1],
                owner: None,
            });
            self.edge_tiles.push(Vec::new());
            self.edges.len() - 1
        });
        self.edge_tiles[id].push(tile);
    }

    /// Drop non-buildable nodes and edges that lose an endpoint or border no
    /// land, renumbering the survivors densely
    fn prune(self, tiles: &[Tile]) -> (Vec<Node>, Vec<Edge>) {
        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut nodes = Vec::new();
        for mut node in self.nodes {
            if !node.can_build {
                continue;
            }
            remap[node.id] = Some(nodes.len());
            node.id = nodes.len();
            nodes.push(node);
        }

        let mut edges = Vec::new();
        for (edge, bordering) in self.edges.into_iter().zip(self.edge_tiles) {
            if !bordering.iter().any(|&t| tiles[t].is_land()) {
                continue;
            }
            if let (Some(a), Some(b)) = (remap[edge.nodes[0]], remap[edge.nodes[1]]) {
                edges.push(Edge {
                    id: edges.len(),
                    nodes: [a, b],
                    owner: None,
                });
            }
        }

        for edge in &edges {
            for endpoint in edge.nodes {
                nodes[endpoint].edges.push(edge.id);
            }
        }

        (nodes, edges)
    }
}
