//! Core game state machine.
//!
//! `GameState` owns the board, the players and the event log. Every public
//! operation validates first and only then mutates, so a returned error means
//! nothing changed. A successful operation appends its event to the log,
//! runs the award/victory hook and returns the event.

use crate::actions::{Action, EventKind, GameEvent};
use crate::board::{Board, BuildingKind, EdgeId, NodeId, PlayerId, Resource, Tile, TileId};
use crate::config::{GameConfig, MAX_PLAYERS, MIN_PLAYERS};
use crate::generator;
use crate::player::{costs, DevCardKind, Player, ResourceHand};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Minimum road length for Longest Road
const MIN_LONGEST_ROAD: u32 = 5;

/// Minimum knights for Largest Army
const MIN_LARGEST_ARMY: u32 = 3;

/// Towns each player places during setup
const SETUP_TOWNS: usize = 2;

/// Why the robber has to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RobberTrigger {
    SevenRolled,
    Knight,
}

/// Where the current turn stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TurnPhase {
    /// Initial placement: one free town and one free road per turn
    Setup,
    /// Before rolling dice at start of turn
    NotRolled,
    /// The robber must move before anything else
    RobberPending { trigger: RobberTrigger },
    /// Build, trade and play cards in any order
    Rolled,
}

/// Errors that can occur when applying actions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Game needs 2-4 players, got {0}")]
    InvalidPlayerCount(usize),

    #[error("Invalid game config: {0}")]
    InvalidConfig(String),

    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid action for current phase")]
    InvalidPhase,

    #[error("Place a town and its road before ending the setup turn")]
    SetupIncomplete,

    #[error("Dice already rolled this turn")]
    AlreadyRolled,

    #[error("Dice values must be between 1 and 6")]
    InvalidDice,

    #[error("No {kind} with id {id}")]
    NotFound { kind: &'static str, id: usize },

    #[error("Location already occupied")]
    Occupied,

    #[error("Invalid placement location")]
    InvalidLocation,

    #[error("Not connected to your road network")]
    NotConnected,

    #[error("Cannot afford this")]
    CannotAfford,

    #[error("No free roads available")]
    NoFreeRoads,

    #[error("No development cards remaining")]
    EmptyDeck,

    #[error("No playable {0:?} card in hand")]
    NoSuchCard(DevCardKind),

    #[error("A development card was already played this turn")]
    DevCardAlreadyPlayed,

    #[error("Invalid trade")]
    InvalidTrade,

    #[error("Board can only be rerolled before anything is built")]
    BoardInUse,

    #[error("Game is over")]
    GameOver,
}

fn entropy_rng() -> StdRng {
    StdRng::from_entropy()
}

/// The complete game state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub id: Uuid,
    pub config: GameConfig,
    pub board: Board,
    pub players: Vec<Player>,
    pub current_player: PlayerId,
    pub phase: TurnPhase,
    /// Incremented by every end of turn, starting at 0
    pub turn: u32,
    pub last_roll: Option<[u8; 2]>,
    /// Development card deck, drawn from the end
    pub dev_deck: Vec<DevCardKind>,
    /// Append-only event log
    pub log: Vec<GameEvent>,
    pub winner: Option<PlayerId>,
    /// Town placed by the current player this setup turn
    setup_anchor: Option<NodeId>,
    #[serde(skip, default = "entropy_rng")]
    rng: StdRng,
}

impl GameState {
    /// Create a game with default player names ("Player 1", ...)
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        let names = (1..=config.player_count)
            .map(|i| format!("Player {i}"))
            .collect();
        Self::with_names(config, names)
    }

    /// Create a game with one player per name
    pub fn with_names(mut config: GameConfig, names: Vec<String>) -> Result<Self, GameError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&names.len()) {
            return Err(GameError::InvalidPlayerCount(names.len()));
        }
        config.player_count = names.len() as u8;
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let board = generator::generate(&config.board, &mut rng);
        let dev_deck = DevCardKind::shuffled_deck(&mut rng);

        let players = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Player::new(i as PlayerId, name))
            .collect();

        let state = Self {
            id: Uuid::new_v4(),
            config,
            board,
            players,
            current_player: 0,
            phase: TurnPhase::Setup,
            turn: 0,
            last_roll: None,
            dev_deck,
            log: Vec::new(),
            winner: None,
            setup_anchor: None,
            rng,
        };
        info!(game = %state.id, players = state.players.len(), "created game");
        Ok(state)
    }

    // ==================== Queries ====================

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id as usize)
    }

    fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, GameError> {
        self.players
            .get_mut(id as usize)
            .ok_or(GameError::UnknownPlayer(id))
    }

    /// The player whose turn it is
    pub fn current(&self) -> &Player {
        &self.players[self.current_player as usize]
    }

    pub fn is_setup(&self) -> bool {
        self.phase == TurnPhase::Setup
    }

    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    /// Town placed by the current player during this setup turn
    pub fn setup_anchor(&self) -> Option<NodeId> {
        self.setup_anchor
    }

    /// Whether the current player still has to place this setup turn's town
    pub fn owes_setup_town(&self) -> bool {
        self.is_setup()
            && self.setup_anchor.is_none()
            && self.board.buildings_of(self.current_player).count() < SETUP_TOWNS
    }

    pub fn robber_pending(&self) -> bool {
        matches!(self.phase, TurnPhase::RobberPending { .. })
    }

    pub fn dev_cards_remaining(&self) -> usize {
        self.dev_deck.len()
    }

    pub fn victory_points(&self, id: PlayerId) -> u32 {
        self.player(id).map_or(0, |p| p.victory_points)
    }

    /// Best ratio `player` gets when trading away `resource`
    pub fn trade_ratio(&self, player: PlayerId, resource: Resource) -> u32 {
        self.board
            .trade_ratio(player, resource, self.config.rules.bank_trade_ratio)
    }

    /// Whether the current setup turn has placed its town and road
    pub fn setup_turn_done(&self) -> bool {
        match self.setup_anchor {
            None => !self.owes_setup_town() || self.board.valid_town_sites(self.current_player, true).is_empty(),
            Some(anchor) => {
                self.current().free_roads == 0 || self.board.edges_at(anchor).all(|e| e.owner.is_some())
            }
        }
    }

    fn setup_complete(&self) -> bool {
        self.players
            .iter()
            .all(|p| self.board.buildings_of(p.id).count() >= SETUP_TOWNS)
    }

    // ==================== Dispatch ====================

    /// Apply an action from the wire contract
    pub fn apply_action(&mut self, action: &Action) -> Result<GameEvent, GameError> {
        let result = match *action {
            Action::RollDice => self.roll_dice(),
            Action::MoveRobber { hex_id } => self.move_robber(hex_id),
            Action::BuildRoad {
                edge_id,
                player_id,
                free,
            } => self.build_road(edge_id, player_id, free),
            Action::BuildTown { node_id, player_id } => self.build_town(node_id, player_id),
            Action::BuildCity { node_id, player_id } => self.build_city(node_id, player_id),
            Action::HarborTrade {
                player_id,
                give,
                receive,
            } => self.trade_harbor(player_id, give, receive),
            Action::BuyDevCard { player_id } => self.buy_dev_card(player_id),
            Action::PlayKnight { player_id } => self.play_knight(player_id),
            Action::PlayRoadBuilding { player_id } => self.play_road_building(player_id),
            Action::PlayYearOfPlenty {
                player_id,
                resources,
            } => self.play_year_of_plenty(player_id, resources),
            Action::PlayMonopoly {
                player_id,
                resource,
            } => self.play_monopoly(player_id, resource),
            Action::EndTurn => self.end_turn(),
        };
        if let Err(err) = &result {
            debug!(game = %self.id, action = action.kind(), error = %err, "rejected action");
        }
        result
    }

    // ==================== Dice & Robber ====================

    /// Roll two dice from the game's RNG
    pub fn roll_dice(&mut self) -> Result<GameEvent, GameError> {
        self.check_can_roll()?;
        let d1 = self.rng.gen_range(1..=6);
        let d2 = self.rng.gen_range(1..=6);
        self.roll_dice_with(d1, d2)
    }

    /// Apply a given roll with the same validation as [`GameState::roll_dice`]
    pub fn roll_dice_with(&mut self, d1: u8, d2: u8) -> Result<GameEvent, GameError> {
        self.check_can_roll()?;
        if !(1..=6).contains(&d1) || !(1..=6).contains(&d2) {
            return Err(GameError::InvalidDice);
        }

        let player = self.current_player;
        let total = d1 + d2;
        self.last_roll = Some([d1, d2]);
        self.player_mut(player)?.has_rolled = true;

        let mut produced = BTreeMap::new();
        let mut discards = Vec::new();

        if total == 7 {
            if self.config.rules.discard_on_seven {
                let limit = self.config.rules.hand_limit;
                for p in &mut self.players {
                    let held = p.resources.total();
                    if held > limit {
                        discards.push((p.id, p.resources.discard_largest(held / 2)));
                    }
                }
            }
            self.phase = TurnPhase::RobberPending {
                trigger: RobberTrigger::SevenRolled,
            };
        } else {
            for (pid, resources) in self.board.resources_for_roll(total) {
                let mut hand = ResourceHand::new();
                for (resource, amount) in resources {
                    hand.add(resource, amount);
                }
                self.player_mut(pid)?.resources.add_hand(&hand);
                produced.insert(pid, hand);
            }
            self.phase = TurnPhase::Rolled;
        }

        let event = self.record(EventKind::DiceRolled {
            player,
            dice: [d1, d2],
            total,
            produced,
        });
        for (player, discarded) in discards {
            self.record(EventKind::CardsDiscarded { player, discarded });
        }
        Ok(self.finish(event))
    }

    fn check_can_roll(&self) -> Result<(), GameError> {
        self.ensure_active()?;
        match self.phase {
            TurnPhase::NotRolled => Ok(()),
            TurnPhase::Rolled => Err(GameError::AlreadyRolled),
            TurnPhase::Setup | TurnPhase::RobberPending { .. } => Err(GameError::InvalidPhase),
        }
    }

    /// Move the robber owed after a 7 or a knight
    pub fn move_robber(&mut self, hex: TileId) -> Result<GameEvent, GameError> {
        self.ensure_active()?;
        if !self.robber_pending() {
            return Err(GameError::InvalidPhase);
        }
        let tile = self
            .board
            .tile(hex)
            .ok_or(GameError::NotFound { kind: "tile", id: hex })?;
        if !tile.is_land() || tile.has_robber {
            return Err(GameError::InvalidLocation);
        }

        let player = self.current_player;
        let from = self.board.robber_tile();
        self.board.move_robber(hex);

        let stolen_from = if self.config.rules.robber_steals {
            self.steal_at(hex, player)
        } else {
            None
        };

        self.phase = if self.current().has_rolled {
            TurnPhase::Rolled
        } else {
            TurnPhase::NotRolled
        };

        let event = self.record(EventKind::RobberMoved {
            player,
            from,
            to: hex,
            stolen_from,
        });
        Ok(self.finish(event))
    }

    /// Take one random card from a random opponent with a building on `tile`
    fn steal_at(&mut self, tile: TileId, thief: PlayerId) -> Option<PlayerId> {
        let victims: Vec<PlayerId> = self
            .board
            .players_adjacent_to_tile(tile)
            .into_iter()
            .filter(|&p| p != thief && self.player(p).is_some_and(|v| !v.resources.is_empty()))
            .collect();
        let victim = *victims.choose(&mut self.rng)?;
        let resource = self
            .players
            .get_mut(victim as usize)?
            .resources
            .steal_random(&mut self.rng)?;
        self.players.get_mut(thief as usize)?.resources.add(resource, 1);
        Some(victim)
    }

    // ==================== Building ====================

    /// Build a road. `free` spends a free-road credit instead of wood and brick;
    /// setup roads always use the credit granted with the setup town.
    pub fn build_road(&mut self, edge_id: EdgeId, player: PlayerId, free: bool) -> Result<GameEvent, GameError> {
        self.ensure_turn(player)?;
        let setup = match self.phase {
            TurnPhase::Setup => true,
            TurnPhase::Rolled => false,
            _ => return Err(GameError::InvalidPhase),
        };
        let edge = self
            .board
            .edge(edge_id)
            .ok_or(GameError::NotFound { kind: "edge", id: edge_id })?;
        if edge.owner.is_some() {
            return Err(GameError::Occupied);
        }

        let credits = self.players[player as usize].free_roads;
        let uses_credit = if setup {
            let anchor = self.setup_anchor.ok_or(GameError::InvalidPhase)?;
            if !edge.touches(anchor) {
                return Err(GameError::InvalidLocation);
            }
            if credits == 0 {
                return Err(GameError::NoFreeRoads);
            }
            true
        } else {
            if !self.board.is_connected_to_network(edge_id, player) {
                return Err(GameError::NotConnected);
            }
            if free && credits == 0 {
                return Err(GameError::NoFreeRoads);
            }
            if !free && !self.players[player as usize].can_afford_road() {
                return Err(GameError::CannotAfford);
            }
            free
        };

        let p = self.player_mut(player)?;
        if uses_credit {
            p.free_roads -= 1;
        } else {
            p.resources.subtract(&costs::road());
        }
        self.board.place_road(edge_id, player);

        let event = self.record(EventKind::RoadBuilt {
            player,
            edge: edge_id,
            free: uses_credit,
        });
        Ok(self.finish_build(event))
    }

    /// Build a town. During setup the town is free, needs no road and grants
    /// one free road touching it; the second setup town also yields resources.
    pub fn build_town(&mut self, node_id: NodeId, player: PlayerId) -> Result<GameEvent, GameError> {
        self.ensure_turn(player)?;
        let setup = match self.phase {
            TurnPhase::Setup => true,
            TurnPhase::Rolled => false,
            _ => return Err(GameError::InvalidPhase),
        };
        let node = self
            .board
            .node(node_id)
            .ok_or(GameError::NotFound { kind: "node", id: node_id })?;
        if node.building.is_some() {
            return Err(GameError::Occupied);
        }
        if setup && (self.setup_anchor.is_some() || self.board.buildings_of(player).count() >= SETUP_TOWNS) {
            return Err(GameError::InvalidPhase);
        }
        if !node.can_build || !self.board.satisfies_distance_rule(node_id) {
            return Err(GameError::InvalidLocation);
        }
        if !setup {
            if !self.board.is_connected_to_road(node_id, player) {
                return Err(GameError::NotConnected);
            }
            if !self.players[player as usize].can_afford_town() {
                return Err(GameError::CannotAfford);
            }
        }

        if setup {
            self.setup_anchor = Some(node_id);
            self.player_mut(player)?.free_roads = 1;
        } else {
            self.player_mut(player)?.resources.subtract(&costs::town());
        }
        self.board.place_town(node_id, player);

        let event = self.record(EventKind::TownBuilt { player, node: node_id });

        if setup && self.board.buildings_of(player).count() == SETUP_TOWNS {
            let resources = self.adjacent_yield(node_id);
            if !resources.is_empty() {
                self.player_mut(player)?.resources.add_hand(&resources);
                self.record(EventKind::SetupResourcesGranted { player, resources });
            }
        }
        Ok(self.finish_build(event))
    }

    /// One card per producing tile around a node
    fn adjacent_yield(&self, node_id: NodeId) -> ResourceHand {
        let mut hand = ResourceHand::new();
        let tiles = self.board.node(node_id).map(|n| n.tiles.as_slice()).unwrap_or_default();
        for resource in tiles.iter().filter_map(|&t| self.board.tile(t).and_then(Tile::resource)) {
            hand.add(resource, 1);
        }
        hand
    }

    /// Upgrade one of the player's towns
    pub fn build_city(&mut self, node_id: NodeId, player: PlayerId) -> Result<GameEvent, GameError> {
        self.ensure_turn(player)?;
        if self.phase != TurnPhase::Rolled {
            return Err(GameError::InvalidPhase);
        }
        let node = self
            .board
            .node(node_id)
            .ok_or(GameError::NotFound { kind: "node", id: node_id })?;
        match node.building {
            Some(b) if b.owner == player && b.kind == BuildingKind::Town => {}
            _ => return Err(GameError::InvalidLocation),
        }
        if !self.players[player as usize].can_afford_city() {
            return Err(GameError::CannotAfford);
        }

        self.player_mut(player)?.resources.subtract(&costs::city());
        self.board.upgrade_to_city(node_id, player);

        let event = self.record(EventKind::CityBuilt { player, node: node_id });
        Ok(self.finish_build(event))
    }

    // ==================== Trading ====================

    /// Trade `ratio` of `give` for one `receive` at the best harbor available
    pub fn trade_harbor(&mut self, player: PlayerId, give: Resource, receive: Resource) -> Result<GameEvent, GameError> {
        self.ensure_turn(player)?;
        if self.phase != TurnPhase::Rolled {
            return Err(GameError::InvalidPhase);
        }
        if give == receive {
            return Err(GameError::InvalidTrade);
        }
        let ratio = self.trade_ratio(player, give);
        if self.players[player as usize].resources.get(give) < ratio {
            return Err(GameError::CannotAfford);
        }

        let p = self.player_mut(player)?;
        p.resources.subtract(&ResourceHand::single(give, ratio));
        p.resources.add(receive, 1);

        let event = self.record(EventKind::HarborTraded {
            player,
            gave: give,
            gave_count: ratio,
            received: receive,
        });
        Ok(self.finish(event))
    }

    // ==================== Development Cards ====================

    pub fn buy_dev_card(&mut self, player: PlayerId) -> Result<GameEvent, GameError> {
        self.ensure_turn(player)?;
        if self.phase != TurnPhase::Rolled {
            return Err(GameError::InvalidPhase);
        }
        if self.dev_deck.is_empty() {
            return Err(GameError::EmptyDeck);
        }
        if !self.players[player as usize].can_afford_dev_card() {
            return Err(GameError::CannotAfford);
        }

        let Some(card) = self.dev_deck.pop() else {
            return Err(GameError::EmptyDeck);
        };
        self.player_mut(player)?.buy_dev_card(card);

        let event = self.record(EventKind::DevCardBought { player });
        Ok(self.finish(event))
    }

    /// Knights may also be played before rolling
    fn check_card_play(&self, player: PlayerId, kind: DevCardKind) -> Result<(), GameError> {
        self.ensure_turn(player)?;
        let phase_ok = match self.phase {
            TurnPhase::Rolled => true,
            TurnPhase::NotRolled => kind == DevCardKind::Knight,
            _ => false,
        };
        if !phase_ok {
            return Err(GameError::InvalidPhase);
        }
        let p = &self.players[player as usize];
        if self.config.rules.one_dev_card_per_turn && p.played_dev_card_this_turn {
            return Err(GameError::DevCardAlreadyPlayed);
        }
        if !p.has_playable_dev_card(kind) {
            return Err(GameError::NoSuchCard(kind));
        }
        Ok(())
    }

    pub fn play_knight(&mut self, player: PlayerId) -> Result<GameEvent, GameError> {
        self.check_card_play(player, DevCardKind::Knight)?;
        self.player_mut(player)?.play_dev_card(DevCardKind::Knight);
        self.phase = TurnPhase::RobberPending {
            trigger: RobberTrigger::Knight,
        };

        let event = self.record(EventKind::KnightPlayed { player });
        Ok(self.finish(event))
    }

    pub fn play_road_building(&mut self, player: PlayerId) -> Result<GameEvent, GameError> {
        self.check_card_play(player, DevCardKind::RoadBuilding)?;
        let p = self.player_mut(player)?;
        p.play_dev_card(DevCardKind::RoadBuilding);
        p.free_roads += 2;

        let event = self.record(EventKind::RoadBuildingPlayed { player });
        Ok(self.finish(event))
    }

    pub fn play_year_of_plenty(&mut self, player: PlayerId, resources: [Resource; 2]) -> Result<GameEvent, GameError> {
        self.check_card_play(player, DevCardKind::YearOfPlenty)?;
        let p = self.player_mut(player)?;
        p.play_dev_card(DevCardKind::YearOfPlenty);
        for resource in resources {
            p.resources.add(resource, 1);
        }

        let event = self.record(EventKind::YearOfPlentyPlayed { player, resources });
        Ok(self.finish(event))
    }

    pub fn play_monopoly(&mut self, player: PlayerId, resource: Resource) -> Result<GameEvent, GameError> {
        self.check_card_play(player, DevCardKind::Monopoly)?;
        self.player_mut(player)?.play_dev_card(DevCardKind::Monopoly);

        let total_taken: u32 = self
            .players
            .iter_mut()
            .filter(|p| p.id != player)
            .map(|p| p.resources.take_all(resource))
            .sum();
        self.player_mut(player)?.resources.add(resource, total_taken);

        let event = self.record(EventKind::MonopolyPlayed {
            player,
            resource,
            total_taken,
        });
        Ok(self.finish(event))
    }

    // ==================== Turn Management ====================

    /// Finish the current turn. Allowed during setup and while the robber is
    /// owed (the move is forfeited), but not before rolling.
    pub fn end_turn(&mut self) -> Result<GameEvent, GameError> {
        self.ensure_active()?;
        if self.phase == TurnPhase::NotRolled {
            return Err(GameError::InvalidPhase);
        }
        if self.is_setup() && !self.setup_turn_done() {
            return Err(GameError::SetupIncomplete);
        }

        let player = self.current_player;
        let next_player = ((player as usize + 1) % self.players.len()) as PlayerId;
        let event = self.record(EventKind::TurnEnded { player, next_player });

        self.player_mut(player)?.end_turn();
        self.current_player = next_player;
        self.turn += 1;
        self.last_roll = None;
        self.setup_anchor = None;
        self.phase = if self.is_setup() && !self.setup_complete() {
            TurnPhase::Setup
        } else {
            TurnPhase::NotRolled
        };
        Ok(self.finish(event))
    }

    /// Regenerate the board with the same generator settings
    pub fn reroll_board(&mut self) -> Result<GameEvent, GameError> {
        self.ensure_active()?;
        if self.board.building_count() > 0 || self.board.edges.iter().any(|e| e.owner.is_some()) {
            return Err(GameError::BoardInUse);
        }
        self.board = generator::generate(&self.config.board, &mut self.rng);
        info!(game = %self.id, "board rerolled");

        let event = self.record(EventKind::BoardRerolled);
        Ok(self.finish(event))
    }

    // ==================== Helper Methods ====================

    fn ensure_active(&self) -> Result<(), GameError> {
        if self.winner.is_some() {
            return Err(GameError::GameOver);
        }
        Ok(())
    }

    fn ensure_turn(&self, player: PlayerId) -> Result<(), GameError> {
        self.ensure_active()?;
        if self.player(player).is_none() {
            return Err(GameError::UnknownPlayer(player));
        }
        if player != self.current_player {
            return Err(GameError::NotYourTurn);
        }
        Ok(())
    }

    /// Append an event to the log
    fn record(&mut self, kind: EventKind) -> GameEvent {
        let event = GameEvent {
            id: self.log.len() as u64,
            game_id: self.id,
            turn: self.turn,
            timestamp: Utc::now(),
            kind,
        };
        debug!(game = %self.id, turn = self.turn, event = ?event.kind, "recorded event");
        self.log.push(event.clone());
        event
    }

    /// Post-action hook for placements, the only actions that change road lengths
    fn finish_build(&mut self, event: GameEvent) -> GameEvent {
        self.update_longest_road();
        self.finish(event)
    }

    /// Post-action hook shared by every operation
    fn finish(&mut self, event: GameEvent) -> GameEvent {
        self.update_largest_army();
        self.refresh_victory_points();
        self.check_winner();
        event
    }

    fn update_longest_road(&mut self) {
        let mut longest_length = 0;
        let mut longest_players: Vec<PlayerId> = Vec::new();

        for player in &self.players {
            let length = self.board.longest_road(player.id);
            if length >= MIN_LONGEST_ROAD {
                if length > longest_length {
                    longest_length = length;
                    longest_players = vec![player.id];
                } else if length == longest_length {
                    longest_players.push(player.id);
                }
            }
        }

        let current_holder = self.players.iter().find(|p| p.has_longest_road).map(|p| p.id);

        let new_holder = match longest_players.as_slice() {
            [] => None,
            [only] => Some(*only),
            // Ties keep the current holder; otherwise nobody holds it
            tied => current_holder.filter(|h| tied.contains(h)),
        };

        if new_holder != current_holder {
            for player in &mut self.players {
                player.has_longest_road = Some(player.id) == new_holder;
            }
            self.record(EventKind::LongestRoadChanged {
                previous: current_holder,
                current: new_holder,
                length: longest_length,
            });
        }
    }

    fn update_largest_army(&mut self) {
        let current_holder = self.players.iter().find(|p| p.has_largest_army);
        let to_beat = current_holder.map_or(MIN_LARGEST_ARMY - 1, |h| h.knights_played);
        let previous = current_holder.map(|h| h.id);

        // Strictly more knights takes it; lowest id wins a tie between challengers
        let challenger = self
            .players
            .iter()
            .filter(|p| p.knights_played > to_beat)
            .max_by(|a, b| a.knights_played.cmp(&b.knights_played).then(b.id.cmp(&a.id)))
            .map(|p| (p.id, p.knights_played));

        if let Some((leader, knights)) = challenger {
            for player in &mut self.players {
                player.has_largest_army = player.id == leader;
            }
            self.record(EventKind::LargestArmyChanged {
                previous,
                current: Some(leader),
                knights,
            });
        }
    }

    fn refresh_victory_points(&mut self) {
        for i in 0..self.players.len() {
            let id = self.players[i].id;
            let buildings: u32 = self.board.buildings_of(id).map(|(_, b)| b.victory_points()).sum();
            self.players[i].victory_points = buildings + self.players[i].bonus_points();
        }
    }

    fn check_winner(&mut self) {
        if self.winner.is_some() {
            return;
        }
        let threshold = self.config.rules.victory_points_to_win;
        let current = self.current();
        let winner = if current.victory_points >= threshold {
            Some(current)
        } else {
            self.players.iter().find(|p| p.victory_points >= threshold)
        };

        if let Some(winner) = winner.map(|p| (p.id, p.victory_points)) {
            let (player, victory_points) = winner;
            self.winner = Some(player);
            info!(game = %self.id, player, victory_points, "game won");
            self.record(EventKind::GameWon { player, victory_points });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::BoardConfig;
    use crate::player::DevCard;
    use pretty_assertions::assert_eq;

    fn config(seed: u64, players: u8) -> GameConfig {
        GameConfig {
            player_count: players,
            board: BoardConfig {
                harbors: false,
                ..BoardConfig::default()
            },
            seed: Some(seed),
            ..GameConfig::default()
        }
    }

    /// Place every setup town on the first valid site, each with its first free edge
    fn complete_setup(state: &mut GameState) {
        while state.is_setup() {
            let player = state.current_player;
            let node = state.board.valid_town_sites(player, true)[0];
            state.build_town(node, player).unwrap();
            let edge = state.board.edges_at(node).find(|e| e.owner.is_none()).unwrap().id;
            state.build_road(edge, player, true).unwrap();
            state.end_turn().unwrap();
        }
    }

    fn setup_game(seed: u64) -> GameState {
        let mut state = GameState::new(config(seed, 2)).unwrap();
        complete_setup(&mut state);
        state
    }

    fn give_card(state: &mut GameState, player: PlayerId, kind: DevCardKind) {
        state.players[player as usize].dev_cards.push(DevCard { kind, can_play: true });
    }

    fn open_land_tile(state: &GameState) -> TileId {
        state.board.land_tiles().find(|(_, t)| !t.has_robber).unwrap().0
    }

    #[test]
    fn test_new_game_starts_in_setup() {
        let state = GameState::new(config(1, 4)).unwrap();
        assert_eq!(state.phase, TurnPhase::Setup);
        assert_eq!(state.current_player, 0);
        assert_eq!(state.players.len(), 4);
        assert_eq!(state.dev_cards_remaining(), 25);
        assert!(state.log.is_empty());
    }

    #[test]
    fn test_player_count_is_validated() {
        assert_eq!(
            GameState::new(config(1, 1)).unwrap_err(),
            GameError::InvalidPlayerCount(1)
        );
        assert_eq!(
            GameState::new(config(1, 5)).unwrap_err(),
            GameError::InvalidPlayerCount(5)
        );
    }

    #[test]
    fn test_config_is_validated() {
        let mut cfg = config(1, 2);
        cfg.rules.bank_trade_ratio = 0;
        assert!(matches!(GameState::new(cfg).unwrap_err(), GameError::InvalidConfig(_)));

        let mut cfg = config(1, 2);
        cfg.board.hex_size = 0.0;
        assert!(matches!(GameState::new(cfg).unwrap_err(), GameError::InvalidConfig(_)));

        let mut cfg = config(1, 2);
        cfg.board.radius = u32::MAX;
        assert!(matches!(GameState::new(cfg).unwrap_err(), GameError::InvalidConfig(_)));
    }

    #[test]
    fn test_same_seed_same_board() {
        let a = GameState::new(config(21, 3)).unwrap();
        let b = GameState::new(config(21, 3)).unwrap();
        assert_eq!(
            serde_json::to_value(&a.board).unwrap(),
            serde_json::to_value(&b.board).unwrap()
        );
        assert_eq!(a.dev_deck, b.dev_deck);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_roll_rejected_during_setup() {
        let mut state = GameState::new(config(1, 2)).unwrap();
        assert_eq!(state.roll_dice().unwrap_err(), GameError::InvalidPhase);
        assert!(state.log.is_empty());
    }

    #[test]
    fn test_setup_road_must_touch_new_town() {
        let mut state = GameState::new(config(2, 2)).unwrap();
        let node = state.board.valid_town_sites(0, true)[0];

        // No town yet, so no anchor
        let edge = state.board.edges_at(node).next().unwrap().id;
        assert_eq!(state.build_road(edge, 0, true).unwrap_err(), GameError::InvalidPhase);

        state.build_town(node, 0).unwrap();
        let far = state.board.edges.iter().find(|e| !e.touches(node)).unwrap().id;
        assert_eq!(state.build_road(far, 0, true).unwrap_err(), GameError::InvalidLocation);

        state.build_road(edge, 0, true).unwrap();
        let other = state.board.edges_at(node).find(|e| e.owner.is_none()).unwrap().id;
        assert_eq!(state.build_road(other, 0, true).unwrap_err(), GameError::NoFreeRoads);
    }

    #[test]
    fn test_only_one_setup_town_per_turn() {
        let mut state = GameState::new(config(3, 2)).unwrap();
        let sites = state.board.valid_town_sites(0, true);
        state.build_town(sites[0], 0).unwrap();
        let second = state.board.valid_town_sites(0, true)[0];
        assert_eq!(state.build_town(second, 0).unwrap_err(), GameError::InvalidPhase);
    }

    #[test]
    fn test_setup_turn_needs_town_and_road() {
        let mut state = GameState::new(config(3, 2)).unwrap();
        assert_eq!(state.end_turn().unwrap_err(), GameError::SetupIncomplete);

        let node = state.board.valid_town_sites(0, true)[0];
        state.build_town(node, 0).unwrap();
        assert_eq!(state.end_turn().unwrap_err(), GameError::SetupIncomplete);

        let edge = state.board.edges_at(node).next().unwrap().id;
        state.build_road(edge, 0, true).unwrap();
        assert!(state.setup_turn_done());
        state.end_turn().unwrap();
        assert_eq!(state.current_player, 1);
    }

    #[test]
    fn test_setup_gives_each_player_two_towns_and_roads() {
        let mut state = GameState::new(config(4, 3)).unwrap();
        complete_setup(&mut state);
        for player in &state.players {
            assert_eq!(state.board.buildings_of(player.id).count(), 2);
            assert_eq!(state.board.edges.iter().filter(|e| e.owner == Some(player.id)).count(), 2);
        }
    }

    #[test]
    fn test_no_third_setup_town() {
        let mut state = GameState::new(config(4, 2)).unwrap();
        let node = state.board.valid_town_sites(0, true)[0];
        state.board.place_town(node, 0);
        let other = state.board.valid_town_sites(0, true)[0];
        state.board.place_town(other, 0);

        let third = state.board.valid_town_sites(0, true)[0];
        assert_eq!(state.build_town(third, 0).unwrap_err(), GameError::InvalidPhase);
    }

    #[test]
    fn test_setup_completes_after_two_rounds() {
        let state = setup_game(4);
        assert_eq!(state.phase, TurnPhase::NotRolled);
        assert_eq!(state.current_player, 0);
        assert_eq!(state.board.building_count(), 4);
        for player in &state.players {
            assert_eq!(player.victory_points, 2);
            assert_eq!(player.free_roads, 0);
        }
    }

    #[test]
    fn test_second_setup_town_grants_resources() {
        let mut state = GameState::new(config(5, 2)).unwrap();
        for _ in 0..2 {
            let player = state.current_player;
            let node = state.board.valid_town_sites(player, true)[0];
            state.build_town(node, player).unwrap();
            let edge = state.board.edges_at(node).next().unwrap().id;
            state.build_road(edge, player, true).unwrap();
            state.end_turn().unwrap();
        }
        assert!(state.players.iter().all(|p| p.resources.is_empty()));

        let node = state.board.valid_town_sites(0, true)[0];
        let expected = state.adjacent_yield(node);
        state.build_town(node, 0).unwrap();
        assert_eq!(state.players[0].resources, expected);
    }

    #[test]
    fn test_wrong_player_is_rejected() {
        let mut state = setup_game(6);
        state.roll_dice_with(2, 3).unwrap();
        state.players[1].resources = ResourceHand::with_amounts(5, 5, 5, 5, 5);
        let edge = state.board.valid_road_sites(1)[0];
        assert_eq!(state.build_road(edge, 1, false).unwrap_err(), GameError::NotYourTurn);
        assert_eq!(state.build_road(edge, 9, false).unwrap_err(), GameError::UnknownPlayer(9));
    }

    #[test]
    fn test_roll_twice_rejected() {
        let mut state = setup_game(7);
        state.roll_dice_with(4, 4).unwrap();
        assert_eq!(state.roll_dice().unwrap_err(), GameError::AlreadyRolled);
    }

    #[test]
    fn test_invalid_dice_rejected() {
        let mut state = setup_game(7);
        assert_eq!(state.roll_dice_with(0, 7).unwrap_err(), GameError::InvalidDice);
        assert_eq!(state.phase, TurnPhase::NotRolled);
        assert_eq!(state.last_roll, None);
    }

    #[test]
    fn test_end_turn_requires_roll() {
        let mut state = setup_game(8);
        assert_eq!(state.end_turn().unwrap_err(), GameError::InvalidPhase);
    }

    #[test]
    fn test_end_turn_forfeits_robber_move() {
        let mut state = setup_game(8);
        state.roll_dice_with(3, 4).unwrap();
        assert!(state.robber_pending());
        state.end_turn().unwrap();
        assert_eq!(state.current_player, 1);
        assert_eq!(state.phase, TurnPhase::NotRolled);
    }

    #[test]
    fn test_move_robber_validation() {
        let mut state = setup_game(9);
        let target = open_land_tile(&state);
        assert_eq!(state.move_robber(target).unwrap_err(), GameError::InvalidPhase);

        state.roll_dice_with(6, 1).unwrap();
        let current = state.board.robber_tile().unwrap();
        assert_eq!(state.move_robber(current).unwrap_err(), GameError::InvalidLocation);
        assert_eq!(
            state.move_robber(999).unwrap_err(),
            GameError::NotFound { kind: "tile", id: 999 }
        );

        state.move_robber(target).unwrap();
        assert_eq!(state.board.robber_tile(), Some(target));
        assert_eq!(state.phase, TurnPhase::Rolled);
    }

    #[test]
    fn test_robber_steals_when_enabled() {
        let mut cfg = config(10, 2);
        cfg.rules.robber_steals = true;
        let mut state = GameState::new(cfg).unwrap();
        complete_setup(&mut state);

        let target = state
            .board
            .buildings_of(1)
            .flat_map(|(node, _)| node.tiles.iter().copied())
            .find(|&t| state.board.tiles[t].is_land() && !state.board.tiles[t].has_robber)
            .unwrap();
        state.players[0].resources = ResourceHand::new();
        state.players[1].resources = ResourceHand::with_amounts(0, 0, 0, 0, 1);

        state.roll_dice_with(5, 2).unwrap();
        let event = state.move_robber(target).unwrap();

        assert!(matches!(event.kind, EventKind::RobberMoved { stolen_from: Some(1), .. }));
        assert_eq!(state.players[0].resources.ore, 1);
        assert!(state.players[1].resources.is_empty());
    }

    #[test]
    fn test_discard_on_seven_when_enabled() {
        let mut cfg = config(11, 2);
        cfg.rules.discard_on_seven = true;
        let mut state = GameState::new(cfg).unwrap();
        complete_setup(&mut state);
        state.players[1].resources = ResourceHand::with_amounts(6, 3, 0, 0, 0);
        state.players[0].resources = ResourceHand::with_amounts(1, 1, 1, 1, 1);

        state.roll_dice_with(1, 6).unwrap();

        assert_eq!(state.players[1].resources, ResourceHand::with_amounts(2, 3, 0, 0, 0));
        assert_eq!(state.players[0].resources.total(), 5);
        assert!(state
            .log
            .iter()
            .any(|e| matches!(e.kind, EventKind::CardsDiscarded { player: 1, .. })));
    }

    #[test]
    fn test_knight_before_roll_returns_to_not_rolled() {
        let mut state = setup_game(12);
        give_card(&mut state, 0, DevCardKind::Knight);

        state.play_knight(0).unwrap();
        assert_eq!(
            state.phase,
            TurnPhase::RobberPending {
                trigger: RobberTrigger::Knight
            }
        );
        let target = open_land_tile(&state);
        state.move_robber(target).unwrap();
        assert_eq!(state.phase, TurnPhase::NotRolled);
        assert_eq!(state.players[0].knights_played, 1);
    }

    #[test]
    fn test_largest_army_awarded_at_three_knights() {
        let mut state = setup_game(13);
        for _ in 0..3 {
            give_card(&mut state, 0, DevCardKind::Knight);
        }
        for _ in 0..3 {
            state.play_knight(0).unwrap();
            let target = open_land_tile(&state);
            state.move_robber(target).unwrap();
        }
        assert!(state.players[0].has_largest_army);
        assert_eq!(state.players[0].victory_points, 4);
        assert!(state.log.iter().any(|e| matches!(
            e.kind,
            EventKind::LargestArmyChanged {
                current: Some(0),
                knights: 3,
                ..
            }
        )));
    }

    #[test]
    fn test_largest_army_tie_keeps_holder() {
        let mut state = setup_game(13);
        state.players[1].knights_played = 3;
        state.players[1].has_largest_army = true;
        state.players[0].knights_played = 2;
        give_card(&mut state, 0, DevCardKind::Knight);

        state.play_knight(0).unwrap();
        assert!(state.players[1].has_largest_army);
        assert!(!state.players[0].has_largest_army);
    }

    #[test]
    fn test_one_dev_card_per_turn_when_enabled() {
        let mut cfg = config(14, 2);
        cfg.rules.one_dev_card_per_turn = true;
        let mut state = GameState::new(cfg).unwrap();
        complete_setup(&mut state);
        state.roll_dice_with(2, 2).unwrap();
        give_card(&mut state, 0, DevCardKind::YearOfPlenty);
        give_card(&mut state, 0, DevCardKind::Monopoly);

        state.play_year_of_plenty(0, [Resource::Ore, Resource::Ore]).unwrap();
        assert_eq!(
            state.play_monopoly(0, Resource::Ore).unwrap_err(),
            GameError::DevCardAlreadyPlayed
        );
    }

    #[test]
    fn test_monopoly_takes_from_everyone() {
        let mut state = GameState::new(config(15, 3)).unwrap();
        complete_setup(&mut state);
        state.roll_dice_with(2, 2).unwrap();
        for p in &mut state.players {
            p.resources = ResourceHand::with_amounts(0, 0, 0, 2, 0);
        }
        give_card(&mut state, 0, DevCardKind::Monopoly);

        let event = state.play_monopoly(0, Resource::Sheep).unwrap();

        assert!(matches!(event.kind, EventKind::MonopolyPlayed { total_taken: 4, .. }));
        assert_eq!(state.players[0].resources.sheep, 6);
        assert_eq!(state.players[1].resources.sheep, 0);
        assert_eq!(state.players[2].resources.sheep, 0);
    }

    #[test]
    fn test_road_building_grants_two_free_roads() {
        let mut state = setup_game(16);
        state.roll_dice_with(2, 2).unwrap();
        state.players[0].resources = ResourceHand::new();
        give_card(&mut state, 0, DevCardKind::RoadBuilding);

        state.play_road_building(0).unwrap();
        assert_eq!(state.players[0].free_roads, 2);

        for _ in 0..2 {
            let edge = state.board.valid_road_sites(0)[0];
            state.build_road(edge, 0, true).unwrap();
        }
        let edge = state.board.valid_road_sites(0)[0];
        assert_eq!(state.build_road(edge, 0, true).unwrap_err(), GameError::NoFreeRoads);
        assert_eq!(state.build_road(edge, 0, false).unwrap_err(), GameError::CannotAfford);
    }

    #[test]
    fn test_longest_road_awarded() {
        fn find_path(board: &Board, from: NodeId, len: usize, path: &mut Vec<EdgeId>, seen: &mut Vec<NodeId>) -> bool {
            if path.len() == len {
                return true;
            }
            for edge in board.edges_at(from) {
                let next = edge.other_end(from);
                if edge.owner.is_some() || seen.contains(&next) || board.nodes[next].building.is_some() {
                    continue;
                }
                path.push(edge.id);
                seen.push(next);
                if find_path(board, next, len, path, seen) {
                    return true;
                }
                path.pop();
                seen.pop();
            }
            false
        }

        let mut state = setup_game(17);
        state.roll_dice_with(2, 2).unwrap();
        let (start, _) = state.board.buildings_of(0).next().unwrap();
        let start = start.id;
        let mut path = Vec::new();
        assert!(find_path(&state.board, start, 5, &mut path, &mut vec![start]));

        state.players[0].free_roads = 5;
        for edge in path {
            state.build_road(edge, 0, true).unwrap();
        }

        assert!(state.players[0].has_longest_road);
        assert!(state.board.longest_road(0) >= 5);
        assert_eq!(state.players[0].victory_points, 4);
    }

    #[test]
    fn test_winner_locks_game() {
        let mut cfg = config(18, 2);
        cfg.rules.victory_points_to_win = 3;
        let mut state = GameState::new(cfg).unwrap();
        complete_setup(&mut state);
        state.roll_dice_with(2, 2).unwrap();
        state.players[0].resources = costs::city();

        let town = state.board.valid_city_sites(0)[0];
        state.build_city(town, 0).unwrap();

        assert_eq!(state.winner, Some(0));
        assert!(state
            .log
            .iter()
            .any(|e| matches!(e.kind, EventKind::GameWon { player: 0, victory_points: 3 })));
        assert_eq!(state.end_turn().unwrap_err(), GameError::GameOver);
    }

    #[test]
    fn test_harbor_trade_rejects_same_resource() {
        let mut state = setup_game(19);
        state.roll_dice_with(2, 2).unwrap();
        state.players[0].resources = ResourceHand::with_amounts(4, 0, 0, 0, 0);
        assert_eq!(
            state.trade_harbor(0, Resource::Wood, Resource::Wood).unwrap_err(),
            GameError::InvalidTrade
        );
        state.trade_harbor(0, Resource::Wood, Resource::Ore).unwrap();
        assert_eq!(state.players[0].resources, ResourceHand::with_amounts(0, 0, 0, 0, 1));
    }

    #[test]
    fn test_reroll_only_before_building() {
        let mut state = GameState::new(config(20, 2)).unwrap();
        let before = serde_json::to_value(&state.board).unwrap();
        state.reroll_board().unwrap();
        assert_ne!(serde_json::to_value(&state.board).unwrap(), before);
        assert!(matches!(state.log.last().unwrap().kind, EventKind::BoardRerolled));

        let node = state.board.valid_town_sites(0, true)[0];
        state.build_town(node, 0).unwrap();
        assert_eq!(state.reroll_board().unwrap_err(), GameError::BoardInUse);
    }

    #[test]
    fn test_failed_action_leaves_state_untouched() {
        let mut state = setup_game(21);
        state.roll_dice_with(2, 2).unwrap();
        state.players[0].resources = ResourceHand::with_amounts(1, 0, 0, 0, 0);
        let before = serde_json::to_value(&state).unwrap();

        let edge = state.board.valid_road_sites(0)[0];
        assert_eq!(state.build_road(edge, 0, false).unwrap_err(), GameError::CannotAfford);
        assert_eq!(state.buy_dev_card(0).unwrap_err(), GameError::CannotAfford);

        assert_eq!(serde_json::to_value(&state).unwrap(), before);
    }

    #[test]
    fn test_apply_action_dispatches() {
        let mut state = setup_game(22);
        let event = state.apply_action(&Action::RollDice).unwrap();
        assert!(matches!(event.kind, EventKind::DiceRolled { player: 0, .. }));
        assert_eq!(event.id, state.log.len() as u64 - 1);
        assert_eq!(event.game_id, state.id);
    }
}
