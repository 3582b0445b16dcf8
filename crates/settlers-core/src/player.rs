//! Player state and resource management.
//!
//! This module contains:
//! - Player struct with resources, development cards, and awards
//! - ResourceHand for managing resource counts
//! - Development card kinds, timing and the standard deck
//! - Building costs

use crate::board::{PlayerId, Resource};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Player color for UI rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerColor {
    Red,
    Blue,
    Orange,
    White,
}

impl PlayerColor {
    /// Get color for a player index
    pub fn for_player(id: PlayerId) -> Self {
        match id % 4 {
            0 => PlayerColor::Red,
            1 => PlayerColor::Blue,
            2 => PlayerColor::Orange,
            _ => PlayerColor::White,
        }
    }
}

/// When a development card may be used after purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardTiming {
    /// Playable from the owner's next turn
    Delayed,
    /// Never played; counts while held
    Passive,
}

/// Development card types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DevCardKind {
    /// Move the robber, counts toward Largest Army
    Knight,
    /// Worth 1 VP while held
    VictoryPoint,
    /// Build 2 roads for free
    RoadBuilding,
    /// Take any 2 resources from the bank
    YearOfPlenty,
    /// Every opponent hands over all of one resource
    Monopoly,
}

impl DevCardKind {
    pub const ALL: [DevCardKind; 5] = [
        DevCardKind::Knight,
        DevCardKind::VictoryPoint,
        DevCardKind::RoadBuilding,
        DevCardKind::YearOfPlenty,
        DevCardKind::Monopoly,
    ];

    /// Create the standard development card deck (25 cards), unshuffled
    pub fn standard_deck() -> Vec<DevCardKind> {
        let mut deck = Vec::with_capacity(25);
        deck.extend(std::iter::repeat(DevCardKind::Knight).take(14));
        deck.extend(std::iter::repeat(DevCardKind::VictoryPoint).take(5));
        deck.extend(std::iter::repeat(DevCardKind::RoadBuilding).take(2));
        deck.extend(std::iter::repeat(DevCardKind::YearOfPlenty).take(2));
        deck.extend(std::iter::repeat(DevCardKind::Monopoly).take(2));
        deck
    }

    /// The standard deck in random order
    pub fn shuffled_deck<R: Rng>(rng: &mut R) -> Vec<DevCardKind> {
        let mut deck = Self::standard_deck();
        deck.shuffle(rng);
        deck
    }

    pub fn timing(&self) -> CardTiming {
        match self {
            DevCardKind::VictoryPoint => CardTiming::Passive,
            _ => CardTiming::Delayed,
        }
    }

    /// Whether this card can be played (VP cards are never "played")
    pub fn is_playable(&self) -> bool {
        self.timing() != CardTiming::Passive
    }
}

/// A development card in a player's hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevCard {
    pub kind: DevCardKind,
    /// False until the owner's next end of turn
    pub can_play: bool,
}

/// A hand of resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHand {
    pub wood: u32,
    pub brick: u32,
    pub wheat: u32,
    pub sheep: u32,
    pub ore: u32,
}

impl ResourceHand {
    /// Create an empty hand
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hand with specific amounts
    pub fn with_amounts(wood: u32, brick: u32, wheat: u32, sheep: u32, ore: u32) -> Self {
        Self {
            wood,
            brick,
            wheat,
            sheep,
            ore,
        }
    }

    /// Create a hand with a single resource
    pub fn single(resource: Resource, amount: u32) -> Self {
        let mut hand = Self::new();
        hand.add(resource, amount);
        hand
    }

    /// Total number of resource cards
    pub fn total(&self) -> u32 {
        self.wood + self.brick + self.wheat + self.sheep + self.ore
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Get count of a specific resource
    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Wood => self.wood,
            Resource::Brick => self.brick,
            Resource::Wheat => self.wheat,
            Resource::Sheep => self.sheep,
            Resource::Ore => self.ore,
        }
    }

    fn slot(&mut self, resource: Resource) -> &mut u32 {
        match resource {
            Resource::Wood => &mut self.wood,
            Resource::Brick => &mut self.brick,
            Resource::Wheat => &mut self.wheat,
            Resource::Sheep => &mut self.sheep,
            Resource::Ore => &mut self.ore,
        }
    }

    /// Set count of a specific resource
    pub fn set(&mut self, resource: Resource, count: u32) {
        *self.slot(resource) = count;
    }

    pub fn add(&mut self, resource: Resource, amount: u32) {
        *self.slot(resource) += amount;
    }

    /// Add another hand to this one
    pub fn add_hand(&mut self, other: &ResourceHand) {
        for r in Resource::ALL {
            self.add(r, other.get(r));
        }
    }

    /// Remove and return every card of one resource
    pub fn take_all(&mut self, resource: Resource) -> u32 {
        std::mem::take(self.slot(resource))
    }

    /// Check if can afford a cost
    pub fn can_afford(&self, cost: &ResourceHand) -> bool {
        Resource::ALL.iter().all(|&r| self.get(r) >= cost.get(r))
    }

    /// Subtract a cost; callers check `can_afford` first, counts never go below zero
    pub fn subtract(&mut self, cost: &ResourceHand) {
        debug_assert!(self.can_afford(cost), "cannot afford {cost:?}");
        for r in Resource::ALL {
            let slot = self.slot(r);
            *slot = slot.saturating_sub(cost.get(r));
        }
    }

    /// Remove a random card (for robber stealing)
    pub fn steal_random<R: Rng>(&mut self, rng: &mut R) -> Option<Resource> {
        let available: Vec<Resource> = Resource::ALL
            .iter()
            .flat_map(|&r| std::iter::repeat(r).take(self.get(r) as usize))
            .collect();
        let resource = *available.choose(rng)?;
        self.subtract(&ResourceHand::single(resource, 1));
        Some(resource)
    }

    /// Discard `count` cards one at a time from the largest pile.
    /// Ties go to the earlier resource in [`Resource::ALL`].
    pub fn discard_largest(&mut self, count: u32) -> ResourceHand {
        let mut discarded = ResourceHand::new();
        for _ in 0..count {
            let largest = Resource::ALL
                .iter()
                .copied()
                .filter(|&r| self.get(r) > 0)
                .fold(None, |best: Option<Resource>, r| match best {
                    Some(b) if self.get(b) >= self.get(r) => Some(b),
                    _ => Some(r),
                });
            let Some(resource) = largest else {
                break;
            };
            *self.slot(resource) -= 1;
            discarded.add(resource, 1);
        }
        discarded
    }
}

/// Building costs
pub mod costs {
    use super::ResourceHand;

    /// 1 wood, 1 brick
    pub fn road() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 0, 0, 0)
    }

    /// 1 wood, 1 brick, 1 wheat, 1 sheep
    pub fn town() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 1, 1, 0)
    }

    /// 2 wheat, 3 ore
    pub fn city() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 2, 0, 3)
    }

    /// 1 sheep, 1 wheat, 1 ore
    pub fn development_card() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 1, 1, 1)
    }
}

/// A single player's state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    /// Display name
    pub name: String,
    pub color: PlayerColor,
    pub resources: ResourceHand,
    /// Total victory points, kept current by the engine after every action
    pub victory_points: u32,
    /// Development cards in hand
    pub dev_cards: Vec<DevCard>,
    /// How many of each kind this player has played
    pub played_dev_cards: BTreeMap<DevCardKind, u32>,
    /// Number of knights played (for Largest Army)
    pub knights_played: u32,
    pub has_longest_road: bool,
    pub has_largest_army: bool,
    pub has_rolled: bool,
    pub bought_dev_card_this_turn: bool,
    pub played_dev_card_this_turn: bool,
    /// Roads this player may still place without paying
    pub free_roads: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            color: PlayerColor::for_player(id),
            resources: ResourceHand::new(),
            victory_points: 0,
            dev_cards: Vec::new(),
            played_dev_cards: BTreeMap::new(),
            knights_played: 0,
            has_longest_road: false,
            has_largest_army: false,
            has_rolled: false,
            bought_dev_card_this_turn: false,
            played_dev_card_this_turn: false,
            free_roads: 0,
        }
    }

    /// Points from awards and held VP cards; buildings are counted on the board
    pub fn bonus_points(&self) -> u32 {
        let mut vp = self.hidden_vp();
        if self.has_longest_road {
            vp += 2;
        }
        if self.has_largest_army {
            vp += 2;
        }
        vp
    }

    /// VP cards that opponents can't see
    pub fn hidden_vp(&self) -> u32 {
        self.count_cards(DevCardKind::VictoryPoint) as u32
    }

    /// Victory points visible to opponents
    pub fn public_vp(&self) -> u32 {
        self.victory_points.saturating_sub(self.hidden_vp())
    }

    pub fn count_cards(&self, kind: DevCardKind) -> usize {
        self.dev_cards.iter().filter(|c| c.kind == kind).count()
    }

    pub fn can_afford_road(&self) -> bool {
        self.resources.can_afford(&costs::road())
    }

    pub fn can_afford_town(&self) -> bool {
        self.resources.can_afford(&costs::town())
    }

    pub fn can_afford_city(&self) -> bool {
        self.resources.can_afford(&costs::city())
    }

    pub fn can_afford_dev_card(&self) -> bool {
        self.resources.can_afford(&costs::development_card())
    }

    /// Pay for a development card and add it to the hand, locked
    pub fn buy_dev_card(&mut self, kind: DevCardKind) {
        self.resources.subtract(&costs::development_card());
        self.dev_cards.push(DevCard {
            kind,
            can_play: false,
        });
        self.bought_dev_card_this_turn = true;
    }

    /// Called at end of turn: unlock cards and reset per-turn flags
    pub fn end_turn(&mut self) {
        for card in &mut self.dev_cards {
            card.can_play = true;
        }
        self.has_rolled = false;
        self.bought_dev_card_this_turn = false;
        self.played_dev_card_this_turn = false;
        self.free_roads = 0;
    }

    /// Check if player holds an unlocked card of the given kind
    pub fn has_playable_dev_card(&self, kind: DevCardKind) -> bool {
        kind.is_playable() && self.dev_cards.iter().any(|c| c.kind == kind && c.can_play)
    }

    /// Play a development card (moves it from hand to the played counts)
    pub fn play_dev_card(&mut self, kind: DevCardKind) -> bool {
        if !kind.is_playable() {
            return false;
        }
        let Some(pos) = self.dev_cards.iter().position(|c| c.kind == kind && c.can_play) else {
            return false;
        };
        self.dev_cards.remove(pos);
        *self.played_dev_cards.entry(kind).or_insert(0) += 1;
        if kind == DevCardKind::Knight {
            self.knights_played += 1;
        }
        self.played_dev_card_this_turn = true;
        true
    }

    /// Cards played so far, all kinds
    pub fn played_count(&self) -> u32 {
        self.played_dev_cards.values().sum()
    }
}
