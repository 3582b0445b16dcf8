//! Heuristic bot players.
//!
//! Bots only ever choose among [`legal_actions`], so whatever they pick is
//! accepted by the engine:
//! - Easy: random legal moves
//! - Medium: basic heuristics (roll first, cities and well-numbered towns,
//!   robber onto opponents)

use crate::actions::Action;
use crate::board::{NodeId, PlayerId, TileId};
use crate::game::GameState;
use crate::legal::legal_actions;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Bot difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BotDifficulty {
    Easy,
    #[default]
    Medium,
}

/// A bot player that can decide on actions
#[derive(Debug, Clone)]
pub struct Bot {
    pub player_id: PlayerId,
    pub difficulty: BotDifficulty,
    rng: StdRng,
}

/// Pip weight of a number token: how many of the 36 rolls hit it, 7 excluded
pub fn pip_score(number: u8) -> i32 {
    match number {
        6 | 8 => 5,
        5 | 9 => 4,
        4 | 10 => 3,
        3 | 11 => 2,
        2 | 12 => 1,
        _ => 0,
    }
}

impl Bot {
    pub fn new(player_id: PlayerId, difficulty: BotDifficulty) -> Self {
        Self {
            player_id,
            difficulty,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(player_id: PlayerId, difficulty: BotDifficulty, seed: u64) -> Self {
        Self {
            player_id,
            difficulty,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Choose an action from the legal actions; `None` when it isn't our turn
    pub fn choose_action(&mut self, game: &GameState) -> Option<Action> {
        let actions = legal_actions(game, self.player_id);
        if actions.is_empty() {
            return None;
        }

        match self.difficulty {
            BotDifficulty::Easy => self.choose_easy(&actions),
            BotDifficulty::Medium => self.choose_medium(game, &actions),
        }
    }

    /// Easy: Just pick a random legal action
    fn choose_easy(&mut self, actions: &[Action]) -> Option<Action> {
        actions.choose(&mut self.rng).cloned()
    }

    /// Medium: Use basic heuristics
    fn choose_medium(&mut self, game: &GameState, actions: &[Action]) -> Option<Action> {
        // Priority order for medium bot:
        // 1. Roll dice
        // 2. Robber onto the best opponent tile
        // 3. Cities, then towns on the best numbers
        // 4. Setup roads, then roads 30% of the time
        // 5. Dev cards 20% of the time, then trades
        // 6. End turn

        if actions.contains(&Action::RollDice) {
            return Some(Action::RollDice);
        }

        let robber: Vec<&Action> = of_kind(actions, |a| matches!(a, Action::MoveRobber { .. }));
        if !robber.is_empty() {
            return self.rank_robber_spots(game, &robber).cloned();
        }

        let cities: Vec<&Action> = of_kind(actions, |a| matches!(a, Action::BuildCity { .. }));
        if !cities.is_empty() {
            return self.rank_town_spots(game, &cities).cloned();
        }

        let towns: Vec<&Action> = of_kind(actions, |a| matches!(a, Action::BuildTown { .. }));
        if !towns.is_empty() {
            return self.rank_town_spots(game, &towns).cloned();
        }

        // Free roads cost nothing, so always take them
        let free_roads: Vec<&Action> = of_kind(actions, |a| matches!(a, Action::BuildRoad { free: true, .. }));
        if !free_roads.is_empty() {
            return free_roads.choose(&mut self.rng).map(|a| (*a).clone());
        }

        let roads: Vec<&Action> = of_kind(actions, |a| matches!(a, Action::BuildRoad { .. }));
        if !roads.is_empty() && self.rng.gen_bool(0.3) {
            return roads.choose(&mut self.rng).map(|a| (*a).clone());
        }

        let buy = Action::BuyDevCard {
            player_id: self.player_id,
        };
        if actions.contains(&buy) && self.rng.gen_bool(0.2) {
            return Some(buy);
        }

        let plays: Vec<&Action> = of_kind(actions, |a| {
            matches!(
                a,
                Action::PlayKnight { .. }
                    | Action::PlayRoadBuilding { .. }
                    | Action::PlayYearOfPlenty { .. }
                    | Action::PlayMonopoly { .. }
            )
        });
        if let Some(play) = plays.first() {
            return Some((*play).clone());
        }

        let trades: Vec<&Action> = of_kind(actions, |a| matches!(a, Action::HarborTrade { .. }));
        if let Some(trade) = trades.first() {
            return Some((*trade).clone());
        }

        if actions.contains(&Action::EndTurn) {
            return Some(Action::EndTurn);
        }

        // Fallback to random
        actions.choose(&mut self.rng).cloned()
    }

    /// Pick from the top 3 town or city sites by pip score
    fn rank_town_spots<'a>(&mut self, game: &GameState, actions: &[&'a Action]) -> Option<&'a Action> {
        let mut scored: Vec<_> = actions
            .iter()
            .map(|action| {
                let score = match action {
                    Action::BuildTown { node_id, .. } | Action::BuildCity { node_id, .. } => {
                        self.score_node(game, *node_id)
                    }
                    _ => 0,
                };
                (*action, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let top = scored.iter().take(3).collect::<Vec<_>>();
        top.choose(&mut self.rng).map(|(a, _)| *a)
    }

    /// Score a node based on adjacent tile numbers
    fn score_node(&self, game: &GameState, node: NodeId) -> i32 {
        let Some(node) = game.board.node(node) else {
            return 0;
        };
        node.tiles
            .iter()
            .filter_map(|&t| game.board.tile(t))
            .filter_map(|t| t.number)
            .map(pip_score)
            .sum()
    }

    /// Rank robber spots to hurt opponents
    fn rank_robber_spots<'a>(&mut self, game: &GameState, actions: &[&'a Action]) -> Option<&'a Action> {
        actions
            .iter()
            .map(|action| {
                let score = match action {
                    Action::MoveRobber { hex_id } => self.score_robber_spot(game, *hex_id),
                    _ => 0,
                };
                (*action, score)
            })
            .max_by_key(|(_, score)| *score)
            .map(|(action, _)| action)
    }

    /// Score robber placement
    fn score_robber_spot(&self, game: &GameState, hex: TileId) -> i32 {
        let Some(tile) = game.board.tile(hex) else {
            return -100;
        };

        // Prefer high-value tiles
        let mut score = tile.number.map_or(0, |n| pip_score(n) * 2);

        // Prefer tiles with opponent buildings, avoid our own
        for player_id in game.board.players_adjacent_to_tile(hex) {
            if player_id == self.player_id {
                score -= 20;
            } else {
                score += 5;
            }
        }

        score
    }
}

fn of_kind(actions: &[Action], pred: impl Fn(&Action) -> bool) -> Vec<&Action> {
    actions.iter().filter(|a| pred(a)).collect()
}
