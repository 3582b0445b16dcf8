//! Game configuration.
//!
//! Everything here deserializes with defaults, so a client may send `{}` or
//! override a single field.

use crate::game::GameError;
use crate::generator::BoardConfig;
use serde::{Deserialize, Serialize};

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;

/// Board radii a game can be played on
pub const RADIUS_RANGE: std::ops::RangeInclusive<u32> = 2..=5;

/// Smallest hex size that keeps corners apart after rounding
pub const MIN_HEX_SIZE: f64 = 1.0;

/// Setup alone is worth 2 points, so the threshold must be above that
pub const MIN_VICTORY_POINTS: u32 = 3;

/// Settings fixed at game creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    pub player_count: u8,
    pub board: BoardConfig,
    /// Seed for board generation, dice and the dev deck; entropy when absent
    pub seed: Option<u64>,
    pub rules: RuleConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            player_count: 4,
            board: BoardConfig::default(),
            seed: None,
            rules: RuleConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_players(mut self, player_count: u8) -> Self {
        self.player_count = player_count;
        self
    }

    /// Reject settings the engine can't play a fair game with
    pub fn validate(&self) -> Result<(), GameError> {
        let invalid = |reason: String| Err(GameError::InvalidConfig(reason));

        if !RADIUS_RANGE.contains(&self.board.radius) {
            return invalid(format!(
                "board radius must be {}-{}, got {}",
                RADIUS_RANGE.start(),
                RADIUS_RANGE.end(),
                self.board.radius
            ));
        }
        if !self.board.hex_size.is_finite() || self.board.hex_size < MIN_HEX_SIZE {
            return invalid(format!("hex size must be at least {MIN_HEX_SIZE}, got {}", self.board.hex_size));
        }
        if self.rules.bank_trade_ratio < 2 {
            return invalid(format!("bank trade ratio must be at least 2, got {}", self.rules.bank_trade_ratio));
        }
        if self.rules.victory_points_to_win < MIN_VICTORY_POINTS {
            return invalid(format!(
                "victory points to win must be at least {MIN_VICTORY_POINTS}, got {}",
                self.rules.victory_points_to_win
            ));
        }
        Ok(())
    }
}

/// Optional rules, all off by default except the win threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleConfig {
    pub victory_points_to_win: u32,
    /// On a 7, hands above `hand_limit` lose half (largest piles first)
    pub discard_on_seven: bool,
    pub hand_limit: u32,
    /// Moving the robber steals one random card from a random adjacent opponent
    pub robber_steals: bool,
    /// At most one development card played per turn
    pub one_dev_card_per_turn: bool,
    /// Ratio for trading without a harbor
    pub bank_trade_ratio: u32,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            victory_points_to_win: 10,
            discard_on_seven: false,
            hand_limit: 7,
            robber_steals: false,
            one_dev_card_per_turn: false,
            bank_trade_ratio: 4,
        }
    }
}
