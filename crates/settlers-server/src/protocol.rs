//! WebSocket protocol messages.

use serde::{Deserialize, Serialize};
use settlers_core::{Action, AgentSnapshot, BotDifficulty, GameConfig, GameEvent, PlayerId};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Create a new game; player names default to "Player 1", ...
    CreateGame {
        #[serde(default)]
        config: GameConfig,
        #[serde(default)]
        names: Vec<String>,
    },

    /// Submit a game action, `{"type": <kind>, "payload": {...}}`
    Action { game_id: Uuid, action: serde_json::Value },

    /// Regenerate the board before anything is built
    Reroll { game_id: Uuid },

    /// Request a player's view of the game
    Snapshot { game_id: Uuid, player_id: PlayerId },

    /// Request the legal actions for a player
    LegalActions { game_id: Uuid, player_id: PlayerId },

    /// Let a server-side bot play the current player's turn
    AutoTurn {
        game_id: Uuid,
        #[serde(default)]
        difficulty: BotDifficulty,
    },

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Welcome message with the connection's id
    Welcome { client_id: Uuid },

    /// Game created successfully
    GameCreated { game_id: Uuid, state: serde_json::Value },

    /// Outcome of a submitted action: `event` and `state` on success, `error` otherwise
    ActionResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        event: Option<GameEvent>,
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A player's view of the game
    Snapshot { snapshot: Box<AgentSnapshot> },

    /// Legal actions for a player
    LegalActions { player_id: PlayerId, actions: Vec<Action> },

    /// Game state updated
    GameState { game_id: Uuid, state: serde_json::Value },

    /// Game finished
    GameOver { game_id: Uuid, winner: PlayerId, winner_name: String },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,
}

impl ServerMessage {
    pub fn error(message: impl ToString) -> Self {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }

    pub fn accepted(event: GameEvent, state: serde_json::Value) -> Self {
        ServerMessage::ActionResult {
            success: true,
            event: Some(event),
            state: Some(state),
            error: None,
        }
    }

    pub fn rejected(error: impl ToString) -> Self {
        ServerMessage::ActionResult {
            success: false,
            event: None,
            state: None,
            error: Some(error.to_string()),
        }
    }
}
