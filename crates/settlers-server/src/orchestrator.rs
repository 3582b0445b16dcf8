//! Driving games with automated decision clients.
//!
//! A [`DecisionClient`] answers with raw text, the way an external agent
//! would. The orchestrator parses and applies it; anything unparseable or
//! rejected is retried, and once retries run out a safe fallback is applied
//! so a misbehaving client can never stall a game.

use settlers_core::{
    legal_actions, Action, AgentSnapshot, Bot, BotDifficulty, GameError, GameEvent, GameState, PlayerId, TurnPhase,
};
use thiserror::Error;
use tracing::{debug, warn};

/// Actions one player may take in a single turn before it is ended for them
pub const MAX_ACTIONS_PER_TURN: usize = 64;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Decision client failed: {0}")]
    Client(String),

    #[error("Unparseable action: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Action belongs to player {actual}, expected {expected}")]
    WrongPlayer { expected: PlayerId, actual: PlayerId },

    #[error("Action rejected: {0}")]
    Rejected(#[from] GameError),

    #[error("Game is over")]
    GameOver,
}

/// Something that picks an action for the current player
pub trait DecisionClient: Send {
    /// Return the chosen action as JSON text
    fn decide(&mut self, snapshot: &AgentSnapshot, game: &GameState) -> Result<String, OrchestratorError>;
}

/// Decision client backed by an in-process [`Bot`]
pub struct BotClient {
    bot: Bot,
}

impl BotClient {
    pub fn new(player_id: PlayerId, difficulty: BotDifficulty, seed: Option<u64>) -> Self {
        let bot = match seed {
            Some(seed) => Bot::with_seed(player_id, difficulty, seed),
            None => Bot::new(player_id, difficulty),
        };
        Self { bot }
    }
}

impl DecisionClient for BotClient {
    fn decide(&mut self, _snapshot: &AgentSnapshot, game: &GameState) -> Result<String, OrchestratorError> {
        let action = self
            .bot
            .choose_action(game)
            .ok_or_else(|| OrchestratorError::Client("bot has no legal action".into()))?;
        Ok(serde_json::to_string(&action)?)
    }
}

/// How a step was resolved
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The client's own action was applied
    Decided(GameEvent),
    /// The client failed every attempt and the fallback was applied
    Fallback(GameEvent),
}

impl StepOutcome {
    pub fn event(&self) -> &GameEvent {
        match self {
            StepOutcome::Decided(event) | StepOutcome::Fallback(event) => event,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, StepOutcome::Fallback(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Orchestrator {
    max_retries: u32,
}

impl Orchestrator {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Ask the client for one action for the current player and apply it
    pub fn step(&self, game: &mut GameState, client: &mut dyn DecisionClient) -> Result<StepOutcome, OrchestratorError> {
        if game.is_finished() {
            return Err(OrchestratorError::GameOver);
        }
        let player = game.current_player;
        let snapshot = AgentSnapshot::for_player(game, player);

        for attempt in 0..=self.max_retries {
            match Self::attempt(game, client, &snapshot, player) {
                Ok(event) => return Ok(StepOutcome::Decided(event)),
                Err(err) => {
                    warn!(game = %game.id, player, attempt, error = %err, "decision client failed");
                }
            }
        }

        let fallback = fallback_action(game);
        debug!(game = %game.id, player, action = fallback.kind(), "applying fallback");
        let event = game.apply_action(&fallback)?;
        Ok(StepOutcome::Fallback(event))
    }

    fn attempt(
        game: &mut GameState,
        client: &mut dyn DecisionClient,
        snapshot: &AgentSnapshot,
        player: PlayerId,
    ) -> Result<GameEvent, OrchestratorError> {
        let raw = client.decide(snapshot, game)?;
        let action: Action = serde_json::from_str(&raw)?;
        if let Some(actual) = action.player_id() {
            if actual != player {
                return Err(OrchestratorError::WrongPlayer {
                    expected: player,
                    actual,
                });
            }
        }
        Ok(game.apply_action(&action)?)
    }

    /// Step until the turn passes to another player or the game ends
    pub fn play_turn(&self, game: &mut GameState, client: &mut dyn DecisionClient) -> Result<Vec<GameEvent>, OrchestratorError> {
        let player = game.current_player;
        let start_turn = game.turn;
        let mut events = Vec::new();
        let mut fallbacks = 0;

        while !game.is_finished() && game.turn == start_turn {
            if events.len() >= MAX_ACTIONS_PER_TURN {
                warn!(game = %game.id, player, "turn action limit reached");
                events.extend(force_end_turn(game)?);
                break;
            }
            let outcome = self.step(game, client)?;
            if outcome.is_fallback() {
                fallbacks += 1;
            }
            events.push(outcome.event().clone());
        }
        if fallbacks > 0 {
            warn!(game = %game.id, player, fallbacks, actions = events.len(), "turn needed fallback actions");
        }
        Ok(events)
    }
}

/// `rollDice` while the turn has not been rolled, the first legal placement
/// during setup, `endTurn` otherwise
fn fallback_action(game: &GameState) -> Action {
    match game.phase {
        TurnPhase::NotRolled => Action::RollDice,
        TurnPhase::Setup => legal_actions(game, game.current_player)
            .into_iter()
            .next()
            .unwrap_or(Action::EndTurn),
        _ => Action::EndTurn,
    }
}

/// Apply fallbacks until the turn passes; a setup turn takes up to three
fn force_end_turn(game: &mut GameState) -> Result<Vec<GameEvent>, OrchestratorError> {
    let start_turn = game.turn;
    let mut events = Vec::new();
    for _ in 0..4 {
        if game.is_finished() || game.turn != start_turn {
            break;
        }
        events.push(game.apply_action(&fallback_action(game))?);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use settlers_core::{EventKind, GameConfig};

    /// Replays canned answers, then repeats the last one
    struct ScriptedClient {
        answers: Vec<String>,
        calls: usize,
    }

    impl ScriptedClient {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|s| s.to_string()).collect(),
                calls: 0,
            }
        }
    }

    impl DecisionClient for ScriptedClient {
        fn decide(&mut self, _snapshot: &AgentSnapshot, _game: &GameState) -> Result<String, OrchestratorError> {
            let answer = self.answers[self.calls.min(self.answers.len() - 1)].clone();
            self.calls += 1;
            Ok(answer)
        }
    }

    struct FailingClient;

    impl DecisionClient for FailingClient {
        fn decide(&mut self, _snapshot: &AgentSnapshot, _game: &GameState) -> Result<String, OrchestratorError> {
            Err(OrchestratorError::Client("timed out".into()))
        }
    }

    fn game() -> GameState {
        GameState::new(GameConfig::default().with_seed(7).with_players(2)).unwrap()
    }

    fn finish_setup(game: &mut GameState) {
        let orchestrator = Orchestrator::new(0);
        let mut bots = [
            BotClient::new(0, BotDifficulty::Medium, Some(1)),
            BotClient::new(1, BotDifficulty::Medium, Some(2)),
        ];
        while game.is_setup() {
            let client = &mut bots[game.current_player as usize];
            orchestrator.step(game, client).unwrap();
        }
    }

    #[test]
    fn test_garbage_falls_back_to_end_turn() {
        let mut game = game();
        finish_setup(&mut game);
        let player = game.current_player;
        game.roll_dice_with(1, 1).unwrap();
        let mut client = ScriptedClient::new(&["not json at all"]);

        let outcome = Orchestrator::new(2).step(&mut game, &mut client).unwrap();

        assert!(outcome.is_fallback());
        assert_eq!(client.calls, 3);
        assert!(matches!(outcome.event().kind, EventKind::TurnEnded { .. }));
        assert_ne!(game.current_player, player);
    }

    #[test]
    fn test_setup_fallback_places_instead_of_ending() {
        let mut game = game();
        let mut client = ScriptedClient::new(&["not json at all"]);
        let orchestrator = Orchestrator::new(0);

        let town = orchestrator.step(&mut game, &mut client).unwrap();
        assert!(matches!(town.event().kind, EventKind::TownBuilt { player: 0, .. }));
        let road = orchestrator.step(&mut game, &mut client).unwrap();
        assert!(matches!(road.event().kind, EventKind::RoadBuilt { player: 0, .. }));
        assert_eq!(game.current_player, 0);

        let end = orchestrator.step(&mut game, &mut client).unwrap();
        assert!(matches!(end.event().kind, EventKind::TurnEnded { player: 0, .. }));
        assert_eq!(game.current_player, 1);
    }

    #[test]
    fn test_failing_client_still_completes_setup_fairly() {
        let mut game = game();
        let orchestrator = Orchestrator::new(0);
        while game.is_setup() {
            orchestrator.play_turn(&mut game, &mut FailingClient).unwrap();
        }
        for player in 0..2 {
            assert_eq!(game.board.buildings_of(player).count(), 2);
        }
    }

    #[test]
    fn test_unknown_action_kind_falls_back() {
        let mut game = game();
        let mut client = ScriptedClient::new(&[r#"{"type":"teleport","payload":{}}"#]);

        let outcome = Orchestrator::new(0).step(&mut game, &mut client).unwrap();
        assert!(outcome.is_fallback());
        assert_eq!(client.calls, 1);
    }

    #[test]
    fn test_fallback_rolls_before_ending() {
        let mut game = game();
        finish_setup(&mut game);
        assert_eq!(game.phase, TurnPhase::NotRolled);

        let outcome = Orchestrator::new(1).step(&mut game, &mut FailingClient).unwrap();
        assert!(outcome.is_fallback());
        assert!(matches!(outcome.event().kind, EventKind::DiceRolled { .. }));
    }

    #[test]
    fn test_retry_then_success() {
        let mut game = game();
        let node = game.board.valid_town_sites(0, true)[0];
        let valid = format!(r#"{{"type":"buildTown","payload":{{"nodeId":{node},"playerId":0}}}}"#);
        let mut client = ScriptedClient::new(&["{", &valid]);

        let outcome = Orchestrator::new(2).step(&mut game, &mut client).unwrap();
        assert_eq!(client.calls, 2);
        assert!(matches!(outcome, StepOutcome::Decided(_)));
        assert_eq!(game.board.nodes[node].owner(), Some(0));
    }

    #[test]
    fn test_rejects_action_for_another_player() {
        let mut game = game();
        let node = game.board.valid_town_sites(1, true)[0];
        let other = format!(r#"{{"type":"buildTown","payload":{{"nodeId":{node},"playerId":1}}}}"#);
        let mut client = ScriptedClient::new(&[&other]);

        let outcome = Orchestrator::new(0).step(&mut game, &mut client).unwrap();
        assert!(outcome.is_fallback());
        assert_ne!(game.board.nodes[node].owner(), Some(1));
        assert_eq!(game.board.buildings_of(1).count(), 0);
    }

    #[test]
    fn test_bot_plays_a_full_turn() {
        let mut game = game();
        finish_setup(&mut game);
        let start = game.current_player;

        let mut bot = BotClient::new(start, BotDifficulty::Medium, Some(3));
        let events = Orchestrator::new(2).play_turn(&mut game, &mut bot).unwrap();

        assert!(!events.is_empty());
        assert!(matches!(events[0].kind, EventKind::DiceRolled { .. }));
        assert!(game.is_finished() || game.current_player != start);
    }

    #[test]
    fn test_finished_game_is_not_stepped() {
        let mut game = game();
        game.winner = Some(0);
        let result = Orchestrator::new(0).step(&mut game, &mut FailingClient);
        assert!(matches!(result, Err(OrchestratorError::GameOver)));
    }
}
