//! WebSocket server and connection handling.

use crate::config::ServerConfig;
use crate::orchestrator::{BotClient, Orchestrator};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::repository::{GameRepository, InMemoryRepository};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use settlers_core::{Action, AgentSnapshot, BotDifficulty, GameConfig, GameState, PlayerId};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState<R = InMemoryRepository> {
    /// All live games
    pub games: R,
    /// Clients following each game
    pub subscribers: DashMap<Uuid, Vec<Uuid>>,
    /// Mapping from client ID to their message sender
    pub client_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    orchestrator: Orchestrator,
    bot_seed: Option<u64>,
}

impl ServerState<InMemoryRepository> {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_repository(InMemoryRepository::new(), config)
    }
}

impl<R: GameRepository> ServerState<R> {
    pub fn with_repository(games: R, config: &ServerConfig) -> Self {
        Self {
            games,
            subscribers: DashMap::new(),
            client_senders: DashMap::new(),
            orchestrator: Orchestrator::new(config.agent_max_retries),
            bot_seed: config.bot_seed,
        }
    }

    /// Send a message to a specific client.
    pub fn send_to_client(&self, client_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.client_senders.get(&client_id) {
            let _ = sender.send(msg);
        }
    }

    /// Broadcast a message to every client following a game.
    pub fn broadcast_to_game(&self, game_id: Uuid, msg: ServerMessage) {
        if let Some(clients) = self.subscribers.get(&game_id) {
            for client_id in clients.iter() {
                self.send_to_client(*client_id, msg.clone());
            }
        }
    }

    fn subscribe(&self, game_id: Uuid, client_id: Uuid) {
        let mut clients = self.subscribers.entry(game_id).or_default();
        if !clients.contains(&client_id) {
            clients.push(client_id);
        }
    }

    fn unsubscribe_all(&self, client_id: Uuid) {
        for mut clients in self.subscribers.iter_mut() {
            clients.retain(|c| *c != client_id);
        }
    }

    /// Handle a client message.
    pub fn handle_message(&self, client_id: Uuid, msg: ClientMessage) {
        match msg {
            ClientMessage::CreateGame { config, names } => self.create_game(client_id, config, names),

            ClientMessage::Action { game_id, action } => {
                self.subscribe(game_id, client_id);
                let action: Action = match serde_json::from_value(action) {
                    Ok(action) => action,
                    Err(e) => {
                        self.send_to_client(client_id, ServerMessage::rejected(format!("Invalid action: {e}")));
                        return;
                    }
                };

                let result = self.games.with_game(game_id, |game| {
                    game.apply_action(&action)
                        .map(|event| (event, state_json(game), winner_of(game)))
                });
                match result {
                    Ok(Ok((event, state, winner))) => {
                        self.send_to_client(client_id, ServerMessage::accepted(event, state.clone()));
                        self.broadcast_to_game(game_id, ServerMessage::GameState { game_id, state });
                        if let Some((winner, winner_name)) = winner {
                            self.broadcast_to_game(
                                game_id,
                                ServerMessage::GameOver {
                                    game_id,
                                    winner,
                                    winner_name,
                                },
                            );
                        }
                    }
                    Ok(Err(e)) => self.send_to_client(client_id, ServerMessage::rejected(e)),
                    Err(e) => self.send_to_client(client_id, ServerMessage::error(e)),
                }
            }

            ClientMessage::Reroll { game_id } => {
                let result = self
                    .games
                    .with_game(game_id, |game| game.reroll_board().map(|_| state_json(game)));
                match result {
                    Ok(Ok(state)) => self.broadcast_to_game(game_id, ServerMessage::GameState { game_id, state }),
                    Ok(Err(e)) => self.send_to_client(client_id, ServerMessage::error(e)),
                    Err(e) => self.send_to_client(client_id, ServerMessage::error(e)),
                }
            }

            ClientMessage::Snapshot { game_id, player_id } => {
                self.subscribe(game_id, client_id);
                match self
                    .games
                    .with_game(game_id, |game| AgentSnapshot::for_player(game, player_id))
                {
                    Ok(snapshot) => self.send_to_client(
                        client_id,
                        ServerMessage::Snapshot {
                            snapshot: Box::new(snapshot),
                        },
                    ),
                    Err(e) => self.send_to_client(client_id, ServerMessage::error(e)),
                }
            }

            ClientMessage::LegalActions { game_id, player_id } => {
                match self
                    .games
                    .with_game(game_id, |game| settlers_core::legal_actions(game, player_id))
                {
                    Ok(actions) => self.send_to_client(client_id, ServerMessage::LegalActions { player_id, actions }),
                    Err(e) => self.send_to_client(client_id, ServerMessage::error(e)),
                }
            }

            ClientMessage::AutoTurn { game_id, difficulty } => self.auto_turn(client_id, game_id, difficulty),

            ClientMessage::Ping => {
                self.send_to_client(client_id, ServerMessage::Pong);
            }
        }
    }

    fn create_game(&self, client_id: Uuid, config: GameConfig, names: Vec<String>) {
        let created = if names.is_empty() {
            GameState::new(config)
        } else {
            GameState::with_names(config, names)
        };
        let game = match created {
            Ok(game) => game,
            Err(e) => {
                self.send_to_client(client_id, ServerMessage::error(e));
                return;
            }
        };

        let state = state_json(&game);
        match self.games.insert(game) {
            Ok(game_id) => {
                info!("Client {} created game {}", client_id, game_id);
                self.subscribe(game_id, client_id);
                self.send_to_client(client_id, ServerMessage::GameCreated { game_id, state });
            }
            Err(e) => self.send_to_client(client_id, ServerMessage::error(e)),
        }
    }

    /// Play the current player's turn with a server-side bot
    fn auto_turn(&self, client_id: Uuid, game_id: Uuid, difficulty: BotDifficulty) {
        self.subscribe(game_id, client_id);
        let orchestrator = self.orchestrator;
        let seed = self.bot_seed;

        let result = self.games.with_game(game_id, |game| {
            let mut bot = BotClient::new(game.current_player, difficulty, turn_seed(seed, game.turn));
            orchestrator
                .play_turn(game, &mut bot)
                .map(|events| (events, state_json(game), winner_of(game)))
        });

        match result {
            Ok(Ok((events, state, winner))) => {
                for event in events {
                    self.send_to_client(client_id, ServerMessage::accepted(event, state.clone()));
                }
                self.broadcast_to_game(game_id, ServerMessage::GameState { game_id, state });
                if let Some((winner, winner_name)) = winner {
                    self.broadcast_to_game(
                        game_id,
                        ServerMessage::GameOver {
                            game_id,
                            winner,
                            winner_name,
                        },
                    );
                }
            }
            Ok(Err(e)) => {
                warn!("Auto turn failed in game {}: {}", game_id, e);
                self.send_to_client(client_id, ServerMessage::error(e));
            }
            Err(e) => self.send_to_client(client_id, ServerMessage::error(e)),
        }
    }
}

/// Per-turn bot seed, so a seeded server does not replay the same choices every turn
fn turn_seed(seed: Option<u64>, turn: u32) -> Option<u64> {
    seed.map(|s| s ^ u64::from(turn).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn state_json(game: &GameState) -> serde_json::Value {
    serde_json::to_value(game).unwrap_or_else(|e| {
        error!("Failed to serialize game {}: {}", game.id, e);
        serde_json::Value::Null
    })
}

fn winner_of(game: &GameState) -> Option<(PlayerId, String)> {
    let winner = game.winner?;
    let name = game.player(winner)?.name.clone();
    Some((winner, name))
}

/// Run the WebSocket server.
pub async fn run_server<R: GameRepository + 'static>(addr: SocketAddr, state: Arc<ServerState<R>>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Settlers server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection<R: GameRepository>(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState<R>>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let client_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.client_senders.insert(client_id, tx);

    let welcome = ServerMessage::Welcome { client_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text)).await?;

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => state.handle_message(client_id, client_msg),
                Err(e) => {
                    warn!("Invalid message from {}: {}", client_id, text);
                    state.send_to_client(client_id, ServerMessage::error(format!("Invalid message: {e}")));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", client_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_client(client_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", client_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    state.unsubscribe_all(client_id);
    state.client_senders.remove(&client_id);
    send_task.abort();

    info!("Connection closed for {}", client_id);
    Ok(())
}
