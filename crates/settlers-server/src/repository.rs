//! Game storage.
//!
//! The engine knows nothing about where games live; the server is handed a
//! [`GameRepository`] instead. Access goes through [`GameRepository::with_game`]
//! so each action runs with exclusive access to its game.

use dashmap::DashMap;
use settlers_core::GameState;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Game {0} not found")]
    NotFound(Uuid),

    #[error("Game {0} already exists")]
    AlreadyExists(Uuid),
}

pub trait GameRepository: Send + Sync {
    /// Store a new game under its own id
    fn insert(&self, game: GameState) -> Result<Uuid, RepositoryError>;

    /// Run `f` with exclusive access to a game
    fn with_game<T>(&self, id: Uuid, f: impl FnOnce(&mut GameState) -> T) -> Result<T, RepositoryError>;
}

/// Process-local repository backed by a concurrent map
#[derive(Default)]
pub struct InMemoryRepository {
    games: DashMap<Uuid, GameState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameRepository for InMemoryRepository {
    fn insert(&self, game: GameState) -> Result<Uuid, RepositoryError> {
        let id = game.id;
        match self.games.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(RepositoryError::AlreadyExists(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(game);
                Ok(id)
            }
        }
    }

    fn with_game<T>(&self, id: Uuid, f: impl FnOnce(&mut GameState) -> T) -> Result<T, RepositoryError> {
        let mut game = self.games.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        Ok(f(game.value_mut()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use settlers_core::GameConfig;

    fn game() -> GameState {
        GameState::new(GameConfig::default().with_seed(1).with_players(2)).unwrap()
    }

    #[test]
    fn test_insert_and_mutate() {
        let repo = InMemoryRepository::new();
        let id = repo.insert(game()).unwrap();

        repo.with_game(id, |g| {
            let node = g.board.valid_town_sites(0, true)[0];
            g.build_town(node, 0).unwrap();
        })
        .unwrap();
        let buildings = repo.with_game(id, |g| g.board.building_count()).unwrap();
        assert_eq!(buildings, 1);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let repo = InMemoryRepository::new();
        let g = game();
        let copy = g.clone();
        let id = repo.insert(g).unwrap();
        assert_eq!(repo.insert(copy), Err(RepositoryError::AlreadyExists(id)));
    }

    #[test]
    fn test_missing_game() {
        let repo = InMemoryRepository::new();
        let id = Uuid::new_v4();
        assert_eq!(repo.with_game(id, |_| ()), Err(RepositoryError::NotFound(id)));
    }
}
