//! Mini-game statistics, kept on the device only

use std::sync::Arc;

use crate::cache::{KeyValueStore, LocalStore};
use crate::models::{GameKind, GameOutcome, GameStat};
use crate::sync::SyncError;

fn key(user_id: i64) -> String {
    format!("game_stats_{}", user_id)
}

pub struct GameStatsService {
    store: Arc<LocalStore>,
}

impl GameStatsService {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// One entry per game, zeroed for games never played
    pub async fn stats(&self, user_id: i64) -> Result<Vec<GameStat>, SyncError> {
        let stored = self.load(user_id).await?;
        Ok(GameKind::ALL
            .iter()
            .map(|game| {
                stored
                    .iter()
                    .find(|s| s.game == *game)
                    .cloned()
                    .unwrap_or_else(|| GameStat::new(user_id, *game))
            })
            .collect())
    }

    /// Count a finished or abandoned game and return the updated entry
    pub async fn record(
        &self,
        user_id: i64,
        game: GameKind,
        outcome: GameOutcome,
    ) -> Result<GameStat, SyncError> {
        let mut stats = self.load(user_id).await?;
        let index = match stats.iter().position(|s| s.game == game) {
            Some(index) => index,
            None => {
                stats.push(GameStat::new(user_id, game));
                stats.len() - 1
            }
        };
        stats[index].record(outcome);
        let updated = stats[index].clone();

        self.store
            .set(&key(user_id), &stats)
            .await
            .map_err(|e| SyncError::Persistence(format!("{:#}", e)))?;
        tracing::debug!(user_id, game = ?game, played = updated.played(), "Game recorded");
        Ok(updated)
    }

    async fn load(&self, user_id: i64) -> Result<Vec<GameStat>, SyncError> {
        let stored: Option<Vec<GameStat>> = self.store.get(&key(user_id)).await?;
        Ok(stored
            .unwrap_or_default()
            .into_iter()
            .map(GameStat::normalized)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileStore;
    use tempfile::TempDir;

    fn file_games(dir: &TempDir) -> GameStatsService {
        GameStatsService::new(Arc::new(LocalStore::File(FileStore::open(dir.path()).unwrap())))
    }

    #[tokio::test]
    async fn test_stats_survive_restart() {
        let dir = TempDir::new().unwrap();
        {
            let games = file_games(&dir);
            let won = GameOutcome {
                completed: true,
                score: Some(80),
                time_secs: Some(300),
            };
            let abandoned = GameOutcome {
                completed: false,
                score: None,
                time_secs: None,
            };
            games.record(3, GameKind::Sudoku, won).await.unwrap();
            games.record(3, GameKind::Sudoku, abandoned).await.unwrap();
        }

        let games = file_games(&dir);
        let stats = games.stats(3).await.unwrap();
        assert_eq!(stats.len(), 3);
        let sudoku = stats.iter().find(|s| s.game == GameKind::Sudoku).unwrap();
        assert_eq!((sudoku.played(), sudoku.completed()), (2, 1));
        assert_eq!(sudoku.best_score(), Some(80));
        assert!(dir.path().join("game_stats_3.json").exists());

        let memory = stats.iter().find(|s| s.game == GameKind::Memory).unwrap();
        assert_eq!(memory.played(), 0);
    }

    #[tokio::test]
    async fn test_stats_are_per_user() {
        let dir = TempDir::new().unwrap();
        let games = file_games(&dir);
        let solved = GameOutcome {
            completed: true,
            score: None,
            time_secs: Some(42),
        };
        games.record(3, GameKind::Crossword, solved).await.unwrap();
        let other = games.stats(4).await.unwrap();
        assert!(other.iter().all(|s| s.played() == 0));
    }
}
