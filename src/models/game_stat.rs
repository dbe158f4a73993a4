//! Mini-game statistics

use serde::{Deserialize, Serialize};

/// The dashboard's educational games
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Sudoku,
    Memory,
    Crossword,
}

impl GameKind {
    pub const ALL: [GameKind; 3] = [GameKind::Sudoku, GameKind::Memory, GameKind::Crossword];
}

/// Result of one finished or abandoned game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub completed: bool,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub time_secs: Option<i64>,
}

/// Per-user, per-game counters. `completed` never exceeds `played`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStat {
    pub user_id: i64,
    pub game: GameKind,
    played: u32,
    completed: u32,
    #[serde(default)]
    best_score: Option<i64>,
    #[serde(default)]
    best_time_secs: Option<i64>,
}

impl GameStat {
    pub fn new(user_id: i64, game: GameKind) -> Self {
        Self {
            user_id,
            game,
            played: 0,
            completed: 0,
            best_score: None,
            best_time_secs: None,
        }
    }

    pub fn played(&self) -> u32 {
        self.played
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn best_score(&self) -> Option<i64> {
        self.best_score
    }

    pub fn best_time_secs(&self) -> Option<i64> {
        self.best_time_secs
    }

    /// Count one game. Best score and time only move on completed games.
    pub fn record(&mut self, outcome: GameOutcome) {
        self.played = self.played.saturating_add(1);
        if !outcome.completed {
            return;
        }
        self.completed = (self.completed + 1).min(self.played);
        if let Some(score) = outcome.score {
            if self.best_score.map_or(true, |best| score > best) {
                self.best_score = Some(score);
            }
        }
        if let Some(time) = outcome.time_secs {
            if self.best_time_secs.map_or(true, |best| time < best) {
                self.best_time_secs = Some(time);
            }
        }
    }

    /// Repair counters read from storage that break `completed <= played`.
    pub fn normalized(mut self) -> Self {
        self.completed = self.completed.min(self.played);
        self
    }
}
