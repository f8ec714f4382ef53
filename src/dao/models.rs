use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Question entry stored with a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Positive identifier, unique within the game.
    pub id: u32,
    /// Question text.
    pub value: String,
}

/// Candidate entry stored with a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateEntity {
    /// Positive identifier, unique within the game.
    pub id: u32,
    pub first_name: String,
    pub last_name: String,
    /// Object storage key of the picture, never a signed URL.
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub games_played: u32,
}

/// Persisted skill rating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RatingEntity {
    pub mu: f64,
    pub sigma: f64,
}

/// Authoritative game record shared by every storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEntity {
    /// Room identifier.
    pub id: String,
    pub name: String,
    pub questions: Vec<QuestionEntity>,
    pub candidates: Vec<CandidateEntity>,
    /// Question id -> candidate id -> rating.
    pub leaderboard: IndexMap<u32, IndexMap<u32, RatingEntity>>,
    /// Always `candidates.len()`; kept for the wire format.
    pub num_candidates: u32,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl GameEntity {
    /// Overwrite leaderboard entries, creating missing question buckets.
    pub fn apply_ratings(&mut self, updates: &[RatingUpdateEntity]) {
        for update in updates {
            self.leaderboard
                .entry(update.question_id)
                .or_default()
                .insert(update.candidate_id, update.rating);
        }
        self.updated_at = SystemTime::now();
    }
}

/// Single leaderboard change written back by the rating pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RatingUpdateEntity {
    pub question_id: u32,
    pub candidate_id: u32,
    pub rating: RatingEntity,
}

impl RatingUpdateEntity {
    /// Both identifiers must be positive to be stored.
    pub fn is_valid(&self) -> bool {
        self.question_id > 0 && self.candidate_id > 0
    }
}
