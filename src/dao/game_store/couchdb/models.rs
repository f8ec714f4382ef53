use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dao::models::{CandidateEntity, GameEntity, QuestionEntity, RatingEntity};

/// Prefix of game document ids.
pub const GAME_PREFIX: &str = "game::";

/// Document id of `room_id`.
pub fn game_doc_id(room_id: &str) -> String {
    format!("{GAME_PREFIX}{room_id}")
}

/// Game record as stored in CouchDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    /// `game::<room_id>`.
    #[serde(rename = "_id")]
    pub id: String,
    /// Revision, required to overwrite an existing document.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub room_id: String,
    pub name: String,
    pub questions: Vec<QuestionEntity>,
    pub candidates: Vec<CandidateEntity>,
    pub leaderboard: IndexMap<u32, IndexMap<u32, RatingEntity>>,
    pub num_candidates: u32,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl CouchGameDocument {
    /// Wrap `game` for a write at revision `rev`.
    pub fn from_entity(game: GameEntity, rev: Option<String>) -> Self {
        Self {
            id: game_doc_id(&game.id),
            rev,
            room_id: game.id,
            name: game.name,
            questions: game.questions,
            candidates: game.candidates,
            leaderboard: game.leaderboard,
            num_candidates: game.num_candidates,
            created_at: game.created_at,
            updated_at: game.updated_at,
        }
    }

    /// Drop the CouchDB metadata.
    pub fn into_entity(self) -> GameEntity {
        GameEntity {
            id: self.room_id,
            name: self.name,
            questions: self.questions,
            candidates: self.candidates,
            leaderboard: self.leaderboard,
            num_candidates: self.num_candidates,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_round_trips_through_json() {
        let mut leaderboard = IndexMap::new();
        leaderboard.insert(
            1,
            IndexMap::from([(2, RatingEntity { mu: 26.5, sigma: 7.0 })]),
        );
        let game = GameEntity {
            id: "abcd".into(),
            name: "Best pizza".into(),
            questions: vec![QuestionEntity {
                id: 1,
                value: "Who bakes better?".into(),
            }],
            candidates: vec![CandidateEntity {
                id: 2,
                first_name: "Ada".into(),
                last_name: "L".into(),
                picture: Some("pictures/ada.png".into()),
                games_played: 0,
            }],
            leaderboard,
            num_candidates: 1,
            created_at: SystemTime::UNIX_EPOCH,
            updated_at: SystemTime::UNIX_EPOCH,
        };

        let doc = CouchGameDocument::from_entity(game.clone(), Some("1-abc".into()));
        let json = serde_json::to_string(&doc).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["_id"], "game::abcd");
        assert_eq!(value["_rev"], "1-abc");
        assert_eq!(value["leaderboard"]["1"]["2"]["mu"], 26.5);

        let parsed: CouchGameDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.into_entity(), game);
    }
}
