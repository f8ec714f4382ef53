use indexmap::IndexMap;
use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    CandidateEntity, GameEntity, QuestionEntity, RatingEntity, RatingUpdateEntity,
};

/// BSON documents only accept string keys, so the leaderboard ids are stringified.
type MongoLeaderboard = IndexMap<String, IndexMap<String, RatingEntity>>;

/// Game record as stored in the `games` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    questions: Vec<QuestionEntity>,
    candidates: Vec<CandidateEntity>,
    leaderboard: MongoLeaderboard,
    num_candidates: u32,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        let leaderboard = value
            .leaderboard
            .into_iter()
            .map(|(question_id, entries)| {
                let entries = entries
                    .into_iter()
                    .map(|(candidate_id, rating)| (candidate_id.to_string(), rating))
                    .collect();
                (question_id.to_string(), entries)
            })
            .collect();

        Self {
            id: value.id,
            name: value.name,
            questions: value.questions,
            candidates: value.candidates,
            leaderboard,
            num_candidates: value.num_candidates,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        // Keys we wrote ourselves are always numeric; anything else is skipped.
        let leaderboard = value
            .leaderboard
            .into_iter()
            .filter_map(|(question_id, entries)| {
                let question_id = question_id.parse::<u32>().ok()?;
                let entries = entries
                    .into_iter()
                    .filter_map(|(candidate_id, rating)| {
                        candidate_id.parse::<u32>().ok().map(|id| (id, rating))
                    })
                    .collect();
                Some((question_id, entries))
            })
            .collect();

        Self {
            id: value.id,
            name: value.name,
            questions: value.questions,
            candidates: value.candidates,
            leaderboard,
            num_candidates: value.num_candidates,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Filter matching the document of `room_id`.
pub fn doc_id(room_id: &str) -> Document {
    doc! { "_id": room_id }
}

/// `$set` update touching only the changed leaderboard entries.
pub fn rating_update(updates: &[RatingUpdateEntity]) -> Document {
    let mut set = Document::new();
    for update in updates {
        set.insert(
            format!("leaderboard.{}.{}", update.question_id, update.candidate_id),
            doc! { "mu": update.rating.mu, "sigma": update.rating.sigma },
        );
    }
    set.insert("updated_at", DateTime::now());
    doc! { "$set": set }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_update_targets_nested_entries() {
        let update = rating_update(&[RatingUpdateEntity {
            question_id: 3,
            candidate_id: 7,
            rating: RatingEntity {
                mu: 27.0,
                sigma: 6.5,
            },
        }]);
        let set = update.get_document("$set").unwrap();
        let entry = set.get_document("leaderboard.3.7").unwrap();
        assert_eq!(entry.get_f64("mu").unwrap(), 27.0);
        assert_eq!(entry.get_f64("sigma").unwrap(), 6.5);
        assert!(set.contains_key("updated_at"));
    }
}
