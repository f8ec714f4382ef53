use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{format_system_time, ws::CandidateMessage, ws::QuestionMessage},
    state::game::{GameRecord, Rating},
};

/// Longest accepted game name.
pub const MAX_GAME_NAME_LEN: u64 = 200;
/// Upper bound on questions and candidates of one game.
pub const MAX_GAME_ENTRIES: u64 = 500;

/// Payload of `POST /create-game`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    /// Display name of the game.
    #[validate(length(max = MAX_GAME_NAME_LEN))]
    pub game_name: String,
    /// Room code players join with; trimmed and lower-cased.
    pub room_code: String,
    /// Question texts; blank entries are dropped.
    #[serde(default)]
    #[validate(length(max = MAX_GAME_ENTRIES))]
    pub questions: Vec<String>,
    /// Candidates without any name are dropped.
    #[serde(default)]
    #[validate(length(max = MAX_GAME_ENTRIES))]
    pub candidates: Vec<NewCandidate>,
}

/// Candidate entry of [`CreateGameRequest`].
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewCandidate {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Object key of an uploaded picture.
    #[serde(default)]
    pub picture: String,
}

/// Answer of `POST /create-game`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateGameResponse {
    pub status: String,
    pub message: String,
}

impl CreateGameResponse {
    /// Answer for a stored `room_id`.
    pub fn stored(room_id: &str) -> Self {
        Self {
            status: "stored".into(),
            message: format!("game {room_id} saved"),
        }
    }
}

/// Answer of `GET /generate-random-code`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RandomCodeResponse {
    pub status: String,
    pub data: RandomCodeData,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RandomCodeData {
    /// Unused room code.
    pub game_code: String,
}

impl RandomCodeResponse {
    pub fn ok(game_code: String) -> Self {
        Self {
            status: "ok".into(),
            data: RandomCodeData { game_code },
        }
    }
}

/// Payload of `POST /does-game-exist`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GameExistsRequest {
    /// Room code to look up.
    #[validate(length(min = 1, message = "room_id is required"))]
    pub room_id: String,
}

/// Answer of `POST /does-game-exist`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameExistsResponse {
    pub status: String,
    pub data: GameExistsData,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GameExistsData {
    pub does_game_exist: bool,
}

impl GameExistsResponse {
    pub fn ok(does_game_exist: bool) -> Self {
        Self {
            status: "ok".into(),
            data: GameExistsData { does_game_exist },
        }
    }
}

/// Payload of `POST /pictures/presign-upload`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PresignUploadRequest {
    /// Object key the picture will be stored under.
    #[validate(length(min = 1, max = 1024, message = "key is required"))]
    pub key: String,
    /// Defaults to `application/octet-stream`.
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Answer of `POST /pictures/presign-upload`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PresignUploadResponse {
    pub status: String,
    pub data: PresignUploadData,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PresignUploadData {
    /// `PUT` URL valid for 15 minutes.
    pub signed_url: String,
}

impl PresignUploadResponse {
    pub fn ok(signed_url: String) -> Self {
        Self {
            status: "ok".into(),
            data: PresignUploadData { signed_url },
        }
    }
}

/// Full game record as served by `GET /fetch-game/{room_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameView {
    /// Room code.
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "GameName")]
    pub name: String,
    #[serde(rename = "Questions")]
    pub questions: Vec<QuestionMessage>,
    /// Pictures are signed URLs, or empty.
    #[serde(rename = "Candidates")]
    pub candidates: Vec<CandidateMessage>,
    /// Question id -> candidate id -> rating.
    #[serde(rename = "Leaderboard")]
    #[schema(value_type = Object)]
    pub leaderboard: IndexMap<u32, IndexMap<u32, RatingView>>,
    #[serde(rename = "NumCandidates")]
    pub num_candidates: usize,
    #[serde(rename = "CreatedAt")]
    pub created_at: String,
    #[serde(rename = "UpdatedAt")]
    pub updated_at: String,
}

/// Rating as exposed over HTTP.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct RatingView {
    #[serde(rename = "Mu")]
    pub mu: f64,
    #[serde(rename = "Sigma")]
    pub sigma: f64,
}

impl From<Rating> for RatingView {
    fn from(value: Rating) -> Self {
        Self {
            mu: value.mu,
            sigma: value.sigma,
        }
    }
}

impl From<GameRecord> for GameView {
    fn from(value: GameRecord) -> Self {
        let mut leaderboard: IndexMap<u32, IndexMap<u32, RatingView>> = IndexMap::new();
        for (question_id, candidate_id, rating) in value.leaderboard.iter() {
            leaderboard
                .entry(question_id)
                .or_default()
                .insert(candidate_id, rating.into());
        }

        Self {
            id: value.room_id,
            name: value.name,
            questions: value.questions.into_iter().map(Into::into).collect(),
            candidates: value.candidates.into_iter().map(Into::into).collect(),
            leaderboard,
            num_candidates: value.num_candidates,
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
        }
    }
}

/// Answer of `GET /fetch-game/{room_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct FetchGameResponse {
    pub status: String,
    pub data: GameView,
}

impl FetchGameResponse {
    pub fn ok(game: GameView) -> Self {
        Self {
            status: "ok".into(),
            data: game,
        }
    }
}
