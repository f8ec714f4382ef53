use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::state::game::{Candidate, Question, Round, Vote};

/// Envelope type of a vote message.
pub const VOTE_MESSAGE: &str = "VOTE";

#[derive(Debug, Deserialize)]
/// Frame sent by a player: `{"type": "VOTE", "data": {...}}`.
pub struct ClientEnvelope {
    /// Message type; only `VOTE` is handled.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload.
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Winner picked by a player for the current round. Zero ids count as missing.
pub struct VoteDto {
    /// Room the vote belongs to.
    #[serde(alias = "GameID")]
    #[validate(length(min = 1, message = "vote missing game_id"))]
    pub game_id: String,
    /// Question the round asked.
    #[serde(default, alias = "QuestionID")]
    #[validate(range(min = 1, message = "vote missing question_id"))]
    pub question_id: u32,
    /// Candidate picked by the player.
    #[serde(default, alias = "WinnerID")]
    #[validate(range(min = 1, message = "vote missing winner_id"))]
    pub winner_id: u32,
}

impl From<VoteDto> for Vote {
    fn from(value: VoteDto) -> Self {
        Self {
            room_id: value.game_id,
            question_id: value.question_id,
            winner_id: value.winner_id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Round pushed to players after connecting and after every message.
pub struct RoundMessage {
    #[serde(rename = "GameID")]
    pub game_id: String,
    #[serde(rename = "Question")]
    pub question: QuestionMessage,
    #[serde(rename = "Candidates")]
    pub candidates: Vec<CandidateMessage>,
}

/// Question as sent to players.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct QuestionMessage {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "Val")]
    pub value: String,
}

/// Candidate as sent to players.
#[derive(Debug, Serialize, ToSchema)]
pub struct CandidateMessage {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "First_Name")]
    pub first_name: String,
    #[serde(rename = "Last_Name")]
    pub last_name: String,
    /// Signed picture URL, empty when the candidate has none.
    #[serde(rename = "Picture")]
    pub picture: String,
    #[serde(rename = "GamesPlayed")]
    pub games_played: u32,
}

impl From<Question> for QuestionMessage {
    fn from(value: Question) -> Self {
        Self {
            id: value.id,
            value: value.value,
        }
    }
}

impl From<Candidate> for CandidateMessage {
    fn from(value: Candidate) -> Self {
        Self {
            id: value.id,
            first_name: value.first_name,
            last_name: value.last_name,
            picture: value.picture.unwrap_or_default(),
            games_played: value.games_played,
        }
    }
}

impl From<Round> for RoundMessage {
    fn from(value: Round) -> Self {
        Self {
            game_id: value.room_id,
            question: value.question.map(Into::into).unwrap_or_default(),
            candidates: value.candidates.into_iter().map(Into::into).collect(),
        }
    }
}
