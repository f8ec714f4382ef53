use std::time::SystemTime;

use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};

use crate::dao::models::{
    CandidateEntity, GameEntity, QuestionEntity, RatingEntity, RatingUpdateEntity,
};

/// Default mean skill assigned to every candidate when a game is created.
pub const DEFAULT_MU: f64 = 25.0;
/// Default skill uncertainty assigned to every candidate when a game is created.
pub const DEFAULT_SIGMA: f64 = DEFAULT_MU / 3.0;

/// A question players answer by picking one candidate of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Positive identifier, unique within the game.
    pub id: u32,
    /// Question text shown to players.
    pub value: String,
}

/// A person (or thing) being ranked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Positive identifier, unique within the game.
    pub id: u32,
    pub first_name: String,
    pub last_name: String,
    /// Opaque storage key of the candidate picture. Resolved to a signed URL
    /// only when a round is presented.
    pub picture: Option<String>,
    pub games_played: u32,
}

/// Skill estimate of a candidate for one question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    /// Mean skill.
    pub mu: f64,
    /// Uncertainty of the mean.
    pub sigma: f64,
}

impl Rating {
    /// Build a rating from explicit parameters.
    pub fn new(mu: f64, sigma: f64) -> Self {
        Self { mu, sigma }
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self {
            mu: DEFAULT_MU,
            sigma: DEFAULT_SIGMA,
        }
    }
}

/// Per-question skill ratings of every candidate.
///
/// Entries are only ever replaced by rating updates, never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Leaderboard(IndexMap<u32, IndexMap<u32, Rating>>);

impl Leaderboard {
    /// Seed a rating for every (question, candidate) pair.
    pub fn seeded(questions: &[Question], candidates: &[Candidate], initial: Rating) -> Self {
        let board = questions
            .iter()
            .map(|question| {
                let entries = candidates
                    .iter()
                    .map(|candidate| (candidate.id, initial))
                    .collect();
                (question.id, entries)
            })
            .collect();
        Self(board)
    }

    /// Current rating of `candidate_id` under `question_id`, if any.
    pub fn get(&self, question_id: u32, candidate_id: u32) -> Option<Rating> {
        self.0
            .get(&question_id)
            .and_then(|entries| entries.get(&candidate_id))
            .copied()
    }

    /// Current rating, falling back to the default rating for unseen pairs.
    pub fn rating_or_default(&self, question_id: u32, candidate_id: u32) -> Rating {
        self.get(question_id, candidate_id).unwrap_or_default()
    }

    /// Replace (or create) one entry.
    pub fn set(&mut self, question_id: u32, candidate_id: u32, rating: Rating) {
        self.0
            .entry(question_id)
            .or_default()
            .insert(candidate_id, rating);
    }

    /// Iterate over `(question_id, candidate_id, rating)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, Rating)> + '_ {
        self.0.iter().flat_map(|(question_id, entries)| {
            entries
                .iter()
                .map(move |(candidate_id, rating)| (*question_id, *candidate_id, *rating))
        })
    }

    /// Number of (question, candidate) entries.
    pub fn len(&self) -> usize {
        self.0.values().map(IndexMap::len).sum()
    }

    /// Whether the board holds no entry at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory copy of the authoritative game record of a room.
#[derive(Debug, Clone)]
pub struct GameRecord {
    /// Room identifier, also the primary key in durable storage.
    pub room_id: String,
    /// Display name of the game.
    pub name: String,
    pub questions: Vec<Question>,
    pub candidates: Vec<Candidate>,
    /// Ratings per question and candidate.
    pub leaderboard: Leaderboard,
    /// Denormalized number of candidates.
    pub num_candidates: usize,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl GameRecord {
    /// Build a fresh game with every leaderboard entry at `initial`.
    pub fn new(
        room_id: impl Into<String>,
        name: impl Into<String>,
        questions: Vec<Question>,
        candidates: Vec<Candidate>,
        initial: Rating,
    ) -> Self {
        let timestamp = SystemTime::now();
        let leaderboard = Leaderboard::seeded(&questions, &candidates, initial);
        Self {
            room_id: room_id.into(),
            name: name.into(),
            num_candidates: candidates.len(),
            questions,
            candidates,
            leaderboard,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }
}

/// One question plus a sampled subset of candidates, shown to a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    /// Room the round belongs to.
    pub room_id: String,
    /// `None` when the game has no question or no candidate.
    pub question: Option<Question>,
    /// Candidates offered, in display order.
    pub candidates: Vec<Candidate>,
}

impl Round {
    /// Round carrying only the room identifier.
    pub fn empty(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            question: None,
            candidates: Vec::new(),
        }
    }

    /// Whether `candidate_id` was shown in this round.
    pub fn contains_candidate(&self, candidate_id: u32) -> bool {
        self.candidates
            .iter()
            .any(|candidate| candidate.id == candidate_id)
    }
}

/// A client vote naming the winner of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    /// Room named by the vote.
    pub room_id: String,
    pub question_id: u32,
    pub winner_id: u32,
}

/// One leaderboard entry changed by a vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingUpdate {
    pub question_id: u32,
    pub candidate_id: u32,
    pub rating: Rating,
}

/// All rating changes produced by one vote; the unit of a persistence write.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingUpdateBatch {
    /// Room whose leaderboard changed.
    pub room_id: String,
    /// New ratings, winner first.
    pub updates: Vec<RatingUpdate>,
}

/// Pick a random question and up to `round_size` distinct random candidates.
///
/// Candidate pictures are left as storage keys; signing happens later.
pub fn sample_round<R: Rng + ?Sized>(record: &GameRecord, round_size: usize, rng: &mut R) -> Round {
    let total = record.candidates.len();
    if record.questions.is_empty() || total == 0 {
        return Round::empty(record.room_id.clone());
    }

    let question = record.questions[rng.random_range(0..record.questions.len())].clone();

    let size = if round_size == 0 {
        total
    } else {
        round_size.min(total)
    };

    let mut order: Vec<usize> = (0..total).collect();
    order.shuffle(rng);

    let candidates = order
        .into_iter()
        .take(size)
        .map(|index| record.candidates[index].clone())
        .collect();

    Round {
        room_id: record.room_id.clone(),
        question: Some(question),
        candidates,
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            value: value.value,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            id: value.id,
            value: value.value,
        }
    }
}

impl From<CandidateEntity> for Candidate {
    fn from(value: CandidateEntity) -> Self {
        Self {
            id: value.id,
            first_name: value.first_name,
            last_name: value.last_name,
            picture: value.picture.filter(|key| !key.is_empty()),
            games_played: value.games_played,
        }
    }
}

impl From<Candidate> for CandidateEntity {
    fn from(value: Candidate) -> Self {
        Self {
            id: value.id,
            first_name: value.first_name,
            last_name: value.last_name,
            picture: value.picture,
            games_played: value.games_played,
        }
    }
}

impl From<RatingEntity> for Rating {
    fn from(value: RatingEntity) -> Self {
        Self {
            mu: value.mu,
            sigma: value.sigma,
        }
    }
}

impl From<Rating> for RatingEntity {
    fn from(value: Rating) -> Self {
        Self {
            mu: value.mu,
            sigma: value.sigma,
        }
    }
}

impl From<RatingUpdate> for RatingUpdateEntity {
    fn from(value: RatingUpdate) -> Self {
        Self {
            question_id: value.question_id,
            candidate_id: value.candidate_id,
            rating: value.rating.into(),
        }
    }
}

impl From<GameEntity> for GameRecord {
    fn from(value: GameEntity) -> Self {
        let mut leaderboard = Leaderboard::default();
        for (question_id, entries) in value.leaderboard {
            for (candidate_id, rating) in entries {
                leaderboard.set(question_id, candidate_id, rating.into());
            }
        }

        let candidates: Vec<Candidate> = value.candidates.into_iter().map(Into::into).collect();
        Self {
            room_id: value.id,
            name: value.name,
            questions: value.questions.into_iter().map(Into::into).collect(),
            num_candidates: candidates.len(),
            candidates,
            leaderboard,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<GameRecord> for GameEntity {
    fn from(value: GameRecord) -> Self {
        let mut leaderboard: IndexMap<u32, IndexMap<u32, RatingEntity>> = IndexMap::new();
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
            num_candidates: value.num_candidates as u32,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
