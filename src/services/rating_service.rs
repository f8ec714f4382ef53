//! Turns a vote into leaderboard changes and queues their persistence.

use std::time::SystemTime;

use thiserror::Error;
use tracing::debug;

use crate::{
    services::{persistence::PersistenceQueue, rating_engine::RatingEngine},
    state::{
        cache::SharedRoom,
        game::{GameRecord, Round, RatingUpdate, RatingUpdateBatch, Vote},
    },
};

/// Reasons a vote is dropped without touching the leaderboard.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteError {
    /// The vote names another room.
    #[error("vote targets game `{actual}` but the session serves `{expected}`")]
    RoomMismatch { expected: String, actual: String },
    /// Question or winner id is zero.
    #[error("question and winner identifiers must be positive")]
    MissingIdentifier,
    /// The vote answers another question than the round asked.
    #[error("vote answers question {actual} but the round asked {expected:?}")]
    QuestionMismatch { expected: Option<u32>, actual: u32 },
    /// The winner was not offered in the round.
    #[error("candidate {0} was not part of the round")]
    WinnerNotInRound(u32),
}

/// Result of an accepted vote.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    /// The round had no loser; nothing to rate.
    Skipped,
    /// Leaderboard updated and the batch queued for persistence.
    Applied(RatingUpdateBatch),
}

/// Check `vote` against the round it answers and update `record` in place.
pub fn apply_vote(
    record: &mut GameRecord,
    round: &Round,
    vote: &Vote,
    engine: &dyn RatingEngine,
) -> Result<VoteOutcome, VoteError> {
    if vote.room_id != record.room_id {
        return Err(VoteError::RoomMismatch {
            expected: record.room_id.clone(),
            actual: vote.room_id.clone(),
        });
    }
    if vote.question_id == 0 || vote.winner_id == 0 {
        return Err(VoteError::MissingIdentifier);
    }
    let expected_question = round.question.as_ref().map(|question| question.id);
    if expected_question != Some(vote.question_id) {
        return Err(VoteError::QuestionMismatch {
            expected: expected_question,
            actual: vote.question_id,
        });
    }
    if !round.contains_candidate(vote.winner_id) {
        return Err(VoteError::WinnerNotInRound(vote.winner_id));
    }

    // Winner first, then the losers in round order.
    let players: Vec<u32> = std::iter::once(vote.winner_id)
        .chain(
            round
                .candidates
                .iter()
                .map(|candidate| candidate.id)
                .filter(|id| *id != vote.winner_id),
        )
        .collect();
    if players.len() < 2 {
        return Ok(VoteOutcome::Skipped);
    }

    let current: Vec<_> = players
        .iter()
        .map(|id| record.leaderboard.rating_or_default(vote.question_id, *id))
        .collect();
    let adjusted = engine.adjust(&current);

    let updates: Vec<RatingUpdate> = players
        .iter()
        .zip(adjusted)
        .map(|(candidate_id, rating)| RatingUpdate {
            question_id: vote.question_id,
            candidate_id: *candidate_id,
            rating,
        })
        .collect();
    for update in &updates {
        record
            .leaderboard
            .set(update.question_id, update.candidate_id, update.rating);
    }
    record.updated_at = SystemTime::now();

    Ok(VoteOutcome::Applied(RatingUpdateBatch {
        room_id: record.room_id.clone(),
        updates,
    }))
}

/// Apply `vote` under the room lock, then hand the batch to the persistence queue.
pub async fn process_vote(
    room: &SharedRoom,
    round: &Round,
    vote: &Vote,
    engine: &dyn RatingEngine,
    persistence: &PersistenceQueue,
) -> Result<VoteOutcome, VoteError> {
    let outcome = {
        let mut record = room.lock().await;
        apply_vote(&mut record, round, vote, engine)?
    };

    match &outcome {
        VoteOutcome::Applied(batch) => {
            debug!(
                room_id = %batch.room_id,
                question_id = vote.question_id,
                winner_id = vote.winner_id,
                updates = batch.updates.len(),
                "vote applied"
            );
            persistence.submit(batch.clone());
        }
        VoteOutcome::Skipped => {
            debug!(room_id = %vote.room_id, "round had a single candidate; vote skipped");
        }
    }
    Ok(outcome)
}
