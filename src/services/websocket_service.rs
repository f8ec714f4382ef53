use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use rand::{SeedableRng, rngs::StdRng};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use validator::{Validate, ValidationErrors};

use crate::{
    dto::ws::{ClientEnvelope, RoundMessage, VOTE_MESSAGE, VoteDto},
    services::{
        rating_service::{self, VoteError, VoteOutcome},
        room_service,
    },
    state::{SharedState, cache::SharedRoom, game::Round},
};

/// Why an inbound frame did not produce a rating change.
///
/// Never surfaced to the player; the session logs it and moves on.
#[derive(Debug, Error)]
enum SessionError {
    /// Writer channel closed, the session must end.
    #[error("connection closed")]
    ConnectionClosed,
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported message type `{0}`")]
    UnsupportedType(String),
    #[error("vote frame without data")]
    MissingData,
    #[error("invalid vote: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error("vote rejected: {0}")]
    Rejected(#[from] VoteError),
}

/// Drive one player session on `room_id` until the socket closes or idles out.
pub async fn handle_socket(
    state: SharedState,
    room_id: String,
    mut room: SharedRoom,
    socket: WebSocket,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps rounds flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let session_id = state.register_session(&room_id);
    info!(%session_id, room_id = %room_id, "player connected");

    let mut rng = StdRng::from_rng(&mut rand::rng());
    let mut round = prepare_round(&state, &room_id, &mut room, &mut rng).await;

    if send_round(&outbound_tx, &round).is_ok() {
        let idle_timeout = state.config().idle_timeout;
        loop {
            let message = match tokio::time::timeout(idle_timeout, receiver.next()).await {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(err))) => {
                    warn!(%session_id, error = %err, "websocket error");
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    info!(%session_id, timeout = ?idle_timeout, "closing idle session");
                    let _ = outbound_tx.send(Message::Close(None));
                    break;
                }
            };

            match message {
                Message::Text(text) => {
                    room = state.cache().touch(&room_id, &room);
                    match handle_text(&state, &room, &round, text.as_str()).await {
                        Ok(VoteOutcome::Applied(batch)) => {
                            debug!(%session_id, updates = batch.updates.len(), "vote applied");
                        }
                        Ok(VoteOutcome::Skipped) => {
                            debug!(%session_id, "single-candidate round; vote skipped");
                        }
                        Err(err) => {
                            warn!(%session_id, room_id = %room_id, error = %err, "ignoring frame");
                        }
                    }

                    // A new round follows every text frame, accepted or not.
                    round = prepare_round(&state, &room_id, &mut room, &mut rng).await;
                    if send_round(&outbound_tx, &round).is_err() {
                        break;
                    }
                }
                Message::Close(frame) => {
                    let _ = outbound_tx.send(Message::Close(frame));
                    break;
                }
                // Pings are answered by the protocol layer.
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    }

    state.unregister_session(&session_id);
    info!(%session_id, room_id = %room_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

async fn handle_text(
    state: &SharedState,
    room: &SharedRoom,
    round: &Round,
    text: &str,
) -> Result<VoteOutcome, SessionError> {
    let envelope: ClientEnvelope = serde_json::from_str(text)?;
    if envelope.kind != VOTE_MESSAGE {
        return Err(SessionError::UnsupportedType(envelope.kind));
    }
    let data = envelope.data.ok_or(SessionError::MissingData)?;
    let vote: VoteDto = serde_json::from_value(data)?;
    vote.validate()?;

    let outcome = rating_service::process_vote(
        room,
        round,
        &vote.into(),
        state.engine(),
        state.persistence(),
    )
    .await?;
    Ok(outcome)
}

/// Sample the next round, refreshing the room's cache entry first.
async fn prepare_round(
    state: &SharedState,
    room_id: &str,
    room: &mut SharedRoom,
    rng: &mut StdRng,
) -> Round {
    *room = state.cache().touch(room_id, room);
    let record = room.lock().await;
    room_service::next_round(
        &record,
        state.config().round_size,
        state.signer(),
        state.config().picture_ttl,
        rng,
    )
}

fn send_round(tx: &mpsc::UnboundedSender<Message>, round: &Round) -> Result<(), SessionError> {
    let payload = match serde_json::to_string(&RoundMessage::from(round.clone())) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, room_id = %round.room_id, "failed to serialize round");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into()))
        .map_err(|_| SessionError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::pictures::DisabledPictureSigner,
        state::{
            AppState,
            game::{Candidate, GameRecord, Question, Rating},
            storage::StorageSlot,
        },
    };

    fn record(room_id: &str) -> GameRecord {
        GameRecord::new(
            room_id,
            "test",
            vec![Question {
                id: 1,
                value: "Who?".into(),
            }],
            (1..=2)
                .map(|id| Candidate {
                    id,
                    first_name: format!("c{id}"),
                    last_name: String::new(),
                    picture: None,
                    games_played: 0,
                })
                .collect(),
            Rating::default(),
        )
    }

    fn state(config: AppConfig) -> SharedState {
        AppState::new(
            config,
            Arc::new(StorageSlot::new()),
            Arc::new(DisabledPictureSigner),
        )
    }

    fn state_with_room() -> (SharedState, SharedRoom) {
        let state = state(AppConfig::default());
        let room = state.cache().insert("ab12", record("ab12"));
        (state, room)
    }

    fn vote_frame(round: &Round, winner_id: u32) -> String {
        json!({
            "type": "VOTE",
            "data": {
                "game_id": round.room_id,
                "question_id": round.question.as_ref().map(|question| question.id),
                "winner_id": winner_id
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn vote_frame_updates_the_room() {
        let (state, mut room) = state_with_room();
        let mut rng = StdRng::seed_from_u64(1);
        let round = prepare_round(&state, "ab12", &mut room, &mut rng).await;

        let outcome = handle_text(&state, &room, &round, &vote_frame(&round, 2))
            .await
            .unwrap();
        assert!(matches!(outcome, VoteOutcome::Applied(_)));

        let record = room.lock().await;
        let winner = record.leaderboard.get(1, 2).unwrap();
        let loser = record.leaderboard.get(1, 1).unwrap();
        assert!(winner.mu > loser.mu);
    }

    #[tokio::test]
    async fn bad_frames_are_rejected_without_changes() {
        let (state, mut room) = state_with_room();
        let mut rng = StdRng::seed_from_u64(1);
        let round = prepare_round(&state, "ab12", &mut room, &mut rng).await;
        let before = room.lock().await.leaderboard.clone();

        for frame in [
            "not json",
            r#"{"type":"PING"}"#,
            r#"{"type":"VOTE"}"#,
            r#"{"type":"VOTE","data":{"game_id":"ab12","question_id":1}}"#,
            r#"{"type":"VOTE","data":{"game_id":"zz99","question_id":1,"winner_id":2}}"#,
            r#"{"type":"VOTE","data":{"game_id":"ab12","question_id":1,"winner_id":9}}"#,
        ] {
            assert!(handle_text(&state, &room, &round, frame).await.is_err(), "{frame}");
        }

        assert_eq!(room.lock().await.leaderboard, before);
    }

    #[tokio::test]
    async fn voting_room_outlives_idle_rooms_in_the_cache() {
        let state = state(AppConfig {
            cache_capacity: 2,
            eviction_sample_size: 100,
            ..AppConfig::default()
        });
        let mut busy = state.cache().insert("busy", record("busy"));
        state.cache().insert("idle", record("idle"));

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..5 {
            let round = prepare_round(&state, "busy", &mut busy, &mut rng).await;
            handle_text(&state, &busy, &round, &vote_frame(&round, 1))
                .await
                .unwrap();
        }
        state.cache().insert("new", record("new"));

        assert!(state.cache().contains("busy"));
        assert!(!state.cache().contains("idle"));
    }

    #[tokio::test]
    async fn session_reinstates_its_room_after_eviction() {
        let (state, mut room) = state_with_room();
        let held = room.clone();
        state.cache().remove("ab12");

        let mut rng = StdRng::seed_from_u64(2);
        prepare_round(&state, "ab12", &mut room, &mut rng).await;

        let cached = state.cache().get("ab12").unwrap();
        assert!(Arc::ptr_eq(&cached, &held));
        assert!(Arc::ptr_eq(&room, &held));
    }
}
