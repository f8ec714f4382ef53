//! Room lookup through the cache and round preparation.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::{
    dao::pictures::PictureSigner,
    error::ServiceError,
    state::{
        SharedState,
        cache::SharedRoom,
        game::{Candidate, GameRecord, Round, sample_round},
    },
};

/// Cached room, loading it from the game store on a miss.
pub async fn resolve_room(state: &SharedState, room_id: &str) -> Result<SharedRoom, ServiceError> {
    if let Some(room) = state.cache().get(room_id) {
        return Ok(room);
    }

    let store = state.storage().require_game_store().await?;
    let Some(entity) = store.find_game(room_id).await? else {
        return Err(ServiceError::NotFound(format!("game `{room_id}`")));
    };

    debug!(room_id = %room_id, "loaded room from storage");
    Ok(state.cache().get_or_insert(room_id, GameRecord::from(entity)))
}

/// Sample the next round of `record` and sign its pictures.
pub fn next_round<R: Rng + ?Sized>(
    record: &GameRecord,
    round_size: usize,
    signer: &dyn PictureSigner,
    picture_ttl: Duration,
    rng: &mut R,
) -> Round {
    let mut round = sample_round(record, round_size, rng);
    sign_pictures(&mut round.candidates, signer, picture_ttl);
    round
}

/// Replace picture keys with signed URLs; a failed signature clears the picture.
pub fn sign_pictures(candidates: &mut [Candidate], signer: &dyn PictureSigner, ttl: Duration) {
    for candidate in candidates {
        let Some(key) = candidate.picture.take().filter(|key| !key.is_empty()) else {
            continue;
        };
        match signer.sign_download(&key, ttl) {
            Ok(url) => candidate.picture = Some(url),
            Err(err) => warn!(
                candidate_id = candidate.id,
                key = %key,
                error = %err,
                "could not sign picture; sending candidate without it"
            ),
        }
    }
}
