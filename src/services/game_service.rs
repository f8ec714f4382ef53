//! Game lifecycle operations served by the fleet router.

use std::time::Duration;

use rand::Rng;
use tracing::info;

use crate::{
    dto::{
        game::{CreateGameRequest, GameView, NewCandidate},
        validation::validate_room_id,
    },
    error::ServiceError,
    services::{fleet_service, room_service::sign_pictures},
    state::{
        fleet::FleetState,
        game::{Candidate, GameRecord, Question, Rating},
    },
};

const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MIN_CODE_LEN: usize = 4;
const MAX_CODE_LEN: usize = 8;
/// Validity of presigned upload URLs.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Validate, assign and persist a new game. Returns the room id.
///
/// The store is checked before the assignment is written, and the record is
/// only persisted once the room is pinned to a server. A taken room code is
/// rejected so an existing room keeps its server.
pub async fn create_game(
    state: &FleetState,
    request: CreateGameRequest,
) -> Result<String, ServiceError> {
    let name = request.game_name.trim().to_owned();
    let room_id = normalize_room_id(&request.room_code)?;
    if name.is_empty() {
        return Err(ServiceError::InvalidInput(
            "gameName and roomCode are required".into(),
        ));
    }

    let questions = build_questions(&request.questions);
    if questions.is_empty() {
        return Err(ServiceError::InvalidInput(
            "at least one question is required".into(),
        ));
    }
    let candidates = build_candidates(&request.candidates);
    if candidates.is_empty() {
        return Err(ServiceError::InvalidInput(
            "at least one candidate is required".into(),
        ));
    }

    let store = state.storage().require_game_store().await?;
    if store.game_exists(&room_id).await? {
        return Err(ServiceError::Conflict(format!("game `{room_id}` already exists")));
    }
    let server = fleet_service::assign_room(state, &room_id).await?;

    let params = state.config().rating;
    let record = GameRecord::new(
        room_id.clone(),
        name,
        questions,
        candidates,
        Rating::new(params.mu, params.sigma),
    );
    store.create_game(record.into()).await?;

    info!(room_id = %room_id, server = %server.name, "game stored");
    Ok(room_id)
}

/// Random room code not used by any stored game.
pub async fn generate_room_code(state: &FleetState) -> Result<String, ServiceError> {
    let store = state.storage().require_game_store().await?;
    loop {
        let code = random_code(&mut rand::rng());
        if !store.game_exists(&code).await? {
            return Ok(code);
        }
    }
}

/// Whether `room_id` names a stored game.
pub async fn game_exists(state: &FleetState, room_id: &str) -> Result<bool, ServiceError> {
    let room_id = normalize_room_id(room_id)?;
    let store = state.storage().require_game_store().await?;
    Ok(store.game_exists(&room_id).await?)
}

/// Full record of a game with candidate pictures signed for download.
pub async fn fetch_game(state: &FleetState, room_id: &str) -> Result<GameView, ServiceError> {
    let room_id = normalize_room_id(room_id)?;
    let store = state.storage().require_game_store().await?;
    let Some(entity) = store.find_game(&room_id).await? else {
        return Err(ServiceError::NotFound(format!("game `{room_id}`")));
    };

    let mut record = GameRecord::from(entity);
    sign_pictures(
        &mut record.candidates,
        state.signer(),
        state.config().picture_ttl,
    );
    Ok(record.into())
}

/// Presigned `PUT` URL for uploading a candidate picture.
pub fn presign_upload(
    state: &FleetState,
    key: &str,
    content_type: Option<&str>,
) -> Result<String, ServiceError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ServiceError::InvalidInput("key is required".into()));
    }
    let content_type = content_type
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    Ok(state
        .signer()
        .sign_upload(key, content_type, UPLOAD_URL_TTL)?)
}

fn normalize_room_id(raw: &str) -> Result<String, ServiceError> {
    let room_id = raw.trim().to_lowercase();
    validate_room_id(&room_id).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|message| message.into_owned())
                .unwrap_or_else(|| "invalid room id".into()),
        )
    })?;
    Ok(room_id)
}

fn random_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = rng.random_range(MIN_CODE_LEN..=MAX_CODE_LEN);
    (0..len)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn build_questions(raw: &[String]) -> Vec<Question> {
    raw.iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .zip(1..)
        .map(|(value, id)| Question {
            id,
            value: value.to_owned(),
        })
        .collect()
}

fn build_candidates(raw: &[NewCandidate]) -> Vec<Candidate> {
    raw.iter()
        .map(|candidate| {
            (
                candidate.first_name.trim(),
                candidate.last_name.trim(),
                candidate.picture.trim(),
            )
        })
        .filter(|(first, last, _)| !first.is_empty() || !last.is_empty())
        .zip(1..)
        .map(|((first, last, picture), id)| Candidate {
            id,
            first_name: first.to_owned(),
            last_name: last.to_owned(),
            picture: (!picture.is_empty()).then(|| picture.to_owned()),
            games_played: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use futures::future::BoxFuture;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            assignment::{InMemoryAssignmentStore, RoomAssignmentStore},
            game_store::memory::InMemoryGameStore,
            pictures::{PictureSigner, SignerError},
            storage::{StorageError, StorageResult},
        },
        services::fleet_service::{LoadProbe, ProbeError},
        state::{
            fleet::{FleetServer, SharedFleetState},
            storage::StorageSlot,
        },
    };

    struct IdleLoad;

    impl LoadProbe for IdleLoad {
        fn connection_count(
            &self,
            _server: &FleetServer,
        ) -> BoxFuture<'static, Result<Option<u64>, ProbeError>> {
            Box::pin(async { Ok(Some(0)) })
        }
    }

    /// `server1` gets busier on every load check while `server2` stays at 3.
    #[derive(Default)]
    struct FillingLoad {
        server1_load: AtomicU64,
    }

    impl LoadProbe for FillingLoad {
        fn connection_count(
            &self,
            server: &FleetServer,
        ) -> BoxFuture<'static, Result<Option<u64>, ProbeError>> {
            let load = match server.name.as_str() {
                "server1" => self.server1_load.fetch_add(5, Ordering::SeqCst),
                _ => 3,
            };
            Box::pin(async move { Ok(Some(load)) })
        }
    }

    struct DownAssignments;

    impl RoomAssignmentStore for DownAssignments {
        fn set_room_server(
            &self,
            _room_id: &str,
            _server_name: &str,
        ) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async {
                Err(StorageError::unavailable(
                    "redis",
                    std::io::Error::other("connection refused"),
                ))
            })
        }
    }

    struct EchoSigner;

    impl PictureSigner for EchoSigner {
        fn sign_download(&self, key: &str, ttl: Duration) -> Result<String, SignerError> {
            Ok(format!("https://cdn.test/{key}?ttl={}", ttl.as_secs()))
        }

        fn sign_upload(
            &self,
            key: &str,
            content_type: &str,
            _ttl: Duration,
        ) -> Result<String, SignerError> {
            Ok(format!("https://cdn.test/{key}?type={content_type}"))
        }
    }

    fn fleet_state(
        storage: StorageSlot,
        assignments: &InMemoryAssignmentStore,
    ) -> SharedFleetState {
        fleet_state_with(
            storage,
            Arc::new(assignments.clone()),
            Arc::new(IdleLoad),
        )
    }

    fn fleet_state_with(
        storage: StorageSlot,
        assignments: Arc<dyn RoomAssignmentStore>,
        load: Arc<dyn LoadProbe>,
    ) -> SharedFleetState {
        FleetState::new(
            AppConfig::default(),
            Arc::new(storage),
            assignments,
            Arc::new(EchoSigner),
            load,
            vec![
                FleetServer::new("server1", "127.0.0.1:3000"),
                FleetServer::new("server2", "127.0.0.1:3001"),
            ],
        )
    }

    fn request(questions: &[&str], candidates: &[(&str, &str, &str)]) -> CreateGameRequest {
        CreateGameRequest {
            game_name: "  Best baker ".into(),
            room_code: " AB12 ".into(),
            questions: questions.iter().map(|q| q.to_string()).collect(),
            candidates: candidates
                .iter()
                .map(|(first, last, picture)| NewCandidate {
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                    picture: picture.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn create_game_assigns_then_stores() {
        let store = InMemoryGameStore::new();
        let assignments = InMemoryAssignmentStore::new();
        let state = fleet_state(
            StorageSlot::with_store(Arc::new(store.clone())),
            &assignments,
        );

        let room_id = create_game(
            &state,
            request(
                &["Who bakes better?", "  ", "Who cooks better?"],
                &[("Ada", "L", "ada.png"), ("", " ", ""), ("Grace", "", "")],
            ),
        )
        .await
        .unwrap();

        assert_eq!(room_id, "ab12");
        assert_eq!(assignments.get("room:ab12").as_deref(), Some("server1"));

        let stored = store.snapshot("ab12").unwrap();
        assert_eq!(stored.name, "Best baker");
        assert_eq!(
            stored.questions.iter().map(|q| q.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(stored.candidates.len(), 2);
        assert_eq!(stored.candidates[1].id, 2);
        assert_eq!(stored.candidates[0].picture.as_deref(), Some("ada.png"));
        assert_eq!(stored.leaderboard.len(), 2);
        assert_eq!(stored.leaderboard[&2].len(), 2);
    }

    #[tokio::test]
    async fn invalid_or_degraded_creation_leaves_no_mapping() {
        let assignments = InMemoryAssignmentStore::new();
        let state = fleet_state(
            StorageSlot::with_store(Arc::new(InMemoryGameStore::new())),
            &assignments,
        );
        assert!(matches!(
            create_game(&state, request(&[" "], &[("Ada", "", "")])).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let degraded = fleet_state(StorageSlot::new(), &assignments);
        assert!(matches!(
            create_game(&degraded, request(&["Who?"], &[("Ada", "", "")])).await,
            Err(ServiceError::Degraded)
        ));

        assert!(assignments.is_empty());
    }

    #[tokio::test]
    async fn taken_room_code_keeps_its_server_and_record() {
        let store = InMemoryGameStore::new();
        let assignments = InMemoryAssignmentStore::new();
        let state = fleet_state_with(
            StorageSlot::with_store(Arc::new(store.clone())),
            Arc::new(assignments.clone()),
            Arc::new(FillingLoad::default()),
        );

        create_game(&state, request(&["Who?"], &[("Ada", "", "")]))
            .await
            .unwrap();
        assert_eq!(assignments.get("room:ab12").as_deref(), Some("server1"));

        let mut second = request(&["Who else?"], &[("Grace", "", "")]);
        second.game_name = "second".into();
        assert!(matches!(
            create_game(&state, second).await,
            Err(ServiceError::Conflict(_))
        ));

        assert_eq!(assignments.get("room:ab12").as_deref(), Some("server1"));
        assert_eq!(store.snapshot("ab12").unwrap().name, "Best baker");
    }

    #[tokio::test]
    async fn failed_assignment_write_stores_nothing() {
        let store = InMemoryGameStore::new();
        let state = fleet_state_with(
            StorageSlot::with_store(Arc::new(store.clone())),
            Arc::new(DownAssignments),
            Arc::new(IdleLoad),
        );

        assert!(create_game(&state, request(&["Who?"], &[("Ada", "", "")]))
            .await
            .is_err());
        assert!(store.snapshot("ab12").is_none());
    }

    #[tokio::test]
    async fn fetch_game_signs_pictures() {
        let store = InMemoryGameStore::new();
        let assignments = InMemoryAssignmentStore::new();
        let state = fleet_state(
            StorageSlot::with_store(Arc::new(store.clone())),
            &assignments,
        );
        create_game(&state, request(&["Who?"], &[("Ada", "L", "ada.png")]))
            .await
            .unwrap();

        let view = fetch_game(&state, "AB12").await.unwrap();
        assert_eq!(view.candidates[0].picture, "https://cdn.test/ada.png?ttl=1200");
        assert_eq!(
            store.snapshot("ab12").unwrap().candidates[0].picture.as_deref(),
            Some("ada.png")
        );

        assert!(matches!(
            fetch_game(&state, "zz99").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(game_exists(&state, "ab12").await.unwrap());
        assert!(!game_exists(&state, "zz99").await.unwrap());
    }

    #[tokio::test]
    async fn generated_codes_are_unused() {
        let assignments = InMemoryAssignmentStore::new();
        let state = fleet_state(
            StorageSlot::with_store(Arc::new(InMemoryGameStore::new())),
            &assignments,
        );
        let code = generate_room_code(&state).await.unwrap();
        assert!((MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len()));
        assert!(!game_exists(&state, &code).await.unwrap());
    }

    #[test]
    fn random_codes_use_the_alphabet() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let code = random_code(&mut rng);
            assert!((MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len()));
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn presign_upload_defaults_content_type() {
        let assignments = InMemoryAssignmentStore::new();
        let state = fleet_state(StorageSlot::new(), &assignments);

        assert_eq!(
            presign_upload(&state, " ada.png ", Some("  ")).unwrap(),
            "https://cdn.test/ada.png?type=application/octet-stream"
        );
        assert_eq!(
            presign_upload(&state, "ada.png", Some("image/png")).unwrap(),
            "https://cdn.test/ada.png?type=image/png"
        );
        assert!(matches!(
            presign_upload(&state, "  ", None),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
