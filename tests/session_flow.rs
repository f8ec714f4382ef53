use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use rankrat_back::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, memory::InMemoryGameStore},
        pictures::DisabledPictureSigner,
    },
    routes,
    state::{
        AppState, SharedState,
        game::{Candidate, GameRecord, Question, Rating},
        storage::StorageSlot,
    },
};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (SocketAddr, SharedState, InMemoryGameStore) {
    let store = InMemoryGameStore::new();
    let record = GameRecord::new(
        "ab12",
        "Best baker",
        vec![Question {
            id: 1,
            value: "Who bakes better?".into(),
        }],
        vec![
            Candidate {
                id: 1,
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                picture: None,
                games_played: 0,
            },
            Candidate {
                id: 2,
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                picture: None,
                games_played: 0,
            },
        ],
        Rating::default(),
    );
    store.create_game(record.into()).await.unwrap();

    let state = AppState::new(
        AppConfig::default(),
        Arc::new(StorageSlot::with_store(Arc::new(store.clone()))),
        Arc::new(DisabledPictureSigner),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, store)
}

async fn next_round(client: &mut Client) -> Value {
    loop {
        match client.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("expected a round, got {other:?}"),
        }
    }
}

fn mu(store: &InMemoryGameStore, candidate_id: u32) -> f64 {
    store.snapshot("ab12").unwrap().leaderboard[&1][&candidate_id].mu
}

#[tokio::test]
async fn vote_updates_leaderboard_and_persists() {
    let (addr, state, store) = start_server().await;
    let (mut client, _) = connect_async(format!("ws://{addr}/ws/AB12")).await.unwrap();

    let round = next_round(&mut client).await;
    assert_eq!(round["GameID"], "ab12");
    assert_eq!(round["Question"]["ID"], 1);
    assert_eq!(round["Candidates"].as_array().unwrap().len(), 2);
    assert_eq!(state.live_sessions(), 1);

    let vote = json!({
        "type": "VOTE",
        "data": {"game_id": "ab12", "question_id": 1, "winner_id": 2}
    });
    client.send(Message::Text(vote.to_string())).await.unwrap();

    let follow_up = next_round(&mut client).await;
    assert_eq!(follow_up["GameID"], "ab12");

    let stats = state.persistence().wait_idle().await;
    assert_eq!(stats.completed, 1);
    assert!(mu(&store, 2) > mu(&store, 1));

    client.close(None).await.unwrap();
}

#[tokio::test]
async fn malformed_frames_still_get_a_round() {
    let (addr, state, store) = start_server().await;
    let (mut client, _) = connect_async(format!("ws://{addr}/ws/ab12")).await.unwrap();
    next_round(&mut client).await;

    for frame in [
        "not json".to_owned(),
        json!({"type": "VOTE", "data": {"game_id": "ab12", "question_id": 1}}).to_string(),
        json!({"type": "VOTE", "data": {"game_id": "ab12", "question_id": 1, "winner_id": 7}})
            .to_string(),
    ] {
        client.send(Message::Text(frame)).await.unwrap();
        let round = next_round(&mut client).await;
        assert_eq!(round["GameID"], "ab12");
    }

    let stats = state.persistence().wait_idle().await;
    assert_eq!(stats.completed + stats.failed, 0);
    assert_eq!(mu(&store, 1), mu(&store, 2));
}

#[tokio::test]
async fn ping_is_answered_once() {
    let (addr, _, _) = start_server().await;
    let (mut client, _) = connect_async(format!("ws://{addr}/ws/ab12")).await.unwrap();
    next_round(&mut client).await;

    client
        .send(Message::Ping(b"still there".to_vec().into()))
        .await
        .unwrap();
    client
        .send(Message::Text("not json".to_owned()))
        .await
        .unwrap();

    let (mut pongs, mut rounds) = (0, 0);
    while let Ok(Some(frame)) =
        tokio::time::timeout(Duration::from_millis(300), client.next()).await
    {
        match frame.unwrap() {
            Message::Pong(payload) => {
                assert_eq!(payload, b"still there".to_vec());
                pongs += 1;
            }
            Message::Text(_) => rounds += 1,
            _ => {}
        }
    }
    assert_eq!(pongs, 1);
    assert_eq!(rounds, 1);
}

#[tokio::test]
async fn unknown_room_is_refused_before_upgrade() {
    let (addr, state, _) = start_server().await;

    match connect_async(format!("ws://{addr}/ws/zz99")).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 404),
        other => panic!("expected 404, got {:?}", other.map(|(_, response)| response.status())),
    }
    assert_eq!(state.live_sessions(), 0);
    assert!(state.cache().is_empty());
}
