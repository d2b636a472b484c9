//! Multi-participant scenarios driven through the hub with an in-process transport.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use proptest::prelude::*;

use rook_chess::ChessOracle;
use rook_core::protocol::{MovePayload, ServerMessage};
use rook_core::{ConnectionId, GameError, GameResult, MoveOracle, Role, SessionId, SessionStatus};
use rook_runtime::testing::{RecordingTransport, SlowOracle, TallyOracle};
use rook_runtime::GameHub;
use rook_store::{ConnectionConfig, MemorySessionStore, SessionStore, SqliteSessionStore};

struct Table {
    hub: Arc<GameHub>,
    transport: Arc<RecordingTransport>,
    session_id: SessionId,
    x: ConnectionId,
    y: ConnectionId,
}

async fn seat_two(store: Arc<dyn SessionStore>, oracle: Arc<dyn MoveOracle>) -> Table {
    let transport = Arc::new(RecordingTransport::new());
    let hub = Arc::new(GameHub::new(store, oracle, transport.clone()));
    let (x, y) = (ConnectionId::from("x"), ConnectionId::from("y"));
    let session_id = hub.create_session(&x).await.unwrap();
    let _ = hub.join_session(&y, &session_id).await.unwrap();
    Table {
        hub,
        transport,
        session_id,
        x,
        y,
    }
}

async fn chess_table() -> Table {
    seat_two(Arc::new(MemorySessionStore::new()), Arc::new(ChessOracle::new())).await
}

fn play(notation: &str) -> MovePayload {
    MovePayload::Notation(notation.into())
}

fn state_updates(transport: &RecordingTransport, conn: &ConnectionId) -> Vec<ServerMessage> {
    transport
        .messages_for(conn)
        .into_iter()
        .filter(|m| matches!(m, ServerMessage::StateUpdate { .. }))
        .collect()
}

#[tokio::test]
async fn opening_move_reaches_both_players_identically() {
    let t = chess_table().await;
    let outcome = t.hub.submit_move(&t.x, play("e2e4"), None).await.unwrap();
    assert_eq!(outcome.last_move, "e4");
    assert_eq!(outcome.turn, Role::B);

    let _ = t
        .hub
        .submit_move(&t.y, play("e5"), Some(t.session_id.clone()))
        .await
        .unwrap();

    let seen_by_x = state_updates(&t.transport, &t.x);
    let seen_by_y = state_updates(&t.transport, &t.y);
    assert_eq!(seen_by_x.len(), 2);
    assert_eq!(seen_by_x, seen_by_y);
    assert_matches!(
        &seen_by_x[0],
        ServerMessage::StateUpdate { last_move, move_number: 1, .. } if last_move == "e4"
    );
    assert_matches!(
        &seen_by_x[1],
        ServerMessage::StateUpdate { last_move, move_number: 2, turn: Role::A, .. } if last_move == "e5"
    );
}

#[tokio::test]
async fn moves_before_opponent_joins_are_not_your_turn() {
    let transport = Arc::new(RecordingTransport::new());
    let hub = GameHub::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(ChessOracle::new()),
        transport.clone(),
    );
    let x = ConnectionId::from("x");
    let id = hub.create_session(&x).await.unwrap();
    assert_matches!(
        hub.submit_move(&x, play("e4"), None).await,
        Err(GameError::NotYourTurn)
    );
    let session = hub.registry().lookup_session(&id).unwrap();
    let state = session.acquire().await;
    assert_eq!(state.status, SessionStatus::WaitingForOpponent);
    assert!(state.moves.is_empty());
}

#[tokio::test]
async fn out_of_turn_move_leaves_state_unchanged() {
    let t = chess_table().await;
    let before = t
        .hub
        .registry()
        .lookup_session(&t.session_id)
        .unwrap()
        .acquire()
        .await
        .game_state
        .clone();

    assert_matches!(
        t.hub.submit_move(&t.y, play("e7e5"), None).await,
        Err(GameError::NotYourTurn)
    );
    let session = t.hub.registry().lookup_session(&t.session_id).unwrap();
    assert_eq!(session.acquire().await.game_state, before);
    assert!(state_updates(&t.transport, &t.x).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_submissions_apply_one_at_a_time() {
    let t = chess_table().await;
    let (from_x, from_y) = tokio::join!(
        {
            let hub = t.hub.clone();
            let x = t.x.clone();
            async move { hub.submit_move(&x, play("e4"), None).await }
        },
        {
            let hub = t.hub.clone();
            let y = t.y.clone();
            async move { hub.submit_move(&y, play("e5"), None).await }
        }
    );

    let x_outcome = from_x.unwrap();
    match from_y {
        // Y was serialized before X and saw the starting position.
        Err(GameError::NotYourTurn) => assert_eq!(x_outcome.move_number, 1),
        // Y was serialized after X and was judged against the new position.
        Ok(y_outcome) => {
            assert_eq!(x_outcome.move_number, 1);
            assert_eq!(y_outcome.move_number, 2);
        }
        Err(other) => panic!("unexpected rejection: {other}"),
    }

    let seen_by_x = state_updates(&t.transport, &t.x);
    assert_eq!(seen_by_x, state_updates(&t.transport, &t.y));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_oracle_never_sees_overlapping_moves() {
    let oracle = Arc::new(SlowOracle::new(
        TallyOracle::with_target(1_000),
        Duration::from_millis(15),
    ));
    let t = seat_two(Arc::new(MemorySessionStore::new()), oracle.clone()).await;

    let mut tasks = Vec::new();
    for i in 0..16 {
        let hub = t.hub.clone();
        let conn = if i % 2 == 0 { t.x.clone() } else { t.y.clone() };
        tasks.push(tokio::spawn(async move {
            hub.submit_move(&conn, play("1"), None).await
        }));
    }
    let mut applied = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => applied += 1,
            Err(e) => assert_eq!(e, GameError::NotYourTurn),
        }
    }

    assert!(applied >= 1);
    assert_eq!(oracle.max_in_flight(), 1);
    assert_eq!(oracle.calls(), applied);

    let updates = state_updates(&t.transport, &t.x);
    let numbers: Vec<usize> = updates
        .iter()
        .filter_map(|m| match m {
            ServerMessage::StateUpdate { move_number, .. } => Some(*move_number),
            _ => None,
        })
        .collect();
    assert_eq!(numbers, (1..=applied).collect::<Vec<_>>());
}

#[tokio::test]
async fn finished_game_rejects_every_move() {
    let t = chess_table().await;
    for (conn, mv) in [(&t.x, "f2f3"), (&t.y, "e7e5"), (&t.x, "g2g4")] {
        let _ = t.hub.submit_move(conn, play(mv), None).await.unwrap();
    }
    let mate = t.hub.submit_move(&t.y, play("Qh4#"), None).await.unwrap();
    assert_eq!(mate.result, Some(GameResult::Win { winner: Role::B }));

    let kinds = t.transport.kinds_for(&t.x);
    assert_eq!(&kinds[kinds.len() - 2..], ["stateUpdate", "gameOver"]);

    for conn in [&t.x, &t.y] {
        assert_matches!(
            t.hub.submit_move(conn, play("a2a3"), None).await,
            Err(GameError::GameAlreadyOver)
        );
    }

    let record = t.hub.registry().reconciler().load(&t.session_id).unwrap();
    assert_eq!(record.status, SessionStatus::Completed);
    assert_eq!(record.result, Some(GameResult::Win { winner: Role::B }));
    assert_eq!(record.moves, vec!["f3", "e5", "g4", "Qh4#"]);
}

#[tokio::test]
async fn restart_reconstructs_state_from_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rook.db");
    let path = path.to_str().unwrap();

    let open = || {
        let pool = rook_store::new_file(path, &ConnectionConfig::default()).unwrap();
        let _ = rook_store::run_migrations(&pool.get().unwrap()).unwrap();
        Arc::new(SqliteSessionStore::new(pool))
    };

    let t = seat_two(open(), Arc::new(ChessOracle::new())).await;
    let _ = t.hub.submit_move(&t.x, play("d4"), None).await.unwrap();
    let played = t.hub.submit_move(&t.y, play("d5"), None).await.unwrap();
    drop(t.hub);

    let restarted = GameHub::new(
        open(),
        Arc::new(ChessOracle::new()),
        Arc::new(RecordingTransport::new()),
    );
    assert_eq!(restarted.active_sessions(), 0);
    let session = restarted.registry().lookup_session(&t.session_id).unwrap();
    let state = session.acquire().await;
    assert_eq!(state.game_state, played.state);
    assert_eq!(state.moves, vec!["d4", "d5"]);
    assert_eq!(state.status, SessionStatus::InProgress);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_caller_does_not_cancel_accepted_move() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let oracle = Arc::new(SlowOracle::new(
        TallyOracle::with_target(1_000),
        Duration::from_millis(200),
    ));
    let t = seat_two(store.clone(), oracle.clone()).await;

    let pending = t.hub.submit_move(&t.x, play("2"), None);
    assert!(tokio::time::timeout(Duration::from_millis(20), pending).await.is_err());
    t.transport.close(&t.x);
    t.hub.disconnect(&t.x).await;

    assert_eq!(oracle.calls(), 1);
    let session = t.hub.registry().lookup_session(&t.session_id).unwrap();
    let state = session.acquire().await;
    assert_eq!(state.moves, vec!["+2"]);
    assert_eq!(state.game_state.as_str(), "2/B");
    drop(state);

    let record = store.get(&t.session_id).unwrap().unwrap();
    assert_eq!(record.moves, vec!["+2"]);
    assert_matches!(
        state_updates(&t.transport, &t.y).as_slice(),
        [ServerMessage::StateUpdate { move_number: 1, .. }]
    );
}

#[tokio::test]
async fn disconnect_mid_game_keeps_state() {
    let t = chess_table().await;
    let _ = t.hub.submit_move(&t.x, play("e4"), None).await.unwrap();
    t.transport.close(&t.y);
    t.hub.disconnect(&t.y).await;

    let session = t.hub.registry().lookup_session(&t.session_id).unwrap();
    assert_eq!(session.acquire().await.moves.len(), 1);
    assert_eq!(t.hub.binding().participant_count(&t.session_id), 1);

    let z = ConnectionId::from("z");
    assert_eq!(t.hub.join_session(&z, &t.session_id).await.unwrap(), Role::B);
    let _ = t.hub.submit_move(&z, play("c5"), None).await.unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn accepted_moves_alternate_roles(plan in prop::collection::vec((any::<bool>(), 1u32..=3), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let t = seat_two(
                Arc::new(MemorySessionStore::new()),
                Arc::new(TallyOracle::with_target(1_000)),
            )
            .await;

            let mut movers = Vec::new();
            for (from_x, step) in plan {
                let (conn, role) = if from_x { (&t.x, Role::A) } else { (&t.y, Role::B) };
                match t.hub.submit_move(conn, play(&step.to_string()), None).await {
                    Ok(_) => movers.push(role),
                    Err(e) => assert_eq!(e, GameError::NotYourTurn),
                }
            }

            for (i, role) in movers.iter().enumerate() {
                let expected = if i % 2 == 0 { Role::A } else { Role::B };
                assert_eq!(*role, expected);
            }
        });
    }
}
