use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use quiz_battle_back::{
    battle::coordinator::RoomUpdate,
    config::AppConfig,
    dao::{
        battle_store::{BattleStore, memory::InMemoryBattleStore},
        models::QuestionEntity,
    },
    dto::{
        battle::{
            CreateBattleRequest, HostInput, JoinBattleRequest, QuestionSource, RoomSnapshot,
            SubmitAnswerRequest,
        },
        leaderboard::LeaderboardQuery,
    },
    error::ServiceError,
    services::{
        battle_service, leaderboard_service,
        question_generator::{GenerationError, GenerationRequest, QuestionGenerator},
    },
    state::{
        AppState, SharedState,
        room::{BattleType, Question, RoomStatus},
    },
};
use tokio::sync::broadcast;
use uuid::Uuid;

const CORRECT: usize = 2;

fn pool(count: usize) -> Vec<QuestionEntity> {
    (0..count)
        .map(|i| QuestionEntity {
            id: Uuid::new_v4(),
            subject_id: None,
            chapter_id: None,
            prompt: format!("pool question {i}"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_option: CORRECT,
            explanation: None,
        })
        .collect()
}

async fn setup_with(
    generator: Option<Arc<dyn QuestionGenerator>>,
) -> (SharedState, InMemoryBattleStore) {
    let state = AppState::new(AppConfig::default(), generator);
    let store = InMemoryBattleStore::new();
    store.seed_questions(pool(20)).await;
    state.set_battle_store(Arc::new(store.clone())).await;
    (state, store)
}

async fn setup() -> (SharedState, InMemoryBattleStore) {
    setup_with(None).await
}

fn create_request(battle_type: BattleType, questions: usize, host: Uuid) -> CreateBattleRequest {
    CreateBattleRequest {
        battle_type,
        subject_id: None,
        chapter_id: None,
        total_questions: Some(questions),
        time_per_question: Some(30),
        question_source: QuestionSource::Pool,
        host: Some(HostInput {
            user_id: host,
            username: "host".into(),
        }),
    }
}

async fn join(state: &SharedState, code: &str, user: Uuid, name: &str) -> Result<RoomSnapshot, ServiceError> {
    battle_service::join_room(
        state,
        JoinBattleRequest {
            room_code: code.to_owned(),
            user_id: user,
            username: name.to_owned(),
        },
    )
    .await
}

async fn answer(
    state: &SharedState,
    room_id: Uuid,
    user: Uuid,
    question_index: usize,
    chosen_option: usize,
    time_taken: u32,
) -> Result<u32, ServiceError> {
    battle_service::submit_answer(
        state,
        room_id,
        SubmitAnswerRequest {
            user_id: user,
            question_index,
            chosen_option,
            time_taken,
        },
    )
    .await
    .map(|accepted| accepted.points)
}

/// Create a 1v1 room, seat both players and start it.
async fn started_duel(state: &SharedState, questions: usize) -> (Uuid, Uuid, Uuid, broadcast::Receiver<RoomUpdate>) {
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let created = battle_service::create_room(state, create_request(BattleType::OneVsOne, questions, a))
        .await
        .unwrap();
    let updates = battle_service::live_room(state, created.id)
        .unwrap()
        .subscribe();
    join(state, &created.room_code, b, "guest").await.unwrap();
    battle_service::set_ready(state, created.id, a).await.unwrap();
    battle_service::set_ready(state, created.id, b).await.unwrap();
    (created.id, a, b, updates)
}

async fn wait_closed(updates: &mut broadcast::Receiver<RoomUpdate>) -> RoomUpdate {
    let mut completed = None;
    loop {
        match updates.recv().await {
            Ok(update @ RoomUpdate::Completed { .. }) => completed = Some(update),
            Ok(RoomUpdate::Closed { .. }) => return completed.expect("completed before closed"),
            Ok(RoomUpdate::Snapshot(view)) => {
                for participant in view.room.participants.values() {
                    assert!(participant.answers.len() <= view.room.current_question);
                }
                assert!(view.room.current_question <= view.room.total_questions());
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(err) => panic!("room updates ended early: {err}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn duel_where_everyone_answers_correctly() {
    let (state, _store) = setup().await;
    let (room_id, a, b, mut updates) = started_duel(&state, 5).await;

    for question in 0..5 {
        assert_eq!(answer(&state, room_id, a, question, CORRECT, 5).await.unwrap(), 20);
        assert_eq!(answer(&state, room_id, b, question, CORRECT, 5).await.unwrap(), 20);
    }

    let RoomUpdate::Completed { view, results } = wait_closed(&mut updates).await else {
        unreachable!()
    };
    assert_eq!(view.room.status, RoomStatus::Completed);
    assert_eq!(view.room.current_question, 5);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.accuracy_percentage == 100));
    assert!(results.iter().all(|result| result.final_score == 100));
    // identical score and time: the earlier joiner wins
    assert_eq!(results[0].user_id, a);
    assert_eq!(results[1].user_id, b);
    assert_eq!((results[0].rank, results[1].rank), (1, 2));

    let stored = battle_service::room_results(&state, room_id).await.unwrap();
    assert_eq!(stored.results.len(), 2);
    assert_eq!(stored.results[0].user_id, a);

    let snapshot = battle_service::room_snapshot(&state, room_id).await.unwrap();
    assert_eq!(snapshot.status, RoomStatus::Completed);
    assert!(state.room(room_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn faster_player_wins_a_tie_on_points() {
    let (state, _store) = setup().await;
    let (room_id, a, b, mut updates) = started_duel(&state, 2).await;

    for question in 0..2 {
        // both capped at the 10 point speed bonus, b spends less time
        answer(&state, room_id, a, question, CORRECT, 15).await.unwrap();
        answer(&state, room_id, b, question, CORRECT, 3).await.unwrap();
    }

    let RoomUpdate::Completed { results, .. } = wait_closed(&mut updates).await else {
        unreachable!()
    };
    assert_eq!(results[0].final_score, results[1].final_score);
    assert_eq!(results[0].user_id, b);
}

#[tokio::test(start_paused = true)]
async fn disconnected_player_times_out_on_remaining_questions() {
    let (state, _store) = setup().await;
    let (room_id, a, b, mut updates) = started_duel(&state, 5).await;

    for question in 0..2 {
        answer(&state, room_id, a, question, CORRECT, 5).await.unwrap();
        answer(&state, room_id, b, question, CORRECT, 5).await.unwrap();
    }
    battle_service::live_room(&state, room_id)
        .unwrap()
        .disconnect(b)
        .await
        .unwrap();

    // the remaining player sets the pace; no question waits for its deadline
    for question in 2..5 {
        answer(&state, room_id, a, question, CORRECT, 5).await.unwrap();
    }

    let RoomUpdate::Completed { view, results } = wait_closed(&mut updates).await else {
        unreachable!()
    };
    let missing = &view.room.participant(b).unwrap().answers;
    assert_eq!(missing.len(), 5);
    for record in &missing[2..] {
        assert!(!record.is_correct);
        assert_eq!(record.chosen_option, None);
        assert_eq!(record.time_taken, 30);
    }
    assert_eq!(results[0].user_id, a);
    assert_eq!(results[1].total_correct, 2);
    assert_eq!(results[1].accuracy_percentage, 40);
}

#[tokio::test(start_paused = true)]
async fn unanswered_question_closes_at_its_deadline() {
    let (state, store) = setup().await;
    let (room_id, a, _b, mut updates) = started_duel(&state, 1).await;

    answer(&state, room_id, a, 0, CORRECT, 5).await.unwrap();

    let RoomUpdate::Completed { results, .. } = wait_closed(&mut updates).await else {
        unreachable!()
    };
    assert_eq!(results[0].user_id, a);
    assert_eq!(results[1].final_score, 0);
    // one answer plus one timeout in the ledger
    assert_eq!(store.list_ledger().await.unwrap().len(), 2);
}

#[tokio::test]
async fn joining_a_full_room_is_rejected() {
    let (state, _store) = setup().await;
    let created = battle_service::create_room(
        &state,
        create_request(BattleType::OneVsOne, 3, Uuid::new_v4()),
    )
    .await
    .unwrap();
    join(&state, &created.room_code.to_lowercase(), Uuid::new_v4(), "second")
        .await
        .unwrap();

    let err = join(&state, &created.room_code, Uuid::new_v4(), "third")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::RoomFull));
    let snapshot = battle_service::room_snapshot(&state, created.id).await.unwrap();
    assert_eq!(snapshot.current_players, 2);

    let err = join(&state, "ZZZZZZ", Uuid::new_v4(), "lost").await.unwrap_err();
    assert!(matches!(err, ServiceError::RoomNotFound));
}

#[tokio::test(start_paused = true)]
async fn duplicate_answers_score_once() {
    let (state, _store) = setup().await;
    let (room_id, a, _b, _updates) = started_duel(&state, 3).await;

    answer(&state, room_id, a, 0, CORRECT, 5).await.unwrap();
    let err = answer(&state, room_id, a, 0, 0, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateAnswer));

    let stale = answer(&state, room_id, a, 1, CORRECT, 1).await.unwrap_err();
    assert!(matches!(stale, ServiceError::StaleQuestion { expected: 0, got: 1 }));

    let view = battle_service::live_room(&state, room_id)
        .unwrap()
        .snapshot()
        .await
        .unwrap();
    assert_eq!(view.room.participant(a).unwrap().score, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_overfill_a_room() {
    let (state, _store) = setup().await;
    let mut request = create_request(BattleType::FourPlayer, 3, Uuid::new_v4());
    request.host = None;
    let created = battle_service::create_room(&state, request).await.unwrap();

    let attempts = (0..10).map(|i| {
        let state = state.clone();
        let code = created.room_code.clone();
        tokio::spawn(async move { join(&state, &code, Uuid::new_v4(), &format!("p{i}")).await })
    });
    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let seated = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(seated, 4);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|err| matches!(err, ServiceError::RoomFull)));

    let snapshot = battle_service::room_snapshot(&state, created.id).await.unwrap();
    assert_eq!(snapshot.current_players, 4);
    let mut teams: Vec<u8> = snapshot
        .participants
        .iter()
        .filter_map(|participant| participant.team)
        .collect();
    teams.sort_unstable();
    assert_eq!(teams, vec![1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_submissions_accept_one() {
    let (state, _store) = setup().await;
    let (room_id, a, _b, _updates) = started_duel(&state, 3).await;

    let attempts = (0..6).map(|_| {
        let state = state.clone();
        tokio::spawn(async move { answer(&state, room_id, a, 0, CORRECT, 5).await })
    });
    let accepted = join_all(attempts)
        .await
        .into_iter()
        .filter(|outcome| matches!(outcome, Ok(Ok(_))))
        .count();
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn storage_outage_rejects_without_changing_the_room() {
    let (state, store) = setup().await;
    let created = battle_service::create_room(
        &state,
        create_request(BattleType::OneVsOne, 3, Uuid::new_v4()),
    )
    .await
    .unwrap();
    let before = battle_service::room_snapshot(&state, created.id).await.unwrap();

    store.set_offline(true);
    let err = join(&state, &created.room_code, Uuid::new_v4(), "late")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
    let during = battle_service::live_room(&state, created.id)
        .unwrap()
        .snapshot()
        .await
        .unwrap();
    assert_eq!(during.revision, before.revision);
    assert_eq!(during.room.current_players(), 1);

    state.update_degraded(true).await;
    let err = battle_service::create_room(
        &state,
        create_request(BattleType::OneVsOne, 3, Uuid::new_v4()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Degraded));

    store.set_offline(false);
    state.update_degraded(false).await;
    let after = join(&state, &created.room_code, Uuid::new_v4(), "late")
        .await
        .unwrap();
    assert_eq!(after.revision, before.revision + 1);
}

#[tokio::test]
async fn storage_outage_rejects_an_answer_without_scoring_it() {
    let (state, store) = setup().await;
    let (room_id, a, _b, _updates) = started_duel(&state, 3).await;

    store.set_offline(true);
    let err = answer(&state, room_id, a, 0, CORRECT, 5).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));

    let during = battle_service::live_room(&state, room_id)
        .unwrap()
        .snapshot()
        .await
        .unwrap();
    let participant = during.room.participant(a).unwrap();
    assert_eq!(participant.score, 0);
    assert!(participant.pending_answer.is_none());
    assert_eq!(during.room.current_question, 0);

    store.set_offline(false);
    assert!(store.list_ledger().await.unwrap().is_empty());

    let points = answer(&state, room_id, a, 0, CORRECT, 5).await.unwrap();
    assert_eq!(points, 20);
    assert_eq!(store.list_ledger().await.unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_pool_questions_are_rejected_at_creation() {
    let state = AppState::new(AppConfig::default(), None);
    let store = InMemoryBattleStore::new();
    let broken = pool(3).into_iter().map(|mut question| {
        question.options = vec!["only".into()];
        question.correct_option = 5;
        question
    });
    store.seed_questions(broken).await;
    state.set_battle_store(Arc::new(store.clone())).await;

    let host = Uuid::new_v4();
    let err = battle_service::create_room(&state, create_request(BattleType::OneVsOne, 3, host))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(ref message) if message.contains("pool question")));
    assert_eq!(state.live_rooms(), 0);
}

#[tokio::test]
async fn creation_checks_ranges_and_pool_size() {
    let (state, _store) = setup().await;

    let mut too_fast = create_request(BattleType::OneVsOne, 3, Uuid::new_v4());
    too_fast.time_per_question = Some(1);
    assert!(matches!(
        battle_service::create_room(&state, too_fast).await,
        Err(ServiceError::InvalidInput(_))
    ));

    let too_many = create_request(BattleType::OneVsOne, 21, Uuid::new_v4());
    assert!(matches!(
        battle_service::create_room(&state, too_many).await,
        Err(ServiceError::InvalidInput(_))
    ));

    let mut no_generator = create_request(BattleType::OneVsOne, 3, Uuid::new_v4());
    no_generator.question_source = QuestionSource::Generated {
        topic: "history".into(),
        difficulty: "easy".into(),
    };
    assert!(matches!(
        battle_service::create_room(&state, no_generator).await,
        Err(ServiceError::GenerationFailed(_))
    ));
}

struct FixedGenerator {
    correct_option: usize,
}

impl QuestionGenerator for FixedGenerator {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'static, Result<Vec<Question>, GenerationError>> {
        let correct_option = self.correct_option;
        Box::pin(async move {
            Ok((0..request.count)
                .map(|i| Question {
                    prompt: format!("{} #{i}", request.topic),
                    options: vec!["yes".into(), "no".into()],
                    correct_option,
                    explanation: None,
                })
                .collect())
        })
    }
}

fn generated_request(host: Uuid) -> CreateBattleRequest {
    let mut request = create_request(BattleType::TwoVsTwo, 4, host);
    request.question_source = QuestionSource::Generated {
        topic: "rivers".into(),
        difficulty: "hard".into(),
    };
    request
}

#[tokio::test]
async fn generated_rooms_use_validated_questions() {
    let (state, _store) = setup_with(Some(Arc::new(FixedGenerator { correct_option: 1 }))).await;
    let created = battle_service::create_room(&state, generated_request(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(created.total_questions, 4);
    assert_eq!(created.status, RoomStatus::Waiting);
    assert_eq!(created.participants[0].team, Some(1));

    let (broken, _store) = setup_with(Some(Arc::new(FixedGenerator { correct_option: 7 }))).await;
    assert!(matches!(
        battle_service::create_room(&broken, generated_request(Uuid::new_v4())).await,
        Err(ServiceError::GenerationFailed(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn leaderboard_reflects_battle_answers() {
    let (state, _store) = setup().await;
    let (room_id, a, b, mut updates) = started_duel(&state, 2).await;
    for question in 0..2 {
        answer(&state, room_id, a, question, CORRECT, 5).await.unwrap();
        answer(&state, room_id, b, question, 0, 5).await.unwrap();
    }
    wait_closed(&mut updates).await;

    let first = leaderboard_service::recompute(&state).await.unwrap();
    let second = leaderboard_service::recompute(&state).await.unwrap();
    assert_eq!(first.entries, second.entries);

    let page = leaderboard_service::leaderboard(&state, LeaderboardQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total_users, 2);
    assert_eq!(page.entries[0].user_id, a);
    assert_eq!(page.entries[0].best_streak, 2);
    assert_eq!(page.entries[0].accuracy, 100);
    assert_eq!(page.entries[1].accuracy, 0);
}
