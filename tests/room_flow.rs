#![allow(non_snake_case)]
use color_eyre::eyre::{
    Result,
    eyre,
};
use dice_room::{
    animation::DieView,
    api::{
        ActorState,
        GameApi,
        GameSnapshot,
        RollResponse,
    },
    config::{
        POLL_INTERVAL,
        ROLL_ACK,
        SessionTarget,
        UPDATES_ACK,
    },
    dice::Face,
    notice::NoticeLevel,
    poller::{
        PollEvent,
        Poller,
    },
    session::{
        self,
        Applied,
        GameSession,
        SessionEvent,
    },
};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
    },
    time::{
        Duration,
        Instant,
    },
};
use tokio::{
    sync::mpsc,
    time,
};

#[derive(Default)]
struct FakeState {
    updates: VecDeque<Result<GameSnapshot, String>>,
    last: Option<GameSnapshot>,
    update_calls: usize,
    roll_calls: usize,
    roll_face: i64,
    reward: f64,
    stall_updates: bool,
}

#[derive(Clone, Default)]
struct FakeGameApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGameApi {
    fn with_updates(updates: Vec<Result<GameSnapshot, String>>) -> Self {
        let api = Self::default();
        api.state.lock().unwrap().updates = updates.into();
        api
    }

    fn update_calls(&self) -> usize {
        self.state.lock().unwrap().update_calls
    }

    fn roll_calls(&self) -> usize {
        self.state.lock().unwrap().roll_calls
    }
}

impl GameApi for FakeGameApi {
    async fn fetch_updates(&self, _target: &SessionTarget) -> Result<GameSnapshot> {
        let stalled = {
            let mut state = self.state.lock().unwrap();
            state.update_calls += 1;
            state.stall_updates
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock().unwrap();
        match state.updates.pop_front() {
            Some(Ok(snapshot)) => {
                state.last = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(msg)) => Err(eyre!(msg)),
            None => state.last.clone().ok_or_else(|| eyre!("no update scripted")),
        }
    }

    async fn fetch_reward(&self, _room_id: &str) -> Result<f64> {
        Ok(self.state.lock().unwrap().reward)
    }

    async fn roll(&self, _target: &SessionTarget) -> Result<RollResponse> {
        let mut state = self.state.lock().unwrap();
        state.roll_calls += 1;
        Ok(RollResponse {
            ok: true,
            message: ROLL_ACK.to_string(),
            face_value: Some(state.roll_face),
        })
    }
}

fn target() -> SessionTarget {
    SessionTarget {
        room_id: "room-1".to_string(),
        player_id: 7,
        init_data: String::new(),
    }
}

fn snapshot(
    own: (i64, i64, i64),
    opponent: (i64, i64, i64),
    active_turn: bool,
) -> GameSnapshot {
    let actor = |(roll_count, face_value, cumulative_result): (i64, i64, i64)| ActorState {
        roll_count,
        face_value,
        cumulative_result,
    };
    GameSnapshot {
        active_turn,
        own: actor(own),
        opponent: actor(opponent),
        message: UPDATES_ACK.to_string(),
        status: Some(200),
        ok: true,
    }
}

fn face(raw: i64) -> Face {
    Face::try_from(raw).unwrap()
}

fn new_session() -> GameSession<DieView> {
    GameSession::new(DieView::default(), DieView::default())
}

async fn settle(session: &mut GameSession<DieView>) {
    while session.dice().any_running() {
        session.dice_mut().advance().await;
    }
}

#[tokio::test(start_paused = true)]
async fn poller__fetches_on_fixed_cadence_starting_one_interval_in() {
    // given
    let api = FakeGameApi::with_updates(vec![
        Ok(snapshot((0, 1, 0), (0, 1, 0), true)),
        Ok(snapshot((1, 3, 3), (0, 1, 0), false)),
    ]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = time::Instant::now();

    // when
    let mut poller = Poller::spawn(api.clone(), target(), POLL_INTERVAL, tx);
    let first = rx.recv().await.unwrap();
    let first_at = start.elapsed();
    let second = rx.recv().await.unwrap();
    let second_at = start.elapsed();

    // then
    assert!(matches!(first, PollEvent::Snapshot(s) if s.active_turn));
    assert!(matches!(second, PollEvent::Snapshot(s) if s.own.roll_count == 1));
    assert_eq!(first_at, POLL_INTERVAL);
    assert_eq!(second_at, POLL_INTERVAL * 2);
    poller.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn poller__fetch_failure__is_reported_and_polling_continues() {
    // given
    let api = FakeGameApi::with_updates(vec![
        Err("connection refused".to_string()),
        Ok(snapshot((0, 1, 0), (0, 1, 0), true)),
    ]);
    let (tx, mut rx) = mpsc::unbounded_channel();

    // when
    let mut poller = Poller::spawn(api.clone(), target(), POLL_INTERVAL, tx);
    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();

    // then
    assert!(matches!(
        first,
        PollEvent::FetchFailed(err) if err.contains("connection refused")
    ));
    assert!(matches!(second, PollEvent::Snapshot(_)));
    poller.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn poller__shutdown__stops_fetching_and_is_idempotent() {
    // given
    let api = FakeGameApi::with_updates(vec![Ok(snapshot((0, 1, 0), (0, 1, 0), true))]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut poller = Poller::spawn(api.clone(), target(), POLL_INTERVAL, tx);
    rx.recv().await.unwrap();

    // when
    poller.shutdown().await.unwrap();
    poller.shutdown().await.unwrap();
    time::sleep(POLL_INTERVAL * 4).await;

    // then
    assert!(!poller.is_running());
    assert_eq!(api.update_calls(), 1);
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn poller__shutdown_during_stalled_fetch__returns_promptly() {
    // given
    let api = FakeGameApi::default();
    api.state.lock().unwrap().stall_updates = true;
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut poller = Poller::spawn(api.clone(), target(), POLL_INTERVAL, tx);
    time::sleep(POLL_INTERVAL + Duration::from_millis(10)).await;

    // when
    let result = time::timeout(Duration::from_secs(1), poller.shutdown()).await;

    // then
    assert!(matches!(result, Ok(Ok(()))));
    assert!(!poller.is_running());
    assert_eq!(api.update_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn poller__fetch_now__fetches_before_first_tick() {
    // given
    let api = FakeGameApi::with_updates(vec![Ok(snapshot((2, 3, 6), (1, 4, 4), true))]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut poller = Poller::spawn(api.clone(), target(), POLL_INTERVAL, tx);
    let start = time::Instant::now();

    // when
    poller.fetch_now();
    let event = rx.recv().await.unwrap();

    // then
    assert!(start.elapsed() < POLL_INTERVAL);
    assert!(matches!(event, PollEvent::Snapshot(s) if s.own.roll_count == 2));
    assert_eq!(api.update_calls(), 1);
    poller.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn session__polled_rolls__animate_and_settle_on_server_faces() {
    // given
    let api = FakeGameApi::with_updates(vec![Ok(snapshot((4, 6, 10), (5, 2, 7), false))]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut poller = Poller::spawn(api.clone(), target(), POLL_INTERVAL, tx);
    let mut session = new_session();

    // when
    let Some(PollEvent::Snapshot(update)) = rx.recv().await else {
        panic!("expected a snapshot");
    };
    let applied = session.apply_snapshot(&update, Instant::now());
    settle(&mut session).await;
    let panel = session.panel(Instant::now());

    // then
    assert_eq!(applied, Applied::Updated);
    assert_eq!(panel.own_die.face_up, face(6));
    assert_eq!(panel.opponent_die.face_up, face(2));
    assert_eq!(panel.view.own_result, 10);
    assert_eq!(panel.view.opponent_result, 7);
    assert!(!panel.roll_enabled);
    poller.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn session__room_closed__ends_session_and_poller_stops() {
    // given
    let closed = GameSnapshot {
        ok: false,
        message: "Комната закрыта".to_string(),
        status: Some(404),
        ..GameSnapshot::default()
    };
    let api = FakeGameApi::with_updates(vec![
        Ok(snapshot((1, 4, 4), (1, 5, 5), true)),
        Ok(closed),
    ]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut poller = Poller::spawn(api.clone(), target(), POLL_INTERVAL, tx);
    let mut session = new_session();

    // when
    let mut outcome = Applied::Updated;
    while outcome != Applied::Ended {
        let Some(PollEvent::Snapshot(update)) = rx.recv().await else {
            panic!("expected a snapshot");
        };
        outcome = session.apply_snapshot(&update, Instant::now());
    }
    poller.shutdown().await.unwrap();
    time::sleep(POLL_INTERVAL * 3).await;

    // then
    assert_eq!(api.update_calls(), 2);
    assert!(!session.dice().any_running());
    let panel = session.panel(Instant::now());
    assert_eq!(panel.ended.as_deref(), Some("Комната закрыта"));
    assert_eq!(panel.view.own_result, 4);
    assert_eq!(panel.notices.len(), 1);
    assert_eq!(panel.notices[0].level, NoticeLevel::Error);
    assert_eq!(panel.notices[0].text, "Комната закрыта");
}

#[tokio::test(start_paused = true)]
async fn roll__own_turn__sends_request_and_animates_returned_face() {
    // given
    let api = FakeGameApi::default();
    api.state.lock().unwrap().roll_face = 3;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = new_session();
    session.apply_snapshot(&snapshot((2, 1, 5), (2, 6, 9), true), Instant::now());

    // when
    let ticket = session.begin_roll().unwrap();
    session::spawn_roll(api.clone(), target(), ticket, tx);
    let Some(SessionEvent::Rolled { ticket, result }) = rx.recv().await else {
        panic!("expected a roll response");
    };
    let accepted = session.finish_roll(ticket, result, Instant::now());
    let rolling = session.dice().own.is_running();
    settle(&mut session).await;

    // then
    assert!(accepted);
    assert!(rolling);
    assert_eq!(api.roll_calls(), 1);
    assert_eq!(session.panel(Instant::now()).own_die.face_up, face(3));
}

#[tokio::test(start_paused = true)]
async fn roll__opponents_turn__sends_no_request() {
    // given
    let api = FakeGameApi::default();
    let mut session = new_session();
    session.apply_snapshot(&snapshot((2, 1, 5), (2, 6, 9), false), Instant::now());

    // when
    let ticket = session.begin_roll();

    // then
    assert!(ticket.is_none());
    assert_eq!(api.roll_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn reward__fetched_once__is_shown_on_panel() {
    // given
    let api = FakeGameApi::default();
    api.state.lock().unwrap().reward = 25.0;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = new_session();

    // when
    session::spawn_reward_fetch(api.clone(), "room-1".to_string(), tx);
    let Some(SessionEvent::Reward(result)) = rx.recv().await else {
        panic!("expected a reward");
    };
    session.apply_reward(result, Instant::now());

    // then
    assert_eq!(session.panel(Instant::now()).reward, Some(25.0));
}
