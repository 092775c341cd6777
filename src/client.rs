use crate::{
    animation::DieView,
    api::{
        GameApi,
        HttpGameApi,
    },
    config::{
        AppConfig,
        POLL_INTERVAL,
        SessionTarget,
    },
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
    ui,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::time::{
    Duration,
    Instant,
};
use tokio::{
    sync::mpsc,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    info,
    warn,
};

/// Keeps expiring notices in step with the clock while nothing else redraws.
const IDLE_REDRAW_INTERVAL: Duration = Duration::from_millis(250);

pub async fn run_app(config: AppConfig) -> Result<()> {
    let api = HttpGameApi::new(config.api_url.clone())?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!(
        api = %api,
        room_id = %config.target.room_id,
        player_id = config.target.player_id,
        "Starting UI"
    );
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(api, config.target, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<A: GameApi>(
    api: A,
    target: SessionTarget,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    let mut session = GameSession::new(DieView::default(), DieView::default());
    let (poll_tx, mut poll_rx) = mpsc::unbounded_channel();
    let (session_tx, mut session_rx) = mpsc::unbounded_channel();
    let mut poller = Poller::spawn(api.clone(), target.clone(), POLL_INTERVAL, poll_tx);
    session::spawn_reward_fetch(api.clone(), target.room_id.clone(), session_tx.clone());

    let mut redraw = time::interval(IDLE_REDRAW_INTERVAL);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);

    ui::draw(ui_state, &session.panel(Instant::now())).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            _ = session.dice_mut().advance() => {}
            maybe_event = poll_rx.recv(), if poller.is_running() => {
                let now = Instant::now();
                match maybe_event {
                    Some(PollEvent::Snapshot(snapshot)) => {
                        if session.apply_snapshot(&snapshot, now) == Applied::Ended {
                            poller.shutdown().await?;
                        }
                    }
                    Some(PollEvent::FetchFailed(err)) => {
                        session.apply_fetch_failure(&err, now);
                    }
                    None => {
                        warn!("poll worker channel closed");
                        poller.shutdown().await?;
                    }
                }
            }
            Some(event) = session_rx.recv() => {
                let now = Instant::now();
                match event {
                    SessionEvent::Reward(result) => session.apply_reward(result, now),
                    SessionEvent::Rolled { ticket, result } => {
                        if session.finish_roll(ticket, result, now) {
                            poller.fetch_now();
                        }
                    }
                }
            }
            _ = redraw.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                match ui::interpret_event(ui_state, event) {
                    Some(ui::UserEvent::Quit) => break,
                    Some(ui::UserEvent::Roll) => {
                        if let Some(ticket) = session.begin_roll() {
                            info!("rolling");
                            session::spawn_roll(
                                api.clone(),
                                target.clone(),
                                ticket,
                                session_tx.clone(),
                            );
                        }
                    }
                    Some(ui::UserEvent::Redraw) => {}
                    None => continue,
                }
            }
        }
        ui::draw(ui_state, &session.panel(Instant::now())).wrap_err("draw failed")?;
    }

    info!("leaving room");
    session.teardown();
    poller.shutdown().await
}
