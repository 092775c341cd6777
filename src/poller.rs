use crate::{
    api::{
        GameApi,
        GameSnapshot,
    },
    config::SessionTarget,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    anyhow,
};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    warn,
};

#[derive(Debug)]
pub enum PollEvent {
    Snapshot(GameSnapshot),
    FetchFailed(String),
}

enum PollCommand {
    FetchNow,
    Shutdown,
}

/// Handle to the background task that fetches `/dice/updates` on a fixed
/// cadence.
pub struct Poller {
    cmd_tx: mpsc::UnboundedSender<PollCommand>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<A: GameApi>(
        api: A,
        target: SessionTarget,
        poll_interval: Duration,
        event_tx: mpsc::UnboundedSender<PollEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(poll_worker(
            api,
            target,
            poll_interval,
            cmd_rx,
            event_tx,
        ));
        Self {
            cmd_tx,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Fetches immediately, outside the regular cadence.
    pub fn fetch_now(&self) {
        let _ = self.cmd_tx.send(PollCommand::FetchNow);
    }

    /// Stops the worker and waits for it. Later calls do nothing.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let _ = self.cmd_tx.send(PollCommand::Shutdown);
        handle
            .await
            .map_err(|err| anyhow!(err))
            .wrap_err("poll worker panicked")
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn poll_worker<A: GameApi>(
    api: A,
    target: SessionTarget,
    poll_interval: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<PollCommand>,
    event_tx: mpsc::UnboundedSender<PollEvent>,
) {
    async fn fetch<A: GameApi>(
        api: &A,
        target: &SessionTarget,
        event_tx: &mpsc::UnboundedSender<PollEvent>,
    ) -> bool {
        let event = match api.fetch_updates(target).await {
            Ok(snapshot) => PollEvent::Snapshot(snapshot),
            Err(err) => {
                warn!(?err, "updates fetch failed");
                PollEvent::FetchFailed(format!("{err:#}"))
            }
        };
        event_tx.send(event).is_ok()
    }

    /// Runs one fetch while still listening for commands. A shutdown drops
    /// the fetch in flight.
    async fn fetch_or_stop<A: GameApi>(
        api: &A,
        target: &SessionTarget,
        cmd_rx: &mut mpsc::UnboundedReceiver<PollCommand>,
        event_tx: &mpsc::UnboundedSender<PollEvent>,
    ) -> bool {
        let in_flight = fetch(api, target, event_tx);
        tokio::pin!(in_flight);
        loop {
            tokio::select! {
                sent = &mut in_flight => return sent,
                cmd = cmd_rx.recv() => match cmd {
                    // already fetching
                    Some(PollCommand::FetchNow) => {}
                    Some(PollCommand::Shutdown) | None => {
                        debug!("dropping updates fetch in flight");
                        return false;
                    }
                },
            }
        }
    }

    let mut ticker = time::interval_at(time::Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            cmd = cmd_rx.recv() => match cmd {
                Some(PollCommand::FetchNow) => {}
                Some(PollCommand::Shutdown) | None => break,
            },
        }
        if !fetch_or_stop(&api, &target, &mut cmd_rx, &event_tx).await {
            break;
        }
    }
    debug!("poll worker stopped");
}
