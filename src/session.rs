use crate::{
    animation::{
        Actor,
        Animate,
        DicePair,
        DieSurface,
        DieView,
    },
    api::{
        GameApi,
        GameSnapshot,
        RollResponse,
    },
    config::{
        NOTICE_TTL,
        ROLL_ACK,
        SessionTarget,
    },
    dice::{
        Face,
        RotationFrame,
    },
    notice::{
        Notice,
        NoticeBoard,
    },
    reconcile::{
        Reconciler,
        Verdict,
        ViewState,
    },
};
use color_eyre::eyre::Result;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{
    debug,
    info,
    warn,
};

/// Shown when the server could not be reached or answered garbage.
pub const GENERIC_ERROR: &str = "Something went wrong.";

/// Completions of one-shot requests made on behalf of the session.
#[derive(Debug)]
pub enum SessionEvent {
    Reward(Result<f64>),
    Rolled {
        ticket: RollTicket,
        result: Result<RollResponse>,
    },
}

/// Own roll counter at the moment a roll request was sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RollTicket {
    baseline: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Phase {
    Live,
    /// The server rejected the session.
    Ended { reason: String },
    /// The player left.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// The session was over before the snapshot arrived.
    Discarded,
    /// The snapshot ended the session.
    Ended,
}

/// Everything the screen needs for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
    pub view: ViewState,
    pub reward: Option<f64>,
    pub roll_enabled: bool,
    pub own_die: DiePanel,
    pub opponent_die: DiePanel,
    pub notices: Vec<Notice>,
    pub ended: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiePanel {
    pub orientation: RotationFrame,
    pub face_up: Face,
    pub rolling: bool,
}

/// One player's view of a room: last known counters, both dice and the
/// notice board. Owned by the event loop; nothing here is shared.
pub struct GameSession<S> {
    reconciler: Reconciler,
    dice: DicePair<S>,
    notices: NoticeBoard,
    reward: Option<f64>,
    roll_in_flight: bool,
    phase: Phase,
}

impl<S: DieSurface> GameSession<S> {
    pub fn new(own: S, opponent: S) -> Self {
        Self {
            reconciler: Reconciler::new(),
            dice: DicePair::new(own, opponent),
            notices: NoticeBoard::new(NOTICE_TTL),
            reward: None,
            roll_in_flight: false,
            phase: Phase::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.phase == Phase::Live
    }

    pub fn ended_reason(&self) -> Option<&str> {
        match &self.phase {
            Phase::Ended { reason } => Some(reason),
            Phase::Live | Phase::Closed => None,
        }
    }

    pub fn view(&self) -> &ViewState {
        self.reconciler.view()
    }

    pub fn reward(&self) -> Option<f64> {
        self.reward
    }

    pub fn dice(&self) -> &DicePair<S> {
        &self.dice
    }

    pub fn dice_mut(&mut self) -> &mut DicePair<S> {
        &mut self.dice
    }

    /// The roll control follows the server's turn flag and nothing else.
    pub fn roll_enabled(&self) -> bool {
        self.reconciler.view().active_turn
    }

    pub fn apply_snapshot(&mut self, snapshot: &GameSnapshot, now: Instant) -> Applied {
        if !self.is_live() {
            debug!("session over; discarding snapshot");
            return Applied::Discarded;
        }
        match self.reconciler.reconcile(snapshot, &mut self.dice) {
            Verdict::Continue { notice } => {
                if let Some(text) = notice {
                    self.notices.info(text, now);
                }
                Applied::Updated
            }
            Verdict::Terminate { message } => {
                let reason = if message.is_empty() {
                    GENERIC_ERROR.to_string()
                } else {
                    message
                };
                warn!(status = ?snapshot.status, %reason, "server ended the session");
                self.notices.error(reason.clone(), now);
                self.dice.cancel();
                self.phase = Phase::Ended { reason };
                Applied::Ended
            }
        }
    }

    pub fn apply_fetch_failure(&mut self, err: &str, now: Instant) {
        if !self.is_live() {
            return;
        }
        debug!(%err, "poll failed; next tick retries");
        self.notices.error(GENERIC_ERROR, now);
    }

    pub fn apply_reward(&mut self, result: Result<f64>, now: Instant) {
        match result {
            Ok(reward) => {
                info!(reward, "room reward loaded");
                self.reward = Some(reward);
            }
            Err(err) => {
                warn!(?err, "reward fetch failed");
                if self.is_live() {
                    self.notices.error(GENERIC_ERROR, now);
                }
            }
        }
    }

    /// Returns a ticket when a roll may be sent now. No request goes out
    /// while it is the opponent's turn or another roll is unanswered.
    pub fn begin_roll(&mut self) -> Option<RollTicket> {
        if !self.is_live() || !self.roll_enabled() {
            debug!("roll ignored; not our turn");
            return None;
        }
        if self.roll_in_flight {
            debug!("roll ignored; previous roll still pending");
            return None;
        }
        self.roll_in_flight = true;
        Some(RollTicket {
            baseline: self.reconciler.roll_count(Actor::Own),
        })
    }

    /// Applies a roll response. Returns whether the server accepted the roll.
    ///
    /// An accepted roll starts the own die right away unless a poll has
    /// already reported it, in which case that poll animated it.
    pub fn finish_roll(
        &mut self,
        ticket: RollTicket,
        result: Result<RollResponse>,
        now: Instant,
    ) -> bool {
        self.roll_in_flight = false;
        if !self.is_live() {
            debug!("session over; discarding roll response");
            return false;
        }
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(?err, "roll request failed");
                self.notices.error(GENERIC_ERROR, now);
                return false;
            }
        };
        if !response.ok {
            let text = if response.message.is_empty() {
                GENERIC_ERROR.to_string()
            } else {
                response.message
            };
            self.notices.error(text, now);
            return false;
        }
        if !response.message.is_empty() && response.message != ROLL_ACK {
            self.notices.info(response.message, now);
        }
        let Some(raw) = response.face_value else {
            warn!("accepted roll carried no face");
            return true;
        };
        let face = match Face::try_from(raw) {
            Ok(face) => face,
            Err(violation) => {
                warn!(%violation, "skipping own roll animation");
                return true;
            }
        };
        if self.reconciler.roll_count(Actor::Own) != ticket.baseline {
            debug!(%face, "roll already picked up by a poll");
            return true;
        }
        self.reconciler.expect_roll(Actor::Own, face);
        self.dice.start(Actor::Own, face);
        true
    }

    /// Stops both dice. Snapshots and roll responses arriving later are
    /// dropped.
    pub fn teardown(&mut self) {
        self.dice.cancel();
        if self.is_live() {
            self.phase = Phase::Closed;
        }
    }
}

impl GameSession<DieView> {
    pub fn panel(&mut self, now: Instant) -> Panel {
        fn die(dice: &DicePair<DieView>, actor: Actor) -> DiePanel {
            let runner = dice.runner(actor);
            let orientation = runner.surface().orientation;
            DiePanel {
                orientation,
                face_up: orientation.facing_face(),
                rolling: runner.is_running(),
            }
        }

        Panel {
            view: *self.reconciler.view(),
            reward: self.reward,
            roll_enabled: self.roll_enabled(),
            own_die: die(&self.dice, Actor::Own),
            opponent_die: die(&self.dice, Actor::Opponent),
            notices: self.notices.visible(now),
            ended: self.ended_reason().map(str::to_string),
        }
    }
}

pub fn spawn_roll<A: GameApi>(
    api: A,
    target: SessionTarget,
    ticket: RollTicket,
    tx: mpsc::UnboundedSender<SessionEvent>,
) {
    tokio::spawn(async move {
        let result = api.roll(&target).await;
        if tx.send(SessionEvent::Rolled { ticket, result }).is_err() {
            debug!("session gone before roll response");
        }
    });
}

pub fn spawn_reward_fetch<A: GameApi>(
    api: A,
    room_id: String,
    tx: mpsc::UnboundedSender<SessionEvent>,
) {
    tokio::spawn(async move {
        let result = api.fetch_reward(&room_id).await;
        let _ = tx.send(SessionEvent::Reward(result));
    });
}
