use crate::{
    config::{
        FRAME_INTERVAL,
        FRAMES_PER_ROLL,
    },
    dice::{
        self,
        Face,
        RotationFrame,
    },
};
use std::{
    fmt,
    future,
    time::Duration,
};
use tokio::time::{
    self,
    Interval,
    MissedTickBehavior,
};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Actor {
    Own,
    Opponent,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Own => write!(f, "own"),
            Actor::Opponent => write!(f, "opponent"),
        }
    }
}

/// Render target for one die. Only its runner writes to it.
pub trait DieSurface {
    fn write(&mut self, frame: RotationFrame);
}

/// The on-screen state of a die: whatever orientation was written last.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DieView {
    pub orientation: RotationFrame,
}

impl DieSurface for DieView {
    fn write(&mut self, frame: RotationFrame) {
        self.orientation = frame;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationJob {
    pub actor: Actor,
    pub target: Face,
    pub frames: Vec<RotationFrame>,
    pub final_frame: RotationFrame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A running job was dropped in favour of the new one.
    Superseded { previous: Face },
    /// The runner was cancelled; nothing will be drawn.
    Ignored,
}

struct RunningJob {
    job: AnimationJob,
    cursor: usize,
    ticker: Interval,
}

/// Plays roll animations for one die, one frame per display tick.
pub struct AnimationRunner<S> {
    actor: Actor,
    surface: S,
    frame_interval: Duration,
    frames_per_roll: usize,
    running: Option<RunningJob>,
    cancelled: bool,
}

impl<S: DieSurface> AnimationRunner<S> {
    pub fn new(actor: Actor, surface: S) -> Self {
        Self::with_timing(actor, surface, FRAME_INTERVAL, FRAMES_PER_ROLL)
    }

    pub fn with_timing(
        actor: Actor,
        surface: S,
        frame_interval: Duration,
        frames_per_roll: usize,
    ) -> Self {
        Self {
            actor,
            surface,
            frame_interval,
            frames_per_roll,
            running: None,
            cancelled: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Face the live job is heading for, if any.
    pub fn target(&self) -> Option<Face> {
        self.running.as_ref().map(|running| running.job.target)
    }

    pub fn start(&mut self, face: Face) -> StartOutcome {
        if self.cancelled {
            debug!(actor = %self.actor, %face, "runner cancelled; ignoring start");
            return StartOutcome::Ignored;
        }
        let sequence = dice::generate(face, self.frames_per_roll, &mut rand::rng());
        let job = AnimationJob {
            actor: self.actor,
            target: face,
            frames: sequence.frames,
            final_frame: sequence.final_frame,
        };
        let mut ticker = time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let previous = self.running.replace(RunningJob {
            job,
            cursor: 0,
            ticker,
        });
        match previous {
            Some(previous) => {
                debug!(
                    actor = %self.actor,
                    previous = %previous.job.target,
                    %face,
                    "superseding running roll animation"
                );
                StartOutcome::Superseded {
                    previous: previous.job.target,
                }
            }
            None => StartOutcome::Started,
        }
    }

    /// Waits for the next display tick and draws one frame.
    ///
    /// Never completes while idle, so it can sit in a `select!` arm.
    pub async fn advance(&mut self) {
        match self.running.as_mut() {
            Some(running) => {
                running.ticker.tick().await;
            }
            None => future::pending::<()>().await,
        }
        self.step();
    }

    fn step(&mut self) {
        let Self {
            surface,
            running,
            cancelled,
            ..
        } = self;
        if *cancelled {
            *running = None;
            return;
        }
        let Some(live) = running.as_mut() else {
            return;
        };
        match live.job.frames.get(live.cursor) {
            Some(frame) => {
                surface.write(*frame);
                live.cursor += 1;
            }
            None => {
                surface.write(live.job.final_frame);
                *running = None;
            }
        }
    }

    /// Drops any live job and refuses later starts.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.running = None;
    }
}

/// Both dice of the room.
pub struct DicePair<S> {
    pub own: AnimationRunner<S>,
    pub opponent: AnimationRunner<S>,
}

impl<S: DieSurface> DicePair<S> {
    pub fn new(own: S, opponent: S) -> Self {
        Self {
            own: AnimationRunner::new(Actor::Own, own),
            opponent: AnimationRunner::new(Actor::Opponent, opponent),
        }
    }

    pub fn runner(&self, actor: Actor) -> &AnimationRunner<S> {
        match actor {
            Actor::Own => &self.own,
            Actor::Opponent => &self.opponent,
        }
    }

    pub fn runner_mut(&mut self, actor: Actor) -> &mut AnimationRunner<S> {
        match actor {
            Actor::Own => &mut self.own,
            Actor::Opponent => &mut self.opponent,
        }
    }

    /// Draws the next frame of whichever die ticks first.
    pub async fn advance(&mut self) -> Actor {
        tokio::select! {
            _ = self.own.advance() => Actor::Own,
            _ = self.opponent.advance() => Actor::Opponent,
        }
    }

    pub fn any_running(&self) -> bool {
        self.own.is_running() || self.opponent.is_running()
    }

    pub fn cancel(&mut self) {
        self.own.cancel();
        self.opponent.cancel();
    }
}

/// Anything that can kick off a roll animation for an actor.
pub trait Animate {
    fn start(&mut self, actor: Actor, face: Face);
}

impl<S: DieSurface> Animate for DicePair<S> {
    fn start(&mut self, actor: Actor, face: Face) {
        self.runner_mut(actor).start(face);
    }
}
