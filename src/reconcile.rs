use crate::{
    animation::{
        Actor,
        Animate,
    },
    api::{
        ActorState,
        GameSnapshot,
    },
    config::UPDATES_ACK,
    dice::Face,
    error::ProtocolViolation,
};
use tracing::{
    debug,
    info,
    warn,
};

/// What the panel shows besides the dice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub own_result: i64,
    pub opponent_result: i64,
    pub active_turn: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Continue { notice: Option<String> },
    /// The server no longer recognises this player in this room.
    Terminate { message: String },
}

#[derive(Clone, Copy, Debug, Default)]
struct Tracked {
    roll_count: i64,
    /// Face already being shown from a roll response, awaiting its counter.
    expected_face: Option<Face>,
}

/// Remembers the last seen roll counters and turns fresh updates into
/// animations and view changes.
#[derive(Debug, Default)]
pub struct Reconciler {
    own: Tracked,
    opponent: Tracked,
    view: ViewState,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn roll_count(&self, actor: Actor) -> i64 {
        self.tracked(actor).roll_count
    }

    /// Marks `face` as already animating for `actor`, so the counter bump
    /// that confirms it does not restart the die.
    pub fn expect_roll(&mut self, actor: Actor, face: Face) {
        self.tracked_mut(actor).expected_face = Some(face);
    }

    pub fn reconcile(
        &mut self,
        snapshot: &GameSnapshot,
        dice: &mut impl Animate,
    ) -> Verdict {
        if !snapshot.ok {
            return Verdict::Terminate {
                message: snapshot.message.clone(),
            };
        }
        let notice = (!snapshot.message.is_empty() && snapshot.message != UPDATES_ACK)
            .then(|| snapshot.message.clone());

        self.track(Actor::Own, &snapshot.own, dice);
        self.track(Actor::Opponent, &snapshot.opponent, dice);

        self.view = ViewState {
            own_result: snapshot.own.cumulative_result,
            opponent_result: snapshot.opponent.cumulative_result,
            active_turn: snapshot.active_turn,
        };
        Verdict::Continue { notice }
    }

    fn track(&mut self, actor: Actor, incoming: &ActorState, dice: &mut impl Animate) {
        let tracked = self.tracked_mut(actor);
        if incoming.roll_count < 0 {
            let violation = ProtocolViolation::NegativeRollCount(incoming.roll_count);
            warn!(%actor, %violation, "ignoring roll counter");
            return;
        }
        if incoming.roll_count == tracked.roll_count {
            return;
        }
        if incoming.roll_count < tracked.roll_count {
            info!(
                %actor,
                previous = tracked.roll_count,
                current = incoming.roll_count,
                "roll counter went backwards; treating as a new room session"
            );
        }
        tracked.roll_count = incoming.roll_count;
        let expected = tracked.expected_face.take();
        match Face::try_from(incoming.face_value) {
            Ok(face) if expected == Some(face) => {
                debug!(%actor, %face, "roll already shown from the roll response");
            }
            Ok(face) => {
                debug!(%actor, %face, roll_count = incoming.roll_count, "new roll");
                dice.start(actor, face);
            }
            Err(violation) => {
                warn!(%actor, %violation, "skipping roll animation");
            }
        }
    }

    fn tracked(&self, actor: Actor) -> &Tracked {
        match actor {
            Actor::Own => &self.own,
            Actor::Opponent => &self.opponent,
        }
    }

    fn tracked_mut(&mut self, actor: Actor) -> &mut Tracked {
        match actor {
            Actor::Own => &mut self.own,
            Actor::Opponent => &mut self.opponent,
        }
    }
}
