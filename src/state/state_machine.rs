
use thiserror::Error;
use uuid::Uuid;

/// Phases a battle room moves through. There are no backward transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Participants are joining and getting ready.
    Waiting,
    /// Question `question` (zero-based) is open.
    InProgress {
        /// Index of the open question.
        question: usize,
    },
    /// The room is final.
    Completed,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Every seat is taken and every participant is ready.
    Start,
    /// The open question closes (all answered or timer elapsed).
    Advance,
    /// A waiting room sat idle for the abandonment window.
    Abandon,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoomEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: RoomPhase,
        /// Current phase.
        actual: RoomPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: RoomPhase,
    /// Phase the state machine will transition to.
    pub to: RoomPhase,
    /// Event that triggered this transition.
    pub event: RoomEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
}

/// Lifecycle of one room. A transition is planned, the resulting state is
/// persisted, and only then is the plan applied (or aborted on failure).
#[derive(Debug, Clone)]
pub struct RoomStateMachine {
    phase: RoomPhase,
    version: usize,
    total_questions: usize,
    pending: Option<Plan>,
}

impl RoomStateMachine {
    /// Create a machine for a room with `total_questions` questions, in the waiting phase.
    pub fn new(total_questions: usize) -> Self {
        Self {
            phase: RoomPhase::Waiting,
            version: 0,
            total_questions,
            pending: None,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Number of applied transitions.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: RoomEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<RoomPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::Waiting, RoomEvent::Start) if self.total_questions > 0 => {
                RoomPhase::InProgress { question: 0 }
            }
            (RoomPhase::InProgress { question }, RoomEvent::Advance) => {
                if question + 1 >= self.total_questions {
                    RoomPhase::Completed
                } else {
                    RoomPhase::InProgress {
                        question: question + 1,
                    }
                }
            }
            (RoomPhase::Waiting, RoomEvent::Abandon) => RoomPhase::Completed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut RoomStateMachine, event: RoomEvent) -> RoomPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = RoomStateMachine::new(3);
        assert_eq!(sm.phase(), RoomPhase::Waiting);
        assert_eq!(sm.version(), 0);
    }

    #[test]
    fn full_happy_path_through_room() {
        let mut sm = RoomStateMachine::new(3);

        assert_eq!(
            apply(&mut sm, RoomEvent::Start),
            RoomPhase::InProgress { question: 0 }
        );
        assert_eq!(
            apply(&mut sm, RoomEvent::Advance),
            RoomPhase::InProgress { question: 1 }
        );
        assert_eq!(
            apply(&mut sm, RoomEvent::Advance),
            RoomPhase::InProgress { question: 2 }
        );
        assert_eq!(apply(&mut sm, RoomEvent::Advance), RoomPhase::Completed);
        assert_eq!(sm.version(), 4);
    }

    #[test]
    fn completed_is_terminal() {
        let mut sm = RoomStateMachine::new(1);
        apply(&mut sm, RoomEvent::Start);
        apply(&mut sm, RoomEvent::Advance);

        for event in [RoomEvent::Start, RoomEvent::Advance, RoomEvent::Abandon] {
            match sm.plan(event).unwrap_err() {
                PlanError::InvalidTransition(invalid) => {
                    assert_eq!(invalid.from, RoomPhase::Completed);
                    assert_eq!(invalid.event, event);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn abandon_only_applies_while_waiting() {
        let mut sm = RoomStateMachine::new(2);
        apply(&mut sm, RoomEvent::Start);
        assert!(matches!(
            sm.plan(RoomEvent::Abandon),
            Err(PlanError::InvalidTransition(_))
        ));

        let mut idle = RoomStateMachine::new(2);
        assert_eq!(apply(&mut idle, RoomEvent::Abandon), RoomPhase::Completed);
    }

    #[test]
    fn advance_requires_a_running_room() {
        let mut sm = RoomStateMachine::new(2);
        let err = sm.plan(RoomEvent::Advance).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, RoomPhase::Waiting);
                assert_eq!(invalid.event, RoomEvent::Advance);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_rooms_cannot_start() {
        let mut sm = RoomStateMachine::new(0);
        assert!(matches!(
            sm.plan(RoomEvent::Start),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn pending_plan_blocks_new_plans() {
        let mut sm = RoomStateMachine::new(2);
        let plan = sm.plan(RoomEvent::Start).unwrap();
        assert_eq!(sm.plan(RoomEvent::Abandon).unwrap_err(), PlanError::AlreadyPending);
        sm.apply(plan.id).unwrap();
        assert!(sm.plan(RoomEvent::Advance).is_ok());
    }

    #[test]
    fn abort_clears_pending_and_keeps_phase() {
        let mut sm = RoomStateMachine::new(2);
        let plan = sm.plan(RoomEvent::Start).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), RoomPhase::Waiting);
        assert_eq!(sm.version(), 0);
    }

    #[test]
    fn apply_with_wrong_id_keeps_plan() {
        let mut sm = RoomStateMachine::new(2);
        let plan = sm.plan(RoomEvent::Start).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(sm.apply(plan.id).unwrap(), RoomPhase::InProgress { question: 0 });
    }
}
