use thiserror::Error;

use crate::flows::states::{FollowUpAction, FollowUpEvent, FollowUpState, TransitionOutcome};

#[derive(Clone, Debug, Default)]
pub struct FollowUpFlow;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FollowUpTransitionError {
    #[error("invalid follow-up transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FollowUpState, event: FollowUpEvent },
}

impl FollowUpFlow {
    pub fn initial_state(&self) -> FollowUpState {
        FollowUpState::Posted
    }

    pub fn apply(
        &self,
        current: FollowUpState,
        event: FollowUpEvent,
    ) -> Result<TransitionOutcome, FollowUpTransitionError> {
        use FollowUpAction::{NotifyAdmins, OpenEditModal, OpenFlagModal, RecordFlag, UpdateRecord};
        use FollowUpEvent::{ConfirmClicked, EditClicked, EditSubmitted, FlagClicked, FlagSubmitted};
        use FollowUpState::{Confirmed, Flagged, ModalOpen, Posted, ReasonModalOpen, Updated};

        let (to, actions) = match (current, event) {
            (Posted, ConfirmClicked) => (Confirmed, Vec::new()),
            (Posted, EditClicked) => (ModalOpen, vec![OpenEditModal]),
            (Posted, FlagClicked) => (ReasonModalOpen, vec![OpenFlagModal]),
            (ModalOpen, EditSubmitted) => (Updated, vec![UpdateRecord]),
            (ReasonModalOpen, FlagSubmitted) => (Flagged, vec![RecordFlag, NotifyAdmins]),
            _ => return Err(FollowUpTransitionError::InvalidTransition { state: current, event }),
        };

        Ok(TransitionOutcome { from: current, to, event, actions })
    }

    /// Applies an event from the state its request implies.
    pub fn handle(&self, event: FollowUpEvent) -> Result<TransitionOutcome, FollowUpTransitionError> {
        self.apply(event.origin_state(), event)
    }
}
