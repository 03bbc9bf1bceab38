use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowUpState {
    Posted,
    Confirmed,
    ModalOpen,
    Updated,
    ReasonModalOpen,
    Flagged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowUpEvent {
    ConfirmClicked,
    EditClicked,
    FlagClicked,
    EditSubmitted,
    FlagSubmitted,
}

impl FollowUpEvent {
    /// The only state a request carrying this event can legitimately start from.
    pub fn origin_state(&self) -> FollowUpState {
        match self {
            Self::ConfirmClicked | Self::EditClicked | Self::FlagClicked => FollowUpState::Posted,
            Self::EditSubmitted => FollowUpState::ModalOpen,
            Self::FlagSubmitted => FollowUpState::ReasonModalOpen,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowUpAction {
    OpenEditModal,
    OpenFlagModal,
    UpdateRecord,
    RecordFlag,
    NotifyAdmins,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FollowUpState,
    pub to: FollowUpState,
    pub event: FollowUpEvent,
    pub actions: Vec<FollowUpAction>,
}
