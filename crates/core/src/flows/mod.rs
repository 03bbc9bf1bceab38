//! Interactive follow-up on a posted feedback card.
//!
//! Each click or modal submission is its own request, so the state a request starts from is
//! implied by the kind of interaction rather than stored on the server.

pub mod engine;
pub mod states;
pub mod token;

pub use engine::{FollowUpFlow, FollowUpTransitionError};
pub use states::{FollowUpAction, FollowUpEvent, FollowUpState, TransitionOutcome};
pub use token::{FollowUpToken, FollowUpTokenError};
