pub mod controller;
pub mod engine;
pub mod states;

pub use controller::{Clock, ConversationController, FixedClock, Reply, SystemClock};
pub use engine::{FlowTransitionError, ReportFlow, AFFIRMATIVE_TOKENS};
pub use states::{FlowAction, SessionUpdate, Stage, TransitionOutcome};
