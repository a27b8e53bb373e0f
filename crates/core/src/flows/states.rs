use serde::{Deserialize, Serialize};

use crate::domain::period::ReportingPeriod;
use crate::domain::section::SectionKey;

/// Position of a conversation in the questionnaire.
///
/// Serialized as `{"stage": "<name>"}`. Any tag this build does not know
/// decodes to `Unrecognized`, which the controller resets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Start,
    AskSection,
    ConfirmGenerate,
    Generating,
    Done,
    #[serde(other)]
    Unrecognized,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AskSection => "ask_section",
            Self::ConfirmGenerate => "confirm_generate",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Side effect the host or controller must carry out after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    RequestAuthentication,
    GenerateDocument,
}

/// Data change a transition asks the session to make.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionUpdate {
    BeginPeriod(ReportingPeriod),
    RecordAnswer { section: SectionKey, text: String },
    Reset,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: Stage,
    pub to: Stage,
    pub updates: Vec<SessionUpdate>,
    pub replies: Vec<String>,
    pub action: Option<FlowAction>,
}
