use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::answers::AnswerSheet;
use crate::domain::attachment::AttachmentLedger;
use crate::domain::period::ReportingPeriod;
use crate::domain::section::{SectionKey, SECTION_CATALOG};
use crate::flows::states::{SessionUpdate, Stage, TransitionOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

/// Conversation-scoped state for one user drafting one report.
///
/// Only the conversation controller mutates progress fields; hosts read them
/// for display. Nothing here outlives the conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    pub stage: Stage,
    period: Option<ReportingPeriod>,
    section_index: usize,
    answers: AnswerSheet,
    /// Mirror of the authentication collaborator's state, refreshed per turn.
    pub auth_capability: bool,
    messages: Vec<ChatMessage>,
    attachments: AttachmentLedger,
    created_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(SessionId::generate())
    }

    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            stage: Stage::Start,
            period: None,
            section_index: 0,
            answers: AnswerSheet::new(),
            auth_capability: false,
            messages: Vec::new(),
            attachments: AttachmentLedger::default(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn period(&self) -> Option<ReportingPeriod> {
        self.period
    }

    pub fn section_index(&self) -> usize {
        self.section_index
    }

    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn attachments(&self) -> &AttachmentLedger {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut AttachmentLedger {
        &mut self.attachments
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the last message was logged, or creation time for a silent session.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.messages.last().map_or(self.created_at, |message| message.sent_at)
    }

    /// The section the cursor points at; `None` once every section is answered.
    pub fn current_section(&self) -> Option<SectionKey> {
        SectionKey::at(self.section_index)
    }

    /// `ask_section[3]`-style label used in logs and host views.
    pub fn stage_label(&self) -> String {
        match self.stage {
            Stage::AskSection => format!("ask_section[{}]", self.section_index),
            ref other => other.as_str().to_string(),
        }
    }

    pub fn push_message(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(ChatMessage { role, content: content.into(), sent_at: Utc::now() });
    }

    pub fn apply(&mut self, outcome: &TransitionOutcome) {
        for update in &outcome.updates {
            match update {
                SessionUpdate::BeginPeriod(period) => {
                    self.period = Some(*period);
                    self.answers.clear();
                    self.section_index = 0;
                }
                SessionUpdate::RecordAnswer { section, text } => {
                    self.answers.record(*section, text.clone());
                    if let Some(position) = SECTION_CATALOG.iter().position(|key| key == section) {
                        self.section_index = position + 1;
                    }
                }
                SessionUpdate::Reset => self.reset(),
            }
        }
        self.stage = outcome.to.clone();
    }

    /// Back to the first prompt with no period and no answers. The message
    /// log and attachment ledger are kept for display.
    pub fn reset(&mut self) {
        self.stage = Stage::Start;
        self.period = None;
        self.section_index = 0;
        self.answers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{MessageRole, Session};
    use crate::domain::period::ReportingPeriod;
    use crate::domain::section::{SectionKey, SECTION_CATALOG};
    use crate::flows::states::{SessionUpdate, Stage, TransitionOutcome};

    fn outcome(to: Stage, updates: Vec<SessionUpdate>) -> TransitionOutcome {
        TransitionOutcome { from: Stage::Start, to, updates, replies: Vec::new(), action: None }
    }

    #[test]
    fn new_session_starts_empty() {
        let session = Session::new();
        assert_eq!(session.stage, Stage::Start);
        assert_eq!(session.period(), None);
        assert_eq!(session.section_index(), 0);
        assert!(session.answers().is_empty());
        assert!(!session.auth_capability);
        assert_eq!(session.current_section(), Some(SectionKey::PeriodEndDate));
    }

    #[test]
    fn begin_period_clears_previous_progress() {
        let mut session = Session::new();
        let period = ReportingPeriod::new(2, 4).expect("valid period");
        session.apply(&outcome(
            Stage::AskSection,
            vec![
                SessionUpdate::BeginPeriod(period),
                SessionUpdate::RecordAnswer { section: SectionKey::PeriodEndDate, text: "2025-06-30".into() },
            ],
        ));
        assert_eq!(session.section_index(), 1);

        session.apply(&outcome(Stage::AskSection, vec![SessionUpdate::BeginPeriod(period)]));
        assert_eq!(session.section_index(), 0);
        assert!(session.answers().is_empty());
        assert_eq!(session.period(), Some(period));
    }

    #[test]
    fn recording_last_section_completes_cursor() {
        let mut session = Session::new();
        let last = SECTION_CATALOG[SECTION_CATALOG.len() - 1];
        session.apply(&outcome(
            Stage::ConfirmGenerate,
            vec![SessionUpdate::RecordAnswer { section: last, text: "more".into() }],
        ));

        assert_eq!(session.section_index(), SECTION_CATALOG.len());
        assert_eq!(session.current_section(), None);
        assert_eq!(session.stage_label(), "confirm_generate");
    }

    #[test]
    fn last_activity_follows_message_log() {
        let mut session = Session::new();
        assert_eq!(session.last_activity(), session.created_at());

        session.push_message(MessageRole::User, "1");
        assert_eq!(session.last_activity(), session.messages()[0].sent_at);
    }

    #[test]
    fn reset_keeps_message_log() {
        let mut session = Session::new();
        session.push_message(MessageRole::User, "3");
        session.apply(&outcome(
            Stage::AskSection,
            vec![SessionUpdate::BeginPeriod(ReportingPeriod::new(3, 4).expect("valid"))],
        ));
        assert_eq!(session.stage_label(), "ask_section[0]");

        session.reset();
        assert_eq!(session.stage, Stage::Start);
        assert_eq!(session.period(), None);
        assert_eq!(session.messages().len(), 1);
    }
}
