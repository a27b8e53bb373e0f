use chrono::NaiveDate;
use thiserror::Error;

use crate::config::EmptyAnswerPolicy;
use crate::domain::answers::AnswerSheet;
use crate::domain::period::{PeriodError, ReportingPeriod};
use crate::domain::project::ProjectMetadata;
use crate::domain::section::{SectionKey, SECTION_CATALOG};
use crate::domain::session::Session;
use crate::flows::states::{FlowAction, SessionUpdate, Stage, TransitionOutcome};
use crate::prompts::{Message, PromptBook, PromptError, PromptValues};

/// Inputs that confirm document generation, compared trimmed and lowercased.
pub const AFFIRMATIVE_TOKENS: [&str; 4] = ["yes", "y", "ok", "generate"];

const END_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("section cursor {index} is outside the catalog of {len} sections")]
    SectionCursorOutOfRange { index: usize, len: usize },
    #[error("stage {stage} requires a reporting period but none is set")]
    MissingPeriod { stage: &'static str },
    #[error("generation result delivered while in stage {stage:?}")]
    NotGenerating { stage: Stage },
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// The quarterly-report questionnaire as a state machine.
///
/// `transition` never mutates: it reads the session and describes the next
/// stage, the data changes and the bot replies. The controller applies them.
#[derive(Clone, Debug)]
pub struct ReportFlow {
    prompts: PromptBook,
    project: ProjectMetadata,
    empty_answers: EmptyAnswerPolicy,
}

impl ReportFlow {
    pub fn new(
        project: ProjectMetadata,
        empty_answers: EmptyAnswerPolicy,
    ) -> Result<Self, PromptError> {
        Ok(Self::with_prompts(PromptBook::new()?, project, empty_answers))
    }

    pub fn with_prompts(
        prompts: PromptBook,
        project: ProjectMetadata,
        empty_answers: EmptyAnswerPolicy,
    ) -> Self {
        Self { prompts, project, empty_answers }
    }

    pub fn project(&self) -> &ProjectMetadata {
        &self.project
    }

    pub fn greeting(&self) -> Result<String, FlowTransitionError> {
        self.welcome()
    }

    pub fn transition(
        &self,
        session: &Session,
        input: &str,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        match session.stage {
            Stage::Start => self.from_start(input),
            Stage::AskSection => self.from_ask_section(session, input),
            Stage::ConfirmGenerate => self.from_confirm_generate(session, input),
            Stage::Generating => {
                require_period(session, "generating")?;
                Ok(TransitionOutcome {
                    from: Stage::Generating,
                    to: Stage::Generating,
                    updates: Vec::new(),
                    replies: Vec::new(),
                    action: Some(FlowAction::GenerateDocument),
                })
            }
            Stage::Done => Ok(TransitionOutcome {
                from: Stage::Done,
                to: Stage::Start,
                updates: vec![SessionUpdate::Reset],
                replies: vec![self.welcome()?],
                action: None,
            }),
            Stage::Unrecognized => Ok(self.fail_safe_reset(Stage::Unrecognized)),
        }
    }

    pub fn generation_succeeded(
        &self,
        current: &Stage,
        title: &str,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        ensure_generating(current)?;
        let reply = self
            .prompts
            .message(Message::GenerationComplete, &PromptValues::new().with("title", title))?;
        Ok(TransitionOutcome {
            from: Stage::Generating,
            to: Stage::Done,
            updates: Vec::new(),
            replies: vec![reply],
            action: None,
        })
    }

    pub fn generation_failed(
        &self,
        current: &Stage,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        ensure_generating(current)?;
        Ok(TransitionOutcome {
            from: Stage::Generating,
            to: Stage::ConfirmGenerate,
            updates: Vec::new(),
            replies: vec![self.prompts.message(Message::GenerationFailed, &PromptValues::new())?],
            action: None,
        })
    }

    /// Reset to `start` after an internal failure. Cannot fail itself: if a
    /// template refuses to render, the raw template text is used instead.
    pub fn fail_safe_reset(&self, from: Stage) -> TransitionOutcome {
        let apology = self
            .prompts
            .message(Message::GenericError, &PromptValues::new())
            .unwrap_or_else(|_| Message::GenericError.descriptor().source.to_string());
        let mut replies = vec![apology];
        if let Ok(welcome) = self.welcome() {
            replies.push(welcome);
        }

        TransitionOutcome {
            from,
            to: Stage::Start,
            updates: vec![SessionUpdate::Reset],
            replies,
            action: None,
        }
    }

    fn from_start(&self, input: &str) -> Result<TransitionOutcome, FlowTransitionError> {
        let period = match ReportingPeriod::parse(input, self.project.total_periods) {
            Ok(period) => period,
            Err(PeriodError::NotANumber { .. }) => {
                return self.stay(Stage::Start, Message::PeriodNotANumber, self.period_values());
            }
            Err(PeriodError::OutOfRange { .. }) => {
                return self.stay(Stage::Start, Message::PeriodOutOfRange, self.period_values());
            }
        };

        let first = SECTION_CATALOG[0];
        Ok(TransitionOutcome {
            from: Stage::Start,
            to: Stage::AskSection,
            updates: vec![SessionUpdate::BeginPeriod(period)],
            replies: vec![self.section_prompt(first, period)?],
            action: None,
        })
    }

    fn from_ask_section(
        &self,
        session: &Session,
        input: &str,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let index = session.section_index();
        let section = session.current_section().ok_or(
            FlowTransitionError::SectionCursorOutOfRange { index, len: SECTION_CATALOG.len() },
        )?;
        let period = require_period(session, "ask_section")?;
        let trimmed = input.trim();

        if trimmed.is_empty() && self.empty_answers == EmptyAnswerPolicy::Reject {
            let correction = self.prompts.message(
                Message::EmptyAnswer,
                &PromptValues::new().with("section", section.heading()),
            )?;
            return Ok(self.repeat(Stage::AskSection, vec![
                correction,
                self.section_prompt(section, period)?,
            ]));
        }

        let text = if section == SectionKey::PeriodEndDate {
            if !trimmed.is_empty() && NaiveDate::parse_from_str(trimmed, END_DATE_FORMAT).is_err() {
                return self.stay(
                    Stage::AskSection,
                    Message::InvalidEndDate,
                    PromptValues::new().with("input", trimmed),
                );
            }
            trimmed.to_string()
        } else {
            input.to_string()
        };

        let update = SessionUpdate::RecordAnswer { section, text: text.clone() };
        if let Some(next) = SectionKey::at(index + 1) {
            return Ok(TransitionOutcome {
                from: Stage::AskSection,
                to: Stage::AskSection,
                updates: vec![update],
                replies: vec![self.section_prompt(next, period)?],
                action: None,
            });
        }

        let mut answers = session.answers().clone();
        answers.record(section, text);
        let ready = self.prompts.message(
            Message::ReadyToGenerate,
            &PromptValues::new().with("summary", completion_summary(&answers)),
        )?;
        Ok(TransitionOutcome {
            from: Stage::AskSection,
            to: Stage::ConfirmGenerate,
            updates: vec![update],
            replies: vec![ready],
            action: None,
        })
    }

    fn from_confirm_generate(
        &self,
        session: &Session,
        input: &str,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        if !is_affirmative(input) {
            return self.stay(
                Stage::ConfirmGenerate,
                Message::AwaitingConfirmation,
                PromptValues::new(),
            );
        }

        if !session.auth_capability {
            let mut outcome = self.stay(
                Stage::ConfirmGenerate,
                Message::AuthenticationRequired,
                PromptValues::new(),
            )?;
            outcome.action = Some(FlowAction::RequestAuthentication);
            return Ok(outcome);
        }

        require_period(session, "confirm_generate")?;
        Ok(TransitionOutcome {
            from: Stage::ConfirmGenerate,
            to: Stage::Generating,
            updates: Vec::new(),
            replies: Vec::new(),
            action: Some(FlowAction::GenerateDocument),
        })
    }

    fn stay(
        &self,
        stage: Stage,
        message: Message,
        values: PromptValues,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        Ok(self.repeat(stage, vec![self.prompts.message(message, &values)?]))
    }

    fn repeat(&self, stage: Stage, replies: Vec<String>) -> TransitionOutcome {
        TransitionOutcome { from: stage.clone(), to: stage, updates: Vec::new(), replies, action: None }
    }

    fn welcome(&self) -> Result<String, FlowTransitionError> {
        Ok(self.prompts.message(Message::Welcome, &self.period_values())?)
    }

    fn period_values(&self) -> PromptValues {
        PromptValues::new().with("total_periods", self.project.total_periods)
    }

    fn section_prompt(
        &self,
        section: SectionKey,
        period: ReportingPeriod,
    ) -> Result<String, FlowTransitionError> {
        let values = PromptValues::new()
            .with("period", period)
            .with("total_periods", self.project.total_periods)
            .with("project_title", &self.project.title);
        let prompt = self.prompts.section(section, &values)?;
        if !section.wants_supporting_material() {
            return Ok(prompt);
        }

        let reminder = self.prompts.message(Message::UploadReminder, &PromptValues::new())?;
        Ok(format!("{prompt}\n\n{reminder}"))
    }
}

pub fn is_affirmative(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    AFFIRMATIVE_TOKENS.contains(&normalized.as_str())
}

/// One-line progress summary shown before asking for confirmation.
pub fn completion_summary(answers: &AnswerSheet) -> String {
    let empty = answers.empty_sections();
    let answered = SECTION_CATALOG.len() - empty.len();
    let mut summary = format!("Answered {answered} of {} sections.", SECTION_CATALOG.len());
    if !empty.is_empty() {
        let labels = empty.iter().map(|section| section.heading()).collect::<Vec<_>>();
        summary.push_str(&format!(" Left empty: {}.", labels.join(", ")));
    }
    summary
}

fn require_period(
    session: &Session,
    stage: &'static str,
) -> Result<ReportingPeriod, FlowTransitionError> {
    session.period().ok_or(FlowTransitionError::MissingPeriod { stage })
}

fn ensure_generating(current: &Stage) -> Result<(), FlowTransitionError> {
    if *current == Stage::Generating {
        return Ok(());
    }
    Err(FlowTransitionError::NotGenerating { stage: current.clone() })
}

#[cfg(test)]
mod tests {
    use crate::config::EmptyAnswerPolicy;
    use crate::domain::project::ProjectMetadata;
    use crate::domain::section::{SectionKey, SECTION_CATALOG};
    use crate::domain::session::Session;
    use crate::flows::engine::{
        completion_summary, is_affirmative, FlowTransitionError, ReportFlow,
    };
    use crate::flows::states::{FlowAction, SessionUpdate, Stage};

    fn project() -> ProjectMetadata {
        ProjectMetadata {
            funder: "Innovate UK".to_owned(),
            lead_company: "FLOX Limited".to_owned(),
            title: "NetFLOX360".to_owned(),
            number: "10103645".to_owned(),
            total_periods: 4,
        }
    }

    fn flow(policy: EmptyAnswerPolicy) -> ReportFlow {
        ReportFlow::new(project(), policy).expect("templates compile")
    }

    fn step(flow: &ReportFlow, session: &mut Session, input: &str) -> Vec<String> {
        let outcome = flow.transition(session, input).expect("transition");
        session.apply(&outcome);
        outcome.replies
    }

    fn session_at_confirm(flow: &ReportFlow) -> Session {
        let mut session = Session::new();
        step(flow, &mut session, "2");
        step(flow, &mut session, "2025-06-30");
        for _ in 1..SECTION_CATALOG.len() {
            step(flow, &mut session, "answer");
        }
        assert_eq!(session.stage, Stage::ConfirmGenerate);
        session
    }

    #[test]
    fn valid_period_starts_first_section() {
        let flow = flow(EmptyAnswerPolicy::Accept);
        let session = Session::new();
        let outcome = flow.transition(&session, "3").expect("valid period");

        assert_eq!(outcome.to, Stage::AskSection);
        assert!(matches!(outcome.updates.as_slice(), [SessionUpdate::BeginPeriod(period)] if period.number() == 3));
        assert_eq!(outcome.replies, vec!["What is the end date for quarter 3 (YYYY-MM-DD)?".to_owned()]);
    }

    #[test]
    fn invalid_periods_loop_on_start_with_specific_message() {
        let flow = flow(EmptyAnswerPolicy::Accept);
        let session = Session::new();

        let not_number = flow.transition(&session, "first").expect("handled");
        assert_eq!(not_number.to, Stage::Start);
        assert!(not_number.updates.is_empty());
        assert_eq!(not_number.replies, vec!["Please enter a number for the quarter.".to_owned()]);

        for input in ["0", "-2", "5", "999999999999"] {
            let outcome = flow.transition(&session, input).expect("handled");
            assert_eq!(outcome.to, Stage::Start, "input {input}");
            assert!(outcome.updates.is_empty());
            assert_eq!(outcome.replies, vec!["Please enter a valid quarter number (1-4).".to_owned()]);
        }
    }

    #[test]
    fn sections_are_asked_once_each_in_catalog_order() {
        let flow = flow(EmptyAnswerPolicy::Accept);
        let mut session = Session::new();
        step(&flow, &mut session, "1");

        for (index, section) in SECTION_CATALOG.iter().enumerate() {
            assert_eq!(session.stage, Stage::AskSection);
            assert_eq!(session.section_index(), index);
            let answer = if *section == SectionKey::PeriodEndDate {
                "2025-03-31".to_owned()
            } else {
                format!("answer for {section}")
            };
            step(&flow, &mut session, &answer);
        }

        assert_eq!(session.stage, Stage::ConfirmGenerate);
        assert_eq!(session.answers().len(), SECTION_CATALOG.len());
        assert_eq!(session.answers().get(SectionKey::Cost), Some("answer for cost"));
    }

    #[test]
    fn reminder_follows_time_and_risk_prompts() {
        let flow = flow(EmptyAnswerPolicy::Accept);
        let mut session = Session::new();
        step(&flow, &mut session, "1");
        let mut prompts = Vec::new();
        for _ in 0..SECTION_CATALOG.len() - 1 {
            let input = if session.current_section() == Some(SectionKey::PeriodEndDate) { "" } else { "x" };
            prompts.extend(step(&flow, &mut session, input));
        }

        let time_prompt = prompts.iter().find(|prompt| prompt.contains("'Time'")).expect("time asked");
        assert!(time_prompt.contains("upload one now"));
        let cost_prompt = prompts.iter().find(|prompt| prompt.contains("'Cost'")).expect("cost asked");
        assert!(!cost_prompt.contains("upload one now"));
    }

    #[test]
    fn empty_answers_follow_configured_policy() {
        let accepting = flow(EmptyAnswerPolicy::Accept);
        let mut session = Session::new();
        step(&accepting, &mut session, "1");
        step(&accepting, &mut session, "");
        step(&accepting, &mut session, "");
        assert_eq!(session.section_index(), 2);
        assert_eq!(session.answers().get(SectionKey::OverallSummary), Some(""));

        let rejecting = flow(EmptyAnswerPolicy::Reject);
        let mut session = Session::new();
        step(&rejecting, &mut session, "1");
        let replies = step(&rejecting, &mut session, "   ");
        assert_eq!(session.section_index(), 0);
        assert!(session.answers().is_empty());
        assert!(replies[0].contains("Period End Date"));
    }

    #[test]
    fn malformed_end_date_is_reprompted() {
        let flow = flow(EmptyAnswerPolicy::Accept);
        let mut session = Session::new();
        step(&flow, &mut session, "4");
        let replies = step(&flow, &mut session, "end of June");

        assert_eq!(session.section_index(), 0);
        assert!(replies[0].contains("YYYY-MM-DD"));

        step(&flow, &mut session, " 2025-06-30 ");
        assert_eq!(session.answers().get(SectionKey::PeriodEndDate), Some("2025-06-30"));
    }

    #[test]
    fn confirm_requires_affirmative_and_authentication() {
        let flow = flow(EmptyAnswerPolicy::Accept);
        let mut session = session_at_confirm(&flow);
        let answers_before = session.answers().clone();

        let declined = flow.transition(&session, "not yet").expect("handled");
        assert_eq!(declined.to, Stage::ConfirmGenerate);
        assert_eq!(declined.action, None);

        let unauthenticated = flow.transition(&session, "YES").expect("handled");
        assert_eq!(unauthenticated.to, Stage::ConfirmGenerate);
        assert_eq!(unauthenticated.action, Some(FlowAction::RequestAuthentication));

        session.auth_capability = true;
        let confirmed = flow.transition(&session, " Generate ").expect("handled");
        assert_eq!(confirmed.to, Stage::Generating);
        assert_eq!(confirmed.action, Some(FlowAction::GenerateDocument));
        assert_eq!(session.answers(), &answers_before);
    }

    #[test]
    fn generation_results_route_to_done_or_back_to_confirm() {
        let flow = flow(EmptyAnswerPolicy::Accept);
        let done = flow.generation_succeeded(&Stage::Generating, "Draft Q2").expect("succeeds");
        assert_eq!(done.to, Stage::Done);
        assert!(done.replies[0].contains("'Draft Q2'"));

        let retry = flow.generation_failed(&Stage::Generating).expect("handled");
        assert_eq!(retry.to, Stage::ConfirmGenerate);

        assert!(matches!(
            flow.generation_failed(&Stage::Start),
            Err(FlowTransitionError::NotGenerating { stage: Stage::Start })
        ));
    }

    #[test]
    fn done_and_unrecognized_stages_reset_to_start() {
        let flow = flow(EmptyAnswerPolicy::Accept);
        let mut session = Session::new();
        session.stage = Stage::Done;
        let outcome = flow.transition(&session, "").expect("done resets");
        assert_eq!(outcome.to, Stage::Start);
        assert_eq!(outcome.updates, vec![SessionUpdate::Reset]);

        session.stage = Stage::Unrecognized;
        let outcome = flow.transition(&session, "hello").expect("unrecognized resets");
        assert_eq!(outcome.to, Stage::Start);
        assert_eq!(outcome.replies[0], "Sorry, something went wrong. Please try again.");
    }

    #[test]
    fn out_of_range_cursor_is_an_internal_error() {
        let flow = flow(EmptyAnswerPolicy::Accept);
        let mut session = session_at_confirm(&flow);
        session.stage = Stage::AskSection;

        assert!(matches!(
            flow.transition(&session, "extra"),
            Err(FlowTransitionError::SectionCursorOutOfRange { .. })
        ));
    }

    #[test]
    fn affirmative_tokens_are_case_insensitive() {
        for input in ["yes", "Y", " ok ", "GENERATE"] {
            assert!(is_affirmative(input), "{input}");
        }
        for input in ["yep", "no", "", "yes please"] {
            assert!(!is_affirmative(input), "{input}");
        }
    }

    #[test]
    fn summary_lists_empty_sections() {
        let mut answers = crate::domain::answers::AnswerSheet::new();
        for section in SECTION_CATALOG {
            answers.record(section, "filled");
        }
        answers.record(SectionKey::Cost, "");
        assert_eq!(completion_summary(&answers), "Answered 10 of 11 sections. Left empty: Cost.");
    }
}
