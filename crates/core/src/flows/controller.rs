use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use crate::collaborators::{Authenticator, DocumentService};
use crate::domain::session::{MessageRole, Session};
use crate::flows::engine::{FlowTransitionError, ReportFlow};
use crate::flows::states::{FlowAction, SessionUpdate, Stage, TransitionOutcome};
use crate::report::{assemble, document_title};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// What the bot says back for one user turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub stage: Stage,
    pub messages: Vec<String>,
    /// External action this turn required: a login prompt for the host, or
    /// the document generation the controller already ran.
    pub action: Option<FlowAction>,
    pub document_title: Option<String>,
}

/// Drives one session through [`ReportFlow`] a turn at a time.
///
/// A turn fully completes, document generation included, before
/// `handle_input` returns. Any internal failure resets the session to
/// `start` and answers with a generic apology; details go to the log only.
pub struct ConversationController {
    flow: ReportFlow,
    documents: Arc<dyn DocumentService>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl ConversationController {
    pub fn new(flow: ReportFlow, documents: Arc<dyn DocumentService>) -> Self {
        Self {
            flow,
            documents,
            clock: Arc::new(SystemClock),
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn flow(&self) -> &ReportFlow {
        &self.flow
    }

    /// Posts the opening prompt into a session that has not said anything yet.
    pub fn greet(&self, session: &mut Session) -> Option<String> {
        if !session.messages().is_empty() {
            return None;
        }

        let greeting = match self.flow.greeting() {
            Ok(greeting) => greeting,
            Err(error) => {
                error!(
                    event_name = "conversation.greeting_failed",
                    correlation_id = %session.id(),
                    error = %error,
                    "could not render greeting"
                );
                return None;
            }
        };
        session.push_message(MessageRole::Assistant, greeting.clone());
        Some(greeting)
    }

    /// Passes a pasted sign-in code to the authenticator and mirrors the
    /// result onto the session. Returns whether the code was accepted.
    pub fn complete_authentication(
        &self,
        session: &mut Session,
        authenticator: &dyn Authenticator,
        code: &str,
    ) -> bool {
        let accepted = authenticator.complete_authentication(code);
        session.auth_capability = authenticator.is_authenticated();

        let audit = AuditContext::new(Some(session.id().clone()), Uuid::new_v4().to_string(), "user");
        let outcome = if accepted { AuditOutcome::Success } else { AuditOutcome::Rejected };
        self.audit.emit(self.event(&audit, "authentication.completed", AuditCategory::Authentication, outcome));
        accepted
    }

    pub fn revoke_authentication(&self, session: &mut Session, authenticator: &dyn Authenticator) {
        authenticator.revoke();
        session.auth_capability = authenticator.is_authenticated();

        let audit = AuditContext::new(Some(session.id().clone()), Uuid::new_v4().to_string(), "user");
        self.audit.emit(self.event(
            &audit,
            "authentication.revoked",
            AuditCategory::Authentication,
            AuditOutcome::Success,
        ));
    }

    pub fn handle_input(
        &self,
        session: &mut Session,
        authenticator: &dyn Authenticator,
        input: &str,
    ) -> Reply {
        let correlation_id = Uuid::new_v4().to_string();
        let audit = AuditContext::new(Some(session.id().clone()), correlation_id, "conversation");

        session.push_message(MessageRole::User, input);
        session.auth_capability = authenticator.is_authenticated();

        let reply = match self.advance(session, input, &audit) {
            Ok(reply) => reply,
            Err(failure) => {
                error!(
                    event_name = "conversation.transition_failed",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id(),
                    stage = %session.stage_label(),
                    error = %failure,
                    "conversation reset after internal error"
                );
                let outcome = self.flow.fail_safe_reset(session.stage.clone());
                session.apply(&outcome);
                self.audit.emit(
                    self.event(&audit, "conversation.reset", AuditCategory::Conversation, AuditOutcome::Failed)
                        .with_metadata("reason", "internal_error")
                        .with_metadata("error", failure.to_string()),
                );
                Reply { stage: Stage::Start, messages: outcome.replies, action: None, document_title: None }
            }
        };

        for message in &reply.messages {
            session.push_message(MessageRole::Assistant, message.clone());
        }
        reply
    }

    fn advance(
        &self,
        session: &mut Session,
        input: &str,
        audit: &AuditContext,
    ) -> Result<Reply, FlowTransitionError> {
        let outcome = self.flow.transition(session, input)?;
        self.apply(session, &outcome, audit);

        let mut messages = outcome.replies;
        let mut stage = outcome.to;
        let mut document_title = None;

        if outcome.action == Some(FlowAction::GenerateDocument) {
            let (generated, title) = self.generate(session, audit)?;
            messages.extend(generated.replies);
            stage = generated.to;
            document_title = title;
        }

        Ok(Reply { stage, messages, action: outcome.action, document_title })
    }

    fn generate(
        &self,
        session: &mut Session,
        audit: &AuditContext,
    ) -> Result<(TransitionOutcome, Option<String>), FlowTransitionError> {
        let period = session.period().ok_or(FlowTransitionError::MissingPeriod { stage: "generating" })?;
        let project = self.flow.project();
        let title_hint = document_title(project, period, self.clock.now());
        let body = assemble(period, session.answers(), project);

        match self.documents.create_document(&title_hint, &body) {
            Ok(title) => {
                info!(
                    event_name = "document.generated",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id(),
                    period = period.number(),
                    title = %title,
                    "report document created"
                );
                self.audit.emit(
                    self.event(audit, "document.generated", AuditCategory::Document, AuditOutcome::Success)
                        .with_metadata("title", title.clone())
                        .with_metadata("period", period.to_string()),
                );
                let outcome = self.flow.generation_succeeded(&session.stage, &title)?;
                self.apply(session, &outcome, audit);
                Ok((outcome, Some(title)))
            }
            Err(failure) => {
                warn!(
                    event_name = "document.failed",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id(),
                    period = period.number(),
                    error = %failure,
                    "report document creation failed; awaiting retry"
                );
                self.audit.emit(
                    self.event(audit, "document.failed", AuditCategory::Document, AuditOutcome::Failed)
                        .with_metadata("error", failure.to_string()),
                );
                let outcome = self.flow.generation_failed(&session.stage)?;
                self.apply(session, &outcome, audit);
                Ok((outcome, None))
            }
        }
    }

    fn apply(&self, session: &mut Session, outcome: &TransitionOutcome, audit: &AuditContext) {
        let from = session.stage_label();
        session.apply(outcome);
        let to = session.stage_label();

        info!(
            event_name = "conversation.transition_applied",
            correlation_id = %audit.correlation_id,
            session_id = %session.id(),
            from = %from,
            to = %to,
            "conversation transition applied"
        );
        self.audit.emit(
            self.event(audit, "conversation.transition_applied", AuditCategory::Conversation, AuditOutcome::Success)
                .with_metadata("from", from.clone())
                .with_metadata("to", to),
        );

        if outcome.updates.contains(&SessionUpdate::Reset) {
            self.audit_reset(session, outcome, &from, audit);
        }
    }

    fn audit_reset(&self, session: &Session, outcome: &TransitionOutcome, from: &str, audit: &AuditContext) {
        let (reason, result) = if outcome.from == Stage::Unrecognized {
            warn!(
                event_name = "conversation.reset",
                correlation_id = %audit.correlation_id,
                session_id = %session.id(),
                from = %from,
                "unrecognized stage; conversation reset"
            );
            ("unrecognized_stage", AuditOutcome::Failed)
        } else {
            info!(
                event_name = "conversation.reset",
                correlation_id = %audit.correlation_id,
                session_id = %session.id(),
                from = %from,
                "conversation restarted"
            );
            ("restart", AuditOutcome::Success)
        };
        self.audit.emit(
            self.event(audit, "conversation.reset", AuditCategory::Conversation, result)
                .with_metadata("reason", reason)
                .with_metadata("from", from),
        );
    }

    fn event(
        &self,
        audit: &AuditContext,
        event_type: &str,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent::new(
            audit.session_id.clone(),
            audit.correlation_id.clone(),
            event_type,
            category,
            audit.actor.clone(),
            outcome,
        )
    }
}
