pub mod audit;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod prompts;
pub mod registry;
pub mod report;

pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use collaborators::{
    AccessTokenAuthenticator, AuthenticationPrompt, Authenticator, DocumentError,
    DocumentService, LocalDocumentStore, RecordingDocumentStore,
};
pub use config::{AppConfig, EmptyAnswerPolicy, LoadOptions, LogFormat};
pub use domain::answers::AnswerSheet;
pub use domain::attachment::{AttachmentInfo, AttachmentLedger};
pub use domain::period::{PeriodError, ReportingPeriod};
pub use domain::project::ProjectMetadata;
pub use domain::section::{SectionKey, SECTION_CATALOG};
pub use domain::session::{ChatMessage, MessageRole, Session, SessionId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{ConversationController, FlowAction, Reply, ReportFlow, Stage};
pub use prompts::PromptBook;
pub use registry::{SessionHandle, SessionRegistry};
pub use report::{assemble, document_title};
