//! Seams to the services the conversation depends on but does not own.

pub mod auth;
pub mod documents;

use thiserror::Error;

pub use auth::AccessTokenAuthenticator;
pub use documents::{LocalDocumentStore, RecordingDocumentStore};

/// Instructions a host shows when the user must sign in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationPrompt {
    pub instructions: String,
    /// Whether the host should offer a field for pasting back a code.
    pub accepts_code: bool,
}

pub trait Authenticator: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn begin_authentication(&self) -> AuthenticationPrompt;

    /// Returns whether the code was accepted.
    fn complete_authentication(&self, code: &str) -> bool;

    fn revoke(&self);
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document title `{0}` has no usable characters")]
    UnusableTitle(String),
    #[error("could not write document `{path}`: {source}")]
    Write { path: std::path::PathBuf, source: std::io::Error },
    #[error("document service rejected the request: {0}")]
    Rejected(String),
}

pub trait DocumentService: Send + Sync {
    /// Creates a document and returns its final title.
    fn create_document(&self, title_hint: &str, body: &str) -> Result<String, DocumentError>;
}
