use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::collaborators::{AuthenticationPrompt, Authenticator};

const SIGN_IN_INSTRUCTIONS: &str =
    "Sign in to your document library, then paste the access code you receive here.";

/// Treats any non-blank access code as a credential.
///
/// A token seeded from configuration makes the session authenticated from
/// the first turn. One instance belongs to one session.
#[derive(Debug, Default)]
pub struct AccessTokenAuthenticator {
    token: Mutex<Option<SecretString>>,
}

impl AccessTokenAuthenticator {
    pub fn new(token: Option<SecretString>) -> Self {
        Self { token: Mutex::new(token) }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<SecretString>> {
        match self.token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Authenticator for AccessTokenAuthenticator {
    fn is_authenticated(&self) -> bool {
        self.slot().as_ref().is_some_and(|token| !token.expose_secret().trim().is_empty())
    }

    fn begin_authentication(&self) -> AuthenticationPrompt {
        AuthenticationPrompt { instructions: SIGN_IN_INSTRUCTIONS.to_string(), accepts_code: true }
    }

    fn complete_authentication(&self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() {
            return false;
        }

        *self.slot() = Some(SecretString::from(code.to_string()));
        info!(event_name = "authentication.completed", "access code accepted");
        true
    }

    fn revoke(&self) {
        *self.slot() = None;
        info!(event_name = "authentication.revoked", "access token cleared");
    }
}
