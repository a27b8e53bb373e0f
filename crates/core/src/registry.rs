//! Per-session locking for hosts that serve many conversations at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use tracing::info;

use crate::collaborators::{AccessTokenAuthenticator, Authenticator};
use crate::domain::attachment::AttachmentInfo;
use crate::domain::session::{Session, SessionId};
use crate::errors::{ApplicationError, DomainError};
use crate::flows::controller::{ConversationController, Reply};

/// One live conversation and the credential state that belongs to it.
#[derive(Clone)]
pub struct SessionHandle {
    pub session: Arc<Mutex<Session>>,
    pub authenticator: Arc<AccessTokenAuthenticator>,
}

impl SessionHandle {
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        match self.session.lock() {
            Ok(session) => session,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub struct SessionRegistry {
    controller: Arc<ConversationController>,
    access_token: Option<SecretString>,
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(controller: Arc<ConversationController>, access_token: Option<SecretString>) -> Self {
        Self { controller, access_token, sessions: Mutex::new(HashMap::new()) }
    }

    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    /// Creates a greeted session and returns its id.
    pub fn open(&self) -> (SessionId, SessionHandle) {
        let authenticator = Arc::new(AccessTokenAuthenticator::new(self.access_token.clone()));
        let mut session = Session::new();
        session.auth_capability = authenticator.is_authenticated();
        self.controller.greet(&mut session);
        let id = session.id().clone();
        let handle = SessionHandle { session: Arc::new(Mutex::new(session)), authenticator };

        self.sessions().insert(id.clone(), handle.clone());
        info!(event_name = "session.opened", session_id = %id, "session opened");
        (id, handle)
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions().get(id).cloned()
    }

    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self.sessions().remove(id).is_some();
        if removed {
            info!(event_name = "session.closed", session_id = %id, "session discarded");
        }
        removed
    }

    /// Drops every session whose last message is older than `idle_for`.
    /// Sessions busy with a turn count as active. Returns how many were dropped.
    pub fn evict_idle(&self, idle_for: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - idle_for;
        let snapshot = self
            .sessions()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect::<Vec<_>>();
        let stale = snapshot
            .into_iter()
            .filter(|(_, handle)| match handle.session.try_lock() {
                Ok(session) => session.last_activity() < cutoff,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().last_activity() < cutoff,
                Err(TryLockError::WouldBlock) => false,
            })
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        let mut sessions = self.sessions();
        let evicted = stale.iter().filter(|id| sessions.remove(*id).is_some()).count();
        drop(sessions);
        if evicted > 0 {
            info!(
                event_name = "session.evicted",
                evicted,
                idle_secs = idle_for.num_seconds(),
                "idle sessions discarded"
            );
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn handle_input(&self, id: &SessionId, text: &str) -> Result<Reply, ApplicationError> {
        let handle = self.require(id)?;
        let mut session = handle.lock();
        Ok(self.controller.handle_input(&mut session, handle.authenticator.as_ref(), text))
    }

    pub fn complete_authentication(&self, id: &SessionId, code: &str) -> Result<bool, ApplicationError> {
        let handle = self.require(id)?;
        let mut session = handle.lock();
        Ok(self.controller.complete_authentication(&mut session, handle.authenticator.as_ref(), code))
    }

    pub fn record_attachment(
        &self,
        id: &SessionId,
        name: &str,
        size_bytes: u64,
        content_type: Option<&str>,
    ) -> Result<AttachmentInfo, ApplicationError> {
        let handle = self.require(id)?;
        let mut session = handle.lock();
        let info = session
            .attachments_mut()
            .record(name, size_bytes, content_type)
            .map_err(DomainError::from)?
            .clone();
        Ok(info)
    }

    fn require(&self, id: &SessionId) -> Result<SessionHandle, ApplicationError> {
        self.get(id).ok_or_else(|| ApplicationError::SessionNotFound(id.to_string()))
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
