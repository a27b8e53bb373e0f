use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use grantbot_core::registry::SessionRegistry;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    registry: Arc<SessionRegistry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub sessions: HealthCheck,
    pub checked_at: String,
}

pub fn router(registry: Arc<SessionRegistry>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { registry })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let active = state.registry.len();
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "grantbot-server runtime initialized".to_string(),
        },
        sessions: HealthCheck { status: "ready", detail: format!("{active} active sessions") },
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use grantbot_core::collaborators::RecordingDocumentStore;
    use grantbot_core::config::EmptyAnswerPolicy;
    use grantbot_core::domain::project::ProjectMetadata;
    use grantbot_core::flows::{ConversationController, ReportFlow};
    use grantbot_core::registry::SessionRegistry;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_reports_active_session_count() {
        let project = ProjectMetadata {
            funder: "Innovate UK".to_owned(),
            lead_company: "FLOX Limited".to_owned(),
            title: "NetFLOX360".to_owned(),
            number: "10103645".to_owned(),
            total_periods: 4,
        };
        let flow = ReportFlow::new(project, EmptyAnswerPolicy::Accept).expect("templates");
        let controller =
            ConversationController::new(flow, Arc::new(RecordingDocumentStore::default()));
        let registry = Arc::new(SessionRegistry::new(Arc::new(controller), None));
        registry.open();

        let (status, Json(payload)) = health(State(HealthState { registry })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.sessions.detail, "1 active sessions");
    }
}
