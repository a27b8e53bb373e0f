//! Conversation API.
//!
//! - `POST   /sessions`                    open a greeted session
//! - `GET    /sessions/{id}`               progress and message log
//! - `POST   /sessions/{id}/messages`      one user turn
//! - `DELETE /sessions/{id}`               discard a session
//! - `POST   /sessions/{id}/auth/code`     submit a sign-in code
//! - `POST   /sessions/{id}/attachments`   record uploaded file metadata

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use grantbot_core::domain::attachment::AttachmentInfo;
use grantbot_core::domain::session::{ChatMessage, SessionId};
use grantbot_core::errors::{ApplicationError, InterfaceError};
use grantbot_core::flows::FlowAction;
use grantbot_core::registry::SessionRegistry;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionsState {
    registry: Arc<SessionRegistry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub stage: String,
    pub period: Option<u32>,
    pub section_index: usize,
    pub auth_capability: bool,
    pub messages: Vec<ChatMessage>,
    pub attachments: Vec<AttachmentInfo>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub stage: String,
    pub messages: Vec<String>,
    pub action: Option<FlowAction>,
    pub document_title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CodeResponse {
    pub accepted: bool,
    pub authenticated: bool,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentRequest {
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

/// Interface error rendered as JSON with a user-safe message.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(
                event_name = "http.request_failed",
                correlation_id = %self.0.correlation_id(),
                error = %self.0,
                "request failed"
            );
        } else {
            warn!(
                event_name = "http.request_rejected",
                correlation_id = %self.0.correlation_id(),
                error = %self.0,
                "request rejected"
            );
        }

        let body = ErrorBody {
            error: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/sessions", post(open_session))
        .route("/sessions/{id}", get(view_session).delete(close_session))
        .route("/sessions/{id}/messages", post(post_message))
        .route("/sessions/{id}/auth/code", post(submit_code))
        .route("/sessions/{id}/attachments", post(record_attachment))
        .with_state(SessionsState { registry })
}

async fn open_session(
    State(state): State<SessionsState>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let view = blocking(move || {
        let (id, _) = state.registry.open();
        session_view(&state.registry, &id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn view_session(
    State(state): State<SessionsState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let view = blocking(move || session_view(&state.registry, &SessionId(id))).await?;
    Ok(Json(view))
}

async fn close_session(
    State(state): State<SessionsState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    blocking(move || {
        let id = SessionId(id);
        if state.registry.remove(&id) {
            Ok(())
        } else {
            Err(ApplicationError::SessionNotFound(id.to_string()))
        }
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_message(
    State(state): State<SessionsState>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let response = blocking(move || {
        let id = SessionId(id);
        let reply = state.registry.handle_input(&id, &request.text)?;
        let stage = match state.registry.get(&id) {
            Some(handle) => handle.lock().stage_label(),
            None => reply.stage.as_str().to_string(),
        };
        Ok(MessageResponse {
            stage,
            messages: reply.messages,
            action: reply.action,
            document_title: reply.document_title,
        })
    })
    .await?;
    Ok(Json(response))
}

async fn submit_code(
    State(state): State<SessionsState>,
    Path(id): Path<String>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<CodeResponse>, ApiError> {
    let response = blocking(move || {
        let id = SessionId(id);
        let accepted = state.registry.complete_authentication(&id, &request.code)?;
        let authenticated = state
            .registry
            .get(&id)
            .map(|handle| handle.lock().auth_capability)
            .unwrap_or(false);
        Ok(CodeResponse { accepted, authenticated })
    })
    .await?;
    Ok(Json(response))
}

async fn record_attachment(
    State(state): State<SessionsState>,
    Path(id): Path<String>,
    Json(request): Json<AttachmentRequest>,
) -> Result<(StatusCode, Json<AttachmentInfo>), ApiError> {
    let info = blocking(move || {
        state.registry.record_attachment(
            &SessionId(id),
            &request.name,
            request.size,
            request.content_type.as_deref(),
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(info)))
}

fn session_view(registry: &SessionRegistry, id: &SessionId) -> Result<SessionView, ApplicationError> {
    let handle =
        registry.get(id).ok_or_else(|| ApplicationError::SessionNotFound(id.to_string()))?;
    let session = handle.lock();
    Ok(SessionView {
        session_id: session.id().to_string(),
        stage: session.stage_label(),
        period: session.period().map(|period| period.number()),
        section_index: session.section_index(),
        auth_capability: session.auth_capability,
        messages: session.messages().to_vec(),
        attachments: session.attachments().iter().cloned().collect(),
        created_at: session.created_at(),
        last_activity: session.last_activity(),
    })
}

/// Runs registry work off the async executor; session locks may be held
/// for the duration of a document write.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApplicationError> + Send + 'static,
{
    let correlation_id = Uuid::new_v4().to_string();
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error.into_interface(correlation_id).into()),
        Err(join_error) => Err(InterfaceError::Internal {
            message: join_error.to_string(),
            correlation_id,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use grantbot_core::collaborators::RecordingDocumentStore;
    use grantbot_core::config::EmptyAnswerPolicy;
    use grantbot_core::domain::project::ProjectMetadata;
    use grantbot_core::domain::section::SECTION_CATALOG;
    use grantbot_core::flows::{ConversationController, ReportFlow};
    use grantbot_core::registry::SessionRegistry;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::router;

    fn app(documents: Arc<RecordingDocumentStore>, token: Option<&str>) -> Router {
        let project = ProjectMetadata {
            funder: "Innovate UK".to_owned(),
            lead_company: "FLOX Limited".to_owned(),
            title: "NetFLOX360".to_owned(),
            number: "10103645".to_owned(),
            total_periods: 4,
        };
        let flow = ReportFlow::new(project, EmptyAnswerPolicy::Accept).expect("templates");
        let controller = ConversationController::new(flow, documents);
        let token = token.map(|value| value.to_owned().into());
        router(Arc::new(SessionRegistry::new(Arc::new(controller), token)))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|value| Body::from(value.to_string())).unwrap_or_else(Body::empty))
            .expect("request builds");
        let response = app.clone().oneshot(request).await.expect("router responds");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn open(app: &Router) -> String {
        let (status, body) = call(app, "POST", "/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["session_id"].as_str().expect("session id").to_owned()
    }

    #[tokio::test]
    async fn new_sessions_are_greeted() {
        let app = app(Arc::new(RecordingDocumentStore::default()), None);
        let (status, body) = call(&app, "POST", "/sessions", None).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["stage"], "start");
        assert_eq!(body["messages"][0]["role"], "assistant");
        assert!(body["messages"][0]["content"]
            .as_str()
            .is_some_and(|text| text.contains("(1-4)")));
    }

    #[tokio::test]
    async fn full_conversation_over_http() {
        let documents = Arc::new(RecordingDocumentStore::default());
        let app = app(documents.clone(), None);
        let id = open(&app).await;
        let messages = format!("/sessions/{id}/messages");

        let (_, reply) = call(&app, "POST", &messages, Some(json!({ "text": "3" }))).await;
        assert_eq!(reply["stage"], "ask_section[0]");

        call(&app, "POST", &messages, Some(json!({ "text": "2025-09-30" }))).await;
        for section in &SECTION_CATALOG[1..] {
            call(&app, "POST", &messages, Some(json!({ "text": format!("on {section}") }))).await;
        }

        let (_, blocked) = call(&app, "POST", &messages, Some(json!({ "text": "yes" }))).await;
        assert_eq!(blocked["stage"], "confirm_generate");
        assert_eq!(blocked["action"], "request_authentication");

        let (status, code) = call(
            &app,
            "POST",
            &format!("/sessions/{id}/auth/code"),
            Some(json!({ "code": "abc" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(code["authenticated"], true);

        let (_, done) = call(&app, "POST", &messages, Some(json!({ "text": "generate" }))).await;
        assert_eq!(done["stage"], "done");
        assert!(done["document_title"]
            .as_str()
            .is_some_and(|title| title.starts_with("Innovate UK Q3 Report - 10103645 - Draft ")));
        assert_eq!(documents.documents().len(), 1);

        let (_, view) = call(&app, "GET", &format!("/sessions/{id}"), None).await;
        assert_eq!(view["period"], 3);
        assert_eq!(view["stage"], "done");
    }

    #[tokio::test]
    async fn attachments_are_validated() {
        let app = app(Arc::new(RecordingDocumentStore::default()), Some("preshared"));
        let id = open(&app).await;
        let uri = format!("/sessions/{id}/attachments");

        let (status, info) =
            call(&app, "POST", &uri, Some(json!({ "name": "risks.pdf", "size": 1024 }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(info["content_type"], "application/pdf");

        let (status, error) =
            call(&app, "POST", &uri, Some(json!({ "name": "run.sh", "size": 10 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error["correlation_id"].as_str().is_some());

        let (_, view) = call(&app, "GET", &format!("/sessions/{id}"), None).await;
        assert_eq!(view["attachments"].as_array().map(Vec::len), Some(1));
        assert_eq!(view["auth_capability"], true);
        assert!(view["created_at"].as_str().is_some());
        assert!(view["last_activity"].as_str().is_some());
    }

    #[tokio::test]
    async fn deleted_sessions_are_gone() {
        let app = app(Arc::new(RecordingDocumentStore::default()), None);
        let id = open(&app).await;
        let uri = format!("/sessions/{id}");

        let (status, _) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "That conversation does not exist or has ended.");

        let (status, _) =
            call(&app, "POST", &format!("{uri}/messages"), Some(json!({ "text": "1" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
