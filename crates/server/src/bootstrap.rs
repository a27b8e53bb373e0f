use std::sync::Arc;

use grantbot_core::collaborators::LocalDocumentStore;
use grantbot_core::config::{AppConfig, ConfigError, LoadOptions};
use grantbot_core::domain::project::ProjectMetadata;
use grantbot_core::flows::{ConversationController, ReportFlow};
use grantbot_core::prompts::PromptError;
use grantbot_core::registry::SessionRegistry;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub registry: Arc<SessionRegistry>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("conversation templates failed validation: {0}")]
    Templates(#[from] PromptError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let flow = ReportFlow::new(
        ProjectMetadata::from(&config.project),
        config.conversation.empty_answers,
    )?;
    let documents = Arc::new(LocalDocumentStore::new(config.documents.output_dir.clone()));
    let output_dir = documents.output_dir().display().to_string();
    let controller = ConversationController::new(flow, documents);
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(controller),
        config.documents.access_token.clone(),
    ));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        output_dir = %output_dir,
        total_periods = config.project.total_periods,
        empty_answers = config.conversation.empty_answers.as_str(),
        "conversation runtime ready"
    );

    Ok(Application { config, registry })
}
