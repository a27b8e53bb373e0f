use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "grantbot.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub project: ProjectConfig,
    pub conversation: ConversationConfig,
    pub documents: DocumentsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectConfig {
    pub funder: String,
    pub lead_company: String,
    pub title: String,
    pub number: String,
    pub total_periods: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConversationConfig {
    pub empty_answers: EmptyAnswerPolicy,
}

#[derive(Clone, Debug)]
pub struct DocumentsConfig {
    pub output_dir: PathBuf,
    /// Pre-shared token that counts as an authenticated session from the start.
    pub access_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    /// Sessions with no message for this long are evicted from the registry.
    pub session_idle_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// What to do with a blank answer to a report section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyAnswerPolicy {
    /// Store the blank answer; the report shows a no-data placeholder.
    #[default]
    Accept,
    /// Re-ask the same section.
    Reject,
}

impl EmptyAnswerPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub total_periods: Option<u32>,
    pub empty_answers: Option<EmptyAnswerPolicy>,
    pub output_dir: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                funder: "Innovate UK".to_string(),
                lead_company: "FLOX Limited".to_string(),
                title: "NetFLOX360 – Bridging Poultry Farm Data with Factory Insights using \
                        Artificial Intelligence for Sustainable Growth"
                    .to_string(),
                number: "10103645".to_string(),
                total_periods: 4,
            },
            conversation: ConversationConfig { empty_answers: EmptyAnswerPolicy::Accept },
            documents: DocumentsConfig { output_dir: PathBuf::from("drafts"), access_token: None },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                session_idle_secs: 3600,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for EmptyAnswerPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::Validation(format!(
                "unsupported empty answer policy `{other}` (expected accept|reject)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(project) = patch.project {
            if let Some(funder) = project.funder {
                self.project.funder = funder;
            }
            if let Some(lead_company) = project.lead_company {
                self.project.lead_company = lead_company;
            }
            if let Some(title) = project.title {
                self.project.title = title;
            }
            if let Some(number) = project.number {
                self.project.number = number;
            }
            if let Some(total_periods) = project.total_periods {
                self.project.total_periods = total_periods;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(empty_answers) = conversation.empty_answers {
                self.conversation.empty_answers = empty_answers;
            }
        }

        if let Some(documents) = patch.documents {
            if let Some(output_dir) = documents.output_dir {
                self.documents.output_dir = output_dir;
            }
            if let Some(access_token_value) = documents.access_token {
                self.documents.access_token = Some(secret_value(access_token_value));
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(session_idle_secs) = server.session_idle_secs {
                self.server.session_idle_secs = session_idle_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GRANTBOT_PROJECT_FUNDER") {
            self.project.funder = value;
        }
        if let Some(value) = read_env("GRANTBOT_PROJECT_LEAD_COMPANY") {
            self.project.lead_company = value;
        }
        if let Some(value) = read_env("GRANTBOT_PROJECT_TITLE") {
            self.project.title = value;
        }
        if let Some(value) = read_env("GRANTBOT_PROJECT_NUMBER") {
            self.project.number = value;
        }
        if let Some(value) = read_env("GRANTBOT_PROJECT_TOTAL_PERIODS") {
            self.project.total_periods = parse_u32("GRANTBOT_PROJECT_TOTAL_PERIODS", &value)?;
        }

        if let Some(value) = read_env("GRANTBOT_CONVERSATION_EMPTY_ANSWERS") {
            self.conversation.empty_answers = value.parse()?;
        }

        if let Some(value) = read_env("GRANTBOT_DOCUMENTS_OUTPUT_DIR") {
            self.documents.output_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("GRANTBOT_DOCUMENTS_ACCESS_TOKEN") {
            self.documents.access_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("GRANTBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GRANTBOT_SERVER_PORT") {
            self.server.port = parse_u16("GRANTBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("GRANTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("GRANTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("GRANTBOT_SERVER_SESSION_IDLE_SECS") {
            self.server.session_idle_secs = parse_u64("GRANTBOT_SERVER_SESSION_IDLE_SECS", &value)?;
        }

        let log_level =
            read_env("GRANTBOT_LOGGING_LEVEL").or_else(|| read_env("GRANTBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GRANTBOT_LOGGING_FORMAT").or_else(|| read_env("GRANTBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(total_periods) = overrides.total_periods {
            self.project.total_periods = total_periods;
        }
        if let Some(empty_answers) = overrides.empty_answers {
            self.conversation.empty_answers = empty_answers;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.documents.output_dir = output_dir;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_project(&self.project)?;
        validate_documents(&self.documents)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_project(project: &ProjectConfig) -> Result<(), ConfigError> {
    let required = [
        ("project.funder", &project.funder),
        ("project.lead_company", &project.lead_company),
        ("project.title", &project.title),
        ("project.number", &project.number),
    ];
    if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(ConfigError::Validation(format!("{key} must not be empty")));
    }

    if project.total_periods == 0 {
        return Err(ConfigError::Validation(
            "project.total_periods must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_documents(documents: &DocumentsConfig) -> Result<(), ConfigError> {
    if documents.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("documents.output_dir must not be empty".to_string()));
    }

    let blank_token = documents
        .access_token
        .as_ref()
        .map(|token| token.expose_secret().trim().is_empty())
        .unwrap_or(false);
    if blank_token {
        return Err(ConfigError::Validation(
            "documents.access_token is set but blank; remove it or provide a value".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if server.session_idle_secs == 0 {
        return Err(ConfigError::Validation(
            "server.session_idle_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    project: Option<ProjectPatch>,
    conversation: Option<ConversationPatch>,
    documents: Option<DocumentsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectPatch {
    funder: Option<String>,
    lead_company: Option<String>,
    title: Option<String>,
    number: Option<String>,
    total_periods: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    empty_answers: Option<EmptyAnswerPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentsPatch {
    output_dir: Option<PathBuf>,
    access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    session_idle_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
