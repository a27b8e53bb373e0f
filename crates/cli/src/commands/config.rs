use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use grantbot_core::config::{AppConfig, DEFAULT_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::load_config;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run(config_path: Option<&Path>) -> String {
    let config = match load_config(config_path.map(Path::to_path_buf)) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let access_token = config
        .documents
        .access_token
        .as_ref()
        .map(|token| redact_token(token.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field {
            key: "project.funder",
            env_keys: &["GRANTBOT_PROJECT_FUNDER"],
            value: config.project.funder.clone(),
        },
        Field {
            key: "project.lead_company",
            env_keys: &["GRANTBOT_PROJECT_LEAD_COMPANY"],
            value: config.project.lead_company.clone(),
        },
        Field {
            key: "project.title",
            env_keys: &["GRANTBOT_PROJECT_TITLE"],
            value: config.project.title.clone(),
        },
        Field {
            key: "project.number",
            env_keys: &["GRANTBOT_PROJECT_NUMBER"],
            value: config.project.number.clone(),
        },
        Field {
            key: "project.total_periods",
            env_keys: &["GRANTBOT_PROJECT_TOTAL_PERIODS"],
            value: config.project.total_periods.to_string(),
        },
        Field {
            key: "conversation.empty_answers",
            env_keys: &["GRANTBOT_CONVERSATION_EMPTY_ANSWERS"],
            value: config.conversation.empty_answers.as_str().to_string(),
        },
        Field {
            key: "documents.output_dir",
            env_keys: &["GRANTBOT_DOCUMENTS_OUTPUT_DIR"],
            value: config.documents.output_dir.display().to_string(),
        },
        Field {
            key: "documents.access_token",
            env_keys: &["GRANTBOT_DOCUMENTS_ACCESS_TOKEN"],
            value: access_token,
        },
        Field {
            key: "server.bind_address",
            env_keys: &["GRANTBOT_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key: "server.port",
            env_keys: &["GRANTBOT_SERVER_PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key: "server.graceful_shutdown_secs",
            env_keys: &["GRANTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        Field {
            key: "server.session_idle_secs",
            env_keys: &["GRANTBOT_SERVER_SESSION_IDLE_SECS"],
            value: config.server.session_idle_secs.to_string(),
        },
        Field {
            key: "logging.level",
            env_keys: &["GRANTBOT_LOGGING_LEVEL", "GRANTBOT_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["GRANTBOT_LOGGING_FORMAT", "GRANTBOT_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from(DEFAULT_CONFIG_FILE);
    if root.exists() {
        return Some(root);
    }

    let nested = Path::new("config").join(DEFAULT_CONFIG_FILE);
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let visible = trimmed.chars().take(2).collect::<String>();
    format!("{visible}***")
}
