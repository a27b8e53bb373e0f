use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use grantbot_core::collaborators::{AccessTokenAuthenticator, Authenticator, LocalDocumentStore};
use grantbot_core::config::AppConfig;
use grantbot_core::domain::project::ProjectMetadata;
use grantbot_core::domain::session::Session;
use grantbot_core::flows::{ConversationController, FlowAction, ReportFlow, Stage};
use tracing_subscriber::EnvFilter;

use crate::commands::{load_config, CommandResult};

const HELP: &str = "Commands: /login, /code <code>, /logout, /attach <path>, /files, /quit. \
While answering a section, write them with a double slash (//attach <path>).";

/// What one line of terminal input produced.
#[derive(Debug, PartialEq, Eq)]
pub enum HostResponse {
    Say(Vec<String>),
    Quit,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChatSummary {
    pub turns: usize,
    pub documents: Vec<String>,
}

/// Terminal host for one conversation.
pub struct ChatHost {
    controller: ConversationController,
    authenticator: AccessTokenAuthenticator,
    session: Session,
    summary: ChatSummary,
}

impl ChatHost {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let flow = ReportFlow::new(
            ProjectMetadata::from(&config.project),
            config.conversation.empty_answers,
        )
        .context("conversation templates failed to compile")?;
        let documents = Arc::new(LocalDocumentStore::new(config.documents.output_dir.clone()));
        let controller = ConversationController::new(flow, documents);
        let authenticator = AccessTokenAuthenticator::new(config.documents.access_token.clone());
        Ok(Self::new(controller, authenticator))
    }

    pub fn new(controller: ConversationController, authenticator: AccessTokenAuthenticator) -> Self {
        Self { controller, authenticator, session: Session::new(), summary: ChatSummary::default() }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> anyhow::Result<ChatSummary> {
        writeln!(output, "{HELP}")?;
        if let Some(greeting) = self.controller.greet(&mut self.session) {
            writeln!(output, "bot> {greeting}")?;
        }

        for line in input.lines() {
            let line = line.context("could not read terminal input")?;
            match self.handle_line(&line) {
                HostResponse::Quit => break,
                HostResponse::Say(lines) => {
                    for text in lines {
                        writeln!(output, "bot> {text}")?;
                    }
                }
            }
            output.flush()?;
        }

        Ok(std::mem::take(&mut self.summary))
    }

    /// Runs a host command or passes the line to the conversation. Section
    /// answers may start with `/`, so commands there need a `//` prefix.
    pub fn handle_line(&mut self, line: &str) -> HostResponse {
        let Some(command_line) = self.command_text(line) else {
            return self.converse(line);
        };
        let (command, argument) = match command_line.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (command_line, ""),
        };

        match command {
            "/quit" | "/exit" => HostResponse::Quit,
            "/help" => HostResponse::Say(vec![HELP.to_string()]),
            "/login" => {
                let prompt = self.authenticator.begin_authentication();
                let mut lines = vec![prompt.instructions];
                if prompt.accepts_code {
                    lines.push("Use /code <code> once you have it.".to_string());
                }
                HostResponse::Say(lines)
            }
            "/code" => {
                let accepted =
                    self.controller.complete_authentication(&mut self.session, &self.authenticator, argument);
                let text = if accepted {
                    "Signed in. Confirm again to generate the document."
                } else {
                    "That code is empty. Usage: /code <code>"
                };
                HostResponse::Say(vec![text.to_string()])
            }
            "/logout" => {
                self.controller.revoke_authentication(&mut self.session, &self.authenticator);
                HostResponse::Say(vec!["Signed out.".to_string()])
            }
            "/attach" => HostResponse::Say(vec![self.attach(Path::new(argument))]),
            "/files" => HostResponse::Say(self.list_files()),
            _ => self.converse(line),
        }
    }

    /// `/name ...` normalised from either prefix; `None` for conversation text.
    fn command_text<'a>(&self, line: &'a str) -> Option<&'a str> {
        let trimmed = line.trim();
        if trimmed.starts_with("//") {
            return Some(&trimmed[1..]);
        }
        if self.session.stage == Stage::AskSection || !trimmed.starts_with('/') {
            return None;
        }
        Some(trimmed)
    }

    fn converse(&mut self, line: &str) -> HostResponse {
        let reply = self.controller.handle_input(&mut self.session, &self.authenticator, line);
        self.summary.turns += 1;
        if let Some(title) = reply.document_title.clone() {
            self.summary.documents.push(title);
        }

        let mut lines = reply.messages;
        if reply.action == Some(FlowAction::RequestAuthentication) {
            lines.push("Type /login to sign in.".to_string());
        }
        HostResponse::Say(lines)
    }

    fn attach(&mut self, path: &Path) -> String {
        if path.as_os_str().is_empty() {
            return "Usage: /attach <path>".to_string();
        }
        let Some(name) = path.file_name().map(|name| name.to_string_lossy().into_owned()) else {
            return format!("`{}` is not a file.", path.display());
        };
        let size = match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata.len(),
            Ok(_) => return format!("`{}` is not a file.", path.display()),
            Err(error) => return format!("Could not open `{}`: {error}", path.display()),
        };

        match self.session.attachments_mut().record(&name, size, None) {
            Ok(info) => format!("Attached {} ({} bytes, {}).", info.name, info.size_bytes, info.content_type),
            Err(error) => format!("Not attached: {error}"),
        }
    }

    fn list_files(&self) -> Vec<String> {
        if self.session.attachments().is_empty() {
            return vec!["No files attached yet.".to_string()];
        }
        self.session
            .attachments()
            .iter()
            .map(|info| format!("{} ({} bytes, {})", info.name, info.size_bytes, info.content_type))
            .collect()
    }
}

pub fn run(config_path: Option<PathBuf>) -> CommandResult {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), 2)
        }
    };
    init_logging(&config);

    let outcome = ChatHost::from_config(&config)
        .and_then(|mut host| host.run(io::stdin().lock(), io::stdout().lock()));
    match outcome {
        Ok(summary) => {
            let documents = if summary.documents.is_empty() {
                "none".to_string()
            } else {
                summary.documents.join(", ")
            };
            CommandResult::success(
                "chat",
                format!("conversation ended after {} turns; documents created: {documents}", summary.turns),
            )
        }
        Err(error) => CommandResult::failure("chat", "runtime", format!("{error:#}"), 1),
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}
