use std::env;
use std::fs;
use std::io::Cursor;
use std::sync::{Mutex, OnceLock};

use grantbot_cli::commands::chat::{ChatHost, HostResponse};
use grantbot_cli::commands::{config, doctor, render};
use grantbot_core::config::AppConfig;
use grantbot_core::domain::section::SECTION_CATALOG;
use grantbot_core::flows::Stage;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn doctor_passes_with_writable_output_dir() {
    let dir = TempDir::new().expect("temp dir");
    let output_dir = dir.path().join("drafts");
    with_env(&[("GRANTBOT_DOCUMENTS_OUTPUT_DIR", output_dir.to_str().expect("utf-8 path"))], || {
        let result = doctor::run(None, true);
        assert_eq!(result.exit_code, 0, "expected all doctor checks to pass");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names = payload["checks"]
            .as_array()
            .map(|checks| checks.iter().map(|check| check["name"].clone()).collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(names, vec!["config_validation", "output_directory", "prompt_templates"]);
        assert!(output_dir.exists());
    });
}

#[test]
fn doctor_reports_config_failure() {
    with_env(&[("GRANTBOT_PROJECT_TOTAL_PERIODS", "0")], || {
        let result = doctor::run(None, true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

#[test]
fn config_attributes_sources_and_redacts_token() {
    with_env(
        &[("GRANTBOT_DOCUMENTS_ACCESS_TOKEN", "supersecret"), ("GRANTBOT_SERVER_PORT", "9001")],
        || {
            let output = config::run(None);
            assert!(output.contains("- server.port = 9001 (source: env (GRANTBOT_SERVER_PORT))"));
            assert!(output.contains("- project.total_periods = 4 (source: default)"));
            assert!(output.contains("documents.access_token = su***"));
            assert!(!output.contains("supersecret"));
        },
    );
}

#[test]
fn config_reads_explicit_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("grantbot.toml");
    fs::write(&path, "[project]\nfunder = \"Horizon Fund\"\n").expect("config written");

    with_env(&[], || {
        let output = config::run(Some(path.as_path()));
        assert!(output.contains("- project.funder = Horizon Fund (source: file ("));
    });
}

#[test]
fn render_prints_assembled_report() {
    let dir = TempDir::new().expect("temp dir");
    let answers = dir.path().join("answers.toml");
    fs::write(
        &answers,
        "period_end_date = \"2025-06-30\"\nprogress = \"Pilot line commissioned.\"\n",
    )
    .expect("answers written");

    with_env(&[], || {
        let result = render::run(None, 2, &answers);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.starts_with("# Innovate UK Quarterly Report - Q2\n"));
        assert!(result.output.contains("**Quarter End Date:** 2025-06-30"));
        assert!(result.output.contains("## Progress\n\nPilot line commissioned.\n"));
    });
}

#[test]
fn render_rejects_unknown_sections_and_periods() {
    let dir = TempDir::new().expect("temp dir");
    let answers = dir.path().join("answers.toml");
    fs::write(&answers, "budget = \"lots\"\n").expect("answers written");

    with_env(&[], || {
        let unknown = render::run(None, 1, &answers);
        assert_eq!(unknown.exit_code, 4);
        let payload = parse_payload(&unknown.output);
        assert_eq!(payload["error_class"], "invalid_answers");

        let out_of_range = render::run(None, 5, &answers);
        assert_eq!(out_of_range.exit_code, 3);
        assert_eq!(parse_payload(&out_of_range.output)["error_class"], "invalid_period");
    });
}

#[test]
fn chat_host_drafts_a_report_end_to_end() {
    let dir = TempDir::new().expect("temp dir");
    let evidence = dir.path().join("gantt.xlsx");
    fs::write(&evidence, [0_u8; 64]).expect("attachment written");

    let mut config = AppConfig::default();
    config.documents.output_dir = dir.path().join("drafts");

    let mut script = vec![
        "1".to_string(),
        "2025-03-31".to_string(),
        format!("//attach {}", evidence.display()),
    ];
    script.extend(SECTION_CATALOG[1..].iter().map(|section| format!("about {section}")));
    script.extend([
        "yes".to_string(),
        "/login".to_string(),
        "/code abc123".to_string(),
        "yes".to_string(),
        "/files".to_string(),
        "/quit".to_string(),
        "never reached".to_string(),
    ]);
    let input = Cursor::new(script.join("\n"));
    let mut output = Vec::new();

    let mut host = ChatHost::from_config(&config).expect("host builds");
    let summary = host.run(input, &mut output).expect("chat runs");
    let transcript = String::from_utf8(output).expect("utf-8 transcript");

    assert_eq!(summary.documents.len(), 1);
    assert!(summary.documents[0].starts_with("Innovate UK Q1 Report - 10103645 - Draft "));
    assert!(transcript.contains("Please log in to the document service first"));
    assert!(transcript.contains("gantt.xlsx (64 bytes"));
    assert_eq!(host.session().stage, Stage::Done);

    let drafts = fs::read_dir(dir.path().join("drafts")).expect("drafts dir").count();
    assert_eq!(drafts, 1);
}

#[test]
fn chat_host_keeps_slash_answers_while_a_section_is_open() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = AppConfig::default();
    config.documents.output_dir = dir.path().join("drafts");
    let mut host = ChatHost::from_config(&config).expect("host builds");

    host.handle_line("2");
    host.handle_line("2025-06-30");
    assert_eq!(host.session().stage, Stage::AskSection);

    let reply = host.handle_line("/files were shared with the monitoring officer");
    assert_ne!(reply, HostResponse::Quit);
    assert_eq!(
        host.session().answers().get(SECTION_CATALOG[1]),
        Some("/files were shared with the monitoring officer")
    );
    assert_eq!(host.session().section_index(), 2);

    assert_ne!(host.handle_line("/quit"), HostResponse::Quit);
    assert_eq!(host.session().answers().get(SECTION_CATALOG[2]), Some("/quit"));

    let HostResponse::Say(files) = host.handle_line("//files") else {
        panic!("escaped command should answer");
    };
    assert_eq!(files, vec!["No files attached yet.".to_string()]);
    assert_eq!(host.session().section_index(), 3);
    assert_eq!(host.handle_line("//quit"), HostResponse::Quit);
}

#[test]
fn chat_host_rejects_unsupported_attachments_and_quits() {
    let dir = TempDir::new().expect("temp dir");
    let binary = dir.path().join("tool.exe");
    fs::write(&binary, b"MZ").expect("file written");

    let mut config = AppConfig::default();
    config.documents.output_dir = dir.path().join("drafts");
    let mut host = ChatHost::from_config(&config).expect("host builds");

    let attach = host.handle_line(&format!("/attach {}", binary.display()));
    let HostResponse::Say(lines) = attach else {
        panic!("attach should answer");
    };
    assert!(lines[0].starts_with("Not attached"));
    assert_eq!(host.handle_line("/files"), HostResponse::Say(vec!["No files attached yet.".to_string()]));
    assert_eq!(host.handle_line("/quit"), HostResponse::Quit);
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "GRANTBOT_PROJECT_FUNDER",
        "GRANTBOT_PROJECT_LEAD_COMPANY",
        "GRANTBOT_PROJECT_TITLE",
        "GRANTBOT_PROJECT_NUMBER",
        "GRANTBOT_PROJECT_TOTAL_PERIODS",
        "GRANTBOT_CONVERSATION_EMPTY_ANSWERS",
        "GRANTBOT_DOCUMENTS_OUTPUT_DIR",
        "GRANTBOT_DOCUMENTS_ACCESS_TOKEN",
        "GRANTBOT_SERVER_BIND_ADDRESS",
        "GRANTBOT_SERVER_PORT",
        "GRANTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "GRANTBOT_SERVER_SESSION_IDLE_SECS",
        "GRANTBOT_LOGGING_LEVEL",
        "GRANTBOT_LOGGING_FORMAT",
        "GRANTBOT_LOG_LEVEL",
        "GRANTBOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
