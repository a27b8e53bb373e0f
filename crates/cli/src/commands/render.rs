use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use grantbot_core::domain::answers::AnswerSheet;
use grantbot_core::domain::period::ReportingPeriod;
use grantbot_core::domain::project::ProjectMetadata;
use grantbot_core::report::assemble;

use crate::commands::{load_config, CommandResult};

/// Prints the assembled body as-is; failures are reported as JSON outcomes.
pub fn run(config_path: Option<PathBuf>, period: u32, answers_path: &Path) -> CommandResult {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("render", "config_validation", error.to_string(), 2)
        }
    };
    let project = ProjectMetadata::from(&config.project);

    let period = match ReportingPeriod::new(period, project.total_periods) {
        Ok(period) => period,
        Err(error) => return CommandResult::failure("render", "invalid_period", error.to_string(), 3),
    };

    match read_answers(answers_path) {
        Ok(answers) => CommandResult { exit_code: 0, output: assemble(period, &answers, &project) },
        Err(error) => CommandResult::failure("render", "invalid_answers", format!("{error:#}"), 4),
    }
}

pub fn read_answers(path: &Path) -> anyhow::Result<AnswerSheet> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read answer file `{}`", path.display()))?;
    let entries = toml::from_str::<BTreeMap<String, String>>(&raw)
        .with_context(|| format!("answer file `{}` must map section keys to text", path.display()))?;
    Ok(AnswerSheet::from_raw(entries)?)
}
