//! Report body and document title assembly.

use chrono::{DateTime, Utc};

use crate::domain::answers::AnswerSheet;
use crate::domain::period::ReportingPeriod;
use crate::domain::project::ProjectMetadata;
use crate::domain::section::SectionKey;

pub const NO_DATA_PLACEHOLDER: &str = "*No data entered*";
pub const MISSING_END_DATE: &str = "N/A";

const TITLE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";

/// Builds the report body. Output depends only on the arguments.
pub fn assemble(
    period: ReportingPeriod,
    answers: &AnswerSheet,
    project: &ProjectMetadata,
) -> String {
    let end_date = answers.non_empty(SectionKey::PeriodEndDate).unwrap_or(MISSING_END_DATE);

    let mut lines = vec![
        format!("# {} Quarterly Report - Q{period}", project.funder),
        String::new(),
        format!("**Project:** {} ({})", project.title, project.number),
        format!("**Lead Company:** {}", project.lead_company),
        format!("**Quarter End Date:** {}", end_date.trim()),
        String::new(),
        "---".to_string(),
    ];

    for section in SectionKey::body_sections() {
        lines.push(format!("## {}", section.heading()));
        lines.push(String::new());
        lines.push(answers.non_empty(section).unwrap_or(NO_DATA_PLACEHOLDER).to_string());
        lines.push(String::new());
        lines.push("---".to_string());
    }

    let mut body = lines.join("\n");
    body.push('\n');
    body
}

/// `"{funder} Q{period} Report - {number} - Draft {YYYYMMDD_HHMM}"`.
pub fn document_title(
    project: &ProjectMetadata,
    period: ReportingPeriod,
    generated_at: DateTime<Utc>,
) -> String {
    format!(
        "{} Q{period} Report - {} - Draft {}",
        project.funder,
        project.number,
        generated_at.format(TITLE_TIMESTAMP_FORMAT)
    )
}
