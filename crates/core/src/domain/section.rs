use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// One named topic of the quarterly questionnaire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    PeriodEndDate,
    OverallSummary,
    Progress,
    IssuesActions,
    Scope,
    Time,
    Cost,
    Exploitation,
    RiskManagement,
    ProjectPlanning,
    NextQuarterForecast,
}

/// The questionnaire in the order it is asked.
pub const SECTION_CATALOG: [SectionKey; 11] = [
    SectionKey::PeriodEndDate,
    SectionKey::OverallSummary,
    SectionKey::Progress,
    SectionKey::IssuesActions,
    SectionKey::Scope,
    SectionKey::Time,
    SectionKey::Cost,
    SectionKey::Exploitation,
    SectionKey::RiskManagement,
    SectionKey::ProjectPlanning,
    SectionKey::NextQuarterForecast,
];

impl SectionKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PeriodEndDate => "period_end_date",
            Self::OverallSummary => "overall_summary",
            Self::Progress => "progress",
            Self::IssuesActions => "issues_actions",
            Self::Scope => "scope",
            Self::Time => "time",
            Self::Cost => "cost",
            Self::Exploitation => "exploitation",
            Self::RiskManagement => "risk_management",
            Self::ProjectPlanning => "project_planning",
            Self::NextQuarterForecast => "next_quarter_forecast",
        }
    }

    pub fn at(index: usize) -> Option<Self> {
        SECTION_CATALOG.get(index).copied()
    }

    /// Header-only sections are surfaced inline in the report title block
    /// rather than rendered as their own block.
    pub const fn is_header_only(self) -> bool {
        matches!(self, Self::PeriodEndDate)
    }

    /// Sections whose prompt is followed by the upload reminder.
    pub const fn wants_supporting_material(self) -> bool {
        matches!(self, Self::Time | Self::RiskManagement)
    }

    pub fn heading(self) -> String {
        heading_from_key(self.as_str())
    }

    pub fn body_sections() -> impl Iterator<Item = SectionKey> {
        SECTION_CATALOG.iter().copied().filter(|key| !key.is_header_only())
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKey {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        SECTION_CATALOG
            .iter()
            .copied()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownSection(value.to_string()))
    }
}

/// Human-readable label for a snake_case key: `issues_actions` -> `Issues Actions`.
pub fn heading_from_key(key: &str) -> String {
    key.split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{heading_from_key, SectionKey, SECTION_CATALOG};
    use crate::errors::DomainError;

    #[test]
    fn catalog_order_starts_with_header_field_and_ends_with_forecast() {
        assert_eq!(SECTION_CATALOG.first(), Some(&SectionKey::PeriodEndDate));
        assert_eq!(SECTION_CATALOG.last(), Some(&SectionKey::NextQuarterForecast));
        assert_eq!(SectionKey::body_sections().count(), SECTION_CATALOG.len() - 1);
    }

    #[test]
    fn keys_round_trip_through_their_string_form() {
        for key in SECTION_CATALOG {
            assert_eq!(key.as_str().parse::<SectionKey>().expect("catalog key parses"), key);
        }
        assert_eq!(" Risk_Management ".parse::<SectionKey>(), Ok(SectionKey::RiskManagement));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let error = "budget".parse::<SectionKey>().expect_err("budget is not in the catalog");
        assert_eq!(error, DomainError::UnknownSection("budget".to_string()));
    }

    #[test]
    fn headings_are_title_cased() {
        assert_eq!(SectionKey::IssuesActions.heading(), "Issues Actions");
        assert_eq!(SectionKey::NextQuarterForecast.heading(), "Next Quarter Forecast");
        assert_eq!(heading_from_key("risk_MANAGEMENT"), "Risk Management");
        assert_eq!(heading_from_key("__scope__"), "Scope");
    }

    #[test]
    fn reminder_sections_are_time_and_risk() {
        let reminded = SECTION_CATALOG
            .iter()
            .copied()
            .filter(|key| key.wants_supporting_material())
            .collect::<Vec<_>>();
        assert_eq!(reminded, vec![SectionKey::Time, SectionKey::RiskManagement]);
    }
}
