use serde::{Deserialize, Serialize};

use crate::config::ProjectConfig;

/// Identifiers printed in the report header and document title.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub funder: String,
    pub lead_company: String,
    pub title: String,
    pub number: String,
    pub total_periods: u32,
}

impl From<&ProjectConfig> for ProjectMetadata {
    fn from(config: &ProjectConfig) -> Self {
        Self {
            funder: config.funder.clone(),
            lead_company: config.lead_company.clone(),
            title: config.title.clone(),
            number: config.number.clone(),
            total_periods: config.total_periods,
        }
    }
}
