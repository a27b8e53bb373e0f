use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::section::{SectionKey, SECTION_CATALOG};
use crate::errors::DomainError;

/// Free-text answers keyed by catalog section.
///
/// Keys are typed, so the sheet can never hold a section outside the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSheet(BTreeMap<SectionKey, String>);

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sheet from loosely typed keys, rejecting any key the catalog does not know.
    pub fn from_raw<I, K, V>(entries: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut sheet = Self::new();
        for (key, value) in entries {
            let section = key.as_ref().parse::<SectionKey>()?;
            sheet.record(section, value);
        }
        Ok(sheet)
    }

    pub fn record(&mut self, section: SectionKey, text: impl Into<String>) {
        self.0.insert(section, text.into());
    }

    pub fn get(&self, section: SectionKey) -> Option<&str> {
        self.0.get(&section).map(String::as_str)
    }

    /// The stored answer, or `None` when absent or blank.
    pub fn non_empty(&self, section: SectionKey) -> Option<&str> {
        self.get(section).filter(|text| !text.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionKey, &str)> {
        self.0.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Catalog sections without a usable answer, in catalog order.
    pub fn empty_sections(&self) -> Vec<SectionKey> {
        SECTION_CATALOG.iter().copied().filter(|key| self.non_empty(*key).is_none()).collect()
    }
}
