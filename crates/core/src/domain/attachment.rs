use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File extensions the conversation accepts as supporting material.
pub const ACCEPTED_EXTENSIONS: [&str; 5] = ["pdf", "docx", "xlsx", "png", "jpg"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub name: String,
    pub size_bytes: u64,
    pub content_type: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("attachment name must not be empty")]
    MissingName,
    #[error("`{name}` is not an accepted file type (accepted: pdf, docx, xlsx, png, jpg)")]
    UnsupportedType { name: String },
}

/// Metadata of files uploaded during a session. File contents are never held here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentLedger {
    entries: BTreeMap<String, AttachmentInfo>,
}

impl AttachmentLedger {
    /// Records an upload; re-uploading the same name replaces the earlier entry.
    pub fn record(
        &mut self,
        name: &str,
        size_bytes: u64,
        content_type: Option<&str>,
    ) -> Result<&AttachmentInfo, AttachmentError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AttachmentError::MissingName);
        }
        let guessed = content_type_for(name)
            .ok_or_else(|| AttachmentError::UnsupportedType { name: name.to_string() })?;
        let content_type = content_type
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(guessed)
            .to_string();

        let info = AttachmentInfo {
            name: name.to_string(),
            size_bytes,
            content_type,
            recorded_at: Utc::now(),
        };
        self.entries.insert(info.name.clone(), info);
        Ok(&self.entries[name])
    }

    pub fn get(&self, name: &str) -> Option<&AttachmentInfo> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttachmentInfo> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// MIME type for an accepted file name, `None` for anything else.
pub fn content_type_for(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "docx" => {
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        }
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "png" => Some("image/png"),
        "jpg" => Some("image/jpeg"),
        _ => None,
    }
}
