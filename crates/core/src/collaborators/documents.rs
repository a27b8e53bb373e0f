use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::debug;

use crate::collaborators::{DocumentError, DocumentService};

/// Writes each report as `<sanitized title>.md` under one directory.
#[derive(Clone, Debug)]
pub struct LocalDocumentStore {
    output_dir: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Claims the first free `<stem>.md`, `<stem> (2).md`, ... with
    /// `create_new` and writes the body into it.
    fn write_new(&self, stem: &str, body: &str) -> Result<(String, PathBuf), DocumentError> {
        let mut title = stem.to_string();
        let mut copy = 2;
        loop {
            let path = self.output_dir.join(format!("{title}.md"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(body.as_bytes())
                        .map_err(|source| DocumentError::Write { path: path.clone(), source })?;
                    return Ok((title, path));
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                    title = format!("{stem} ({copy})");
                    copy += 1;
                }
                Err(source) => return Err(DocumentError::Write { path, source }),
            }
        }
    }
}

impl DocumentService for LocalDocumentStore {
    fn create_document(&self, title_hint: &str, body: &str) -> Result<String, DocumentError> {
        let stem = sanitize_title(title_hint);
        if stem.is_empty() {
            return Err(DocumentError::UnusableTitle(title_hint.to_string()));
        }

        fs::create_dir_all(&self.output_dir)
            .map_err(|source| DocumentError::Write { path: self.output_dir.clone(), source })?;
        let (title, path) = self.write_new(&stem, body)?;

        debug!(path = %path.display(), bytes = body.len(), "draft written");
        Ok(title)
    }
}

/// Keeps letters, digits, spaces and `-_.()`; anything else becomes `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, ' ' | '-' | '_' | '.' | '(' | ')') {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches(|ch: char| ch.is_whitespace() || ch == '.')
        .to_string()
}

/// Keeps documents in memory; can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct RecordingDocumentStore {
    documents: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingDocumentStore {
    pub fn failing() -> Self {
        Self { documents: Mutex::default(), failing: AtomicBool::new(true) }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// `(title, body)` pairs in creation order.
    pub fn documents(&self) -> Vec<(String, String)> {
        match self.documents.lock() {
            Ok(documents) => documents.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DocumentService for RecordingDocumentStore {
    fn create_document(&self, title_hint: &str, body: &str) -> Result<String, DocumentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DocumentError::Rejected("recording store is set to fail".to_string()));
        }

        let entry = (title_hint.to_string(), body.to_string());
        match self.documents.lock() {
            Ok(mut documents) => documents.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        Ok(title_hint.to_string())
    }
}
