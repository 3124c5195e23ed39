//! Portable JSON import/export of the whole store.
//!
//! Export is a snapshot `{ medications: [...], shots: [...] }`. Import reads
//! one or more uploaded files; each document replaces the collections it
//! carries, with every record given a fresh identifier.

use crate::{Error, Medication, Result, Shot};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const JSON_EXTENSION: &str = "json";

/// The portable document, arrays rather than keyed maps
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ExportDocument {
    pub medications: Vec<Medication>,
    pub shots: Vec<Shot>,
}

/// One uploaded document; each key is optional but at least one is required
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ImportDocument {
    #[serde(default)]
    pub medications: Option<Vec<Medication>>,
    #[serde(default)]
    pub shots: Option<Vec<Shot>>,
}

impl ImportDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let document: ImportDocument = serde_json::from_str(text)?;
        if document.medications.is_none() && document.shots.is_none() {
            return Err(Error::Import(
                "document has neither \"shots\" nor \"medications\"".into(),
            ));
        }
        Ok(document)
    }

    /// Replace every identifier in the document with a new one
    ///
    /// Identifiers coming from a file are never trusted: they could collide
    /// with, and silently overwrite, records already in the store.
    pub fn with_fresh_ids(mut self) -> Self {
        for medication in self.medications.iter_mut().flatten() {
            medication.uuid = Some(Uuid::new_v4());
        }
        for shot in self.shots.iter_mut().flatten() {
            shot.uuid = Some(Uuid::new_v4());
        }
        self
    }
}

/// Result of reading and parsing one uploaded file
#[derive(Debug)]
pub struct Upload {
    pub path: PathBuf,
    pub document: Result<ImportDocument>,
}

/// What importing one file changed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Medications now in the store, if the file carried the key
    pub medications: Option<usize>,
    pub shots: Option<usize>,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<ImportSummary>,
}

/// Per-file outcomes of an import batch, in input order
#[derive(Debug, Default)]
pub struct ImportReport {
    pub files: Vec<FileOutcome>,
}

impl ImportReport {
    pub fn applied(&self) -> usize {
        self.files.iter().filter(|f| f.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.result.is_err())
    }
}

/// `<YYYYMMDD-HHmm>-<suffix>.json` in the clock's own time zone
pub fn export_filename<Tz>(now: &DateTime<Tz>, suffix: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{}-{}.{}", now.format("%Y%m%d-%H%M"), suffix, JSON_EXTENSION)
}

/// Serialize with two-space indentation
pub fn encode_export(document: &ExportDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Write the export into `dir`, creating it if needed
pub fn write_export(document: &ExportDocument, dir: &Path, filename: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    std::fs::write(&path, encode_export(document)?)?;
    tracing::info!(
        "Exported {} medications and {} shots to {:?}",
        document.medications.len(),
        document.shots.len(),
        path
    );
    Ok(path)
}

/// Read and parse every file concurrently
///
/// Results come back in input order. A failure in one file never affects
/// the others.
pub fn read_uploads(paths: &[PathBuf]) -> Vec<Upload> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| scope.spawn(move || read_upload(path)))
            .collect();

        handles
            .into_iter()
            .zip(paths)
            .map(|(handle, path)| Upload {
                path: path.clone(),
                document: handle.join().unwrap_or_else(|_| {
                    Err(Error::Import(format!("reader for {:?} panicked", path)))
                }),
            })
            .collect()
    })
}

fn read_upload(path: &Path) -> Result<ImportDocument> {
    if !is_json_file(path) {
        return Err(Error::UnsupportedFile(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    ImportDocument::parse(&text)
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(JSON_EXTENSION))
        .unwrap_or(false)
}
