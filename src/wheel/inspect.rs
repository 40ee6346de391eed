// src/wheel/inspect.rs

//! Read-only wheel inspection
//!
//! Summarizes what a rename would have to deal with: identity, extension
//! modules and whether they survive a rename, and the state of the RECORD.

use crate::error::{Error, Result};
use crate::wheel::archive::Archive;
use crate::wheel::extensions::{ExtensionClassification, classify_archive};
use crate::wheel::filename::WheelFilename;
use crate::wheel::metadata::Metadata;
use crate::wheel::record::Record;
use crate::wheel::rename::find_dist_info;
use serde::Serialize;
use std::path::Path;

/// State of the RECORD ledger
#[derive(Debug, Clone, Serialize)]
pub struct RecordStatus {
    pub present: bool,
    pub rows: usize,
    pub issues: Vec<String>,
}

impl RecordStatus {
    pub fn is_consistent(&self) -> bool {
        self.present && self.issues.is_empty()
    }
}

/// Inspection report for one wheel
#[derive(Debug, Clone, Serialize)]
pub struct WheelInfo {
    pub filename: String,
    pub distribution: String,
    pub version: String,
    pub build: Option<String>,
    pub python_tag: String,
    pub abi_tag: String,
    pub platform_tag: String,
    pub metadata_name: Option<String>,
    pub metadata_version: Option<String>,
    pub requires_dist: Vec<String>,
    pub files: Vec<String>,
    pub extensions: Vec<ExtensionClassification>,
    pub has_underscore_prefix_extension: bool,
    pub record: RecordStatus,
}

impl WheelInfo {
    /// Extensions that would trigger a rename warning
    pub fn non_renamable_extensions(&self) -> impl Iterator<Item = &ExtensionClassification> {
        self.extensions.iter().filter(|e| !e.renamable)
    }
}

/// Inspect a wheel held in memory
pub fn inspect_wheel(bytes: &[u8], filename: &str) -> Result<WheelInfo> {
    let identity = WheelFilename::parse(filename)?;
    let archive = Archive::load(bytes)?;
    let dist_info = find_dist_info(&archive)?;

    let metadata_path = format!("{}/METADATA", dist_info);
    let metadata = match archive.get(&metadata_path) {
        Some(entry) => Some(Metadata::parse(&entry.data, &metadata_path)?),
        None => None,
    };

    let record_path = format!("{}/RECORD", dist_info);
    let record = match archive.get(&record_path) {
        Some(entry) => match Record::parse(&entry.data, &record_path) {
            Ok(record) => RecordStatus {
                present: true,
                rows: record.len(),
                issues: record
                    .verify(&archive, &record_path)
                    .iter()
                    .map(|issue| issue.to_string())
                    .collect(),
            },
            Err(e) => RecordStatus {
                present: true,
                rows: 0,
                issues: vec![e.to_string()],
            },
        },
        None => RecordStatus {
            present: false,
            rows: 0,
            issues: Vec::new(),
        },
    };

    let extensions = classify_archive(&archive);
    let has_underscore_prefix_extension = extensions.iter().any(|e| e.renamable);

    Ok(WheelInfo {
        filename: filename.to_string(),
        distribution: identity.distribution,
        version: identity.version,
        build: identity.build,
        python_tag: identity.python_tag,
        abi_tag: identity.abi_tag,
        platform_tag: identity.platform_tag,
        metadata_name: metadata.as_ref().and_then(|m| m.name()).map(str::to_string),
        metadata_version: metadata.as_ref().and_then(|m| m.version()).map(str::to_string),
        requires_dist: metadata
            .as_ref()
            .map(|m| m.requires_dist().into_iter().map(str::to_string).collect())
            .unwrap_or_default(),
        files: archive.iter().map(|e| e.path.clone()).collect(),
        extensions,
        has_underscore_prefix_extension,
        record,
    })
}

/// Inspect a wheel on disk
pub fn inspect_wheel_file(path: &Path) -> Result<WheelInfo> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidWheelFilename(path.display().to_string()))?;
    let bytes = std::fs::read(path)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    inspect_wheel(&bytes, filename)
}
