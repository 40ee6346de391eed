// src/download.rs

//! Wheel download from a simple index
//!
//! Lists a project's wheels on one index, picks the newest version admitted
//! by an optional specifier and writes it to disk, optionally renamed on the
//! way. Within one version a pure `none-any` wheel is preferred over
//! platform wheels; interpreter and platform tags are not matched against
//! the running system.

use crate::error::{Error, Result};
use crate::hash::verify_hex;
use crate::server::upstream::{ArtifactSource, UpstreamArtifact};
use crate::version::{Version, VersionSpecifiers};
use crate::wheel::filename::{WheelFilename, is_wheel, same_project, validate_name};
use crate::wheel::rename::{RenameRequest, RenameWarning, rename_wheel, write_wheel};
use std::cmp::Ordering;
use std::path::PathBuf;
use tracing::{debug, info};

/// A wheel offered by the index for the requested project
#[derive(Debug, Clone)]
pub struct AvailableWheel {
    pub filename: WheelFilename,
    pub version: Version,
    pub artifact: UpstreamArtifact,
}

impl AvailableWheel {
    /// Pure Python wheel (`*-none-any`)
    pub fn is_pure(&self) -> bool {
        self.filename.abi_tag == "none" && self.filename.platform_tag == "any"
    }
}

/// Newest version first, then pure before platform wheels, then by filename
fn preference(a: &AvailableWheel, b: &AvailableWheel) -> Ordering {
    b.version
        .cmp(&a.version)
        .then(b.is_pure().cmp(&a.is_pure()))
        .then_with(|| a.artifact.filename.cmp(&b.artifact.filename))
}

/// Wheels of `project` among the listed artifacts, in preference order
pub fn available_wheels(project: &str, artifacts: Vec<UpstreamArtifact>) -> Vec<AvailableWheel> {
    let mut wheels: Vec<AvailableWheel> = artifacts
        .into_iter()
        .filter(|artifact| is_wheel(&artifact.filename))
        .filter_map(|artifact| {
            let filename = match WheelFilename::parse(&artifact.filename) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!("Skipping {}: {}", artifact.filename, e);
                    return None;
                }
            };
            if !same_project(&filename.distribution, project) {
                debug!("Skipping {}: not a {} wheel", artifact.filename, project);
                return None;
            }
            let version = match Version::parse(&filename.version) {
                Ok(version) => version,
                Err(e) => {
                    debug!("Skipping {}: {}", artifact.filename, e);
                    return None;
                }
            };
            Some(AvailableWheel {
                filename,
                version,
                artifact,
            })
        })
        .collect();

    wheels.sort_by(preference);
    wheels
}

/// Best wheel admitted by `specifiers` (all wheels when `None`)
pub fn select_wheel<'a>(
    wheels: &'a [AvailableWheel],
    specifiers: Option<&VersionSpecifiers>,
) -> Option<&'a AvailableWheel> {
    wheels
        .iter()
        .filter(|wheel| specifiers.is_none_or(|spec| spec.satisfies(&wheel.version)))
        .min_by(|a, b| preference(a, b))
}

/// What to download and where to put it
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub project: String,
    pub specifiers: Option<VersionSpecifiers>,
    /// Rename the wheel before writing it; only the renamed wheel is written
    pub rename: Option<RenameRequest>,
    pub output_dir: PathBuf,
}

impl DownloadRequest {
    pub fn new(project: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            specifiers: None,
            rename: None,
            output_dir: output_dir.into(),
        }
    }

    pub fn specifiers(mut self, specifiers: VersionSpecifiers) -> Self {
        self.specifiers = Some(specifiers);
        self
    }

    pub fn rename(mut self, request: RenameRequest) -> Self {
        self.rename = Some(request);
        self
    }
}

/// Result of a completed download
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// File written to the output directory
    pub path: PathBuf,
    /// Upstream filename that was downloaded
    pub source_filename: String,
    /// Rename warnings, empty when no rename was requested
    pub warnings: Vec<RenameWarning>,
}

/// Download the best matching wheel of a project from `source`
pub async fn download_wheel(source: &dyn ArtifactSource, request: &DownloadRequest) -> Result<DownloadOutcome> {
    if let Some(ref rename) = request.rename {
        validate_name(&rename.new_name)?;
    }

    let artifacts = source.list_artifacts(&request.project).await?;
    let wheels = available_wheels(&request.project, artifacts);
    if wheels.is_empty() {
        return Err(Error::NotFound(format!("No wheels found for {}", request.project)));
    }

    let chosen = select_wheel(&wheels, request.specifiers.as_ref()).ok_or_else(|| {
        let spec = request
            .specifiers
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        Error::NotFound(format!("No wheels of {} match {}", request.project, spec))
    })?;
    let source_filename = chosen.artifact.filename.clone();

    info!("Downloading {} from {}", source_filename, source.name());
    let bytes = source.fetch_bytes(&chosen.artifact.url).await?;
    if let Some(ref digest) = chosen.artifact.digest {
        verify_hex(&bytes, &digest.hex, digest.algorithm)
            .map_err(|e| Error::Upstream(format!("{}: {}", source_filename, e)))?;
    }

    let Some(ref rename) = request.rename else {
        let path = write_wheel(&request.output_dir, &source_filename, &bytes)?;
        return Ok(DownloadOutcome {
            path,
            source_filename,
            warnings: Vec::new(),
        });
    };

    let rename = rename.clone();
    let filename = source_filename.clone();
    let outcome = tokio::task::spawn_blocking(move || rename_wheel(&bytes, &filename, &rename))
        .await
        .map_err(|e| Error::IoError(format!("Rename task failed: {e}")))??;

    let path = write_wheel(&request.output_dir, &outcome.filename, &outcome.bytes)?;
    info!("Renamed {} -> {}", source_filename, outcome.filename);
    Ok(DownloadOutcome {
        path,
        source_filename,
        warnings: outcome.warnings,
    })
}
