// src/server/transform.rs
//! Listing and download transforms
//!
//! Every call works against one configuration snapshot and one upstream
//! source, so a reload never changes a request halfway through.
//!
//! Renamed projects:
//! - Listings show upstream wheels of the original project that pass the
//!   rule's version filter, with filenames rewritten to the new name
//! - Downloads map the requested filename back to the upstream one, fetch
//!   it in full, rename it on a blocking worker and return the new bytes
//!
//! Projects without a rule pass through: listings keep upstream URLs and
//! hashes, downloads redirect.

use crate::error::{Error, Result};
use crate::hash::{HashAlgorithm, sha256_hex, verify_hex};
use crate::server::cache::{CacheKey, CachedRename, RenameCache};
use crate::server::config::{ProxyConfig, RenameRule};
use crate::server::html::{ListingFile, ProjectListing};
use crate::server::metrics::ProxyMetrics;
use crate::server::upstream::{ArtifactSource, UpstreamArtifact};
use crate::wheel::filename::{WheelFilename, canonical_project_name, is_wheel, same_project};
use crate::wheel::rename::{RenameWarning, rename_wheel};
use axum::body::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An upstream wheel offered under a rule's new name
#[derive(Debug, Clone)]
pub struct RenamedArtifact {
    pub original: WheelFilename,
    pub renamed: WheelFilename,
    pub upstream: UpstreamArtifact,
}

/// Result of a download request
#[derive(Debug, Clone)]
pub enum Download {
    /// Renamed wheel bytes
    Renamed {
        filename: String,
        bytes: Bytes,
        warnings: Vec<RenameWarning>,
        cached: bool,
    },
    /// Pass-through project: fetch from upstream directly
    Redirect(String),
}

impl Download {
    fn from_cache(hit: &CachedRename) -> Self {
        Self::Renamed {
            filename: hit.filename.clone(),
            bytes: hit.bytes.clone(),
            warnings: hit.warnings.clone(),
            cached: true,
        }
    }
}

/// Per-request view of the proxy
pub struct Transform<'a> {
    pub config: &'a ProxyConfig,
    pub source: &'a dyn ArtifactSource,
    pub cache: &'a RenameCache,
    pub metrics: &'a ProxyMetrics,
}

impl<'a> Transform<'a> {
    /// Names served under `/simple/`
    pub fn list_projects(&self) -> Vec<String> {
        self.config.virtual_projects()
    }

    /// Project page for a renamed or pass-through project
    pub async fn list_artifacts(&self, project: &str) -> Result<ProjectListing> {
        match self.config.rule_for(project) {
            Some(rule) => {
                let candidates = self.renamed_candidates(rule).await?;
                if candidates.is_empty() {
                    return Err(Error::NotFound(format!(
                        "No wheels of {} match {}",
                        rule.original, rule.new_name
                    )));
                }

                let files = candidates
                    .into_iter()
                    .map(|candidate| {
                        let filename = candidate.renamed.to_string();
                        ListingFile {
                            url: filename.clone(),
                            filename,
                            // Upstream digests describe the original bytes
                            digest: None,
                            requires_python: candidate.upstream.requires_python,
                        }
                    })
                    .collect();

                Ok(ProjectListing {
                    name: canonical_project_name(&rule.new_name),
                    files,
                })
            }
            None => {
                let artifacts = self.upstream_listing(project).await?;
                if artifacts.is_empty() {
                    return Err(Error::NotFound(format!("Project not found: {}", project)));
                }

                Ok(ProjectListing {
                    name: project.to_string(),
                    files: artifacts
                        .into_iter()
                        .map(|artifact| ListingFile {
                            filename: artifact.filename,
                            url: artifact.url,
                            digest: artifact.digest,
                            requires_python: artifact.requires_python,
                        })
                        .collect(),
                })
            }
        }
    }

    /// Serve one file from a project page
    pub async fn fetch_artifact(&self, project: &str, filename: &str) -> Result<Download> {
        let Some(rule) = self.config.rule_for(project) else {
            let artifacts = self.upstream_listing(project).await?;
            return artifacts
                .into_iter()
                .find(|a| a.filename == filename)
                .map(|a| Download::Redirect(a.url))
                .ok_or_else(|| Error::NotFound(format!("{} not found in {}", filename, project)));
        };

        let requested = WheelFilename::parse(filename)?;
        if !same_project(&requested.distribution, &rule.new_name) {
            return Err(Error::NotFound(format!(
                "{} does not belong to {}",
                filename, rule.new_name
            )));
        }

        let candidate = self
            .renamed_candidates(rule)
            .await?
            .into_iter()
            .find(|c| c.original.same_artifact(&requested))
            .ok_or_else(|| Error::NotFound(format!("No upstream wheel for {}", filename)))?;

        self.rename_candidate(rule, candidate).await
    }

    async fn rename_candidate(&self, rule: &RenameRule, candidate: RenamedArtifact) -> Result<Download> {
        let fingerprint = rule.fingerprint();
        let renamed_filename = candidate.renamed.to_string();

        // A published sha256 lets the cache answer before downloading
        let published_key = candidate
            .upstream
            .digest
            .as_ref()
            .filter(|digest| digest.algorithm == HashAlgorithm::Sha256)
            .map(|digest| CacheKey::new(&digest.hex, &fingerprint));
        if let Some(hit) = published_key.and_then(|key| self.cache.get(&key)) {
            debug!("Cache hit for {}", renamed_filename);
            self.metrics.record_cache_hit();
            return Ok(Download::from_cache(&hit));
        }

        self.metrics.record_upstream_fetch();
        let original_bytes = match self.source.fetch_bytes(&candidate.upstream.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.record_upstream_error();
                return Err(e);
            }
        };

        if let Some(ref digest) = candidate.upstream.digest {
            verify_hex(&original_bytes, &digest.hex, digest.algorithm).map_err(|e| {
                self.metrics.record_upstream_error();
                Error::Upstream(format!("{}: {}", candidate.upstream.filename, e))
            })?;
        }

        let key = CacheKey::new(sha256_hex(&original_bytes), &fingerprint);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Cache hit for {} after download", renamed_filename);
            self.metrics.record_cache_hit();
            return Ok(Download::from_cache(&hit));
        }
        if self.cache.is_enabled() {
            self.metrics.record_cache_miss();
        }

        let request = rule.rename_request();
        let source_filename = candidate.upstream.filename.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            rename_wheel(&original_bytes, &source_filename, &request)
        })
        .await
        .map_err(|e| Error::IoError(format!("Rename task failed: {e}")))?;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to rename {}: {}", candidate.upstream.filename, e);
                self.metrics.record_rename_failure();
                return Err(e);
            }
        };

        info!(
            "Renamed {} -> {} ({} warning(s))",
            candidate.upstream.filename,
            outcome.filename,
            outcome.warnings.len()
        );
        self.metrics.record_rename(outcome.warnings.len());

        let rename = CachedRename {
            filename: outcome.filename,
            bytes: Bytes::from(outcome.bytes),
            warnings: outcome.warnings,
        };
        let download = Download::Renamed {
            filename: rename.filename.clone(),
            bytes: rename.bytes.clone(),
            warnings: rename.warnings.clone(),
            cached: false,
        };
        self.cache.insert(key, Arc::new(rename));
        Ok(download)
    }

    /// Upstream wheels of the rule's original project that the rule serves
    async fn renamed_candidates(&self, rule: &RenameRule) -> Result<Vec<RenamedArtifact>> {
        let artifacts = self.upstream_listing(&rule.original).await?;
        Ok(select_renamed(rule, artifacts))
    }

    async fn upstream_listing(&self, project: &str) -> Result<Vec<UpstreamArtifact>> {
        self.metrics.record_upstream_fetch();
        self.source.list_artifacts(project).await.inspect_err(|e| {
            warn!("Listing {} via {} failed: {}", project, self.source.name(), e);
            self.metrics.record_upstream_error();
        })
    }
}

/// Keep wheels of the original project admitted by the rule, renamed
pub fn select_renamed(rule: &RenameRule, artifacts: Vec<UpstreamArtifact>) -> Vec<RenamedArtifact> {
    artifacts
        .into_iter()
        .filter(|artifact| is_wheel(&artifact.filename))
        .filter_map(|artifact| {
            let original = match WheelFilename::parse(&artifact.filename) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!("Skipping {}: {}", artifact.filename, e);
                    return None;
                }
            };
            if !same_project(&original.distribution, &rule.original) {
                debug!("Skipping {}: not a {} wheel", artifact.filename, rule.original);
                return None;
            }
            if !rule.admits_version(&original.version) {
                debug!("Skipping {}: version filtered out", artifact.filename);
                return None;
            }
            Some(RenamedArtifact {
                renamed: original.with_distribution(&rule.new_name),
                original,
                upstream: artifact,
            })
        })
        .collect()
}
