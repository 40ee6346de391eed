// src/wheel/rename.rs

//! Wheel rename engine
//!
//! Rewrites a wheel so that it installs under a different distribution name:
//! the package directory, the `.dist-info` and `.data` directories, the
//! `Name` header, optionally the import statements and mapped dependencies,
//! and finally the RECORD ledger. The operation works on an in-memory copy
//! and only produces output once serialization succeeded, so a failure never
//! leaves a half-written wheel behind.

use crate::error::{Error, Result};
use crate::wheel::archive::{Archive, Entry};
use crate::wheel::extensions::classify_archive;
use crate::wheel::filename::{WheelFilename, normalize_name, validate_name};
use crate::wheel::imports::{ImportRewriter, is_python_source};
use crate::wheel::metadata::{rewrite_metadata, rewrite_top_level};
use crate::wheel::record::{Record, is_ledger_file};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What to rename a wheel to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    pub new_name: String,
    /// Rewrite `import`/`from` statements in package sources
    pub update_imports: bool,
    /// Dependency names to substitute in `Requires-Dist` (old → new)
    pub dependency_renames: BTreeMap<String, String>,
}

impl RenameRequest {
    pub fn new(new_name: impl Into<String>) -> Self {
        Self {
            new_name: new_name.into(),
            update_imports: true,
            dependency_renames: BTreeMap::new(),
        }
    }

    pub fn update_imports(mut self, enabled: bool) -> Self {
        self.update_imports = enabled;
        self
    }

    pub fn rename_dependency(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.dependency_renames.insert(old.into(), new.into());
        self
    }
}

/// Best-effort limitation found while renaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// Compiled module whose init symbol is tied to its public name
    NonRenamableExtension { module: String },
    /// Quoted strings still naming the old package
    UnrewrittenLiteral { count: usize },
    /// Source file that is not UTF-8 and was not scanned for imports
    NonUtf8Source,
    /// Input RECORD row that did not match the archive
    StaleRecord { reason: String },
    /// RECORD signature that cannot survive the rewrite
    DroppedSignature,
    /// No top-level directory matches the distribution name
    MissingPackageDirectory,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonRenamableExtension { module } => write!(
                f,
                "extension module '{}' has no leading underscore and may fail to import after rename",
                module
            ),
            Self::UnrewrittenLiteral { count } => {
                write!(f, "{} string literal(s) still reference the old name", count)
            }
            Self::NonUtf8Source => write!(f, "not valid UTF-8, imports not rewritten"),
            Self::StaleRecord { reason } => write!(f, "input RECORD is stale: {}", reason),
            Self::DroppedSignature => write!(f, "RECORD signature dropped"),
            Self::MissingPackageDirectory => write!(f, "no package directory found"),
        }
    }
}

/// A warning attached to one archive path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameWarning {
    pub entry_path: String,
    pub kind: WarningKind,
}

impl fmt::Display for RenameWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entry_path, self.kind)
    }
}

/// A renamed wheel plus the warnings collected on the way
#[derive(Debug, Clone)]
pub struct RenameOutcome {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub warnings: Vec<RenameWarning>,
}

/// `.data` subdirectories that hold importable packages
const DATA_LIB_SCHEMES: [&str; 2] = ["purelib", "platlib"];

/// Directory mapping from the old layout to the new one
struct Layout {
    old_package: Option<String>,
    new_package: String,
    old_dist_info: String,
    new_dist_info: String,
    old_data: String,
    new_data: String,
}

impl Layout {
    /// New path for an entry, or `None` if it does not move
    fn relocate(&self, path: &str) -> Option<String> {
        if let Some(moved) = swap_prefix(path, &self.old_dist_info, &self.new_dist_info) {
            return Some(moved);
        }
        if let Some(moved) = swap_prefix(path, &self.old_data, &self.new_data) {
            if let Some(old_package) = self.old_package.as_deref() {
                for scheme in DATA_LIB_SCHEMES {
                    let old = format!("{}/{}/{}", self.new_data, scheme, old_package);
                    let new = format!("{}/{}/{}", self.new_data, scheme, self.new_package);
                    if let Some(inner) = swap_prefix(&moved, &old, &new) {
                        return Some(inner);
                    }
                }
            }
            return Some(moved);
        }
        let old_package = self.old_package.as_deref()?;
        swap_prefix(path, old_package, &self.new_package)
    }

    /// Whether a relocated path lies inside the package directory
    fn in_package(&self, path: &str) -> bool {
        let top = format!("{}/", self.new_package);
        path.starts_with(&top)
            || DATA_LIB_SCHEMES
                .iter()
                .any(|scheme| path.starts_with(&format!("{}/{}/{}", self.new_data, scheme, top)))
    }
}

/// Replace a leading path component sequence, matching whole components only
fn swap_prefix(path: &str, old: &str, new: &str) -> Option<String> {
    if path == old {
        return Some(new.to_string());
    }
    let rest = path.strip_prefix(old)?;
    rest.starts_with('/').then(|| format!("{}{}", new, rest))
}

/// Locate the single top-level `*.dist-info` directory holding METADATA
pub(crate) fn find_dist_info(archive: &Archive) -> Result<String> {
    let mut found: Vec<&str> = archive
        .iter()
        .filter_map(|entry| {
            let (dir, file) = entry.path.split_once('/')?;
            (dir.ends_with(".dist-info") && file == "METADATA").then_some(dir)
        })
        .collect();
    found.dedup();

    match found.as_slice() {
        [dir] => Ok(dir.to_string()),
        [] => Err(Error::corrupt("<archive>", "no .dist-info/METADATA found")),
        _ => Err(Error::corrupt(
            "<archive>",
            format!("multiple .dist-info directories: {}", found.join(", ")),
        )),
    }
}

/// Find the package directory for a normalized distribution name
///
/// Looks at top-level directories and at the importable trees inside the
/// `.data` directory.
fn find_package_dir(archive: &Archive, normalized: &str, data_dir: &str) -> Option<String> {
    archive
        .iter()
        .filter_map(|entry| {
            let path = entry.path.as_str();
            let inner = DATA_LIB_SCHEMES
                .iter()
                .find_map(|scheme| path.strip_prefix(format!("{}/{}/", data_dir, scheme).as_str()));
            inner.unwrap_or(path).split_once('/').map(|(top, _)| top)
        })
        .find(|top| {
            !top.ends_with(".dist-info") && !top.ends_with(".data") && normalize_name(top) == normalized
        })
        .map(str::to_string)
}

/// Rename a wheel held in memory
///
/// `source_filename` is the wheel's file name (no directory), used to keep
/// the version, build and compatibility tags in the output name.
pub fn rename_wheel(bytes: &[u8], source_filename: &str, request: &RenameRequest) -> Result<RenameOutcome> {
    let new_name = validate_name(&request.new_name)?;
    let identity = WheelFilename::parse(source_filename)?;
    let archive = Archive::load(bytes)?;

    let old_dist_info = find_dist_info(&archive)?;
    let metadata_path = format!("{}/METADATA", old_dist_info);
    let stem = old_dist_info.trim_end_matches(".dist-info");
    let (old_dir_name, version) = stem
        .rsplit_once('-')
        .ok_or_else(|| Error::corrupt(&metadata_path, "dist-info directory has no version"))?;

    let old_name = normalize_name(old_dir_name);
    if old_name != normalize_name(&identity.distribution) {
        return Err(Error::corrupt(
            &metadata_path,
            format!(
                "dist-info name '{}' does not match filename distribution '{}'",
                old_dir_name, identity.distribution
            ),
        ));
    }

    let old_data = format!("{}.data", stem);
    let layout = Layout {
        old_package: find_package_dir(&archive, &old_name, &old_data),
        new_package: new_name.clone(),
        new_dist_info: format!("{}-{}.dist-info", new_name, version),
        new_data: format!("{}-{}.data", new_name, version),
        old_data,
        old_dist_info,
    };

    let mut warnings = Vec::new();
    let mut add_warning = |entry_path: &str, kind: WarningKind| {
        warn!("{}: {}", entry_path, kind);
        warnings.push(RenameWarning {
            entry_path: entry_path.to_string(),
            kind,
        });
    };

    if layout.old_package.is_none() {
        add_warning(&format!("{}/", old_name), WarningKind::MissingPackageDirectory);
    }

    let old_record_path = format!("{}/RECORD", layout.old_dist_info);
    if let Some(entry) = archive.get(&old_record_path) {
        match Record::parse(&entry.data, &old_record_path) {
            Ok(record) => {
                for issue in record.verify(&archive, &old_record_path) {
                    add_warning(
                        issue.path(),
                        WarningKind::StaleRecord {
                            reason: issue.to_string(),
                        },
                    );
                }
            }
            Err(e) => add_warning(&old_record_path, WarningKind::StaleRecord { reason: e.to_string() }),
        }
    }

    for ext in classify_archive(&archive) {
        if ext.renamable {
            debug!("Extension {} is renamable", ext.path);
        } else {
            add_warning(
                &ext.path,
                WarningKind::NonRenamableExtension {
                    module: ext.module_name,
                },
            );
        }
    }

    let rewriter = match (&layout.old_package, request.update_imports) {
        (Some(old_package), true) => Some(ImportRewriter::new(old_package, &new_name)?),
        _ => None,
    };
    let renaming = layout.old_package.as_deref() != Some(new_name.as_str());

    let new_metadata_path = format!("{}/METADATA", layout.new_dist_info);
    let new_top_level_path = format!("{}/top_level.txt", layout.new_dist_info);
    let new_record_path = format!("{}/RECORD", layout.new_dist_info);

    let mut output = Archive::new();
    let mut record_slot: Option<(usize, Entry)> = None;

    for entry in archive.iter() {
        if is_ledger_file(&entry.path, &old_record_path) {
            if entry.path == old_record_path {
                record_slot = Some((output.len(), entry.clone()));
            } else {
                add_warning(&entry.path, WarningKind::DroppedSignature);
            }
            continue;
        }

        let mut entry = entry.clone();
        if let Some(path) = layout.relocate(&entry.path) {
            debug!("Relocating {} -> {}", entry.path, path);
            entry.path = path;
        }

        if entry.path == new_metadata_path {
            entry.data = rewrite_metadata(
                &entry.data,
                &entry.path,
                &new_name,
                &request.dependency_renames,
            )?;
        } else if entry.path == new_top_level_path {
            if let Some(old_package) = layout.old_package.as_deref() {
                if let Some(data) = rewrite_top_level(&entry.data, old_package, &new_name) {
                    entry.data = data;
                }
            }
        } else if let Some(rewriter) = rewriter.as_ref().filter(|_| layout.in_package(&entry.path)) {
            if is_python_source(&entry.path) {
                match std::str::from_utf8(&entry.data) {
                    Ok(source) => {
                        let result = rewriter.rewrite(source);
                        if result.changed() {
                            debug!("Rewrote {} import(s) in {}", result.replacements, entry.path);
                            entry.data = result.text.into_bytes();
                        }
                        if renaming && result.leftover_literals > 0 {
                            add_warning(
                                &entry.path,
                                WarningKind::UnrewrittenLiteral {
                                    count: result.leftover_literals,
                                },
                            );
                        }
                    }
                    Err(_) => add_warning(&entry.path, WarningKind::NonUtf8Source),
                }
            }
        }

        output.push(entry)?;
    }

    // The ledger keeps the slot and attributes of the one it replaces
    let data = Record::rebuild(&output, &new_record_path).to_bytes();
    match record_slot {
        Some((index, template)) => output.insert(
            index,
            Entry {
                path: new_record_path,
                data,
                ..template
            },
        )?,
        None => output.push(Entry::file(new_record_path, data))?,
    }

    let bytes = output.serialize()?;
    let filename = identity.with_distribution(&new_name).to_string();

    info!(
        "Renamed {} -> {} ({} entries, {} warnings)",
        source_filename,
        filename,
        output.len(),
        warnings.len()
    );

    Ok(RenameOutcome {
        bytes,
        filename,
        warnings,
    })
}

/// Rename a wheel on disk, writing the result into `output_dir`
///
/// Defaults to the input's directory. The output is written to a temporary
/// file in the destination and moved into place only when complete.
pub fn rename_wheel_file(
    path: &Path,
    request: &RenameRequest,
    output_dir: Option<&Path>,
) -> Result<(PathBuf, RenameOutcome)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidWheelFilename(path.display().to_string()))?;

    // Reject a bad name before reading potentially large input
    validate_name(&request.new_name)?;

    let bytes = std::fs::read(path)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    let outcome = rename_wheel(&bytes, file_name, request)?;

    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let destination = write_wheel(&dir, &outcome.filename, &outcome.bytes)?;
    Ok((destination, outcome))
}

/// Write wheel bytes to `dir/filename` through a temp file in the same directory
pub fn write_wheel(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::IoError(format!("Failed to create {}: {}", dir.display(), e)))?;

    let destination = dir.join(filename);
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(&destination)
        .map_err(|e| Error::IoError(format!("Failed to write {}: {}", destination.display(), e)))?;
    Ok(destination)
}
