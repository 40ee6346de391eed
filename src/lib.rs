// src/lib.rs

//! Spare Tire
//!
//! Renames Python wheels so two versions of the same library can be
//! installed side by side under different names, either locally or through
//! a package index proxy that renames on the fly.
//!
//! # Architecture
//!
//! - Archive-first: wheels are decoded into memory, rewritten, re-encoded
//! - All-or-nothing: no output exists until the new archive is complete
//! - Warnings are data: best-effort limits travel in [`RenameOutcome`]
//! - Proxy: PEP 503/691 listings over an immutable, swappable configuration
//! - Download: newest matching wheel from an index, optionally renamed

mod error;
pub mod hash;
pub mod version;
pub mod wheel;

#[cfg(feature = "server")]
pub mod download;
#[cfg(feature = "server")]
pub mod server;

pub use error::{Error, Result};
pub use hash::{HashAlgorithm, RecordDigest};
pub use version::{Version, VersionConstraint, VersionSpecifiers};
pub use wheel::{
    Archive, Entry, RenameOutcome, RenameRequest, RenameWarning, WarningKind, WheelFilename,
    WheelInfo, inspect_wheel, inspect_wheel_file, normalize_name, rename_wheel, rename_wheel_file,
};
