// src/wheel/mod.rs

//! Wheel rewriting
//!
//! The rename pipeline, leaf to root:
//! - [`archive`]: ZIP container held in memory
//! - [`filename`]: wheel filenames and distribution name rules
//! - [`metadata`]: `METADATA` header rewriting
//! - [`imports`]: import statement rewriting in sources
//! - [`extensions`]: compiled module classification
//! - [`record`]: RECORD ledger regeneration
//! - [`rename`]: the engine tying them together
//!
//! [`inspect`] reports on a wheel without changing it.

pub mod archive;
pub mod extensions;
pub mod filename;
pub mod imports;
pub mod inspect;
pub mod metadata;
pub mod record;
pub mod rename;

pub use archive::{Archive, CompressionMethod, DosDateTime, Entry};
pub use extensions::ExtensionClassification;
pub use filename::{WheelFilename, canonical_project_name, is_valid_name, normalize_name, same_project};
pub use inspect::{WheelInfo, inspect_wheel, inspect_wheel_file};
pub use record::{Record, RecordEntry, RecordIssue};
pub use rename::{RenameOutcome, RenameRequest, RenameWarning, WarningKind, rename_wheel, rename_wheel_file};
