// src/wheel/record.rs

//! RECORD ledger parsing, verification and regeneration
//!
//! Each line is a CSV row `path,algorithm=digest,size`. The RECORD file lists
//! itself with empty hash and size, and signature files next to it
//! (`RECORD.jws`, `RECORD.p7s`) are never listed.

use crate::error::{Error, Result};
use crate::hash::RecordDigest;
use crate::wheel::archive::Archive;
use std::collections::HashSet;
use std::fmt;

/// Signature files that may sit next to RECORD
pub const SIGNATURE_SUFFIXES: [&str; 2] = [".jws", ".p7s"];

/// One row of a RECORD file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub path: String,
    pub digest: Option<RecordDigest>,
    pub size: Option<u64>,
}

impl RecordEntry {
    /// Row describing `data` stored at `path`
    pub fn for_data(path: impl Into<String>, data: &[u8]) -> Self {
        Self {
            path: path.into(),
            digest: Some(RecordDigest::sha256(data)),
            size: Some(data.len() as u64),
        }
    }
}

/// Problems found when checking a RECORD against archive contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordIssue {
    /// Digest or size disagrees with the entry bytes
    Mismatch { path: String },
    /// Archive entry with no RECORD row
    Unlisted { path: String },
    /// RECORD row naming an entry the archive does not have
    Missing { path: String },
}

impl RecordIssue {
    pub fn path(&self) -> &str {
        match self {
            Self::Mismatch { path } | Self::Unlisted { path } | Self::Missing { path } => path,
        }
    }
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { path } => write!(f, "{}: digest or size does not match", path),
            Self::Unlisted { path } => write!(f, "{}: not listed in RECORD", path),
            Self::Missing { path } => write!(f, "{}: listed in RECORD but not in archive", path),
        }
    }
}

/// A parsed or regenerated RECORD file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<RecordEntry>,
}

impl Record {
    /// Parse RECORD bytes; `path` names the file in errors
    pub fn parse(content: &[u8], path: &str) -> Result<Self> {
        let text = std::str::from_utf8(content)
            .map_err(|e| Error::corrupt(path, format!("not valid UTF-8: {}", e)))?;

        let mut entries = Vec::new();
        for (line_no, row) in parse_csv(text).into_iter().enumerate() {
            if row.iter().all(|field| field.is_empty()) {
                continue;
            }
            let bad_row = |why: &str| Error::corrupt(path, format!("line {}: {}", line_no + 1, why));

            let file = row.first().cloned().unwrap_or_default();
            if file.is_empty() {
                return Err(bad_row("empty path"));
            }

            let digest = match row.get(1).map(String::as_str) {
                None | Some("") => None,
                Some(hash) => Some(RecordDigest::parse(hash).map_err(|e| bad_row(&e.to_string()))?),
            };
            let size = match row.get(2).map(String::as_str) {
                None | Some("") => None,
                Some(size) => Some(size.parse::<u64>().map_err(|_| bad_row("invalid size"))?),
            };

            entries.push(RecordEntry {
                path: file,
                digest,
                size,
            });
        }

        Ok(Self { entries })
    }

    /// Regenerate a RECORD from the final archive contents
    ///
    /// Every file entry gets a SHA-256 row in archive order; directories,
    /// the RECORD itself and its signatures are skipped, then the RECORD's
    /// own `path,,` row is appended.
    pub fn rebuild(archive: &Archive, record_path: &str) -> Self {
        let mut entries: Vec<RecordEntry> = archive
            .iter()
            .filter(|entry| !entry.is_dir() && !is_ledger_file(&entry.path, record_path))
            .map(|entry| RecordEntry::for_data(&entry.path, &entry.data))
            .collect();

        entries.push(RecordEntry {
            path: record_path.to_string(),
            digest: None,
            size: None,
        });

        Self { entries }
    }

    /// Check every row against the archive
    pub fn verify(&self, archive: &Archive, record_path: &str) -> Vec<RecordIssue> {
        let mut issues = Vec::new();
        let mut listed = HashSet::new();

        for row in &self.entries {
            listed.insert(row.path.as_str());
            if row.path == record_path {
                continue;
            }
            let Some(entry) = archive.get(&row.path) else {
                issues.push(RecordIssue::Missing {
                    path: row.path.clone(),
                });
                continue;
            };

            let digest_ok = row.digest.as_ref().is_none_or(|d| d.matches(&entry.data));
            let size_ok = row.size.is_none_or(|s| s == entry.data.len() as u64);
            if !digest_ok || !size_ok {
                issues.push(RecordIssue::Mismatch {
                    path: row.path.clone(),
                });
            }
        }

        for entry in archive.iter() {
            if entry.is_dir() || is_ledger_file(&entry.path, record_path) {
                continue;
            }
            if !listed.contains(entry.path.as_str()) {
                issues.push(RecordIssue::Unlisted {
                    path: entry.path.clone(),
                });
            }
        }

        issues
    }

    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&RecordEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.entries {
            let digest = row.digest.as_ref().map(|d| d.to_string()).unwrap_or_default();
            let size = row.size.map(|s| s.to_string()).unwrap_or_default();
            writeln!(f, "{},{},{}", csv_field(&row.path), digest, size)?;
        }
        Ok(())
    }
}

/// Whether `path` is the RECORD at `record_path` or one of its signatures
pub fn is_ledger_file(path: &str, record_path: &str) -> bool {
    path == record_path
        || SIGNATURE_SUFFIXES
            .iter()
            .any(|suffix| path.strip_suffix(suffix) == Some(record_path))
}

/// Quote a CSV field if it needs it
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Minimal RFC 4180 reader: quoted fields, doubled quotes, CRLF or LF rows
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wheel::archive::Entry;

    const RECORD_PATH: &str = "pkg-1.0.dist-info/RECORD";

    fn archive() -> Archive {
        let mut archive = Archive::new();
        archive.push(Entry::directory("pkg/")).unwrap();
        archive.push(Entry::file("pkg/__init__.py", b"".to_vec())).unwrap();
        archive.push(Entry::file("pkg/a,b.txt", b"comma".to_vec())).unwrap();
        archive
            .push(Entry::file("pkg-1.0.dist-info/METADATA", b"Name: pkg\n".to_vec()))
            .unwrap();
        archive.push(Entry::file(RECORD_PATH, Vec::new())).unwrap();
        archive
            .push(Entry::file("pkg-1.0.dist-info/RECORD.jws", b"sig".to_vec()))
            .unwrap();
        archive
    }

    #[test]
    fn test_rebuild_lists_every_file_once() {
        let record = Record::rebuild(&archive(), RECORD_PATH);
        let paths: Vec<&str> = record.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "pkg/__init__.py",
                "pkg/a,b.txt",
                "pkg-1.0.dist-info/METADATA",
                RECORD_PATH
            ]
        );

        let text = record.to_string();
        assert!(text.starts_with(
            "pkg/__init__.py,sha256=47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU,0\n"
        ));
        assert!(text.contains("\"pkg/a,b.txt\",sha256="));
        assert!(text.ends_with("pkg-1.0.dist-info/RECORD,,\n"));
    }

    #[test]
    fn test_parse_rebuilt_record() {
        let record = Record::rebuild(&archive(), RECORD_PATH);
        let parsed = Record::parse(&record.to_bytes(), RECORD_PATH).unwrap();
        assert_eq!(parsed, record);
        assert!(parsed.verify(&archive(), RECORD_PATH).is_empty());
    }

    #[test]
    fn test_verify_reports_problems() {
        let text = "pkg/__init__.py,sha256=47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU,1\r\n\
pkg/gone.py,,\r\n\
pkg-1.0.dist-info/METADATA,,\r\n\
pkg-1.0.dist-info/RECORD,,\r\n";
        let record = Record::parse(text.as_bytes(), RECORD_PATH).unwrap();
        let issues = record.verify(&archive(), RECORD_PATH);

        assert!(issues.contains(&RecordIssue::Mismatch {
            path: "pkg/__init__.py".into()
        }));
        assert!(issues.contains(&RecordIssue::Missing {
            path: "pkg/gone.py".into()
        }));
        assert!(issues.contains(&RecordIssue::Unlisted {
            path: "pkg/a,b.txt".into()
        }));
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn test_parse_rejects_bad_rows() {
        assert!(Record::parse(b"pkg/a.py,sha256=short,3\n", RECORD_PATH).is_err());
        assert!(Record::parse(b"pkg/a.py,,notanumber\n", RECORD_PATH).is_err());
        assert!(Record::parse(b",,\n", RECORD_PATH).unwrap().is_empty());
    }

    #[test]
    fn test_quoted_fields() {
        let rows = parse_csv("\"a \"\"quoted\"\" path\",x,1\nplain,,\n");
        assert_eq!(rows[0][0], "a \"quoted\" path");
        assert_eq!(rows[1], vec!["plain", "", ""]);
        assert_eq!(csv_field("a \"b\""), "\"a \"\"b\"\"\"");
    }

    #[test]
    fn test_ledger_files() {
        assert!(is_ledger_file(RECORD_PATH, RECORD_PATH));
        assert!(is_ledger_file("pkg-1.0.dist-info/RECORD.p7s", RECORD_PATH));
        assert!(!is_ledger_file("pkg-1.0.dist-info/METADATA", RECORD_PATH));
    }
}
