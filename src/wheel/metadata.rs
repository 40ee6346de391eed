// src/wheel/metadata.rs

//! Core metadata (`METADATA`) reading and rewriting
//!
//! The file is an RFC 822 style header block followed by an optional body
//! (usually the long description). Only the header block is ever touched,
//! and only two fields: `Name` and `Requires-Dist`. Every other line,
//! including fields this code has never heard of, is copied byte for byte.

use crate::error::{Error, Result};
use crate::wheel::filename::normalize_name;
use std::collections::BTreeMap;
use tracing::debug;

/// Parsed header block of a METADATA file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    headers: Vec<(String, String)>,
}

impl Metadata {
    /// Parse the header block; continuation lines are folded into their field
    pub fn parse(content: &[u8], path: &str) -> Result<Self> {
        let text = decode(content, path)?;
        let mut headers: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push('\n');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                headers.push((key.trim().to_string(), value.trim().to_string()));
            }
        }

        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("name")) {
            return Err(Error::MissingNameField {
                path: path.to_string(),
            });
        }

        Ok(Self { headers })
    }

    /// First value of a field (case-insensitive key)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a repeated field
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.get("Name")
    }

    pub fn version(&self) -> Option<&str> {
        self.get("Version")
    }

    pub fn requires_dist(&self) -> Vec<&str> {
        self.get_all("Requires-Dist").collect()
    }
}

/// Rewrite `Name` and mapped `Requires-Dist` headers
///
/// `path` is the archive path of the file, used in errors.
pub fn rewrite_metadata(
    content: &[u8],
    path: &str,
    new_name: &str,
    dependency_renames: &BTreeMap<String, String>,
) -> Result<Vec<u8>> {
    let text = decode(content, path)?;
    let renames: BTreeMap<String, &str> = dependency_renames
        .iter()
        .map(|(old, new)| (normalize_name(old), new.as_str()))
        .collect();

    let mut out = String::with_capacity(text.len() + 16);
    let mut in_headers = true;
    let mut saw_name = false;

    for line in text.split_inclusive('\n') {
        if !in_headers {
            out.push_str(line);
            continue;
        }

        let (body, eol) = split_line_ending(line);
        if body.is_empty() {
            in_headers = false;
            out.push_str(line);
            continue;
        }

        match body.split_once(':') {
            Some((key, _)) if !body.starts_with([' ', '\t']) && key.eq_ignore_ascii_case("name") => {
                saw_name = true;
                out.push_str(key);
                out.push_str(": ");
                out.push_str(new_name);
                out.push_str(eol);
            }
            Some((key, value))
                if !body.starts_with([' ', '\t'])
                    && key.eq_ignore_ascii_case("requires-dist")
                    && !renames.is_empty() =>
            {
                match rename_requirement(value, &renames) {
                    Some(rewritten) => {
                        debug!("Rewrote dependency in {}: {} -> {}", path, value.trim(), rewritten.trim());
                        out.push_str(key);
                        out.push(':');
                        out.push_str(&rewritten);
                        out.push_str(eol);
                    }
                    None => out.push_str(line),
                }
            }
            _ => out.push_str(line),
        }
    }

    if !saw_name {
        return Err(Error::MissingNameField {
            path: path.to_string(),
        });
    }

    Ok(out.into_bytes())
}

/// Replace the name token of a requirement if it is mapped
///
/// `value` is everything after the colon, leading whitespace included; the
/// extras, version clause and marker are kept verbatim.
fn rename_requirement(value: &str, renames: &BTreeMap<String, &str>) -> Option<String> {
    let leading = value.len() - value.trim_start().len();
    let rest = &value[leading..];
    let token_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(rest.len());
    let token = rest[..token_len].trim_end_matches(['-', '_', '.']);
    if token.is_empty() {
        return None;
    }

    let replacement = renames.get(&normalize_name(token))?;
    Some(format!(
        "{}{}{}",
        &value[..leading],
        replacement,
        &rest[token.len()..]
    ))
}

/// Rewrite `top_level.txt`, replacing lines naming the old import package
///
/// Returns `None` when nothing changed or the file is not UTF-8.
pub fn rewrite_top_level(content: &[u8], old: &str, new: &str) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(content).ok()?;
    let mut changed = false;
    let mut out = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let (body, eol) = split_line_ending(line);
        if body.trim() == old {
            changed = true;
            out.push_str(new);
            out.push_str(eol);
        } else {
            out.push_str(line);
        }
    }

    changed.then(|| out.into_bytes())
}

fn decode<'a>(content: &'a [u8], path: &str) -> Result<&'a str> {
    std::str::from_utf8(content).map_err(|e| Error::corrupt(path, format!("not valid UTF-8: {}", e)))
}

/// Split a line into its text and its `\n` / `\r\n` terminator
fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Metadata-Version: 2.1\n\
Name: Foo\n\
Version: 1.0\n\
Requires-Dist: bar (>=1.0)\n\
Requires-Dist: baz[extra]>=2; python_version < \"3.11\"\n\
Requires-Dist: qux\n\
X-Future-Field: keep me\n\
\n\
Name: this line is in the body\n";

    fn renames(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_rewrites_name_only_in_headers() {
        let out = rewrite_metadata(SAMPLE.as_bytes(), "foo-1.0.dist-info/METADATA", "foo_v1", &BTreeMap::new()).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("\nName: foo_v1\n"));
        assert!(out.ends_with("\nName: this line is in the body\n"));
        assert!(out.contains("X-Future-Field: keep me\n"));
    }

    #[test]
    fn test_dependency_rename_keeps_constraint() {
        let map = renames(&[("bar", "bar_v1"), ("BAZ", "baz_v2")]);
        let out = rewrite_metadata(SAMPLE.as_bytes(), "METADATA", "foo", &map).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Requires-Dist: bar_v1 (>=1.0)\n"));
        assert!(out.contains("Requires-Dist: baz_v2[extra]>=2; python_version < \"3.11\"\n"));
        // Unmapped dependency is byte-identical
        assert!(out.contains("Requires-Dist: qux\n"));
    }

    #[test]
    fn test_dependency_rename_matches_whole_name() {
        let map = renames(&[("foo", "foo_v1")]);
        let input = b"Name: x\nRequires-Dist: foo (>=1.0)\nRequires-Dist: foobar\n";
        let out = rewrite_metadata(input, "METADATA", "x", &map).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Name: x\nRequires-Dist: foo_v1 (>=1.0)\nRequires-Dist: foobar\n"
        );
    }

    #[test]
    fn test_preserves_crlf() {
        let input = b"Name: old\r\nVersion: 1\r\n\r\nbody\r\n";
        let out = rewrite_metadata(input, "METADATA", "new", &BTreeMap::new()).unwrap();
        assert_eq!(out, b"Name: new\r\nVersion: 1\r\n\r\nbody\r\n");
    }

    #[test]
    fn test_missing_name_field() {
        let err = rewrite_metadata(b"Version: 1.0\n", "pkg-1.0.dist-info/METADATA", "x", &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::MissingNameField { ref path } if path == "pkg-1.0.dist-info/METADATA"));
        assert!(Metadata::parse(b"Version: 1.0\n", "METADATA").is_err());
    }

    #[test]
    fn test_non_utf8_is_corrupt() {
        let err = rewrite_metadata(b"Name: \xff\n", "METADATA", "x", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::CorruptArchive { .. }));
    }

    #[test]
    fn test_parse_headers() {
        let meta = Metadata::parse(SAMPLE.as_bytes(), "METADATA").unwrap();
        assert_eq!(meta.name(), Some("Foo"));
        assert_eq!(meta.version(), Some("1.0"));
        assert_eq!(meta.requires_dist().len(), 3);
        assert_eq!(meta.get("x-future-field"), Some("keep me"));
    }

    #[test]
    fn test_rewrite_top_level() {
        let out = rewrite_top_level(b"foo\nfoo_extra\n", "foo", "foo_v1").unwrap();
        assert_eq!(out, b"foo_v1\nfoo_extra\n");
        assert!(rewrite_top_level(b"other\n", "foo", "foo_v1").is_none());
    }
}
