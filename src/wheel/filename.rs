// src/wheel/filename.rs

//! Wheel filenames and distribution names
//!
//! A wheel filename encodes the package identity:
//! `{distribution}-{version}(-{build})?-{python}-{abi}-{platform}.whl`
//! The distribution component is always the escaped (normalized) name, so
//! after a rename the filename, the package directory and the metadata
//! directory all share the same spelling.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

const WHEEL_SUFFIX: &str = ".whl";

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9._-]*[A-Za-z0-9])$").expect("name regex is valid")
});

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("separator regex is valid"));

/// Whether `name` is a valid distribution name
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Escaped distribution name as used in filenames and directories
///
/// Runs of `-`, `_` and `.` collapse to a single `_`, then lowercase:
/// `Foo.Bar--baz` → `foo_bar_baz`.
pub fn normalize_name(name: &str) -> String {
    SEPARATOR_RE.replace_all(name, "_").to_lowercase()
}

/// PEP 503 project name as used in `/simple/{project}/` URLs
///
/// Same as [`normalize_name`] but with `-` as separator.
pub fn canonical_project_name(name: &str) -> String {
    SEPARATOR_RE.replace_all(name, "-").to_lowercase()
}

/// Whether two names refer to the same project
pub fn same_project(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}

/// Validate a distribution name and return its escaped form
pub fn validate_name(name: &str) -> Result<String> {
    if is_valid_name(name) {
        Ok(normalize_name(name))
    } else {
        Err(Error::InvalidDistributionName(name.to_string()))
    }
}

/// Whether a filename looks like a wheel
pub fn is_wheel(filename: &str) -> bool {
    filename.ends_with(WHEEL_SUFFIX)
}

/// Parsed wheel filename
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WheelFilename {
    pub distribution: String,
    pub version: String,
    pub build: Option<String>,
    pub python_tag: String,
    pub abi_tag: String,
    pub platform_tag: String,
}

impl WheelFilename {
    /// Parse a wheel filename
    ///
    /// A path prefix is not accepted; pass the file name only.
    pub fn parse(filename: &str) -> Result<Self> {
        let invalid = || Error::InvalidWheelFilename(filename.to_string());

        let stem = filename.strip_suffix(WHEEL_SUFFIX).ok_or_else(invalid)?;
        if stem.contains('/') {
            return Err(invalid());
        }

        let parts: Vec<&str> = stem.split('-').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let (build, tags) = match parts.len() {
            5 => (None, &parts[2..]),
            6 => {
                if !parts[2].starts_with(|c: char| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                (Some(parts[2].to_string()), &parts[3..])
            }
            _ => return Err(invalid()),
        };

        if !is_valid_name(parts[0]) {
            return Err(invalid());
        }

        Ok(Self {
            distribution: parts[0].to_string(),
            version: parts[1].to_string(),
            build,
            python_tag: tags[0].to_string(),
            abi_tag: tags[1].to_string(),
            platform_tag: tags[2].to_string(),
        })
    }

    /// Same identity under another distribution name (escaped)
    pub fn with_distribution(&self, name: &str) -> Self {
        Self {
            distribution: normalize_name(name),
            ..self.clone()
        }
    }

    /// Whether version, build and tags are identical
    pub fn same_artifact(&self, other: &Self) -> bool {
        self.version == other.version
            && self.build == other.build
            && self.python_tag == other.python_tag
            && self.abi_tag == other.abi_tag
            && self.platform_tag == other.platform_tag
    }

    /// `{name}-{version}.dist-info` for the escaped distribution
    pub fn dist_info_dir(&self) -> String {
        format!("{}-{}.dist-info", normalize_name(&self.distribution), self.version)
    }
}

impl fmt::Display for WheelFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.distribution, self.version)?;
        if let Some(ref build) = self.build {
            write!(f, "-{}", build)?;
        }
        write!(
            f,
            "-{}-{}-{}{}",
            self.python_tag, self.abi_tag, self.platform_tag, WHEEL_SUFFIX
        )
    }
}

impl FromStr for WheelFilename {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Foo.Bar--baz"), "foo_bar_baz");
        assert_eq!(normalize_name("icechunk_v1"), "icechunk_v1");
        assert_eq!(normalize_name("Zarr"), "zarr");
        assert_eq!(canonical_project_name("Foo_Bar.baz"), "foo-bar-baz");
        assert!(same_project("pkg-v1", "PKG_v1"));
    }

    #[test]
    fn test_name_validity() {
        assert!(is_valid_name("a"));
        assert!(is_valid_name("pkg_v1"));
        assert!(is_valid_name("zope.interface"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("_private"));
        assert!(!is_valid_name("trailing-"));
        assert!(!is_valid_name("has space"));
        assert!(matches!(
            validate_name("bad name"),
            Err(Error::InvalidDistributionName(_))
        ));
        assert_eq!(validate_name("Pkg.V1").unwrap(), "pkg_v1");
    }

    #[test]
    fn test_parse_basic() {
        let wheel = WheelFilename::parse("icechunk-1.0.0-cp312-cp312-manylinux_2_17_x86_64.whl")
            .unwrap();
        assert_eq!(wheel.distribution, "icechunk");
        assert_eq!(wheel.version, "1.0.0");
        assert_eq!(wheel.build, None);
        assert_eq!(wheel.python_tag, "cp312");
        assert_eq!(wheel.abi_tag, "cp312");
        assert_eq!(wheel.platform_tag, "manylinux_2_17_x86_64");
        assert_eq!(wheel.dist_info_dir(), "icechunk-1.0.0.dist-info");
    }

    #[test]
    fn test_parse_build_tag() {
        let wheel = WheelFilename::parse("pkg-2.0-1local-py3-none-any.whl").unwrap();
        assert_eq!(wheel.build.as_deref(), Some("1local"));
        assert_eq!(wheel.to_string(), "pkg-2.0-1local-py3-none-any.whl");

        assert!(WheelFilename::parse("pkg-2.0-local-py3-none-any.whl").is_err());
    }

    #[test]
    fn test_parse_invalid() {
        for name in [
            "pkg-1.0.tar.gz",
            "pkg-1.0-py3-none.whl",
            "pkg--1.0-py3-none-any.whl",
            "dir/pkg-1.0-py3-none-any.whl",
            "pkg-1.0-1-2-py3-none-any.whl",
        ] {
            assert!(
                matches!(WheelFilename::parse(name), Err(Error::InvalidWheelFilename(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_with_distribution_keeps_tags() {
        let wheel = WheelFilename::parse("pkg-1.9-py3-none-any.whl").unwrap();
        let renamed = wheel.with_distribution("Pkg-V1");
        assert_eq!(renamed.to_string(), "pkg_v1-1.9-py3-none-any.whl");
        assert!(renamed.same_artifact(&wheel));
        assert!(!renamed.same_artifact(&WheelFilename::parse("pkg-2.5-py3-none-any.whl").unwrap()));
    }
}
