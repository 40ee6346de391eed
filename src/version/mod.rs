// src/version/mod.rs

//! Version handling and specifier matching for wheel filtering
//!
//! Implements the subset of PEP 440 that proxy rename rules need: parsing
//! and ordering of public versions (with local labels) and specifier sets
//! such as `<2`, `>=1.0,<2`, `~=1.4.2` or `==1.*`. Pre-releases are always
//! admitted, matching how the proxy treats nightly indexes.

use crate::error::{Error, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Pre-release phase, ordered alpha < beta < release candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
    Alpha,
    Beta,
    Rc,
}

impl PreRelease {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::Rc => "rc",
        }
    }
}

/// A parsed PEP 440 version
///
/// Format: `[N!]N(.N)*[{a|b|rc}N][.postN][.devN][+local]`, with the usual
/// alternate spellings (`alpha`, `-1` post releases, `v` prefix) normalized.
#[derive(Debug, Clone)]
pub struct Version {
    pub epoch: u64,
    pub release: Vec<u64>,
    pub pre: Option<(PreRelease, u64)>,
    pub post: Option<u64>,
    pub dev: Option<u64>,
    pub local: Option<String>,
}

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^
        v?
        (?:(?P<epoch>[0-9]+)!)?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?:[-_.]?(?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)[-_.]?(?P<pre_n>[0-9]+)?)?
        (?:(?:-(?P<post_n1>[0-9]+))|(?:[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?))?
        (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>[0-9]+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        $",
    )
    .expect("version regex is valid")
});

impl Version {
    /// Parse a version string
    ///
    /// Examples:
    /// - "1.2.3" → release=[1,2,3]
    /// - "1!2.0" → epoch=1, release=[2,0]
    /// - "2.0.0rc1" → pre=(Rc, 1)
    /// - "1.0.post2.dev3+ubuntu.1" → post=2, dev=3, local="ubuntu.1"
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let caps = VERSION_RE
            .captures(s)
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))?;

        let number = |name: &str| -> Result<Option<u64>> {
            caps.name(name)
                .map(|m| {
                    m.as_str()
                        .parse::<u64>()
                        .map_err(|e| Error::InvalidVersion(format!("{}: {}", s, e)))
                })
                .transpose()
        };

        let epoch = number("epoch")?.unwrap_or(0);

        let release = caps["release"]
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|e| Error::InvalidVersion(format!("{}: {}", s, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let pre = match caps.name("pre_l") {
            Some(label) => {
                let phase = match label.as_str().to_lowercase().as_str() {
                    "a" | "alpha" => PreRelease::Alpha,
                    "b" | "beta" => PreRelease::Beta,
                    _ => PreRelease::Rc,
                };
                Some((phase, number("pre_n")?.unwrap_or(0)))
            }
            None => None,
        };

        let post = if caps.name("post_n1").is_some() {
            number("post_n1")?
        } else if caps.name("post_l").is_some() {
            Some(number("post_n2")?.unwrap_or(0))
        } else {
            None
        };

        let dev = if caps.name("dev_l").is_some() {
            Some(number("dev_n")?.unwrap_or(0))
        } else {
            None
        };

        let local = caps.name("local").map(|m| m.as_str().to_lowercase().replace(['-', '_'], "."));

        Ok(Self {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// Whether this is a pre-release or development release
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// Whether this is a post-release
    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    /// The version with its local label removed
    pub fn public(&self) -> Self {
        Self {
            local: None,
            ..self.clone()
        }
    }

    /// Release segment with trailing zeros removed, used for comparison
    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.release[..end]
    }

    /// Ordering key for the pre-release slot
    ///
    /// A dev release without a pre or post segment sorts before any
    /// pre-release of the same release (1.0.dev0 < 1.0a0).
    fn pre_key(&self) -> (i8, Option<(PreRelease, u64)>) {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (-1, None),
            (Some(pre), _, _) => (0, Some(pre)),
            (None, _, _) => (1, None),
        }
    }

    fn post_key(&self) -> (i8, u64) {
        match self.post {
            None => (-1, 0),
            Some(n) => (0, n),
        }
    }

    fn dev_key(&self) -> (i8, u64) {
        match self.dev {
            Some(n) => (0, n),
            None => (1, 0),
        }
    }

    /// Compare two versions
    pub fn compare(&self, other: &Version) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| compare_local(self.local.as_deref(), other.local.as_deref()))
    }
}

/// Local labels: absent sorts first; numeric segments beat alphanumeric ones
fn compare_local(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let seg_a: Vec<&str> = a.split('.').collect();
            let seg_b: Vec<&str> = b.split('.').collect();
            for (x, y) in seg_a.iter().zip(seg_b.iter()) {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    (Ok(_), Err(_)) => Ordering::Greater,
                    (Err(_), Ok(_)) => Ordering::Less,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            seg_a.len().cmp(&seg_b.len())
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", release.join("."))?;
        if let Some((phase, n)) = self.pre {
            write!(f, "{}{}", phase.as_str(), n)?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{}", n)?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{}", n)?;
        }
        if let Some(ref local) = self.local {
            write!(f, "+{}", local)?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Version constraint operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// `~=V`: at least V, same prefix minus the last release component
    Compatible(Version),
    /// `==V`
    Exact(Version),
    /// `==V.*`: release prefix match
    Prefix(Vec<u64>),
    /// `!=V`
    NotEqual(Version),
    /// `!=V.*`
    NotPrefix(Vec<u64>),
    /// `>V`
    GreaterThan(Version),
    /// `>=V`
    GreaterOrEqual(Version),
    /// `<V`
    LessThan(Version),
    /// `<=V`
    LessOrEqual(Version),
    /// `===V`: exact string match
    Arbitrary(String),
}

impl VersionConstraint {
    /// Parse a single specifier clause
    ///
    /// Examples:
    /// - ">= 1.2.3" → GreaterOrEqual(1.2.3)
    /// - "<2" → LessThan(2)
    /// - "==1.4.*" → Prefix([1, 4])
    /// - "~=2.2" → Compatible(2.2)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidSpecifier(s.to_string());

        let ops = ["===", "~=", "==", "!=", "<=", ">=", "<", ">"];
        let op = ops
            .iter()
            .find(|op| s.starts_with(**op))
            .ok_or_else(invalid)?;
        let rest = s[op.len()..].trim();
        if rest.is_empty() {
            return Err(invalid());
        }

        let parse_version = |v: &str| Version::parse(v).map_err(|_| invalid());

        match *op {
            "===" => Ok(Self::Arbitrary(rest.to_string())),
            "~=" => {
                let v = parse_version(rest)?;
                if v.release.len() < 2 {
                    return Err(invalid());
                }
                Ok(Self::Compatible(v))
            }
            "==" | "!=" => {
                if let Some(prefix) = rest.strip_suffix(".*") {
                    let v = parse_version(prefix)?;
                    if *op == "==" {
                        Ok(Self::Prefix(v.release))
                    } else {
                        Ok(Self::NotPrefix(v.release))
                    }
                } else if *op == "==" {
                    Ok(Self::Exact(parse_version(rest)?))
                } else {
                    Ok(Self::NotEqual(parse_version(rest)?))
                }
            }
            "<=" => Ok(Self::LessOrEqual(parse_version(rest)?)),
            ">=" => Ok(Self::GreaterOrEqual(parse_version(rest)?)),
            "<" => Ok(Self::LessThan(parse_version(rest)?)),
            ">" => Ok(Self::GreaterThan(parse_version(rest)?)),
            _ => Err(invalid()),
        }
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            Self::Compatible(v) => {
                let prefix = &v.release[..v.release.len() - 1];
                version >= v && release_starts_with(&version.release, prefix)
            }
            Self::Exact(v) => {
                if v.local.is_some() {
                    version == v
                } else {
                    version.public() == *v
                }
            }
            Self::Prefix(prefix) => release_starts_with(&version.release, prefix),
            Self::NotEqual(v) => !Self::Exact(v.clone()).satisfies(version),
            Self::NotPrefix(prefix) => !release_starts_with(&version.release, prefix),
            Self::GreaterThan(v) => {
                let version = version.public();
                // >V never admits post-releases of V itself
                if !v.is_postrelease()
                    && version.is_postrelease()
                    && version.trimmed_release() == v.trimmed_release()
                    && version.epoch == v.epoch
                    && version.pre == v.pre
                {
                    return false;
                }
                version > *v
            }
            Self::GreaterOrEqual(v) => version.public() >= *v,
            Self::LessThan(v) => {
                // <V never admits pre-releases of V itself
                if !v.is_prerelease()
                    && version.is_prerelease()
                    && version.epoch == v.epoch
                    && version.trimmed_release() == v.trimmed_release()
                {
                    return false;
                }
                version.public() < *v
            }
            Self::LessOrEqual(v) => version.public() <= *v,
            Self::Arbitrary(s) => version.to_string().eq_ignore_ascii_case(s),
        }
    }
}

/// Release prefix comparison with implicit zero padding (`1` matches `1.0.*`)
fn release_starts_with(release: &[u64], prefix: &[u64]) -> bool {
    prefix
        .iter()
        .enumerate()
        .all(|(i, p)| release.get(i).copied().unwrap_or(0) == *p)
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |r: &[u64]| r.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(".");
        match self {
            Self::Compatible(v) => write!(f, "~={}", v),
            Self::Exact(v) => write!(f, "=={}", v),
            Self::Prefix(r) => write!(f, "=={}.*", join(r)),
            Self::NotEqual(v) => write!(f, "!={}", v),
            Self::NotPrefix(r) => write!(f, "!={}.*", join(r)),
            Self::GreaterThan(v) => write!(f, ">{}", v),
            Self::GreaterOrEqual(v) => write!(f, ">={}", v),
            Self::LessThan(v) => write!(f, "<{}", v),
            Self::LessOrEqual(v) => write!(f, "<={}", v),
            Self::Arbitrary(s) => write!(f, "==={}", s),
        }
    }
}

/// Comma-separated conjunction of constraints (e.g. ">=1.0, <2")
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionSpecifiers {
    constraints: Vec<VersionConstraint>,
}

impl VersionSpecifiers {
    /// Parse a specifier set; an empty string or `*` admits every version
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::default());
        }

        let constraints = s
            .split(',')
            .map(VersionConstraint::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { constraints })
    }

    /// Check if a version satisfies every constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| c.satisfies(version))
    }

    /// Parse `version` and check it; unparseable versions never match
    pub fn matches_str(&self, version: &str) -> bool {
        Version::parse(version).is_ok_and(|v| self.satisfies(&v))
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl fmt::Display for VersionSpecifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_parse_simple() {
        let ver = v("1.2.3");
        assert_eq!(ver.epoch, 0);
        assert_eq!(ver.release, vec![1, 2, 3]);
        assert!(ver.pre.is_none());
        assert!(!ver.is_prerelease());
    }

    #[test]
    fn test_version_parse_full() {
        let ver = v("1!2.0rc1.post2.dev3+Ubuntu-1");
        assert_eq!(ver.epoch, 1);
        assert_eq!(ver.release, vec![2, 0]);
        assert_eq!(ver.pre, Some((PreRelease::Rc, 1)));
        assert_eq!(ver.post, Some(2));
        assert_eq!(ver.dev, Some(3));
        assert_eq!(ver.local.as_deref(), Some("ubuntu.1"));
        assert_eq!(ver.to_string(), "1!2.0rc1.post2.dev3+ubuntu.1");
    }

    #[test]
    fn test_version_parse_alternate_spellings() {
        assert_eq!(v("1.0-alpha.2").pre, Some((PreRelease::Alpha, 2)));
        assert_eq!(v("1.0beta").pre, Some((PreRelease::Beta, 0)));
        assert_eq!(v("1.0c1").pre, Some((PreRelease::Rc, 1)));
        assert_eq!(v("1.0-1").post, Some(1));
        assert_eq!(v("v2.1").release, vec![2, 1]);
        assert_eq!(v("1.0.dev").dev, Some(0));
    }

    #[test]
    fn test_version_parse_invalid() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("not-a-version").is_err());
        assert!(Version::parse("1.0+").is_err());
    }

    #[test]
    fn test_version_ordering() {
        let ordered = [
            "1.0.dev0", "1.0a1", "1.0a2.dev1", "1.0a2", "1.0b1", "1.0rc1", "1.0", "1.0+local",
            "1.0.post1", "1.1", "2!0.1",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_version_trailing_zeros_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("2"), v("2.0.0.0"));
    }

    #[test]
    fn test_constraint_less_than_excludes_own_prereleases() {
        let c = VersionConstraint::parse("<2.0").unwrap();
        assert!(c.satisfies(&v("1.9")));
        assert!(c.satisfies(&v("1.9rc1")));
        assert!(!c.satisfies(&v("2.0rc1")));
        assert!(!c.satisfies(&v("2.0")));
        assert!(!c.satisfies(&v("2.5")));
    }

    #[test]
    fn test_constraint_greater_than_excludes_own_postreleases() {
        let c = VersionConstraint::parse(">1.0").unwrap();
        assert!(!c.satisfies(&v("1.0.post1")));
        assert!(c.satisfies(&v("1.1")));
    }

    #[test]
    fn test_constraint_prefix() {
        let c = VersionConstraint::parse("==1.4.*").unwrap();
        assert!(c.satisfies(&v("1.4")));
        assert!(c.satisfies(&v("1.4.7")));
        assert!(!c.satisfies(&v("1.5")));

        let not = VersionConstraint::parse("!=1.4.*").unwrap();
        assert!(not.satisfies(&v("1.5")));
    }

    #[test]
    fn test_constraint_compatible() {
        let c = VersionConstraint::parse("~=2.2").unwrap();
        assert!(c.satisfies(&v("2.2")));
        assert!(c.satisfies(&v("2.9")));
        assert!(!c.satisfies(&v("3.0")));
        assert!(VersionConstraint::parse("~=2").is_err());
    }

    #[test]
    fn test_constraint_exact_ignores_local() {
        let c = VersionConstraint::parse("== 1.0").unwrap();
        assert!(c.satisfies(&v("1.0+cpu")));
        assert!(!c.satisfies(&v("1.0.1")));
    }

    #[test]
    fn test_specifier_set() {
        let spec = VersionSpecifiers::parse(">=1.0, <2").unwrap();
        assert!(spec.matches_str("1.5.0"));
        assert!(!spec.matches_str("2.0.0"));
        assert!(!spec.matches_str("0.9"));
        assert!(!spec.matches_str("garbage"));
        assert_eq!(spec.to_string(), ">=1.0,<2");
    }

    #[test]
    fn test_specifier_set_any() {
        let spec = VersionSpecifiers::parse("").unwrap();
        assert!(spec.is_empty());
        assert!(spec.matches_str("99.99"));
    }

    #[test]
    fn test_specifier_invalid() {
        assert!(VersionSpecifiers::parse("2.0").is_err());
        assert!(VersionSpecifiers::parse("<").is_err());
        assert!(VersionSpecifiers::parse(">=abc").is_err());
    }
}
