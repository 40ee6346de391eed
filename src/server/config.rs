// src/server/config.rs
//! Configuration file parsing for the proxy server
//!
//! Supports TOML configuration files with the following sections:
//! - [proxy] - Bind address, upstream indexes, timeouts, result cache
//! - [renames] - Rename rules keyed by original distribution name
//!
//! Command line flags override the file; see [`ConfigOverrides`].

use crate::hash::sha256_hex;
use crate::version::VersionSpecifiers;
use crate::wheel::filename::{is_valid_name, normalize_name};
use crate::wheel::rename::RenameRequest;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct ProxyFile {
    /// Proxy settings
    #[serde(default)]
    pub proxy: ProxySection,

    /// Rename rules: `original = "new"` or `original = { name = "new", ... }`
    #[serde(default)]
    pub renames: BTreeMap<String, RenameEntry>,
}

/// Proxy configuration section
#[derive(Debug, Deserialize)]
pub struct ProxySection {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upstream indexes in priority order
    #[serde(default)]
    pub upstreams: Vec<UpstreamEntry>,

    /// Upstream request timeout (e.g., "30s", "2m")
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout: String,

    /// Renamed wheels kept in memory (0 = disabled)
    #[serde(default = "default_cache_entries")]
    pub cache_entries: usize,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstreams: Vec::new(),
            upstream_timeout: default_upstream_timeout(),
            cache_entries: default_cache_entries(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_upstream_timeout() -> String {
    "30s".to_string()
}

fn default_cache_entries() -> usize {
    32
}

/// An upstream index, as a bare URL or a table
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UpstreamEntry {
    Url(String),
    Table { url: String },
}

impl UpstreamEntry {
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) | Self::Table { url } => url,
        }
    }
}

/// A rename rule as written in the file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RenameEntry {
    Name(String),
    Table {
        name: String,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        dependencies: BTreeMap<String, String>,
    },
}

/// A resolved rename rule
#[derive(Debug, Clone)]
pub struct RenameRule {
    /// Upstream distribution name (e.g., "icechunk")
    pub original: String,
    /// Name served by the proxy (e.g., "icechunk_v1")
    pub new_name: String,
    /// Only versions matching this are served
    pub version_spec: Option<VersionSpecifiers>,
    /// Dependencies renamed inside METADATA
    pub dependency_renames: BTreeMap<String, String>,
}

impl RenameRule {
    pub fn new(original: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            new_name: new_name.into(),
            version_spec: None,
            dependency_renames: BTreeMap::new(),
        }
    }

    /// Parse a command line rule: `original=new_name[:version_spec]`
    ///
    /// Examples:
    /// - "icechunk=icechunk_v1" → no version filter
    /// - "icechunk=icechunk_v1:<2" → only versions below 2
    pub fn parse_arg(arg: &str) -> Result<Self> {
        let (original, rest) = arg.split_once('=').with_context(|| {
            format!("Invalid rename format: {:?}. Expected 'original=new_name[:version]'", arg)
        })?;

        let (new_name, spec) = match rest.split_once(':') {
            Some((name, spec)) => (name, Some(spec.trim()).filter(|s| !s.is_empty())),
            None => (rest, None),
        };

        let mut rule = Self::new(original.trim(), new_name.trim());
        if let Some(spec) = spec {
            rule.version_spec = Some(
                VersionSpecifiers::parse(spec)
                    .with_context(|| format!("Invalid version constraint in rename {:?}", arg))?,
            );
        }
        Ok(rule)
    }

    fn from_entry(original: &str, entry: &RenameEntry) -> Result<Self> {
        match entry {
            RenameEntry::Name(name) => Ok(Self::new(original, name.as_str())),
            RenameEntry::Table {
                name,
                version,
                dependencies,
            } => {
                let version_spec = version
                    .as_deref()
                    .map(|v| {
                        VersionSpecifiers::parse(v).with_context(|| {
                            format!("Invalid version constraint for renames.{}: {}", original, v)
                        })
                    })
                    .transpose()?;
                Ok(Self {
                    original: original.to_string(),
                    new_name: name.clone(),
                    version_spec,
                    dependency_renames: dependencies.clone(),
                })
            }
        }
    }

    /// Whether `project` names this rule's renamed distribution
    pub fn serves(&self, project: &str) -> bool {
        normalize_name(&self.new_name) == normalize_name(project)
    }

    /// Whether a version string passes the rule's filter
    ///
    /// Without a filter everything passes; with one, unparseable versions
    /// are dropped.
    pub fn admits_version(&self, version: &str) -> bool {
        match &self.version_spec {
            None => true,
            Some(spec) => spec.matches_str(version),
        }
    }

    /// Request for the rename engine
    pub fn rename_request(&self) -> RenameRequest {
        RenameRequest {
            new_name: self.new_name.clone(),
            update_imports: true,
            dependency_renames: self.dependency_renames.clone(),
        }
    }

    /// Stable digest of everything that influences rename output
    pub fn fingerprint(&self) -> String {
        let mut canonical = format!(
            "{}\n{}\n{}\n",
            normalize_name(&self.original),
            normalize_name(&self.new_name),
            self.version_spec.as_ref().map(|s| s.to_string()).unwrap_or_default()
        );
        for (old, new) in &self.dependency_renames {
            canonical.push_str(&format!("{}={}\n", normalize_name(old), new));
        }
        sha256_hex(canonical.as_bytes())
    }
}

/// Command line overrides applied on top of the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Replaces the file's upstreams when non-empty
    pub upstreams: Vec<String>,
    /// Replaces the file's rules when non-empty (`original=new[:spec]`)
    pub renames: Vec<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Where a configuration came from, kept so it can be reloaded
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    pub path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

impl ConfigSource {
    pub fn new(path: Option<PathBuf>, overrides: ConfigOverrides) -> Self {
        Self { path, overrides }
    }

    /// Read the file (if any), apply overrides and validate
    pub fn load(&self) -> Result<ProxyConfig> {
        let file = match &self.path {
            Some(path) => ProxyFile::load(path)?,
            None => ProxyFile::default(),
        };
        ProxyConfig::resolve(file, &self.overrides)
    }
}

impl ProxyFile {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Immutable runtime configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind_addr: SocketAddr,
    /// Upstream simple index URLs in priority order
    pub upstreams: Vec<String>,
    pub rules: Vec<RenameRule>,
    pub upstream_timeout: Duration,
    pub cache_entries: usize,
}

impl ProxyConfig {
    /// Merge file contents and overrides into a validated configuration
    pub fn resolve(file: ProxyFile, overrides: &ConfigOverrides) -> Result<Self> {
        let host = overrides.host.clone().unwrap_or(file.proxy.host);
        let port = overrides.port.unwrap_or(file.proxy.port);

        let upstreams = if overrides.upstreams.is_empty() {
            file.proxy
                .upstreams
                .iter()
                .map(|u| u.url().to_string())
                .collect()
        } else {
            overrides.upstreams.clone()
        };

        let rules = if overrides.renames.is_empty() {
            file.renames
                .iter()
                .map(|(original, entry)| RenameRule::from_entry(original, entry))
                .collect::<Result<Vec<_>>>()?
        } else {
            overrides
                .renames
                .iter()
                .map(|arg| RenameRule::parse_arg(arg))
                .collect::<Result<Vec<_>>>()?
        };

        let bind_addr = parse_bind_addr(&host, port)?;
        let upstream_timeout = parse_duration(&file.proxy.upstream_timeout)?;

        let config = Self {
            bind_addr,
            upstreams,
            rules,
            upstream_timeout,
            cache_entries: file.proxy.cache_entries,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.upstreams.is_empty() {
            anyhow::bail!("No upstream indexes configured; use -u/--upstream or [[proxy.upstreams]]");
        }
        for upstream in &self.upstreams {
            url::Url::parse(upstream).with_context(|| format!("Invalid upstream URL: {}", upstream))?;
        }

        let mut served = HashSet::new();
        for rule in &self.rules {
            if !is_valid_name(&rule.original) {
                anyhow::bail!("Invalid original name in rename rule: {:?}", rule.original);
            }
            if !is_valid_name(&rule.new_name) {
                anyhow::bail!("Invalid new name in rename rule: {:?}", rule.new_name);
            }
            if !served.insert(normalize_name(&rule.new_name)) {
                anyhow::bail!("Duplicate rename target: {}", rule.new_name);
            }
            for (old, new) in &rule.dependency_renames {
                if !is_valid_name(old) || !is_valid_name(new) {
                    anyhow::bail!("Invalid dependency rename for {}: {} = {}", rule.new_name, old, new);
                }
            }
        }

        if self.upstream_timeout.is_zero() {
            anyhow::bail!("proxy.upstream_timeout must be greater than zero");
        }

        Ok(())
    }

    /// Rule serving a (renamed) project name
    pub fn rule_for(&self, project: &str) -> Option<&RenameRule> {
        self.rules.iter().find(|rule| rule.serves(project))
    }

    /// Renamed project names, sorted and deduplicated
    pub fn virtual_projects(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rules.iter().map(|r| r.new_name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}

fn parse_bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let addr = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };
    addr.parse::<SocketAddr>()
        .with_context(|| format!("Invalid bind address: {}", addr))
}

/// Parse a human-readable duration string (e.g., "15m", "1h", "30s")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("ms") {
        (n, 0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Assume seconds
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration number: {}", num_str))?;

    if multiplier == 0 {
        return Ok(Duration::from_millis(num));
    }
    Ok(Duration::from_secs(num * multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides_with_upstream() -> ConfigOverrides {
        ConfigOverrides {
            upstreams: vec!["https://pypi.org/simple/".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(15 * 60));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_rename_arg() {
        let rule = RenameRule::parse_arg("icechunk=icechunk_v1").unwrap();
        assert_eq!(rule.original, "icechunk");
        assert_eq!(rule.new_name, "icechunk_v1");
        assert!(rule.version_spec.is_none());

        let rule = RenameRule::parse_arg("icechunk = icechunk_v1:<2").unwrap();
        assert!(rule.admits_version("1.9"));
        assert!(!rule.admits_version("2.0"));
        assert!(!rule.admits_version("not-a-version"));

        assert!(RenameRule::parse_arg("icechunk").is_err());
        assert!(RenameRule::parse_arg("a=b:bogus").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[proxy]
host = "0.0.0.0"
port = 9000
upstream_timeout = "1m"
cache_entries = 0

[[proxy.upstreams]]
url = "https://pypi.org/simple/"

[renames]
icechunk = { name = "icechunk_v1", version = "<2", dependencies = { zarr = "zarr_v2" } }
zarr = "zarr_v2"
"#;
        let file: ProxyFile = toml::from_str(toml_str).unwrap();
        let config = ProxyConfig::resolve(file, &ConfigOverrides::default()).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.upstreams, vec!["https://pypi.org/simple/"]);
        assert_eq!(config.upstream_timeout, Duration::from_secs(60));
        assert_eq!(config.cache_entries, 0);
        assert_eq!(config.virtual_projects(), vec!["icechunk_v1", "zarr_v2"]);

        let rule = config.rule_for("Icechunk-V1").unwrap();
        assert_eq!(rule.original, "icechunk");
        assert_eq!(rule.dependency_renames.get("zarr").map(String::as_str), Some("zarr_v2"));
        assert!(config.rule_for("icechunk").is_none());
    }

    #[test]
    fn test_plain_string_upstreams() {
        let toml_str = r#"
[proxy]
upstreams = ["https://example.com/simple/", { url = "https://pypi.org/simple/" }]
"#;
        let file: ProxyFile = toml::from_str(toml_str).unwrap();
        let config = ProxyConfig::resolve(file, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.upstreams.len(), 2);
        assert_eq!(config.bind_addr, "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let toml_str = r#"
[proxy]
upstreams = ["https://example.com/simple/"]

[renames]
zarr = "zarr_v2"
"#;
        let file: ProxyFile = toml::from_str(toml_str).unwrap();
        let overrides = ConfigOverrides {
            upstreams: vec!["https://pypi.org/simple/".into()],
            renames: vec!["pkg=pkg_v1:<2.0".into()],
            host: Some("::1".into()),
            port: Some(8123),
        };
        let config = ProxyConfig::resolve(file, &overrides).unwrap();
        assert_eq!(config.upstreams, vec!["https://pypi.org/simple/"]);
        assert_eq!(config.virtual_projects(), vec!["pkg_v1"]);
        assert_eq!(config.bind_addr, "[::1]:8123".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_validation_errors() {
        let no_upstream = ProxyConfig::resolve(ProxyFile::default(), &ConfigOverrides::default());
        assert!(no_upstream.is_err());

        let mut overrides = overrides_with_upstream();
        overrides.renames = vec!["a=dup".into(), "b=DUP".into()];
        assert!(ProxyConfig::resolve(ProxyFile::default(), &overrides).is_err());

        let mut overrides = overrides_with_upstream();
        overrides.renames = vec!["a=not valid".into()];
        assert!(ProxyConfig::resolve(ProxyFile::default(), &overrides).is_err());

        let mut overrides = overrides_with_upstream();
        overrides.host = Some("not a host".into());
        assert!(ProxyConfig::resolve(ProxyFile::default(), &overrides).is_err());
    }

    #[test]
    fn test_fingerprint_tracks_rule_contents() {
        let a = RenameRule::parse_arg("pkg=pkg_v1:<2").unwrap();
        let b = RenameRule::parse_arg("pkg=pkg-v1:<2").unwrap();
        let c = RenameRule::parse_arg("pkg=pkg_v1:<3").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
