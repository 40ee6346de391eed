// src/server/upstream.rs
//! Upstream package index client
//!
//! [`ArtifactSource`] is the seam between the proxy and the indexes it
//! fronts. [`HttpUpstream`] is the production implementation:
//! - Tries each configured index in priority order
//! - Asks for PEP 691 JSON and accepts PEP 503 HTML
//! - Resolves relative links against the page URL
//! - Extracts `#algo=digest` fragments and `data-requires-python`

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Largest artifact the proxy will download (512 MiB)
pub const MAX_DOWNLOAD_SIZE: u64 = 512 * 1024 * 1024;

/// PEP 691 JSON content type
pub const PEP691_JSON: &str = "application/vnd.pypi.simple.v1+json";

/// PEP 691 HTML content type
pub const PEP691_HTML: &str = "application/vnd.pypi.simple.v1+html";

const ACCEPT_HEADER: &str =
    "application/vnd.pypi.simple.v1+json, application/vnd.pypi.simple.v1+html;q=0.2, text/html;q=0.01";

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<a\s([^>]*)>(.*?)</a\s*>").expect("anchor pattern is valid")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("attribute pattern is valid")
});

/// Digest published by an index for one file (lowercase hex)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDigest {
    pub algorithm: HashAlgorithm,
    pub hex: String,
}

impl IndexDigest {
    /// Pick the strongest-supported digest, preferring SHA-256
    fn from_hashes(hashes: &BTreeMap<String, String>) -> Option<Self> {
        [HashAlgorithm::Sha256, HashAlgorithm::Sha384, HashAlgorithm::Sha512]
            .into_iter()
            .find_map(|algorithm| {
                hashes.get(algorithm.name()).map(|hex| Self {
                    algorithm,
                    hex: hex.to_lowercase(),
                })
            })
    }

    /// Parse a URL fragment such as `sha256=abcd...`
    fn from_fragment(fragment: &str) -> Option<Self> {
        let (algo, hex) = fragment.split_once('=')?;
        let algorithm: HashAlgorithm = algo.parse().ok()?;
        if hex.len() != algorithm.output_len() * 2 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self {
            algorithm,
            hex: hex.to_lowercase(),
        })
    }
}

impl std::fmt::Display for IndexDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.algorithm, self.hex)
    }
}

/// One file offered by an upstream project page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamArtifact {
    pub filename: String,
    /// Absolute download URL, fragment removed
    pub url: String,
    pub digest: Option<IndexDigest>,
    pub requires_python: Option<String>,
}

impl UpstreamArtifact {
    pub fn new(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
            digest: None,
            requires_python: None,
        }
    }
}

/// Source of upstream project listings and artifact bytes
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Files offered for a project
    ///
    /// An empty list means no upstream knows the project.
    async fn list_artifacts(&self, project: &str) -> Result<Vec<UpstreamArtifact>>;

    /// Download one artifact in full
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Human-readable name (for logging)
    fn name(&self) -> &str;
}

/// HTTP implementation over one or more simple indexes
pub struct HttpUpstream {
    client: reqwest::Client,
    indexes: Vec<Url>,
}

impl HttpUpstream {
    /// Create a client for the given index URLs (in priority order)
    pub fn new(indexes: &[String], timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("spare-tire/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Upstream(format!("Failed to create HTTP client: {e}")))?;

        let indexes = indexes
            .iter()
            .map(|raw| {
                let with_slash = if raw.ends_with('/') {
                    raw.clone()
                } else {
                    format!("{}/", raw)
                };
                Url::parse(&with_slash)
                    .map_err(|e| Error::Upstream(format!("Invalid upstream URL {}: {e}", raw)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { client, indexes })
    }

    async fn fetch_page(&self, index: &Url, project: &str) -> Result<Option<Vec<UpstreamArtifact>>> {
        let page_url = index
            .join(&format!("{}/", project))
            .map_err(|e| Error::Upstream(format!("Invalid project URL for {}: {e}", project)))?;

        debug!("Fetching project page {}", page_url);
        let response = self
            .client
            .get(page_url.clone())
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to fetch {}: {e}", page_url)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "{} returned HTTP {}",
                page_url,
                response.status()
            )));
        }

        // Redirects change the base for relative links
        let base = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to read {}: {e}", page_url)))?;

        let artifacts = if content_type.contains("json") {
            parse_json_page(&body, &base)?
        } else {
            parse_html_page(&body, &base)
        };
        Ok(Some(artifacts))
    }
}

#[async_trait]
impl ArtifactSource for HttpUpstream {
    async fn list_artifacts(&self, project: &str) -> Result<Vec<UpstreamArtifact>> {
        let mut last_error = None;

        for index in &self.indexes {
            match self.fetch_page(index, project).await {
                Ok(Some(artifacts)) => return Ok(artifacts),
                Ok(None) => debug!("{} not found on {}", project, index),
                Err(e) => {
                    warn!("Upstream {} failed for {}: {}", index, project, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to fetch {}: {e}", url)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!("{} returned HTTP {}", url, response.status())));
        }

        let length = response.content_length().unwrap_or(0);
        if length > MAX_DOWNLOAD_SIZE {
            return Err(Error::Upstream(format!(
                "{} is {} bytes, larger than the {} byte limit",
                url, length, MAX_DOWNLOAD_SIZE
            )));
        }

        let mut data = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to read {}: {e}", url)))?
        {
            if (data.len() + chunk.len()) as u64 > MAX_DOWNLOAD_SIZE {
                return Err(Error::Upstream(format!(
                    "{} exceeds the {} byte limit",
                    url, MAX_DOWNLOAD_SIZE
                )));
            }
            data.extend_from_slice(&chunk);
        }

        Ok(data)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[derive(Deserialize)]
struct JsonPage {
    #[serde(default)]
    files: Vec<JsonFile>,
}

#[derive(Deserialize)]
struct JsonFile {
    filename: String,
    url: String,
    #[serde(default)]
    hashes: BTreeMap<String, String>,
    #[serde(default, rename = "requires-python")]
    requires_python: Option<String>,
}

/// Parse a PEP 691 JSON project page
pub fn parse_json_page(body: &str, base: &Url) -> Result<Vec<UpstreamArtifact>> {
    let page: JsonPage = serde_json::from_str(body)
        .map_err(|e| Error::Upstream(format!("Invalid JSON project page from {}: {e}", base)))?;

    Ok(page
        .files
        .into_iter()
        .filter_map(|file| {
            let mut url = base.join(&file.url).ok()?;
            let fragment_digest = url.fragment().and_then(IndexDigest::from_fragment);
            url.set_fragment(None);
            Some(UpstreamArtifact {
                filename: file.filename,
                url: url.to_string(),
                digest: IndexDigest::from_hashes(&file.hashes).or(fragment_digest),
                requires_python: file.requires_python.filter(|s| !s.is_empty()),
            })
        })
        .collect())
}

/// Parse a PEP 503 HTML project page
///
/// Anchors without an `href` or with an unresolvable one are skipped.
pub fn parse_html_page(body: &str, base: &Url) -> Vec<UpstreamArtifact> {
    // A <base href> overrides the page URL
    let base = base_href(body)
        .and_then(|href| base.join(&href).ok())
        .unwrap_or_else(|| base.clone());

    ANCHOR_RE
        .captures_iter(body)
        .filter_map(|caps| {
            let attrs = parse_attributes(&caps[1]);
            let href = attrs.get("href")?;
            let mut url = base.join(href).ok()?;

            let digest = url.fragment().and_then(IndexDigest::from_fragment);
            url.set_fragment(None);

            let text = unescape_html(caps[2].trim());
            let filename = if text.is_empty() {
                url.path_segments()?.next_back()?.to_string()
            } else {
                text
            };

            Some(UpstreamArtifact {
                filename,
                url: url.to_string(),
                digest,
                requires_python: attrs
                    .get("data-requires-python")
                    .filter(|s| !s.is_empty())
                    .cloned(),
            })
        })
        .collect()
}

fn base_href(body: &str) -> Option<String> {
    static BASE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<base\s([^>]*)>").expect("base pattern is valid"));
    let caps = BASE_RE.captures(body)?;
    parse_attributes(&caps[1]).remove("href")
}

fn parse_attributes(raw: &str) -> BTreeMap<String, String> {
    ATTR_RE
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");
            (caps[1].to_ascii_lowercase(), unescape_html(value))
        })
        .collect()
}

fn unescape_html(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "a3f5c8e2b1d4f6a7c9e0b2d4f6a8c0e2b4d6f8a0c2e4b6d8f0a2c4e6b8d0f2a4";

    fn base() -> Url {
        Url::parse("https://pypi.example/simple/pkg/").unwrap()
    }

    #[test]
    fn test_parse_html_page() {
        let body = format!(
            r#"<!DOCTYPE html>
<html><body>
<a href="../../files/pkg-1.9-py3-none-any.whl#sha256={SHA}" data-requires-python="&gt;=3.9">pkg-1.9-py3-none-any.whl</a>
<A HREF='https://cdn.example/pkg-2.5.tar.gz'>pkg-2.5.tar.gz</A>
<a name="anchor-without-href">nothing</a>
</body></html>"#
        );

        let artifacts = parse_html_page(&body, &base());
        assert_eq!(artifacts.len(), 2);

        let wheel = &artifacts[0];
        assert_eq!(wheel.filename, "pkg-1.9-py3-none-any.whl");
        assert_eq!(wheel.url, "https://pypi.example/files/pkg-1.9-py3-none-any.whl");
        assert_eq!(wheel.requires_python.as_deref(), Some(">=3.9"));
        let digest = wheel.digest.as_ref().unwrap();
        assert_eq!(digest.algorithm, HashAlgorithm::Sha256);
        assert_eq!(digest.hex, SHA);

        assert_eq!(artifacts[1].url, "https://cdn.example/pkg-2.5.tar.gz");
        assert!(artifacts[1].digest.is_none());
    }

    #[test]
    fn test_parse_html_ignores_bad_fragment() {
        let body = r#"<a href="pkg-1.0-py3-none-any.whl#md5=abc">pkg-1.0-py3-none-any.whl</a>"#;
        let artifacts = parse_html_page(body, &base());
        assert_eq!(artifacts[0].url, "https://pypi.example/simple/pkg/pkg-1.0-py3-none-any.whl");
        assert!(artifacts[0].digest.is_none());
    }

    #[test]
    fn test_parse_json_page() {
        let body = format!(
            r#"{{
  "meta": {{"api-version": "1.0"}},
  "name": "pkg",
  "files": [
    {{"filename": "pkg-1.9-py3-none-any.whl", "url": "/files/pkg-1.9-py3-none-any.whl",
      "hashes": {{"sha256": "{}"}}, "requires-python": ">=3.9"}},
    {{"filename": "pkg-2.5-py3-none-any.whl", "url": "https://cdn.example/pkg-2.5-py3-none-any.whl",
      "hashes": {{}}}}
  ]
}}"#,
            SHA.to_uppercase()
        );

        let artifacts = parse_json_page(&body, &base()).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].url, "https://pypi.example/files/pkg-1.9-py3-none-any.whl");
        assert_eq!(artifacts[0].digest.as_ref().unwrap().hex, SHA);
        assert_eq!(artifacts[0].requires_python.as_deref(), Some(">=3.9"));
        assert!(artifacts[1].digest.is_none());

        assert!(parse_json_page("not json", &base()).is_err());
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("a &amp;lt; b"), "a &lt; b");
        assert_eq!(unescape_html("&lt;3,&gt;=2"), "<3,>=2");
        assert_eq!(unescape_html("plain"), "plain");
    }
}
