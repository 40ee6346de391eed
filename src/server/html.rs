// src/server/html.rs
//! Simple repository API rendering
//!
//! Produces PEP 503 HTML and PEP 691 JSON for the root and per-project
//! listings, and picks between them from `Accept` or `?format=`.

use crate::server::upstream::{IndexDigest, PEP691_HTML, PEP691_JSON};
use serde::Serialize;
use std::collections::BTreeMap;

/// Simple API version advertised in every listing
pub const API_VERSION: &str = "1.0";

/// One file link in a project listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFile {
    pub filename: String,
    /// Relative (served by the proxy) or absolute (upstream) URL
    pub url: String,
    pub digest: Option<IndexDigest>,
    pub requires_python: Option<String>,
}

/// A rendered project page's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectListing {
    pub name: String,
    pub files: Vec<ListingFile>,
}

/// Negotiated listing format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    Html,
    Json,
}

impl ListingFormat {
    /// Choose a format: `?format=` wins, then `Accept`, HTML by default
    pub fn negotiate(accept: Option<&str>, format_param: Option<&str>) -> Self {
        match format_param.map(|f| f.trim().to_ascii_lowercase()) {
            Some(f) if f == "json" || f == PEP691_JSON => return Self::Json,
            Some(f) if f == "html" || f == PEP691_HTML || f == "text/html" => return Self::Html,
            _ => {}
        }

        let Some(accept) = accept else {
            return Self::Html;
        };

        let mut json_q = 0.0f32;
        let mut html_q = 0.0f32;
        for item in accept.split(',') {
            let mut parts = item.split(';');
            let media = parts.next().unwrap_or("").trim().to_ascii_lowercase();
            let q = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|v| v.trim().parse::<f32>().ok())
                .unwrap_or(1.0);

            match media.as_str() {
                "application/vnd.pypi.simple.v1+json" | "application/vnd.pypi.simple.latest+json" => {
                    json_q = json_q.max(q)
                }
                "application/vnd.pypi.simple.v1+html"
                | "application/vnd.pypi.simple.latest+html"
                | "text/html"
                | "*/*" => html_q = html_q.max(q),
                _ => {}
            }
        }

        if json_q > 0.0 && json_q >= html_q {
            Self::Json
        } else {
            Self::Html
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Json => PEP691_JSON,
        }
    }
}

/// Render the root listing in the negotiated format
pub fn render_root(format: ListingFormat, projects: &[String]) -> String {
    match format {
        ListingFormat::Html => root_html(projects),
        ListingFormat::Json => root_json(projects),
    }
}

/// Render a project listing in the negotiated format
pub fn render_project(format: ListingFormat, listing: &ProjectListing) -> String {
    match format {
        ListingFormat::Html => project_html(listing),
        ListingFormat::Json => project_json(listing),
    }
}

pub fn root_html(projects: &[String]) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n    <meta name=\"pypi:repository-version\" content=\"1.0\">\n    <title>Simple Index</title>\n</head>\n<body>\n",
    );
    for project in projects {
        let escaped = escape(project);
        out.push_str(&format!("    <a href=\"{}/\">{}</a>\n", escaped, escaped));
    }
    out.push_str("</body>\n</html>\n");
    out
}

pub fn project_html(listing: &ProjectListing) -> String {
    let name = escape(&listing.name);
    let mut out = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n    <meta name=\"pypi:repository-version\" content=\"1.0\">\n    <title>Links for {name}</title>\n</head>\n<body>\n    <h1>Links for {name}</h1>\n"
    );

    for file in &listing.files {
        let mut href = file.url.clone();
        if let Some(ref digest) = file.digest {
            href.push('#');
            href.push_str(&digest.to_string());
        }
        let mut attrs = format!("href=\"{}\"", escape(&href));
        if let Some(ref requires) = file.requires_python {
            attrs.push_str(&format!(" data-requires-python=\"{}\"", escape(requires)));
        }
        out.push_str(&format!("    <a {}>{}</a>\n", attrs, escape(&file.filename)));
    }

    out.push_str("</body>\n</html>\n");
    out
}

#[derive(Serialize)]
struct Meta {
    #[serde(rename = "api-version")]
    api_version: &'static str,
}

const META: Meta = Meta {
    api_version: API_VERSION,
};

#[derive(Serialize)]
struct RootJson<'a> {
    meta: Meta,
    projects: Vec<ProjectName<'a>>,
}

#[derive(Serialize)]
struct ProjectName<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct ProjectJson<'a> {
    meta: Meta,
    name: &'a str,
    files: Vec<FileJson<'a>>,
}

#[derive(Serialize)]
struct FileJson<'a> {
    filename: &'a str,
    url: &'a str,
    hashes: BTreeMap<&'static str, &'a str>,
    #[serde(rename = "requires-python", skip_serializing_if = "Option::is_none")]
    requires_python: Option<&'a str>,
}

pub fn root_json(projects: &[String]) -> String {
    let body = RootJson {
        meta: META,
        projects: projects.iter().map(|name| ProjectName { name }).collect(),
    };
    serde_json::to_string(&body).unwrap_or_default()
}

pub fn project_json(listing: &ProjectListing) -> String {
    let body = ProjectJson {
        meta: META,
        name: &listing.name,
        files: listing
            .files
            .iter()
            .map(|file| FileJson {
                filename: &file.filename,
                url: &file.url,
                hashes: file
                    .digest
                    .iter()
                    .map(|d| (d.algorithm.name(), d.hex.as_str()))
                    .collect(),
                requires_python: file.requires_python.as_deref(),
            })
            .collect(),
    };
    serde_json::to_string(&body).unwrap_or_default()
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;
    use crate::server::upstream::parse_html_page;

    fn listing() -> ProjectListing {
        ProjectListing {
            name: "pkg_v1".to_string(),
            files: vec![
                ListingFile {
                    filename: "pkg_v1-1.9-py3-none-any.whl".to_string(),
                    url: "pkg_v1-1.9-py3-none-any.whl".to_string(),
                    digest: None,
                    requires_python: Some(">=3.9".to_string()),
                },
                ListingFile {
                    filename: "other-1.0-py3-none-any.whl".to_string(),
                    url: "https://files.example/other-1.0-py3-none-any.whl".to_string(),
                    digest: Some(IndexDigest {
                        algorithm: HashAlgorithm::Sha256,
                        hex: "ab".repeat(32),
                    }),
                    requires_python: None,
                },
            ],
        }
    }

    #[test]
    fn test_negotiate() {
        assert_eq!(ListingFormat::negotiate(None, None), ListingFormat::Html);
        assert_eq!(ListingFormat::negotiate(Some("text/html"), None), ListingFormat::Html);
        assert_eq!(ListingFormat::negotiate(Some(PEP691_JSON), None), ListingFormat::Json);
        assert_eq!(
            ListingFormat::negotiate(
                Some("application/vnd.pypi.simple.v1+json, text/html;q=0.01"),
                None
            ),
            ListingFormat::Json
        );
        assert_eq!(
            ListingFormat::negotiate(
                Some("application/vnd.pypi.simple.v1+json;q=0.1, text/html"),
                None
            ),
            ListingFormat::Html
        );
        assert_eq!(ListingFormat::negotiate(Some("text/html"), Some("json")), ListingFormat::Json);
        assert_eq!(ListingFormat::negotiate(Some(PEP691_JSON), Some("html")), ListingFormat::Html);
    }

    #[test]
    fn test_root_html() {
        let html = root_html(&["a_v1".to_string(), "b".to_string()]);
        assert!(html.contains("<meta name=\"pypi:repository-version\" content=\"1.0\">"));
        assert!(html.contains("<a href=\"a_v1/\">a_v1</a>"));
        assert!(html.contains("<a href=\"b/\">b</a>"));
    }

    #[test]
    fn test_project_html_parses_back() {
        let html = project_html(&listing());
        assert!(html.contains("data-requires-python=\"&gt;=3.9\""));

        let base = url::Url::parse("http://proxy.local/simple/pkg-v1/").unwrap();
        let parsed = parse_html_page(&html, &base);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].filename, "pkg_v1-1.9-py3-none-any.whl");
        assert_eq!(parsed[0].url, "http://proxy.local/simple/pkg-v1/pkg_v1-1.9-py3-none-any.whl");
        assert_eq!(parsed[0].requires_python.as_deref(), Some(">=3.9"));
        assert_eq!(parsed[1].digest.as_ref().unwrap().hex, "ab".repeat(32));
    }

    #[test]
    fn test_project_json() {
        let json: serde_json::Value = serde_json::from_str(&project_json(&listing())).unwrap();
        assert_eq!(json["meta"]["api-version"], "1.0");
        assert_eq!(json["name"], "pkg_v1");
        assert_eq!(json["files"][0]["requires-python"], ">=3.9");
        assert!(json["files"][0]["hashes"].as_object().unwrap().is_empty());
        assert_eq!(json["files"][1]["hashes"]["sha256"], "ab".repeat(32));
        assert!(json["files"][1].get("requires-python").is_none());

        let root: serde_json::Value = serde_json::from_str(&root_json(&["x".to_string()])).unwrap();
        assert_eq!(root["projects"][0]["name"], "x");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&\"'"), "a&lt;b&gt;&amp;&quot;&#39;");
    }
}
