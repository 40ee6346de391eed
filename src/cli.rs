// src/cli.rs
//! CLI definitions for spare-tire
//!
//! The command implementations live in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spare-tire")]
#[command(author = "Spare Tire Contributors")]
#[command(version)]
#[command(
    about = "Rename Python wheels so two versions of a package can be installed side by side",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rename a wheel
    Rename {
        /// Path to the wheel file to rename
        wheel: PathBuf,

        /// New distribution name (e.g., "icechunk_v1")
        new_name: String,

        /// Output directory for the renamed wheel (default: next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not rewrite import statements in Python sources
        #[arg(long)]
        no_update_imports: bool,

        /// Rename a dependency in Requires-Dist (OLD=NEW, repeatable)
        #[arg(long = "rename-dep", value_name = "OLD=NEW", value_parser = parse_key_value)]
        rename_deps: Vec<(String, String)>,
    },

    /// Inspect a wheel's structure and renamability
    Inspect {
        /// Path to the wheel file to inspect
        wheel: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download a wheel from a package index, optionally renaming it
    Download {
        /// Name of the package to download
        package: String,

        /// Output directory for the downloaded wheel
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Base URL of the simple index
        #[arg(short, long = "index-url", value_name = "URL", default_value = "https://pypi.org/simple/")]
        index_url: String,

        /// PEP 440 version specifier (e.g., "==1.0.0", "<2", ">=1.0,<2")
        #[arg(long = "version", value_name = "SPEC")]
        version_spec: Option<String>,

        /// List available wheels without downloading
        #[arg(long)]
        list: bool,

        /// Rename the downloaded wheel to this distribution name
        #[arg(long, value_name = "NEW_NAME")]
        rename: Option<String>,
    },

    /// Run a package index proxy that renames wheels on the fly
    Serve {
        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Upstream simple index URL (repeatable, replaces configured upstreams)
        #[arg(short, long = "upstream", value_name = "URL")]
        upstreams: Vec<String>,

        /// Rename rule ORIGINAL=NEW[:VERSION_SPEC] (repeatable, replaces configured rules)
        #[arg(short, long = "rename", value_name = "RULE")]
        renames: Vec<String>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Parse `OLD=NEW`
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((old, new)) if !old.trim().is_empty() && !new.trim().is_empty() => {
            Ok((old.trim().to_string(), new.trim().to_string()))
        }
        _ => Err(format!("expected OLD=NEW, got {:?}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_rename() {
        let cli = Cli::try_parse_from([
            "spare-tire",
            "rename",
            "pkg-1.0-py3-none-any.whl",
            "pkg_v1",
            "-o",
            "out",
            "--rename-dep",
            "zarr=zarr_v2",
        ])
        .unwrap();

        match cli.command {
            Commands::Rename {
                new_name,
                output,
                no_update_imports,
                rename_deps,
                ..
            } => {
                assert_eq!(new_name, "pkg_v1");
                assert_eq!(output, Some(PathBuf::from("out")));
                assert!(!no_update_imports);
                assert_eq!(rename_deps, vec![("zarr".to_string(), "zarr_v2".to_string())]);
            }
            _ => panic!("expected rename"),
        }
    }

    #[test]
    fn test_rejects_bad_dependency_rename() {
        assert!(
            Cli::try_parse_from(["spare-tire", "rename", "a.whl", "b", "--rename-dep", "zarr"]).is_err()
        );
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from([
            "spare-tire",
            "download",
            "icechunk",
            "--version",
            "<2",
            "--rename",
            "icechunk_v1",
            "-o",
            "wheels",
        ])
        .unwrap();

        match cli.command {
            Commands::Download {
                package,
                output,
                index_url,
                version_spec,
                list,
                rename,
            } => {
                assert_eq!(package, "icechunk");
                assert_eq!(output, PathBuf::from("wheels"));
                assert_eq!(index_url, "https://pypi.org/simple/");
                assert_eq!(version_spec.as_deref(), Some("<2"));
                assert!(!list);
                assert_eq!(rename.as_deref(), Some("icechunk_v1"));
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from([
            "spare-tire",
            "serve",
            "-u",
            "https://pypi.org/simple/",
            "-r",
            "icechunk=icechunk_v1:<2",
            "--port",
            "9000",
        ])
        .unwrap();

        match cli.command {
            Commands::Serve {
                upstreams,
                renames,
                port,
                config,
                ..
            } => {
                assert_eq!(upstreams, vec!["https://pypi.org/simple/"]);
                assert_eq!(renames, vec!["icechunk=icechunk_v1:<2"]);
                assert_eq!(port, Some(9000));
                assert!(config.is_none());
            }
            _ => panic!("expected serve"),
        }
    }
}
