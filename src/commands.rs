// src/commands.rs
//! Command implementations for the spare-tire binary

use anyhow::{Context, Result};
use spare_tire::{RenameRequest, WheelInfo, inspect_wheel_file, rename_wheel_file};
use std::path::Path;
#[cfg(feature = "server")]
use std::time::Duration;
use tracing::info;

/// Index request timeout for `download`
#[cfg(feature = "server")]
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Rename a wheel on disk
pub fn cmd_rename(
    wheel: &Path,
    new_name: &str,
    output: Option<&Path>,
    update_imports: bool,
    rename_deps: &[(String, String)],
) -> Result<()> {
    let mut request = RenameRequest::new(new_name).update_imports(update_imports);
    for (old, new) in rename_deps {
        request = request.rename_dependency(old.as_str(), new.as_str());
    }

    info!("Renaming {} to {}", wheel.display(), new_name);
    let (path, outcome) = rename_wheel_file(wheel, &request, output)
        .with_context(|| format!("Failed to rename {}", wheel.display()))?;

    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }
    println!("Created: {}", path.display());
    Ok(())
}

/// Inspect a wheel on disk
pub fn cmd_inspect(wheel: &Path, json: bool) -> Result<()> {
    let info = inspect_wheel_file(wheel)
        .with_context(|| format!("Failed to inspect {}", wheel.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_info(&info);
    }
    Ok(())
}

fn print_info(info: &WheelInfo) {
    println!("Wheel:        {}", info.filename);
    println!("Distribution: {}", info.distribution);
    println!("Version:      {}", info.version);
    if let Some(ref build) = info.build {
        println!("Build:        {}", build);
    }
    println!("Python:       {}", info.python_tag);
    println!("ABI:          {}", info.abi_tag);
    println!("Platform:     {}", info.platform_tag);
    if let Some(ref name) = info.metadata_name {
        println!("Name:         {}", name);
    }
    for requirement in &info.requires_dist {
        println!("Requires:     {}", requirement);
    }
    println!("Files:        {}", info.files.len());

    if info.record.present {
        if info.record.is_consistent() {
            println!("RECORD:       {} rows, consistent", info.record.rows);
        } else {
            println!("RECORD:       {} rows, {} issue(s)", info.record.rows, info.record.issues.len());
            for issue in &info.record.issues {
                println!("  {}", issue);
            }
        }
    } else {
        println!("RECORD:       missing");
    }

    println!();
    if info.extensions.is_empty() {
        println!("No compiled extensions (pure Python wheel). Safe to rename.");
        return;
    }

    println!("Extensions:");
    for ext in &info.extensions {
        let status = if ext.renamable { "renamable" } else { "NOT renamable" };
        println!("  {} [{}]", ext.path, status);
    }
    println!();
    if info.non_renamable_extensions().next().is_none() {
        println!("All extensions use underscore-prefixed modules. Safe to rename.");
    } else {
        println!("Some extensions lack an underscore prefix; imports may fail after renaming.");
        println!("Consider rebuilding from source instead.");
    }
}

/// Download (and optionally rename) a wheel from an index
#[cfg(feature = "server")]
pub async fn cmd_download(
    package: &str,
    index_url: &str,
    version_spec: Option<&str>,
    list: bool,
    rename: Option<&str>,
    output: &Path,
) -> Result<()> {
    use spare_tire::VersionSpecifiers;
    use spare_tire::download::{DownloadRequest, available_wheels, download_wheel};
    use spare_tire::server::{ArtifactSource, HttpUpstream};

    let specifiers = version_spec
        .map(VersionSpecifiers::parse)
        .transpose()
        .context("Invalid --version specifier")?;
    let source = HttpUpstream::new(&[index_url.to_string()], DOWNLOAD_TIMEOUT)?;

    if list {
        let wheels = available_wheels(package, source.list_artifacts(package).await?);
        let mut shown = 0;
        for wheel in &wheels {
            if specifiers.as_ref().is_none_or(|spec| spec.satisfies(&wheel.version)) {
                println!("{:<12} {}", wheel.version.to_string(), wheel.artifact.filename);
                shown += 1;
            }
        }
        if shown == 0 {
            anyhow::bail!("No wheels found for {}", package);
        }
        return Ok(());
    }

    let mut request = DownloadRequest::new(package, output);
    if let Some(specifiers) = specifiers {
        request = request.specifiers(specifiers);
    }
    if let Some(new_name) = rename {
        request = request.rename(RenameRequest::new(new_name));
    }

    let outcome = download_wheel(&source, &request)
        .await
        .with_context(|| format!("Failed to download {}", package))?;
    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }
    if rename.is_some() {
        println!("Downloaded: {}", outcome.source_filename);
        println!("Renamed:    {}", outcome.path.display());
    } else {
        println!("Downloaded: {}", outcome.path.display());
    }
    Ok(())
}

#[cfg(not(feature = "server"))]
pub async fn cmd_download(
    _package: &str,
    _index_url: &str,
    _version_spec: Option<&str>,
    _list: bool,
    _rename: Option<&str>,
    _output: &Path,
) -> Result<()> {
    anyhow::bail!("spare-tire was built without the 'server' feature")
}

/// Run the renaming index proxy
#[cfg(feature = "server")]
pub async fn cmd_serve(
    config: Option<&Path>,
    upstreams: Vec<String>,
    renames: Vec<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    use spare_tire::server::{ConfigOverrides, ConfigSource, run_server};

    let overrides = ConfigOverrides {
        upstreams,
        renames,
        host,
        port,
    };
    run_server(ConfigSource::new(config.map(Path::to_path_buf), overrides)).await
}

#[cfg(not(feature = "server"))]
pub async fn cmd_serve(
    _config: Option<&Path>,
    _upstreams: Vec<String>,
    _renames: Vec<String>,
    _host: Option<String>,
    _port: Option<u16>,
) -> Result<()> {
    anyhow::bail!("spare-tire was built without the 'server' feature")
}
