// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rename {
            wheel,
            new_name,
            output,
            no_update_imports,
            rename_deps,
        } => commands::cmd_rename(
            &wheel,
            &new_name,
            output.as_deref(),
            !no_update_imports,
            &rename_deps,
        ),
        Commands::Inspect { wheel, json } => commands::cmd_inspect(&wheel, json),
        Commands::Download {
            package,
            output,
            index_url,
            version_spec,
            list,
            rename,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::cmd_download(
                &package,
                &index_url,
                version_spec.as_deref(),
                list,
                rename.as_deref(),
                &output,
            ))
        }
        Commands::Serve {
            config,
            upstreams,
            renames,
            host,
            port,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::cmd_serve(
                config.as_deref(),
                upstreams,
                renames,
                host,
                port,
            ))
        }
    }
}
