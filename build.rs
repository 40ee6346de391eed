// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: wheel path
fn wheel_arg() -> Arg {
    Arg::new("wheel").required(true).help("Path to the wheel file")
}

fn build_cli() -> Command {
    Command::new("spare-tire")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Spare Tire Contributors")
        .about("Rename Python wheels so two versions of a package can be installed side by side")
        .subcommand_required(true)
        .subcommand(
            Command::new("rename")
                .about("Rename a wheel")
                .arg(wheel_arg())
                .arg(Arg::new("new_name").required(true).help("New distribution name"))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("DIR")
                        .help("Output directory for the renamed wheel (default: next to the input)"),
                )
                .arg(
                    Arg::new("no_update_imports")
                        .long("no-update-imports")
                        .action(ArgAction::SetTrue)
                        .help("Do not rewrite import statements in Python sources"),
                )
                .arg(
                    Arg::new("rename_dep")
                        .long("rename-dep")
                        .value_name("OLD=NEW")
                        .action(ArgAction::Append)
                        .help("Rename a dependency in Requires-Dist"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Inspect a wheel's structure and renamability")
                .arg(wheel_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("download")
                .about("Download a wheel from a package index, optionally renaming it")
                .arg(Arg::new("package").required(true).help("Name of the package to download"))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("DIR")
                        .default_value(".")
                        .help("Output directory for the downloaded wheel"),
                )
                .arg(
                    Arg::new("index_url")
                        .short('i')
                        .long("index-url")
                        .value_name("URL")
                        .default_value("https://pypi.org/simple/")
                        .help("Base URL of the simple index"),
                )
                .arg(
                    Arg::new("version_spec")
                        .long("version")
                        .value_name("SPEC")
                        .help("PEP 440 version specifier (e.g., \"==1.0.0\", \"<2\", \">=1.0,<2\")"),
                )
                .arg(
                    Arg::new("list")
                        .long("list")
                        .action(ArgAction::SetTrue)
                        .help("List available wheels without downloading"),
                )
                .arg(
                    Arg::new("rename")
                        .long("rename")
                        .value_name("NEW_NAME")
                        .help("Rename the downloaded wheel to this distribution name"),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Run a package index proxy that renames wheels on the fly")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Path to a TOML configuration file"),
                )
                .arg(
                    Arg::new("upstream")
                        .short('u')
                        .long("upstream")
                        .value_name("URL")
                        .action(ArgAction::Append)
                        .help("Upstream simple index URL (replaces configured upstreams)"),
                )
                .arg(
                    Arg::new("rename")
                        .short('r')
                        .long("rename")
                        .value_name("RULE")
                        .action(ArgAction::Append)
                        .help("Rename rule ORIGINAL=NEW[:VERSION_SPEC] (replaces configured rules)"),
                )
                .arg(Arg::new("host").long("host").help("Host to bind to"))
                .arg(Arg::new("port").long("port").help("Port to listen on")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("spare-tire.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
