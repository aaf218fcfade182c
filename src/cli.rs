//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Updraft - package installer for application updates
///
/// Applies a downloaded update package to an installed application, refusing
/// downgrades and never leaving the application half-installed.
#[derive(Parser, Debug)]
#[command(
    name = "updraft",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Package installer for application auto-updates",
    long_about = "Updraft applies an already-downloaded update package to an installed \
                  application. The package is inspected, checked against the installed \
                  version, staged beside the install and swapped in with a rename.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  updraft install ./example-1.2.0.updraft --target /opt/example --bundle-id org.example.app\n    \
                  updraft inspect ./example-1.2.0.updraft\n    \
                  updraft pack ./build --version 1.2.0 --output example-1.2.0.updraft\n    \
                  updraft recover /opt/example"
)]
pub struct Cli {
    /// Installer settings file (YAML)
    #[arg(long, short = 'c', global = true, env = "UPDRAFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install an update package
    Install(InstallArgs),

    /// Show what a package declares
    Inspect(InspectArgs),

    /// Repair an install left behind by an interrupted update
    Recover(RecoverArgs),

    /// Build an archive package from a directory
    Pack(PackArgs),

    /// Show version information
    Version,
}

/// Arguments for the install command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                   Upgrade an installed application:\n    updraft install ./example-1.2.0.updraft --target /opt/example \\\n      --bundle-id org.example.app --installed-version 1.0.0\n\n\
                   Use the version recorded by the last install:\n    updraft install ./example-1.3.0.updraft --target /opt/example --bundle-id org.example.app\n\n\
                   Reinstall the current version:\n    updraft install ./example-1.2.0.updraft --target /opt/example --host host.yaml --force")]
pub struct InstallArgs {
    /// Package to install (bundle directory or archive)
    pub package: PathBuf,

    /// Install location of the application
    #[arg(long, short = 't')]
    pub target: PathBuf,

    /// Host description file (YAML); replaces the individual host flags
    #[arg(long, conflicts_with_all = ["installed_version", "pid"])]
    pub host: Option<PathBuf>,

    /// Version currently installed; read from the install receipt when omitted
    #[arg(long)]
    pub installed_version: Option<String>,

    /// Bundle identifier of the application
    #[arg(long, env = "UPDRAFT_BUNDLE_ID")]
    pub bundle_id: Option<String>,

    /// Process id of the running application
    #[arg(long)]
    pub pid: Option<u32>,

    /// Reinstall even if the version is already installed
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Permit installing an older version
    #[arg(long)]
    pub allow_downgrade: bool,

    /// Skip payload checksum verification
    #[arg(long)]
    pub no_verify: bool,

    /// Refuse packages without a payload checksum
    #[arg(long)]
    pub require_checksum: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Package to inspect
    pub package: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the recover command
#[derive(Parser, Debug)]
pub struct RecoverArgs {
    /// Install location to repair
    pub target: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the pack command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Pack a build directory:\n    updraft pack ./build --version 1.2.0 --bundle-id org.example.app --output example-1.2.0.updraft")]
pub struct PackArgs {
    /// Directory holding the payload
    pub source: PathBuf,

    /// Version the package installs
    #[arg(long = "version", value_name = "VERSION")]
    pub package_version: String,

    /// Bundle identifier of the application
    #[arg(long)]
    pub bundle_id: Option<String>,

    /// Archive file to write
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}
