//! Install command implementation
//!
//! The installation process:
//! 1. Resolve paths, options and the host description
//! 2. Start the engine on a worker thread
//! 3. Cancel on Ctrl-C (honoured until the commit starts)
//! 4. Report the outcome

use std::path::Path;

use console::Style;
use tracing::warn;

use crate::cli::InstallArgs;
use crate::commands::helpers::{absolute_path, print_json};
use crate::progress::InstallProgress;
use updraft::error::{self, Result};
use updraft::transaction::InstallReceipt;
use updraft::{
    HostContext, InstallOptions, InstallOutcome, InstallRequest, InstallerConfig,
    StandardVersionComparator, perform_installation,
};

/// Installed version assumed when the target does not exist yet
const FRESH_INSTALL_VERSION: &str = "0";

/// Run install command
pub fn run(config_path: Option<&Path>, args: InstallArgs) -> Result<()> {
    let target = absolute_path(&args.target)?;
    let package = absolute_path(&args.package)?;
    let options = resolve_options(config_path, &args)?;
    let host = resolve_host(&target, &args)?;

    let label = package
        .file_name()
        .map_or_else(|| package.display().to_string(), |n| n.to_string_lossy().into_owned());
    let progress = InstallProgress::new(&label, !args.json && console::Term::stderr().is_term());
    let observer = progress.clone();

    let mut request = InstallRequest::new(&target, &package, host, StandardVersionComparator)
        .with_options(options)
        .with_observer(move |state| observer.update(state));
    if let Ok(exe) = std::env::current_exe() {
        request = request.with_installer_executable(exe);
    }

    let summary = match wait_with_ctrl_c(request, &target)? {
        Ok(summary) => summary,
        Err(e) => {
            progress.abandon();
            return Err(e);
        }
    };

    if args.json {
        return print_json(&summary);
    }

    println!(
        "{} {} {} {}",
        Style::new().green().bold().apply_to("Installed"),
        Style::new().bold().apply_to(&summary.installed_version),
        Style::new().dim().apply_to(format!("(was {})", summary.previous_version)),
        summary.target_path.display()
    );
    Ok(())
}

/// Options from the config file, overridden by command-line flags
fn resolve_options(config_path: Option<&Path>, args: &InstallArgs) -> Result<InstallOptions> {
    let config = match config_path {
        Some(path) => InstallerConfig::load(path)?,
        None => InstallerConfig::default(),
    };
    let mut options = config.to_options();

    if args.force {
        options.force_reinstall = true;
    }
    if args.allow_downgrade {
        options.allow_downgrade = true;
    }
    if args.no_verify {
        options.verify_checksum = false;
    }
    if args.require_checksum {
        options.require_checksum = true;
    }

    Ok(options)
}

/// Build the host description from a file, the flags, or the install receipt
fn resolve_host(target: &Path, args: &InstallArgs) -> Result<HostContext> {
    if let Some(path) = &args.host {
        return HostContext::from_yaml_file(&absolute_path(path)?);
    }

    let bundle_id = args
        .bundle_id
        .as_deref()
        .ok_or_else(|| error::request::invalid("--bundle-id or --host is required"))?;

    let host = match &args.installed_version {
        Some(version) => HostContext::new(version.as_str(), target, bundle_id),
        // A receipt outliving its install describes nothing that is installed
        None if !target.exists() => HostContext::new(FRESH_INSTALL_VERSION, target, bundle_id),
        None if InstallReceipt::load(target)?.is_some() => {
            HostContext::from_receipt(target, bundle_id)?
        }
        None => {
            return Err(error::request::invalid(format!(
                "installed version of {} is unknown; pass --installed-version",
                target.display()
            )));
        }
    };

    Ok(match args.pid {
        Some(pid) => host.with_running_process(pid),
        None => host,
    })
}

/// Run the install on a worker and cancel it on Ctrl-C
fn wait_with_ctrl_c(request: InstallRequest, target: &Path) -> Result<InstallOutcome> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| error::fs::staging_failed(target, format!("cannot start runtime: {e}")))?;

    Ok(runtime.block_on(async {
        let handle = perform_installation(request);
        let cancel = handle.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling unless the commit has started");
                cancel.cancel();
            }
        });
        handle.await
    }))
}
