//! Recover command implementation

use console::Style;

use crate::cli::RecoverArgs;
use crate::commands::helpers::{absolute_path, print_json};
use updraft::{Result, recover};

/// Run recover command
pub fn run(args: RecoverArgs) -> Result<()> {
    let target = absolute_path(&args.target)?;
    let report = recover(&target)?;

    if args.json {
        return print_json(&report);
    }

    if report.is_clean() {
        println!("{} nothing to recover", Style::new().dim().apply_to(target.display()));
        return Ok(());
    }

    if report.rolled_back {
        println!(
            "{} previous install of {}",
            Style::new().yellow().bold().apply_to("Restored"),
            target.display()
        );
    }
    if let Some(version) = &report.rolled_forward {
        println!(
            "{} interrupted install of {} at {}",
            Style::new().green().bold().apply_to("Completed"),
            version,
            target.display()
        );
    }
    for path in &report.removed_staging {
        println!(
            "{} {}",
            Style::new().dim().apply_to("Removed"),
            path.display()
        );
    }

    Ok(())
}
