//! Inspect command implementation

use console::Style;

use crate::cli::InspectArgs;
use crate::commands::helpers::{absolute_path, print_json};
use updraft::{Result, package};

macro_rules! display_opt_field {
    ($label:expr, $value:expr) => {
        if let Some(ref v) = $value {
            println!("  {} {}", Style::new().bold().apply_to($label), v);
        }
    };
}

/// Run inspect command
pub fn run(args: InspectArgs) -> Result<()> {
    let descriptor = package::inspect(&absolute_path(&args.package)?)?;

    if args.json {
        return print_json(&descriptor);
    }

    println!(
        "{}",
        Style::new().bold().yellow().apply_to(args.package.display())
    );
    println!(
        "  {} {}",
        Style::new().bold().apply_to("Kind:"),
        descriptor.kind
    );
    println!(
        "  {} {}",
        Style::new().bold().apply_to("Version:"),
        descriptor.declared_version
    );
    display_opt_field!("Bundle identifier:", descriptor.bundle_identifier);
    display_opt_field!("Checksum:", descriptor.checksum);
    println!(
        "  {} {}",
        Style::new().bold().apply_to("Files:"),
        descriptor.file_count
    );

    Ok(())
}
