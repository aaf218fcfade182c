//! Pack command implementation

use console::Style;

use crate::cli::PackArgs;
use crate::commands::helpers::absolute_path;
use updraft::Result;
use updraft::package::archive;

/// Run pack command
pub fn run(args: PackArgs) -> Result<()> {
    let source = absolute_path(&args.source)?;
    let output = absolute_path(&args.output)?;

    let descriptor = archive::pack(
        &source,
        &args.package_version,
        args.bundle_id.as_deref(),
        &output,
    )?;

    println!(
        "{} {} {} ({} files)",
        Style::new().green().bold().apply_to("Packed"),
        Style::new().bold().apply_to(&descriptor.declared_version),
        output.display(),
        descriptor.file_count
    );
    if let Some(checksum) = &descriptor.checksum {
        println!("  {} {}", Style::new().bold().apply_to("Checksum:"), checksum);
    }

    Ok(())
}
