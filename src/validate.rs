use crate::manifest::Manifest;
use ansi_term::Colour::{Green, Red};
use anyhow::{anyhow, Result};
use std::path::Path;

/// Validate a manifest without building or executing anything.
///
/// Prints one `ok` / `invalid` line per row. Fails if the manifest cannot be read or any
/// row is invalid.
pub fn validate_file(file: &Path) -> Result<()> {
    if !file.exists() {
        return Err(anyhow!(
            "{:?} ... {} - file does not exist",
            file,
            Red.paint("Failed")
        ));
    }

    let manifest = Manifest::new(file)
        .map_err(|e| anyhow!("{:?} ... {} - {}", file, Red.paint("invalid"), e))?;

    let mut invalid = 0;
    for (raw, row) in manifest.validate_rows() {
        match row {
            Ok(row) => println!(
                "row {}: {} [{}] ... {}",
                row.line,
                row.project,
                row.environment,
                Green.paint("ok")
            ),
            Err(e) => {
                invalid += 1;
                println!("row {}: ... {} - {}", raw.line, Red.paint("invalid"), e);
            }
        }
    }

    if invalid > 0 {
        return Err(anyhow!(
            "{:?} ... {} - {} of {} row(s) invalid",
            file,
            Red.paint("invalid"),
            invalid,
            manifest.len()
        ));
    }

    // "OK" in green color
    println!("{:?} ... {}", file, Green.paint("ok"));

    Ok(())
}
