use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use shared::config::client::{Config, ConfigFormat};

/// Generates a configuration file with default values in the given format.
///
/// # Errors
/// Returns an error if serialization or writing the file fails.
pub fn generate_config(format: ConfigFormat, output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| PathBuf::from(format.file_name()));
    let serialized = Config::with_defaults().render(format)?;

    fs::write(&path, serialized)
        .with_context(|| format!("failed to write configuration to {}", path.display()))?;

    println!(
        "Configuration file '{}' generated successfully.",
        path.display()
    );
    Ok(())
}
