//! Output boundary: writing the .ics file and handing it to the importer.

use anyhow::{Context, Result};
use std::path::Path;

use crate::error::ExportResult;

/// Write the serialized document to `path`, replacing any existing file.
///
/// The blob goes to a sibling temp file first and is renamed into place, so
/// a failed write never leaves a half-written file at the target. Returns
/// the number of bytes written.
pub fn write_ics(blob: &str, path: &Path) -> ExportResult<u64> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, blob)?;

    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err.into());
    }

    Ok(blob.len() as u64)
}

/// Hand the exported file to the desktop calendar application.
///
/// With a configured importer the command is resolved from PATH and invoked
/// with the file path as its only argument; otherwise the platform opener
/// takes over and the desktop environment picks the calendar application.
pub async fn hand_off(path: &Path, importer: Option<&str>) -> Result<()> {
    match importer {
        Some(command) => {
            let binary = which::which(command)
                .with_context(|| format!("Importer '{}' not found in PATH", command))?;

            let status = tokio::process::Command::new(&binary)
                .arg(path)
                .status()
                .await
                .with_context(|| format!("Failed to run importer: {}", binary.display()))?;

            if !status.success() {
                anyhow::bail!("Importer '{}' exited with {}", command, status);
            }
        }
        None => {
            open::that(path).with_context(|| {
                format!(
                    "Failed to open {} with the default application",
                    path.display()
                )
            })?;
        }
    }

    Ok(())
}
