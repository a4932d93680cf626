use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

///
/// Locate an executable on PATH, the way process spawning resolves it: a
/// regular file with an executable bit. An empty PATH component resolves
/// relative to the current directory.
///
pub fn which(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&paths) {
        let candidate = dir.join(program);
        let Ok(metadata) = candidate.metadata() else {
            continue;
        };
        if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
            return Some(candidate);
        }
    }
    None
}

pub fn check_sort_available() -> Result<()> {
    if which("sort").is_none() {
        anyhow::bail!("The external `sort` utility was not found on PATH.")
    }
    Ok(())
}

///
/// Sort a bin-pair file numerically on its first two columns, delegated to
/// the system sort utility. Non-zero exit is an error for the calling
/// chromosome's pipeline.
///
pub fn sort_by_bin_pair(input: &Path, output: &Path) -> Result<()> {
    let status = Command::new("sort")
        .env("LC_ALL", "C")
        .arg("-k1,1n")
        .arg("-k2,2n")
        .arg("-o")
        .arg(output)
        .arg(input)
        .status()
        .with_context(|| format!("Failed to launch the external sort for {:?}", input))?;

    if !status.success() {
        anyhow::bail!("External sort exited with {} while sorting {:?}", status, input)
    }

    Ok(())
}
