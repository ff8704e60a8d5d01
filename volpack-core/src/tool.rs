//! Locating (and optionally fetching) the 7z-compatible compressor.

use crate::error::{PackError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// Binary names tried, in order, when no explicit path is given.
pub const TOOL_NAMES: &[&str] = &["7zr", "7zz", "7za", "7z"];

/// Standalone console build of 7-Zip (Windows only).
pub const DOWNLOAD_URL: &str = "https://7-zip.org/a/7zr.exe";

#[derive(Clone, Debug, Default)]
pub struct ToolLocator {
    explicit: Option<PathBuf>,
    search_dirs: Vec<PathBuf>,
    fetch_into: Option<PathBuf>,
}

fn exe_name(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

impl ToolLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use exactly this binary; no searching.
    pub fn explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    /// Look in `dir` before `PATH`.
    pub fn search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    /// Download `7zr.exe` into `dir` when nothing else is found.
    pub fn fetch_into(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fetch_into = Some(dir.into());
        self
    }

    pub fn locate(&self) -> Result<PathBuf> {
        if let Some(p) = &self.explicit {
            if p.is_file() {
                return Ok(p.clone());
            }
            return Err(PackError::ToolUnavailable(format!("{} does not exist", p.display())));
        }
        for dir in &self.search_dirs {
            for name in TOOL_NAMES {
                let cand = dir.join(exe_name(name));
                if cand.is_file() {
                    return Ok(cand);
                }
            }
        }
        for name in TOOL_NAMES {
            if let Ok(p) = which::which(name) {
                return Ok(p);
            }
        }
        match &self.fetch_into {
            Some(dir) => fetch(dir),
            None => Err(PackError::ToolUnavailable(format!(
                "none of {} found; pass an explicit path or download {}",
                TOOL_NAMES.join(", "),
                DOWNLOAD_URL
            ))),
        }
    }
}

fn fetch(dir: &Path) -> Result<PathBuf> {
    if !cfg!(windows) {
        return Err(PackError::ToolUnavailable(format!(
            "{} is a Windows binary; install p7zip or 7-Zip instead",
            DOWNLOAD_URL
        )));
    }
    let dest = dir.join("7zr.exe");
    warn!("7zr.exe not found, downloading from {}", DOWNLOAD_URL);
    let status = Command::new("curl")
        .arg("-L")
        .arg("-o")
        .arg(&dest)
        .arg(DOWNLOAD_URL)
        .status()
        .map_err(|e| PackError::ToolUnavailable(format!("cannot run curl: {}", e)))?;
    if !status.success() || !dest.is_file() {
        return Err(PackError::ToolUnavailable(format!(
            "download failed; fetch it manually from {}",
            DOWNLOAD_URL
        )));
    }
    info!("Download complete: {}", dest.display());
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_is_unavailable() {
        let td = tempfile::tempdir().unwrap();
        let err = ToolLocator::new().explicit(td.path().join("nope")).locate().unwrap_err();
        assert!(matches!(err, PackError::ToolUnavailable(_)));
    }

    #[test]
    fn search_dir_wins_over_path() {
        let td = tempfile::tempdir().unwrap();
        let p = td.path().join(exe_name("7zr"));
        std::fs::write(&p, b"").unwrap();
        assert_eq!(ToolLocator::new().search_dir(td.path()).locate().unwrap(), p);
    }
}
