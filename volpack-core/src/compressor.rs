use crate::command::CompressorCommand;
use crate::error::{PackError, Result};
use std::process::Command;
use tracing::debug;

/// Runs a compressor command to completion.
///
/// The pipeline only depends on this trait, so tests can substitute a fake
/// that writes volume files without a real 7z binary.
pub trait Compressor {
    /// Block until the command exits. `Ok(())` only for exit status 0.
    fn run(&self, cmd: &CompressorCommand) -> Result<()>;
}

/// Spawns the command as a child process, inheriting stdio so the
/// compressor's own progress output reaches the operator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemCompressor;

impl Compressor for SystemCompressor {
    fn run(&self, cmd: &CompressorCommand) -> Result<()> {
        debug!(command = %cmd, "running compressor");
        let status = Command::new(&cmd.program)
            .args(cmd.args.iter().map(|a| a.as_os_str()))
            .status()
            .map_err(|e| {
                PackError::Compression(format!("failed to start {}: {}", cmd.program.display(), e))
            })?;
        if status.success() {
            Ok(())
        } else {
            let code = status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".into());
            Err(PackError::Compression(format!("{} exited with {}", cmd.program.display(), code)))
        }
    }
}
