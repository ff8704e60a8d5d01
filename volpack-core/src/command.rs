use std::fmt;
use std::path::{Path, PathBuf};

/// Fixed switches: max level, solid block, filters, header compression,
/// LZMA, multi-threading, recursion.
const FIXED_SWITCHES: &[&str] =
    &["-mx=9", "-ms=200m", "-mf", "-mhc", "-mhcf", "-m0=LZMA", "-mmt", "-r"];

/// One invocation of the external 7z-compatible compressor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressorCommand {
    pub program: PathBuf,
    pub args: Vec<Arg>,
}

/// A single argument; paths are quoted when rendered, switches are not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Arg {
    Switch(String),
    Path(PathBuf),
}

impl Arg {
    pub fn as_os_str(&self) -> &std::ffi::OsStr {
        match self {
            Arg::Switch(s) => s.as_ref(),
            Arg::Path(p) => p.as_os_str(),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Switch(s) => f.write_str(s),
            Arg::Path(p) => write!(f, "\"{}\"", p.display()),
        }
    }
}

impl fmt::Display for CompressorCommand {
    /// Renders the full command line, every path in double quotes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.program.display())?;
        for a in &self.args {
            write!(f, " {}", a)?;
        }
        Ok(())
    }
}

/// Build the `a -t7z` invocation that writes `<output_dir>/<archive_name>.7z.NNN`
/// volumes of `volume_size_kb` KiB each.
pub fn build_command(
    compressor: &Path,
    output_dir: &Path,
    archive_name: &str,
    inputs: &[PathBuf],
    volume_size_kb: u64,
) -> CompressorCommand {
    let mut args = Vec::with_capacity(inputs.len() + FIXED_SWITCHES.len() + 4);
    args.push(Arg::Switch("a".into()));
    args.push(Arg::Switch("-t7z".into()));
    args.push(Arg::Path(output_dir.join(archive_name)));
    args.extend(inputs.iter().cloned().map(Arg::Path));
    args.extend(FIXED_SWITCHES.iter().map(|s| Arg::Switch((*s).to_string())));
    args.push(Arg::Switch(format!("-v{}k", volume_size_kb)));
    CompressorCommand { program: compressor.to_path_buf(), args }
}

/// Convert a volume size in GiB (as typed by the operator) to KiB.
pub fn gib_to_kib(size_gib: f64) -> u64 {
    (size_gib * 1024.0 * 1024.0).round().max(1.0) as u64
}
