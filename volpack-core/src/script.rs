use crate::digest::DigestAlgorithm;
use crate::error::{PackError, Result};
use crate::template::{SlotValues, Template};
use crate::volume::VolumeSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const BATCH_SRC: &str = include_str!("../templates/unpacker.bat");
const SHELL_SRC: &str = include_str!("../templates/unpacker.sh");

/// Resolved before parsing the built-in sources; not a runtime slot.
const HASH_COMMAND_MARKER: &str = "@@HASH_COMMAND@@";

/// Separates file name and digest in a record; the scripts split on the first one.
const RECORD_DELIMITER: char = '|';

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFlavor {
    /// Windows batch, verified with `certutil` (or `b3sum`).
    Batch,
    /// bash, verified with `sha256sum`/`shasum` (or `b3sum`).
    Shell,
}

impl ScriptFlavor {
    pub const ALL: [ScriptFlavor; 2] = [ScriptFlavor::Batch, ScriptFlavor::Shell];

    /// Flavor matching the host this binary was built for.
    pub fn native() -> Self {
        if cfg!(windows) {
            ScriptFlavor::Batch
        } else {
            ScriptFlavor::Shell
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ScriptFlavor::Batch => "unpacker.bat",
            ScriptFlavor::Shell => "unpacker.sh",
        }
    }

    fn hash_command(self, algo: DigestAlgorithm) -> &'static str {
        match (self, algo) {
            (ScriptFlavor::Batch, DigestAlgorithm::Sha256) => {
                r#""skip=1 tokens=*" %%H in ('certutil -hashfile "%%A" SHA256 2^>nul')"#
            }
            (ScriptFlavor::Batch, DigestAlgorithm::Blake3) => {
                r#""tokens=1" %%H in ('b3sum --no-names "%%A" 2^>nul')"#
            }
            (ScriptFlavor::Shell, DigestAlgorithm::Sha256) => concat!(
                "    if command -v sha256sum >/dev/null 2>&1; then\n",
                "        sha256sum -b \"$1\" | cut -d' ' -f1\n",
                "    else\n",
                "        shasum -a 256 -b \"$1\" | cut -d' ' -f1\n",
                "    fi"
            ),
            (ScriptFlavor::Shell, DigestAlgorithm::Blake3) => "    b3sum --no-names \"$1\"",
        }
    }

    /// Built-in template for this flavor, wired to `algo`'s hash tool.
    pub fn builtin_template(self, algo: DigestAlgorithm) -> Result<Template> {
        let src = match self {
            ScriptFlavor::Batch => BATCH_SRC,
            ScriptFlavor::Shell => SHELL_SRC,
        };
        Template::parse(&src.replace(HASH_COMMAND_MARKER, self.hash_command(algo)))
    }

    /// One `files[index]=name|digest` assignment, quoted for the flavor.
    pub fn record(self, index: usize, name: &str, digest_hex: &str) -> String {
        match self {
            ScriptFlavor::Batch => {
                format!("set files[{}]={}^|{}", index, batch_escape(name), digest_hex)
            }
            ScriptFlavor::Shell => {
                format!("files[{}]='{}|{}'", index, name.replace('\'', r"'\''"), digest_hex)
            }
        }
    }

    /// Reject file names this flavor's record table cannot carry: the
    /// `|` delimiter, line breaks, and for batch the characters consumed by
    /// delayed expansion or the quoted `for /F` source.
    pub fn check_name(self, name: &str) -> Result<()> {
        let bad = name.chars().find(|&c| {
            c == RECORD_DELIMITER
                || c.is_control()
                || (self == ScriptFlavor::Batch && matches!(c, '!' | '%' | '"'))
        });
        match bad {
            Some(c) => Err(PackError::generation(format!(
                "{:?} contains {:?}, which a {} unpack script cannot represent",
                name,
                c,
                self.file_name()
            ))),
            None => Ok(()),
        }
    }

    fn line_ending(self) -> &'static str {
        match self {
            ScriptFlavor::Batch => "\r\n",
            ScriptFlavor::Shell => "\n",
        }
    }
}

fn batch_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '^' | '&' | '|' | '<' | '>') {
            out.push('^');
        }
        out.push(c);
    }
    out
}

/// Ordered record block for `volumes`, one line per volume.
pub fn volume_table(flavor: ScriptFlavor, volumes: &VolumeSet) -> String {
    let mut out = String::new();
    for (i, v) in volumes.iter().enumerate() {
        out.push_str(&flavor.record(i, &v.file_name(), &v.digest_hex));
        out.push('\n');
    }
    out
}

/// Files produced by [`generate_unpack_kit`].
#[derive(Clone, Debug)]
pub struct UnpackKit {
    pub script: PathBuf,
    /// Copied compressor, `None` when the source binary was absent.
    pub compressor: Option<PathBuf>,
}

fn tmp_name(prefix: &str) -> String {
    let n = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    format!(".{prefix}.tmp-{n}")
}

fn write_atomically(dest: &Path, contents: &str, executable: bool) -> Result<()> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let name = dest.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let tmp = dir.join(tmp_name(&name));
    let res = (|| -> std::io::Result<()> {
        fs::write(&tmp, contents)?;
        #[cfg(unix)]
        if executable {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o755))?;
        }
        #[cfg(not(unix))]
        let _ = executable;
        fs::rename(&tmp, dest)
    })();
    if let Err(e) = res {
        let _ = fs::remove_file(&tmp);
        return Err(PackError::generation(format!("cannot write {}: {}", dest.display(), e)));
    }
    Ok(())
}

fn copy_compressor(src: &Path, out_dir: &Path) -> Result<Option<PathBuf>> {
    if !src.is_file() {
        warn!(
            "compressor {} not found; the recipient must supply a 7z extractor",
            src.display()
        );
        return Ok(None);
    }
    let Some(name) = src.file_name() else {
        return Ok(None);
    };
    let dest = out_dir.join(name);
    let same = match (fs::canonicalize(src), fs::canonicalize(&dest)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if !same {
        fs::copy(src, &dest).map_err(|e| {
            PackError::generation(format!("failed to copy {}: {}", src.display(), e))
        })?;
    }
    Ok(Some(dest))
}

/// Render `template` for `volumes` into `<out_dir>/<flavor script name>`
/// and place a copy of `compressor` beside it.
///
/// The script is written to a temporary sibling and renamed into place, so
/// a failure never leaves a half-written script behind.
pub fn generate_unpack_kit(
    out_dir: &Path,
    volumes: &VolumeSet,
    template: &Template,
    flavor: ScriptFlavor,
    compressor: Option<&Path>,
) -> Result<UnpackKit> {
    let Some(last_index) = volumes.upper_bound() else {
        return Err(PackError::generation("no volumes to describe"));
    };
    for v in volumes {
        flavor.check_name(&v.file_name())?;
    }

    let compressor = match compressor {
        Some(src) => copy_compressor(src, out_dir)?,
        None => None,
    };

    let rendered =
        template.render(&SlotValues { volume_table: volume_table(flavor, volumes), last_index });
    let rendered = match flavor.line_ending() {
        "\n" => rendered,
        eol => rendered.replace("\r\n", "\n").replace('\n', eol),
    };

    let script = out_dir.join(flavor.file_name());
    write_atomically(&script, &rendered, flavor == ScriptFlavor::Shell)?;
    info!("unpack script generated: {}", script.display());
    Ok(UnpackKit { script, compressor })
}
