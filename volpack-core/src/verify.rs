use crate::digest::digest_file;
use crate::error::{PackError, Result};
use crate::manifest::PackManifest;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub volumes_ok: usize,
    pub mismatched: Vec<String>,
    pub missing: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty()
    }
}

/// Recompute every volume digest under `dir` and compare it with the
/// manifest, case-insensitively.
pub fn verify(manifest: &PackManifest, dir: &Path) -> Result<VerifyReport> {
    let mut rep = VerifyReport::default();
    for v in &manifest.volumes {
        let p = dir.join(&v.name);
        if !p.is_file() {
            rep.missing.push(v.name.clone());
            continue;
        }
        let actual = digest_file(&p, manifest.algorithm)?;
        if actual.eq_ignore_ascii_case(v.digest_hex.trim()) {
            rep.volumes_ok += 1;
        } else {
            rep.mismatched.push(v.name.clone());
        }
    }
    Ok(rep)
}

/// Verify, then concatenate the volumes in index order into `dest`.
/// Returns the number of bytes written.
pub fn reassemble(manifest: &PackManifest, dir: &Path, dest: &Path) -> Result<u64> {
    let rep = verify(manifest, dir)?;
    if !rep.is_clean() {
        return Err(PackError::Integrity(format!(
            "missing: [{}], mismatched: [{}]",
            rep.missing.join(", "),
            rep.mismatched.join(", ")
        )));
    }
    let write_err = |e: std::io::Error| {
        PackError::Integrity(format!("cannot write {}: {}", dest.display(), e))
    };
    let mut out = BufWriter::new(File::create(dest).map_err(write_err)?);
    let mut total = 0u64;
    let mut ordered: Vec<_> = manifest.volumes.iter().collect();
    ordered.sort_by_key(|v| v.index);
    for v in ordered {
        let p = dir.join(&v.name);
        let mut f =
            File::open(&p).map_err(|source| PackError::Read { path: p.clone(), source })?;
        total += std::io::copy(&mut f, &mut out).map_err(write_err)?;
        info!("joined {}", v.name);
    }
    out.flush().map_err(write_err)?;
    Ok(total)
}
