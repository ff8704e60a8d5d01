use crate::error::{PackError, Result};
use crate::manifest::manifest_file_name;
use crate::script::ScriptFlavor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Native 7z multi-volume marker between the base name and the index.
const NATIVE_MARKER: &str = ".7z.";

/// Canonical volume filename for `index`: `<base>.NNN`.
pub fn volume_file_name(base: &str, index: u16) -> String {
    format!("{}.{:03}", base, index)
}

fn three_digits(s: &str) -> Option<u16> {
    if s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

/// Index of `name` if it is exactly `<base>.7z.NNN`.
pub fn native_volume_index(name: &str, base: &str) -> Option<u16> {
    name.strip_prefix(base)?.strip_prefix(NATIVE_MARKER).and_then(three_digits)
}

/// Index of `name` if it is exactly `<base>.NNN`.
pub fn canonical_volume_index(name: &str, base: &str) -> Option<u16> {
    name.strip_prefix(base)?.strip_prefix('.').and_then(three_digits)
}

/// Which non-volume files a pre-run cleanup may delete.
///
/// Volumes (`<base>.NNN` and `<base>.7z.NNN`) are always eligible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Generated unpack scripts (`unpacker.bat`, `unpacker.sh`).
    pub scripts: bool,
    /// `<base>.manifest.json`.
    pub manifest: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self { scripts: true, manifest: true }
    }
}

impl CleanupPolicy {
    fn is_eligible(&self, name: &str, base: &str) -> bool {
        if canonical_volume_index(name, base).is_some() || native_volume_index(name, base).is_some()
        {
            return true;
        }
        if self.scripts && ScriptFlavor::ALL.iter().any(|f| f.file_name() == name) {
            return true;
        }
        self.manifest && name == manifest_file_name(base)
    }
}

fn regular_file_names(dir: &Path) -> std::io::Result<Vec<(PathBuf, String)>> {
    let mut out = Vec::new();
    for ent in fs::read_dir(dir)? {
        let ent = ent?;
        if !ent.file_type()?.is_file() {
            continue;
        }
        // Non-UTF-8 names can never match a volume pattern.
        if let Some(name) = ent.file_name().to_str() {
            out.push((ent.path(), name.to_string()));
        }
    }
    Ok(out)
}

/// Delete stale volumes (and, per `policy`, scripts/manifest) left in
/// `dir` by an earlier run for `base`. A missing `dir` is created instead.
/// Returns the deleted paths.
pub fn cleanup_stale(dir: &Path, base: &str, policy: CleanupPolicy) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .map_err(|source| PackError::Cleanup { path: dir.to_path_buf(), source })?;
        debug!(?dir, "created output directory");
        return Ok(Vec::new());
    }
    let entries = regular_file_names(dir)
        .map_err(|source| PackError::Cleanup { path: dir.to_path_buf(), source })?;
    let mut deleted = Vec::new();
    for (path, name) in entries {
        if !policy.is_eligible(&name, base) {
            continue;
        }
        fs::remove_file(&path)
            .map_err(|source| PackError::Cleanup { path: path.clone(), source })?;
        info!("Deleted: {}", path.display());
        deleted.push(path);
    }
    Ok(deleted)
}

/// Rename every `<base>.7z.NNN` in `dir` to `<base>.NNN`.
///
/// The result is in directory iteration order; callers sort it. A failed
/// rename aborts immediately and leaves earlier renames in place.
pub fn rename_volumes(dir: &Path, base: &str) -> Result<Vec<PathBuf>> {
    let entries = regular_file_names(dir)
        .map_err(|source| PackError::Rename { path: dir.to_path_buf(), source })?;
    let mut renamed = Vec::new();
    for (old, name) in entries {
        let Some(idx) = native_volume_index(&name, base) else {
            continue;
        };
        let new = dir.join(volume_file_name(base, idx));
        fs::rename(&old, &new).map_err(|source| PackError::Rename { path: old.clone(), source })?;
        info!("Renamed: {} -> {}", name, volume_file_name(base, idx));
        renamed.push(new);
    }
    Ok(renamed)
}

/// Sort volume paths by file name; the 3-digit suffix makes this index order.
pub fn sort_volumes(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VolumeDescriptor {
    pub path: PathBuf,
    pub digest_hex: String,
}

impl VolumeDescriptor {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Ordered volumes of one packing run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VolumeSet {
    volumes: Vec<VolumeDescriptor>,
}

impl VolumeSet {
    /// Build from `(path, digest)` pairs already in index order.
    pub fn from_sorted<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, String)>,
    {
        let volumes = pairs
            .into_iter()
            .map(|(path, digest_hex)| VolumeDescriptor { path, digest_hex })
            .collect();
        Self { volumes }
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VolumeDescriptor> {
        self.volumes.iter()
    }

    /// Inclusive upper loop bound used by unpack scripts (`len - 1`).
    pub fn upper_bound(&self) -> Option<usize> {
        self.volumes.len().checked_sub(1)
    }
}

impl<'a> IntoIterator for &'a VolumeSet {
    type Item = &'a VolumeDescriptor;
    type IntoIter = std::slice::Iter<'a, VolumeDescriptor>;
    fn into_iter(self) -> Self::IntoIter {
        self.volumes.iter()
    }
}
