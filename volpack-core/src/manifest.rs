use crate::digest::DigestAlgorithm;
use crate::error::{PackError, Result};
use crate::volume::VolumeSet;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// `<base>.manifest.json`
pub fn manifest_file_name(base: &str) -> String {
    format!("{}.manifest.json", base)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VolumeRecord {
    pub index: usize,
    pub name: String,
    pub size: u64,
    pub digest_hex: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PackManifest {
    pub created_utc: String,
    pub archive_name: String,
    pub algorithm: DigestAlgorithm,
    pub volume_size_kb: u64,
    pub script: String,
    pub volumes: Vec<VolumeRecord>,
}

impl PackManifest {
    pub fn new(
        archive_name: &str,
        algorithm: DigestAlgorithm,
        volume_size_kb: u64,
        script: &str,
        set: &VolumeSet,
    ) -> Result<Self> {
        let mut volumes = Vec::with_capacity(set.len());
        for (index, v) in set.iter().enumerate() {
            let size = std::fs::metadata(&v.path)
                .map_err(|source| PackError::Read { path: v.path.clone(), source })?
                .len();
            volumes.push(VolumeRecord {
                index,
                name: v.file_name(),
                size,
                digest_hex: v.digest_hex.clone(),
            });
        }
        Ok(Self {
            created_utc: chrono::Utc::now().to_rfc3339(),
            archive_name: archive_name.to_string(),
            algorithm,
            volume_size_kb,
            script: script.to_string(),
            volumes,
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.volumes.iter().map(|v| v.size).sum()
    }

    /// Write as pretty JSON to `<dir>/<base>.manifest.json`.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(manifest_file_name(&self.archive_name));
        let err = |message: String| PackError::Manifest { path: path.clone(), message };
        let f = File::create(&path).map_err(|e| err(e.to_string()))?;
        serde_json::to_writer_pretty(f, self).map_err(|e| err(e.to_string()))?;
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let err = |message: String| PackError::Manifest { path: path.to_path_buf(), message };
        let f = File::open(path).map_err(|e| err(e.to_string()))?;
        serde_json::from_reader(f).map_err(|e| err(e.to_string()))
    }
}
