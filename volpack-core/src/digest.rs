use crate::error::{PackError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

const READ_BUF: usize = 1024 * 1024;

/// Content digest used for volumes. Both produce 32 bytes (64 hex chars).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl DigestAlgorithm {
    pub const DIGEST_LEN: usize = 32;

    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Blake3 => "blake3",
        }
    }
}

enum Hasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algo: DigestAlgorithm) -> Self {
        match algo {
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, buf: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(buf),
            Hasher::Blake3(h) => {
                h.update(buf);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

impl Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Lowercase hex digest of one file, read as raw bytes.
pub fn digest_file(path: &Path, algo: DigestAlgorithm) -> Result<String> {
    let read_err = |source| PackError::Read { path: path.to_path_buf(), source };
    let f = File::open(path).map_err(read_err)?;
    let mut r = BufReader::with_capacity(READ_BUF, f);
    let mut hasher = Hasher::new(algo);
    io::copy(&mut r, &mut hasher).map_err(read_err)?;
    Ok(hasher.finalize_hex())
}

/// Digest every path, keeping input order. The first unreadable file
/// aborts the batch.
pub fn digest_files(paths: &[PathBuf], algo: DigestAlgorithm) -> Result<Vec<String>> {
    paths.iter().map(|p| digest_file(p, algo)).collect()
}
