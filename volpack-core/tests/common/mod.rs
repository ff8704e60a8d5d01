#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use volpack_core::command::{Arg, CompressorCommand};
use volpack_core::compressor::Compressor;
use volpack_core::PackError;

/// Writes `<out>/<name>.7z.NNN` files the way 7z would, without compressing.
pub struct FakeCompressor {
    pub first_index: u16,
    pub volumes: Vec<Vec<u8>>,
}

impl FakeCompressor {
    pub fn new(volumes: Vec<Vec<u8>>) -> Self {
        Self { first_index: 0, volumes }
    }
}

impl Compressor for FakeCompressor {
    fn run(&self, cmd: &CompressorCommand) -> volpack_core::Result<()> {
        let Arg::Path(base) = &cmd.args[2] else {
            panic!("archive path expected at position 2: {cmd}");
        };
        for (i, data) in self.volumes.iter().enumerate() {
            let p = format!("{}.7z.{:03}", base.display(), self.first_index as usize + i);
            fs::write(p, data).unwrap();
        }
        Ok(())
    }
}

pub struct FailingCompressor;

impl Compressor for FailingCompressor {
    fn run(&self, cmd: &CompressorCommand) -> volpack_core::Result<()> {
        Err(PackError::Compression(format!("{} exited with 2", cmd.program.display())))
    }
}

/// Placeholder compressor binary so the tool stage succeeds.
pub fn dummy_tool(dir: &Path) -> PathBuf {
    let tools = dir.join("tools");
    fs::create_dir_all(&tools).unwrap();
    let p = tools.join("7zr");
    fs::write(&p, b"not really 7zr").unwrap();
    p
}

pub fn names_in(dir: &Path) -> Vec<String> {
    let mut v: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    v.sort();
    v
}
