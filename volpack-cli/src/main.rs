use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use globset::{Glob, GlobSetBuilder};
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use volpack_core::command::{build_command, gib_to_kib};
use volpack_core::compressor::SystemCompressor;
use volpack_core::digest::DigestAlgorithm;
use volpack_core::localize::Messages;
use volpack_core::manifest::{manifest_file_name, PackManifest};
use volpack_core::pipeline::{PackOptions, PackingRequest, Pipeline};
use volpack_core::script::ScriptFlavor;
use volpack_core::tool::ToolLocator;
use volpack_core::verify;
use volpack_core::volume::CleanupPolicy;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FlavorArg { Batch, Shell }

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AlgoArg { Sha256, Blake3 }

#[derive(Parser)]
#[command(name="volpack", version, about="Split files into verified 7z volumes with a self-checking unpack script")]
struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)] cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Compress inputs into volumes and generate the unpack kit
    Pack {
        #[arg(short, long, default_value = "output")] output: PathBuf,
        #[arg(short, long, default_value = "archive")] name: String,
        /// Volume size in GiB
        #[arg(short, long, default_value_t = 10.0)] size: f64,
        /// Compressor binary (default: next to volpack, then PATH)
        #[arg(long)] compressor: Option<PathBuf>,
        /// Download 7zr.exe next to volpack when no compressor is found
        #[arg(long, default_value_t = false)] fetch_tool: bool,
        #[arg(long, value_enum)] flavor: Option<FlavorArg>,
        #[arg(long, value_enum, default_value_t = AlgoArg::Sha256)] algorithm: AlgoArg,
        /// Custom script template with @@VOLUME_TABLE@@ and @@LAST_INDEX@@ markers
        #[arg(long)] template: Option<PathBuf>,
        /// Leave unpack scripts and manifest from earlier runs in place
        #[arg(long, default_value_t = false)] keep_previous_script: bool,
        #[arg(long, default_value_t = false)] no_manifest: bool,
        #[arg(long)] include: Vec<String>,
        #[arg(long)] exclude: Vec<String>,
        /// Print the compressor command and exit
        #[arg(long, default_value_t = false)] dry_run: bool,
        /// Wait for Enter before exiting
        #[arg(long, default_value_t = false)] pause: bool,
        #[arg(required = true)] inputs: Vec<PathBuf>,
    },
    /// Check volumes in a directory against their manifest
    Verify {
        dir: PathBuf,
        #[arg(short, long, default_value = "archive")] name: String,
    },
    /// Verify, then concatenate volumes into one .7z file
    Join {
        dir: PathBuf,
        dest: PathBuf,
        #[arg(short, long, default_value = "archive")] name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let msgs = Messages::builtin("en-GB")?;
    match cli.cmd {
        Cmd::Pack { output, name, size, compressor, fetch_tool, flavor, algorithm, template, keep_previous_script, no_manifest, include, exclude, dry_run, pause, inputs } => {
            let res = pack(&msgs, PackArgs { output, name, size, compressor, fetch_tool, flavor, algorithm, template, keep_previous_script, no_manifest, include, exclude, dry_run, inputs });
            if pause { wait_for_enter(&msgs); }
            res?;
        }
        Cmd::Verify { dir, name } => verify_dir(&msgs, &dir, &name)?,
        Cmd::Join { dir, dest, name } => join(&msgs, &dir, &dest, &name)?,
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose { 0 => "info", 1 => "debug", _ => "trace" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn wait_for_enter(msgs: &Messages) {
    eprintln!("{}", msgs.msg("pause-prompt", &[]));
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}

struct PackArgs {
    output: PathBuf,
    name: String,
    size: f64,
    compressor: Option<PathBuf>,
    fetch_tool: bool,
    flavor: Option<FlavorArg>,
    algorithm: AlgoArg,
    template: Option<PathBuf>,
    keep_previous_script: bool,
    no_manifest: bool,
    include: Vec<String>,
    exclude: Vec<String>,
    dry_run: bool,
    inputs: Vec<PathBuf>,
}

fn validate_name(name: &str, flavor: ScriptFlavor) -> Result<()> {
    if name.is_empty() { bail!("archive name must not be empty"); }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        bail!("archive name must be a plain file name: {}", name);
    }
    flavor.check_name(name).with_context(|| format!("unusable archive name {:?}", name))?;
    Ok(())
}

fn build_globset(includes: &[String], excludes: &[String]) -> Result<(globset::GlobSet, globset::GlobSet)> {
    let mut incb = GlobSetBuilder::new();
    let mut excb = GlobSetBuilder::new();
    if includes.is_empty() { incb.add(Glob::new("**/*")?); }
    for g in includes { incb.add(Glob::new(g)?); }
    for g in excludes { excb.add(Glob::new(g)?); }
    Ok((incb.build()?, excb.build()?))
}

/// Expand directory inputs into their matching files. Without filters the
/// inputs are passed through and the compressor recurses on its own.
fn resolve_inputs(inputs: &[PathBuf], includes: &[String], excludes: &[String]) -> Result<Vec<PathBuf>> {
    for p in inputs {
        fs::metadata(p).with_context(|| format!("stat {}", p.display()))?;
    }
    if includes.is_empty() && excludes.is_empty() {
        return Ok(inputs.to_vec());
    }
    let (inc, exc) = build_globset(includes, excludes)?;
    let cwd = std::env::current_dir()?;
    let mut v = vec![];
    for p in inputs {
        if !p.is_dir() { v.push(p.clone()); continue; }
        for e in WalkDir::new(p).into_iter().filter_map(|e| e.ok()) {
            if !e.file_type().is_file() { continue; }
            let path = e.path();
            let rp = pathdiff::diff_paths(path, &cwd).unwrap_or_else(|| path.to_path_buf());
            let rp_str = rp.to_string_lossy().replace('\\', "/");
            if inc.is_match(&rp_str) && !exc.is_match(&rp_str) { v.push(path.to_path_buf()); }
        }
    }
    if v.is_empty() { bail!("no input files left after --include/--exclude filtering"); }
    v.sort();
    Ok(v)
}

fn locator_for(args: &PackArgs) -> ToolLocator {
    if let Some(p) = &args.compressor { return ToolLocator::new().explicit(p); }
    let mut loc = ToolLocator::new();
    if let Some(dir) = std::env::current_exe().ok().as_deref().and_then(Path::parent) {
        loc = loc.search_dir(dir);
        if args.fetch_tool { loc = loc.fetch_into(dir); }
    }
    loc
}

fn pack(msgs: &Messages, args: PackArgs) -> Result<()> {
    let flavor = args.flavor.map(|f| match f { FlavorArg::Batch => ScriptFlavor::Batch, FlavorArg::Shell => ScriptFlavor::Shell });
    validate_name(&args.name, flavor.unwrap_or_else(ScriptFlavor::native))?;
    if !(args.size.is_finite() && args.size > 0.0) { bail!("volume size must be a positive number of GiB"); }
    let inputs = resolve_inputs(&args.inputs, &args.include, &args.exclude)?;
    let volume_size_kb = gib_to_kib(args.size);
    tracing::info!(inputs = inputs.len(), output = %args.output.display(), name = %args.name, volume_size_kb, "packing");

    let locator = locator_for(&args);
    if args.dry_run {
        let tool = locator.locate()?;
        println!("{}", build_command(&tool, &args.output, &args.name, &inputs, volume_size_kb));
        return Ok(());
    }

    let options = PackOptions {
        algorithm: match args.algorithm { AlgoArg::Sha256 => DigestAlgorithm::Sha256, AlgoArg::Blake3 => DigestAlgorithm::Blake3 },
        flavor,
        cleanup: CleanupPolicy { scripts: !args.keep_previous_script, manifest: !args.keep_previous_script },
        template: args.template,
        write_manifest: !args.no_manifest,
    };
    let request = PackingRequest { inputs, output_dir: args.output.clone(), archive_name: args.name.clone(), volume_size_kb };
    let pipeline = Pipeline::new(SystemCompressor, locator, options);
    let report = match pipeline.run(&request) {
        Ok(r) => r,
        Err(f) => {
            eprintln!("{}", msgs.msg("pack-stage-failed", &[("stage", f.stage.to_string().as_str())]));
            return Err(f.into());
        }
    };

    let dir = args.output.display().to_string();
    println!("{}", msgs.msg("pack-volumes", &[("count", report.volumes.len().to_string().as_str()), ("dir", dir.as_str())]));
    println!("{}", msgs.msg("pack-script", &[("path", report.kit.script.display().to_string().as_str())]));
    match &report.kit.compressor {
        Some(p) => println!("{}", msgs.msg("pack-compressor-copied", &[("path", p.display().to_string().as_str())])),
        None => println!("{}", msgs.msg("pack-compressor-missing", &[])),
    }
    if let Some(p) = &report.manifest {
        println!("{}", msgs.msg("pack-manifest", &[("path", p.display().to_string().as_str())]));
    }
    Ok(())
}

fn load_manifest(dir: &Path, name: &str) -> Result<PackManifest> {
    let path = dir.join(manifest_file_name(name));
    PackManifest::read(&path).with_context(|| format!("read {}", path.display()))
}

fn verify_dir(msgs: &Messages, dir: &Path, name: &str) -> Result<()> {
    let mf = load_manifest(dir, name)?;
    let rep = verify::verify(&mf, dir)?;
    for n in &rep.missing { eprintln!("missing: {}", n); }
    for n in &rep.mismatched { eprintln!("digest mismatch: {}", n); }
    eprintln!("{}", msgs.msg("verify-summary", &[
        ("ok", rep.volumes_ok.to_string().as_str()),
        ("bad", rep.mismatched.len().to_string().as_str()),
        ("missing", rep.missing.len().to_string().as_str()),
    ]));
    if rep.is_clean() {
        println!("{}", msgs.msg("verify-ok", &[]));
        Ok(())
    } else {
        println!("{}", msgs.msg("verify-bad", &[]));
        bail!("{} volume(s) failed verification", rep.missing.len() + rep.mismatched.len())
    }
}

fn join(msgs: &Messages, dir: &Path, dest: &Path, name: &str) -> Result<()> {
    let mf = load_manifest(dir, name)?;
    let bytes = verify::reassemble(&mf, dir, dest)?;
    println!("{}", msgs.msg("join-done", &[("bytes", bytes.to_string().as_str()), ("path", dest.display().to_string().as_str())]));
    Ok(())
}
