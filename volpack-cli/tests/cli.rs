use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::process::Command;

fn write_random(path: &Path, bytes: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<u8> = (0..bytes).map(|_| rng.gen()).collect();
    std::fs::write(path, data).unwrap();
}

/// Stand-in for 7zr: `$3` is the archive path, so it writes two native
/// volumes next to it. `exit_code` != 0 simulates a failed compression.
#[cfg(unix)]
fn fake_compressor(dir: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let p = dir.join("fake7z");
    let body = format!(
        "#!/bin/sh\nset -e\n[ {code} -eq 0 ] || exit {code}\nprintf 'first-volume' > \"$3.7z.001\"\nprintf 'second' > \"$3.7z.002\"\n",
        code = exit_code
    );
    std::fs::write(&p, body).unwrap();
    std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
    p
}

fn volpack() -> Command {
    Command::cargo_bin("volpack").unwrap()
}

#[test]
fn requires_inputs() {
    volpack().args(["pack"]).assert().failure();
}

#[test]
fn rejects_path_like_archive_name() {
    let td = assert_fs::TempDir::new().unwrap();
    td.child("a.txt").write_str("a").unwrap();
    volpack()
        .current_dir(td.path())
        .args(["pack", "--name", "../evil", "a.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("plain file name"));
}

#[test]
fn rejects_archive_name_with_record_delimiter() {
    let td = assert_fs::TempDir::new().unwrap();
    td.child("a.txt").write_str("a").unwrap();
    volpack()
        .current_dir(td.path())
        .args(["pack", "--flavor", "shell", "--name", "a|b", "a.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unusable archive name"));
    volpack()
        .current_dir(td.path())
        .args(["pack", "--flavor", "batch", "--name", "50%", "a.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unusable archive name"));
    td.child("output").assert(predicate::path::missing());
}

#[test]
fn missing_explicit_compressor_fails_at_tool_stage() {
    let td = assert_fs::TempDir::new().unwrap();
    td.child("a.txt").write_str("a").unwrap();
    volpack()
        .current_dir(td.path())
        .args(["pack", "--compressor", "no-such-7zr", "a.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Packing stopped at the tool stage"));
    td.child("output").assert(predicate::path::missing());
}

#[cfg(unix)]
#[test]
fn dry_run_prints_command_only() {
    let td = assert_fs::TempDir::new().unwrap();
    td.child("a.txt").write_str("a").unwrap();
    let tool = fake_compressor(td.path(), 0);
    volpack()
        .current_dir(td.path())
        .args(["pack", "--dry-run", "--size", "1", "-o", "out", "-n", "pack"])
        .arg("--compressor")
        .arg(&tool)
        .arg("a.txt")
        .assert()
        .success()
        .stdout(predicate::str::contains("a -t7z \"out/pack\" \"a.txt\""))
        .stdout(predicate::str::contains("-mx=9 -ms=200m -mf -mhc -mhcf -m0=LZMA -mmt -r"))
        .stdout(predicate::str::ends_with("-v1048576k\n"));
    td.child("out").assert(predicate::path::missing());
}

#[cfg(unix)]
#[test]
fn pack_verify_join_happy_path() {
    let td = assert_fs::TempDir::new().unwrap();
    write_random(&td.child("a.bin").path(), 4096, 1);
    write_random(&td.child("b.bin").path(), 4096, 2);
    let tool = fake_compressor(td.path(), 0);

    volpack()
        .current_dir(td.path())
        .args(["pack", "-o", "out", "-n", "pack", "--flavor", "shell"])
        .arg("--compressor")
        .arg(&tool)
        .args(["a.bin", "b.bin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 volume(s) to out"))
        .stdout(predicate::str::contains("Compressor copied"));

    let out = td.child("out");
    out.child("pack.001").assert("first-volume");
    out.child("pack.002").assert("second");
    out.child("pack.7z.001").assert(predicate::path::missing());
    out.child("fake7z").assert(predicate::path::is_file());
    out.child("pack.manifest.json").assert(predicate::path::is_file());

    let script = std::fs::read_to_string(out.child("unpacker.sh").path()).unwrap();
    let records: Vec<&str> = script.lines().filter(|l| l.starts_with("files[")).collect();
    assert_eq!(records.len(), 2);
    assert!(records[0].starts_with("files[0]='pack.001|"));
    assert!(records[1].starts_with("files[1]='pack.002|"));
    assert!(script.lines().any(|l| l == "last=1"));

    volpack()
        .current_dir(td.path())
        .args(["verify", "out", "-n", "pack"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));

    volpack()
        .current_dir(td.path())
        .args(["join", "out", "joined.7z", "-n", "pack"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Joined 18 bytes"));
    td.child("joined.7z").assert("first-volumesecond");

    // Damage one volume: verify reports it and join refuses.
    out.child("pack.002").write_str("SECOND").unwrap();
    volpack()
        .current_dir(td.path())
        .args(["verify", "out", "-n", "pack"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("BAD"))
        .stderr(predicate::str::contains("digest mismatch: pack.002"));
    volpack()
        .current_dir(td.path())
        .args(["join", "out", "rejoined.7z", "-n", "pack"])
        .assert()
        .failure();
    td.child("rejoined.7z").assert(predicate::path::missing());
}

#[cfg(unix)]
#[test]
fn failing_compressor_leaves_no_script() {
    let td = assert_fs::TempDir::new().unwrap();
    td.child("a.txt").write_str("a").unwrap();
    let tool = fake_compressor(td.path(), 3);
    volpack()
        .current_dir(td.path())
        .args(["pack", "-o", "out", "-n", "pack", "--flavor", "shell"])
        .arg("--compressor")
        .arg(&tool)
        .arg("a.txt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Packing stopped at the compression stage"));
    td.child("out/unpacker.sh").assert(predicate::path::missing());
    td.child("out/pack.manifest.json").assert(predicate::path::missing());
}

#[cfg(unix)]
#[test]
fn include_filter_narrows_directory_inputs() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = td.child("data");
    data.create_dir_all().unwrap();
    data.child("keep.txt").write_str("k").unwrap();
    data.child("skip.log").write_str("s").unwrap();
    let tool = fake_compressor(td.path(), 0);
    volpack()
        .current_dir(td.path())
        .args(["pack", "--dry-run", "--include", "**/*.txt"])
        .arg("--compressor")
        .arg(&tool)
        .arg("data")
        .assert()
        .success()
        .stdout(predicate::str::contains("keep.txt"))
        .stdout(predicate::str::contains("skip.log").not());
}

#[test]
fn verify_without_manifest_fails() {
    let td = assert_fs::TempDir::new().unwrap();
    td.child("out").create_dir_all().unwrap();
    volpack()
        .current_dir(td.path())
        .args(["verify", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("archive.manifest.json"));
}
