use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Writes an executable shell script named `rhoas` into `dir`.
pub fn fake_cli(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("rhoas");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Number of times the fake cli recorded an attempt in `file`.
pub fn attempts(dir: &Path, file: &str) -> u32 {
    fs::read_to_string(dir.join(file))
        .map(|count| count.trim().parse().unwrap())
        .unwrap_or(0)
}
