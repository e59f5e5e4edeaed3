// Copyright 2024 Tuxedo Computers
//
// SPDX-License-Identifier: GPL-3.0-only

//! Generic typed accessor over sysfs-shaped key/value files.
//!
//! No caching is performed here: every call hits the filesystem and the
//! caller is responsible for polling at whatever cadence its worker uses.
//! Errors (missing file, permission denied, parse failure) are absorbed into
//! `None` / `false` — the only distinction a caller can make between
//! "unsupported" and "transient" is by retrying.

use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Returns true if `path` exists at all. Cheap existence probe used by
/// capability detection (`is_available`).
pub fn is_available<P: AsRef<Path>>(path: P) -> bool { path.as_ref().exists() }

/// Reads and parses a single scalar value, trimming surrounding whitespace.
pub fn read<T, P>(path: P) -> Option<T>
where
    T: FromStr,
    P: AsRef<Path>,
{
    fs::read_to_string(path).ok().and_then(|raw| raw.trim().parse::<T>().ok())
}

/// Reads the raw trimmed string contents of a file.
pub fn read_string<P: AsRef<Path>>(path: P) -> Option<String> {
    fs::read_to_string(path).ok().map(|raw| raw.trim().to_owned())
}

/// Reads a whitespace-delimited list of parsed values, e.g.
/// `scaling_available_frequencies`.
pub fn read_list<T, P>(path: P) -> Option<Vec<T>>
where
    T: FromStr,
    P: AsRef<Path>,
{
    fs::read_to_string(path).ok().map(|raw| raw.split_whitespace().filter_map(|s| s.parse::<T>().ok()).collect())
}

/// Reads a whitespace-delimited list of strings, e.g. the available-governors
/// list.
pub fn read_string_list<P: AsRef<Path>>(path: P) -> Option<Vec<String>> {
    fs::read_to_string(path).ok().map(|raw| raw.split_whitespace().map(str::to_owned).collect())
}

/// Writes a scalar value, returning whether the write succeeded.
pub fn write<T, P>(path: P, value: T) -> bool
where
    T: Display,
    P: AsRef<Path>,
{
    fs::write(path, format!("{}", value)).is_ok()
}

/// Writes a raw byte string (used for single-character kernel switches such
/// as `0`/`1`/`2`).
pub fn write_bytes<P: AsRef<Path>>(path: P, value: &[u8]) -> bool { fs::write(path, value).is_ok() }

/// Joins a base directory and a relative component into a `PathBuf`. Thin
/// convenience used throughout the per-core / per-fan accessors below so call
/// sites read as `sys_path(core).join("scaling_governor")`.
pub fn join<P: AsRef<Path>>(base: P, component: &str) -> PathBuf { base.as_ref().join(component) }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_and_write_roundtrip() {
        let dir = std::env::temp_dir().join(format!("uccd-sysfs-test-{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("value");

        assert!(!is_available(&path));
        assert!(write(&path, 42));
        assert!(is_available(&path));
        assert_eq!(read::<i32, _>(&path), Some(42));

        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"  7 \n").unwrap();
        assert_eq!(read::<u32, _>(&path), Some(7));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn read_list_splits_on_whitespace() {
        let dir = std::env::temp_dir().join(format!("uccd-sysfs-test-list-{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("list");
        fs::write(&path, "800000 1200000  1600000\n").unwrap();

        assert_eq!(read_list::<u64, _>(&path), Some(vec![800_000, 1_200_000, 1_600_000]));
        assert_eq!(read_string_list(&path), Some(vec!["800000".into(), "1200000".into(), "1600000".into()]));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_path_yields_none() {
        assert_eq!(read::<i32, _>("/nonexistent/uccd/path"), None);
        assert!(!write("/nonexistent/uccd/path/value", 1));
    }
}
