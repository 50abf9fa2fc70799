// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Non-destructive destination naming

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Split a file name into stem and extension (without the dot)
///
/// Names need not be valid UTF-8.
pub fn split_name(file_name: &OsStr) -> (&OsStr, Option<&OsStr>) {
    let path = Path::new(file_name);
    (path.file_stem().unwrap_or(file_name), path.extension())
}

/// Candidate name for collision attempt `n` (0 = the name itself)
pub fn numbered_name(stem: &OsStr, ext: Option<&OsStr>, n: u32) -> OsString {
    let mut name = stem.to_os_string();
    if n > 0 {
        name.push(format!("_{}", n));
    }
    if let Some(ext) = ext {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Iterate `name`, `stem_1.ext`, `stem_2.ext`, ... inside `dir`
pub fn candidates<'a>(
    dir: &'a Path,
    stem: &'a OsStr,
    ext: Option<&'a OsStr>,
) -> impl Iterator<Item = PathBuf> + 'a {
    (0..).map(move |n| dir.join(numbered_name(stem, ext, n)))
}

/// First path in `dir` that does not exist yet. Never returns an existing path.
pub fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let (stem, ext) = split_name(file_name);
    candidates(dir, stem, ext)
        .find(|p| !p.exists())
        .unwrap_or_else(|| dir.join(file_name))
}
