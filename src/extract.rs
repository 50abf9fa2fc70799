// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image extraction into a flat staging folder
//!
//! Files directly under the source root are handled first, then every file
//! of every subdirectory. Images are recognised by extension, or by magic
//! bytes when the extension says nothing, and copied (never moved) into
//! `<destination>/<staging>` when both sides reach the minimum size.

use serde::Serialize;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::detect::{FileRecord, SignatureTable};
use crate::imaging::meets_minimum;
use crate::naming::{candidates, split_name};
use crate::Result;

/// What happened to one scanned file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Copied into staging at the given path
    Copied(PathBuf),
    /// An identical copy from an earlier run was already staged there
    Reused(PathBuf),
    NotImage,
    TooSmall,
    Failed,
}

/// Counters for one extraction pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    pub staging_dir: PathBuf,
    pub total_files: usize,
    /// Images available in staging after this pass (copied + reused)
    pub staged: usize,
    pub copied: usize,
    pub reused: usize,
    pub skipped_small: usize,
    pub failed: usize,
}

impl ExtractionReport {
    fn record(&mut self, outcome: &StageOutcome) {
        self.total_files += 1;
        match outcome {
            StageOutcome::Copied(_) => {
                self.copied += 1;
                self.staged += 1;
            }
            StageOutcome::Reused(_) => {
                self.reused += 1;
                self.staged += 1;
            }
            StageOutcome::TooSmall => self.skipped_small += 1,
            StageOutcome::Failed => self.failed += 1,
            StageOutcome::NotImage => {}
        }
    }
}

/// Walks a source tree and stages qualifying images
#[derive(Debug, Clone)]
pub struct Extractor {
    signatures: SignatureTable,
    staging_dir: String,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(SignatureTable::default())
    }
}

impl Extractor {
    pub fn new(signatures: SignatureTable) -> Self {
        Self {
            signatures,
            staging_dir: "images".to_string(),
        }
    }

    pub fn with_staging_dir(mut self, name: impl Into<String>) -> Self {
        self.staging_dir = name.into();
        self
    }

    /// Staging folder for a given destination root
    pub fn staging_path(&self, destination: &Path) -> PathBuf {
        destination.join(&self.staging_dir)
    }

    /// Stage every image under `source` that is at least `min_size` on both sides
    pub fn extract(&self, source: &Path, destination: &Path, min_size: u32) -> Result<ExtractionReport> {
        self.extract_excluding(source, destination, min_size, &[])
    }

    /// Like [`Extractor::extract`], but never descends into `exclude`d directories
    ///
    /// The staging folder itself is always excluded.
    pub fn extract_excluding(
        &self,
        source: &Path,
        destination: &Path,
        min_size: u32,
        exclude: &[PathBuf],
    ) -> Result<ExtractionReport> {
        let staging = self.staging_path(destination);
        fs::create_dir_all(&staging)?;

        let root = canonical(source);
        let mut excluded: HashSet<PathBuf> = exclude.iter().map(|p| canonical(p)).collect();
        excluded.insert(canonical(&staging));

        let mut report = ExtractionReport {
            staging_dir: staging.clone(),
            ..Default::default()
        };
        let mut staged_now: HashSet<PathBuf> = HashSet::new();

        let direct = root_files(&root)?;
        if !direct.is_empty() {
            info!("Found {} files in root directory", direct.len());
        }
        for path in direct {
            let outcome = self.stage_file(&path, &staging, min_size, &mut staged_now);
            report.record(&outcome);
        }

        let walker = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && excluded.contains(e.path())));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                info!("Processing directory: {}", relative.display());
                continue;
            }

            // Root-level files were handled above
            if entry.depth() < 2 || !entry.file_type().is_file() {
                continue;
            }

            let outcome = self.stage_file(entry.path(), &staging, min_size, &mut staged_now);
            report.record(&outcome);
        }

        info!(
            "Extracted {} images out of {} total files",
            report.staged, report.total_files
        );
        Ok(report)
    }

    /// Route one file through detection, size filtering and copying
    pub fn stage_file(
        &self,
        path: &Path,
        staging: &Path,
        min_size: u32,
        staged_now: &mut HashSet<PathBuf>,
    ) -> StageOutcome {
        let record = FileRecord::inspect(path, &self.signatures);
        if !record.is_image() {
            return StageOutcome::NotImage;
        }

        let Some(file_name) = path.file_name() else {
            warn!("Skipping path without a file name: {:?}", path);
            return StageOutcome::Failed;
        };
        let shown = file_name.to_string_lossy();

        if !meets_minimum(path, min_size) {
            warn!("Skipped {} (too small: < {}x{})", shown, min_size, min_size);
            return StageOutcome::TooSmall;
        }

        let target_name = staged_name(&record, file_name);
        let (stem, ext) = split_name(&target_name);

        for candidate in candidates(staging, stem, ext) {
            if !candidate.exists() {
                return match copy_preserving(path, &candidate) {
                    Ok(()) => {
                        info!("Copied: {} → {}", shown, display_tail(staging, &candidate));
                        staged_now.insert(candidate.clone());
                        StageOutcome::Copied(candidate)
                    }
                    Err(e) => {
                        error!("Failed copying {:?}: {}", path, e);
                        StageOutcome::Failed
                    }
                };
            }

            if !staged_now.contains(&candidate) && same_content(path, &candidate) {
                debug!("Already staged: {} as {:?}", shown, candidate);
                staged_now.insert(candidate.clone());
                return StageOutcome::Reused(candidate);
            }
        }

        StageOutcome::Failed
    }
}

/// Keep names that already carry an image extension, otherwise use the sniffed format
fn staged_name(record: &FileRecord, file_name: &OsStr) -> OsString {
    match (&record.format, record.by_extension) {
        (Some(format), false) => {
            let mut name = split_name(file_name).0.to_os_string();
            name.push(".");
            name.push(format);
            name
        }
        _ => file_name.to_os_string(),
    }
}

fn root_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn display_tail(staging: &Path, file: &Path) -> String {
    let dir = staging.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    format!("{}/{}", dir, name)
}

/// Copy a file, carrying over permissions and modification time
fn copy_preserving(source: &Path, dest: &Path) -> std::io::Result<()> {
    fs::copy(source, dest)?;

    if let Ok(mtime) = fs::metadata(source).and_then(|m| m.modified()) {
        let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime));
    }

    Ok(())
}

/// Byte-identical check: sizes first, then BLAKE3 digests
fn same_content(a: &Path, b: &Path) -> bool {
    let (Ok(meta_a), Ok(meta_b)) = (fs::metadata(a), fs::metadata(b)) else {
        return false;
    };
    if meta_a.len() != meta_b.len() {
        return false;
    }

    match (file_digest(a), file_digest(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

fn file_digest(path: &Path) -> std::io::Result<blake3::Hash> {
    let data = fs::read(path)?;
    Ok(blake3::hash(&data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::fixtures::write_rgb;
    use tempfile::tempdir;

    fn staged_names(report: &ExtractionReport) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&report.staging_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_filters_by_size_and_type() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_rgb(&src.path().join("large.jpg"), 800, 800);
        write_rgb(&src.path().join("small.jpg"), 400, 400);
        fs::write(src.path().join("notes.txt"), b"shopping list").unwrap();

        let report = Extractor::default().extract(src.path(), dest.path(), 512).unwrap();

        assert_eq!(report.total_files, 3);
        assert_eq!(report.staged, 1);
        assert_eq!(report.skipped_small, 1);
        assert_eq!(staged_names(&report), vec!["large.jpg"]);
        // Copy, not move
        assert!(src.path().join("large.jpg").exists());
    }

    #[test]
    fn test_recurses_into_all_depths() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let deep = src.path().join("2023").join("summer").join("day1");
        fs::create_dir_all(&deep).unwrap();
        write_rgb(&src.path().join("top.png"), 64, 64);
        write_rgb(&src.path().join("2023").join("mid.png"), 64, 64);
        write_rgb(&deep.join("deep.png"), 64, 64);

        let report = Extractor::default().extract(src.path(), dest.path(), 10).unwrap();

        assert_eq!(report.staged, 3);
        assert_eq!(staged_names(&report), vec!["deep.png", "mid.png", "top.png"]);
    }

    #[test]
    fn test_name_collisions_are_suffixed() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        fs::create_dir_all(src.path().join("a")).unwrap();
        fs::create_dir_all(src.path().join("b")).unwrap();
        write_rgb(&src.path().join("a").join("pic.png"), 64, 64);
        write_rgb(&src.path().join("b").join("pic.png"), 80, 80);

        let report = Extractor::default().extract(src.path(), dest.path(), 10).unwrap();

        assert_eq!(report.copied, 2);
        assert_eq!(staged_names(&report), vec!["pic.png", "pic_1.png"]);
    }

    #[test]
    fn test_identical_files_in_one_run_are_both_kept() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        fs::create_dir_all(src.path().join("a")).unwrap();
        fs::create_dir_all(src.path().join("b")).unwrap();
        write_rgb(&src.path().join("a").join("same.png"), 64, 64);
        fs::copy(src.path().join("a").join("same.png"), src.path().join("b").join("same.png")).unwrap();

        let report = Extractor::default().extract(src.path(), dest.path(), 10).unwrap();
        assert_eq!(staged_names(&report), vec!["same.png", "same_1.png"]);
    }

    #[test]
    fn test_rerun_reuses_identical_staged_copy() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_rgb(&src.path().join("photo.jpg"), 64, 64);

        let extractor = Extractor::default();
        let first = extractor.extract(src.path(), dest.path(), 10).unwrap();
        let second = extractor.extract(src.path(), dest.path(), 10).unwrap();

        assert_eq!(first.copied, 1);
        assert_eq!(second.copied, 0);
        assert_eq!(second.reused, 1);
        assert_eq!(second.staged, 1);
        assert_eq!(staged_names(&second), vec!["photo.jpg"]);
    }

    #[test]
    fn test_existing_different_file_is_never_overwritten() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_rgb(&src.path().join("photo.jpg"), 64, 64);
        fs::create_dir_all(dest.path().join("images")).unwrap();
        fs::write(dest.path().join("images").join("photo.jpg"), b"keep me").unwrap();

        let report = Extractor::default().extract(src.path(), dest.path(), 10).unwrap();

        assert_eq!(staged_names(&report), vec!["photo.jpg", "photo_1.jpg"]);
        assert_eq!(fs::read(dest.path().join("images").join("photo.jpg")).unwrap(), b"keep me");
    }

    #[test]
    fn test_sniffed_image_gets_format_extension() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_rgb(&src.path().join("real.png"), 64, 64);
        fs::rename(src.path().join("real.png"), src.path().join("disguised.dat")).unwrap();
        fs::copy(src.path().join("disguised.dat"), src.path().join("noext")).unwrap();

        let report = Extractor::default().extract(src.path(), dest.path(), 10).unwrap();
        assert_eq!(staged_names(&report), vec!["disguised.png", "noext.png"]);
    }

    #[test]
    fn test_destination_inside_source_is_not_rescanned() {
        let src = tempdir().unwrap();
        write_rgb(&src.path().join("one.png"), 64, 64);
        let sorted = src.path().join("vacations");
        fs::create_dir_all(&sorted).unwrap();
        write_rgb(&sorted.join("old.png"), 64, 64);

        let extractor = Extractor::default();
        let report = extractor
            .extract_excluding(src.path(), src.path(), 10, &[sorted.clone()])
            .unwrap();
        assert_eq!(report.staged, 1);

        // A second pass must not pick up its own staging copies
        let again = extractor
            .extract_excluding(src.path(), src.path(), 10, &[sorted])
            .unwrap();
        assert_eq!(again.copied, 0);
        assert_eq!(staged_names(&again), vec!["one.png"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_images_are_staged_at_every_depth() {
        use std::os::unix::fs::symlink;

        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let library = tempdir().unwrap();
        write_rgb(&library.path().join("a.png"), 64, 64);
        write_rgb(&library.path().join("b.png"), 64, 64);
        fs::create_dir_all(src.path().join("album")).unwrap();
        symlink(library.path().join("a.png"), src.path().join("rootlink.png")).unwrap();
        symlink(library.path().join("b.png"), src.path().join("album").join("sublink.png")).unwrap();

        let report = Extractor::default().extract(src.path(), dest.path(), 10).unwrap();

        assert_eq!(report.total_files, 2);
        assert_eq!(report.staged, 2);
        assert_eq!(staged_names(&report), vec!["rootlink.png", "sublink.png"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_copy_does_not_stop_the_scan() {
        use std::os::unix::fs::symlink;

        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_rgb(&src.path().join("blocked.png"), 64, 64);
        write_rgb(&src.path().join("fine.png"), 64, 64);

        // A dangling link into a missing folder makes the copy itself fail
        let staging = dest.path().join("images");
        fs::create_dir_all(&staging).unwrap();
        symlink(dest.path().join("gone").join("x.png"), staging.join("blocked.png")).unwrap();

        let report = Extractor::default().extract(src.path(), dest.path(), 10).unwrap();

        assert_eq!(report.total_files, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.copied, 1);
        assert!(staging.join("fine.png").is_file());
        assert!(!dest.path().join("gone").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_is_staged() {
        use std::os::unix::ffi::OsStrExt;

        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let name = OsStr::from_bytes(b"f\xEAte.png");
        write_rgb(&src.path().join(name), 64, 64);

        let report = Extractor::default().extract(src.path(), dest.path(), 10).unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(report.failed, 0);
        assert!(report.staging_dir.join(name).is_file());
    }

    #[test]
    fn test_custom_staging_dir() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write_rgb(&src.path().join("a.bmp"), 32, 32);

        let extractor = Extractor::default().with_staging_dir("incoming");
        let report = extractor.extract(src.path(), dest.path(), 10).unwrap();
        assert_eq!(report.staging_dir, dest.path().join("incoming"));
        assert!(dest.path().join("incoming").join("a.bmp").exists());
    }
}
