// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Extract-then-classify orchestration
//!
//! A run moves through `Idle → Extracting → Classifying → Cleaning → Done`
//! exactly once. Per-file failures only advance counters; they never move the
//! run backwards or abort it.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::classify::{CategorySet, Classifier};
use crate::detect::has_image_extension;
use crate::extract::{ExtractionReport, Extractor};
use crate::naming::unique_destination;

/// Phase of a sorting run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortPhase {
    Idle,
    Extracting,
    Classifying,
    Cleaning,
    Done,
}

/// One progress notification
#[derive(Debug, Clone)]
pub struct ProgressUpdate<'a> {
    pub phase: SortPhase,
    /// Files not yet finished, including the current one
    pub remaining: usize,
    pub current: &'a str,
    pub percent: u8,
}

/// Receives progress from a run. May be called from a worker thread.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate<'_>);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate<'_>) + Send + Sync,
{
    fn report(&self, update: &ProgressUpdate<'_>) {
        self(update)
    }
}

/// Progress sink that discards everything
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: &ProgressUpdate<'_>) {}
}

/// Per-category counts, kept in category order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCounts {
    entries: Vec<(String, usize)>,
}

impl CategoryCounts {
    /// A zero for every label in the set
    pub fn zeroed(categories: &CategorySet) -> Self {
        Self {
            entries: categories.labels().iter().map(|l| (l.clone(), 0)).collect(),
        }
    }

    /// Bump a label's count. Returns false for labels outside the set.
    pub fn increment(&mut self, label: &str) -> bool {
        match self.entries.iter_mut().find(|(l, _)| l == label) {
            Some((_, count)) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, c)| *c)
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(l, c)| (l.as_str(), *c))
    }
}

impl Serialize for CategoryCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, count) in &self.entries {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

/// Parameters for one run
#[derive(Debug, Clone)]
pub struct SortRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub categories: CategorySet,
    pub min_size: u32,
    pub dry_run: bool,
}

impl SortRequest {
    /// Sort `source` in place (destination defaults to the source)
    pub fn new(source: impl Into<PathBuf>, categories: CategorySet) -> Self {
        let source = source.into();
        Self {
            destination: source.clone(),
            source,
            categories,
            min_size: 512,
            dry_run: false,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_min_size(mut self, min_size: u32) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Result of handling one staged image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Moved { label: String, to: PathBuf },
    /// Dry run: classified but left in place
    Counted { label: String },
    MoveFailed { label: String },
    /// Disappeared from staging before it could be classified
    Vanished,
}

/// Accumulator for the classification phase
#[derive(Debug, Clone)]
pub struct RunTally {
    pub counts: CategoryCounts,
    pub moved: usize,
    pub move_failed: usize,
    pub vanished: usize,
}

impl RunTally {
    pub fn new(categories: &CategorySet) -> Self {
        Self {
            counts: CategoryCounts::zeroed(categories),
            moved: 0,
            move_failed: 0,
            vanished: 0,
        }
    }

    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Moved { label, .. } => {
                self.counts.increment(label);
                self.moved += 1;
            }
            FileOutcome::Counted { label } => {
                self.counts.increment(label);
            }
            FileOutcome::MoveFailed { .. } => self.move_failed += 1,
            FileOutcome::Vanished => self.vanished += 1,
        }
    }
}

/// Everything a caller may want to know about a finished run
#[derive(Debug, Clone, Serialize)]
pub struct SortReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub dry_run: bool,
    pub extraction: ExtractionReport,
    pub counts: CategoryCounts,
    pub moved: usize,
    pub move_failed: usize,
    pub vanished: usize,
    pub staging_removed: bool,
    /// Filled in by callers that run the empty-folder cleanup afterwards
    pub removed_dirs: usize,
}

/// Runs extraction followed by per-file classification
pub struct Sorter {
    extractor: Extractor,
    classifier: Classifier,
}

impl Sorter {
    pub fn new(extractor: Extractor, classifier: Classifier) -> Self {
        Self { extractor, classifier }
    }

    /// Run and return only the per-category counts
    pub async fn run(&self, request: &SortRequest, progress: &dyn ProgressSink) -> CategoryCounts {
        self.run_with_report(request, progress).await.counts
    }

    /// Run and return the full report
    pub async fn run_with_report(&self, request: &SortRequest, progress: &dyn ProgressSink) -> SortReport {
        let started_at = Utc::now();
        let mut phase = SortPhase::Idle;
        let categories = &request.categories;
        let mut tally = RunTally::new(categories);

        let category_dirs: Vec<PathBuf> = categories
            .labels()
            .iter()
            .map(|label| request.destination.join(label))
            .collect();
        for dir in &category_dirs {
            if let Err(e) = fs::create_dir_all(dir) {
                error!("Failed creating category folder {:?}: {}", dir, e);
            }
        }

        advance(&mut phase, SortPhase::Extracting);
        progress.report(&ProgressUpdate {
            phase,
            remaining: 0,
            current: "Extracting images...",
            percent: 0,
        });
        info!("Starting image extraction...");

        let extraction = match self.extractor.extract_excluding(
            &request.source,
            &request.destination,
            request.min_size,
            &category_dirs,
        ) {
            Ok(report) => report,
            Err(e) => {
                error!("Extraction from {:?} failed: {}", request.source, e);
                ExtractionReport {
                    staging_dir: self.extractor.staging_path(&request.destination),
                    ..Default::default()
                }
            }
        };

        let staged = if extraction.staged == 0 {
            Vec::new()
        } else {
            staged_images(&extraction.staging_dir)
        };

        let mut staging_removed = false;

        if !staged.is_empty() {
            advance(&mut phase, SortPhase::Classifying);
            info!("Found {} images to classify", staged.len());

            let total = staged.len();
            for (i, path) in staged.iter().enumerate() {
                let name = file_name_of(path);
                progress.report(&ProgressUpdate {
                    phase,
                    remaining: total - i,
                    current: &name,
                    percent: (i * 100 / total) as u8,
                });

                let outcome = self.process_staged(path, request).await;
                tally.record(&outcome);
            }

            advance(&mut phase, SortPhase::Cleaning);
            if !request.dry_run {
                staging_removed = remove_if_empty(&extraction.staging_dir);
            }

            progress.report(&ProgressUpdate {
                phase,
                remaining: 0,
                current: "Complete",
                percent: 100,
            });
        }

        advance(&mut phase, SortPhase::Done);
        info!(
            "Sorted {} images ({} moved, {} failed)",
            tally.counts.total(),
            tally.moved,
            tally.move_failed
        );

        SortReport {
            started_at,
            finished_at: Utc::now(),
            source: request.source.clone(),
            destination: request.destination.clone(),
            dry_run: request.dry_run,
            extraction,
            counts: tally.counts,
            moved: tally.moved,
            move_failed: tally.move_failed,
            vanished: tally.vanished,
            staging_removed,
            removed_dirs: 0,
        }
    }

    /// Classify one staged image and, unless dry-running, move it into its folder
    pub async fn process_staged(&self, path: &Path, request: &SortRequest) -> FileOutcome {
        let name = file_name_of(path);
        if !path.exists() {
            warn!("Staged file disappeared: {:?}", path);
            return FileOutcome::Vanished;
        }

        let label = self.classifier.classify(path, &request.categories).await;

        if request.dry_run {
            info!("  → {} classified as '{}' (dry run)", name, label);
            return FileOutcome::Counted { label };
        }

        let file_name = path.file_name().unwrap_or_default();
        let target = unique_destination(&request.destination.join(&label), file_name);
        match move_file(path, &target) {
            Ok(()) => {
                info!("  → {} classified as '{}'", name, label);
                FileOutcome::Moved { label, to: target }
            }
            Err(e) => {
                error!("Failed moving {}: {}", name, e);
                FileOutcome::MoveFailed { label }
            }
        }
    }
}

fn advance(phase: &mut SortPhase, next: SortPhase) {
    debug!("Sort phase {:?} → {:?}", phase, next);
    *phase = next;
}

/// Image files in the staging folder, sorted by name
fn staged_images(staging: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(staging) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read staging folder {:?}: {}", staging, e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    files.sort();
    files
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Rename, falling back to copy + delete across file systems
fn move_file(source: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("Rename {:?} failed ({}), copying instead", source, e);
            copy_then_remove(source, dest, |p| fs::remove_file(p))
        }
    }
}

/// Copy, then delete the source; if the delete fails the copy is rolled back
fn copy_then_remove(
    source: &Path,
    dest: &Path,
    remove: impl FnOnce(&Path) -> std::io::Result<()>,
) -> std::io::Result<()> {
    fs::copy(source, dest)?;

    if let Err(e) = remove(source) {
        if let Err(undo) = fs::remove_file(dest) {
            warn!("Could not roll back copy {:?}: {}", dest, undo);
        }
        return Err(e);
    }

    Ok(())
}

fn remove_if_empty(dir: &Path) -> bool {
    let empty = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => return false,
    };
    if !empty {
        return false;
    }

    match fs::remove_dir(dir) {
        Ok(()) => {
            info!("Removed empty staging folder {:?}", dir);
            true
        }
        Err(e) => {
            warn!("Could not remove staging folder {:?}: {}", dir, e);
            false
        }
    }
}
