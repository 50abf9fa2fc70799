// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Empty folder cleanup

use std::fs;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Remove every empty directory below `root`, deepest first
///
/// `root` itself is kept. Failures are logged and skipped. Returns the
/// number of directories removed.
pub fn remove_empty_directories(root: &Path) -> usize {
    let mut removed = 0;

    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Could not inspect {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let is_empty = match fs::read_dir(path) {
            Ok(mut children) => children.next().is_none(),
            Err(e) => {
                warn!("Could not read folder {:?}: {}", path, e);
                continue;
            }
        };

        if is_empty {
            match fs::remove_dir(path) {
                Ok(()) => {
                    info!("Removed empty folder: {:?}", path);
                    removed += 1;
                }
                Err(e) => warn!("Could not remove folder {:?}: {}", path, e),
            }
        }
    }

    removed
}
