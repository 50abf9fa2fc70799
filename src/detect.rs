// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! File type detection by extension and magic bytes

use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::error;

/// Number of leading bytes inspected when sniffing
pub const HEADER_LEN: usize = 32;

/// PNG file signature
pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1A\n";

/// Extensions treated as images without looking at content
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff"];

/// Coarse content category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Images,
}

/// A binary signature and what it identifies
#[derive(Debug, Clone)]
pub struct Signature {
    pub prefix: &'static [u8],
    pub kind: ContentKind,
    pub format: &'static str,
}

/// Ordered table of signatures; the first matching prefix wins
#[derive(Debug, Clone)]
pub struct SignatureTable {
    signatures: Vec<Signature>,
}

impl Default for SignatureTable {
    fn default() -> Self {
        Self::new(vec![
            Signature { prefix: b"\xFF\xD8\xFF", kind: ContentKind::Images, format: "jpg" },
            Signature { prefix: PNG_SIGNATURE, kind: ContentKind::Images, format: "png" },
            Signature { prefix: b"GIF8", kind: ContentKind::Images, format: "gif" },
            Signature { prefix: b"BM", kind: ContentKind::Images, format: "bmp" },
        ])
    }
}

impl SignatureTable {
    pub fn new(signatures: Vec<Signature>) -> Self {
        Self { signatures }
    }

    /// Match a header against the table
    pub fn detect(&self, header: &[u8]) -> (Option<ContentKind>, Option<&'static str>) {
        let header = &header[..header.len().min(HEADER_LEN)];
        self.signatures
            .iter()
            .find(|s| header.starts_with(s.prefix))
            .map(|s| (Some(s.kind), Some(s.format)))
            .unwrap_or((None, None))
    }

    /// Read a file's header and match it. Unreadable files count as no match.
    pub fn detect_file(&self, path: &Path) -> (Option<ContentKind>, Option<&'static str>) {
        match read_header(path) {
            Ok(header) => self.detect(&header),
            Err(e) => {
                error!("Failed reading {:?}: {}", path, e);
                (None, None)
            }
        }
    }
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    File::open(path)?
        .take(HEADER_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}

/// Lowercased extension of a path, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Check if a path carries one of the known image extensions
pub fn has_image_extension(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// What was learned about one scanned file
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub kind: Option<ContentKind>,
    pub format: Option<String>,
    /// Whether the format came from the extension rather than the content
    pub by_extension: bool,
}

impl FileRecord {
    /// Classify a file by extension first, falling back to its signature
    pub fn inspect(path: &Path, table: &SignatureTable) -> Self {
        if let Some(ext) = extension_of(path).filter(|e| IMAGE_EXTENSIONS.contains(&e.as_str())) {
            return Self {
                path: path.to_path_buf(),
                kind: Some(ContentKind::Images),
                format: Some(ext),
                by_extension: true,
            };
        }

        let (kind, format) = table.detect_file(path);
        Self {
            path: path.to_path_buf(),
            kind,
            format: format.map(String::from),
            by_extension: false,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == Some(ContentKind::Images)
    }
}
