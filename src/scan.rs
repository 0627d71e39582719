//! Source discovery and per-photo metadata extraction.
//!
//! Walks each source directory recursively (sorted by file name, hidden
//! entries skipped) and collects:
//!
//! - **Photos**: files with a `.jpg` or `.jpeg` extension, any case.
//! - **GPX logs**: files with a `.gpx` extension. These are merged exactly
//!   like logs passed with `--gpx`.
//!
//! [`read_photos`] then asks the metadata reader for each photo's position
//! tags and normalizes them. A photo that fails normalization is logged and
//! left out; an extractor failure aborts the scan.

use crate::metadata::{self, NormalizeError, POSITION_TAGS, PhotoFix};
use crate::tools::{MetadataReader, ToolError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];
const GPX_EXTENSION: &str = "gpx";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("metadata extraction failed: {0}")]
    Tool(#[from] ToolError),
}

/// A JPEG found under a source directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoFile {
    pub path: PathBuf,
    /// The source directory the photo was found under.
    pub root: PathBuf,
}

/// Everything found under the source directories.
#[derive(Debug, Default, Serialize)]
pub struct Sources {
    pub photos: Vec<PhotoFile>,
    pub gpx_files: Vec<PathBuf>,
}

/// A photo with a usable position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Photo {
    pub path: PathBuf,
    #[serde(skip)]
    pub root: PathBuf,
    pub filename: String,
    pub stem: String,
    #[serde(flatten)]
    pub fix: PhotoFix,
}

/// Result of reading every discovered photo.
#[derive(Debug, Default)]
pub struct PhotoScan {
    pub photos: Vec<Photo>,
    pub skipped: Vec<(PathBuf, NormalizeError)>,
}

/// Find photos and GPX logs under `dirs`, in directory order then name order.
pub fn discover(dirs: &[PathBuf]) -> Result<Sources, ScanError> {
    let mut sources = Sources::default();
    for dir in dirs {
        if !dir.is_dir() {
            return Err(ScanError::NotADirectory(dir.clone()));
        }
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if is_jpeg(&path) {
                sources.photos.push(PhotoFile {
                    path,
                    root: dir.clone(),
                });
            } else if has_extension(&path, &[GPX_EXTENSION]) {
                sources.gpx_files.push(path);
            }
        }
    }
    debug!(
        photos = sources.photos.len(),
        gpx = sources.gpx_files.len(),
        "discovered sources"
    );
    Ok(sources)
}

/// Read and normalize every photo in `files`.
pub fn read_photos(
    files: &[PhotoFile],
    reader: &mut dyn MetadataReader,
) -> Result<PhotoScan, ScanError> {
    let mut scan = PhotoScan::default();
    for file in files {
        let tags = reader.read_tags(&file.path, POSITION_TAGS)?;
        debug!(file = %file.path.display(), ?tags, "raw tags");

        match metadata::normalize(&tags) {
            Ok(fix) => scan.photos.push(Photo {
                filename: file_name(&file.path),
                stem: file_stem(&file.path),
                path: file.path.clone(),
                root: file.root.clone(),
                fix,
            }),
            Err(reason) => {
                warn!(file = %file.path.display(), %reason, "skipping photo");
                scan.skipped.push((file.path.clone(), reason));
            }
        }
    }
    Ok(scan)
}

pub fn is_jpeg(path: &Path) -> bool {
    has_extension(path, JPEG_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    extensions.contains(&ext.as_str())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
