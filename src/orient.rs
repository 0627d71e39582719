//! Lossless re-orientation of JPEGs.
//!
//! Cameras record how they were held in the EXIF `Orientation` tag instead of
//! rotating the pixels. Some viewers ignore the tag, so this module rotates
//! the pixels with a lossless transformer and then resets the tag to 1.
//!
//! | Orientation | Transform            |
//! |-------------|----------------------|
//! | 1           | none                 |
//! | 2           | `-flip horizontal`   |
//! | 3           | `-rotate 180`        |
//! | 4           | `-flip vertical`     |
//! | 5           | `-transpose`         |
//! | 6           | `-rotate 90`         |
//! | 7           | `-transverse`        |
//! | 8           | `-rotate 270`        |
//!
//! The transform writes to a hidden sibling file and the tag is reset on that
//! copy. Only when both succeed is it renamed over the original; otherwise it
//! is deleted and the original is never touched.

use crate::metadata::ORIENTATION;
use crate::scan::PhotoFile;
use crate::tools::{JpegTransform, MetadataReader, ToolError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum OrientError {
    #[error("{path}: unsupported orientation {value}")]
    Unsupported { path: PathBuf, value: String },
    #[error("{path}: {source}")]
    Tool {
        path: PathBuf,
        #[source]
        source: ToolError,
    },
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientOutcome {
    /// Already upright (orientation 1 or no tag).
    Upright,
    /// Rotated from the given orientation.
    Rotated(u8),
}

#[derive(Debug, Default)]
pub struct OrientSummary {
    pub rotated: usize,
    pub upright: usize,
    pub failed: Vec<OrientError>,
}

/// The transformer arguments that make an image with `orientation` upright.
pub fn operation(orientation: u8) -> Option<&'static [&'static str]> {
    let op: &'static [&'static str] = match orientation {
        2 => &["-flip", "horizontal"],
        3 => &["-rotate", "180"],
        4 => &["-flip", "vertical"],
        5 => &["-transpose"],
        6 => &["-rotate", "90"],
        7 => &["-transverse"],
        8 => &["-rotate", "270"],
        _ => return None,
    };
    Some(op)
}

/// Re-orient one file in place.
pub fn orient_file(
    reader: &mut dyn MetadataReader,
    transform: &dyn JpegTransform,
    path: &Path,
) -> Result<OrientOutcome, OrientError> {
    let tool_error = |source| OrientError::Tool {
        path: path.to_path_buf(),
        source,
    };
    let tags = reader.read_tags(path, &[ORIENTATION]).map_err(tool_error)?;
    let Some(value) = tags.get(ORIENTATION) else {
        return Ok(OrientOutcome::Upright);
    };
    let unsupported = || OrientError::Unsupported {
        path: path.to_path_buf(),
        value: value.as_text().into_owned(),
    };
    let orientation = value
        .as_f64()
        .filter(|v| v.fract() == 0.0 && (1.0..=8.0).contains(v))
        .map(|v| v as u8)
        .ok_or_else(unsupported)?;
    let Some(op) = operation(orientation) else {
        return Ok(OrientOutcome::Upright);
    };

    let tmp = temp_sibling(path);
    debug!(file = %path.display(), orientation, ?op, "transforming");
    if let Err(source) = transform.transform(path, &tmp, op) {
        remove_temp(&tmp);
        return Err(tool_error(source));
    }
    // Tag first: the original only changes through the rename.
    if let Err(source) = reader.write_tags(&tmp, &[("Orientation", "1")]) {
        remove_temp(&tmp);
        return Err(tool_error(source));
    }
    if let Err(source) = std::fs::rename(&tmp, path) {
        remove_temp(&tmp);
        return Err(OrientError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(OrientOutcome::Rotated(orientation))
}

/// Re-orient every file, reporting failures without stopping.
pub fn orient_all(
    reader: &mut dyn MetadataReader,
    transform: &dyn JpegTransform,
    files: &[PhotoFile],
) -> OrientSummary {
    let mut summary = OrientSummary::default();
    for file in files {
        match orient_file(reader, transform, &file.path) {
            Ok(OrientOutcome::Upright) => summary.upright += 1,
            Ok(OrientOutcome::Rotated(from)) => {
                info!(file = %file.path.display(), from, "rotated");
                summary.rotated += 1;
            }
            Err(e) => {
                warn!("{e}");
                summary.failed.push(e);
            }
        }
    }
    summary
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Keeps the extension: exiftool picks the writer by it.
    path.with_file_name(format!(".orient-{name}"))
}

fn remove_temp(tmp: &Path) {
    match std::fs::remove_file(tmp) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            warn!(file = %tmp.display(), error = %e, "could not remove temporary file");
        }
        _ => {}
    }
}
