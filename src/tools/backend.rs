//! Tool traits and the shared error type.
//!
//! [`MetadataReader`] is the seam to the EXIF extractor and [`JpegTransform`]
//! the seam to the lossless JPEG transformer. Production code uses
//! [`ExifTool`](super::ExifTool) and [`Jpegtran`](super::Jpegtran); tests use
//! the recording mocks in [`tests`].

use crate::metadata::RawTags;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("could not start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} failed ({status}): {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("IO error talking to external tool: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected output from {tool}: {detail}")]
    Protocol { tool: String, detail: String },
}

/// Reads and writes EXIF tags of a single file.
///
/// Tag names are group-qualified (`EXIF:GPSLatitude`). Tags the file does not
/// carry are simply absent from the returned map; a file the extractor cannot
/// read yields an empty map rather than an error.
pub trait MetadataReader {
    fn read_tags(&mut self, path: &Path, tags: &[&str]) -> Result<RawTags, ToolError>;

    /// Overwrite tags in place, e.g. `[("Orientation", "1")]`.
    fn write_tags(&mut self, path: &Path, assignments: &[(&str, &str)])
    -> Result<(), ToolError>;
}

/// Losslessly transforms a JPEG into a new file.
///
/// `operation` is the transformer's own argument list (`["-rotate", "90"]`).
/// The source must never be modified; `output` is only valid on `Ok`.
pub trait JpegTransform {
    fn transform(&self, source: &Path, output: &Path, operation: &[&str])
    -> Result<(), ToolError>;
}
