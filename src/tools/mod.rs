//! External collaborators, each behind a trait.
//!
//! | Concern | Trait | Production implementation |
//! |---|---|---|
//! | **Read/write EXIF tags** | [`MetadataReader`] | [`ExifTool`], one `exiftool -stay_open` session per run |
//! | **Lossless JPEG transform** | [`JpegTransform`] | [`Jpegtran`] |
//! | **GPX from photo tags** | none | [`render_gpx`], one-shot `exiftool -p` |
//!
//! The rest of the crate only sees the traits, so the pipeline, the offset
//! estimator and the orientation workflow are tested against recording mocks.
//!
//! Every call blocks until the tool answers. There is no timeout: a hung
//! `exiftool` hangs the run.

pub mod backend;
pub mod exiftool;
pub mod jpegtran;

pub use backend::{JpegTransform, MetadataReader, ToolError};
pub use exiftool::{ExifTool, GPX_FORMAT, render_gpx};
pub use jpegtran::Jpegtran;

use std::process::Command;

/// Run a tool to completion, returning its stdout.
///
/// A non-zero exit becomes [`ToolError::Failed`] carrying the tool's stderr.
pub(crate) fn run_tool(program: &str, args: &[String]) -> Result<Vec<u8>, ToolError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ToolError::Spawn {
            tool: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(ToolError::Failed {
            tool: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}
