//! The command workflows.
//!
//! Each public function here is one subcommand minus argument parsing and
//! printing: it takes resolved [`Settings`] and the external tools, and
//! returns a summary for [`crate::output`] to display.
//!
//! ## `kml`
//!
//! ```text
//! check destination → discover sources → load GPX → read photos
//!   → load existing document (update mode) → aggregate → serialize → write
//! ```
//!
//! The destination is checked before any work: an existing file without
//! update mode is refused. The document is written to a hidden sibling file
//! and renamed into place, so a failed run never leaves a truncated file.

use crate::aggregate::{AggregateError, Aggregator, DuplicatePolicy, GpxIndex, MergeReport};
use crate::caption::CaptionBuilder;
use crate::config::{ConfigError, Settings};
use crate::gpx::{self, GpxError};
use crate::kml::{self, KmlDocument, KmlError};
use crate::orient::{self, OrientSummary};
use crate::scan::{self, Photo, ScanError};
use crate::tools::{self, JpegTransform, MetadataReader, ToolError};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Gpx(#[from] GpxError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("{path}: {source}")]
    Kml {
        path: PathBuf,
        #[source]
        source: KmlError,
    },
    #[error(transparent)]
    Serialize(#[from] KmlError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a `kml` run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildSummary {
    pub photos: usize,
    pub skipped_photos: usize,
    pub gpx_files: usize,
    pub gpx_tracks: usize,
    pub updated_existing: bool,
    pub merge: MergeReport,
    pub total_tracks: usize,
    pub total_images: usize,
    /// `None` when the document went to stdout.
    pub output: Option<PathBuf>,
}

/// Refuse to overwrite an existing output unless updating it.
pub fn check_destination(settings: &Settings) -> Result<(), ConfigError> {
    match &settings.output {
        Some(path) if path.exists() && !settings.update => {
            Err(ConfigError::DestinationExists(path.clone()))
        }
        _ => Ok(()),
    }
}

/// Build the document in memory.
pub fn build_document(
    settings: &Settings,
    reader: &mut dyn MetadataReader,
) -> Result<(KmlDocument, BuildSummary), BuildError> {
    let sources = scan::discover(&settings.dirs)?;

    // One file may be named both by `--gpx` and by discovery, spelled
    // differently; compare resolved paths.
    let mut gpx_files: Vec<PathBuf> = Vec::new();
    let mut seen: Vec<PathBuf> = Vec::new();
    for file in settings.gpx.iter().cloned().chain(sources.gpx_files) {
        let resolved = std::fs::canonicalize(&file).unwrap_or_else(|_| file.clone());
        if seen.contains(&resolved) {
            debug!(file = %file.display(), "GPX file already listed");
            continue;
        }
        seen.push(resolved);
        gpx_files.push(file);
    }
    let mut tracks = Vec::new();
    for file in &gpx_files {
        tracks.extend(gpx::read_tracks(file)?);
    }
    let gpx_tracks = tracks.len();
    let index: GpxIndex = gpx::index_tracks(tracks).map_err(AggregateError::from)?;

    info!(photos = sources.photos.len(), "reading photo metadata");
    let scanned = scan::read_photos(&sources.photos, reader)?;

    let (base, updated_existing) = load_base_document(settings)?;
    let policy = if settings.replace {
        DuplicatePolicy::Replace
    } else {
        DuplicatePolicy::Skip
    };
    let mut aggregator = Aggregator::new(
        base,
        policy,
        CaptionBuilder::new(settings.url.as_deref()),
        settings.timezone,
    );
    aggregator.add_daily_tracks(&scanned.photos)?;
    aggregator.add_gpx_tracks(&index)?;
    aggregator.add_photo_placemarks(&scanned.photos, &index)?;
    let (doc, merge) = aggregator.finish();

    let summary = BuildSummary {
        photos: scanned.photos.len(),
        skipped_photos: scanned.skipped.len(),
        gpx_files: gpx_files.len(),
        gpx_tracks,
        updated_existing,
        merge,
        total_tracks: doc.tracks.len(),
        total_images: doc.images.len(),
        output: settings.output.clone(),
    };
    Ok((doc, summary))
}

/// The `kml` command: build and write the document.
pub fn make_kml(
    settings: &Settings,
    reader: &mut dyn MetadataReader,
) -> Result<BuildSummary, BuildError> {
    check_destination(settings)?;
    let (doc, summary) = build_document(settings, reader)?;
    let xml = kml::to_string(&doc)?;
    write_output(settings.output.as_deref(), &xml)?;
    Ok(summary)
}

fn load_base_document(settings: &Settings) -> Result<(KmlDocument, bool), BuildError> {
    if let Some(path) = settings.output.as_ref().filter(|p| settings.update && p.exists()) {
        info!(file = %path.display(), "updating existing document");
        let xml = std::fs::read_to_string(path).map_err(|source| BuildError::Kml {
            path: path.clone(),
            source: KmlError::Io(source),
        })?;
        let doc = kml::parse_document(&xml).map_err(|source| BuildError::Kml {
            path: path.clone(),
            source,
        })?;
        return Ok((doc, true));
    }

    let dirs: Vec<String> = settings
        .dirs
        .iter()
        .map(|d| {
            d.file_name()
                .unwrap_or(d.as_os_str())
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    let description = format!("Tracks derived from Exif GPS in {}", dirs.join(", "));
    Ok((KmlDocument::new(&settings.title, description), false))
}

/// The `gpx` command: render a GPX log from photo GPS tags.
///
/// Nothing is merged into a GPX file, so an existing destination is refused
/// even in update mode.
pub fn make_gpx(settings: &Settings) -> Result<Option<PathBuf>, BuildError> {
    if let Some(path) = settings.output.as_ref().filter(|p| p.exists()) {
        return Err(ConfigError::DestinationExists(path.clone()).into());
    }
    let gpx = match &settings.format {
        Some(format) => tools::render_gpx(&settings.dirs, format)?,
        None => {
            let mut format = tempfile::NamedTempFile::new().map_err(ToolError::Io)?;
            format
                .write_all(tools::GPX_FORMAT.as_bytes())
                .map_err(ToolError::Io)?;
            tools::render_gpx(&settings.dirs, format.path())?
        }
    };
    write_output(settings.output.as_deref(), &gpx)?;
    Ok(settings.output.clone())
}

/// The `scan` command: every photo the `kml` command would place.
pub fn scan_photos(
    settings: &Settings,
    reader: &mut dyn MetadataReader,
) -> Result<Vec<Photo>, BuildError> {
    let sources = scan::discover(&settings.dirs)?;
    Ok(scan::read_photos(&sources.photos, reader)?.photos)
}

/// The `orient` command.
pub fn orient_photos(
    settings: &Settings,
    reader: &mut dyn MetadataReader,
    transform: &dyn JpegTransform,
) -> Result<OrientSummary, BuildError> {
    let sources = scan::discover(&settings.dirs)?;
    Ok(orient::orient_all(reader, transform, &sources.photos))
}

/// Write `contents` to `path` (atomically) or to stdout.
pub fn write_output(path: Option<&Path>, contents: &str) -> Result<(), BuildError> {
    match path {
        Some(path) => write_atomic(path, contents).map_err(|source| BuildError::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(contents.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(|source| BuildError::Write {
                    path: PathBuf::from("<stdout>"),
                    source,
                })
        }
    }
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{name}.tmp"));
    let result = std::fs::write(&tmp, contents).and_then(|()| std::fs::rename(&tmp, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    debug!(file = %path.display(), ok = result.is_ok(), "wrote output");
    result
}
