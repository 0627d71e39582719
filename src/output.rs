//! CLI output formatting for every command.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper. Format functions are pure: no I/O, no
//! side effects.
//!
//! The `kml` and `gpx` summaries go to stderr because stdout may carry the
//! document itself. Everything else goes to stdout.
//!
//! # Output Format
//!
//! ## kml
//!
//! ```text
//! Photos
//!     3 placed, 1 skipped
//! GPX
//!     2 tracks from 1 file
//! Document → trip.kml (updated)
//!     Tracks: 1 added, 0 replaced, 2 skipped (3 total)
//!     Images: 1 added, 0 replaced, 3 skipped (4 total)
//! ```
//!
//! ## offset
//!
//! ```text
//! Offsets
//! 001 -00:00:50 (1 photo)
//! 002 +00:01:40 (3 photos)
//! Most negative: -00:00:50 → exiftool -AllDates+=00:00:50
//! Most common:   +00:01:40 → exiftool -AllDates-=00:01:40
//! ```

use crate::offset::{OffsetVote, format_offset, shift_instruction};
use crate::orient::OrientSummary;
use crate::pipeline::BuildSummary;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

// ============================================================================
// kml
// ============================================================================

pub fn format_build_output(summary: &BuildSummary) -> Vec<String> {
    let mut lines = vec![
        "Photos".to_string(),
        format!(
            "{}{} placed, {} skipped",
            indent(1),
            summary.photos,
            summary.skipped_photos
        ),
    ];

    if summary.gpx_files > 0 {
        lines.push("GPX".to_string());
        lines.push(format!(
            "{}{} from {}",
            indent(1),
            plural(summary.gpx_tracks, "track"),
            plural(summary.gpx_files, "file")
        ));
    }

    let target = summary
        .output
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());
    let mode = if summary.updated_existing { " (updated)" } else { "" };
    lines.push(format!("Document → {target}{mode}"));

    let merge = &summary.merge;
    lines.push(format!(
        "{}Tracks: {} added, {} replaced, {} skipped ({} total)",
        indent(1),
        merge.tracks_added,
        merge.tracks_replaced,
        merge.tracks_skipped,
        summary.total_tracks
    ));
    lines.push(format!(
        "{}Images: {} added, {} replaced, {} skipped ({} total)",
        indent(1),
        merge.photos_added,
        merge.photos_replaced,
        merge.photos_skipped,
        summary.total_images
    ));
    lines
}

pub fn print_build_output(summary: &BuildSummary) {
    for line in format_build_output(summary) {
        eprintln!("{}", line);
    }
}

// ============================================================================
// gpx
// ============================================================================

pub fn print_gpx_output(output: Option<&Path>) {
    if let Some(path) = output {
        eprintln!("GPX → {}", path.display());
    }
}

// ============================================================================
// offset
// ============================================================================

pub fn format_single_offset(photo: &Path, offset: i64) -> Vec<String> {
    vec![
        format!("{} → {}", photo.display(), format_offset(offset)),
        format!("{}Correct with: exiftool {}", indent(1), shift_instruction(offset)),
    ]
}

pub fn print_single_offset(photo: &Path, offset: i64) {
    for line in format_single_offset(photo, offset) {
        println!("{}", line);
    }
}

pub fn format_vote_output(vote: &OffsetVote) -> Vec<String> {
    let mut lines = Vec::new();
    let (Some(most_negative), Some(mode)) = (vote.most_negative(), vote.mode()) else {
        lines.push("No photo carries both a camera time and a GPS time".to_string());
        if vote.outliers() > 0 {
            lines.push(format!(
                "Excluded {} beyond one day",
                plural(vote.outliers(), "offset")
            ));
        }
        return lines;
    };

    lines.push("Offsets".to_string());
    for (i, (offset, count)) in vote.histogram().iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            format_offset(*offset),
            plural(*count, "photo")
        ));
    }
    lines.push(format!(
        "Most negative: {} → exiftool {}",
        format_offset(most_negative),
        shift_instruction(most_negative)
    ));
    lines.push(format!(
        "Most common:   {} → exiftool {}",
        format_offset(mode),
        shift_instruction(mode)
    ));
    if vote.outliers() > 0 {
        lines.push(format!(
            "Excluded {} beyond one day",
            plural(vote.outliers(), "offset")
        ));
    }
    lines
}

pub fn print_vote_output(vote: &OffsetVote) {
    for line in format_vote_output(vote) {
        println!("{}", line);
    }
}

// ============================================================================
// orient
// ============================================================================

pub fn format_orient_output(summary: &OrientSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Rotated {}, {} already upright",
        plural(summary.rotated, "photo"),
        summary.upright
    )];
    if !summary.failed.is_empty() {
        lines.push(format!("Failed ({})", summary.failed.len()));
        for error in &summary.failed {
            lines.push(format!("{}{}", indent(1), error));
        }
    }
    lines
}

pub fn print_orient_output(summary: &OrientSummary) {
    for line in format_orient_output(summary) {
        println!("{}", line);
    }
}
