//! Camera clock offset estimation.
//!
//! A camera's clock drifts and is often left on the wrong timezone. The offset
//! is `camera time - true UTC` in whole seconds, reported as `+HH:MM:SS`
//! together with the `exiftool` argument that shifts every date tag back.
//!
//! Two ways to get there:
//!
//! - **Single shot**: one photo of a clock showing known UTC time
//!   ([`single_offset`]).
//! - **Vote**: every photo that carries both `DateTimeOriginal` and the GPS
//!   receiver's UTC stamp contributes one offset ([`vote`]). The histogram
//!   reports the most negative offset and the most common one; ties go to the
//!   smaller offset. Offsets beyond a day are treated as broken GPS stamps and
//!   excluded.

use crate::metadata::{self, CLOCK_TAGS, DATE_TIME_ORIGINAL, NormalizeError};
use crate::scan::PhotoFile;
use crate::tools::{MetadataReader, ToolError};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Offsets larger than this (in either direction) are outliers.
pub const MAX_PLAUSIBLE_OFFSET: i64 = 86_400;

const UTC_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y:%m:%d %H:%M:%S%.f"];

#[derive(Error, Debug)]
pub enum OffsetError {
    #[error("unrecognized UTC time {0:?} (expected YYYY-MM-DDTHH:MM:SS or YYYY:MM:DD HH:MM:SS)")]
    BadUtc(String),
    #[error("{path}: {source}")]
    Normalize {
        path: String,
        #[source]
        source: NormalizeError,
    },
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// `local - utc` in whole seconds.
pub fn clock_offset(local: NaiveDateTime, utc: NaiveDateTime) -> i64 {
    (local - utc).num_seconds()
}

/// `+HH:MM:SS` / `-HH:MM:SS`.
pub fn format_offset(seconds: i64) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    format!("{sign}{}", hms(seconds.unsigned_abs()))
}

/// The `exiftool` argument that corrects a camera running `seconds` ahead.
pub fn shift_instruction(seconds: i64) -> String {
    let op = if seconds < 0 { "+=" } else { "-=" };
    format!("-AllDates{op}{}", hms(seconds.unsigned_abs()))
}

fn hms(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Parse a `--utc` value. A trailing `Z` is accepted and ignored.
pub fn parse_utc_argument(raw: &str) -> Result<NaiveDateTime, OffsetError> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(['Z', 'z']).unwrap_or(trimmed);
    UTC_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| OffsetError::BadUtc(raw.to_string()))
}

/// Offset of the camera that took `photo`, given the UTC time it shows.
pub fn single_offset(
    reader: &mut dyn MetadataReader,
    photo: &Path,
    utc: NaiveDateTime,
) -> Result<i64, OffsetError> {
    let tags = reader.read_tags(photo, &[DATE_TIME_ORIGINAL])?;
    let local = metadata::camera_timestamp(&tags).map_err(|source| OffsetError::Normalize {
        path: photo.display().to_string(),
        source,
    })?;
    Ok(clock_offset(local, utc))
}

/// Histogram of per-photo offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetVote {
    histogram: BTreeMap<i64, usize>,
    outliers: usize,
}

impl OffsetVote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one offset. Returns `false` if it was excluded as an outlier.
    pub fn record(&mut self, offset: i64) -> bool {
        if offset.abs() > MAX_PLAUSIBLE_OFFSET {
            self.outliers += 1;
            return false;
        }
        *self.histogram.entry(offset).or_default() += 1;
        true
    }

    pub fn most_negative(&self) -> Option<i64> {
        self.histogram.keys().next().copied()
    }

    /// The most common offset; the smallest one wins a tie.
    pub fn mode(&self) -> Option<i64> {
        let mut best: Option<(i64, usize)> = None;
        for (&offset, &count) in &self.histogram {
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((offset, count));
            }
        }
        best.map(|(offset, _)| offset)
    }

    pub fn samples(&self) -> usize {
        self.histogram.values().sum()
    }

    pub fn outliers(&self) -> usize {
        self.outliers
    }

    pub fn histogram(&self) -> &BTreeMap<i64, usize> {
        &self.histogram
    }
}

/// Vote over every photo carrying both clocks.
pub fn vote(
    reader: &mut dyn MetadataReader,
    photos: &[PhotoFile],
) -> Result<OffsetVote, OffsetError> {
    let mut votes = OffsetVote::new();
    for photo in photos {
        let path = photo.path.display();
        let tags = reader.read_tags(&photo.path, CLOCK_TAGS)?;

        let local = match metadata::camera_timestamp(&tags) {
            Ok(local) => local,
            Err(reason) => {
                warn!(file = %path, %reason, "skipping photo");
                continue;
            }
        };
        let utc = match metadata::gps_timestamp(&tags) {
            Ok(Some(utc)) => utc,
            Ok(None) => {
                debug!(file = %path, "no GPS time, skipping");
                continue;
            }
            Err(reason) => {
                warn!(file = %path, %reason, "skipping photo");
                continue;
            }
        };

        let offset = clock_offset(local, utc);
        if votes.record(offset) {
            debug!(file = %path, offset = %format_offset(offset), "offset");
        } else {
            warn!(file = %path, offset = %format_offset(offset), "implausible offset, excluded");
        }
    }
    Ok(votes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{GPS_DATE_STAMP, GPS_TIME_STAMP, RawTags, TagValue};
    use crate::tools::backend::tests::MockReader;
    use std::path::PathBuf;

    fn at(raw: &str) -> NaiveDateTime {
        parse_utc_argument(raw).unwrap()
    }

    #[test]
    fn camera_one_hour_ahead() {
        let offset = clock_offset(at("2024-01-01T12:00:00"), at("2024-01-01T11:00:00"));
        assert_eq!(offset, 3600);
        assert_eq!(format_offset(offset), "+01:00:00");
        assert_eq!(shift_instruction(offset), "-AllDates-=01:00:00");
    }

    #[test]
    fn camera_behind_is_negative() {
        let offset = clock_offset(at("2024-01-01T11:58:30"), at("2024-01-01T12:00:00"));
        assert_eq!(offset, -90);
        assert_eq!(format_offset(offset), "-00:01:30");
        assert_eq!(shift_instruction(offset), "-AllDates+=00:01:30");
    }

    #[test]
    fn utc_argument_forms() {
        let expected = at("2024-01-01T12:00:00");
        assert_eq!(at("2024:01:01 12:00:00"), expected);
        assert_eq!(at("2024-01-01T12:00:00Z"), expected);
        assert_eq!(at(" 2024:01:01 12:00:00Z "), expected);
        assert!(matches!(
            parse_utc_argument("noon"),
            Err(OffsetError::BadUtc(_))
        ));
    }

    #[test]
    fn vote_reports_most_negative_and_mode() {
        let mut votes = OffsetVote::new();
        for offset in [100, 100, 100, -50] {
            assert!(votes.record(offset));
        }
        assert_eq!(votes.most_negative(), Some(-50));
        assert_eq!(votes.mode(), Some(100));
        assert_eq!(votes.samples(), 4);
    }

    #[test]
    fn vote_tie_goes_to_smallest() {
        let mut votes = OffsetVote::new();
        for offset in [30, 30, -10, -10, 5] {
            votes.record(offset);
        }
        assert_eq!(votes.mode(), Some(-10));
    }

    #[test]
    fn outliers_are_excluded() {
        let mut votes = OffsetVote::new();
        assert!(!votes.record(MAX_PLAUSIBLE_OFFSET + 1));
        assert!(!votes.record(-MAX_PLAUSIBLE_OFFSET - 1));
        assert!(votes.record(MAX_PLAUSIBLE_OFFSET));
        assert_eq!(votes.outliers(), 2);
        assert_eq!(votes.samples(), 1);
    }

    #[test]
    fn empty_vote_has_no_answer() {
        let votes = OffsetVote::new();
        assert_eq!(votes.mode(), None);
        assert_eq!(votes.most_negative(), None);
    }

    fn clock_tags(camera: &str, gps_date: &str, gps_time: &str) -> RawTags {
        let mut tags = RawTags::new();
        tags.insert(DATE_TIME_ORIGINAL.into(), TagValue::from(camera));
        tags.insert(GPS_DATE_STAMP.into(), TagValue::from(gps_date));
        tags.insert(GPS_TIME_STAMP.into(), TagValue::from(gps_time));
        tags
    }

    #[test]
    fn vote_over_photos_skips_missing_gps_time() {
        let mut no_gps = RawTags::new();
        no_gps.insert(DATE_TIME_ORIGINAL.into(), TagValue::from("2024:01:01 12:00:00"));
        let mut reader = MockReader::new()
            .with_tags("/p/a.jpg", clock_tags("2024:01:01 12:01:40", "2024:01:01", "12:00:00"))
            .with_tags("/p/b.jpg", clock_tags("2024:01:01 13:01:40", "2024:01:01", "13:00:00"))
            .with_tags("/p/c.jpg", no_gps);
        let photos: Vec<PhotoFile> = ["a", "b", "c"]
            .iter()
            .map(|n| PhotoFile {
                path: PathBuf::from(format!("/p/{n}.jpg")),
                root: PathBuf::from("/p"),
            })
            .collect();

        let votes = vote(&mut reader, &photos).unwrap();
        assert_eq!(votes.samples(), 2);
        assert_eq!(votes.mode(), Some(100));
    }

    #[test]
    fn single_offset_reads_camera_time() {
        let mut reader = MockReader::new().with_tags(
            "/p/clock.jpg",
            clock_tags("2024:01:01 12:00:00", "2024:01:01", "00:00:00"),
        );
        let offset =
            single_offset(&mut reader, Path::new("/p/clock.jpg"), at("2024-01-01T11:00:00"))
                .unwrap();
        assert_eq!(offset, 3600);
    }

    #[test]
    fn single_offset_without_camera_time_is_error() {
        let mut reader = MockReader::new();
        let err = single_offset(&mut reader, Path::new("/p/none.jpg"), at("2024-01-01T11:00:00"))
            .unwrap_err();
        assert!(matches!(err, OffsetError::Normalize { .. }));
    }
}
