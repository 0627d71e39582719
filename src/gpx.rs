//! GPX track loading.
//!
//! Each `<trk>` becomes one [`GpxTrack`]; its `<trkseg>`s are kept as separate
//! segments so the KML writer can emit them as sibling tracks. Only timed
//! points are usable: a KML `gx:Track` needs a `when` for every coordinate,
//! and the track's time span is what places it in the interval index.
//!
//! Points without a `<time>` are dropped with a warning. A track left with no
//! timed points has no span and is skipped.

use crate::interval::{IntervalError, IntervalIndex};
use crate::kml::TrackPoint;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum GpxError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ::gpx::errors::GpxError,
    },
    #[error("{path}: unreadable point time: {detail}")]
    Time { path: PathBuf, detail: String },
}

/// One recorded track.
#[derive(Debug, Clone, PartialEq)]
pub struct GpxTrack {
    pub name: String,
    pub source: PathBuf,
    pub segments: Vec<Vec<TrackPoint>>,
    /// First and last point time over all segments.
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl GpxTrack {
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }
}

/// Load every usable track in a GPX file.
pub fn read_tracks(path: &Path) -> Result<Vec<GpxTrack>, GpxError> {
    let file = File::open(path).map_err(|source| GpxError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tracks(BufReader::new(file), path)
}

/// Parse GPX from `input`; `source` names the file in track names and errors.
pub fn parse_tracks<R: Read>(input: R, source: &Path) -> Result<Vec<GpxTrack>, GpxError> {
    let gpx = ::gpx::read(input).map_err(|e| GpxError::Parse {
        path: source.to_path_buf(),
        source: e,
    })?;
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());

    let mut tracks = Vec::new();
    for (n, track) in gpx.tracks.into_iter().enumerate() {
        let name = track
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{stem}-{}", n + 1));

        let mut segments = Vec::new();
        let mut span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
        let mut untimed = 0usize;

        for segment in track.segments {
            let mut points = Vec::new();
            for waypoint in segment.points {
                let Some(time) = waypoint.time else {
                    untimed += 1;
                    continue;
                };
                let utc = utc_time(time, source)?;
                span = Some(match span {
                    Some((begin, end)) => (begin.min(utc), end.max(utc)),
                    None => (utc, utc),
                });
                let position = waypoint.point();
                points.push(TrackPoint {
                    when: utc.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    longitude: position.x(),
                    latitude: position.y(),
                    altitude: waypoint.elevation.unwrap_or(0.0),
                });
            }
            if !points.is_empty() {
                segments.push(points);
            }
        }

        if untimed > 0 {
            warn!(track = %name, file = %source.display(), untimed, "dropped GPX points without time");
        }
        let Some((begin, end)) = span else {
            warn!(track = %name, file = %source.display(), "GPX track has no timed points, skipping");
            continue;
        };
        debug!(track = %name, %begin, %end, segments = segments.len(), "loaded GPX track");
        tracks.push(GpxTrack {
            name,
            source: source.to_path_buf(),
            segments,
            begin,
            end,
        });
    }
    Ok(tracks)
}

fn utc_time(time: ::gpx::Time, source: &Path) -> Result<DateTime<Utc>, GpxError> {
    let time_error = |detail: String| GpxError::Time {
        path: source.to_path_buf(),
        detail,
    };
    let iso = time.format().map_err(|e| time_error(e.to_string()))?;
    DateTime::parse_from_rfc3339(&iso)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| time_error(e.to_string()))
}

/// Index tracks by the span they cover. Any two tracks recording at the same
/// instant is an error.
pub fn index_tracks(
    tracks: Vec<GpxTrack>,
) -> Result<IntervalIndex<DateTime<Utc>, GpxTrack>, IntervalError> {
    let mut index = IntervalIndex::new();
    for track in tracks {
        index.insert(track.begin, track.end, track)?;
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gpx_document, gpx_track};

    fn parse(xml: &str) -> Vec<GpxTrack> {
        parse_tracks(xml.as_bytes(), Path::new("/logs/ride.gpx")).unwrap()
    }

    #[test]
    fn named_track_with_two_segments() {
        let xml = gpx_document(&[gpx_track(
            Some("Morning ride"),
            &[
                &[("2024-01-03T08:00:00Z", 48.85, 2.35), ("2024-01-03T08:10:00Z", 48.86, 2.36)],
                &[("2024-01-03T09:00:00Z", 48.87, 2.37)],
            ],
        )]);
        let tracks = parse(&xml);
        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.name, "Morning ride");
        assert_eq!(track.segments.len(), 2);
        assert_eq!(track.point_count(), 3);
        assert_eq!(track.segments[0][0].when, "2024-01-03T08:00:00Z");
        assert_eq!(track.segments[0][0].longitude, 2.35);
        assert_eq!(track.segments[0][0].latitude, 48.85);
        assert_eq!(track.begin.to_rfc3339(), "2024-01-03T08:00:00+00:00");
        assert_eq!(track.end.to_rfc3339(), "2024-01-03T09:00:00+00:00");
    }

    #[test]
    fn unnamed_tracks_use_file_stem_and_position() {
        let xml = gpx_document(&[
            gpx_track(None, &[&[("2024-01-03T08:00:00Z", 1.0, 1.0)]]),
            gpx_track(None, &[&[("2024-01-04T08:00:00Z", 1.0, 1.0)]]),
        ]);
        let names: Vec<String> = parse(&xml).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["ride-1", "ride-2"]);
    }

    #[test]
    fn untimed_points_dropped_and_empty_track_skipped() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>partial</name><trkseg>
    <trkpt lat="1.0" lon="2.0"><time>2024-01-03T08:00:00Z</time></trkpt>
    <trkpt lat="1.1" lon="2.1"></trkpt>
  </trkseg></trk>
  <trk><name>untimed</name><trkseg>
    <trkpt lat="1.0" lon="2.0"></trkpt>
  </trkseg></trk>
</gpx>"#;
        let tracks = parse(xml);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "partial");
        assert_eq!(tracks[0].point_count(), 1);
    }

    #[test]
    fn invalid_gpx_is_parse_error() {
        let err = parse_tracks("not xml".as_bytes(), Path::new("bad.gpx")).unwrap_err();
        assert!(matches!(err, GpxError::Parse { .. }));
    }

    #[test]
    fn index_orders_by_span_and_rejects_overlap() {
        let later = gpx_document(&[gpx_track(
            Some("later"),
            &[&[("2024-01-05T08:00:00Z", 1.0, 1.0)]],
        )]);
        let earlier = gpx_document(&[gpx_track(
            Some("earlier"),
            &[&[("2024-01-04T08:00:00Z", 1.0, 1.0), ("2024-01-04T09:00:00Z", 1.0, 1.0)]],
        )]);
        let mut tracks = parse(&later);
        tracks.extend(parse(&earlier));

        let index = index_tracks(tracks.clone()).unwrap();
        let names: Vec<&str> = index.values().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["earlier", "later"]);

        let overlapping = gpx_document(&[gpx_track(
            Some("overlap"),
            &[&[("2024-01-04T08:30:00Z", 1.0, 1.0)]],
        )]);
        tracks.extend(parse(&overlapping));
        assert!(index_tracks(tracks).is_err());
    }
}
