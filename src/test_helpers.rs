//! Shared test utilities for the photo-trail test suite.
//!
//! Provides tag builders for the metadata normalizer, GPX text builders,
//! fixture setup, and lookup helpers over [`KmlDocument`]s.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tags = geotagged_tags("2024:01:01 12:00:00", 49.25, "N", 123.1, "W");
//! let doc = parse_document(&xml).unwrap();
//! let track = find_track(&doc, "2024-01-01");
//! assert_eq!(track_names(&doc), vec!["2024-01-01"]);
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::kml::{KmlDocument, PhotoPlacemark, TrackPlacemark};
use crate::metadata::{
    DATE_TIME_ORIGINAL, GPS_LATITUDE, GPS_LATITUDE_REF, GPS_LONGITUDE, GPS_LONGITUDE_REF,
    GPS_MEASURE_MODE, GPS_STATUS, RawTags, TagValue,
};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/` to a temp directory and return it.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Create a placeholder JPEG at `root/rel`, creating parent directories.
pub fn touch_jpeg(root: &Path, rel: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
    path
}

// =========================================================================
// Tag and GPX builders
// =========================================================================

/// Tags of a photo with an active 3-D fix and no altitude.
pub fn geotagged_tags(
    datetime: &str,
    latitude: f64,
    latitude_ref: &str,
    longitude: f64,
    longitude_ref: &str,
) -> RawTags {
    let mut tags = RawTags::new();
    tags.insert(DATE_TIME_ORIGINAL.into(), TagValue::from(datetime));
    tags.insert(GPS_STATUS.into(), TagValue::from("A"));
    tags.insert(GPS_MEASURE_MODE.into(), TagValue::from("3"));
    tags.insert(GPS_LATITUDE.into(), TagValue::Number(latitude));
    tags.insert(GPS_LATITUDE_REF.into(), TagValue::from(latitude_ref));
    tags.insert(GPS_LONGITUDE.into(), TagValue::Number(longitude));
    tags.insert(GPS_LONGITUDE_REF.into(), TagValue::from(longitude_ref));
    tags
}

/// One `<trk>` element. Each point is `(time, lat, lon)`.
pub fn gpx_track(name: Option<&str>, segments: &[&[(&str, f64, f64)]]) -> String {
    let mut xml = String::from("  <trk>\n");
    if let Some(name) = name {
        xml.push_str(&format!("    <name>{name}</name>\n"));
    }
    for segment in segments {
        xml.push_str("    <trkseg>\n");
        for (time, lat, lon) in segment.iter() {
            xml.push_str(&format!(
                "      <trkpt lat=\"{lat}\" lon=\"{lon}\"><ele>10</ele><time>{time}</time></trkpt>\n"
            ));
        }
        xml.push_str("    </trkseg>\n");
    }
    xml.push_str("  </trk>\n");
    xml
}

/// A GPX 1.1 document wrapping `tracks` built with [`gpx_track`].
pub fn gpx_document(tracks: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <gpx version=\"1.1\" creator=\"photo-trail tests\" xmlns=\"http://www.topografix.com/GPX/1/1\">\n\
         {}</gpx>\n",
        tracks.concat()
    )
}

// =========================================================================
// Document lookups, panicking with the available names on a miss
// =========================================================================

/// Find a track placemark by name. Panics if not found.
pub fn find_track<'a>(doc: &'a KmlDocument, name: &str) -> &'a TrackPlacemark {
    doc.tracks.iter().find(|t| t.name == name).unwrap_or_else(|| {
        let names = track_names(doc);
        panic!("track '{name}' not found. Available: {names:?}")
    })
}

/// Find a photo placemark by name. Panics if not found.
pub fn find_photo<'a>(doc: &'a KmlDocument, name: &str) -> &'a PhotoPlacemark {
    doc.images.iter().find(|p| p.name == name).unwrap_or_else(|| {
        let names = photo_names(doc);
        panic!("photo '{name}' not found. Available: {names:?}")
    })
}

/// All track names in folder order.
pub fn track_names(doc: &KmlDocument) -> Vec<&str> {
    doc.tracks.iter().map(|t| t.name.as_str()).collect()
}

/// All photo names in folder order.
pub fn photo_names(doc: &KmlDocument) -> Vec<&str> {
    doc.images.iter().map(|p| p.name.as_str()).collect()
}
