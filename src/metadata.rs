//! Photo metadata normalization.
//!
//! `exiftool` reports tags as group-qualified names (`EXIF:GPSLatitude`) with
//! either a string or a numeric value. This module turns one photo's raw tags
//! into a typed [`PhotoFix`]: a signed position, an altitude and the camera's
//! local timestamp split into the date and time-of-day strings the KML writer
//! uses.
//!
//! ## Rules
//!
//! - **Position**: `GPSLatitude` and `GPSLongitude` are both required. The
//!   extractor reports magnitudes; the hemisphere reference (`S`, `W`) supplies
//!   the sign.
//! - **Fix quality**: `GPSStatus` must be `A` (measurement active) and
//!   `GPSMeasureMode` must be above 1 (a 2-D or 3-D fix). Missing tags count as
//!   no fix.
//! - **Timestamp**: `DateTimeOriginal` in `YYYY:MM:DD HH:MM:SS[.fraction]`.
//!   The date colons become hyphens and the two halves are joined with `T`.
//! - **Altitude**: `GPSAltitude`, negated when `GPSAltitudeRef` is 1 (below sea
//!   level), 0 when absent.
//!
//! A photo failing any rule is reported with a [`NormalizeError`]; callers log
//! it and move on. A partial record never leaves this module.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;

pub const DATE_TIME_ORIGINAL: &str = "EXIF:DateTimeOriginal";
pub const GPS_STATUS: &str = "EXIF:GPSStatus";
pub const GPS_MEASURE_MODE: &str = "EXIF:GPSMeasureMode";
pub const GPS_LATITUDE: &str = "EXIF:GPSLatitude";
pub const GPS_LATITUDE_REF: &str = "EXIF:GPSLatitudeRef";
pub const GPS_LONGITUDE: &str = "EXIF:GPSLongitude";
pub const GPS_LONGITUDE_REF: &str = "EXIF:GPSLongitudeRef";
pub const GPS_ALTITUDE: &str = "EXIF:GPSAltitude";
pub const GPS_ALTITUDE_REF: &str = "EXIF:GPSAltitudeRef";
pub const GPS_DATE_STAMP: &str = "EXIF:GPSDateStamp";
pub const GPS_TIME_STAMP: &str = "EXIF:GPSTimeStamp";
pub const ORIENTATION: &str = "EXIF:Orientation";

/// Tags needed to place a photo on the map.
pub const POSITION_TAGS: &[&str] = &[
    DATE_TIME_ORIGINAL,
    GPS_STATUS,
    GPS_MEASURE_MODE,
    GPS_LONGITUDE,
    GPS_LONGITUDE_REF,
    GPS_LATITUDE,
    GPS_LATITUDE_REF,
    GPS_ALTITUDE,
    GPS_ALTITUDE_REF,
];

/// Tags needed to compare the camera clock with GPS time.
pub const CLOCK_TAGS: &[&str] = &[DATE_TIME_ORIGINAL, GPS_DATE_STAMP, GPS_TIME_STAMP];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("missing tag {0}")]
    MissingTag(&'static str),
    #[error("malformed timestamp {0:?}")]
    MalformedTimestamp(String),
    #[error("invalid value {value:?} for {tag}")]
    InvalidValue { tag: &'static str, value: String },
    #[error("no valid GPS fix (status {status:?}, measure mode {mode:?})")]
    NoFix {
        status: Option<String>,
        mode: Option<String>,
    },
}

/// A raw tag value as reported by the extractor.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Number(f64),
    Text(String),
}

impl TagValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Number(n) => Some(*n),
            TagValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            TagValue::Number(n) => Cow::Owned(n.to_string()),
            TagValue::Text(s) => Cow::Borrowed(s.trim()),
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::Text(s.to_string())
    }
}

impl From<f64> for TagValue {
    fn from(n: f64) -> Self {
        TagValue::Number(n)
    }
}

/// All tags returned for one file, keyed by group-qualified name.
pub type RawTags = BTreeMap<String, TagValue>;

/// A position on the map at a camera-local instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timestamp: NaiveDateTime,
}

/// A photo's normalized position and time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoFix {
    pub point: GeoPoint,
    /// `YYYY-MM-DD`, the day the photo belongs to.
    pub date: String,
    /// `HH:MM:SS[.fraction]` as written by the camera.
    pub time: String,
    /// `YYYY-MM-DDTHH:MM:SS[.fraction]`, the KML `when` value.
    pub when: String,
}

/// A parsed `DateTimeOriginal`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExifTimestamp {
    pub date: String,
    pub time: String,
    pub when: String,
    pub datetime: NaiveDateTime,
}

/// Normalize one photo's tags into a [`PhotoFix`].
pub fn normalize(tags: &RawTags) -> Result<PhotoFix, NormalizeError> {
    let latitude = signed_coordinate(tags, GPS_LATITUDE, GPS_LATITUDE_REF, "S", 90.0)?;
    let longitude = signed_coordinate(tags, GPS_LONGITUDE, GPS_LONGITUDE_REF, "W", 180.0)?;

    let raw_time = tags
        .get(DATE_TIME_ORIGINAL)
        .ok_or(NormalizeError::MissingTag(DATE_TIME_ORIGINAL))?;
    let stamp = parse_exif_timestamp(&raw_time.as_text())?;

    check_fix(tags)?;

    let altitude = match tags.get(GPS_ALTITUDE) {
        Some(value) => {
            let alt = number(value, GPS_ALTITUDE)?;
            let below_sea_level = tags
                .get(GPS_ALTITUDE_REF)
                .and_then(TagValue::as_f64)
                .is_some_and(|r| r == 1.0);
            if below_sea_level { -alt.abs() } else { alt }
        }
        None => 0.0,
    };

    Ok(PhotoFix {
        point: GeoPoint {
            latitude,
            longitude,
            altitude,
            timestamp: stamp.datetime,
        },
        date: stamp.date,
        time: stamp.time,
        when: stamp.when,
    })
}

/// The camera-local capture time of a photo.
pub fn camera_timestamp(tags: &RawTags) -> Result<NaiveDateTime, NormalizeError> {
    let raw = tags
        .get(DATE_TIME_ORIGINAL)
        .ok_or(NormalizeError::MissingTag(DATE_TIME_ORIGINAL))?;
    Ok(parse_exif_timestamp(&raw.as_text())?.datetime)
}

/// The GPS receiver's UTC time, if the photo carries both GPS stamps.
pub fn gps_timestamp(tags: &RawTags) -> Result<Option<NaiveDateTime>, NormalizeError> {
    match (tags.get(GPS_DATE_STAMP), tags.get(GPS_TIME_STAMP)) {
        (Some(date), Some(time)) => {
            parse_gps_timestamp(&date.as_text(), &time.as_text()).map(Some)
        }
        _ => Ok(None),
    }
}

fn signed_coordinate(
    tags: &RawTags,
    tag: &'static str,
    ref_tag: &'static str,
    negative_ref: &str,
    limit: f64,
) -> Result<f64, NormalizeError> {
    let value = tags.get(tag).ok_or(NormalizeError::MissingTag(tag))?;
    let magnitude = number(value, tag)?;
    if !magnitude.is_finite() || magnitude.abs() > limit {
        return Err(NormalizeError::InvalidValue {
            tag,
            value: value.as_text().into_owned(),
        });
    }
    let signed = match tags.get(ref_tag).map(TagValue::as_text) {
        Some(r) if r.eq_ignore_ascii_case(negative_ref) => -magnitude.abs(),
        Some(_) => magnitude.abs(),
        None => magnitude,
    };
    Ok(signed)
}

fn number(value: &TagValue, tag: &'static str) -> Result<f64, NormalizeError> {
    value.as_f64().ok_or_else(|| NormalizeError::InvalidValue {
        tag,
        value: value.as_text().into_owned(),
    })
}

fn check_fix(tags: &RawTags) -> Result<(), NormalizeError> {
    let status = tags.get(GPS_STATUS).map(|v| v.as_text().into_owned());
    let mode = tags.get(GPS_MEASURE_MODE);
    let active = status.as_deref() == Some("A");
    let full = mode.and_then(TagValue::as_f64).is_some_and(|m| m > 1.0);
    if active && full {
        Ok(())
    } else {
        Err(NormalizeError::NoFix {
            status,
            mode: mode.map(|v| v.as_text().into_owned()),
        })
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_seconds(s: &str) -> bool {
    match s.split_once('.') {
        Some((whole, frac)) => is_digits(whole) && (frac.is_empty() || is_digits(frac)),
        None => is_digits(s),
    }
}

/// Parse `YYYY:MM:DD HH:MM:SS[.fraction]` into its date, time and `when` forms.
pub fn parse_exif_timestamp(raw: &str) -> Result<ExifTimestamp, NormalizeError> {
    let malformed = || NormalizeError::MalformedTimestamp(raw.to_string());

    let mut parts = raw.split_whitespace();
    let (Some(date_part), Some(time_part), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    let date_fields: Vec<&str> = date_part.split(':').collect();
    if date_fields.len() != 3 || !date_fields.iter().all(|f| is_digits(f)) {
        return Err(malformed());
    }
    let time_fields: Vec<&str> = time_part.split(':').collect();
    if time_fields.len() != 3
        || !is_digits(time_fields[0])
        || !is_digits(time_fields[1])
        || !is_seconds(time_fields[2])
    {
        return Err(malformed());
    }

    let date = date_fields.join("-");
    let when = format!("{date}T{time_part}");
    let datetime =
        NaiveDateTime::parse_from_str(&when, "%Y-%m-%dT%H:%M:%S%.f").map_err(|_| malformed())?;

    Ok(ExifTimestamp {
        date,
        time: time_part.to_string(),
        when,
        datetime,
    })
}

/// Combine `GPSDateStamp` (`YYYY:MM:DD`) and `GPSTimeStamp` (`H:M:S[.f]`).
pub fn parse_gps_timestamp(date: &str, time: &str) -> Result<NaiveDateTime, NormalizeError> {
    let malformed = || NormalizeError::MalformedTimestamp(format!("{date} {time}"));

    let ymd: Vec<&str> = date.trim().split(':').collect();
    let [year, month, day] = ymd.as_slice() else {
        return Err(malformed());
    };
    let date = NaiveDate::from_ymd_opt(
        year.parse().map_err(|_| malformed())?,
        month.parse().map_err(|_| malformed())?,
        day.parse().map_err(|_| malformed())?,
    )
    .ok_or_else(malformed)?;

    let hms: Vec<&str> = time.trim().split(':').collect();
    let [hour, minute, second] = hms.as_slice() else {
        return Err(malformed());
    };
    let seconds: f64 = second.parse().map_err(|_| malformed())?;
    if !(0.0..60.0).contains(&seconds) {
        return Err(malformed());
    }
    let millis = ((seconds.fract() * 1000.0).round() as u32).min(999);
    let time = NaiveTime::from_hms_milli_opt(
        hour.parse().map_err(|_| malformed())?,
        minute.parse().map_err(|_| malformed())?,
        seconds.trunc() as u32,
        millis,
    )
    .ok_or_else(malformed)?;

    Ok(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::geotagged_tags;

    #[test]
    fn normalize_complete_record() {
        let tags = geotagged_tags("2024:01:01 12:00:00", 49.25, "N", 123.1, "W");
        let fix = normalize(&tags).unwrap();
        assert_eq!(fix.date, "2024-01-01");
        assert_eq!(fix.time, "12:00:00");
        assert_eq!(fix.when, "2024-01-01T12:00:00");
        assert_eq!(fix.point.latitude, 49.25);
        assert_eq!(fix.point.longitude, -123.1);
        assert_eq!(fix.point.altitude, 0.0);
    }

    #[test]
    fn hemisphere_refs_set_sign() {
        for (lat_ref, lon_ref) in [("N", "E"), ("N", "W"), ("S", "E"), ("S", "W")] {
            let tags = geotagged_tags("2024:01:01 12:00:00", 33.5, lat_ref, 151.2, lon_ref);
            let fix = normalize(&tags).unwrap();
            assert_eq!(fix.point.latitude < 0.0, lat_ref == "S", "{lat_ref}");
            assert_eq!(fix.point.longitude < 0.0, lon_ref == "W", "{lon_ref}");
        }
    }

    #[test]
    fn hemisphere_sign_applied_to_signed_input() {
        let mut tags = geotagged_tags("2024:01:01 12:00:00", 33.5, "N", 151.2, "E");
        tags.insert(GPS_LATITUDE.into(), TagValue::Number(-33.5));
        assert_eq!(normalize(&tags).unwrap().point.latitude, 33.5);
    }

    #[test]
    fn missing_longitude_excluded() {
        let mut tags = geotagged_tags("2024:01:01 12:00:00", 49.0, "N", 123.0, "W");
        tags.remove(GPS_LONGITUDE);
        assert_eq!(
            normalize(&tags),
            Err(NormalizeError::MissingTag(GPS_LONGITUDE))
        );
    }

    #[test]
    fn missing_timestamp_excluded() {
        let mut tags = geotagged_tags("2024:01:01 12:00:00", 49.0, "N", 123.0, "W");
        tags.remove(DATE_TIME_ORIGINAL);
        assert_eq!(
            normalize(&tags),
            Err(NormalizeError::MissingTag(DATE_TIME_ORIGINAL))
        );
    }

    #[test]
    fn inactive_status_is_no_fix() {
        let mut tags = geotagged_tags("2024:01:01 12:00:00", 49.0, "N", 123.0, "W");
        tags.insert(GPS_STATUS.into(), "V".into());
        assert!(matches!(normalize(&tags), Err(NormalizeError::NoFix { .. })));
    }

    #[test]
    fn one_dimensional_fix_rejected() {
        let mut tags = geotagged_tags("2024:01:01 12:00:00", 49.0, "N", 123.0, "W");
        tags.insert(GPS_MEASURE_MODE.into(), "1".into());
        assert!(matches!(normalize(&tags), Err(NormalizeError::NoFix { .. })));

        tags.insert(GPS_MEASURE_MODE.into(), TagValue::Number(2.0));
        assert!(normalize(&tags).is_ok());
    }

    #[test]
    fn absent_fix_tags_rejected() {
        let mut tags = geotagged_tags("2024:01:01 12:00:00", 49.0, "N", 123.0, "W");
        tags.remove(GPS_MEASURE_MODE);
        assert_eq!(
            normalize(&tags),
            Err(NormalizeError::NoFix {
                status: Some("A".to_string()),
                mode: None,
            })
        );
    }

    #[test]
    fn altitude_read_and_signed() {
        let mut tags = geotagged_tags("2024:01:01 12:00:00", 49.0, "N", 123.0, "W");
        tags.insert(GPS_ALTITUDE.into(), TagValue::Number(152.5));
        assert_eq!(normalize(&tags).unwrap().point.altitude, 152.5);

        tags.insert(GPS_ALTITUDE_REF.into(), TagValue::Number(1.0));
        assert_eq!(normalize(&tags).unwrap().point.altitude, -152.5);
    }

    #[test]
    fn out_of_range_latitude_rejected() {
        let tags = geotagged_tags("2024:01:01 12:00:00", 91.0, "N", 123.0, "W");
        assert!(matches!(
            normalize(&tags),
            Err(NormalizeError::InvalidValue { tag: GPS_LATITUDE, .. })
        ));
    }

    #[test]
    fn timestamp_with_fraction_and_padding() {
        let stamp = parse_exif_timestamp("  2016:03:07 18:56:15.25 ").unwrap();
        assert_eq!(stamp.date, "2016-03-07");
        assert_eq!(stamp.time, "18:56:15.25");
        assert_eq!(stamp.when, "2016-03-07T18:56:15.25");
        assert_eq!(
            stamp.datetime,
            NaiveDate::from_ymd_opt(2016, 3, 7)
                .unwrap()
                .and_hms_milli_opt(18, 56, 15, 250)
                .unwrap()
        );
    }

    #[test]
    fn malformed_timestamps_rejected() {
        for raw in [
            "",
            "2024:01:01",
            "2024-01-01 12:00:00",
            "2024:01:01T12:00:00",
            "2024:01:01 12:00",
            "2024:13:01 12:00:00",
            "0000:00:00 00:00:00",
            "2024:01:01 12:00:00 extra",
            "2024:01:01 12:0a:00",
        ] {
            assert_eq!(
                parse_exif_timestamp(raw),
                Err(NormalizeError::MalformedTimestamp(raw.to_string())),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn malformed_timestamp_fails_normalize() {
        let tags = geotagged_tags("2024:01:01 25:00:00", 49.0, "N", 123.0, "W");
        assert!(matches!(
            normalize(&tags),
            Err(NormalizeError::MalformedTimestamp(_))
        ));
    }

    #[test]
    fn gps_timestamp_parsed() {
        let t = parse_gps_timestamp("2024:01:01", "11:0:5.5").unwrap();
        assert_eq!(
            t,
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_milli_opt(11, 0, 5, 500)
                .unwrap()
        );
        assert!(parse_gps_timestamp("2024:01", "11:00:00").is_err());
        assert!(parse_gps_timestamp("2024:01:01", "11:00:61").is_err());
    }

    #[test]
    fn gps_timestamp_absent_is_none() {
        let tags = RawTags::new();
        assert_eq!(gps_timestamp(&tags), Ok(None));
    }

    #[test]
    fn tag_value_deserializes_numbers_and_text() {
        let v: BTreeMap<String, TagValue> =
            serde_json::from_str(r#"{"EXIF:GPSLatitude": 49.5, "EXIF:GPSStatus": "A"}"#).unwrap();
        assert_eq!(v[GPS_LATITUDE], TagValue::Number(49.5));
        assert_eq!(v[GPS_STATUS], TagValue::Text("A".to_string()));
    }
}
