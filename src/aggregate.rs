//! Track and placemark aggregation.
//!
//! The [`Aggregator`] owns the document being built (fresh, or loaded from an
//! existing file in update mode) and everything that must stay consistent
//! across one run: the palette cursor, the caption keys and the names of the
//! tracks added so far.
//!
//! ## Order of work
//!
//! 1. [`add_daily_tracks`](Aggregator::add_daily_tracks): photos grouped by
//!    date, one track per date ordered by timestamp then filename.
//! 2. [`add_gpx_tracks`](Aggregator::add_gpx_tracks): one track per GPX
//!    `<trk>`, in the order of the time span it covers.
//! 3. [`add_photo_placemarks`](Aggregator::add_photo_placemarks): one
//!    placemark per photo with its caption.
//!
//! ## Name collisions
//!
//! A new track or photo matching one already in the document is skipped under
//! [`DuplicatePolicy::Skip`]; under [`DuplicatePolicy::Replace`] the existing
//! placemark is removed and the new one appended. Tracks match by name. Photos
//! match by name and by the image their caption shows, since camera file
//! numbers repeat across days.
//!
//! Two new tracks with the same name, or two photos with the same date and
//! file stem, are integrity errors: the run stops rather than guess which one
//! the map should show.

use crate::caption::CaptionBuilder;
use crate::gpx::GpxTrack;
use crate::interval::{IntervalError, IntervalIndex};
use crate::kml::{KmlDocument, Palette, PhotoPlacemark, TrackPlacemark, TrackPoint};
use crate::scan::Photo;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("GPX tracks overlap: {0}")]
    Overlap(#[from] IntervalError),
    #[error("photos {first} and {second} share the caption key {date}/{stem}")]
    DuplicateCaptionKey {
        date: String,
        stem: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("more than one new track is named {0:?}")]
    DuplicateTrackName(String),
}

/// What to do when a new placemark matches one already in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    #[default]
    Skip,
    Replace,
}

/// Counts of what the run did to the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub tracks_added: usize,
    pub tracks_replaced: usize,
    pub tracks_skipped: usize,
    pub photos_added: usize,
    pub photos_replaced: usize,
    pub photos_skipped: usize,
}

enum Placement {
    New,
    Replaced,
    Skipped,
}

pub type GpxIndex = IntervalIndex<DateTime<Utc>, GpxTrack>;

pub struct Aggregator {
    doc: KmlDocument,
    palette: Palette,
    policy: DuplicatePolicy,
    captions: CaptionBuilder,
    timezone: FixedOffset,
    caption_keys: HashMap<(String, String), PathBuf>,
    new_track_names: HashSet<String>,
    report: MergeReport,
}

impl Aggregator {
    /// Start from `doc`. The palette continues after the tracks it already has.
    pub fn new(
        doc: KmlDocument,
        policy: DuplicatePolicy,
        captions: CaptionBuilder,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            palette: Palette::resume(doc.tracks.len()),
            doc,
            policy,
            captions,
            timezone,
            caption_keys: HashMap::new(),
            new_track_names: HashSet::new(),
            report: MergeReport::default(),
        }
    }

    /// One track per date, named by the date.
    pub fn add_daily_tracks(&mut self, photos: &[Photo]) -> Result<(), AggregateError> {
        for (date, day) in group_by_date(photos) {
            let points = day
                .iter()
                .map(|photo| TrackPoint {
                    when: photo.fix.when.clone(),
                    longitude: photo.fix.point.longitude,
                    latitude: photo.fix.point.latitude,
                    altitude: photo.fix.point.altitude,
                })
                .collect();
            let description = format!("Displays the path taken to acquire the pictures of {date}");
            self.insert_track(date.to_string(), description, vec![points])?;
        }
        Ok(())
    }

    /// One track per GPX `<trk>`, in span order.
    pub fn add_gpx_tracks(&mut self, index: &GpxIndex) -> Result<(), AggregateError> {
        for track in index.values() {
            let description = format!(
                "Recorded track from {} ({} to {})",
                track.source.display(),
                track.begin.to_rfc3339(),
                track.end.to_rfc3339()
            );
            self.insert_track(track.name.clone(), description, track.segments.clone())?;
        }
        Ok(())
    }

    /// One placemark per photo. A photo taken while a GPX track was recording
    /// is captioned with that track's name.
    pub fn add_photo_placemarks(
        &mut self,
        photos: &[Photo],
        gpx: &GpxIndex,
    ) -> Result<(), AggregateError> {
        for photo in ordered(photos) {
            let key = (photo.fix.date.clone(), photo.stem.clone());
            if let Some(first) = self.caption_keys.get(&key) {
                return Err(AggregateError::DuplicateCaptionKey {
                    date: key.0,
                    stem: key.1,
                    first: first.clone(),
                    second: photo.path.clone(),
                });
            }
            self.caption_keys.insert(key, photo.path.clone());

            let track = self
                .utc_instant(photo)
                .and_then(|instant| gpx.find(&instant))
                .map(|t| t.name.as_str());
            let image_tag = self.captions.image_tag(photo).into_string();
            let placemark = PhotoPlacemark {
                name: photo.stem.clone(),
                caption: self.captions.render(photo, track),
                longitude: photo.fix.point.longitude,
                latitude: photo.fix.point.latitude,
            };

            let existing = self
                .doc
                .images
                .iter()
                .position(|p| p.name == placemark.name && p.caption.starts_with(&image_tag));
            match self.place(existing, |doc, i| {
                doc.images.remove(i);
            }) {
                Placement::Skipped => {
                    debug!(photo = %photo.path.display(), "photo already in document, skipping");
                    self.report.photos_skipped += 1;
                }
                Placement::Replaced => {
                    self.report.photos_replaced += 1;
                    self.doc.images.push(placemark);
                }
                Placement::New => {
                    self.report.photos_added += 1;
                    self.doc.images.push(placemark);
                }
            }
        }
        Ok(())
    }

    pub fn finish(self) -> (KmlDocument, MergeReport) {
        (self.doc, self.report)
    }

    fn insert_track(
        &mut self,
        name: String,
        description: String,
        segments: Vec<Vec<TrackPoint>>,
    ) -> Result<(), AggregateError> {
        if !self.new_track_names.insert(name.clone()) {
            return Err(AggregateError::DuplicateTrackName(name));
        }

        let existing = self.doc.tracks.iter().position(|t| t.name == name);
        match self.place(existing, |doc, i| {
            doc.tracks.remove(i);
        }) {
            Placement::Skipped => {
                info!(track = %name, "track already in document, skipping");
                self.report.tracks_skipped += 1;
                return Ok(());
            }
            Placement::Replaced => {
                info!(track = %name, "replacing track");
                self.report.tracks_replaced += 1;
            }
            Placement::New => self.report.tracks_added += 1,
        }

        let style_url = self.palette.next_style_url();
        debug!(track = %name, %style_url, "adding track");
        self.doc.tracks.push(TrackPlacemark {
            name,
            description,
            style_url,
            segments,
        });
        Ok(())
    }

    /// Apply the duplicate policy to an optional existing match.
    fn place(
        &mut self,
        existing: Option<usize>,
        remove: impl FnOnce(&mut KmlDocument, usize),
    ) -> Placement {
        match (existing, self.policy) {
            (None, _) => Placement::New,
            (Some(_), DuplicatePolicy::Skip) => Placement::Skipped,
            (Some(i), DuplicatePolicy::Replace) => {
                remove(&mut self.doc, i);
                Placement::Replaced
            }
        }
    }

    fn utc_instant(&self, photo: &Photo) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&photo.fix.point.timestamp)
            .single()
            .map(|local| local.with_timezone(&Utc))
    }
}

/// Photos grouped by date, each day ordered by timestamp then filename.
pub fn group_by_date(photos: &[Photo]) -> BTreeMap<&str, Vec<&Photo>> {
    let mut days: BTreeMap<&str, Vec<&Photo>> = BTreeMap::new();
    for photo in ordered(photos) {
        days.entry(photo.fix.date.as_str()).or_default().push(photo);
    }
    days
}

fn ordered(photos: &[Photo]) -> Vec<&Photo> {
    let mut sorted: Vec<&Photo> = photos.iter().collect();
    sorted.sort_by(|a, b| {
        a.fix
            .point
            .timestamp
            .cmp(&b.fix.point.timestamp)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    sorted
}
