//! # photo-trail
//!
//! Turns the GPS positions and capture times embedded in JPEG photos into a
//! KML map: one coloured track per day, one placemark per photo, plus any GPX
//! logs recorded alongside.
//!
//! # Architecture
//!
//! ```text
//! discover    dirs/     →  JPEG + GPX paths             (walkdir)
//! extract     JPEG      →  raw tags                     (exiftool -stay_open)
//! normalize   raw tags  →  PhotoFix                     (skip on bad data)
//! aggregate   photos    →  day tracks + photo placemarks
//!             GPX       →  interval index → GPX tracks
//! assemble    model     →  KML text                     (quick-xml)
//! ```
//!
//! The external tools sit behind the traits in [`tools`], so every stage after
//! extraction is a plain function of in-memory data and is unit tested that
//! way.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`interval`] | Sorted, non-overlapping closed-interval index with point lookup |
//! | [`metadata`] | Raw EXIF tags → signed position + local timestamp, or the reason not |
//! | [`aggregate`] | Day tracks, GPX tracks, photo placemarks, duplicate handling, palette |
//! | [`offset`] | Camera clock offset from one reference photo or a vote over many |
//! | [`kml`] | Document model, writer, and the reader used by update mode |
//! | [`scan`] | Source directory walk and per-photo extraction |
//! | [`gpx`] | GPX track loading |
//! | [`caption`] | Photo URL and balloon HTML |
//! | [`orient`] | Lossless re-orientation driven by the EXIF `Orientation` tag |
//! | [`tools`] | `exiftool` and `jpegtran` behind traits |
//! | [`pipeline`] | The command workflows and all-or-nothing output writing |
//! | [`config`] | Layered options: command line over config file over defaults |
//! | [`output`] | CLI summaries |
//!
//! # Design Decisions
//!
//! ## Captions Are Built Eagerly
//!
//! A caption is HTML and ends up inside a KML `<description>`. It is rendered
//! with Maud while the placemark is built and written as CDATA, so no later
//! pass has to patch the serialized document.
//!
//! ## Overlapping GPX Tracks Are an Error
//!
//! Photos are matched to the GPX track that was recording when they were
//! taken. If two tracks cover the same instant the match is ambiguous, so the
//! run stops instead of picking one.
//!
//! ## Update Mode Reads What It Wrote
//!
//! `--update` parses the existing document back into the same model the
//! writer uses. The palette resumes after the existing tracks, and
//! placemarks that already exist are skipped or, with `--replace`, replaced.

pub mod aggregate;
pub mod caption;
pub mod config;
pub mod gpx;
pub mod interval;
pub mod kml;
pub mod metadata;
pub mod offset;
pub mod orient;
pub mod output;
pub mod pipeline;
pub mod scan;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_helpers;
