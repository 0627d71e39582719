//! KML document model, serializer and reader.
//!
//! The document this crate produces has a fixed shape:
//!
//! ```text
//! kml
//! └── Document
//!     ├── Style#picture              camera icon for photo placemarks
//!     ├── Style#color<i>_n / _h      line style per palette slot
//!     ├── StyleMap#color<i>          normal/highlight pair per slot
//!     ├── Folder "Tracks"            one Placemark per day or GPX track
//!     │   └── Placemark → gx:Track | gx:MultiTrack
//!     └── Folder "Images"            one Placemark per photo
//!         └── Placemark → Point
//! ```
//!
//! [`write`] renders a [`KmlDocument`] and [`read`] parses one back, locating
//! the two folders by their `<name>`. Update mode relies on the round trip:
//! everything the writer emits about tracks and photos, the reader recovers.
//! Styles are not read back; they are regenerated from the palette on write.

mod model;
pub mod read;
pub mod style;
pub mod write;

pub use model::{
    IMAGES_FOLDER, KmlDocument, PICTURE_STYLE_URL, PhotoPlacemark, TRACKS_FOLDER,
    TrackPlacemark, TrackPoint,
};
pub use read::parse_document;
pub use style::Palette;
pub use write::to_string;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KmlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document has no folder named {0:?}")]
    MissingFolder(&'static str),
    #[error("malformed KML: {0}")]
    Malformed(String),
}
