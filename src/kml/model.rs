/// `<name>` of the folder holding track placemarks.
pub const TRACKS_FOLDER: &str = "Tracks";
/// `<name>` of the folder holding photo placemarks.
pub const IMAGES_FOLDER: &str = "Images";
pub const PICTURE_STYLE_URL: &str = "#picture";

/// One `when`/`gx:coord` pair of a track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    /// ISO-8601 instant as written to `<when>`: naive local time for photo
    /// tracks, `Z`-suffixed UTC for GPX tracks.
    pub when: String,
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
}

/// A placemark in the tracks folder.
///
/// A single segment is written as one `gx:Track`; several segments become
/// sibling `gx:Track`s inside a `gx:MultiTrack`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPlacemark {
    pub name: String,
    pub description: String,
    pub style_url: String,
    pub segments: Vec<Vec<TrackPoint>>,
}

impl TrackPlacemark {
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }
}

/// A placemark in the images folder.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoPlacemark {
    /// Filename stem of the photo.
    pub name: String,
    /// HTML fragment shown in the balloon, written as CDATA.
    pub caption: String,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KmlDocument {
    pub name: String,
    pub description: String,
    pub tracks: Vec<TrackPlacemark>,
    pub images: Vec<PhotoPlacemark>,
}

impl KmlDocument {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tracks: Vec::new(),
            images: Vec::new(),
        }
    }
}
