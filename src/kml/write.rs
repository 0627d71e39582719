//! KML serialization.
//!
//! Output is indented by two spaces. Track and folder names are escaped text;
//! photo captions are HTML and go out as CDATA so that a map viewer renders
//! them. A caption containing `]]>` is split across adjacent CDATA sections,
//! which a reader concatenates back into the original string.

use super::KmlError;
use super::model::{KmlDocument, PICTURE_STYLE_URL, PhotoPlacemark, TrackPlacemark, TrackPoint};
use super::model::{IMAGES_FOLDER, TRACKS_FOLDER};
use super::style::{HIGHLIGHT_WIDTH, NORMAL_WIDTH, PALETTE, highlight_colour, style_id};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
const GX_NAMESPACE: &str = "http://www.google.com/kml/ext/2.2";
const CAMERA_ICON: &str = "http://maps.google.com/mapfiles/kml/shapes/camera.png";

/// Render a document to a string.
pub fn to_string(doc: &KmlDocument) -> Result<String, KmlError> {
    let mut buf = Vec::new();
    write_document(doc, &mut buf)?;
    String::from_utf8(buf).map_err(|e| KmlError::Malformed(e.to_string()))
}

pub fn write_document<W: Write>(doc: &KmlDocument, out: W) -> Result<(), KmlError> {
    let mut w = KmlWriter {
        xml: Writer::new_with_indent(out, b' ', 2),
    };
    w.xml
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.open_with("kml", &[("xmlns", KML_NAMESPACE), ("xmlns:gx", GX_NAMESPACE)])?;
    w.open("Document")?;
    w.text("name", &doc.name)?;
    w.text("description", &doc.description)?;
    w.text("visibility", "1")?;
    w.text("open", "1")?;

    w.styles()?;

    w.open("Folder")?;
    w.text("name", TRACKS_FOLDER)?;
    for track in &doc.tracks {
        w.track_placemark(track)?;
    }
    w.close("Folder")?;

    w.open("Folder")?;
    w.text("name", IMAGES_FOLDER)?;
    for photo in &doc.images {
        w.photo_placemark(photo)?;
    }
    w.close("Folder")?;

    w.close("Document")?;
    w.close("kml")?;
    w.xml.get_mut().flush()?;
    Ok(())
}

struct KmlWriter<W: Write> {
    xml: Writer<W>,
}

impl<W: Write> KmlWriter<W> {
    fn open(&mut self, name: &str) -> Result<(), KmlError> {
        self.xml.write_event(Event::Start(BytesStart::new(name)))?;
        Ok(())
    }

    fn open_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), KmlError> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.xml.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), KmlError> {
        self.xml.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text(&mut self, name: &str, text: &str) -> Result<(), KmlError> {
        self.open(name)?;
        self.xml.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn cdata(&mut self, name: &str, text: &str) -> Result<(), KmlError> {
        self.open(name)?;
        for section in cdata_sections(text) {
            self.xml.write_event(Event::CData(BytesCData::new(section)))?;
        }
        self.close(name)
    }

    fn styles(&mut self) -> Result<(), KmlError> {
        self.open_with("Style", &[("id", "picture")])?;
        self.open_with("IconStyle", &[("id", "picture_style")])?;
        self.text("scale", "1.0")?;
        self.open("Icon")?;
        self.text("href", CAMERA_ICON)?;
        self.close("Icon")?;
        self.close("IconStyle")?;
        self.close("Style")?;

        for (slot, colour) in PALETTE.iter().enumerate() {
            let id = style_id(slot);
            self.line_style(&format!("{id}_n"), colour, NORMAL_WIDTH)?;
            self.line_style(&format!("{id}_h"), &highlight_colour(colour), HIGHLIGHT_WIDTH)?;

            self.open_with("StyleMap", &[("id", id.as_str())])?;
            for key in ["normal", "highlight"] {
                let suffix = if key == "normal" { "n" } else { "h" };
                self.open("Pair")?;
                self.text("key", key)?;
                self.text("styleUrl", &format!("#{id}_{suffix}"))?;
                self.close("Pair")?;
            }
            self.close("StyleMap")?;
        }
        Ok(())
    }

    fn line_style(&mut self, id: &str, colour: &str, width: u32) -> Result<(), KmlError> {
        self.open_with("Style", &[("id", id)])?;
        self.open("LineStyle")?;
        self.text("color", colour)?;
        self.text("width", &width.to_string())?;
        self.close("LineStyle")?;
        self.close("Style")
    }

    fn track_placemark(&mut self, track: &TrackPlacemark) -> Result<(), KmlError> {
        self.open("Placemark")?;
        self.text("name", &track.name)?;
        self.text("visibility", "1")?;
        self.text("description", &track.description)?;
        self.text("styleUrl", &track.style_url)?;
        match track.segments.as_slice() {
            [single] => self.track(single)?,
            segments => {
                self.open("gx:MultiTrack")?;
                for segment in segments {
                    self.track(segment)?;
                }
                self.close("gx:MultiTrack")?;
            }
        }
        self.close("Placemark")
    }

    /// All `when` elements first, then all `gx:coord`, index-aligned.
    fn track(&mut self, points: &[TrackPoint]) -> Result<(), KmlError> {
        self.open("gx:Track")?;
        self.text("altitudeMode", "clampToGround")?;
        for point in points {
            self.text("when", &point.when)?;
        }
        for point in points {
            let coord = format!("{} {} {}", point.longitude, point.latitude, point.altitude);
            self.text("gx:coord", &coord)?;
        }
        self.close("gx:Track")
    }

    fn photo_placemark(&mut self, photo: &PhotoPlacemark) -> Result<(), KmlError> {
        self.open("Placemark")?;
        self.text("name", &photo.name)?;
        self.text("visibility", "1")?;
        self.text("styleUrl", PICTURE_STYLE_URL)?;
        self.cdata("description", &photo.caption)?;
        self.open("Point")?;
        self.text("coordinates", &format!("{},{},0", photo.longitude, photo.latitude))?;
        self.close("Point")?;
        self.close("Placemark")
    }
}

/// Split `text` so that no section contains the CDATA terminator.
fn cdata_sections(text: &str) -> Vec<String> {
    let pieces: Vec<&str> = text.split("]]>").collect();
    let last = pieces.len() - 1;
    pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| {
            let mut section = String::new();
            if i > 0 {
                section.push('>');
            }
            section.push_str(piece);
            if i < last {
                section.push_str("]]");
            }
            section
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(when: &str, lon: f64, lat: f64) -> TrackPoint {
        TrackPoint {
            when: when.into(),
            longitude: lon,
            latitude: lat,
            altitude: 0.0,
        }
    }

    fn sample_document() -> KmlDocument {
        let mut doc = KmlDocument::new("Trip", "Tracks for a trip");
        doc.tracks.push(TrackPlacemark {
            name: "2024-01-01".into(),
            description: "Day track".into(),
            style_url: "#color0".into(),
            segments: vec![vec![
                point("2024-01-01T09:00:00", -123.1, 49.25),
                point("2024-01-01T10:00:00", -123.2, 49.3),
            ]],
        });
        doc.images.push(PhotoPlacemark {
            name: "IMG_0001".into(),
            caption: "<img src=\"a.jpg\"/>".into(),
            longitude: -123.1,
            latitude: 49.25,
        });
        doc
    }

    #[test]
    fn whens_precede_coords() {
        let xml = to_string(&sample_document()).unwrap();
        let last_when = xml.rfind("<when>").unwrap();
        let first_coord = xml.find("<gx:coord>").unwrap();
        assert!(last_when < first_coord);
        assert_eq!(xml.matches("<when>").count(), 2);
        assert_eq!(xml.matches("<gx:coord>").count(), 2);
        assert!(xml.contains("<gx:coord>-123.1 49.25 0</gx:coord>"));
    }

    #[test]
    fn photo_placemark_shape() {
        let xml = to_string(&sample_document()).unwrap();
        assert!(xml.contains("<styleUrl>#picture</styleUrl>"));
        assert!(xml.contains("<coordinates>-123.1,49.25,0</coordinates>"));
        assert!(xml.contains("<![CDATA[<img src=\"a.jpg\"/>]]>"));
    }

    #[test]
    fn document_carries_styles_and_folders() {
        let xml = to_string(&sample_document()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Style id=\"picture\">"));
        for slot in 0..PALETTE.len() {
            assert!(xml.contains(&format!("<StyleMap id=\"color{slot}\">")));
            assert!(xml.contains(&format!("<Style id=\"color{slot}_h\">")));
        }
        assert!(xml.contains("<color>ff00ff00</color>"));
        assert!(xml.contains("<name>Tracks</name>"));
        assert!(xml.contains("<name>Images</name>"));
    }

    #[test]
    fn several_segments_become_multitrack() {
        let mut doc = sample_document();
        doc.tracks[0]
            .segments
            .push(vec![point("2024-01-01T12:00:00", -123.0, 49.0)]);
        let xml = to_string(&doc).unwrap();
        assert!(xml.contains("<gx:MultiTrack>"));
        assert_eq!(xml.matches("<gx:Track>").count(), 2);
    }

    #[test]
    fn names_are_escaped() {
        let mut doc = sample_document();
        doc.tracks[0].name = "Fish & Chips <run>".into();
        let xml = to_string(&doc).unwrap();
        assert!(xml.contains("Fish &amp; Chips &lt;run&gt;"));
    }

    #[test]
    fn cdata_terminator_is_split() {
        assert_eq!(cdata_sections("plain"), vec!["plain"]);
        assert_eq!(cdata_sections("a]]>b"), vec!["a]]", ">b"]);
        assert_eq!(cdata_sections("]]>"), vec!["]]", ">"]);
        for section in cdata_sections("x]]>y]]>z") {
            assert!(!section.contains("]]>"));
        }
    }
}
