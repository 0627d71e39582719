//! KML reader for update mode.
//!
//! The document is parsed into a small element tree keyed by local names
//! (`gx:Track` is `Track`), then the `Tracks` and `Images` folders are
//! converted back into the document model. Styles are ignored.

use super::KmlError;
use super::model::{IMAGES_FOLDER, KmlDocument, PhotoPlacemark, TRACKS_FOLDER};
use super::model::{TrackPlacemark, TrackPoint};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn element(start: &BytesStart) -> Self {
        Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Self::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    fn required(&self, name: &str) -> Result<&Node, KmlError> {
        self.child(name)
            .ok_or_else(|| KmlError::Malformed(format!("<{}> has no <{name}>", self.name)))
    }
}

/// Parse a KML document previously written by this crate.
pub fn parse_document(xml: &str) -> Result<KmlDocument, KmlError> {
    let root = parse_tree(xml)?;
    let document = root.required("kml")?.required("Document")?;

    let mut doc = KmlDocument::new(
        document.child_text("name").unwrap_or_default(),
        document.child_text("description").unwrap_or_default(),
    );

    doc.tracks = folder(document, TRACKS_FOLDER)?
        .children_named("Placemark")
        .map(track_placemark)
        .collect::<Result<_, _>>()?;
    doc.images = folder(document, IMAGES_FOLDER)?
        .children_named("Placemark")
        .map(photo_placemark)
        .collect::<Result<_, _>>()?;
    Ok(doc)
}

fn folder<'a>(document: &'a Node, marker: &'static str) -> Result<&'a Node, KmlError> {
    document
        .children_named("Folder")
        .find(|f| f.child_text("name") == Some(marker))
        .ok_or(KmlError::MissingFolder(marker))
}

fn parse_tree(xml: &str) -> Result<Node, KmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Node::default()];
    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(Node::element(&e)),
            Event::Empty(e) => {
                let node = Node::element(&e);
                current(&mut stack)?.children.push(node);
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| KmlError::Malformed("unbalanced end tag".into()))?;
                current(&mut stack)?.children.push(node);
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                current(&mut stack)?.text.push_str(&text);
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                current(&mut stack)?
                    .text
                    .push_str(&String::from_utf8_lossy(&bytes));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err(KmlError::Malformed("unclosed element at end of document".into())),
    }
}

fn current(stack: &mut [Node]) -> Result<&mut Node, KmlError> {
    stack
        .last_mut()
        .ok_or_else(|| KmlError::Malformed("unbalanced end tag".into()))
}

fn track_placemark(node: &Node) -> Result<TrackPlacemark, KmlError> {
    let name = node.child_text("name").unwrap_or_default().to_string();
    let segments = if let Some(track) = node.child("Track") {
        vec![track_points(track, &name)?]
    } else if let Some(multi) = node.child("MultiTrack") {
        multi
            .children_named("Track")
            .map(|t| track_points(t, &name))
            .collect::<Result<_, _>>()?
    } else {
        return Err(KmlError::Malformed(format!(
            "track placemark {name:?} has no gx:Track"
        )));
    };

    Ok(TrackPlacemark {
        description: node.child_text("description").unwrap_or_default().to_string(),
        style_url: node.child_text("styleUrl").unwrap_or_default().to_string(),
        name,
        segments,
    })
}

fn track_points(track: &Node, name: &str) -> Result<Vec<TrackPoint>, KmlError> {
    let whens: Vec<&str> = track.children_named("when").map(|n| n.text.as_str()).collect();
    let coords: Vec<&str> = track.children_named("coord").map(|n| n.text.as_str()).collect();
    if whens.len() != coords.len() {
        return Err(KmlError::Malformed(format!(
            "track {name:?} has {} <when> but {} <gx:coord>",
            whens.len(),
            coords.len()
        )));
    }

    whens
        .into_iter()
        .zip(coords)
        .map(|(when, coord)| {
            let values = numbers(coord, ' ', name)?;
            let [longitude, latitude, rest @ ..] = values.as_slice() else {
                return Err(KmlError::Malformed(format!(
                    "track {name:?} has short gx:coord {coord:?}"
                )));
            };
            Ok(TrackPoint {
                when: when.to_string(),
                longitude: *longitude,
                latitude: *latitude,
                altitude: rest.first().copied().unwrap_or(0.0),
            })
        })
        .collect()
}

fn photo_placemark(node: &Node) -> Result<PhotoPlacemark, KmlError> {
    let name = node.child_text("name").unwrap_or_default().to_string();
    let coordinates = node
        .child("Point")
        .and_then(|p| p.child_text("coordinates"))
        .ok_or_else(|| KmlError::Malformed(format!("photo placemark {name:?} has no Point")))?;
    let values = numbers(coordinates, ',', &name)?;
    let [longitude, latitude, ..] = values.as_slice() else {
        return Err(KmlError::Malformed(format!(
            "photo placemark {name:?} has short coordinates {coordinates:?}"
        )));
    };

    Ok(PhotoPlacemark {
        caption: node.child_text("description").unwrap_or_default().to_string(),
        longitude: *longitude,
        latitude: *latitude,
        name,
    })
}

fn numbers(raw: &str, separator: char, owner: &str) -> Result<Vec<f64>, KmlError> {
    raw.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>().map_err(|_| {
                KmlError::Malformed(format!("{owner:?} has non-numeric coordinate {s:?}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kml::to_string;

    fn sample() -> KmlDocument {
        let mut doc = KmlDocument::new("Trip", "Two days & a GPX log");
        for (day, style) in [("2024-01-01", "#color0"), ("2024-01-02", "#color1")] {
            doc.tracks.push(TrackPlacemark {
                name: day.into(),
                description: format!("Displays the path taken on {day}"),
                style_url: style.into(),
                segments: vec![vec![
                    TrackPoint {
                        when: format!("{day}T09:00:00"),
                        longitude: -123.1,
                        latitude: 49.25,
                        altitude: 12.5,
                    },
                    TrackPoint {
                        when: format!("{day}T09:30:00.5"),
                        longitude: -123.15,
                        latitude: 49.3,
                        altitude: -2.0,
                    },
                ]],
            });
        }
        doc.tracks.push(TrackPlacemark {
            name: "morning-ride".into(),
            description: "GPX".into(),
            style_url: "#color2".into(),
            segments: vec![
                vec![TrackPoint {
                    when: "2024-01-03T08:00:00Z".into(),
                    longitude: 2.35,
                    latitude: 48.85,
                    altitude: 35.0,
                }],
                vec![TrackPoint {
                    when: "2024-01-03T09:00:00Z".into(),
                    longitude: 2.36,
                    latitude: 48.86,
                    altitude: 36.0,
                }],
            ],
        });
        doc.images.push(PhotoPlacemark {
            name: "IMG_0001".into(),
            caption: "<img src=\"file:///p/IMG_0001.JPG\" width=\"400\"><br><label>a ]]> b</label>"
                .into(),
            longitude: -123.1,
            latitude: 49.25,
        });
        doc
    }

    #[test]
    fn round_trip_recovers_placemarks() {
        let doc = sample();
        let parsed = parse_document(&to_string(&doc).unwrap()).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(parsed.tracks.len(), 3);
        assert_eq!(parsed.images.len(), 1);
    }

    #[test]
    fn empty_folders_round_trip() {
        let doc = KmlDocument::new("Empty", "");
        let parsed = parse_document(&to_string(&doc).unwrap()).unwrap();
        assert!(parsed.tracks.is_empty());
        assert!(parsed.images.is_empty());
    }

    #[test]
    fn missing_images_folder_is_error() {
        let xml = r#"<kml><Document><Folder><name>Tracks</name></Folder></Document></kml>"#;
        let err = parse_document(xml).unwrap_err();
        assert!(matches!(err, KmlError::MissingFolder("Images")));
    }

    #[test]
    fn unequal_when_and_coord_is_malformed() {
        let xml = r#"<kml xmlns:gx="http://www.google.com/kml/ext/2.2"><Document>
<Folder><name>Tracks</name><Placemark><name>day</name>
<gx:Track><when>2024-01-01T00:00:00</when><when>2024-01-01T00:01:00</when>
<gx:coord>1 2 0</gx:coord></gx:Track></Placemark></Folder>
<Folder><name>Images</name></Folder></Document></kml>"#;
        let err = parse_document(xml).unwrap_err();
        assert!(matches!(err, KmlError::Malformed(_)));
        assert!(err.to_string().contains("2 <when> but 1"));
    }

    #[test]
    fn folders_found_by_name_not_position() {
        let xml = r#"<kml><Document>
<Folder><name>Images</name><Placemark><name>p</name>
<Point><coordinates>1.5,2.5,0</coordinates></Point></Placemark></Folder>
<Folder><name>Other</name></Folder>
<Folder><name>Tracks</name></Folder></Document></kml>"#;
        let doc = parse_document(xml).unwrap();
        assert_eq!(doc.images[0].longitude, 1.5);
        assert_eq!(doc.images[0].latitude, 2.5);
        assert!(doc.tracks.is_empty());
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        assert!(parse_document("<kml><Document></kml>").is_err());
    }
}
