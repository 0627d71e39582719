//! Photo balloon captions.
//!
//! A caption is a small HTML fragment: the photo itself scaled to 400 pixels,
//! its capture time, and the GPX track that was recording when it was taken,
//! if any. The image URL is the configured base URL joined with the photo's
//! path relative to its source directory, or a `file://` URL to the photo on
//! disk when no base URL is configured.

use crate::scan::Photo;
use maud::{Markup, html};
use std::path::{Component, Path};

const CAPTION_IMAGE_WIDTH: u32 = 400;

#[derive(Debug, Clone, Default)]
pub struct CaptionBuilder {
    base_url: Option<String>,
}

impl CaptionBuilder {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn photo_url(&self, photo: &Photo) -> String {
        match &self.base_url {
            Some(base) => {
                let relative = photo.path.strip_prefix(&photo.root).unwrap_or(&photo.path);
                format!("{base}/{}", url_path(relative))
            }
            None => {
                let absolute =
                    std::path::absolute(&photo.path).unwrap_or_else(|_| photo.path.clone());
                format!("file://{}", url_path(&absolute))
            }
        }
    }

    /// The `<img>` element every caption of `photo` starts with. It names the
    /// photo uniquely, so update mode uses it to recognize a photo's existing
    /// placemark.
    pub fn image_tag(&self, photo: &Photo) -> Markup {
        html! {
            img src=(self.photo_url(photo)) width=(CAPTION_IMAGE_WIDTH);
        }
    }

    /// Render the caption HTML for `photo`.
    pub fn render(&self, photo: &Photo, track: Option<&str>) -> String {
        html! {
            (self.image_tag(photo))
            br;
            (photo.fix.date) " " (photo.fix.time)
            @if let Some(track) = track {
                br;
                "Track: " (track)
            }
        }
        .into_string()
    }
}

/// Join path components with `/`, percent-encoding characters that would
/// otherwise end or corrupt a URL path.
fn url_path(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            Component::Normal(part) => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                for c in part.to_string_lossy().chars() {
                    match c {
                        ' ' => out.push_str("%20"),
                        '#' => out.push_str("%23"),
                        '%' => out.push_str("%25"),
                        '?' => out.push_str("%3F"),
                        _ => out.push(c),
                    }
                }
            }
            _ => {}
        }
    }
    out
}
