//! Track colour palette.
//!
//! Colours are KML `aabbggrr` hex strings. Each slot yields a normal style
//! (`color<i>_n`, width 6), a highlight style (`color<i>_h`, width 8, fully
//! opaque) and a style map `color<i>` pairing them. Tracks reference the map.

pub const PALETTE: [&str; 6] = [
    "bfff3f3f", "7f00ff00", "7f0000ff", "7fffff00", "7fff00ff", "7f00ffff",
];

pub const NORMAL_WIDTH: u32 = 6;
pub const HIGHLIGHT_WIDTH: u32 = 8;

/// `color<slot>`, the style map id for a palette slot.
pub fn style_id(slot: usize) -> String {
    format!("color{slot}")
}

/// The opaque variant of a palette colour.
pub fn highlight_colour(normal: &str) -> String {
    format!("ff{}", normal.get(2..).unwrap_or_default())
}

/// Hands out palette slots to new tracks in a repeating cycle.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    cursor: usize,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue the cycle after `existing_tracks` tracks already in a document.
    pub fn resume(existing_tracks: usize) -> Self {
        Self {
            cursor: existing_tracks % PALETTE.len(),
        }
    }

    pub fn next_slot(&mut self) -> usize {
        let slot = self.cursor;
        self.cursor = (self.cursor + 1) % PALETTE.len();
        slot
    }

    /// `#color<slot>` for the next track.
    pub fn next_style_url(&mut self) -> String {
        format!("#{}", style_id(self.next_slot()))
    }
}
