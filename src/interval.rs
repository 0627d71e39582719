//! Sorted, non-overlapping interval index.
//!
//! Holds `(begin, end, payload)` ranges keyed by their start, with closed
//! bounds on both ends. The index is used to order GPX tracks by the time span
//! they cover and to answer "which track was recording at this instant?" for
//! photo captions.
//!
//! Two intervals in one index never intersect. Touching endpoints count as an
//! intersection because the ranges are closed: `[10, 20]` and `[20, 30]` would
//! both claim the instant `20`, which makes point lookups ambiguous.
//!
//! The expected size is a few dozen entries (one per recorded track), so the
//! storage is a plain sorted `Vec` searched with `partition_point`.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval [{begin}, {end}] overlaps existing interval [{existing_begin}, {existing_end}]")]
    Overlap {
        begin: String,
        end: String,
        existing_begin: String,
        existing_end: String,
    },
    #[error("interval begins at {begin} after it ends at {end}")]
    Inverted { begin: String, end: String },
}

/// One closed range and the item it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeInterval<T, V> {
    pub begin: T,
    pub end: T,
    pub payload: V,
}

impl<T: Ord, V> TimeInterval<T, V> {
    fn contains(&self, point: &T) -> bool {
        self.begin <= *point && *point <= self.end
    }

    fn intersects(&self, begin: &T, end: &T) -> bool {
        self.begin <= *end && *begin <= self.end
    }
}

#[derive(Debug, Clone)]
pub struct IntervalIndex<T, V> {
    intervals: Vec<TimeInterval<T, V>>,
}

impl<T, V> Default for IntervalIndex<T, V> {
    fn default() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }
}

impl<T, V> IntervalIndex<T, V>
where
    T: Ord + Clone + fmt::Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a closed range, keeping the index sorted by `begin`.
    ///
    /// Fails without touching the index if `begin > end` or if the range
    /// intersects any interval already stored.
    pub fn insert(&mut self, begin: T, end: T, payload: V) -> Result<(), IntervalError> {
        if begin > end {
            return Err(IntervalError::Inverted {
                begin: begin.to_string(),
                end: end.to_string(),
            });
        }

        let pos = self.intervals.partition_point(|iv| iv.begin < begin);

        // Sorted and disjoint: only the neighbours on either side can intersect.
        let before = pos.checked_sub(1).and_then(|i| self.intervals.get(i));
        let after = self.intervals.get(pos);
        if let Some(existing) = before
            .into_iter()
            .chain(after)
            .find(|iv| iv.intersects(&begin, &end))
        {
            return Err(IntervalError::Overlap {
                begin: begin.to_string(),
                end: end.to_string(),
                existing_begin: existing.begin.to_string(),
                existing_end: existing.end.to_string(),
            });
        }

        self.intervals.insert(
            pos,
            TimeInterval {
                begin,
                end,
                payload,
            },
        );
        Ok(())
    }

    /// Payload of the interval containing `point`, if any.
    pub fn find(&self, point: &T) -> Option<&V> {
        let pos = self.intervals.partition_point(|iv| iv.begin <= *point);
        let candidate = self.intervals.get(pos.checked_sub(1)?)?;
        candidate.contains(point).then_some(&candidate.payload)
    }
}

impl<T, V> IntervalIndex<T, V> {
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Intervals in ascending `begin` order.
    pub fn iter(&self) -> impl Iterator<Item = &TimeInterval<T, V>> {
        self.intervals.iter()
    }

    /// Payloads in ascending `begin` order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.intervals.iter().map(|iv| &iv.payload)
    }
}
