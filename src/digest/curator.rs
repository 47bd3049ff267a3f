use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use std::fmt;

use super::attribution::AttributionIndex;
use crate::model::{GalleryEntry, TimelineEntry};

/// Maximum number of timeline entries in a digest.
pub const TIMELINE_LIMIT: usize = 8;
/// Maximum number of gallery entries in a digest.
pub const GALLERY_LIMIT: usize = 6;
/// Species reported for an image without any attribution.
pub const UNKNOWN_SPECIES: &str = "Unknown";

/// Renders a capture instant for the timeline.
pub trait TimeFormatter: Send + Sync {
    fn format(&self, at: &DateTime<Utc>) -> String;
}

/// 12-hour `HH:MM AM` clock in a time zone. Each instant is converted on its
/// own, so a zone with DST renders times on both sides of a switch correctly.
#[derive(Debug, Clone, Copy)]
pub struct ClockFormatter<Tz = FixedOffset> {
    tz: Tz,
}

impl<Tz: TimeZone> ClockFormatter<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl ClockFormatter<FixedOffset> {
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }
}

impl<Tz> TimeFormatter for ClockFormatter<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: fmt::Display,
{
    fn format(&self, at: &DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format("%I:%M %p").to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CuratedViews {
    pub timeline: Vec<TimelineEntry>,
    pub gallery: Vec<GalleryEntry>,
}

/// Build the capped timeline and gallery from the recency-ordered images.
pub fn curate(index: &AttributionIndex, formatter: &dyn TimeFormatter) -> CuratedViews {
    let species_of = |id: &str| {
        index
            .best_for(id)
            .map(|r| r.species.clone())
            .unwrap_or_else(|| UNKNOWN_SPECIES.to_string())
    };

    let timeline = index
        .images()
        .iter()
        .take(TIMELINE_LIMIT)
        .map(|img| TimelineEntry {
            time: formatter.format(&img.captured_at),
            species: species_of(&img.id),
            image_url: img.image_url.clone(),
        })
        .collect();

    let gallery = index
        .images()
        .iter()
        .take(GALLERY_LIMIT)
        .map(|img| GalleryEntry {
            id: img.id.clone(),
            image_url: img.image_url.clone(),
            species: species_of(&img.id),
        })
        .collect();

    CuratedViews { timeline, gallery }
}
