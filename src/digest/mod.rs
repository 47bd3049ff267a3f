//! Daily digest engine: window selection, per-image attribution, species
//! tally and the capped timeline/gallery views.
//!
//! Everything here is pure apart from the single [`RecordStore`] read in
//! [`compute_daily_digest`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use tracing::{info, instrument};

use crate::error::DigestError;
use crate::model::{DetectionRecord, DigestSummary, Window, WindowCapture};

pub mod attribution;
pub mod curator;
pub mod tally;
pub mod window;

pub use attribution::{AttributionIndex, ImageRef};
pub use curator::{
    curate, ClockFormatter, CuratedViews, TimeFormatter, GALLERY_LIMIT, TIMELINE_LIMIT,
    UNKNOWN_SPECIES,
};
pub use tally::SpeciesTally;
pub use window::daily_window;

/// Read-only source of detection records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every detection captured within `[window.start, window.end)`.
    async fn fetch_detections(&self, window: &Window) -> Result<Vec<DetectionRecord>>;

    /// Every image captured within the window plus its detections. Stores
    /// that keep images without detections override this so those images
    /// are counted too.
    async fn fetch_capture(&self, window: &Window) -> Result<WindowCapture> {
        let detections = self.fetch_detections(window).await?;
        Ok(WindowCapture::from_detections(detections))
    }
}

/// Compose the stage outputs into a summary value.
pub fn assemble(
    window: &Window,
    index: &AttributionIndex,
    tally: SpeciesTally,
    views: CuratedViews,
) -> DigestSummary {
    DigestSummary {
        new_count: index.image_count(),
        species_count: tally.species_count,
        top_species: tally.top_species,
        timeline: views.timeline,
        gallery: views.gallery,
        window_start: window.start,
    }
}

/// Summarize an already-fetched capture for `window`.
pub fn summarize(
    capture: &WindowCapture,
    window: &Window,
    formatter: &dyn TimeFormatter,
) -> DigestSummary {
    let index = AttributionIndex::from_capture(capture, window);
    let tally = SpeciesTally::from_best(index.best_attributions());
    let views = curate(&index, formatter);
    assemble(window, &index, tally, views)
}

/// Reject any record whose confidence is outside `[0, 1]`.
pub fn validate_records(records: &[DetectionRecord]) -> Result<(), DigestError> {
    match records.iter().find(|r| !r.has_valid_confidence()) {
        Some(bad) => Err(DigestError::InvalidConfidence {
            image_id: bad.image_id.clone(),
            confidence: bad.confidence,
        }),
        None => Ok(()),
    }
}

/// Fetch and summarize the day before `now`.
#[instrument(skip_all)]
pub async fn compute_daily_digest<Tz: TimeZone>(
    store: &dyn RecordStore,
    now: &DateTime<Tz>,
    formatter: &dyn TimeFormatter,
) -> Result<DigestSummary, DigestError> {
    let window = daily_window(now);
    compute_digest(store, window, formatter).await
}

/// Fetch and summarize an explicit window.
#[instrument(skip_all, fields(start = %window.start, end = %window.end))]
pub async fn compute_digest(
    store: &dyn RecordStore,
    window: Window,
    formatter: &dyn TimeFormatter,
) -> Result<DigestSummary, DigestError> {
    let capture = store
        .fetch_capture(&window)
        .await
        .map_err(DigestError::StoreUnavailable)?;
    validate_records(&capture.detections)?;

    let summary = summarize(&capture, &window, formatter);
    info!(
        records = capture.detections.len(),
        images = summary.new_count,
        species = summary.species_count,
        top = summary.top_species.as_deref().unwrap_or("-"),
        "digest computed"
    );
    Ok(summary)
}
