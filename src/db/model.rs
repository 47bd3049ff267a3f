//! Row shapes returned by repository queries.
//!
//! Keep these focused on what the SQL returns; conversion into domain values
//! happens here, business rules live in higher layers.

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};

use crate::model::{DetectionRecord, ImageRef};

/// One `images ⟕ attributions` row. The attribution columns are NULL for an
/// image without attributions.
#[derive(Debug, Clone)]
pub struct DetectionRow {
    pub image_id: String,
    pub image_url: String,
    pub taken_on_ms: i64,
    pub species: Option<String>,
    pub confidence: Option<f64>,
}

impl DetectionRow {
    /// The image and, when the row carries one, its attribution.
    pub fn into_parts(self) -> Result<(ImageRef, Option<DetectionRecord>)> {
        let captured_at = Utc
            .timestamp_millis_opt(self.taken_on_ms)
            .single()
            .ok_or_else(|| {
                anyhow!(
                    "image {} has out-of-range timestamp {}",
                    self.image_id,
                    self.taken_on_ms
                )
            })?;
        let image = ImageRef {
            id: self.image_id,
            captured_at,
            image_url: self.image_url,
        };
        let record = match (self.species, self.confidence) {
            (Some(species), Some(confidence)) => Some(DetectionRecord {
                image_id: image.id.clone(),
                captured_at,
                species,
                confidence,
                image_url: image.image_url.clone(),
            }),
            _ => None,
        };
        Ok((image, record))
    }
}
