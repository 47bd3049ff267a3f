use std::collections::{HashMap, HashSet};

pub use crate::model::ImageRef;
use crate::model::{DetectionRecord, Window, WindowCapture};

/// Highest-confidence record for each image in a window.
#[derive(Debug, Clone, Default)]
pub struct AttributionIndex {
    best: HashMap<String, DetectionRecord>,
    images: Vec<ImageRef>,
}

impl AttributionIndex {
    /// Group the in-window records by image and keep the best one per image.
    ///
    /// A record replaces the current best only when its confidence is strictly
    /// greater, so among equal confidences the first record in input order wins.
    pub fn build(records: &[DetectionRecord], window: &Window) -> Self {
        Self::index(&[], records, window)
    }

    /// Like [`build`](Self::build), but every in-window image of the capture is
    /// listed, including images with no detection.
    pub fn from_capture(capture: &WindowCapture, window: &Window) -> Self {
        Self::index(&capture.images, &capture.detections, window)
    }

    fn index(known: &[ImageRef], records: &[DetectionRecord], window: &Window) -> Self {
        let mut best: HashMap<String, DetectionRecord> = HashMap::new();
        let mut images: Vec<ImageRef> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for image in known.iter().filter(|img| window.contains(&img.captured_at)) {
            if seen.insert(image.id.clone()) {
                images.push(image.clone());
            }
        }

        for record in records.iter().filter(|r| window.contains(&r.captured_at)) {
            if seen.insert(record.image_id.clone()) {
                images.push(ImageRef {
                    id: record.image_id.clone(),
                    captured_at: record.captured_at,
                    image_url: record.image_url.clone(),
                });
            }
            match best.get_mut(&record.image_id) {
                Some(current) => {
                    if record.confidence > current.confidence {
                        *current = record.clone();
                    }
                }
                None => {
                    best.insert(record.image_id.clone(), record.clone());
                }
            }
        }

        // Stable: images captured at the same instant keep first-seen order.
        images.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));

        Self { best, images }
    }

    /// Distinct images, most recent first.
    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    /// `None` for an image without any detection.
    pub fn best_for(&self, image_id: &str) -> Option<&DetectionRecord> {
        self.best.get(image_id)
    }

    /// Best records in image order; images without detections are skipped.
    pub fn best_attributions(&self) -> impl Iterator<Item = &DetectionRecord> {
        self.images.iter().filter_map(|img| self.best.get(&img.id))
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
