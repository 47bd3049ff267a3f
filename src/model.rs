use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One candidate species identification for one captured image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub image_id: String,
    pub captured_at: DateTime<Utc>,
    pub species: String,
    pub confidence: f64,
    pub image_url: String,
}

impl DetectionRecord {
    pub fn has_valid_confidence(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
    }
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && *at < self.end
    }
}

/// A distinct image seen inside a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub captured_at: DateTime<Utc>,
    pub image_url: String,
}

/// What the store holds for one window: every captured image and every
/// detection. An image may have no detections at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowCapture {
    pub images: Vec<ImageRef>,
    pub detections: Vec<DetectionRecord>,
}

impl WindowCapture {
    /// Capture whose images are exactly those referenced by `detections`.
    pub fn from_detections(detections: Vec<DetectionRecord>) -> Self {
        let mut images: Vec<ImageRef> = Vec::new();
        for record in &detections {
            if !images.iter().any(|img| img.id == record.image_id) {
                images.push(ImageRef {
                    id: record.image_id.clone(),
                    captured_at: record.captured_at,
                    image_url: record.image_url.clone(),
                });
            }
        }
        Self { images, detections }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub time: String,
    pub species: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub id: String,
    pub image_url: String,
    pub species: String,
}

/// Aggregated summary of one window's detections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSummary {
    pub new_count: usize,
    pub species_count: usize,
    pub top_species: Option<String>,
    pub timeline: Vec<TimelineEntry>,
    pub gallery: Vec<GalleryEntry>,
    pub window_start: DateTime<Utc>,
}

impl DigestSummary {
    pub fn is_empty(&self) -> bool {
        self.new_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }
}

/// Outcome counts of one dispatch. `succeeded + failed == total_recipients`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub total_recipients: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
        self.total_recipients += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
        self.total_recipients += 1;
    }
}

/// Which subscribers a notification goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    All,
    DailySummary,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::All => "all",
            Audience::DailySummary => "daily_summary",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub daily_summary_enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(confidence: f64) -> DetectionRecord {
        DetectionRecord {
            image_id: "img".into(),
            captured_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            species: "Robin".into(),
            confidence,
            image_url: "https://cdn/img.jpg".into(),
        }
    }

    #[test]
    fn confidence_range_is_inclusive() {
        assert!(record(0.0).has_valid_confidence());
        assert!(record(1.0).has_valid_confidence());
        assert!(!record(1.01).has_valid_confidence());
        assert!(!record(-0.1).has_valid_confidence());
        assert!(!record(f64::NAN).has_valid_confidence());
    }

    #[test]
    fn window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let window = Window { start, end };
        assert!(window.contains(&start));
        assert!(!window.contains(&end));
    }

    #[test]
    fn capture_from_detections_lists_each_image_once() {
        let mut other = record(0.4);
        other.image_id = "other".into();
        let capture = WindowCapture::from_detections(vec![record(0.9), other, record(0.2)]);
        let ids: Vec<_> = capture.images.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["img", "other"]);
        assert_eq!(capture.detections.len(), 3);
    }

    #[test]
    fn report_counters_stay_consistent() {
        let mut report = DispatchReport::default();
        report.record_success();
        report.record_failure();
        report.record_success();
        assert_eq!(report.total_recipients, 3);
        assert_eq!(report.succeeded + report.failed, report.total_recipients);
    }
}
