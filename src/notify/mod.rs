//! Notification payloads and the delivery capability the dispatcher uses.
use async_trait::async_trait;
use std::fmt;

use crate::error::SendError;
use crate::model::{DigestSummary, Recipient};

pub mod model;
pub mod resend;

pub use resend::ResendClient;

/// Opaque per-recipient delivery. Retries, if any, belong to implementations.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, recipient: &Recipient, notification: &Notification)
        -> Result<(), SendError>;
}

/// Which configured sender address a notification goes out from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderRole {
    Daily,
    Alerts,
    Welcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    DailyDigest(DigestSummary),
    SpecialSighting {
        species: String,
        image_url: String,
        confidence: f64,
    },
    Welcome {
        name: Option<String>,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::DailyDigest(_) => "daily_digest",
            Notification::SpecialSighting { .. } => "special_sighting",
            Notification::Welcome { .. } => "welcome",
        }
    }

    pub fn sender_role(&self) -> SenderRole {
        match self {
            Notification::DailyDigest(_) => SenderRole::Daily,
            Notification::SpecialSighting { .. } => SenderRole::Alerts,
            Notification::Welcome { .. } => SenderRole::Welcome,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::DailyDigest(d) => {
                format!("Your Daily Bird Summary - {} New Sightings!", d.new_count)
            }
            Notification::SpecialSighting { species, .. } => {
                format!("🎉 New Species Alert: {species} spotted!")
            }
            Notification::Welcome { .. } => "Welcome to ChirpChirp! 🐦".to_string(),
        }
    }

    /// Plain-text body listing the payload facts.
    pub fn text_body(&self) -> String {
        TextBody(self).to_string()
    }
}

/// Plain-text rendering of a notification.
pub struct TextBody<'a>(pub &'a Notification);

impl fmt::Display for TextBody<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Notification::DailyDigest(d) => {
                writeln!(f, "Summary for {}", d.window_start.format("%Y-%m-%d"))?;
                if d.is_empty() {
                    return writeln!(f, "No new sightings yesterday.");
                }
                writeln!(f, "New pictures: {}", d.new_count)?;
                writeln!(f, "Species seen: {}", d.species_count)?;
                if let Some(top) = &d.top_species {
                    writeln!(f, "Most popular: {top}")?;
                }
                writeln!(f)?;
                for entry in &d.timeline {
                    writeln!(f, "{}  {}  {}", entry.time, entry.species, entry.image_url)?;
                }
                Ok(())
            }
            Notification::SpecialSighting {
                species,
                image_url,
                confidence,
            } => {
                writeln!(f, "Species: {species}")?;
                writeln!(f, "Confidence: {}%", confidence_percent(*confidence))?;
                writeln!(f, "Photo: {image_url}")
            }
            Notification::Welcome { name } => {
                let who = name.as_deref().unwrap_or("there");
                writeln!(f, "Hi {who}, thanks for subscribing to ChirpChirp.")
            }
        }
    }
}

pub fn confidence_percent(confidence: f64) -> i64 {
    (confidence * 100.0).round() as i64
}
