use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use std::future::{pending, Future};
use tracing::{info, instrument};

use crate::digest::{compute_daily_digest, RecordStore, TimeFormatter};
use crate::dispatch::BatchDispatcher;
use crate::error::JobError;
use crate::model::{Audience, DispatchReport, Recipient};
use crate::notify::Notification;

/// Where the recipient list comes from.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn recipients(&self, audience: Audience) -> Result<Vec<Recipient>>;
}

/// Compute yesterday's digest once and send it to every daily-summary subscriber.
pub async fn run_daily_summary<Tz: TimeZone>(
    source: &dyn RecipientSource,
    store: &dyn RecordStore,
    dispatcher: &BatchDispatcher,
    now: &DateTime<Tz>,
    formatter: &dyn TimeFormatter,
) -> Result<DispatchReport, JobError> {
    run_daily_summary_until(source, store, dispatcher, now, formatter, pending()).await
}

#[instrument(skip_all)]
pub async fn run_daily_summary_until<Tz: TimeZone, C: Future<Output = ()>>(
    source: &dyn RecipientSource,
    store: &dyn RecordStore,
    dispatcher: &BatchDispatcher,
    now: &DateTime<Tz>,
    formatter: &dyn TimeFormatter,
    cancel: C,
) -> Result<DispatchReport, JobError> {
    let recipients = source
        .recipients(Audience::DailySummary)
        .await
        .map_err(JobError::Recipients)?;
    if recipients.is_empty() {
        info!("no active daily summary subscribers");
        return Ok(DispatchReport::default());
    }

    let digest = compute_daily_digest(store, now, formatter).await?;
    info!(
        recipients = recipients.len(),
        new_count = digest.new_count,
        "sending daily summary"
    );
    Ok(dispatcher
        .dispatch_until(recipients, Notification::DailyDigest(digest), cancel)
        .await)
}

/// Alert every active subscriber about a notable sighting.
#[instrument(skip_all, fields(species = %species))]
pub async fn run_special_sighting(
    source: &dyn RecipientSource,
    dispatcher: &BatchDispatcher,
    species: &str,
    image_url: &str,
    confidence: f64,
) -> Result<DispatchReport, JobError> {
    let species = species.trim();
    if species.is_empty() {
        return Err(JobError::InvalidSighting("species is required"));
    }
    if !(0.0..=1.0).contains(&confidence) {
        return Err(JobError::InvalidSighting("confidence must be within [0, 1]"));
    }

    let recipients = source
        .recipients(Audience::All)
        .await
        .map_err(JobError::Recipients)?;
    if recipients.is_empty() {
        info!("no active subscribers");
        return Ok(DispatchReport::default());
    }

    let notification = Notification::SpecialSighting {
        species: species.to_string(),
        image_url: image_url.to_string(),
        confidence,
    };
    Ok(dispatcher.dispatch(recipients, notification).await)
}
