use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument};

use crate::db::{self, Pool};
use crate::error::SubscribeError;
use crate::model::{Recipient, Subscription};
use crate::notify::{Notification, NotificationSink};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Store an active subscription and send the welcome email. Returns the subscription id.
#[instrument(skip_all)]
pub async fn subscribe(
    pool: &Pool,
    sink: &dyn NotificationSink,
    email: &str,
    name: Option<&str>,
) -> Result<i64, SubscribeError> {
    let email = email.trim();
    if !is_valid_email(email) {
        return Err(SubscribeError::InvalidEmail(email.to_string()));
    }
    let name = name.map(str::trim).filter(|n| !n.is_empty());

    let id = db::upsert_subscription(pool, email, name)
        .await
        .map_err(SubscribeError::Store)?;

    let recipient = Recipient {
        email: email.to_string(),
        name: name.map(str::to_string),
    };
    sink.send(
        &recipient,
        &Notification::Welcome {
            name: recipient.name.clone(),
        },
    )
    .await?;
    info!(subscription_id = id, "subscribed");
    Ok(id)
}

/// Deactivate a subscription, keeping the row. `None` when the address is unknown.
#[instrument(skip_all)]
pub async fn unsubscribe(pool: &Pool, email: &str) -> Result<Option<Subscription>, SubscribeError> {
    let found = db::deactivate_subscription(pool, email.trim())
        .await
        .map_err(SubscribeError::Store)?;
    if let Some(sub) = &found {
        info!(subscription_id = sub.id, "unsubscribed");
    }
    Ok(found)
}
