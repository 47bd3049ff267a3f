use super::model::DetectionRow;
use crate::model::{Audience, DetectionRecord, Recipient, Subscription, Window, WindowCapture};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open database {normalized}"))?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// Expand a leading `~/` in a file-backed SQLite URL, make sure its parent
/// directory exists and ask SQLite to create the file. In-memory and
/// non-SQLite URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };
    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let query = match query {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{q}&mode=rwc"),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{path}?{query}")
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn insert_image(
    pool: &Pool,
    id: &str,
    image_url: &str,
    taken_on: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO images (id, image_url, taken_on_ms) VALUES (?, ?, ?)")
        .bind(id)
        .bind(image_url)
        .bind(taken_on.timestamp_millis())
        .execute(pool)
        .await
        .with_context(|| format!("failed to insert image {id}"))?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn insert_attribution(
    pool: &Pool,
    image_id: &str,
    species: &str,
    confidence: f64,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO attributions (image_id, species, confidence) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(image_id)
    .bind(species)
    .bind(confidence)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert attribution for image {image_id}"))?;
    Ok(rec.get("id"))
}

/// Every image taken within the window and its attributions, newest image
/// first and in insertion order within an image.
#[instrument(skip_all)]
pub async fn fetch_capture(pool: &Pool, window: &Window) -> Result<WindowCapture> {
    let rows = sqlx::query(
        "SELECT i.id AS image_id, i.image_url, i.taken_on_ms, a.species, a.confidence \
         FROM images i \
         LEFT JOIN attributions a ON a.image_id = i.id \
         WHERE i.taken_on_ms >= ? AND i.taken_on_ms < ? \
         ORDER BY i.taken_on_ms DESC, i.id ASC, a.id ASC",
    )
    .bind(window.start.timestamp_millis())
    .bind(window.end.timestamp_millis())
    .fetch_all(pool)
    .await
    .context("failed to query detections")?;

    let mut capture = WindowCapture::default();
    for row in &rows {
        let detection = DetectionRow {
            image_id: row.get("image_id"),
            image_url: row.get("image_url"),
            taken_on_ms: row.get("taken_on_ms"),
            species: row.get("species"),
            confidence: row.get("confidence"),
        };
        let (image, record) = detection.into_parts()?;
        // Rows of one image are adjacent under the ORDER BY.
        if capture.images.last().map_or(true, |last| last.id != image.id) {
            capture.images.push(image);
        }
        capture.detections.extend(record);
    }
    Ok(capture)
}

/// Attributions of images taken within the window, in [`fetch_capture`] order.
pub async fn fetch_detections(pool: &Pool, window: &Window) -> Result<Vec<DetectionRecord>> {
    Ok(fetch_capture(pool, window).await?.detections)
}

/// Create or re-activate a subscription. Returns its id.
#[instrument(skip_all)]
pub async fn upsert_subscription(pool: &Pool, email: &str, name: Option<&str>) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO email_subscriptions (email, name, is_active) VALUES (?, ?, 1) \
         ON CONFLICT(email) DO UPDATE SET name = COALESCE(excluded.name, name), is_active = 1 \
         RETURNING id",
    )
    .bind(email)
    .bind(name)
    .fetch_one(pool)
    .await
    .context("failed to upsert subscription")?;
    Ok(rec.get("id"))
}

/// Mark a subscription inactive; the row is kept. `None` when the address is unknown.
#[instrument(skip_all)]
pub async fn deactivate_subscription(pool: &Pool, email: &str) -> Result<Option<Subscription>> {
    let row = sqlx::query(
        "UPDATE email_subscriptions SET is_active = 0 WHERE email = ? \
         RETURNING id, email, name, is_active, daily_summary_enabled, created_at",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("failed to deactivate subscription")?;
    row.as_ref().map(subscription_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn set_daily_summary_enabled(pool: &Pool, email: &str, enabled: bool) -> Result<bool> {
    let res = sqlx::query("UPDATE email_subscriptions SET daily_summary_enabled = ? WHERE email = ?")
        .bind(enabled)
        .bind(email)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn list_subscriptions(pool: &Pool) -> Result<Vec<Subscription>> {
    let rows = sqlx::query(
        "SELECT id, email, name, is_active, daily_summary_enabled, created_at \
         FROM email_subscriptions ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(subscription_from_row).collect()
}

#[instrument(skip_all, fields(audience = audience.as_str()))]
pub async fn list_recipients(pool: &Pool, audience: Audience) -> Result<Vec<Recipient>> {
    let sql = match audience {
        Audience::All => {
            "SELECT email, name FROM email_subscriptions WHERE is_active = 1 ORDER BY id ASC"
        }
        Audience::DailySummary => {
            "SELECT email, name FROM email_subscriptions \
             WHERE is_active = 1 AND daily_summary_enabled = 1 ORDER BY id ASC"
        }
    };
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .context("failed to list recipients")?;
    Ok(rows
        .into_iter()
        .map(|row| Recipient {
            email: row.get("email"),
            name: row.get("name"),
        })
        .collect())
}

fn subscription_from_row(row: &SqliteRow) -> Result<Subscription> {
    let created_at: NaiveDateTime = row
        .try_get("created_at")
        .map_err(|err| anyhow!("subscription has unreadable created_at: {err}"))?;
    Ok(Subscription {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        is_active: row.get("is_active"),
        daily_summary_enabled: row.get("daily_summary_enabled"),
        created_at: created_at.and_utc(),
    })
}
