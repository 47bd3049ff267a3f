use async_trait::async_trait;
use chirp_digest::db;
use chirp_digest::error::{SendError, SubscribeError};
use chirp_digest::model::{Audience, Recipient};
use chirp_digest::notify::{Notification, NotificationSink};
use chirp_digest::subscriptions;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio::sync::Mutex;

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[derive(Clone, Default)]
struct WelcomeSink {
    calls: Arc<Mutex<Vec<(String, Notification)>>>,
    fail: bool,
}

#[async_trait]
impl NotificationSink for WelcomeSink {
    async fn send(&self, recipient: &Recipient, notification: &Notification) -> Result<(), SendError> {
        self.calls
            .lock()
            .await
            .push((recipient.email.clone(), notification.clone()));
        if self.fail {
            return Err(SendError::RateLimited("slow down".into()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn subscribe_stores_row_and_sends_welcome() {
    let pool = setup_pool().await;
    let sink = WelcomeSink::default();

    let id = subscriptions::subscribe(&pool, &sink, " ada@example.com ", Some("Ada"))
        .await
        .unwrap();
    assert!(id > 0);

    let calls = sink.calls.lock().await.clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "ada@example.com");
    assert_eq!(calls[0].1, Notification::Welcome { name: Some("Ada".into()) });

    let recipients = db::list_recipients(&pool, Audience::DailySummary).await.unwrap();
    assert_eq!(recipients.len(), 1);
}

#[tokio::test]
async fn invalid_email_is_rejected_before_storing() {
    let pool = setup_pool().await;
    let sink = WelcomeSink::default();

    let err = subscriptions::subscribe(&pool, &sink, "not-an-email", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SubscribeError::InvalidEmail(_)));
    assert!(sink.calls.lock().await.is_empty());
    assert!(db::list_subscriptions(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn welcome_failure_is_reported_but_row_is_kept() {
    let pool = setup_pool().await;
    let sink = WelcomeSink {
        fail: true,
        ..Default::default()
    };

    let err = subscriptions::subscribe(&pool, &sink, "bo@example.com", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SubscribeError::Welcome(SendError::RateLimited(_))));
    assert_eq!(db::list_subscriptions(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unsubscribe_deactivates_known_addresses() {
    let pool = setup_pool().await;
    subscriptions::subscribe(&pool, &WelcomeSink::default(), "cy@example.com", None)
        .await
        .unwrap();

    let sub = subscriptions::unsubscribe(&pool, "cy@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.email, "cy@example.com");
    assert!(!sub.is_active);
    assert!(db::list_recipients(&pool, Audience::All).await.unwrap().is_empty());

    assert!(subscriptions::unsubscribe(&pool, "unknown@example.com")
        .await
        .unwrap()
        .is_none());
}
