use chirp_digest::db;
use chirp_digest::digest::{
    self, daily_window, ClockFormatter, GALLERY_LIMIT, TIMELINE_LIMIT, UNKNOWN_SPECIES,
};
use chirp_digest::error::DigestError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 7, 0, 0).unwrap()
}

fn yesterday_at(hour: i64, minute: i64) -> DateTime<Utc> {
    daily_window(&now()).start + Duration::hours(hour) + Duration::minutes(minute)
}

async fn add_image(pool: &sqlx::SqlitePool, id: &str, at: DateTime<Utc>, attributions: &[(&str, f64)]) {
    db::insert_image(pool, id, &format!("https://cdn.example/{id}.jpg"), at)
        .await
        .unwrap();
    for (species, confidence) in attributions {
        db::insert_attribution(pool, id, species, *confidence)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn robin_sparrow_jay_scenario() {
    let pool = setup_pool().await;
    add_image(
        &pool,
        "A",
        yesterday_at(8, 15),
        &[("Robin", 0.4), ("Robin", 0.9), ("Sparrow", 0.6)],
    )
    .await;
    add_image(&pool, "B", yesterday_at(17, 40), &[("Jay", 0.99)]).await;
    // Outside the window on both sides.
    add_image(&pool, "old", yesterday_at(-1, 0), &[("Crow", 0.9)]).await;
    add_image(&pool, "today", yesterday_at(24, 30), &[("Crow", 0.9)]).await;

    let summary = digest::compute_daily_digest(&pool, &now(), &ClockFormatter::utc())
        .await
        .unwrap();

    assert_eq!(summary.new_count, 2);
    assert_eq!(summary.species_count, 2);
    assert_eq!(summary.top_species.as_deref(), Some("Jay"));
    assert_eq!(summary.window_start, Utc.with_ymd_and_hms(2024, 6, 14, 0, 0, 0).unwrap());

    let timeline: Vec<_> = summary
        .timeline
        .iter()
        .map(|t| (t.time.as_str(), t.species.as_str()))
        .collect();
    assert_eq!(timeline, vec![("05:40 PM", "Jay"), ("08:15 AM", "Robin")]);

    let gallery: Vec<_> = summary.gallery.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(gallery, vec!["B", "A"]);
    assert_eq!(summary.gallery[1].image_url, "https://cdn.example/A.jpg");
}

#[tokio::test]
async fn unattributed_image_is_counted_as_unknown() {
    let pool = setup_pool().await;
    add_image(&pool, "A", yesterday_at(9, 0), &[("Robin", 0.9)]).await;
    add_image(&pool, "B", yesterday_at(11, 30), &[]).await;

    let summary = digest::compute_daily_digest(&pool, &now(), &ClockFormatter::utc())
        .await
        .unwrap();

    assert_eq!(summary.new_count, 2);
    // Only attributed images vote.
    assert_eq!(summary.species_count, 1);
    assert_eq!(summary.top_species.as_deref(), Some("Robin"));

    let gallery: Vec<_> = summary
        .gallery
        .iter()
        .map(|g| (g.id.as_str(), g.species.as_str()))
        .collect();
    assert_eq!(gallery, vec![("B", UNKNOWN_SPECIES), ("A", "Robin")]);
    assert_eq!(summary.timeline[0].time, "11:30 AM");
    assert_eq!(summary.timeline[0].species, UNKNOWN_SPECIES);
    assert_eq!(summary.timeline[0].image_url, "https://cdn.example/B.jpg");
}

#[tokio::test]
async fn busy_day_is_capped_and_counted_per_image() {
    let pool = setup_pool().await;
    for i in 0..15 {
        let id = format!("img-{i:02}");
        let best = if i % 2 == 0 { "Cardinal" } else { "Finch" };
        add_image(
            &pool,
            &id,
            yesterday_at(i, 0),
            &[(best, 0.8), ("Sparrow", 0.2), ("Wren", 0.1)],
        )
        .await;
    }

    let summary = digest::compute_daily_digest(&pool, &now(), &ClockFormatter::utc())
        .await
        .unwrap();

    assert_eq!(summary.new_count, 15);
    // Low-confidence alternates never count as species seen.
    assert_eq!(summary.species_count, 2);
    assert_eq!(summary.top_species.as_deref(), Some("Cardinal"));
    assert_eq!(summary.timeline.len(), TIMELINE_LIMIT);
    assert_eq!(summary.gallery.len(), GALLERY_LIMIT);
    assert_eq!(summary.gallery[0].id, "img-14");
    assert_eq!(summary.timeline[TIMELINE_LIMIT - 1].time, "07:00 AM");
}

#[tokio::test]
async fn quiet_day_produces_empty_digest() {
    let pool = setup_pool().await;
    add_image(&pool, "last-week", yesterday_at(-72, 0), &[("Robin", 0.9)]).await;

    let summary = digest::compute_daily_digest(&pool, &now(), &ClockFormatter::utc())
        .await
        .unwrap();

    assert_eq!(summary.new_count, 0);
    assert_eq!(summary.species_count, 0);
    assert!(summary.top_species.is_none());
    assert!(summary.timeline.is_empty());
    assert!(summary.gallery.is_empty());
}

#[tokio::test]
async fn same_snapshot_same_bytes() {
    let pool = setup_pool().await;
    for i in 0..10 {
        let id = format!("img-{i}");
        add_image(&pool, &id, yesterday_at(12, 0), &[("Robin", 0.5), ("Jay", 0.5)]).await;
    }

    let first = digest::compute_daily_digest(&pool, &now(), &ClockFormatter::utc())
        .await
        .unwrap();
    let second = digest::compute_daily_digest(&pool, &now(), &ClockFormatter::utc())
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    // Equal confidences resolve to the attribution stored first.
    assert_eq!(first.top_species.as_deref(), Some("Robin"));
    assert_eq!(first.species_count, 1);
}

#[tokio::test]
async fn invalid_stored_confidence_aborts_digest() {
    let pool = setup_pool().await;
    add_image(&pool, "A", yesterday_at(9, 0), &[("Robin", 0.5)]).await;
    add_image(&pool, "B", yesterday_at(10, 0), &[("Jay", 7.0)]).await;

    let err = digest::compute_daily_digest(&pool, &now(), &ClockFormatter::utc())
        .await
        .unwrap_err();
    assert!(matches!(err, DigestError::InvalidConfidence { ref image_id, .. } if image_id == "B"));
}

#[tokio::test]
async fn closed_store_is_unavailable() {
    let pool = setup_pool().await;
    pool.close().await;

    let err = digest::compute_daily_digest(&pool, &now(), &ClockFormatter::utc())
        .await
        .unwrap_err();
    assert!(matches!(err, DigestError::StoreUnavailable(_)));
}
