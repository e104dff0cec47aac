//! Integration tests for the pending-record queue against real database
//! files and backdated rows.

use chrono::Utc;
use dakoku_storage::{
    Database, DatabaseConfig, PendingRecordRepository, SqlitePendingRecordRepository,
};
use std::time::Duration;

/// Backdate a row's queue time so age-gated behavior is testable without
/// sleeping.
async fn backdate(db: &Database, record_id: i64, seconds: i64) {
    let past = Utc::now() - chrono::Duration::seconds(seconds);
    sqlx::query("UPDATE pending_records SET created_at = ? WHERE id = ?")
        .bind(past)
        .bind(record_id)
        .execute(db.pool())
        .await
        .unwrap();
}

#[tokio::test]
async fn min_age_gate_holds_young_records_and_releases_old_ones() {
    let db = Database::in_memory().await.unwrap();
    let repo = SqlitePendingRecordRepository::new(db.pool().clone());

    let young = repo.insert("04A1B2C3", Utc::now(), "T1").await.unwrap();
    let old = repo.insert("05D4E5F6", Utc::now(), "T1").await.unwrap();
    backdate(&db, old, 650).await;

    let min_age = Duration::from_secs(600);

    let records = repo.list_pending(min_age, 50).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, old);

    // Once the young record ages past the gate it becomes visible too
    backdate(&db, young, 601).await;
    let records = repo.list_pending(min_age, 50).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn aged_records_come_back_oldest_first() {
    let db = Database::in_memory().await.unwrap();
    let repo = SqlitePendingRecordRepository::new(db.pool().clone());

    let newer = repo.insert("04A1B2C3", Utc::now(), "T1").await.unwrap();
    let oldest = repo.insert("05D4E5F6", Utc::now(), "T1").await.unwrap();
    let middle = repo.insert("06A7B8C9", Utc::now(), "T1").await.unwrap();

    backdate(&db, oldest, 3000).await;
    backdate(&db, middle, 2000).await;
    backdate(&db, newer, 1000).await;

    let records = repo
        .list_pending(Duration::from_secs(600), 50)
        .await
        .unwrap();
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![oldest, middle, newer]);
}

#[tokio::test]
async fn sent_records_never_resurface() {
    let db = Database::in_memory().await.unwrap();
    let repo = SqlitePendingRecordRepository::new(db.pool().clone());

    let id = repo.insert("04A1B2C3", Utc::now(), "T1").await.unwrap();
    backdate(&db, id, 3000).await;

    repo.mark_sent(id).await.unwrap();

    for _ in 0..3 {
        assert!(
            repo.list_pending(Duration::ZERO, 50)
                .await
                .unwrap()
                .is_empty()
        );
    }

    // Later retries on other rows leave the sent row untouched
    repo.increment_retry(id).await.unwrap();
    let record = repo.find_by_id(id).await.unwrap().unwrap();
    assert!(record.sent_to_server);
    assert!(
        repo.list_pending(Duration::ZERO, 50)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn queue_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir
        .path()
        .join("queue.db")
        .to_string_lossy()
        .into_owned();

    {
        let db = Database::new(DatabaseConfig::new(&path)).await.unwrap();
        let repo = SqlitePendingRecordRepository::new(db.pool().clone());
        repo.insert("04A1B2C3", Utc::now(), "T1").await.unwrap();
        db.close().await;
    }

    let db = Database::new(DatabaseConfig::new(&path)).await.unwrap();
    let repo = SqlitePendingRecordRepository::new(db.pool().clone());

    let records = repo.list_pending(Duration::ZERO, 50).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].idm, "04A1B2C3");
    assert_eq!(records[0].retry_count, 0);
    db.close().await;
}

#[tokio::test]
async fn missing_database_directory_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir
        .path()
        .join("nested")
        .join("queue.db")
        .to_string_lossy()
        .into_owned();

    let db = Database::new(DatabaseConfig::new(&path)).await.unwrap();
    db.health_check().await.unwrap();
    db.close().await;
}
