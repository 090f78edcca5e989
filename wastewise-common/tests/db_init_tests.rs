//! Database initialization against real files

use tempfile::TempDir;
use wastewise_common::db::init_database;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("wastewise.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_unusable_parent_directory_is_io_error() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let result = init_database(&blocker.join("sub").join("wastewise.db")).await;

    assert!(matches!(result, Err(wastewise_common::Error::Io(_))));
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("wastewise.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO users (id, email, plan, usage_count, usage_limit, created_at, updated_at) \
         VALUES ('u1', 'keep@example.com', 'free', 0, 30, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
    )
    .execute(&pool1)
    .await
    .unwrap();
    pool1.close().await;

    // Schema creation is idempotent and leaves data alone
    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("tables.db")).await.unwrap();

    for table in ["users", "subscriptions", "articles", "waste_banks"] {
        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(exists, 1, "Missing table {}", table);
    }
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("fk.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO subscriptions (id, user_id, plan, status, start_date, created_at, updated_at) \
         VALUES ('s1', 'ghost', 'premium', 'pending', '2024-01-01T00:00:00Z', \
         '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "Subscription for unknown user should be rejected");
}
