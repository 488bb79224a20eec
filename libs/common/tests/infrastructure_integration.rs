//! Integration tests for the infrastructure components
//!
//! These tests verify that the PostgreSQL database is configured and
//! reachable. They need a live database (see `DATABASE_URL`) and are
//! ignored by default: run them with `cargo test -- --ignored`.

use common::database::{DatabaseConfig, health_check, init_pool};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_database_is_reachable() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    Ok(())
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_unique_violation_maps_to_conflict() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    // temporary tables live on a single connection
    let mut conn = pool.acquire().await?;

    sqlx::query("CREATE TEMPORARY TABLE uniq_check (k TEXT PRIMARY KEY)")
        .execute(&mut *conn)
        .await?;
    sqlx::query("INSERT INTO uniq_check VALUES ('a')")
        .execute(&mut *conn)
        .await?;

    let err = sqlx::query("INSERT INTO uniq_check VALUES ('a')")
        .execute(&mut *conn)
        .await
        .map_err(common::DatabaseError::from_query)
        .unwrap_err();
    assert!(err.is_conflict());

    Ok(())
}
