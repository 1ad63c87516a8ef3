use sqlx::SqlitePool;

use crate::db::models::{MuteKind, MuteStatus, MuteTarget, MuteTargetRow, Timestamp};

/// List every record of a kind, ordered by key
pub async fn list_all(pool: &SqlitePool, kind: MuteKind) -> Result<Vec<MuteTargetRow>, sqlx::Error> {
    sqlx::query_as::<_, MuteTargetRow>(&format!(
        "SELECT key, status, created_at, updated_at, unmuted_at, generation FROM {} ORDER BY key",
        kind.table()
    ))
    .fetch_all(pool)
    .await
}

pub async fn get(
    pool: &SqlitePool,
    kind: MuteKind,
    key: &str,
) -> Result<Option<MuteTargetRow>, sqlx::Error> {
    sqlx::query_as::<_, MuteTargetRow>(&format!(
        "SELECT key, status, created_at, updated_at, unmuted_at, generation FROM {} WHERE key = ?",
        kind.table()
    ))
    .bind(key)
    .fetch_optional(pool)
    .await
}

/// Insert or overwrite everything but the key, bumping the generation
pub async fn upsert(pool: &SqlitePool, record: &MuteTarget) -> Result<MuteTargetRow, sqlx::Error> {
    let table = record.kind.table();
    sqlx::query_as::<_, MuteTargetRow>(&format!(
        r#"
        INSERT INTO {table} (key, status, created_at, updated_at, unmuted_at, generation)
        VALUES (?, ?, ?, ?, ?, 1)
        ON CONFLICT (key)
        DO UPDATE SET
            status = excluded.status,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at,
            unmuted_at = excluded.unmuted_at,
            generation = {table}.generation + 1
        RETURNING key, status, created_at, updated_at, unmuted_at, generation
        "#
    ))
    .bind(&record.key)
    .bind(record.status.as_str())
    .bind(record.created_at.to_string())
    .bind(record.updated_at.to_string())
    .bind(Timestamp::format_optional(record.unmuted_at))
    .fetch_one(pool)
    .await
}

/// Transition an existing row; `None` when the key is absent
pub async fn set_status(
    pool: &SqlitePool,
    kind: MuteKind,
    key: &str,
    status: MuteStatus,
    unmuted_at: Option<Timestamp>,
) -> Result<Option<MuteTargetRow>, sqlx::Error> {
    let table = kind.table();
    sqlx::query_as::<_, MuteTargetRow>(&format!(
        r#"
        UPDATE {table}
        SET status = ?, updated_at = ?, unmuted_at = ?, generation = generation + 1
        WHERE key = ?
        RETURNING key, status, created_at, updated_at, unmuted_at, generation
        "#
    ))
    .bind(status.as_str())
    .bind(Timestamp::now().to_string())
    .bind(Timestamp::format_optional(unmuted_at))
    .bind(key)
    .fetch_optional(pool)
    .await
}

/// Unmute a row that is still muted at `generation`; `None` when it has moved on
pub async fn unmute_if_generation(
    pool: &SqlitePool,
    kind: MuteKind,
    key: &str,
    generation: i64,
) -> Result<Option<MuteTargetRow>, sqlx::Error> {
    let table = kind.table();
    sqlx::query_as::<_, MuteTargetRow>(&format!(
        r#"
        UPDATE {table}
        SET status = ?, updated_at = ?, unmuted_at = '', generation = generation + 1
        WHERE key = ? AND generation = ? AND status = ?
        RETURNING key, status, created_at, updated_at, unmuted_at, generation
        "#
    ))
    .bind(MuteStatus::Unmuted.as_str())
    .bind(Timestamp::now().to_string())
    .bind(key)
    .bind(generation)
    .bind(MuteStatus::Muted.as_str())
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &SqlitePool, kind: MuteKind, key: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE key = ?", kind.table()))
        .bind(key)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count(pool: &SqlitePool, kind: MuteKind) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", kind.table()))
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}
