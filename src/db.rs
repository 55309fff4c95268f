use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::error::PipelineError;
use crate::models::AttemptRow;

// Postgres caps bind parameters at 65535; 8 columns per row leaves
// plenty of headroom at this chunk size.
const UPSERT_CHUNK: usize = 1000;

/// Creates the destination table when it does not exist yet.
pub async fn init_db(pool: &PgPool) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_config (
            id INTEGER PRIMARY KEY,
            user_id TEXT,
            oauth_consumer_key TEXT,
            lis_result_sourcedid TEXT,
            lis_outcome_service_url TEXT,
            is_correct REAL,
            attempt_type TEXT,
            created_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Writes the batch into `user_config`, overwriting all non-key columns of
/// any row whose `id` already exists. The whole batch goes through one
/// transaction so a failed run leaves the table untouched.
pub async fn upsert_attempts(pool: &PgPool, rows: &[AttemptRow]) -> Result<u64, PipelineError> {
    // Table creation is on demand; `init-db` is optional on a fresh database.
    init_db(pool).await?;

    if rows.is_empty() {
        info!("no attempts to persist");
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut written = 0u64;

    for chunk in rows.chunks(UPSERT_CHUNK) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO user_config (id, user_id, oauth_consumer_key, lis_result_sourcedid, \
             lis_outcome_service_url, is_correct, attempt_type, created_at) ",
        );
        builder.push_values(chunk, |mut values, row| {
            values
                .push_bind(row.id)
                .push_bind(&row.user_id)
                .push_bind(&row.oauth_consumer_key)
                .push_bind(&row.lis_result_sourcedid)
                .push_bind(&row.lis_outcome_service_url)
                .push_bind(row.is_correct.map(|value| value as f32))
                .push_bind(&row.attempt_type)
                .push_bind(row.created_at);
        });
        builder.push(
            " ON CONFLICT (id) DO UPDATE SET \
             user_id = EXCLUDED.user_id, \
             oauth_consumer_key = EXCLUDED.oauth_consumer_key, \
             lis_result_sourcedid = EXCLUDED.lis_result_sourcedid, \
             lis_outcome_service_url = EXCLUDED.lis_outcome_service_url, \
             is_correct = EXCLUDED.is_correct, \
             attempt_type = EXCLUDED.attempt_type, \
             created_at = EXCLUDED.created_at",
        );

        let result = builder.build().execute(&mut *tx).await?;
        written += result.rows_affected();
    }

    tx.commit().await?;
    info!(rows = written, "attempts persisted to user_config");
    Ok(written)
}
