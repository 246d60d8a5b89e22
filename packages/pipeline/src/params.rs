//! Key/value settings persisted between runs.

use chrono::{DateTime, Utc};

use crate::error::{PipelineError, Result};

/// Time of the last successful retrieval, RFC 3339.
pub const PARAM_RETRIEVAL_TIME: &str = "param_retrieval_time";

pub async fn get_param<'e, E>(executor: E, key: &str) -> Result<Option<String>>
where
    E: sqlx::PgExecutor<'e>,
{
    let value = sqlx::query_scalar::<_, String>(r#"SELECT value FROM params WHERE key = $1"#)
        .bind(key)
        .fetch_optional(executor)
        .await?;

    Ok(value)
}

pub async fn set_param<'e, E>(executor: E, key: &str, value: &str) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO params (key, value)
        VALUES ($1, $2)
        ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(executor)
    .await?;

    Ok(())
}

/// Read the retrieval checkpoint.
pub async fn get_retrieval_time<'e, E>(executor: E) -> Result<Option<DateTime<Utc>>>
where
    E: sqlx::PgExecutor<'e>,
{
    get_param(executor, PARAM_RETRIEVAL_TIME)
        .await?
        .map(|raw| parse_timestamp(&raw))
        .transpose()
}

/// Overwrite the retrieval checkpoint.
pub async fn set_retrieval_time<'e, E>(executor: E, at: DateTime<Utc>) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    set_param(executor, PARAM_RETRIEVAL_TIME, &at.to_rfc3339()).await?;
    tracing::debug!(at = %at.to_rfc3339(), "retrieval time updated");
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            PipelineError::InvalidInput(format!("{PARAM_RETRIEVAL_TIME} holds '{raw}': {e}"))
        })
}
