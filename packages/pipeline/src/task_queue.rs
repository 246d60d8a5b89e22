use uuid::Uuid;

use pfr_harvester::Record;

use crate::error::{PipelineError, Result};
use crate::models::{Task, TaskKind};

pub struct CreateTaskRequest {
    pub kind: TaskKind,
    pub payload: serde_json::Value,
}

impl CreateTaskRequest {
    pub fn new(kind: TaskKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }

    /// Task asking downstream to create or refresh the article of `record`.
    pub fn update_article(record: &Record) -> Result<Self> {
        Ok(Self::new(TaskKind::UpdateArticle, serde_json::to_value(record)?))
    }
}

/// Append a task to the queue.
#[tracing::instrument(skip(executor, req), fields(kind = ?req.kind))]
pub async fn create_task<'e, E>(executor: E, req: CreateTaskRequest) -> Result<Task>
where
    E: sqlx::PgExecutor<'e>,
{
    let task = sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (kind, payload)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(req.kind)
    .bind(&req.payload)
    .fetch_one(executor)
    .await?;

    tracing::debug!(task_id = %task.id, "task created");
    Ok(task)
}

/// Queue an `update_article` task carrying the serialized record.
pub async fn push_task_update_article<'e, E>(executor: E, record: &Record) -> Result<Task>
where
    E: sqlx::PgExecutor<'e>,
{
    create_task(executor, CreateTaskRequest::update_article(record)?).await
}

/// Remove and return the oldest task of `kind` using FOR UPDATE SKIP LOCKED.
/// Returns None if the queue is empty.
#[tracing::instrument(skip(executor))]
pub async fn pop_task<'e, E>(executor: E, kind: TaskKind) -> Result<Option<Task>>
where
    E: sqlx::PgExecutor<'e>,
{
    let task = sqlx::query_as::<_, Task>(
        r#"
        DELETE FROM tasks
        WHERE id = (
            SELECT id FROM tasks
            WHERE kind = $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING *
        "#,
    )
    .bind(kind)
    .fetch_optional(executor)
    .await?;

    if let Some(ref t) = task {
        tracing::info!(task_id = %t.id, "task popped");
    }
    Ok(task)
}

/// Pop the oldest `update_article` task and decode its record.
pub async fn pop_task_update_article<'e, E>(executor: E) -> Result<Option<Record>>
where
    E: sqlx::PgExecutor<'e>,
{
    match pop_task(executor, TaskKind::UpdateArticle).await? {
        Some(task) => Ok(Some(serde_json::from_value(task.payload)?)),
        None => Ok(None),
    }
}

/// Get a task by ID.
pub async fn get_task<'e, E>(executor: E, task_id: Uuid) -> Result<Task>
where
    E: sqlx::PgExecutor<'e>,
{
    let task = sqlx::query_as::<_, Task>(r#"SELECT * FROM tasks WHERE id = $1"#)
        .bind(task_id)
        .fetch_optional(executor)
        .await?
        .ok_or(PipelineError::TaskNotFound(task_id))?;

    Ok(task)
}

/// List queued tasks in pop order with optional kind filter.
pub async fn list_tasks<'e, E>(executor: E, kind: Option<TaskKind>) -> Result<Vec<Task>>
where
    E: sqlx::PgExecutor<'e>,
{
    let tasks = sqlx::query_as::<_, Task>(
        r#"
        SELECT * FROM tasks
        WHERE $1::task_kind IS NULL OR kind = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(kind)
    .fetch_all(executor)
    .await?;

    Ok(tasks)
}
