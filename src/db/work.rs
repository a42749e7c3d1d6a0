//! Work item persistence: the Postgres [`WorkStore`].
//!
//! Every state change is a single `UPDATE ... WHERE id = $1 AND status =
//! 'pending'`. When no row matches, the current status decides whether the
//! call was a harmless repeat or a rejected mutation of a terminal item.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::work::{JoinRequest, Status, WorkId, WorkItem, validate_transition};
use crate::store::WorkStore;

const COLUMNS: &str = "id, group_id, subject_id, subject_name, group_title, enqueued_at, \
                       status, retry_count, last_error, processed_at";

impl super::Db {
    /// Resolve an update that matched no pending row.
    async fn settle_unmatched(&self, id: WorkId, to: Status) -> Result<()> {
        let current: Option<(String,)> =
            sqlx::query_as("SELECT status FROM work_items WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        let from: Status = current
            .ok_or_else(|| Error::NotFound(format!("work item {id}")))?
            .0
            .parse()?;
        if from.is_terminal() && from == to {
            return Ok(());
        }
        validate_transition(from, to)?;
        // Pending now, but was not a moment ago: lost a race with another writer.
        Err(Error::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// List work items, newest first, optionally filtered by status.
    pub async fn list_work_items(
        &self,
        status: Option<Status>,
        limit: i64,
    ) -> Result<Vec<WorkItem>> {
        let rows: Vec<WorkItemRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM work_items
             WHERE ($1::text IS NULL OR status = $1)
             ORDER BY enqueued_at DESC
             LIMIT $2"
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WorkItemRow::try_into_work_item).collect()
    }

    /// Number of items in each status.
    pub async fn queue_counts(&self) -> Result<Vec<(Status, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM work_items GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(status, count)| Ok((status.parse()?, count)))
            .collect()
    }
}

#[async_trait]
impl WorkStore for super::Db {
    async fn enqueue(&self, request: JoinRequest) -> Result<WorkId> {
        let id = WorkId::new();
        sqlx::query(
            "INSERT INTO work_items
                (id, group_id, subject_id, subject_name, group_title,
                 enqueued_at, status, retry_count)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', 0)",
        )
        .bind(id.0)
        .bind(request.group_id)
        .bind(request.subject_id)
        .bind(&request.subject_name)
        .bind(&request.group_title)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn fetch_batch(&self, limit: usize) -> Result<Vec<WorkItem>> {
        let rows: Vec<WorkItemRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM work_items
             WHERE status = 'pending'
             ORDER BY enqueued_at ASC, id
             LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WorkItemRow::try_into_work_item).collect()
    }

    async fn mark_processed(&self, id: WorkId) -> Result<()> {
        let rows_affected = sqlx::query(
            "UPDATE work_items SET status = 'processed', processed_at = $1
             WHERE id = $2 AND status = 'pending'",
        )
        .bind(Utc::now())
        .bind(id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return self.settle_unmatched(id, Status::Processed).await;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: WorkId, error: &str) -> Result<()> {
        let rows_affected = sqlx::query(
            "UPDATE work_items
             SET status = 'failed', retry_count = retry_count + 1,
                 last_error = $1, processed_at = $2
             WHERE id = $3 AND status = 'pending'",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return self.settle_unmatched(id, Status::Failed).await;
        }
        Ok(())
    }

    async fn increment_retry(&self, id: WorkId) -> Result<()> {
        let rows_affected = sqlx::query(
            "UPDATE work_items SET retry_count = retry_count + 1
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return self.settle_unmatched(id, Status::Pending).await;
        }
        Ok(())
    }

    async fn get(&self, id: WorkId) -> Result<WorkItem> {
        let row: Option<WorkItemRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM work_items WHERE id = $1"))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.ok_or_else(|| Error::NotFound(format!("work item {id}")))?
            .try_into_work_item()
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct WorkItemRow {
    id: Uuid,
    group_id: i64,
    subject_id: i64,
    subject_name: String,
    group_title: String,
    enqueued_at: DateTime<Utc>,
    status: String,
    retry_count: i32,
    last_error: Option<String>,
    processed_at: Option<DateTime<Utc>>,
}

impl WorkItemRow {
    fn try_into_work_item(self) -> Result<WorkItem> {
        Ok(WorkItem {
            id: WorkId(self.id),
            request: JoinRequest {
                group_id: self.group_id,
                subject_id: self.subject_id,
                subject_name: self.subject_name,
                group_title: self.group_title,
            },
            enqueued_at: self.enqueued_at,
            status: self.status.parse()?,
            retry_count: self.retry_count as u32,
            last_error: self.last_error,
            processed_at: self.processed_at,
        })
    }
}
