//! Approval statistics, per-group counters and the member directory.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::recipients::{Recipient, RecipientSource};
use crate::stats::{ApprovalRecord, StatsSink};

/// Aggregate numbers for the operator `stats` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    pub approved_today: i64,
    pub approved_last_7_days: i64,
    pub members_active_today: i64,
    pub total_errors: i64,
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

impl super::Db {
    pub async fn stats_summary(&self) -> Result<StatsSummary> {
        let today = start_of_day(Utc::now());
        let week_ago = today - Duration::days(7);

        let (approved_today, approved_last_7_days, total_errors): (i64, i64, i64) = sqlx::query_as(
            "SELECT
                COUNT(*) FILTER (WHERE approved AND recorded_at >= $1),
                COUNT(*) FILTER (WHERE approved AND recorded_at >= $2),
                COUNT(*) FILTER (WHERE error IS NOT NULL)
             FROM approval_stats",
        )
        .bind(today)
        .bind(week_ago)
        .fetch_one(&self.pool)
        .await?;

        let (members_active_today,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM members WHERE last_activity >= $1")
                .bind(today)
                .fetch_one(&self.pool)
                .await?;

        Ok(StatsSummary {
            approved_today,
            approved_last_7_days,
            members_active_today,
            total_errors,
        })
    }
}

#[async_trait]
impl StatsSink for super::Db {
    async fn record(&self, record: ApprovalRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO approval_stats (group_id, subject_id, approved, error, recorded_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.group_id)
        .bind(record.subject_id)
        .bind(record.approved)
        .bind(&record.error)
        .bind(record.recorded_at)
        .execute(&mut *tx)
        .await?;

        if record.approved {
            sqlx::query(
                "INSERT INTO groups (group_id, total_approved) VALUES ($1, 1)
                 ON CONFLICT (group_id) DO UPDATE SET total_approved = groups.total_approved + 1",
            )
            .bind(record.group_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO members (subject_id, name, last_activity) VALUES ($1, $2, $3)
                 ON CONFLICT (subject_id)
                 DO UPDATE SET name = EXCLUDED.name, last_activity = EXCLUDED.last_activity",
            )
            .bind(record.subject_id)
            .bind(&record.subject_name)
            .bind(record.recorded_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RecipientSource for super::Db {
    async fn list_recipients(&self) -> Result<Vec<Recipient>> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT subject_id, name FROM members ORDER BY subject_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| Recipient {
                id,
                name: Some(name),
            })
            .collect())
    }
}
