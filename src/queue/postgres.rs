// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use super::job::to_chrono;
use super::{Job, JobOutcome, JobQueue, JobStatus, QueueOptions, QueueStats};
use crate::errors::QueueError;
use crate::observability::messages::queue::{JobAcked, JobClaimed, JobEnqueued, LeaseExpired};
use crate::observability::messages::StructuredLog;

/// Expired leases reclaimed per dequeue call.
const LEASE_SWEEP_BATCH: i64 = 100;

const JOB_COLUMNS: &str = "id, dag_path, tenant_id, schedule_id, region, status, enqueued_at, \
     available_at, attempt, max_retries, worker_id, lease_expires_at, last_error, finished_at";

/// Durable queue stored in a single Postgres table.
///
/// Claims are one `UPDATE ... WHERE id = (SELECT ... FOR UPDATE SKIP LOCKED)`
/// statement, so concurrent workers in any number of processes never receive
/// the same job. Backend failures are returned to the caller as
/// [`QueueError::Backend`]; there is no fallback to another backend.
pub struct PostgresQueue {
    pool: PgPool,
    options: QueueOptions,
}

impl PostgresQueue {
    pub async fn connect(url: &str, options: QueueOptions) -> Result<Self, QueueError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        Self::from_pool(pool, options).await
    }

    pub async fn from_pool(pool: PgPool, options: QueueOptions) -> Result<Self, QueueError> {
        let queue = Self { pool, options };
        queue.ensure_schema().await?;
        Ok(queue)
    }

    async fn ensure_schema(&self) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conductor_jobs (
                id UUID PRIMARY KEY,
                dag_path TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                schedule_id TEXT,
                region TEXT,
                status TEXT NOT NULL,
                enqueued_at TIMESTAMPTZ NOT NULL,
                available_at TIMESTAMPTZ NOT NULL,
                attempt INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 0,
                worker_id TEXT,
                lease_expires_at TIMESTAMPTZ,
                last_error TEXT,
                finished_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS conductor_jobs_claim_idx \
             ON conductor_jobs (status, available_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Move RUNNING jobs whose lease has run out back to RETRY, or to FAILED
    /// when they have no attempts left.
    async fn reclaim_expired_leases(&self) -> Result<usize, QueueError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM conductor_jobs \
             WHERE status = 'RUNNING' AND lease_expires_at <= $1 \
             ORDER BY lease_expires_at \
             LIMIT $2 \
             FOR UPDATE SKIP LOCKED"
        ))
        .bind(now)
        .bind(LEASE_SWEEP_BATCH)
        .fetch_all(&mut *tx)
        .await?;

        for row in &rows {
            let mut job = job_from_row(row)?;
            let worker = job.worker_id.clone();
            let status = job.expire_lease(now);
            write_job(&mut tx, &job).await?;
            LeaseExpired {
                job_id: &job.id.to_string(),
                worker_id: worker.as_deref(),
                next_status: status.as_str(),
            }
            .log();
        }

        tx.commit().await?;
        Ok(rows.len())
    }
}

fn job_from_row(row: &PgRow) -> Result<Job, QueueError> {
    let id: Uuid = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<JobStatus>()
        .map_err(|reason| QueueError::Corrupt { job_id: id, reason })?;
    let attempt: i32 = row.try_get("attempt")?;
    let max_retries: i32 = row.try_get("max_retries")?;

    Ok(Job {
        id,
        dag_path: row.try_get("dag_path")?,
        tenant_id: row.try_get("tenant_id")?,
        schedule_id: row.try_get("schedule_id")?,
        region: row.try_get("region")?,
        status,
        enqueued_at: row.try_get("enqueued_at")?,
        available_at: row.try_get("available_at")?,
        attempt: attempt.max(0) as u32,
        max_retries: max_retries.max(0) as u32,
        worker_id: row.try_get("worker_id")?,
        lease_expires_at: row.try_get("lease_expires_at")?,
        last_error: row.try_get("last_error")?,
        finished_at: row.try_get("finished_at")?,
    })
}

async fn write_job(conn: &mut PgConnection, job: &Job) -> Result<(), QueueError> {
    sqlx::query(
        r#"
        UPDATE conductor_jobs
        SET status = $2,
            available_at = $3,
            attempt = $4,
            worker_id = $5,
            lease_expires_at = $6,
            last_error = $7,
            finished_at = $8
        WHERE id = $1
        "#,
    )
    .bind(job.id)
    .bind(job.status.as_str())
    .bind(job.available_at)
    .bind(job.attempt as i32)
    .bind(&job.worker_id)
    .bind(job.lease_expires_at)
    .bind(&job.last_error)
    .bind(job.finished_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl JobQueue for PostgresQueue {
    async fn enqueue(&self, mut job: Job) -> Result<Uuid, QueueError> {
        job.status = JobStatus::Pending;

        let result = sqlx::query(
            r#"
            INSERT INTO conductor_jobs
                (id, dag_path, tenant_id, schedule_id, region, status, enqueued_at,
                 available_at, attempt, max_retries)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id)
        .bind(&job.dag_path)
        .bind(&job.tenant_id)
        .bind(&job.schedule_id)
        .bind(&job.region)
        .bind(job.status.as_str())
        .bind(job.enqueued_at)
        .bind(job.available_at)
        .bind(job.attempt as i32)
        .bind(job.max_retries as i32)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(QueueError::Duplicate(job.id));
            }
            Err(e) => return Err(e.into()),
        }

        JobEnqueued {
            backend: self.backend_name(),
            job_id: &job.id.to_string(),
            dag_path: &job.dag_path,
        }
        .log();
        Ok(job.id)
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<Job>, QueueError> {
        self.reclaim_expired_leases().await?;

        let now = Utc::now();
        let lease_expires_at = now + to_chrono(self.options.visibility_timeout);

        let row = sqlx::query(&format!(
            "UPDATE conductor_jobs \
             SET status = 'RUNNING', worker_id = $2, lease_expires_at = $3 \
             WHERE id = ( \
                 SELECT id FROM conductor_jobs \
                 WHERE status IN ('PENDING', 'RETRY') AND available_at <= $1 \
                 ORDER BY available_at, enqueued_at \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(now)
        .bind(worker_id)
        .bind(lease_expires_at)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let job = job_from_row(&row)?;
        JobClaimed {
            job_id: &job.id.to_string(),
            worker_id,
            attempt: job.attempt,
        }
        .log();
        Ok(Some(job))
    }

    async fn ack(
        &self,
        job_id: Uuid,
        worker_id: &str,
        outcome: JobOutcome,
    ) -> Result<JobStatus, QueueError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM conductor_jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(QueueError::NotFound(job_id))?;

        let mut job = job_from_row(&row)?;
        if job.status != JobStatus::Running {
            return Err(QueueError::NotRunning {
                job_id,
                status: job.status.to_string(),
            });
        }
        // The row stays locked until commit, so a concurrent reclaim cannot
        // hand the job to another worker between this check and the write.
        let now = Utc::now();
        if !job.holds_lease(worker_id, now) {
            return Err(QueueError::LeaseLost {
                job_id,
                worker_id: worker_id.to_string(),
            });
        }

        let status = job.complete(outcome, now, &self.options.retry);
        write_job(&mut tx, &job).await?;
        tx.commit().await?;

        JobAcked {
            job_id: &job_id.to_string(),
            status: status.as_str(),
            attempt: job.attempt,
            reason: job.last_error.as_deref(),
        }
        .log();
        Ok(status)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM conductor_jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = QueueStats::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("n")?;
            let count = count.max(0) as usize;
            match status.parse::<JobStatus>() {
                Ok(JobStatus::Pending | JobStatus::Retry) => stats.pending += count,
                Ok(JobStatus::Running) => stats.running += count,
                Ok(JobStatus::Success) => stats.success += count,
                Ok(JobStatus::Failed) => stats.failed += count,
                Err(reason) => tracing::warn!(%reason, "ignoring rows with unknown job status"),
            }
        }
        Ok(stats)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, QueueError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM conductor_jobs WHERE id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    fn options(&self) -> &QueueOptions {
        &self.options
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
