use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{FinancialReport, ReportMetric, StoredReport};

pub async fn init_db(pool: &PgPool) -> Result<(), PipelineError> {
    sqlx::query("CREATE SCHEMA IF NOT EXISTS finwell")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS finwell.reports (
            id UUID PRIMARY KEY,
            user_id TEXT NOT NULL,
            primary_issue TEXT NOT NULL,
            recommendation TEXT NOT NULL,
            accuracy DOUBLE PRECISION NOT NULL,
            all_metrics JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS reports_user_created_idx \
         ON finwell.reports (user_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_report(
    pool: &PgPool,
    user_id: &str,
    report: &FinancialReport,
) -> Result<StoredReport, PipelineError> {
    let id = Uuid::new_v4();
    let created_at = Utc::now();
    let metrics = serde_json::to_value(&report.all_metrics).unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO finwell.reports
        (id, user_id, primary_issue, recommendation, accuracy, all_metrics, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&report.primary_issue)
    .bind(&report.recommendation)
    .bind(report.accuracy)
    .bind(&metrics)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(StoredReport {
        id,
        user_id: user_id.to_string(),
        primary_issue: report.primary_issue.clone(),
        recommendation: report.recommendation.clone(),
        accuracy: report.accuracy,
        all_metrics: report.all_metrics.clone(),
        created_at,
    })
}

pub async fn list_reports(pool: &PgPool, user_id: &str) -> Result<Vec<StoredReport>, PipelineError> {
    let rows = sqlx::query(
        "SELECT id, user_id, primary_issue, recommendation, accuracy, all_metrics, created_at \
         FROM finwell.reports WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(stored_report_from_row).collect())
}

pub async fn get_report(
    pool: &PgPool,
    id: Uuid,
    user_id: &str,
) -> Result<Option<StoredReport>, PipelineError> {
    let row = sqlx::query(
        "SELECT id, user_id, primary_issue, recommendation, accuracy, all_metrics, created_at \
         FROM finwell.reports WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(stored_report_from_row))
}

pub async fn delete_report(pool: &PgPool, id: Uuid, user_id: &str) -> Result<bool, PipelineError> {
    let result = sqlx::query("DELETE FROM finwell.reports WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn stored_report_from_row(row: &sqlx::postgres::PgRow) -> StoredReport {
    let metrics: serde_json::Value = row.get("all_metrics");
    let all_metrics: Vec<ReportMetric> = serde_json::from_value(metrics).unwrap_or_default();
    let created_at: DateTime<Utc> = row.get("created_at");

    StoredReport {
        id: row.get("id"),
        user_id: row.get("user_id"),
        primary_issue: row.get("primary_issue"),
        recommendation: row.get("recommendation"),
        accuracy: row.get("accuracy"),
        all_metrics,
        created_at,
    }
}
