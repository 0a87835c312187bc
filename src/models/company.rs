use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The domain-side counterpart to the run-scoped `known_pattern`/
/// `catch_all` tables (§3): a durable per-domain memo of the winning
/// local-part pattern, if this crate is configured to persist it
/// across jobs (see DESIGN.md's cross-job-pattern-persistence
/// decision — disabled by default).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub domain: String,
    pub detected_email_pattern: Option<String>,
    pub email_pattern_confidence: Option<f32>,
    pub is_catch_all: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub async fn find_by_domain(pool: &sqlx::PgPool, domain: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM companies WHERE domain = $1")
            .bind(domain)
            .fetch_optional(pool)
            .await
    }

    pub async fn upsert_pattern(
        pool: &sqlx::PgPool,
        domain: &str,
        pattern: &str,
        confidence: f32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO companies (id, domain, detected_email_pattern, email_pattern_confidence, is_catch_all, created_at, updated_at)
            VALUES ($1, $2, $3, $4, FALSE, NOW(), NOW())
            ON CONFLICT (domain) DO UPDATE
            SET detected_email_pattern = EXCLUDED.detected_email_pattern,
                email_pattern_confidence = EXCLUDED.email_pattern_confidence,
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(domain)
        .bind(pattern)
        .bind(confidence)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_catch_all(pool: &sqlx::PgPool, domain: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO companies (id, domain, is_catch_all, created_at, updated_at)
            VALUES ($1, $2, TRUE, NOW(), NOW())
            ON CONFLICT (domain) DO UPDATE SET is_catch_all = TRUE, updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(domain)
        .execute(pool)
        .await?;
        Ok(())
    }
}
