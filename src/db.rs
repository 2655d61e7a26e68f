use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::insight::classify_insight_type;
use crate::models::{AlertType, Category, GeneratedAlert, InsightResult, Priority};

pub const ALERT_TTL_DAYS: i64 = 30;
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_CONVERSATION_MESSAGES: i64 = 100;
const RECENT_ALERTS: i64 = 5;
const RECENT_INSIGHTS: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct StoredAlert {
    pub id: Uuid,
    pub owner_id: String,
    pub student_id: String,
    pub alert: GeneratedAlert,
    pub metadata: serde_json::Value,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertQuery {
    pub owner_id: String,
    pub unread_only: bool,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub skip: i64,
    pub limit: i64,
}

impl AlertQuery {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            unread_only: false,
            category: None,
            priority: None,
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertStats {
    pub total_alerts: i64,
    pub unread_alerts: i64,
    pub high_priority_unread: i64,
    pub by_category: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
    pub recent: Vec<StoredAlert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredInsight {
    pub id: Uuid,
    pub student_id: String,
    pub query: String,
    pub insight_type: String,
    pub narrative: String,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    pub data_sources: Vec<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightSummary {
    pub total_insights: i64,
    pub insights_by_type: BTreeMap<String, i64>,
    pub average_confidence: f64,
    pub last_generated: Option<DateTime<Utc>>,
    pub recent_insights: Vec<StoredInsight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

const ALERT_COLUMNS: &str = "id, owner_id, student_id, alert_type, priority, category, title, \
     message, action_required, suggestions, reasoning, confidence_score, metadata, read, read_at, \
     created_at, expires_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn save_alerts(
    pool: &PgPool,
    owner_id: &str,
    student_id: &str,
    alerts: &[GeneratedAlert],
    metadata: &serde_json::Value,
) -> anyhow::Result<Vec<Uuid>> {
    let now = Utc::now();
    let expires_at = now + Duration::days(ALERT_TTL_DAYS);
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(alerts.len());

    for alert in alerts {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO student_alerts.alerts
            (id, owner_id, student_id, alert_type, priority, priority_rank, category, title,
             message, action_required, suggestions, reasoning, confidence_score, metadata,
             created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15, $16)
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(student_id)
        .bind(alert.alert_type.as_str())
        .bind(alert.priority.as_str())
        .bind(alert.priority.rank())
        .bind(alert.category.as_str())
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.action_required)
        .bind(Json(&alert.suggestions))
        .bind(&alert.reasoning)
        .bind(alert.confidence_score)
        .bind(Json(metadata))
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to store alert {:?}", alert.title))?;
        ids.push(id);
    }

    tx.commit().await?;
    Ok(ids)
}

/// Builds the WHERE clause for `list_alerts`; parameters are numbered in
/// bind order starting at $1 (owner).
pub fn alert_filter_sql(query: &AlertQuery) -> (String, usize) {
    let mut sql = String::from(" WHERE owner_id = $1");
    let mut next = 2;

    if query.unread_only {
        sql.push_str(" AND read = FALSE");
    }
    if query.category.is_some() {
        sql.push_str(&format!(" AND category = ${next}"));
        next += 1;
    }
    if query.priority.is_some() {
        sql.push_str(&format!(" AND priority = ${next}"));
        next += 1;
    }

    (sql, next)
}

pub fn list_alerts_sql(query: &AlertQuery) -> String {
    let (filter, next) = alert_filter_sql(query);
    format!(
        "SELECT {ALERT_COLUMNS} FROM student_alerts.alerts{filter} \
         ORDER BY priority_rank DESC, created_at DESC OFFSET ${} LIMIT ${}",
        next,
        next + 1
    )
}

pub async fn list_alerts(pool: &PgPool, query: &AlertQuery) -> anyhow::Result<Vec<StoredAlert>> {
    let sql = list_alerts_sql(query);
    let mut rows = sqlx::query(&sql).bind(&query.owner_id);

    if let Some(category) = query.category {
        rows = rows.bind(category.as_str());
    }
    if let Some(priority) = query.priority {
        rows = rows.bind(priority.as_str());
    }

    let records = rows
        .bind(query.skip.max(0))
        .bind(query.limit.clamp(1, 500))
        .fetch_all(pool)
        .await?;

    records.iter().map(alert_from_row).collect()
}

fn alert_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<StoredAlert> {
    let alert_type: String = row.get("alert_type");
    let priority: String = row.get("priority");
    let category: String = row.get("category");
    let suggestions: Json<Vec<String>> = row.get("suggestions");
    let metadata: Json<serde_json::Value> = row.get("metadata");

    Ok(StoredAlert {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        student_id: row.get("student_id"),
        alert: GeneratedAlert {
            alert_type: alert_type.parse::<AlertType>().map_err(anyhow::Error::msg)?,
            priority: priority.parse::<Priority>().map_err(anyhow::Error::msg)?,
            category: category.parse::<Category>().map_err(anyhow::Error::msg)?,
            title: row.get("title"),
            message: row.get("message"),
            action_required: row.get("action_required"),
            suggestions: suggestions.0,
            reasoning: row.get("reasoning"),
            confidence_score: row.get("confidence_score"),
        },
        metadata: metadata.0,
        read: row.get("read"),
        read_at: row.get("read_at"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    })
}

pub async fn get_alert(
    pool: &PgPool,
    alert_id: Uuid,
    owner_id: &str,
) -> anyhow::Result<Option<StoredAlert>> {
    let sql = format!(
        "SELECT {ALERT_COLUMNS} FROM student_alerts.alerts WHERE id = $1 AND owner_id = $2"
    );
    let row = sqlx::query(&sql)
        .bind(alert_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(alert_from_row).transpose()
}

pub async fn mark_read(pool: &PgPool, alert_id: Uuid, owner_id: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE student_alerts.alerts
        SET read = TRUE, read_at = now(), updated_at = now()
        WHERE id = $1 AND owner_id = $2 AND read = FALSE
        "#,
    )
    .bind(alert_id)
    .bind(owner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(pool: &PgPool, owner_id: &str) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE student_alerts.alerts
        SET read = TRUE, read_at = now(), updated_at = now()
        WHERE owner_id = $1 AND read = FALSE
        "#,
    )
    .bind(owner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_alert(pool: &PgPool, alert_id: Uuid, owner_id: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM student_alerts.alerts WHERE id = $1 AND owner_id = $2")
        .bind(alert_id)
        .bind(owner_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn cleanup_expired(pool: &PgPool) -> anyhow::Result<u64> {
    let result = sqlx::query("DELETE FROM student_alerts.alerts WHERE expires_at < now()")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

async fn grouped_counts(
    pool: &PgPool,
    owner_id: &str,
    column: &str,
) -> anyhow::Result<BTreeMap<String, i64>> {
    let sql = format!(
        "SELECT {column} AS key, COUNT(*) AS count FROM student_alerts.alerts \
         WHERE owner_id = $1 GROUP BY {column}"
    );
    let rows = sqlx::query(&sql).bind(owner_id).fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(|row| (row.get::<String, _>("key"), row.get::<i64, _>("count")))
        .collect())
}

pub async fn alert_stats(pool: &PgPool, owner_id: &str) -> anyhow::Result<AlertStats> {
    let counts = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE read = FALSE) AS unread,
            COUNT(*) FILTER (WHERE read = FALSE AND priority = 'high') AS high_unread
        FROM student_alerts.alerts
        WHERE owner_id = $1
        "#,
    )
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    let recent = list_alerts(
        pool,
        &AlertQuery {
            limit: RECENT_ALERTS,
            ..AlertQuery::for_owner(owner_id)
        },
    )
    .await?;

    Ok(AlertStats {
        total_alerts: counts.get("total"),
        unread_alerts: counts.get("unread"),
        high_priority_unread: counts.get("high_unread"),
        by_category: grouped_counts(pool, owner_id, "category").await?,
        by_type: grouped_counts(pool, owner_id, "alert_type").await?,
        recent,
    })
}

/// Deletes everything but the newest `MAX_CONVERSATION_MESSAGES` rows for
/// one owner/student pair ($1, $2).
pub fn trim_conversation_sql() -> String {
    format!(
        "DELETE FROM student_alerts.conversation_messages \
         WHERE owner_id = $1 AND student_id = $2 AND id NOT IN (\
         SELECT id FROM student_alerts.conversation_messages \
         WHERE owner_id = $1 AND student_id = $2 \
         ORDER BY created_at DESC LIMIT {MAX_CONVERSATION_MESSAGES})"
    )
}

/// Stores an insight and appends the exchange to the conversation log,
/// keeping only the newest `MAX_CONVERSATION_MESSAGES` messages.
pub async fn save_insight(
    pool: &PgPool,
    owner_id: &str,
    query: &str,
    insight: &InsightResult,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let data_sources: Vec<&str> = insight
        .data_sources_used
        .iter()
        .map(|source| source.as_str())
        .collect();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO student_alerts.insights
        (id, owner_id, student_id, query, insight_type, narrative, recommendations, confidence,
         data_sources, source, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(&insight.student_id)
    .bind(query)
    .bind(classify_insight_type(query).as_str())
    .bind(&insight.narrative_text)
    .bind(Json(&insight.recommendations))
    .bind(insight.confidence)
    .bind(Json(&data_sources))
    .bind(insight.source.as_str())
    .bind(insight.generated_at)
    .execute(&mut *tx)
    .await?;

    for (role, content) in [("user", query), ("assistant", insight.narrative_text.as_str())] {
        sqlx::query(
            r#"
            INSERT INTO student_alerts.conversation_messages
            (id, owner_id, student_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5, clock_timestamp())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&insight.student_id)
        .bind(role)
        .bind(content)
        .execute(&mut *tx)
        .await?;
    }

    let trimmed = sqlx::query(&trim_conversation_sql())
        .bind(owner_id)
        .bind(&insight.student_id)
        .execute(&mut *tx)
        .await?;
    if trimmed.rows_affected() > 0 {
        debug!(
            student_id = %insight.student_id,
            removed = trimmed.rows_affected(),
            "trimmed conversation history"
        );
    }

    tx.commit().await?;
    Ok(id)
}

pub async fn list_insights(
    pool: &PgPool,
    owner_id: &str,
    student_id: &str,
    skip: i64,
    limit: i64,
) -> anyhow::Result<Vec<StoredInsight>> {
    let rows = sqlx::query(
        r#"
        SELECT id, student_id, query, insight_type, narrative, recommendations, confidence,
               data_sources, source, created_at
        FROM student_alerts.insights
        WHERE owner_id = $1 AND student_id = $2
        ORDER BY created_at DESC
        OFFSET $3 LIMIT $4
        "#,
    )
    .bind(owner_id)
    .bind(student_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 500))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| StoredInsight {
            id: row.get("id"),
            student_id: row.get("student_id"),
            query: row.get("query"),
            insight_type: row.get("insight_type"),
            narrative: row.get("narrative"),
            recommendations: row.get::<Json<Vec<String>>, _>("recommendations").0,
            confidence: row.get("confidence"),
            data_sources: row.get::<Json<Vec<String>>, _>("data_sources").0,
            source: row.get("source"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub async fn insight_summary(
    pool: &PgPool,
    owner_id: &str,
    student_id: &str,
) -> anyhow::Result<InsightSummary> {
    let totals = sqlx::query(
        r#"
        SELECT COUNT(*) AS total, COALESCE(AVG(confidence), 0.0) AS average_confidence
        FROM student_alerts.insights
        WHERE owner_id = $1 AND student_id = $2
        "#,
    )
    .bind(owner_id)
    .bind(student_id)
    .fetch_one(pool)
    .await?;

    let by_type = sqlx::query(
        r#"
        SELECT insight_type, COUNT(*) AS count
        FROM student_alerts.insights
        WHERE owner_id = $1 AND student_id = $2
        GROUP BY insight_type
        "#,
    )
    .bind(owner_id)
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    let recent_insights = list_insights(pool, owner_id, student_id, 0, RECENT_INSIGHTS).await?;

    Ok(InsightSummary {
        total_insights: totals.get("total"),
        insights_by_type: by_type
            .iter()
            .map(|row| (row.get::<String, _>("insight_type"), row.get::<i64, _>("count")))
            .collect(),
        average_confidence: totals.get("average_confidence"),
        last_generated: recent_insights.first().map(|insight| insight.created_at),
        recent_insights,
    })
}

pub async fn clear_conversation(
    pool: &PgPool,
    owner_id: &str,
    student_id: &str,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        "DELETE FROM student_alerts.conversation_messages WHERE owner_id = $1 AND student_id = $2",
    )
    .bind(owner_id)
    .bind(student_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// The most recent `limit` messages, oldest first.
pub async fn conversation_history(
    pool: &PgPool,
    owner_id: &str,
    student_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<ConversationMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT role, content, created_at FROM (
            SELECT role, content, created_at
            FROM student_alerts.conversation_messages
            WHERE owner_id = $1 AND student_id = $2
            ORDER BY created_at DESC
            LIMIT $3
        ) recent
        ORDER BY created_at ASC
        "#,
    )
    .bind(owner_id)
    .bind(student_id)
    .bind(limit.clamp(1, 500))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ConversationMessage {
            role: row.get("role"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        })
        .collect())
}
