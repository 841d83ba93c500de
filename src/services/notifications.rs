use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{
    error::DomainError,
    models::{
        notification::{NewNotification, Notification, NotificationQuery},
        paginate,
    },
};

pub struct NotificationService;

impl NotificationService {
    /// Insert a notification for one user. Takes any executor so it can
    /// join the caller's transaction.
    pub async fn create<'e>(db: impl PgExecutor<'e>, n: &NewNotification) -> anyhow::Result<Notification> {
        let row = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications
                (recipient_id, title, message, priority, action_url, related_model, related_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(n.recipient_id)
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.priority)
        .bind(&n.action_url)
        .bind(n.related_model)
        .bind(&n.related_id)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        q: &NotificationQuery,
    ) -> anyhow::Result<(Vec<Notification>, i64, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let unread_only = q.unread.unwrap_or(false);

        let rows = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications
             WHERE recipient_id = $1 AND (NOT $2 OR is_read = FALSE)
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let (total, unread): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE NOT $2 OR is_read = FALSE),
                    COUNT(*) FILTER (WHERE is_read = FALSE)
             FROM notifications WHERE recipient_id = $1",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(pool)
        .await?;
        Ok((rows, total, unread))
    }

    /// Only the recipient may mark a notification read.
    pub async fn mark_read(pool: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Notification> {
        let row = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
             WHERE id = $1 AND recipient_id = $2
             RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Notification"))?;
        Ok(row)
    }

    pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW()
             WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
