use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{api_error, ApiError},
    models::{auth::AuthenticatedUser, notification::NotificationQuery},
    routes::{ok, page_body},
    services::notifications::NotificationService,
    AppState,
};

/// GET /notifications: the caller's own notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<NotificationQuery>,
) -> Result<Json<Value>, ApiError> {
    let (items, total, unread) = NotificationService::list(&state.db, user.user_id, &q)
        .await
        .map_err(api_error)?;
    let mut body = page_body(&items, total, q.page, q.per_page);
    body["unread_count"] = json!(unread);
    Ok(Json(body))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    NotificationService::mark_read(&state.db, user.user_id, id)
        .await
        .map(ok)
        .map_err(api_error)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let updated = NotificationService::mark_all_read(&state.db, user.user_id)
        .await
        .map_err(api_error)?;
    Ok(Json(json!({ "updated": updated })))
}
