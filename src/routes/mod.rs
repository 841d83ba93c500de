pub mod audit_log;
pub mod auth;
pub mod care;
pub mod cqc;
pub mod dashboard;
pub mod documents;
pub mod health;
pub mod media;
pub mod medications;
pub mod metrics;
pub mod notifications;
pub mod records;
pub mod reports;
pub mod residents;
pub mod settings;
pub mod staff;
pub mod workflow;

use axum::{http::HeaderMap, Json};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{forbidden, ApiError},
    middleware::security::client_ip,
    models::auth::AuthenticatedUser,
    services::audit::{self, AuditEntry},
    AppState,
};

pub fn require_management(user: &AuthenticatedUser) -> Result<(), ApiError> {
    if user.is_management() {
        Ok(())
    } else {
        Err(forbidden("Management access required"))
    }
}

/// Staff or management.
pub fn require_care_team(user: &AuthenticatedUser) -> Result<(), ApiError> {
    if user.is_care_team() {
        Ok(())
    } else {
        Err(forbidden("Staff access required"))
    }
}

pub fn require_cqc(user: &AuthenticatedUser) -> Result<(), ApiError> {
    if user.role == crate::models::user::UserRole::Cqc {
        Ok(())
    } else {
        Err(forbidden("CQC access required"))
    }
}

/// Standard envelope for paginated lists.
pub fn page_body<T: Serialize>(items: &[T], total: i64, page: Option<i64>, per_page: Option<i64>) -> Value {
    json!({
        "items": items,
        "total": total,
        "page": page.unwrap_or(1).max(1),
        "per_page": per_page.unwrap_or(20).clamp(1, 100),
    })
}

pub fn ok<T: Serialize>(value: T) -> Json<Value> {
    Json(json!(value))
}

/// Fire-and-forget audit record for a write made by `user`.
pub fn audit(
    state: &AppState,
    user: &AuthenticatedUser,
    headers: &HeaderMap,
    action: &'static str,
    model_name: &'static str,
    object_id: Uuid,
) {
    audit::log(
        state.db.clone(),
        AuditEntry::new(user.user_id, action, model_name, object_id).ip(client_ip(headers)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;
    use axum::http::StatusCode;

    fn user(role: UserRole) -> AuthenticatedUser {
        AuthenticatedUser { user_id: Uuid::new_v4(), username: "u".into(), role }
    }

    #[test]
    fn role_guards_follow_the_permission_matrix() {
        let management = user(UserRole::Management);
        let staff = user(UserRole::Staff);
        let cqc = user(UserRole::Cqc);

        assert!(require_management(&management).is_ok());
        assert!(require_care_team(&management).is_ok());
        assert!(require_cqc(&management).is_err());

        assert!(require_care_team(&staff).is_ok());
        assert_eq!(require_management(&staff).unwrap_err().0, StatusCode::FORBIDDEN);

        assert!(require_cqc(&cqc).is_ok());
        assert_eq!(require_care_team(&cqc).unwrap_err().0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn page_body_reports_effective_paging() {
        let body = page_body(&[1, 2, 3], 43, None, Some(500));
        assert_eq!(body["total"], 43);
        assert_eq!(body["page"], 1);
        assert_eq!(body["per_page"], 100);
        assert_eq!(body["items"].as_array().map(Vec::len), Some(3));
    }
}
