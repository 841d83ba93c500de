use std::net::IpAddr;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{api_error, bad_request, not_found, ApiError},
    middleware::security::{client_ip, user_agent},
    models::{
        audit::{range_hours, AuditLogQuery, BlockIpRequest, CqcShareRequest, SecurityDashboardQuery, SecurityStatus},
        auth::AuthenticatedUser,
    },
    routes::{ok, page_body, require_management},
    services::{
        audit::AuditService,
        security::{SecurityLogEntry, SecurityService},
    },
    AppState,
};

// ─── Audit log ───────────────────────────────────────────────────────────────

/// GET /audit-log (management)
pub async fn list_audit_log(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<AuditLogQuery>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let (items, total) = AuditService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

/// PATCH /audit-log/{id}/cqc: share or unshare an entry with inspectors.
pub async fn set_cqc_visibility(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CqcShareRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let entry = AuditService::set_cqc_can_view(&state.db, id, req.cqc_can_view)
        .await
        .map_err(api_error)?
        .ok_or_else(|| not_found("Audit log entry"))?;
    Ok(ok(entry))
}

// ─── Security ────────────────────────────────────────────────────────────────

pub async fn security_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<SecurityDashboardQuery>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let mut body = SecurityService::dashboard(&state.db, range_hours(q.range.as_deref()))
        .await
        .map_err(api_error)?;
    let mut redis = state.redis.clone();
    body["blocked_ips"] = json!(SecurityService::blocked_ips(&mut redis).await.unwrap_or_default());
    Ok(Json(body))
}

pub async fn investigate_ip(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(ip): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let ip = parse_ip(&ip)?;
    let mut body = SecurityService::investigate_ip(&state.db, &ip).await.map_err(api_error)?;
    let mut redis = state.redis.clone();
    body["is_blocked"] = json!(SecurityService::is_blocked(&mut redis, &ip).await);
    Ok(Json(body))
}

pub async fn list_blocked_ips(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let mut redis = state.redis.clone();
    let ips = SecurityService::blocked_ips(&mut redis).await.map_err(api_error)?;
    Ok(Json(json!({ "items": ips })))
}

pub async fn block_ip(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<BlockIpRequest>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let ip = parse_ip(&req.ip_address)?;
    let caller_ip = client_ip(&headers);
    if ip == caller_ip {
        return Err(bad_request("You cannot block your own IP address"));
    }

    let mut redis = state.redis.clone();
    let added = SecurityService::block_ip(&mut redis, &ip).await.map_err(api_error)?;
    tracing::warn!(%ip, by = %user.username, "IP blocked");

    SecurityService::log(
        state.db.clone(),
        SecurityLogEntry::new("IP Blocked", SecurityStatus::Success, caller_ip)
            .user(Some(user.user_id))
            .user_agent(user_agent(&headers))
            .details(json!({ "blocked_ip": ip, "reason": req.reason.unwrap_or_default() })),
    );
    Ok(Json(json!({ "ip_address": ip, "blocked": true, "newly_blocked": added })))
}

pub async fn unblock_ip(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(ip): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_management(&user)?;
    let ip = parse_ip(&ip)?;
    let mut redis = state.redis.clone();
    if !SecurityService::unblock_ip(&mut redis, &ip).await.map_err(api_error)? {
        return Err(not_found("Blocked IP"));
    }

    SecurityService::log(
        state.db.clone(),
        SecurityLogEntry::new("IP Unblocked", SecurityStatus::Success, client_ip(&headers))
            .user(Some(user.user_id))
            .user_agent(user_agent(&headers))
            .details(json!({ "unblocked_ip": ip })),
    );
    Ok(Json(json!({ "ip_address": ip, "blocked": false })))
}

/// Normalises an IP address, rejecting anything that does not parse.
fn parse_ip(raw: &str) -> Result<String, ApiError> {
    raw.trim()
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| bad_request("Invalid IP address"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_addresses_are_normalised() {
        assert_eq!(parse_ip(" 10.0.0.1 ").unwrap(), "10.0.0.1");
        assert_eq!(parse_ip("2001:DB8::1").unwrap(), "2001:db8::1");
        assert!(parse_ip("10.0.0.256").is_err());
        assert!(parse_ip("localhost").is_err());
    }
}
