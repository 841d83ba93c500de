use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    middleware::auth::decode_access_token,
    models::audit::SecurityStatus,
    services::security::{SecurityLogEntry, SecurityService},
    AppState,
};

/// Extracts the real client IP from proxy headers.
/// Priority: X-Real-IP, then the first X-Forwarded-For hop.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return ip.trim().to_string();
    }
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    "unknown".to_string()
}

pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .chars()
        .take(512)
        .collect()
}

fn rate_key(ip: &str) -> String {
    format!("rate:ip:{ip}")
}

/// Bumps the caller's fixed-window counter and returns the new count.
/// The TTL is set on the first hit only, so the window never slides.
/// A Redis outage reads as zero requests.
async fn count_request(redis: &mut redis::aio::MultiplexedConnection, ip: &str, window_secs: u64) -> u64 {
    let key = rate_key(ip);
    let count: u64 = match redis::cmd("INCR").arg(&key).query_async(redis).await {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!("rate counter unavailable: {e}");
            return 0;
        }
    };
    if count == 1 {
        let expired: Result<(), _> = redis::cmd("EXPIRE").arg(&key).arg(window_secs).query_async(redis).await;
        if let Err(e) = expired {
            tracing::debug!("rate counter TTL not set: {e}");
        }
    }
    count
}

/// Request guard applied to every route:
/// rejects blocked IPs, enforces the per-IP request budget and records
/// 403/404 responses in the security log.
pub async fn security_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let headers = req.headers();
    let ip = client_ip(headers);
    let agent = user_agent(headers);
    let user_id = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| decode_access_token(token, &state.config.jwt_secret).ok())
        .map(|u| u.user_id);
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let mut redis = state.redis.clone();

    if SecurityService::is_blocked(&mut redis, &ip).await {
        SecurityService::log(
            state.db.clone(),
            SecurityLogEntry::new("Blocked IP Request", SecurityStatus::Suspicious, ip.as_str())
                .user(user_id)
                .user_agent(agent)
                .details(json!({ "method": method, "path": path })),
        );
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "Access denied" }))).into_response();
    }

    let window = state.config.rate_limit_window_secs;
    let max = state.config.rate_limit_max_requests;
    let count = count_request(&mut redis, &ip, window).await;
    if count > max {
        // One log line per window is enough.
        if count == max + 1 {
            tracing::warn!(%ip, "request rate limit exceeded");
            SecurityService::log(
                state.db.clone(),
                SecurityLogEntry::new("Rate Limit Exceeded", SecurityStatus::Suspicious, ip.as_str())
                    .user(user_id)
                    .user_agent(agent)
                    .details(json!({ "limit": max, "window_secs": window, "path": path })),
            );
        }
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many requests. Please try again later." })),
        )
            .into_response();
    }

    let response = next.run(req).await;

    let action = match response.status() {
        StatusCode::FORBIDDEN => Some("Access Denied"),
        StatusCode::NOT_FOUND => Some("Not Found"),
        _ => None,
    };
    if let Some(action) = action {
        SecurityService::log(
            state.db.clone(),
            SecurityLogEntry::new(action, SecurityStatus::Failed, ip)
                .user(user_id)
                .user_agent(agent)
                .details(json!({ "method": method, "path": path })),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_prefers_real_ip_then_first_forwarded_hop() {
        let mut h = HeaderMap::new();
        assert_eq!(client_ip(&h), "unknown");

        h.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&h), "203.0.113.7");

        h.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&h), "198.51.100.2");
    }

    #[test]
    fn rate_counters_are_keyed_per_ip() {
        assert_eq!(rate_key("203.0.113.7"), "rate:ip:203.0.113.7");
        assert_ne!(rate_key("203.0.113.7"), rate_key("203.0.113.8"));
    }

    #[test]
    fn user_agent_defaults_to_empty() {
        let mut h = HeaderMap::new();
        assert_eq!(user_agent(&h), "");
        h.insert("user-agent", HeaderValue::from_static("curl/8.0"));
        assert_eq!(user_agent(&h), "curl/8.0");
    }
}
