// Library exports for the API binary, the command-line tools and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use config::Config;
use middleware::auth::JwtSecret;
use services::email::EmailService;

/// Global request body cap. Document uploads are checked again at 5 MB.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: redis::aio::MultiplexedConnection,
    pub config: Arc<Config>,
    pub email: Option<Arc<EmailService>>,
}

/// Full application router with every layer applied.
pub fn build_router(state: AppState) -> Router {
    let jwt_secret = JwtSecret(state.config.jwt_secret.clone());
    let base_url = state.config.app_base_url.clone();

    let app = api_routes()
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::security::security_guard,
        ))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        .with_state(state);

    with_common_layers(app, jwt_secret, base_url)
}

fn api_routes() -> Router<AppState> {
    use routes::*;

    Router::new()
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        // Dashboards
        .route("/dashboard", get(dashboard::dashboard_redirect))
        .route("/dashboard/management", get(dashboard::management_dashboard))
        .route("/dashboard/staff", get(dashboard::staff_dashboard))
        // Staff administration
        .route("/departments", get(staff::list_departments).post(staff::create_department))
        .route("/departments/{id}", get(staff::get_department).put(staff::update_department))
        .route("/departments/{id}/toggle", post(staff::toggle_department))
        .route("/roles", get(staff::list_roles).post(staff::create_role))
        .route("/roles/{id}", get(staff::get_role).put(staff::update_role).delete(staff::delete_role))
        .route("/staff", get(staff::list_staff).post(staff::create_staff))
        .route("/staff/{id}", get(staff::get_staff).put(staff::update_staff))
        .route("/staff/{id}/toggle", post(staff::toggle_staff))
        .route("/staff/{id}/reset-password", post(staff::reset_staff_password))
        // CQC members (management)
        .route("/cqc/members", get(cqc::list_members).post(cqc::create_member))
        .route("/cqc/members/{id}", get(cqc::get_member).put(cqc::update_member))
        .route("/cqc/members/{id}/toggle", post(cqc::toggle_member))
        .route("/cqc/members/{id}/reset-password", post(cqc::reset_member_password))
        .route("/cqc/access-log", get(cqc::access_log))
        // CQC portal
        .route("/cqc/portal/dashboard", get(cqc::dashboard))
        .route("/cqc/portal/incidents", get(cqc::list_incidents))
        .route("/cqc/portal/incidents/{id}", get(cqc::get_incident))
        .route("/cqc/portal/documents", get(cqc::list_documents))
        .route("/cqc/portal/documents/{id}/download", get(cqc::download_document))
        .route("/cqc/portal/access-log", get(cqc::my_access_log))
        // Residents
        .route("/residents", get(residents::list_residents).post(residents::create_resident))
        .route("/residents/{id}", get(residents::get_resident).put(residents::update_resident))
        .route("/residents/{id}/toggle", post(residents::toggle_resident))
        .route("/residents/{id}/photo", post(residents::upload_photo))
        // Care records
        .route("/care-plans", get(care::list_care_plans).post(care::create_care_plan))
        .route("/care-plans/{id}", get(care::get_care_plan).put(care::update_care_plan))
        .route("/pbs-plans", get(care::list_pbs_plans).post(care::create_pbs_plan))
        .route("/pbs-plans/{id}", get(care::get_pbs_plan).put(care::update_pbs_plan))
        .route("/risk-assessments", get(care::list_risk_assessments).post(care::create_risk_assessment))
        .route("/risk-assessments/{id}", get(care::get_risk_assessment).put(care::update_risk_assessment))
        .route("/risk-assessments/{id}/toggle", post(care::toggle_risk_assessment))
        // Medication
        .route("/medications", get(medications::list_medications).post(medications::create_medication))
        .route("/medications/dashboard", get(medications::medication_dashboard))
        .route("/medications/{id}", get(medications::get_medication).put(medications::update_medication))
        .route("/medications/{id}/toggle", post(medications::toggle_medication))
        .route("/medications/{id}/administer", post(medications::administer))
        .route("/medication-administrations", get(medications::list_administrations))
        .route("/medication-administrations/export", get(medications::export_administrations))
        .route("/medication-administrations/{id}", get(medications::get_administration))
        // Operational records
        .route("/activities", get(records::list_activities).post(records::create_activity))
        .route("/activities/{id}", get(records::get_activity).put(records::update_activity))
        .route("/activities/{id}/complete", post(records::complete_activity))
        .route("/activities/{id}/photos", post(records::upload_activity_photo))
        .route("/incidents", get(records::list_incidents).post(records::create_incident))
        .route("/incidents/{id}", get(records::get_incident).put(records::update_incident))
        .route("/incidents/{id}/follow-up", post(records::toggle_incident_follow_up))
        .route("/appointments", get(records::list_appointments).post(records::create_appointment))
        .route("/appointments/{id}", get(records::get_appointment).put(records::update_appointment))
        .route("/appointments/{id}/complete", post(records::complete_appointment))
        .route("/visitors", get(records::list_visitors).post(records::create_visitor))
        .route("/visitors/{id}", get(records::get_visitor).put(records::update_visitor))
        .route("/trips", get(records::list_trips).post(records::create_trip))
        .route("/trips/{id}", get(records::get_trip).put(records::update_trip))
        .route("/vital-signs", get(records::list_vital_signs).post(records::create_vital_signs))
        .route("/vital-signs/{id}", get(records::get_vital_signs).put(records::update_vital_signs))
        // Administrative workflow
        .route("/shifts", get(workflow::list_shifts).post(workflow::create_shift))
        .route("/shifts/{id}", get(workflow::get_shift).put(workflow::update_shift))
        .route("/shifts/{id}/complete", post(workflow::toggle_shift_completed))
        .route("/daily-summaries", get(workflow::list_daily_summaries).post(workflow::create_daily_summary))
        .route("/daily-summaries/{id}", get(workflow::get_daily_summary).put(workflow::update_daily_summary))
        .route("/handovers", get(workflow::list_staff_handovers).post(workflow::create_staff_handover))
        .route("/handovers/{id}", get(workflow::get_staff_handover))
        .route("/handovers/{id}/acknowledge", post(workflow::acknowledge_staff_handover))
        .route(
            "/management/notes",
            get(workflow::list_management_notes).post(workflow::create_management_note),
        )
        .route(
            "/management/notes/{id}",
            get(workflow::get_management_note).put(workflow::update_management_note),
        )
        .route("/management/notes/{id}/resolve", post(workflow::resolve_management_note))
        .route(
            "/management/handovers",
            get(workflow::list_management_handovers).post(workflow::create_management_handover),
        )
        .route("/management/handovers/{id}", get(workflow::get_management_handover))
        .route(
            "/management/handovers/{id}/acknowledge",
            post(workflow::acknowledge_management_handover),
        )
        .route("/governance", get(workflow::list_governance).post(workflow::create_governance))
        .route("/governance/{id}", get(workflow::get_governance).put(workflow::update_governance))
        // Documents and photos
        .route("/documents", get(documents::list_documents).post(documents::upload_document))
        .route("/documents/{id}", get(documents::get_document).put(documents::update_document))
        .route("/documents/{id}/download", get(documents::download_document))
        .route("/media/{*path}", get(media::serve_photo))
        // Notifications and settings
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/settings", get(settings::list_settings))
        .route("/settings/{key}", get(settings::get_setting).put(settings::update_setting))
        // Reports
        .route("/reports/daily-activities", get(reports::daily_activities_report))
        .route("/reports/medication", get(reports::medication_report))
        .route("/reports/incidents", get(reports::incident_report))
        .route("/reports/staff-shifts", get(reports::staff_shifts_report))
        // Audit and security
        .route("/audit-log", get(audit_log::list_audit_log))
        .route("/audit-log/{id}/cqc", patch(audit_log::set_cqc_visibility))
        .route("/security/dashboard", get(audit_log::security_dashboard))
        .route("/security/ips/{ip}", get(audit_log::investigate_ip))
        .route("/security/blocked-ips", get(audit_log::list_blocked_ips).post(audit_log::block_ip))
        .route("/security/blocked-ips/{ip}", delete(audit_log::unblock_ip))
}

/// Layers shared by every route: JWT secret, tracing, CORS, security
/// headers and the body limit.
fn with_common_layers(app: Router, jwt_secret: JwtSecret, base_url: String) -> Router {
    // The configured front-end origin plus localhost for development.
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        o == base_url || o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1")
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]))
        .allow_origin(cors_origin);

    let security_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        ));

    app.layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(security_headers)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tower::ServiceExt;

    use crate::models::{auth::Claims, user::UserRole};

    const SECRET: &str = "test-secret";

    fn app() -> Router {
        let router = Router::new()
            .route("/dashboard", get(routes::dashboard::dashboard_redirect))
            .route("/metrics", get(routes::metrics::metrics_handler));
        with_common_layers(router, JwtSecret(SECRET.into()), "https://care.example.org".into())
    }

    fn bearer(role: UserRole) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            username: "carer".into(),
            role,
            exp: (now + 600) as usize,
            iat: now as usize,
        };
        let jwt = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        format!("Bearer {jwt}")
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let res = app()
            .oneshot(Request::get("/dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dashboard_follows_the_callers_role() {
        let res = app()
            .oneshot(
                Request::get("/dashboard")
                    .header(header::AUTHORIZATION, bearer(UserRole::Cqc))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["dashboard"], "cqc");
        assert_eq!(json["path"], "/dashboard/cqc");
    }

    #[tokio::test]
    async fn every_response_carries_security_headers() {
        let res = app()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let h = res.headers();
        assert_eq!(h["x-content-type-options"], "nosniff");
        assert_eq!(h["x-frame-options"], "SAMEORIGIN");
        assert_eq!(h["x-xss-protection"], "1; mode=block");
    }
}
