use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Local, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{api_error, ApiError},
    models::{
        auth::AuthenticatedUser,
        records::{
            ActivityRequest, AppointmentRequest, IncidentRequest, RecordQuery, TripRequest, VisitorRequest,
            VitalSignsRequest,
        },
    },
    routes::{audit, ok, page_body, require_care_team},
    services::{
        photos,
        records::{
            ActivityService, AppointmentService, IncidentService, TripService, VisitorService, VitalSignsService,
        },
    },
    AppState,
};

// ─── Activities ──────────────────────────────────────────────────────────────

pub async fn list_activities(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<RecordQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = ActivityService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let activity = ActivityService::get(&state.db, id).await.map_err(api_error)?;
    let photos = ActivityService::photos(&state.db, id).await.map_err(api_error)?;
    Ok(Json(json!({ "activity": activity, "photos": photos })))
}

pub async fn create_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<ActivityRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let activity = ActivityService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "Activity", activity.id);
    Ok((StatusCode::CREATED, ok(activity)))
}

pub async fn update_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ActivityRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let activity = ActivityService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Activity", activity.id);
    Ok(ok(activity))
}

pub async fn complete_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let activity = ActivityService::mark_completed(&state.db, id, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Activity", activity.id);
    Ok(ok(activity))
}

pub async fn upload_activity_photo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let image = photos::read_image(multipart).await.map_err(api_error)?;
    let photo = ActivityService::add_photo(&state.db, &state.config.media_dir, id, &image)
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "create", "ActivityPhoto", photo.id);
    Ok((StatusCode::CREATED, ok(photo)))
}

// ─── Incidents ───────────────────────────────────────────────────────────────

pub async fn list_incidents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<RecordQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = IncidentService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_incident(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let incident = IncidentService::get(&state.db, id).await.map_err(api_error)?;
    let viewable = incident.is_viewable_by_cqc(Utc::now());
    Ok(Json(json!({ "incident": incident, "is_viewable_by_cqc": viewable })))
}

pub async fn create_incident(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<IncidentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let incident = IncidentService::create(&state.db, &req, user.user_id, state.config.cqc_default_delay_hours)
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "create", "Incident", incident.id);
    Ok((StatusCode::CREATED, ok(incident)))
}

pub async fn update_incident(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<IncidentRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let incident = IncidentService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Incident", incident.id);
    Ok(ok(incident))
}

pub async fn toggle_incident_follow_up(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let incident = IncidentService::toggle_follow_up(&state.db, id, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Incident", incident.id);
    Ok(ok(incident))
}

// ─── Appointments ────────────────────────────────────────────────────────────

pub async fn list_appointments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<RecordQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = AppointmentService::list(&state.db, &q, Local::now().date_naive())
        .await
        .map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    AppointmentService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_appointment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<AppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let appt = AppointmentService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "Appointment", appt.id);
    Ok((StatusCode::CREATED, ok(appt)))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<AppointmentRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let appt = AppointmentService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Appointment", appt.id);
    Ok(ok(appt))
}

pub async fn complete_appointment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let appt = AppointmentService::mark_completed(&state.db, id, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Appointment", appt.id);
    Ok(ok(appt))
}

// ─── Visitors ────────────────────────────────────────────────────────────────

pub async fn list_visitors(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<RecordQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = VisitorService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_visitor(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let visitor = VisitorService::get(&state.db, id).await.map_err(api_error)?;
    let duration = visitor.visit_duration();
    Ok(Json(json!({ "visitor": visitor, "visit_duration": duration })))
}

pub async fn create_visitor(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<VisitorRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let visitor = VisitorService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "Visitor", visitor.id);
    Ok((StatusCode::CREATED, ok(visitor)))
}

pub async fn update_visitor(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<VisitorRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let visitor = VisitorService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Visitor", visitor.id);
    Ok(ok(visitor))
}

// ─── Trips ───────────────────────────────────────────────────────────────────

pub async fn list_trips(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<RecordQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = TripService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_trip(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    TripService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_trip(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<TripRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let trip = TripService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "Trip", trip.id);
    Ok((StatusCode::CREATED, ok(trip)))
}

pub async fn update_trip(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<TripRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let trip = TripService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Trip", trip.id);
    Ok(ok(trip))
}

// ─── Vital signs ─────────────────────────────────────────────────────────────

pub async fn list_vital_signs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<RecordQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = VitalSignsService::list(&state.db, &q).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_vital_signs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    VitalSignsService::get(&state.db, id).await.map(ok).map_err(api_error)
}

pub async fn create_vital_signs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<VitalSignsRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let vitals = VitalSignsService::create(&state.db, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "create", "VitalSigns", vitals.id);
    Ok((StatusCode::CREATED, ok(vitals)))
}

pub async fn update_vital_signs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<VitalSignsRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let vitals = VitalSignsService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "VitalSigns", vitals.id);
    Ok(ok(vitals))
}
