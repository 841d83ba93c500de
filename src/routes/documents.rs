use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{api_error, ApiError},
    models::{
        auth::AuthenticatedUser,
        document::{Document, DocumentQuery, UpdateDocumentRequest},
        user::UserRole,
    },
    routes::{audit, cqc, ok, page_body, require_care_team},
    services::documents::DocumentService,
    AppState,
};

/// Attachment response for a decrypted document.
pub fn file_response(doc: &Document, bytes: Vec<u8>) -> Response {
    let filename: String = doc
        .original_filename
        .chars()
        .filter(|c| !matches!(c, '"' | '\\' | '\r' | '\n'))
        .collect();
    (
        [
            (header::CONTENT_TYPE, doc.content_type.clone()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response()
}

pub async fn upload_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_care_team(&user)?;
    let doc = DocumentService::upload(
        &state.db,
        &state.config.media_dir,
        &state.config.encryption_master_key,
        multipart,
        user.user_id,
    )
    .await
    .map_err(api_error)?;
    audit(&state, &user, &headers, "create", "Document", doc.id);
    Ok((StatusCode::CREATED, ok(doc)))
}

pub async fn list_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<DocumentQuery>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let (items, total) = DocumentService::list(&state.db, &q, false).await.map_err(api_error)?;
    Ok(Json(page_body(&items, total, q.page, q.per_page)))
}

pub async fn get_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let doc = DocumentService::get(&state.db, id).await.map_err(api_error)?;
    let is_expired = doc.is_expired(Local::now().date_naive());
    Ok(Json(json!({ "document": doc, "is_expired": is_expired })))
}

pub async fn update_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<Value>, ApiError> {
    require_care_team(&user)?;
    let doc = DocumentService::update(&state.db, id, &req, user.user_id).await.map_err(api_error)?;
    audit(&state, &user, &headers, "update", "Document", doc.id);
    Ok(ok(doc))
}

/// Care team downloads any document; CQC members go through the portal checks.
pub async fn download_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    if user.role == UserRole::Cqc {
        return cqc::download_document(State(state), user, headers, Path(id)).await;
    }
    let doc = DocumentService::get(&state.db, id).await.map_err(api_error)?;
    let bytes = DocumentService::read_plaintext(&state.config.media_dir, &state.config.encryption_master_key, &doc)
        .await
        .map_err(api_error)?;
    audit(&state, &user, &headers, "export", "Document", doc.id);
    Ok(file_response(&doc, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(name: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            title: "Policy".into(),
            document_type: "policy".into(),
            description: String::new(),
            original_filename: name.into(),
            storage_path: "documents/x.enc".into(),
            content_type: "application/pdf".into(),
            size_bytes: 3,
            checksum: String::new(),
            encryption_iv: Vec::new(),
            encryption_tag: Vec::new(),
            service_user_id: None,
            effective_date: None,
            expiry_date: None,
            is_confidential: false,
            cqc_can_view: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: None,
            updated_by: None,
        }
    }

    #[test]
    fn attachment_headers_strip_quotes_from_filename() {
        let res = file_response(&doc("fire \"safety\".pdf"), b"pdf".to_vec());
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"fire safety.pdf\""
        );
    }
}
