use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DOCUMENT_TYPES: &[&str] = &[
    "care_plan",
    "assessment",
    "consent",
    "policy",
    "procedure",
    "report",
    "contract",
    "medical",
    "other",
];

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "jpg", "jpeg", "png"];

pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub document_type: String,
    pub description: String,
    pub original_filename: String,
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum: String,
    #[serde(skip_serializing)]
    pub encryption_iv: Vec<u8>,
    #[serde(skip_serializing)]
    pub encryption_tag: Vec<u8>,
    pub service_user_id: Option<Uuid>,
    pub effective_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub is_confidential: bool,
    pub cqc_can_view: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl Document {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| today > expiry)
    }
}

/// Lower-cased extension of `filename` when it is on the whitelist.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub document_type: Option<String>,
    pub service_user_id: Option<Uuid>,
    pub is_confidential: Option<bool>,
    pub cqc_can_view: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub document_type: Option<String>,
    pub description: Option<String>,
    pub service_user_id: Option<Uuid>,
    pub effective_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "crate::models::nullable")]
    pub expiry_date: Option<Option<NaiveDate>>,
    pub is_confidential: Option<bool>,
    pub cqc_can_view: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_whitelist_is_case_insensitive() {
        assert_eq!(allowed_extension("Policy.PDF").as_deref(), Some("pdf"));
        assert_eq!(allowed_extension("scan.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("macro.xlsm"), None);
        assert_eq!(allowed_extension("script.sh"), None);
        assert_eq!(allowed_extension("no_extension"), None);
    }
}
