use std::path::PathBuf;

use axum::extract::Multipart;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::DomainError,
    models::{
        document::{
            allowed_extension, Document, DocumentQuery, UpdateDocumentRequest, DOCUMENT_TYPES,
            MAX_DOCUMENT_BYTES,
        },
        paginate,
        records::check_choice,
    },
    services::{encryption, metrics::DOCUMENTS_COUNTER},
};

/// Metadata sent alongside the file part of an upload.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(Vec<u8>, String, String)>,
    title: Option<String>,
    document_type: Option<String>,
    description: Option<String>,
    service_user_id: Option<Uuid>,
    effective_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    is_confidential: bool,
    cqc_can_view: bool,
}

fn form_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

fn form_date(value: &str, field: &str) -> Result<Option<NaiveDate>, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| DomainError::Validation(format!("Invalid {field}: expected YYYY-MM-DD")))
}

async fn read_form(mut multipart: Multipart) -> anyhow::Result<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let ct = field
                    .content_type()
                    .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
                    .to_string();
                let bytes = field.bytes().await?.to_vec();
                form.file = Some((bytes, filename, ct));
            }
            "title" => form.title = Some(field.text().await?),
            "document_type" => form.document_type = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            "service_user_id" => {
                let text = field.text().await?;
                if !text.trim().is_empty() {
                    form.service_user_id = Some(
                        text.trim()
                            .parse()
                            .map_err(|_| DomainError::Validation("Invalid service_user_id".into()))?,
                    );
                }
            }
            "effective_date" => form.effective_date = form_date(&field.text().await?, "effective_date")?,
            "expiry_date" => form.expiry_date = form_date(&field.text().await?, "expiry_date")?,
            "is_confidential" => form.is_confidential = form_flag(&field.text().await?),
            "cqc_can_view" => form.cqc_can_view = form_flag(&field.text().await?),
            _ => {}
        }
    }
    Ok(form)
}

pub struct DocumentService;

impl DocumentService {
    /// Encrypts the uploaded file to `media_dir/documents/<uuid>.enc` and
    /// records its metadata, IV, tag and plaintext checksum.
    pub async fn upload(
        pool: &PgPool,
        media_dir: &str,
        master_key: &str,
        multipart: Multipart,
        actor: Uuid,
    ) -> anyhow::Result<Document> {
        let form = read_form(multipart).await?;
        let (bytes, original_filename, content_type) =
            form.file.ok_or_else(|| DomainError::Validation("No file provided".into()))?;

        if allowed_extension(&original_filename).is_none() {
            return Err(DomainError::Validation(
                "Unsupported file type. Allowed: pdf, doc, docx, xls, xlsx, jpg, jpeg, png".into(),
            )
            .into());
        }
        if bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(DomainError::Validation("File too large (max 5 MB)".into()).into());
        }
        if bytes.is_empty() {
            return Err(DomainError::Validation("File is empty".into()).into());
        }
        let document_type = form.document_type.as_deref().unwrap_or("other");
        check_choice(document_type, DOCUMENT_TYPES, "document_type")?;
        if let (Some(start), Some(end)) = (form.effective_date, form.expiry_date) {
            if end < start {
                return Err(DomainError::Validation("expiry_date is before effective_date".into()).into());
            }
        }
        let title = form
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&original_filename)
            .to_string();

        let key = encryption::document_key(master_key)?;
        let checksum = encryption::checksum(&bytes);
        let (ciphertext, iv, tag) = encryption::encrypt_file(&bytes, &key)?;

        let dir = PathBuf::from(media_dir).join("documents");
        tokio::fs::create_dir_all(&dir).await?;
        let filename = format!("{}.enc", Uuid::new_v4());
        tokio::fs::write(dir.join(&filename), &ciphertext).await?;
        let storage_path = format!("documents/{filename}");

        let inserted = sqlx::query_as::<_, Document>(
            "INSERT INTO documents (
                title, document_type, description, original_filename, storage_path, content_type,
                size_bytes, checksum, encryption_iv, encryption_tag, service_user_id,
                effective_date, expiry_date, is_confidential, cqc_can_view, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
             RETURNING *",
        )
        .bind(&title)
        .bind(document_type)
        .bind(form.description.as_deref().unwrap_or(""))
        .bind(&original_filename)
        .bind(&storage_path)
        .bind(&content_type)
        .bind(bytes.len() as i64)
        .bind(&checksum)
        .bind(&iv)
        .bind(&tag)
        .bind(form.service_user_id)
        .bind(form.effective_date)
        .bind(form.expiry_date)
        .bind(form.is_confidential)
        .bind(form.cqc_can_view)
        .bind(actor)
        .fetch_one(pool)
        .await;

        match inserted {
            Ok(doc) => {
                DOCUMENTS_COUNTER.with_label_values(&["upload"]).inc();
                Ok(doc)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(dir.join(&filename)).await;
                Err(e.into())
            }
        }
    }

    pub async fn list(pool: &PgPool, q: &DocumentQuery, cqc_only: bool) -> anyhow::Result<(Vec<Document>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(|s| format!("%{s}%"));
        let cqc_filter = if cqc_only { Some(true) } else { q.cqc_can_view };
        let filter = "WHERE ($1::text IS NULL OR document_type = $1)
                        AND ($2::uuid IS NULL OR service_user_id = $2)
                        AND ($3::bool IS NULL OR is_confidential = $3)
                        AND ($4::bool IS NULL OR cqc_can_view = $4)
                        AND ($5::text IS NULL OR title ILIKE $5 OR description ILIKE $5)";

        let rows = sqlx::query_as::<_, Document>(&format!(
            "SELECT * FROM documents {filter} ORDER BY created_at DESC LIMIT $6 OFFSET $7"
        ))
        .bind(&q.document_type)
        .bind(q.service_user_id)
        .bind(q.is_confidential)
        .bind(cqc_filter)
        .bind(&search)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM documents {filter}"))
            .bind(&q.document_type)
            .bind(q.service_user_id)
            .bind(q.is_confidential)
            .bind(cqc_filter)
            .bind(&search)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<Document> {
        let row = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Document"))?;
        Ok(row)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateDocumentRequest,
        actor: Uuid,
    ) -> anyhow::Result<Document> {
        if let Some(kind) = req.document_type.as_deref() {
            check_choice(kind, DOCUMENT_TYPES, "document_type")?;
        }
        let row = sqlx::query_as::<_, Document>(
            "UPDATE documents SET
                title           = COALESCE($2, title),
                document_type   = COALESCE($3, document_type),
                description     = COALESCE($4, description),
                service_user_id = COALESCE($5, service_user_id),
                effective_date  = COALESCE($6, effective_date),
                expiry_date     = CASE WHEN $11 THEN $7 ELSE expiry_date END,
                is_confidential = COALESCE($8, is_confidential),
                cqc_can_view    = COALESCE($9, cqc_can_view),
                updated_by      = $10
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.title)
        .bind(&req.document_type)
        .bind(&req.description)
        .bind(req.service_user_id)
        .bind(req.effective_date)
        .bind(req.expiry_date.flatten())
        .bind(req.is_confidential)
        .bind(req.cqc_can_view)
        .bind(actor)
        .bind(req.expiry_date.is_some())
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Document"))?;
        Ok(row)
    }

    /// Decrypted file contents, checked against the stored checksum.
    pub async fn read_plaintext(media_dir: &str, master_key: &str, doc: &Document) -> anyhow::Result<Vec<u8>> {
        let ciphertext = tokio::fs::read(PathBuf::from(media_dir).join(&doc.storage_path)).await?;
        let key = encryption::document_key(master_key)?;
        let plaintext = encryption::decrypt_file(&ciphertext, &doc.encryption_iv, &doc.encryption_tag, &key)?;
        if encryption::checksum(&plaintext) != doc.checksum {
            anyhow::bail!("Checksum mismatch for document {}", doc.id);
        }
        DOCUMENTS_COUNTER.with_label_values(&["download"]).inc();
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_flags_accept_common_truthy_values() {
        assert!(form_flag("true"));
        assert!(form_flag(" On "));
        assert!(form_flag("1"));
        assert!(!form_flag("false"));
        assert!(!form_flag(""));
    }

    #[test]
    fn form_dates_parse_or_reject() {
        assert_eq!(form_date("", "expiry_date").unwrap(), None);
        assert_eq!(
            form_date("2025-03-31", "expiry_date").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31)
        );
        assert!(form_date("31/03/2025", "expiry_date").is_err());
    }
}
