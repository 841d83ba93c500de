use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::{models::auth::AuthenticatedUser, AppState};

/// Sub-directories of the media root that hold plain images.
/// Encrypted documents are only reachable through their download routes.
const PHOTO_DIRS: &[&str] = &["profiles", "activities"];

fn is_photo_path(path: &str) -> bool {
    let mut parts = path.split('/');
    let (Some(dir), Some(file), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    PHOTO_DIRS.contains(&dir) && !file.is_empty() && file != ".." && !file.starts_with('.')
}

/// GET /media/{*path}: profile and activity photos for the care team.
pub async fn serve_photo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(path): Path<String>,
) -> Result<Response, StatusCode> {
    if !user.is_care_team() {
        return Err(StatusCode::FORBIDDEN);
    }
    if !is_photo_path(&path) {
        return Err(StatusCode::NOT_FOUND);
    }

    let file_path = std::path::PathBuf::from(&state.config.media_dir).join(&path);
    let canonical_media =
        tokio::fs::canonicalize(&state.config.media_dir).await.map_err(|_| StatusCode::NOT_FOUND)?;
    let canonical_file = tokio::fs::canonicalize(&file_path).await.map_err(|_| StatusCode::NOT_FOUND)?;
    if !canonical_file.starts_with(&canonical_media) {
        return Err(StatusCode::FORBIDDEN);
    }

    let bytes = tokio::fs::read(&canonical_file).await.map_err(|_| StatusCode::NOT_FOUND)?;
    let content_type = mime_guess::from_path(&canonical_file)
        .first_raw()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref());

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, max-age=3600"),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_photo_directories_are_served() {
        assert!(is_photo_path("profiles/3f2a.jpg"));
        assert!(is_photo_path("activities/77.png"));
        assert!(!is_photo_path("documents/abc.enc"));
        assert!(!is_photo_path("profiles/../documents/abc.enc"));
        assert!(!is_photo_path("profiles/.."));
        assert!(!is_photo_path("profiles/"));
        assert!(!is_photo_path("secret.txt"));
    }
}
