use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

/// Error tuple returned by every handler.
pub type ApiError = (StatusCode, Json<Value>);

/// Business-rule failures raised by the services. They travel inside
/// `anyhow::Error` and are mapped to a status code by [`api_error`].
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Cannot administer {requested} units. Only {available} units available.")]
    InsufficientBalance { requested: i32, available: i32 },
    #[error("A witness is required for controlled drug administration.")]
    WitnessRequired,
    #[error("{0}")]
    InvalidWitness(String),
    #[error("Too many failed login attempts. Please try again later.")]
    TooManyAttempts,
}

impl DomainError {
    pub fn status(&self) -> StatusCode {
        match self {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            DomainError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            DomainError::Validation(_)
            | DomainError::InsufficientBalance { .. }
            | DomainError::WitnessRequired
            | DomainError::InvalidWitness(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

pub fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

pub fn forbidden(message: &str) -> ApiError {
    error_body(StatusCode::FORBIDDEN, message)
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    error_body(StatusCode::BAD_REQUEST, message)
}

pub fn not_found(what: &'static str) -> ApiError {
    error_body(StatusCode::NOT_FOUND, format!("{what} not found"))
}

/// Map a service error onto the HTTP response.
pub fn api_error(err: anyhow::Error) -> ApiError {
    if let Some(domain) = err.downcast_ref::<DomainError>() {
        return error_body(domain.status(), domain.to_string());
    }

    if let Some(db_err) = err.downcast_ref::<sqlx::Error>() {
        match db_err {
            sqlx::Error::RowNotFound => {
                return error_body(StatusCode::NOT_FOUND, "Record not found");
            }
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                return error_body(StatusCode::CONFLICT, "Record already exists");
            }
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => {
                return error_body(StatusCode::UNPROCESSABLE_ENTITY, "Referenced record does not exist");
            }
            sqlx::Error::Database(e) if e.is_check_violation() => {
                return error_body(StatusCode::UNPROCESSABLE_ENTITY, e.message().to_string());
            }
            _ => {}
        }
    }

    tracing::error!("Unhandled service error: {err:#}");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_expected_status() {
        let cases = [
            (DomainError::NotFound("Medication"), StatusCode::NOT_FOUND),
            (DomainError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (DomainError::Conflict("dup".into()), StatusCode::CONFLICT),
            (DomainError::WitnessRequired, StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (DomainError::TooManyAttempts, StatusCode::TOO_MANY_REQUESTS),
        ];
        for (err, expected) in cases {
            let (status, _) = api_error(err.into());
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn insufficient_balance_message_names_quantities() {
        let (status, Json(body)) = api_error(
            DomainError::InsufficientBalance { requested: 3, available: 2 }.into(),
        );
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["error"],
            "Cannot administer 3 units. Only 2 units available."
        );
    }

    #[test]
    fn unknown_errors_hide_details() {
        let (status, Json(body)) = api_error(anyhow::anyhow!("connection reset by peer"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn row_not_found_is_404() {
        let (status, _) = api_error(sqlx::Error::RowNotFound.into());
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
