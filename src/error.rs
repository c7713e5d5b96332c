use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{debug, error};
use serde::Serialize;
use sled::transaction::TransactionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidArgument(String),

    /// The payload names the missing entity; clients only see "Not found".
    #[error("Not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
}

/// `release_date` -> `releaseDate`, matching the JSON field names.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        let message = fields
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let text = e.message.as_deref().unwrap_or(e.code.as_ref());
                    format!("{}: {}", camel_case(field), text)
                })
            })
            .collect::<Vec<_>>()
            .join("; ");
        AppError::Validation(message)
    }
}

impl From<TransactionError<AppError>> for AppError {
    fn from(err: TransactionError<AppError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => AppError::Storage(e),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) | AppError::Codec(_) | AppError::Corrupted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::NotFound(what) => {
                debug!("Not found: {}", what);
                self.to_string()
            }
            AppError::Storage(_) | AppError::Codec(_) | AppError::Corrupted(_) => {
                error!("{:?}", self);
                "Internal server error".to_owned()
            }
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody { error: &message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidArgument("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("film 1").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Corrupted("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_hides_detail() {
        assert_eq!(AppError::not_found("user 42").to_string(), "Not found");
    }

    #[test]
    fn validation_message_uses_json_field_names() {
        let mut errors = validator::ValidationErrors::new();
        errors.add(
            "release_date",
            validator::ValidationError::new("release_date")
                .with_message("must not be earlier than 1895-12-28".into()),
        );
        errors.add("name", validator::ValidationError::new("blank"));
        let err: AppError = errors.into();
        assert_eq!(
            err.to_string(),
            "name: blank; releaseDate: must not be earlier than 1895-12-28"
        );
        assert_eq!(camel_case("release_date"), "releaseDate");
        assert_eq!(camel_case("login"), "login");
    }

    #[test]
    fn transaction_abort_unwraps() {
        let err: AppError = TransactionError::Abort(AppError::Conflict("dup".into())).into();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "dup"));
    }
}
