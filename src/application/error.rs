use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    domain::error::DomainError,
    infra::{error::InfraError, storage::StoreError},
};

/// Diagnostic attached to failed responses and consumed by the response logger.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("request signature missing or invalid")]
    Unauthorized,
    #[error("encrypted notes are not supported")]
    EncryptedNoteUnsupported,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        Self::Store(error.into())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorMessage,
}

#[derive(Debug, Serialize)]
struct ErrorMessage {
    code: &'static str,
    message: &'static str,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Store(
                StoreError::InvalidIdentifier(_)
                | StoreError::InvalidHash(_)
                | StoreError::UnsupportedType(_),
            )
            | AppError::EncryptedNoteUnsupported
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Store(StoreError::AccessDenied(_)) => StatusCode::FORBIDDEN,
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::StorageIo(_))
            | AppError::Infra(_)
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Store(StoreError::InvalidIdentifier(_)) => "invalid_identifier",
            AppError::Store(StoreError::InvalidHash(_)) => "invalid_hash",
            AppError::Store(StoreError::UnsupportedType(_)) => "unsupported_type",
            AppError::Store(StoreError::NotFound(_)) => "not_found",
            AppError::Store(StoreError::AccessDenied(_)) => "forbidden",
            AppError::Store(StoreError::StorageIo(_)) => "storage_io",
            AppError::Unauthorized => "unauthorized",
            AppError::EncryptedNoteUnsupported => "encrypted_unsupported",
            AppError::Validation(_) => "bad_request",
            AppError::Infra(_) => "infrastructure",
            AppError::Unexpected(_) => "unexpected",
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Store(StoreError::InvalidIdentifier(_)) => "Invalid note identifier",
            AppError::Store(StoreError::InvalidHash(_)) => "Invalid content hash",
            AppError::Store(StoreError::UnsupportedType(_)) => "File type not allowed",
            AppError::Store(StoreError::NotFound(_)) => "Resource not found",
            AppError::Store(StoreError::AccessDenied(_)) => "Access denied",
            AppError::Store(StoreError::StorageIo(_)) => "I/O failure during request",
            AppError::Unauthorized => "Request signature missing or invalid",
            AppError::EncryptedNoteUnsupported => {
                "Encrypted notes are not supported; disable encryption in the plugin settings"
            }
            AppError::Validation(_) => "Request could not be processed",
            AppError::Infra(_) => "Server infrastructure failure",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            success: false,
            error: ErrorMessage {
                code: self.code(),
                message: self.presentation_message(),
            },
        };
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_distinct_status_classes() {
        let cases = [
            (StoreError::InvalidIdentifier("A".into()), StatusCode::BAD_REQUEST),
            (StoreError::UnsupportedType("exe".into()), StatusCode::BAD_REQUEST),
            (StoreError::AccessDenied("../x".into()), StatusCode::FORBIDDEN),
            (StoreError::NotFound("abc".into()), StatusCode::NOT_FOUND),
            (
                StoreError::StorageIo(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).status_code(), status);
        }
    }

    #[test]
    fn response_carries_report_and_json_body() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages[0], "request signature missing or invalid");
    }
}
