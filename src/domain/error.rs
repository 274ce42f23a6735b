use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid note identifier `{value}`")]
    InvalidIdentifier { value: String },
    #[error("invalid content hash `{value}`")]
    InvalidContentHash { value: String },
    #[error("file type `{file_type}` is not allowed")]
    UnsupportedType { file_type: String },
}

impl DomainError {
    pub fn invalid_identifier(value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
        }
    }

    pub fn invalid_content_hash(value: impl Into<String>) -> Self {
        Self::InvalidContentHash {
            value: value.into(),
        }
    }

    pub fn unsupported_type(file_type: impl Into<String>) -> Self {
        Self::UnsupportedType {
            file_type: file_type.into(),
        }
    }
}
