//! Note identifiers and the home-page rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Reserved identifier under which the site home page is stored.
pub const INDEX_IDENTIFIER: &str = "index";

/// Titles that designate the home page, compared case-insensitively.
const HOME_PAGE_TITLES: &[&str] = &["首页", "share note index"];

/// A validated note identifier (`[a-z0-9_-]+`).
///
/// Holding a `NoteId` guarantees the value is safe to join onto the storage
/// root: it can never contain a path separator or a parent-directory segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteId(String);

impl NoteId {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if is_valid_identifier(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::invalid_identifier(value))
        }
    }

    pub fn index() -> Self {
        Self(INDEX_IDENTIFIER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_index(&self) -> bool {
        self.0 == INDEX_IDENTIFIER
    }

    /// File name of the note document relative to the storage root.
    pub fn document_file_name(&self) -> String {
        format!("{}.html", self.0)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NoteId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<NoteId> for String {
    fn from(value: NoteId) -> Self {
        value.0
    }
}

/// True when `value` is non-empty and only contains `[a-z0-9_-]`.
pub fn is_valid_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// True when the title designates the site home page.
pub fn is_home_page_title(title: &str) -> bool {
    let normalized = title.trim().to_lowercase();
    HOME_PAGE_TITLES.iter().any(|candidate| *candidate == normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_restricted_character_class() {
        assert!(NoteId::parse("hello-world-1a2b3c").is_ok());
        assert!(NoteId::parse("draft_2").is_ok());
        assert!(NoteId::parse("index").expect("index").is_index());
    }

    #[test]
    fn rejects_traversal_and_uppercase() {
        for value in ["", "../etc/passwd", "Hello", "a/b", "note.html", "a b"] {
            assert_eq!(
                NoteId::parse(value),
                Err(DomainError::invalid_identifier(value)),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn home_page_titles_match_both_spellings() {
        assert!(is_home_page_title("Share Note Index"));
        assert!(is_home_page_title("share note index"));
        assert!(is_home_page_title("首页"));
        assert!(!is_home_page_title("Share Note Indexes"));
    }

    #[test]
    fn deserialization_validates() {
        let parsed: Result<NoteId, _> = serde_json::from_str("\"../x\"");
        assert!(parsed.is_err());
        let parsed: NoteId = serde_json::from_str("\"abc-123\"").expect("valid id");
        assert_eq!(parsed.as_str(), "abc-123");
    }
}
