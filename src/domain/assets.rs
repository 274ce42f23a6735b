//! Asset references exchanged with the publishing client.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// File type reserved for the singleton site theme.
pub const THEME_FILE_TYPE: &str = "css";

/// File name of the theme stylesheet relative to the storage root.
pub const THEME_FILE_NAME: &str = "theme.css";

/// Lowercase hex digest supplied by the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        if !value.is_empty() && value.bytes().all(|b| matches!(b, b'a'..=b'f' | b'0'..=b'9')) {
            Ok(Self(value.to_string()))
        } else {
            Err(DomainError::invalid_content_hash(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized (lowercase, alphanumeric) file type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileType(String);

impl FileType {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_theme(&self) -> bool {
        self.0 == THEME_FILE_TYPE
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configured allow-list of asset file types.
#[derive(Debug, Clone, Default)]
pub struct FileTypePolicy {
    allowed: BTreeSet<String>,
}

impl FileTypePolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|value| value.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|value| !value.is_empty())
                .collect(),
        }
    }

    /// Validate a raw file type tag. The reserved theme type is always accepted.
    pub fn check(&self, raw: &str) -> Result<FileType, DomainError> {
        let normalized = raw.trim().trim_start_matches('.').to_ascii_lowercase();
        let well_formed = !normalized.is_empty()
            && normalized
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        if !well_formed {
            return Err(DomainError::unsupported_type(raw));
        }
        if normalized == THEME_FILE_TYPE || self.allowed.contains(&normalized) {
            Ok(FileType(normalized))
        } else {
            Err(DomainError::unsupported_type(raw))
        }
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        let normalized = extension.to_ascii_lowercase();
        normalized == THEME_FILE_TYPE || self.allowed.contains(&normalized)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

/// Asset entry as sent by the client alongside a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub hash: String,
    pub filetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A validated reference to an uploaded asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetRef {
    pub hash: ContentHash,
    pub file_type: FileType,
    /// Client-side display name; older deployments stored assets under it.
    pub legacy_name: Option<String>,
}

impl AssetRef {
    pub fn from_descriptor(
        descriptor: &AssetDescriptor,
        policy: &FileTypePolicy,
    ) -> Result<Self, DomainError> {
        let hash = ContentHash::parse(&descriptor.hash)?;
        let file_type = policy.check(&descriptor.filetype)?;
        let legacy_name = descriptor
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| is_plain_file_name(name))
            .map(str::to_string);
        Ok(Self {
            hash,
            file_type,
            legacy_name,
        })
    }

    /// Canonical on-disk file name: `<hash>.<ext>`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.hash, self.file_type)
    }
}

/// True for a single path component without separators or dot segments.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> FileTypePolicy {
        FileTypePolicy::new(["png", "JPG", ".webp"])
    }

    #[test]
    fn content_hash_requires_lowercase_hex() {
        assert!(ContentHash::parse("0af3").is_ok());
        assert!(ContentHash::parse("0AF3").is_err());
        assert!(ContentHash::parse("").is_err());
        assert!(ContentHash::parse("../a").is_err());
    }

    #[test]
    fn policy_is_case_insensitive() {
        let policy = policy();
        assert_eq!(policy.check("PNG").expect("png").as_str(), "png");
        assert_eq!(policy.check("jpg").expect("jpg").as_str(), "jpg");
        assert_eq!(policy.check("webp").expect("webp").as_str(), "webp");
    }

    #[test]
    fn policy_rejects_unlisted_and_malformed_types() {
        let policy = policy();
        assert_eq!(
            policy.check("exe"),
            Err(DomainError::unsupported_type("exe"))
        );
        assert!(policy.check("png/../x").is_err());
        assert!(policy.check("").is_err());
    }

    #[test]
    fn theme_type_is_always_accepted() {
        let policy = FileTypePolicy::default();
        assert!(policy.check("CSS").expect("css").is_theme());
    }

    #[test]
    fn descriptor_drops_unsafe_legacy_names() {
        let descriptor = AssetDescriptor {
            hash: "abc123".to_string(),
            filetype: "png".to_string(),
            name: Some("../secret.png".to_string()),
        };
        let asset = AssetRef::from_descriptor(&descriptor, &policy()).expect("asset");
        assert_eq!(asset.legacy_name, None);
        assert_eq!(asset.file_name(), "abc123.png");
    }
}
