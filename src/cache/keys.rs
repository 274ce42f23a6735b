//! Cache key definitions.
//!
//! Keys are plain strings of the form `<op>:<args>` so that related entries
//! can be dropped together by prefix (for example every `static:notes/<id>/`
//! file when a note's asset directory is removed).

use std::fmt;

/// Operation name for memoized note documents.
pub const NOTE_OP: &str = "note";
/// Operation name for the memoized document tree.
pub const DOC_TREE_OP: &str = "docTree";
/// Operation name for memoized static files.
pub const STATIC_OP: &str = "static";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for an operation and the rendering of its arguments.
    pub fn call(op: &str, args: &str) -> Self {
        if args.is_empty() {
            Self(op.to_string())
        } else {
            Self(format!("{op}:{args}"))
        }
    }

    pub fn note(identifier: &str) -> Self {
        Self::call(NOTE_OP, identifier)
    }

    pub fn doc_tree() -> Self {
        Self::call(DOC_TREE_OP, "")
    }

    /// Key for a file addressed relative to the storage root.
    pub fn static_file(relative_path: &str) -> Self {
        Self::call(STATIC_OP, relative_path)
    }

    /// Prefix covering every static file below `relative_dir`.
    pub fn static_prefix(relative_dir: &str) -> String {
        let trimmed = relative_dir.trim_end_matches('/');
        format!("{STATIC_OP}:{trimmed}/")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_op_args_layout() {
        assert_eq!(CacheKey::note("hello-abc123").as_str(), "note:hello-abc123");
        assert_eq!(CacheKey::doc_tree().as_str(), "docTree");
        assert_eq!(
            CacheKey::static_file("notes/a/assets/f.png").as_str(),
            "static:notes/a/assets/f.png"
        );
    }

    #[test]
    fn static_prefix_covers_nested_files() {
        let prefix = CacheKey::static_prefix("notes/a/");
        assert_eq!(prefix, "static:notes/a/");
        assert!(
            CacheKey::static_file("notes/a/assets/f.png")
                .as_str()
                .starts_with(&prefix)
        );
        assert!(
            !CacheKey::static_file("notes/ab/assets/f.png")
                .as_str()
                .starts_with(&prefix)
        );
    }
}
