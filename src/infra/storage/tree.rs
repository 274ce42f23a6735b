//! Document tree shown by the reader sidebar.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<title>(.*?)</title>").expect("title pattern is valid"));

/// A stored document as seen by the tree builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntry {
    pub identifier: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocTreeNode {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub is_folder: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocTreeNode>,
}

impl DocTreeNode {
    fn document(title: &str, identifier: &str) -> Self {
        Self {
            title: title.to_string(),
            url: Some(format!("/{identifier}")),
            is_folder: false,
            children: Vec::new(),
        }
    }

    fn folder(title: &str) -> Self {
        Self {
            title: title.to_string(),
            url: None,
            is_folder: true,
            children: Vec::new(),
        }
    }
}

/// Title of a rendered document, falling back to `None` when it has none.
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_PATTERN
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|title| unescape_html(title.as_str()))
}

/// Arrange documents into folders by splitting titles on `/`.
///
/// Order of `entries` is preserved within each level; folders appear where
/// their first member does.
pub fn organize(entries: &[DocEntry]) -> Vec<DocTreeNode> {
    let mut tree = Vec::new();
    for entry in entries {
        let segments: Vec<&str> = entry.title.split('/').collect();
        insert(&mut tree, &segments, &entry.identifier);
    }
    tree
}

fn insert(level: &mut Vec<DocTreeNode>, segments: &[&str], identifier: &str) {
    match segments {
        [] => {}
        [leaf] => level.push(DocTreeNode::document(leaf, identifier)),
        [folder, rest @ ..] => {
            let position = level
                .iter()
                .position(|node| node.is_folder && node.title == *folder);
            let index = match position {
                Some(index) => index,
                None => {
                    level.push(DocTreeNode::folder(folder));
                    level.len() - 1
                }
            };
            insert(&mut level[index].children, rest, identifier);
        }
    }
}

fn unescape_html(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(identifier: &str, title: &str) -> DocEntry {
        DocEntry {
            identifier: identifier.to_string(),
            title: title.to_string(),
        }
    }

    #[test]
    fn flat_titles_stay_at_root() {
        let tree = organize(&[entry("index", "Home"), entry("a-111111", "Alpha")]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].url.as_deref(), Some("/index"));
        assert!(!tree[1].is_folder);
    }

    #[test]
    fn slashes_create_shared_folders() {
        let tree = organize(&[
            entry("x-111111", "Work/Plans/Q1"),
            entry("y-222222", "Work/Notes"),
            entry("z-333333", "Loose"),
        ]);

        assert_eq!(tree.len(), 2);
        let work = &tree[0];
        assert!(work.is_folder);
        assert_eq!(work.title, "Work");
        assert_eq!(work.children.len(), 2);

        let plans = &work.children[0];
        assert!(plans.is_folder);
        assert_eq!(plans.children[0].title, "Q1");
        assert_eq!(plans.children[0].url.as_deref(), Some("/x-111111"));

        assert_eq!(work.children[1].title, "Notes");
        assert_eq!(tree[1].title, "Loose");
    }

    #[test]
    fn serializes_with_camel_case_folder_flag() {
        let tree = organize(&[entry("x-111111", "Work/Q1")]);
        let json = serde_json::to_value(&tree).expect("json");
        assert_eq!(json[0]["isFolder"], true);
        assert_eq!(json[0]["children"][0]["url"], "/x-111111");
        assert!(json[0]["children"][0].get("children").is_none());
    }

    #[test]
    fn title_is_extracted_and_unescaped() {
        let html = "<html><head><title>Tom &amp; Jerry</title></head></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Tom & Jerry"));
        assert_eq!(extract_title("<p>no head</p>"), None);
    }
}
