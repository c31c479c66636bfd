use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A prospective item surfaced by a feed or a plugin `list` call.
///
/// Plugins emit `name`, the ledger and plugin input use `title`; both are
/// accepted when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    #[serde(alias = "name")]
    pub title: String,
    pub url: String,
}

impl CandidateItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    /// Key used for the item's download directory.
    pub fn item_key(&self) -> String {
        sanitize_name(&self.title)
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedItem {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "time", with = "chrono::serde::ts_seconds")]
    pub downloaded_at: DateTime<Utc>,
}

impl DownloadedItem {
    pub fn new(item: &CandidateItem, downloaded_at: DateTime<Utc>) -> Self {
        Self {
            title: item.title.clone(),
            url: item.url.clone(),
            downloaded_at,
        }
    }
}

/// Contents of a source's `data` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerDocument {
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated: DateTime<Utc>,
    pub downloaded: Vec<DownloadedItem>,
}

/// Case-folded, whitespace-stripped title used for dedup.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Make a title usable as a single path component.
///
/// `.`, `..` and empty names would resolve outside their parent, so every
/// character is replaced.
pub fn sanitize_name(name: &str) -> String {
    let name = name.trim().replace('/', "_");
    match name.as_str() {
        "" => "_".to_string(),
        "." | ".." => "_".repeat(name.len()),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_accepts_plugin_name_field() {
        let item: CandidateItem =
            serde_json::from_str(r#"{"name": "Chapter 3", "url": "https://a/3"}"#).unwrap();
        assert_eq!(item.title, "Chapter 3");
    }

    #[test]
    fn test_candidate_serializes_title() {
        let json = serde_json::to_string(&CandidateItem::new("A", "u")).unwrap();
        assert_eq!(json, r#"{"title":"A","url":"u"}"#);
    }

    #[test]
    fn test_ledger_document_format() {
        let doc: LedgerDocument = serde_json::from_str(
            r#"{"link": "https://x", "updated": 1700000000,
                "downloaded": [{"title": "E1", "url": "https://x/1", "time": 1700000000}]}"#,
        )
        .unwrap();
        assert_eq!(doc.plugin, None);
        assert_eq!(doc.downloaded[0].downloaded_at.timestamp(), 1_700_000_000);

        let out = serde_json::to_value(&doc).unwrap();
        assert!(out.get("plugin").is_none());
        assert_eq!(out["downloaded"][0]["time"], 1_700_000_000);
    }

    #[test]
    fn test_ledger_document_rejects_missing_link() {
        let result = serde_json::from_str::<LedgerDocument>(r#"{"updated": 1, "downloaded": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Episode 5 \n"), "episode 5");
        assert_eq!(normalize_title("EPISODE 5"), normalize_title("episode 5"));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name(" Vol 1/Chapter 2 "), "Vol 1_Chapter 2");
    }

    #[test]
    fn test_sanitize_name_never_leaves_parent() {
        assert_eq!(sanitize_name(".."), "__");
        assert_eq!(sanitize_name(" . "), "_");
        assert_eq!(sanitize_name("   "), "_");
        assert_eq!(sanitize_name("../etc"), ".._etc");
        assert_eq!(sanitize_name("...and more"), "...and more");
    }
}
