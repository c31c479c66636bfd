use std::path::Path;

use crate::app::{AutomediaError, Result};

/// Conventional suffix of script plugins.
pub const SCRIPT_SUFFIX: &str = ".py";

/// `https://www.mangakakalot.com/manga/x` → `mangakakalot`.
pub fn url_extract_domain(url: &str) -> &str {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);

    match rest.find('.') {
        Some(end) => &rest[..end],
        None => rest,
    }
}

/// Find the plugin handling `url` in `plugin_dir`.
///
/// Returns the plugin's file name, which is what gets stored with the source.
pub fn find_plugin(plugin_dir: &Path, url: &str) -> Result<String> {
    let domain = url_extract_domain(url);
    if domain.is_empty() {
        return Err(AutomediaError::PluginNotFound(url.to_string()));
    }

    [domain.to_string(), format!("{}{}", domain, SCRIPT_SUFFIX)]
        .into_iter()
        .find(|candidate| plugin_dir.join(candidate).is_file())
        .ok_or_else(|| AutomediaError::PluginNotFound(domain.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_domain() {
        assert_eq!(url_extract_domain("https://www.example.com/a/b"), "example");
        assert_eq!(url_extract_domain("http://manganelo.com/manga/x"), "manganelo");
        assert_eq!(url_extract_domain("readms.net"), "readms");
        assert_eq!(url_extract_domain("https://localhost"), "localhost");
    }

    #[test]
    fn test_extract_domain_keeps_subdomains_other_than_www() {
        assert_eq!(url_extract_domain("https://chapmanganato.to/x"), "chapmanganato");
        assert_eq!(url_extract_domain("https://m.example.com"), "m");
    }

    #[test]
    fn test_find_plugin_prefers_bare_name() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("readms.py"), "").unwrap();
        assert_eq!(
            find_plugin(tmp.path(), "https://readms.net/manga/x").unwrap(),
            "readms.py"
        );

        std::fs::write(tmp.path().join("readms"), "").unwrap();
        assert_eq!(
            find_plugin(tmp.path(), "https://readms.net/manga/x").unwrap(),
            "readms"
        );
    }

    #[test]
    fn test_find_plugin_missing() {
        let tmp = TempDir::new().unwrap();
        let err = find_plugin(tmp.path(), "https://www.unknown.org/").unwrap_err();
        assert!(matches!(err, AutomediaError::PluginNotFound(d) if d == "unknown"));
    }
}
