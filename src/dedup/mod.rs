//! Decides which fetched items are new.
//!
//! Candidates arrive newest first. The scan stops at the first candidate the
//! ledger already knows, by normalized title or by URL, and everything above
//! it is returned oldest first, the order downloads are requested in.

use std::collections::HashSet;

use crate::domain::{normalize_title, CandidateItem, DownloadedItem};

/// Lookup sets built from a source's ledger.
#[derive(Debug, Default)]
pub struct SeenIndex {
    titles: HashSet<String>,
    urls: HashSet<String>,
}

impl SeenIndex {
    pub fn from_ledger(ledger: &[DownloadedItem]) -> Self {
        let mut index = Self::default();
        for entry in ledger {
            index.titles.insert(normalize_title(&entry.title));
            // Seeds from legacy sources carry no URL
            if !entry.url.is_empty() {
                index.urls.insert(entry.url.clone());
            }
        }
        index
    }

    pub fn contains(&self, item: &CandidateItem) -> bool {
        self.titles.contains(&normalize_title(&item.title))
            || (!item.url.is_empty() && self.urls.contains(&item.url))
    }
}

/// Items newer than anything in `ledger`, oldest first.
pub fn new_items(candidates: &[CandidateItem], ledger: &[DownloadedItem]) -> Vec<CandidateItem> {
    let index = SeenIndex::from_ledger(ledger);
    let mut fresh: Vec<CandidateItem> = candidates
        .iter()
        .take_while(|item| !index.contains(item))
        .cloned()
        .collect();
    fresh.reverse();
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(title: &str) -> CandidateItem {
        CandidateItem::new(title, format!("https://example.com/{}", title))
    }

    fn ledger(titles: &[&str]) -> Vec<DownloadedItem> {
        titles
            .iter()
            .map(|t| DownloadedItem::new(&item(t), Utc::now()))
            .collect()
    }

    fn titles(items: &[CandidateItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn test_returns_unseen_oldest_first() {
        let candidates = vec![item("E"), item("D"), item("C"), item("B"), item("A")];
        let fresh = new_items(&candidates, &ledger(&["A", "B", "C"]));
        assert_eq!(titles(&fresh), vec!["D", "E"]);
    }

    #[test]
    fn test_nothing_new() {
        let candidates = vec![item("C"), item("B")];
        assert!(new_items(&candidates, &ledger(&["A", "B", "C"])).is_empty());
    }

    #[test]
    fn test_empty_ledger_takes_everything() {
        let candidates = vec![item("C"), item("B"), item("A")];
        let fresh = new_items(&candidates, &[]);
        assert_eq!(titles(&fresh), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_stops_at_first_known_even_if_older_are_unknown() {
        // X was never downloaded but sits below a known item
        let candidates = vec![item("D"), item("C"), item("X")];
        let fresh = new_items(&candidates, &ledger(&["C"]));
        assert_eq!(titles(&fresh), vec!["D"]);
    }

    #[test]
    fn test_url_match_with_renamed_title() {
        let known = ledger(&["C"]);
        let renamed = CandidateItem::new("C - The Finale", "https://example.com/C");
        let candidates = vec![item("D"), renamed];
        assert_eq!(titles(&new_items(&candidates, &known)), vec!["D"]);
    }

    #[test]
    fn test_title_match_with_moved_url() {
        let known = ledger(&["Chapter 3"]);
        let moved = CandidateItem::new("  chapter 3 ", "https://mirror.example.com/3");
        let candidates = vec![item("Chapter 4"), moved];
        assert_eq!(titles(&new_items(&candidates, &known)), vec!["Chapter 4"]);
    }

    #[test]
    fn test_empty_urls_never_match() {
        let known = vec![DownloadedItem {
            title: "Seed".into(),
            url: String::new(),
            downloaded_at: Utc::now(),
        }];
        let candidates = vec![CandidateItem::new("New", ""), CandidateItem::new("Seed", "")];
        assert_eq!(titles(&new_items(&candidates, &known)), vec!["New"]);
    }
}
