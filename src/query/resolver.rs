use serde::Deserialize;
use std::collections::HashMap;

/// Resolves page identifiers to human-readable titles and canonical links.
///
/// Reporters fall back to the URL stored with the record when a page no
/// longer resolves.
pub trait PageResolver: Send + Sync {
    fn title(&self, page_id: u64) -> Option<String>;
    fn permalink(&self, page_id: u64) -> Option<String>;
}

/// A known page, as listed under `[[pages]]` in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageEntry {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// In-memory page directory seeded from configuration.
#[derive(Debug, Clone, Default)]
pub struct PageDirectory {
    pages: HashMap<u64, PageEntry>,
}

impl PageDirectory {
    pub fn new(entries: &[PageEntry]) -> Self {
        let pages = entries
            .iter()
            .map(|entry| (entry.id, entry.clone()))
            .collect();
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl PageResolver for PageDirectory {
    fn title(&self, page_id: u64) -> Option<String> {
        self.pages
            .get(&page_id)
            .and_then(|p| p.title.clone())
            .filter(|t| !t.is_empty())
    }

    fn permalink(&self, page_id: u64) -> Option<String> {
        self.pages
            .get(&page_id)
            .and_then(|p| p.url.clone())
            .filter(|u| !u.is_empty())
    }
}

/// Title for display, falling back to the stored URL.
pub fn display_title(resolver: &dyn PageResolver, page_id: u64, stored_url: &str) -> String {
    resolver
        .title(page_id)
        .unwrap_or_else(|| stored_url.to_string())
}

/// Link for display, falling back to the stored URL.
pub fn display_link(resolver: &dyn PageResolver, page_id: u64, stored_url: &str) -> String {
    resolver
        .permalink(page_id)
        .unwrap_or_else(|| stored_url.to_string())
}
