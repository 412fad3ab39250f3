//! Settings registry - ordered, lazily built settings pages
//!
//! Pages are registered as factories and only built when the settings dialog
//! is opened, so each page shows the application state at open time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::PageOwner;

/// A panel in the settings dialog
pub trait SettingsPage: Send {
    fn title(&self) -> String;

    /// Label/value rows shown on the page
    fn fields(&self) -> Vec<(String, String)>;
}

/// Deferred page constructor
pub type PageFactory = Arc<dyn Fn() -> Box<dyn SettingsPage> + Send + Sync>;

/// Identity of one registration; duplicate categories are told apart by this
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(u64);

struct PageEntry {
    id: PageId,
    priority: i32,
    category: String,
    owner: PageOwner,
    factory: PageFactory,
}

/// Ordered collection of settings page factories
#[derive(Default)]
pub struct SettingsRegistry {
    entries: Mutex<Vec<PageEntry>>,
    next_id: AtomicU64,
}

/// Registration info without building the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub id: PageId,
    pub priority: i32,
    pub category: String,
    pub owner: PageOwner,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a page factory at `priority`.
    ///
    /// Lower priorities come first; among equal priorities, earlier
    /// registrations come first.
    pub fn add_page<F>(
        &self,
        priority: i32,
        category: impl Into<String>,
        owner: PageOwner,
        factory: F,
    ) -> PageId
    where
        F: Fn() -> Box<dyn SettingsPage> + Send + Sync + 'static,
    {
        let id = PageId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = PageEntry {
            id,
            priority,
            category: category.into(),
            owner,
            factory: Arc::new(factory),
        };

        if let Ok(mut entries) = self.entries.lock() {
            let at = entries.partition_point(|e| e.priority <= priority);
            entries.insert(at, entry);
        }
        id
    }

    /// Build pages in display order.
    ///
    /// The registry is snapshotted when called and factories run as the
    /// iterator advances. Call again to see later registrations.
    pub fn pages(&self) -> impl Iterator<Item = (String, Box<dyn SettingsPage>)> {
        let snapshot: Vec<(String, PageFactory)> = self
            .entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| (e.category.clone(), Arc::clone(&e.factory)))
                    .collect()
            })
            .unwrap_or_default();

        snapshot
            .into_iter()
            .map(|(category, factory)| (category, factory()))
    }

    /// Registrations in display order, without invoking any factory
    pub fn entries(&self) -> Vec<PageInfo> {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| PageInfo {
                        id: e.id,
                        priority: e.priority,
                        category: e.category.clone(),
                        owner: e.owner.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Category labels in display order
    pub fn categories(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.category).collect()
    }

    /// Remove every page registered by `owner`; returns how many were removed
    pub fn remove_pages_of(&self, owner: &PageOwner) -> usize {
        match self.entries.lock() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|e| &e.owner != owner);
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Simple page of fixed rows, handy for plugins with static settings
pub struct StaticPage {
    title: String,
    fields: Vec<(String, String)>,
}

impl StaticPage {
    pub fn new(title: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            title: title.into(),
            fields,
        }
    }
}

impl SettingsPage for StaticPage {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn fields(&self) -> Vec<(String, String)> {
        self.fields.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn page(title: &str) -> Box<dyn SettingsPage> {
        Box::new(StaticPage::new(title, Vec::new()))
    }

    fn titles(registry: &SettingsRegistry) -> Vec<String> {
        registry.pages().map(|(_, p)| p.title()).collect()
    }

    #[test]
    fn test_ordered_by_priority_then_insertion() {
        let registry = SettingsRegistry::new();
        registry.add_page(10, "b", PageOwner::Shell, || page("b1"));
        registry.add_page(0, "a", PageOwner::Shell, || page("a1"));
        registry.add_page(10, "b", PageOwner::Shell, || page("b2"));
        registry.add_page(5, "c", PageOwner::Shell, || page("c1"));
        registry.add_page(0, "a", PageOwner::Shell, || page("a2"));

        assert_eq!(titles(&registry), vec!["a1", "a2", "c1", "b1", "b2"]);
    }

    #[test]
    fn test_factories_run_lazily_and_each_walk() {
        let registry = SettingsRegistry::new();
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        registry.add_page(0, "net", PageOwner::Shell, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            page("net")
        });

        assert_eq!(built.load(Ordering::SeqCst), 0);
        let mut pages = registry.pages();
        assert_eq!(built.load(Ordering::SeqCst), 0);
        pages.next();
        assert_eq!(built.load(Ordering::SeqCst), 1);

        assert_eq!(registry.pages().count(), 1);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_restartable_reflects_mutation() {
        let registry = SettingsRegistry::new();
        registry.add_page(0, "a", PageOwner::Shell, || page("a"));
        assert_eq!(registry.pages().count(), 1);

        registry.add_page(1, "b", PageOwner::Shell, || page("b"));
        assert_eq!(registry.pages().count(), 2);
    }

    #[test]
    fn test_remove_pages_of_owner_only() {
        let registry = SettingsRegistry::new();
        registry.add_page(0, "shell", PageOwner::Shell, || page("s1"));
        registry.add_page(1, "x", PageOwner::plugin("x"), || page("x1"));
        registry.add_page(1, "y", PageOwner::plugin("y"), || page("y1"));
        registry.add_page(2, "shell", PageOwner::Shell, || page("s2"));
        registry.add_page(3, "x", PageOwner::plugin("x"), || page("x2"));

        assert_eq!(registry.remove_pages_of(&PageOwner::plugin("x")), 2);
        assert_eq!(titles(&registry), vec!["s1", "y1", "s2"]);
        assert_eq!(registry.remove_pages_of(&PageOwner::plugin("x")), 0);
    }

    #[test]
    fn test_duplicate_categories_are_distinct_entries() {
        let registry = SettingsRegistry::new();
        let a = registry.add_page(0, "General", PageOwner::Shell, || page("one"));
        let b = registry.add_page(0, "General", PageOwner::Shell, || page("two"));
        assert_ne!(a, b);
        assert_eq!(registry.categories(), vec!["General", "General"]);
    }

    #[test]
    fn test_negative_and_large_priorities() {
        let registry = SettingsRegistry::new();
        registry.add_page(i32::MAX, "last", PageOwner::Shell, || page("last"));
        registry.add_page(i32::MIN, "first", PageOwner::Shell, || page("first"));
        assert_eq!(titles(&registry), vec!["first", "last"]);
    }
}
