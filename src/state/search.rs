use super::data::{EntryId, GeoEntry};
use super::index::EntryIndex;

/// Queries must be longer than this before suggestions show up
pub const DEFAULT_MIN_QUERY_CHARS: usize = 3;

/// Entries whose title contains `query`, ignoring case.
/// Empty unless the query is longer than `min_chars` characters.
pub fn suggest<'a>(query: &str, entries: &'a [GeoEntry], min_chars: usize) -> Vec<&'a GeoEntry> {
    if query.chars().count() <= min_chars {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    entries
        .iter()
        .filter(|entry| entry.title.to_lowercase().contains(&needle))
        .collect()
}

/// Search box state over the entry index.
///
/// Two tiers run on every query change: the length gated substring filter
/// produces suggestions, then an exact title match (any length) clears them
/// and commits to that entry.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    query: String,
    suggestions: Vec<EntryId>,
    min_chars: usize,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_QUERY_CHARS)
    }
}

impl SearchFilter {
    pub fn new(min_chars: usize) -> Self {
        Self {
            query: String::new(),
            suggestions: Vec::new(),
            min_chars,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn suggestion_ids(&self) -> &[EntryId] {
        &self.suggestions
    }

    /// Suggestions resolved against the current index. Ids that vanished
    /// with a newer snapshot are dropped.
    pub fn suggestions<'a>(&self, index: &'a EntryIndex) -> Vec<&'a GeoEntry> {
        self.suggestions
            .iter()
            .filter_map(|id| index.get(id))
            .collect()
    }

    /// Update the query text. Returns the exact match to navigate to, if any.
    pub fn set_query(&mut self, query: impl Into<String>, index: &EntryIndex) -> Option<EntryId> {
        self.query = query.into();
        self.refresh(index)
    }

    /// Re-run both tiers for the current query, e.g. after a new snapshot
    pub fn refresh(&mut self, index: &EntryIndex) -> Option<EntryId> {
        self.suggestions = suggest(&self.query, index.entries(), self.min_chars)
            .into_iter()
            .map(|entry| entry.id.clone())
            .collect();

        let exact = index.find_by_title(&self.query)?;
        self.suggestions.clear();
        Some(exact.id.clone())
    }

    /// A suggestion was picked: the query becomes its title and the
    /// dropdown closes. Returns the id to navigate to, or `None` when the
    /// entry is no longer in the index.
    pub fn choose(&mut self, id: &EntryId, index: &EntryIndex) -> Option<EntryId> {
        let entry = index.get(id)?;
        self.query = entry.title.clone();
        self.suggestions.clear();
        Some(entry.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::index::tests::cities;

    fn titles(filter: &SearchFilter, index: &EntryIndex) -> Vec<String> {
        filter
            .suggestions(index)
            .into_iter()
            .map(|entry| entry.title.clone())
            .collect()
    }

    #[test]
    fn test_short_queries_suggest_nothing() {
        let index = cities();
        for query in ["", "L", "Lo", "Los", "new"] {
            assert!(suggest(query, index.entries(), 3).is_empty(), "{query}");
        }
    }

    #[test]
    fn test_substring_suggestions() {
        let index = cities();
        let mut filter = SearchFilter::default();

        assert_eq!(filter.set_query("Lo", &index), None);
        assert!(filter.suggestion_ids().is_empty());

        assert_eq!(filter.set_query("Los A", &index), None);
        assert_eq!(titles(&filter, &index), vec!["Los Angeles"]);
    }

    #[test]
    fn test_substring_matches_anywhere_in_title() {
        let index = cities();
        let mut filter = SearchFilter::default();

        filter.set_query("ANCI", &index);

        assert_eq!(titles(&filter, &index), vec!["San Francisco"]);
    }

    #[test]
    fn test_exact_match_clears_suggestions() {
        let index = cities();
        let mut filter = SearchFilter::default();

        let exact = filter.set_query("san francisco", &index);

        assert_eq!(exact, Some(EntryId::new("1")));
        assert!(filter.suggestion_ids().is_empty());
    }

    #[test]
    fn test_exact_match_ignores_length_gate() {
        let mut entries = cities().entries().to_vec();
        entries[0].title = "Ela".into();
        let index = EntryIndex::from_entries(entries);
        let mut filter = SearchFilter::default();

        assert_eq!(filter.set_query("ela", &index), Some(EntryId::new("1")));
    }

    #[test]
    fn test_choose_sets_query_and_clears() {
        let index = cities();
        let mut filter = SearchFilter::default();
        filter.set_query("Chic", &index);
        assert_eq!(filter.suggestion_ids().len(), 1);

        let chosen = filter.choose(&EntryId::new("4"), &index);

        assert_eq!(chosen, Some(EntryId::new("4")));
        assert_eq!(filter.query(), "Chicago");
        assert!(filter.suggestion_ids().is_empty());
    }

    #[test]
    fn test_choose_missing_entry() {
        let index = cities();
        let mut filter = SearchFilter::default();

        assert_eq!(filter.choose(&EntryId::new("99"), &index), None);
        assert_eq!(filter.query(), "");
    }

    #[test]
    fn test_refresh_follows_new_snapshot() {
        let index = cities();
        let mut filter = SearchFilter::default();
        filter.set_query("Hous", &index);
        assert_eq!(filter.suggestion_ids().len(), 1);

        let emptied = EntryIndex::new();
        assert_eq!(filter.refresh(&emptied), None);
        assert!(filter.suggestions(&emptied).is_empty());
    }
}
