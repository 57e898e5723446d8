use serde::Deserialize;

use crate::view::BacklogRow;

/// Row models that can be matched by free-text search.
pub trait Searchable {
    /// Every displayed field, in column order.
    fn fields(&self) -> Vec<&str>;

    fn matches(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.fields()
            .iter()
            .any(|f| f.to_lowercase().contains(&needle))
    }
}

/// Global search. An empty term keeps every row.
pub fn search_rows<'a, T: Searchable>(rows: &'a [T], term: &str) -> Vec<&'a T> {
    rows.iter().filter(|r| r.matches(term)).collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BacklogFilter {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub status: String,
}

fn label_matches(label: &str, wanted: &str) -> bool {
    let wanted = wanted.trim();
    wanted.is_empty() || label.to_lowercase().contains(&wanted.to_lowercase())
}

pub fn filter_backlog<'a>(rows: &'a [BacklogRow], filter: &BacklogFilter) -> Vec<&'a BacklogRow> {
    rows.iter()
        .filter(|r| {
            r.matches(&filter.search)
                && label_matches(&r.priority_label, &filter.priority)
                && label_matches(&r.status_label, &filter.status)
        })
        .collect()
}
