//! Category and group facets over the article list.
//!
//! Everything here is a pure derivation from `(records, selection)`. The
//! [`Catalog`] wrapper memoises the last filter result, but every answer it
//! gives is identical to calling [`filter_articles`] directly.
//!
//! # Facet semantics
//!
//! | Selection | Matches |
//! |-----------|---------|
//! | `all` / `all` | every record |
//! | `C` / `all` | `category == C` |
//! | `all` / `G` | `group == Some(G)` |
//! | `C` / `G` | both, conjunctively |

use std::collections::BTreeSet;

use crate::models::{ArticleRecord, FacetSelection, ALL};

/// `["all"]` followed by every distinct category, sorted.
pub fn distinct_categories(records: &[ArticleRecord]) -> Vec<String> {
    with_all(records.iter().map(|r| r.category.as_str()))
}

/// `["all"]` followed by every distinct group, sorted.
///
/// Records without a group contribute nothing here.
pub fn distinct_groups(records: &[ArticleRecord]) -> Vec<String> {
    with_all(records.iter().filter_map(|r| r.group.as_deref()))
}

fn with_all<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    // A record literally categorised "all" would otherwise appear twice.
    let unique: BTreeSet<&str> = values.filter(|v| *v != ALL).collect();
    std::iter::once(ALL)
        .chain(unique)
        .map(str::to_string)
        .collect()
}

/// Returns whether `record` satisfies both facets of `selection`.
pub fn matches(record: &ArticleRecord, selection: &FacetSelection) -> bool {
    let category_ok = selection.category == ALL || record.category == selection.category;
    let group_ok = selection.group == ALL || record.group.as_deref() == Some(&selection.group);
    category_ok && group_ok
}

/// Records matching `selection`, in input order.
pub fn filter_articles<'a>(
    records: &'a [ArticleRecord],
    selection: &FacetSelection,
) -> Vec<&'a ArticleRecord> {
    records.iter().filter(|r| matches(r, selection)).collect()
}

/// Result of asking a [`Catalog`] what to display.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome<'a> {
    /// No article list has been supplied yet.
    NotLoaded,
    /// Articles are loaded but none match the selection.
    Empty,
    Matches(Vec<&'a ArticleRecord>),
}

impl FilterOutcome<'_> {
    pub fn len(&self) -> usize {
        match self {
            FilterOutcome::Matches(m) => m.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Article listing state owned by the view layer.
#[derive(Debug, Default)]
pub struct Catalog {
    records: Option<Vec<ArticleRecord>>,
    selection: FacetSelection,
    generation: u64,
    memo: Option<Memo>,
}

#[derive(Debug)]
struct Memo {
    generation: u64,
    selection: FacetSelection,
    indices: Vec<usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the article list. The current selection is kept.
    pub fn load(&mut self, records: Vec<ArticleRecord>) {
        self.records = Some(records);
        self.generation += 1;
    }

    pub fn is_loaded(&self) -> bool {
        self.records.is_some()
    }

    pub fn records(&self) -> &[ArticleRecord] {
        self.records.as_deref().unwrap_or(&[])
    }

    pub fn selection(&self) -> &FacetSelection {
        &self.selection
    }

    pub fn select(&mut self, selection: FacetSelection) {
        self.selection = selection;
    }

    pub fn select_category(&mut self, category: impl Into<String>) {
        self.selection.category = category.into();
    }

    pub fn select_group(&mut self, group: impl Into<String>) {
        self.selection.group = group.into();
    }

    pub fn categories(&self) -> Vec<String> {
        distinct_categories(self.records())
    }

    pub fn groups(&self) -> Vec<String> {
        distinct_groups(self.records())
    }

    /// The records to display for the current selection.
    pub fn visible(&mut self) -> FilterOutcome<'_> {
        let Some(records) = self.records.as_deref() else {
            return FilterOutcome::NotLoaded;
        };

        let fresh = matches!(
            &self.memo,
            Some(m) if m.generation == self.generation && m.selection == self.selection
        );
        if !fresh {
            let indices = records
                .iter()
                .enumerate()
                .filter(|(_, r)| matches(r, &self.selection))
                .map(|(i, _)| i)
                .collect();
            self.memo = Some(Memo {
                generation: self.generation,
                selection: self.selection.clone(),
                indices,
            });
        }

        let indices = self.memo.as_ref().map(|m| m.indices.as_slice()).unwrap_or(&[]);
        if indices.is_empty() {
            FilterOutcome::Empty
        } else {
            FilterOutcome::Matches(indices.iter().map(|&i| &records[i]).collect())
        }
    }
}
