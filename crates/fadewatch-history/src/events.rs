use std::collections::BTreeMap;

use fadewatch_types::{fading::FadingCategory, sample::ClassifiedSample};

/// Indices of log entries that received a fading category.
#[derive(Debug, Clone, Default)]
pub struct EventIndex {
    indices: Vec<usize>,
    counts: BTreeMap<FadingCategory, usize>,
}

impl EventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the index from a full log.
    pub fn rebuild(entries: &[ClassifiedSample]) -> Self {
        let mut index = Self::new();
        for (position, entry) in entries.iter().enumerate() {
            index.observe(position, entry.category);
        }
        index
    }

    pub fn observe(&mut self, log_index: usize, category: Option<FadingCategory>) {
        if let Some(category) = category {
            self.indices.push(log_index);
            *self.counts.entry(category).or_default() += 1;
        }
    }

    /// The last `n` event indices, oldest first.
    pub fn recent(&self, n: usize) -> &[usize] {
        let start = self.indices.len().saturating_sub(n);
        &self.indices[start..]
    }

    pub fn count_by_category(&self) -> BTreeMap<FadingCategory, usize> {
        self.counts.clone()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.indices = Vec::new();
        self.counts = BTreeMap::new();
    }
}
