use fadewatch_types::{
    export::ExportRow,
    fading::FadingCategory,
    sample::{ClassifiedSample, Sample},
};

/// Arrival-ordered record of every classified sample in a session.
#[derive(Debug, Clone, Default)]
pub struct SampleLog {
    entries: Vec<ClassifiedSample>,
}

impl SampleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry and returns its index.
    pub fn append(
        &mut self,
        sample: Sample,
        category: Option<FadingCategory>,
        delta: f64,
    ) -> usize {
        self.entries.push(ClassifiedSample {
            sample,
            category,
            delta,
        });
        self.entries.len() - 1
    }

    /// The last `min(n, len)` entries, oldest first.
    pub fn tail(&self, n: usize) -> &[ClassifiedSample] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Entries in `start..end`, with both bounds clamped to the log.
    pub fn window(&self, start: usize, end: usize) -> &[ClassifiedSample] {
        let end = end.min(self.entries.len());
        let start = start.min(end);
        &self.entries[start..end]
    }

    /// Rssi values of the last `n` entries, oldest first.
    pub fn tail_rssi(&self, n: usize) -> Vec<f64> {
        self.tail(n).iter().map(ClassifiedSample::rssi).collect()
    }

    pub fn get(&self, index: usize) -> Option<&ClassifiedSample> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&ClassifiedSample> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn export_rows(&self) -> Vec<ExportRow> {
        self.entries.iter().map(ExportRow::from).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries = Vec::new();
    }
}
