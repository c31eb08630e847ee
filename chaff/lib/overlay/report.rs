use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A shipped entry that the merged filesystem can never reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct ChaffRecord {
    /// The logical path of the entry.
    #[getset(get = "pub")]
    path: String,

    /// The wasted byte count.
    #[getset(get_copy = "pub")]
    size: u64,

    /// The oldest-first index of the layer that shipped the entry.
    #[getset(get_copy = "pub")]
    layer: usize,
}

/// Totals for a single replayed layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct LayerSummary {
    /// The oldest-first index of the layer.
    index: usize,

    /// The number of entries in the layer.
    entries: usize,

    /// The summed size of every entry in the layer.
    size: u64,

    /// The number of entries in the layer classified as chaff.
    chaff_count: usize,

    /// The summed size of the layer's chaff entries.
    chaff_size: u64,
}

/// The finalized result of one replay. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct ChaffReport {
    /// The number of chaff entries, zero-byte entries included.
    #[getset(get_copy = "pub")]
    total_chaff_count: usize,

    /// The summed size of all chaff entries.
    #[getset(get_copy = "pub")]
    total_chaff_size: u64,

    /// The summed size of every entry seen, chaff or not.
    #[getset(get_copy = "pub")]
    total_image_size: u64,

    /// Chaff records in replay order.
    #[getset(get = "pub")]
    records: Vec<ChaffRecord>,

    /// Per-layer totals, oldest layer first.
    #[getset(get = "pub")]
    layers: Vec<LayerSummary>,
}

/// Accumulates a [`ChaffReport`] during a replay.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report: ChaffReport,
    current: Option<LayerSummary>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ChaffRecord {
    /// Creates a new record.
    pub fn new(path: impl Into<String>, size: u64, layer: usize) -> Self {
        Self {
            path: path.into(),
            size,
            layer,
        }
    }
}

impl LayerSummary {
    fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }
}

impl ChaffReport {
    /// Returns the number of layers replayed.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Returns the chaff size as a percentage of the image size, or 0 for an empty image.
    pub fn chaff_percentage(&self) -> f64 {
        if self.total_image_size == 0 {
            return 0.0;
        }

        self.total_chaff_size as f64 * 100.0 / self.total_image_size as f64
    }

    /// Returns the non-empty chaff records, largest first. Ties keep replay order.
    pub fn largest_records(&self) -> Vec<&ChaffRecord> {
        let mut records: Vec<_> = self.records.iter().filter(|r| r.size > 0).collect();
        records.sort_by(|a, b| b.size.cmp(&a.size));
        records
    }
}

impl ReportBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts accounting for a new layer, closing the previous one.
    pub fn begin_layer(&mut self, index: usize) {
        self.end_layer();
        self.current = Some(LayerSummary::new(index));
    }

    /// Closes the current layer, if any, and returns its summary.
    pub fn end_layer(&mut self) -> Option<LayerSummary> {
        let summary = self.current.take()?;
        self.report.layers.push(summary.clone());
        Some(summary)
    }

    /// Adds an entry's size to the running image total.
    pub fn add_image_size(&mut self, size: u64) {
        self.report.total_image_size += size;
        if let Some(layer) = self.current.as_mut() {
            layer.entries += 1;
            layer.size += size;
        }
    }

    /// Appends a chaff record and updates the chaff totals.
    pub fn record_chaff(&mut self, record: ChaffRecord) {
        self.report.total_chaff_count += 1;
        self.report.total_chaff_size += record.size;
        if let Some(layer) = self.current.as_mut() {
            layer.chaff_count += 1;
            layer.chaff_size += record.size;
        }
        self.report.records.push(record);
    }

    /// Freezes the builder into a report. Layers are ordered oldest first.
    pub fn finalize(mut self) -> ChaffReport {
        self.end_layer();
        self.report.layers.sort_by_key(|layer| layer.index);
        self.report
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
