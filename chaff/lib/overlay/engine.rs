use std::convert::Infallible;

use super::{
    classify, ChaffRecord, ChaffReport, Classification, LayerEntry, LayerSummary, NormalizedPath,
    OverlayState, ReportBuilder,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Replays an image's layers newest to oldest and classifies every entry as live or chaff.
///
/// The engine owns its state for exactly one run. Layers must be fed from the newest to the
/// oldest; entries within a layer in archive order. Feeding them in any other order yields a
/// report that does not describe the image.
///
/// ## Examples
///
/// ```
/// use chaff::overlay::{LayerEntry, OverlayEngine};
///
/// let mut engine = OverlayEngine::new();
/// engine.replay_layer(1, vec![LayerEntry::file(".wh.a", 0)]);
/// engine.replay_layer(0, vec![LayerEntry::file("a", 10)]);
///
/// let report = engine.finish();
/// assert_eq!(report.total_chaff_size(), 10);
/// ```
#[derive(Debug, Default)]
pub struct OverlayEngine {
    state: OverlayState,
    report: ReportBuilder,
    last_layer: Option<usize>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl OverlayEngine {
    /// Creates an engine with empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a single entry of the layer currently being replayed and applies the outcome.
    pub fn process(&mut self, layer: usize, entry: &LayerEntry) -> Classification {
        let path = NormalizedPath::new(entry.path(), entry.is_directory());
        let outcome = classify(&self.state, &path, entry);

        self.report.add_image_size(entry.size());

        match outcome {
            Classification::Chaff(size) => {
                tracing::trace!("chaff: {} ({size} bytes, layer {layer})", path.logical());
                self.report
                    .record_chaff(ChaffRecord::new(path.into_logical(), size, layer));
            }
            _ => {
                if path.is_opaque_whiteout() {
                    tracing::debug!(
                        "opaque whiteout in layer {layer} treated as a plain marker: {}",
                        entry.path()
                    );
                }

                if let Some(tombstoned) = outcome.finalizes() {
                    self.state.finalize(path.into_logical(), tombstoned);
                }
            }
        }

        outcome
    }

    /// Replays every entry of one layer. `index` is the layer's oldest-first position.
    pub fn replay_layer<I>(&mut self, index: usize, entries: I) -> LayerSummary
    where
        I: IntoIterator<Item = LayerEntry>,
    {
        match self.try_replay_layer(index, entries.into_iter().map(Ok::<_, Infallible>)) {
            Ok(summary) => summary,
            Err(never) => match never {},
        }
    }

    /// Replays one layer from a fallible entry source, stopping at the first source error.
    ///
    /// Entries classified before the error stay applied.
    pub fn try_replay_layer<I, E>(&mut self, index: usize, entries: I) -> Result<LayerSummary, E>
    where
        I: IntoIterator<Item = Result<LayerEntry, E>>,
    {
        if let Some(last) = self.last_layer {
            if index >= last {
                tracing::warn!(
                    "layer {index} replayed after layer {last}; layers must run newest to oldest"
                );
            }
        }
        self.last_layer = Some(index);

        tracing::debug!("replaying layer {index}");
        self.report.begin_layer(index);

        let result = entries.into_iter().try_for_each(|entry| {
            self.process(index, &entry?);
            Ok::<(), E>(())
        });

        let summary = self.report.end_layer().unwrap_or_default();
        result?;

        tracing::debug!(
            "layer {index}: {} entries, {} chaff ({} bytes)",
            summary.entries(),
            summary.chaff_count(),
            summary.chaff_size()
        );

        Ok(summary)
    }

    /// Returns the overlay state built so far.
    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    /// Finalizes the run and returns the report.
    pub fn finish(self) -> ChaffReport {
        self.report.finalize()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolves a full layer stack given oldest layer first.
///
/// The stack is replayed from the newest layer down.
pub fn resolve<L, I>(layers: L) -> ChaffReport
where
    L: IntoIterator<Item = I>,
    L::IntoIter: DoubleEndedIterator + ExactSizeIterator,
    I: IntoIterator<Item = LayerEntry>,
{
    let mut engine = OverlayEngine::new();
    for (index, entries) in layers.into_iter().enumerate().rev() {
        engine.replay_layer(index, entries);
    }

    engine.finish()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_whiteout_marker_populates_state_only() {
        let mut engine = OverlayEngine::new();
        let outcome = engine.process(1, &LayerEntry::file("etc/.wh.hosts", 0));
        assert_eq!(outcome, Classification::Whiteout { applied: true });
        assert_eq!(engine.state().get("etc/hosts"), Some(true));

        let report = engine.finish();
        assert_eq!(report.total_chaff_count(), 0);
        assert!(report.records().is_empty());
    }

    #[test]
    fn test_engine_try_replay_layer_stops_at_source_error() {
        let mut engine = OverlayEngine::new();
        let entries = vec![
            Ok(LayerEntry::file("a", 3)),
            Err("truncated archive"),
            Ok(LayerEntry::file("b", 4)),
        ];

        let result = engine.try_replay_layer(0, entries);
        assert_eq!(result, Err("truncated archive"));
        assert!(engine.state().contains("a"));
        assert!(!engine.state().contains("b"));

        let report = engine.finish();
        assert_eq!(report.total_image_size(), 3);
        assert_eq!(report.layer_count(), 1);
    }

    #[test]
    fn test_engine_replay_layer_summary() {
        let mut engine = OverlayEngine::new();
        engine.replay_layer(1, vec![LayerEntry::file("a", 20)]);
        let summary = engine.replay_layer(
            0,
            vec![LayerEntry::file("a", 10), LayerEntry::file("b", 5)],
        );

        assert_eq!(summary.index(), 0);
        assert_eq!(summary.entries(), 2);
        assert_eq!(summary.size(), 15);
        assert_eq!(summary.chaff_count(), 1);
        assert_eq!(summary.chaff_size(), 10);
    }

    #[test]
    fn test_engine_resolve_replays_newest_first() {
        let report = resolve(vec![
            vec![LayerEntry::file("a", 10)],
            vec![LayerEntry::file("a", 20)],
        ]);

        assert_eq!(report.records(), &vec![ChaffRecord::new("a", 10, 0)]);
        assert_eq!(report.total_image_size(), 30);
        assert_eq!(report.layers()[0].index(), 0);
        assert_eq!(report.layers()[1].index(), 1);
    }
}
