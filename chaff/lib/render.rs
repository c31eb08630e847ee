//! Report rendering.

use std::fmt::Write;

use humansize::{format_size, DECIMAL};
use typed_builder::TypedBuilder;

use crate::{
    oci::{ImageAnalysis, LayerDescriptor},
    overlay::ChaffReport,
    ChaffResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Options for the text renderer.
#[derive(Debug, Default, Clone, TypedBuilder)]
pub struct RenderOptions {
    /// List only this many of the largest chaff entries.
    #[builder(default)]
    top: Option<usize>,

    /// Append a per-layer breakdown.
    #[builder(default)]
    layers: bool,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Renders a report as text.
///
/// ```text
/// ==== CHAFF REPORT ====
/// - layers: 2
/// - total chaff files: 1
/// - total chaff size: 10 B (33.33%)
/// --- a (10 B)
/// ```
///
/// Entries are listed largest first; zero-byte entries are counted in the totals but not listed.
pub fn render_report(report: &ChaffReport, options: &RenderOptions) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "==== CHAFF REPORT ====");
    let _ = writeln!(out, "- layers: {}", report.layer_count());
    let _ = writeln!(out, "- total chaff files: {}", report.total_chaff_count());
    let _ = writeln!(
        out,
        "- total chaff size: {} ({:.2}%)",
        humanize(report.total_chaff_size()),
        report.chaff_percentage()
    );

    let records = report.largest_records();
    let shown = options.top.unwrap_or(records.len());
    for record in records.iter().take(shown) {
        let _ = writeln!(out, "--- {} ({})", record.path(), humanize(record.size()));
    }

    if shown < records.len() {
        let _ = writeln!(out, "... {} more", records.len() - shown);
    }

    out
}

/// Renders an analysis as text, with the layer breakdown if requested.
pub fn render_text(analysis: &ImageAnalysis, options: &RenderOptions) -> String {
    let mut out = render_report(analysis.report(), options);

    if options.layers {
        let _ = writeln!(out, "==== LAYERS ====");
        for summary in analysis.report().layers() {
            let source = analysis
                .layers()
                .get(summary.index())
                .map(LayerDescriptor::source)
                .map(String::as_str)
                .unwrap_or("?");

            let _ = writeln!(
                out,
                "- layer {}: {} ({} entries, {}; chaff: {} files, {})",
                summary.index(),
                source,
                summary.entries(),
                humanize(summary.size()),
                summary.chaff_count(),
                humanize(summary.chaff_size()),
            );
        }
    }

    out
}

/// Renders an analysis as pretty-printed JSON. Records are unsorted and unfiltered.
pub fn render_json(analysis: &ImageAnalysis) -> ChaffResult<String> {
    Ok(serde_json::to_string_pretty(analysis)?)
}

fn humanize(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
