use std::path::{Path, PathBuf};

use futures::future;
use getset::Getters;
use oci_spec::image::{Arch, Os, Platform, PlatformBuilder};
use serde::Serialize;
use typed_builder::TypedBuilder;

use crate::{
    config::{DEFAULT_PLATFORM_ARCH, DEFAULT_PLATFORM_OS},
    overlay::{ChaffReport, OverlayEngine},
    ChaffError, ChaffResult,
};

use super::{
    distribution::{DockerRegistry, OciRegistryPull},
    layer::layer_error,
    LayerBlob, LayerDescriptor, Reference,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Options for analyzing a remote image.
#[derive(Debug, Default, Clone, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct AnalyzeOptions {
    /// The platform to select from multi-platform images. Defaults to `linux/amd64` whatever the
    /// host is.
    #[builder(default, setter(strip_option))]
    platform: Option<Platform>,
}

/// The outcome of analyzing one image.
#[derive(Debug, Serialize, Getters)]
#[getset(get = "pub")]
pub struct ImageAnalysis {
    /// The image reference or archive list that was analyzed.
    source: String,

    /// The layers in oldest-first order.
    layers: Vec<LayerDescriptor>,

    /// The chaff report.
    report: ChaffReport,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AnalyzeOptions {
    /// Returns the requested platform, or [`default_platform`].
    pub fn resolved_platform(&self) -> Platform {
        self.platform.clone().unwrap_or_else(default_platform)
    }
}

impl ImageAnalysis {
    /// Consumes the analysis and returns its report.
    pub fn into_report(self) -> ChaffReport {
        self.report
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Pulls `reference` from its registry and reports its chaff.
pub async fn analyze_remote(
    reference: &Reference,
    options: &AnalyzeOptions,
) -> ChaffResult<ImageAnalysis> {
    let registry = DockerRegistry::new(reference);
    analyze_with_registry(&registry, reference, options).await
}

/// Analyzes `reference` using the given registry client.
///
/// All layer blobs are downloaded concurrently into temporary files before the replay starts,
/// since the replay needs the newest layer first and manifests list layers oldest first.
pub async fn analyze_with_registry<R>(
    registry: &R,
    reference: &Reference,
    options: &AnalyzeOptions,
) -> ChaffResult<ImageAnalysis>
where
    R: OciRegistryPull + Sync + ?Sized,
{
    let repository = reference.get_repository();
    let manifest = registry
        .fetch_image_manifest(
            repository,
            &reference.get_selector().manifest_reference(),
            &options.resolved_platform(),
        )
        .await?;

    tracing::info!(
        "pulling {} layers of {reference}",
        manifest.layers().len()
    );

    let downloads = manifest
        .layers()
        .iter()
        .enumerate()
        .map(|(index, descriptor)| LayerBlob::download(registry, repository, index, descriptor));

    let mut blobs = Vec::with_capacity(manifest.layers().len());
    for result in future::join_all(downloads).await {
        blobs.push(result?);
    }

    replay(reference.to_string(), blobs).await
}

/// Reports the chaff of local layer tarballs, given oldest layer first.
///
/// Each archive may be gzip-compressed or plain; the format is sniffed.
pub async fn analyze_archives<P>(paths: &[P]) -> ChaffResult<ImageAnalysis>
where
    P: AsRef<Path>,
{
    let paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    let source = paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let blobs = tokio::task::spawn_blocking(move || {
        paths
            .iter()
            .enumerate()
            .map(|(index, path)| LayerBlob::from_path(index, path))
            .collect::<ChaffResult<Vec<_>>>()
    })
    .await??;

    replay(source, blobs).await
}

/// Parses `os/arch[/variant]`.
pub fn parse_platform(value: &str) -> ChaffResult<Platform> {
    let parts: Vec<&str> = value.split('/').collect();
    if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
        return Err(ChaffError::InvalidPlatform(format!(
            "expected os/arch[/variant], got {value:?}"
        )));
    }

    let mut builder = PlatformBuilder::default()
        .os(Os::from(parts[0]))
        .architecture(Arch::from(parts[1]));

    if let Some(variant) = parts.get(2) {
        builder = builder.variant(variant.to_string());
    }

    Ok(builder.build()?)
}

/// Returns `linux/amd64`, the platform selected when none is requested.
pub fn default_platform() -> Platform {
    let mut platform = Platform::default();
    platform.set_os(Os::from(DEFAULT_PLATFORM_OS));
    platform.set_architecture(Arch::from(DEFAULT_PLATFORM_ARCH));
    platform
}

/// Replays blobs newest to oldest on a blocking thread.
async fn replay(source: String, blobs: Vec<LayerBlob>) -> ChaffResult<ImageAnalysis> {
    let layers: Vec<LayerDescriptor> = blobs.iter().map(|b| b.descriptor().clone()).collect();

    let report = tokio::task::spawn_blocking(move || -> ChaffResult<ChaffReport> {
        let mut engine = OverlayEngine::new();

        for blob in blobs.into_iter().rev() {
            let index = blob.descriptor().index();
            let name = blob.descriptor().source().clone();
            tracing::info!("replaying layer {index}: {name}");

            let mut archive = blob.into_archive().map_err(|e| layer_error(e, &name))?;
            let entries = archive.entries().map_err(|e| layer_error(e, &name))?;

            engine
                .try_replay_layer(index, entries)
                .map_err(|e| layer_error(e, &name))?;
        }

        Ok(engine.finish())
    })
    .await??;

    tracing::info!(
        "{source}: {} chaff entries, {} of {} bytes",
        report.total_chaff_count(),
        report.total_chaff_size(),
        report.total_image_size()
    );

    Ok(ImageAnalysis {
        source,
        layers,
        report,
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
