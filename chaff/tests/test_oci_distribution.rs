use chaff::oci::{
    analyze_remote,
    distribution::{DockerRegistry, ManifestDocument, OciRegistryPull},
    parse_platform, AnalyzeOptions, Reference,
};
use futures::StreamExt;

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
#[ignore = "requires Docker Hub access"]
async fn test_oci_fetch_index_and_platform_manifest() -> anyhow::Result<()> {
    let reference: Reference = "alpine:3.19".parse()?;
    let registry = DockerRegistry::new(&reference);

    let document = registry
        .fetch_manifest_document("library/alpine", "3.19")
        .await?;
    assert!(matches!(document, ManifestDocument::Index(_)));

    let manifest = registry
        .fetch_image_manifest("library/alpine", "3.19", &parse_platform("linux/arm64")?)
        .await?;
    assert!(!manifest.layers().is_empty());

    Ok(())
}

#[test_log::test(tokio::test)]
#[ignore = "requires Docker Hub access"]
async fn test_oci_fetch_image_blob() -> anyhow::Result<()> {
    let reference: Reference = "alpine:3.19".parse()?;
    let registry = DockerRegistry::new(&reference);

    let manifest = registry
        .fetch_image_manifest("library/alpine", "3.19", &parse_platform("linux/amd64")?)
        .await?;
    let layer = &manifest.layers()[0];

    let mut stream = registry
        .fetch_image_blob("library/alpine", layer.digest())
        .await?;
    let mut total = 0u64;
    while let Some(chunk) = stream.next().await {
        total += chunk?.len() as u64;
    }

    assert_eq!(total, layer.size());

    Ok(())
}

#[test_log::test(tokio::test)]
#[ignore = "requires Docker Hub access"]
async fn test_oci_analyze_remote_single_layer_image() -> anyhow::Result<()> {
    let reference: Reference = "alpine:3.19".parse()?;
    let options = AnalyzeOptions::builder()
        .platform(parse_platform("linux/amd64")?)
        .build();

    let analysis = analyze_remote(&reference, &options).await?;

    // A single-layer image cannot shadow anything.
    assert_eq!(analysis.layers().len(), 1);
    assert_eq!(analysis.report().total_chaff_count(), 0);
    assert!(analysis.report().total_image_size() > 0);

    Ok(())
}
