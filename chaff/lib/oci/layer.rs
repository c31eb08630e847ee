use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Seek},
    path::Path,
};

use futures::StreamExt;
use getset::{CopyGetters, Getters};
use oci_spec::image::Descriptor;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::{overlay::LayerEntry, ChaffError, ChaffResult};

use super::distribution::OciRegistryPull;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The first two bytes of every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// How a layer blob is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerCompression {
    /// A gzip-compressed tarball.
    Gzip,

    /// A plain tarball.
    Uncompressed,
}

/// A layer tarball read entry by entry.
pub struct LayerArchive<R: Read> {
    archive: tar::Archive<R>,
}

/// Describes where a replayed layer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters, CopyGetters)]
pub struct LayerDescriptor {
    /// The oldest-first position of the layer in the image.
    #[getset(get_copy = "pub")]
    index: usize,

    /// The layer digest, or the archive path for local layers.
    #[getset(get = "pub")]
    source: String,

    /// The media type declared by the manifest, if any.
    #[getset(get = "pub")]
    media_type: Option<String>,

    /// The compressed size of the blob in bytes.
    #[getset(get_copy = "pub")]
    size: u64,
}

/// A layer blob held in a local file, ready to be replayed.
///
/// Downloaded blobs live in an anonymous temporary file that is removed when the blob is
/// dropped.
#[derive(Debug, Getters)]
pub struct LayerBlob {
    /// What the blob is.
    #[getset(get = "pub")]
    descriptor: LayerDescriptor,

    file: File,

    compression: Option<LayerCompression>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerCompression {
    /// Derives the compression from a layer media type.
    ///
    /// Returns `Ok(None)` for media types that do not say, in which case the content is sniffed.
    pub fn from_media_type(media_type: &str) -> ChaffResult<Option<Self>> {
        if media_type.contains("zstd") {
            return Err(ChaffError::UnsupportedLayerMediaType(media_type.to_string()));
        }

        if media_type.ends_with("+gzip") || media_type.ends_with(".gzip") {
            return Ok(Some(Self::Gzip));
        }

        if media_type.ends_with(".tar") {
            return Ok(Some(Self::Uncompressed));
        }

        Ok(None)
    }

    /// Detects gzip by its magic bytes without consuming any input.
    pub fn sniff(reader: &mut impl BufRead) -> std::io::Result<Self> {
        let head = reader.fill_buf()?;
        if head.starts_with(&GZIP_MAGIC) {
            Ok(Self::Gzip)
        } else {
            Ok(Self::Uncompressed)
        }
    }
}

impl<R: Read> LayerArchive<R> {
    /// Wraps an already decompressed tar stream.
    pub fn new(reader: R) -> Self {
        Self {
            archive: tar::Archive::new(reader),
        }
    }

    /// Returns the archive's entries in archive order.
    ///
    /// The sequence is lazy and can only be walked once. Paths are taken verbatim from the
    /// headers (long-name and pax extensions included) and decoded lossily as UTF-8. Old-style
    /// archives mark directories with a regular typeflag and a trailing slash.
    pub fn entries(
        &mut self,
    ) -> ChaffResult<impl Iterator<Item = ChaffResult<LayerEntry>> + '_> {
        let entries = self.archive.entries()?;

        Ok(entries.map(|entry| -> ChaffResult<LayerEntry> {
            let entry = entry?;
            let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let entry_type = entry.header().entry_type();
            let is_directory =
                entry_type.is_dir() || (entry_type.is_file() && path.ends_with('/'));

            Ok(LayerEntry::new(path, is_directory, entry.size()))
        }))
    }
}

impl LayerArchive<Box<dyn Read>> {
    /// Opens a possibly compressed layer stream. With no compression given, the stream is
    /// sniffed.
    pub fn from_reader(
        reader: impl Read + 'static,
        compression: Option<LayerCompression>,
    ) -> ChaffResult<Self> {
        let mut reader = BufReader::new(reader);
        let compression = match compression {
            Some(compression) => compression,
            None => LayerCompression::sniff(&mut reader)?,
        };

        let reader: Box<dyn Read> = match compression {
            LayerCompression::Gzip => Box::new(flate2::bufread::MultiGzDecoder::new(reader)),
            LayerCompression::Uncompressed => Box::new(reader),
        };

        Ok(Self::new(reader))
    }
}

impl LayerDescriptor {
    /// Creates a descriptor for a local archive.
    pub fn local(index: usize, path: &Path, size: u64) -> Self {
        Self {
            index,
            source: path.display().to_string(),
            media_type: None,
            size,
        }
    }

    /// Creates a descriptor for a manifest layer.
    pub fn remote(index: usize, descriptor: &Descriptor) -> Self {
        Self {
            index,
            source: descriptor.digest().to_string(),
            media_type: Some(descriptor.media_type().to_string()),
            size: descriptor.size(),
        }
    }
}

impl LayerBlob {
    /// Wraps a local layer tarball.
    pub fn from_path(index: usize, path: &Path) -> ChaffResult<Self> {
        let file = File::open(path).map_err(|e| layer_error(e.into(), &path.display().to_string()))?;
        let size = file.metadata()?.len();

        Ok(Self {
            descriptor: LayerDescriptor::local(index, path, size),
            file,
            compression: None,
        })
    }

    /// Downloads a manifest layer into a temporary file.
    ///
    /// The compression is taken from the media type up front, so unsupported layers fail before
    /// any bytes are fetched.
    pub async fn download<R>(
        registry: &R,
        repository: &str,
        index: usize,
        descriptor: &Descriptor,
    ) -> ChaffResult<Self>
    where
        R: OciRegistryPull + Sync + ?Sized,
    {
        let compression = LayerCompression::from_media_type(&descriptor.media_type().to_string())?;
        let digest = descriptor.digest();

        let mut file = tokio::fs::File::from_std(tempfile::tempfile()?);
        let mut stream = registry.fetch_image_blob(repository, digest).await?;

        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            file.write_all(&bytes).await?;
        }

        file.flush().await?;
        tracing::debug!("downloaded layer {index}: {digest}");

        Ok(Self {
            descriptor: LayerDescriptor::remote(index, descriptor),
            file: file.into_std().await,
            compression,
        })
    }

    /// Opens the blob as an archive from its start. Blocks on file I/O.
    pub fn into_archive(mut self) -> ChaffResult<LayerArchive<Box<dyn Read>>> {
        self.file.rewind()?;
        LayerArchive::from_reader(self.file, self.compression)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Attaches the layer name to I/O errors raised while reading it.
pub(crate) fn layer_error(error: ChaffError, layer: &str) -> ChaffError {
    match error {
        ChaffError::Io(source) => ChaffError::LayerHandling {
            source,
            layer: layer.to_string(),
        },
        other => other,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
