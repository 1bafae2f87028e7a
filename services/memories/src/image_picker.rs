//! Image acquisition: ask the host for a photo and normalize it.
//!
//! Whatever the host hands back (content handles, HEIC, oversized PNGs) is
//! decoded, narrowed to at most `max_width` pixels and re-encoded as JPEG into
//! the output directory, so the upload stage always receives a plain
//! `file://` URI with a bounded size.

use crate::config::ImageConfig;
use crate::error::{Error, Result};
use crate::storage::resolve_local_path;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

/// Answer to a media library permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// One asset returned by the host picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedAsset {
    /// Host reference to the asset, if it exposes one
    pub uri: Option<String>,
}

/// Result of presenting the picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Canceled,
    Selected(Vec<PickedAsset>),
}

/// Platform image selection capability.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn request_permission(&self) -> Result<PermissionStatus>;

    async fn launch_picker(&self) -> Result<PickerOutcome>;
}

/// Media library backed by a path chosen up front (command line, tests).
#[derive(Debug, Clone, Default)]
pub struct PathLibrary {
    path: Option<PathBuf>,
}

impl PathLibrary {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl MediaLibrary for PathLibrary {
    async fn request_permission(&self) -> Result<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }

    async fn launch_picker(&self) -> Result<PickerOutcome> {
        Ok(match &self.path {
            Some(path) => PickerOutcome::Selected(vec![PickedAsset {
                uri: Some(path.display().to_string()),
            }]),
            None => PickerOutcome::Canceled,
        })
    }
}

/// Fixed resize + JPEG re-encode applied to every picked photo
#[derive(Debug, Clone)]
pub struct ImageTransform {
    max_width: u32,
    jpeg_quality: u8,
    output_dir: PathBuf,
}

impl ImageTransform {
    pub fn new(config: &ImageConfig) -> Self {
        Self {
            max_width: config.max_width,
            jpeg_quality: config.jpeg_quality,
            output_dir: config.output_dir.clone(),
        }
    }

    /// Decode `source`, shrink it to `max_width` keeping the aspect ratio and
    /// write it as a fresh JPEG. Returns the path of the new file.
    pub fn apply(&self, source: &Path) -> Result<PathBuf> {
        let bytes = std::fs::read(source).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(source.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
        let decoded = image::load_from_memory(&bytes)?;
        let (width, height) = decoded.dimensions();

        let resized = match scaled_dimensions(width, height, self.max_width) {
            Some((new_width, new_height)) => {
                decoded.resize_exact(new_width, new_height, FilterType::Lanczos3)
            }
            None => decoded,
        };
        // JPEG has no alpha channel
        let rgb = resized.to_rgb8();

        std::fs::create_dir_all(&self.output_dir)?;
        let output = self.output_dir.join(format!("{}.jpg", Uuid::new_v4()));
        let mut writer = BufWriter::new(File::create(&output)?);
        JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality).encode_image(&rgb)?;
        writer.flush()?;

        debug!(
            source = %source.display(),
            output = %output.display(),
            original_width = width,
            width = rgb.width(),
            height = rgb.height(),
            "Image transformed"
        );

        Ok(output)
    }
}

/// Target size when `width` exceeds `max_width`; `None` keeps the original.
fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> Option<(u32, u32)> {
    if width <= max_width {
        return None;
    }
    let scaled = (f64::from(height) * f64::from(max_width) / f64::from(width)).round() as u32;
    Some((max_width, scaled.max(1)))
}

/// Picks one image at a time and remembers the latest one.
pub struct ImageAcquisition<L> {
    library: L,
    transform: ImageTransform,
    current: Option<String>,
}

impl<L: MediaLibrary> ImageAcquisition<L> {
    pub fn new(library: L, transform: ImageTransform) -> Self {
        Self {
            library,
            transform,
            current: None,
        }
    }

    /// Ask the host for a photo. Denied permission, a cancelled picker or an
    /// asset without a URI all yield `Ok(None)` and keep the previous image.
    #[instrument(skip(self))]
    pub async fn pick_image(&mut self) -> Result<Option<String>> {
        if self.library.request_permission().await? != PermissionStatus::Granted {
            debug!("Media library permission denied");
            return Ok(None);
        }

        let source = match self.library.launch_picker().await? {
            PickerOutcome::Canceled => {
                debug!("Image selection canceled");
                return Ok(None);
            }
            PickerOutcome::Selected(assets) => assets.into_iter().next().and_then(|a| a.uri),
        };
        let Some(source) = source else {
            return Ok(None);
        };

        let source_path = resolve_local_path(&source)?;
        let transform = self.transform.clone();
        let output = tokio::task::spawn_blocking(move || transform.apply(&source_path))
            .await
            .map_err(|e| Error::Image(format!("transform task failed: {e}")))??;
        let output = if output.is_absolute() {
            output
        } else {
            std::env::current_dir()?.join(output)
        };

        let uri = Url::from_file_path(&output)
            .map_err(|_| Error::Image(format!("not an absolute path: {}", output.display())))?
            .to_string();

        info!(uri = %uri, "Image picked");

        self.current = Some(uri.clone());
        Ok(Some(uri))
    }

    /// Most recently picked image, if any
    pub fn current_image(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
