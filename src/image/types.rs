//! Core types for scene composition.

use crate::error::{Result, SceneCraftError};
use crate::image::data_url::DataUrl;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name prefix for downloaded scenes.
const DOWNLOAD_PREFIX: &str = "generated-scene-";

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from the file signature.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
        const JPEG_SOI: &[u8] = &[0xFF, 0xD8, 0xFF];

        if data.starts_with(PNG_SIGNATURE) {
            Some(Self::Png)
        } else if data.starts_with(JPEG_SOI) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP".as_slice()) {
            Some(Self::WebP)
        } else {
            None
        }
    }
}

/// Scene provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini image models.
    Gemini,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// An uploaded image, encoded for preview and transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// The file the image was read from.
    pub source: PathBuf,
    /// The encoded contents.
    pub data_url: DataUrl,
}

impl EncodedImage {
    /// Creates an encoded image from a file reference and its data URL.
    pub fn new(source: impl Into<PathBuf>, data_url: DataUrl) -> Self {
        Self {
            source: source.into(),
            data_url,
        }
    }

    /// Returns the declared MIME type.
    pub fn mime_type(&self) -> &str {
        self.data_url.mime_type()
    }

    /// Returns the data URL as a string, as sent to the provider.
    pub fn to_data_url(&self) -> String {
        self.data_url.to_string()
    }
}

/// A composed scene returned by a provider.
///
/// The payload is base64 and assumed to be PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "generated scene should be saved or displayed"]
pub struct GeneratedScene {
    /// Base64-encoded image payload.
    pub data: String,
}

impl GeneratedScene {
    /// Wraps a base64 payload.
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// Returns the scene as a PNG data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", ImageFormat::Png.mime_type(), self.data)
    }

    /// Decodes the payload into raw image bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| SceneCraftError::Decode(e.to_string()))
    }

    /// Returns the detected format of the decoded payload, if recognizable.
    pub fn detected_format(&self) -> Option<ImageFormat> {
        self.to_bytes()
            .ok()
            .and_then(|bytes| ImageFormat::from_magic_bytes(&bytes))
    }

    /// Returns the download file name for the given millisecond timestamp.
    pub fn download_file_name(timestamp_ms: i64) -> String {
        format!(
            "{}{}.{}",
            DOWNLOAD_PREFIX,
            timestamp_ms,
            ImageFormat::Png.extension()
        )
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Saves the image into `dir` as `generated-scene-<timestamp>.png`.
    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let name = Self::download_file_name(chrono::Utc::now().timestamp_millis());
        let path = dir.as_ref().join(name);
        self.save(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"RIFF\x00\x00"), None);
        assert_eq!(ImageFormat::from_magic_bytes(b""), None);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ImageFormat::from_extension("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("webp"), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(
            GeneratedScene::download_file_name(1_700_000_000_123),
            "generated-scene-1700000000123.png"
        );
    }

    #[test]
    fn test_scene_data_url_is_png() {
        let scene = GeneratedScene::new("iVBORw0KGgo=");
        assert_eq!(scene.to_data_url(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[test]
    fn test_scene_detected_format() {
        let data = base64::engine::general_purpose::STANDARD.encode(PNG_MAGIC);
        assert_eq!(
            GeneratedScene::new(data).detected_format(),
            Some(ImageFormat::Png)
        );
        assert_eq!(GeneratedScene::new("!!").detected_format(), None);
    }

    #[test]
    fn test_save_to_dir_writes_decoded_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let data = base64::engine::general_purpose::STANDARD.encode(PNG_MAGIC);
        let path = GeneratedScene::new(data).save_to_dir(dir.path()).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("generated-scene-"));
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(&path).unwrap(), PNG_MAGIC);
    }

    #[test]
    fn test_encoded_image_accessors() {
        let url = DataUrl::encode("image/webp", &WEBP_MAGIC).unwrap();
        let image = EncodedImage::new("product.webp", url.clone());
        assert_eq!(image.mime_type(), "image/webp");
        assert_eq!(image.to_data_url(), url.to_string());
    }

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(ProviderKind::Gemini.to_string(), "gemini");
    }
}
