//! Image upload slot.
//!
//! An [`Uploader`] turns a selected file into an [`EncodedImage`] and reports
//! every change to a single subscriber. Non-image selections are not errors;
//! they clear the slot.

use crate::error::Result;
use crate::image::{DataUrl, EncodedImage, ImageFormat};
use std::path::{Path, PathBuf};

/// Receives the uploader's current value after every change.
pub type ChangeListener = Box<dyn FnMut(Option<EncodedImage>) + Send>;

/// A file picked by the user, with the type it claims to have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Location of the file.
    pub path: PathBuf,
    /// Declared MIME type, if any.
    pub declared_type: Option<String>,
}

impl SelectedFile {
    /// Creates a selection with an explicit declared type.
    pub fn new(path: impl Into<PathBuf>, declared_type: Option<String>) -> Self {
        Self {
            path: path.into(),
            declared_type,
        }
    }

    /// Declares the type from the file extension.
    ///
    /// Unknown extensions leave the type undeclared.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let declared_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .map(|f| f.mime_type().to_string());
        Self {
            path,
            declared_type,
        }
    }

    /// Returns true if the declared type is an image type.
    pub fn is_image(&self) -> bool {
        self.declared_type
            .as_deref()
            .is_some_and(|t| t.starts_with("image/"))
    }
}

/// The file-selection widget behind an uploader.
///
/// Choosing the file that is already selected is not a change; `reset`
/// forgets the current value so the same file can be chosen again.
#[derive(Debug, Default)]
pub struct FileInput {
    value: Option<PathBuf>,
}

impl FileInput {
    /// Records a selection. Returns false if nothing changed.
    pub fn select(&mut self, path: Option<&Path>) -> bool {
        if self.value.as_deref() == path {
            return false;
        }
        self.value = path.map(Path::to_path_buf);
        true
    }

    /// Clears the widget's value.
    pub fn reset(&mut self) {
        self.value = None;
    }

    /// Returns the currently selected path.
    pub fn value(&self) -> Option<&Path> {
        self.value.as_deref()
    }
}

/// One image slot with preview and change notification.
#[derive(Default)]
pub struct Uploader {
    input: FileInput,
    preview: Option<String>,
    listener: Option<ChangeListener>,
}

impl Uploader {
    /// Creates an empty uploader with no subscriber.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the change listener, replacing any previous one.
    pub fn subscribe(&mut self, listener: impl FnMut(Option<EncodedImage>) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Returns the preview data URL, if an image is loaded.
    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    /// Returns the widget backing this uploader.
    pub fn input(&self) -> &FileInput {
        &self.input
    }

    /// Handles a selection from the widget.
    ///
    /// The listener is notified once encoding finishes. An absent or
    /// non-image file clears the slot. A read failure clears the slot and
    /// returns the error.
    pub async fn select(&mut self, file: Option<SelectedFile>) -> Result<()> {
        if !self.input.select(file.as_ref().map(|f| f.path.as_path())) {
            tracing::debug!("selection unchanged, ignoring");
            return Ok(());
        }

        let file = match file {
            Some(file) if file.is_image() => file,
            Some(file) => {
                tracing::debug!(path = %file.path.display(), "not an image, clearing slot");
                self.set(None);
                return Ok(());
            }
            None => {
                self.set(None);
                return Ok(());
            }
        };

        match encode(&file).await {
            Ok(image) => {
                self.set(Some(image));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(path = %file.path.display(), "failed to read upload: {e}");
                self.input.reset();
                self.set(None);
                Err(e)
            }
        }
    }

    /// Removes the current image and resets the widget.
    pub fn clear(&mut self) {
        self.input.reset();
        self.set(None);
    }

    fn set(&mut self, image: Option<EncodedImage>) {
        self.preview = image.as_ref().map(EncodedImage::to_data_url);
        if let Some(listener) = self.listener.as_mut() {
            listener(image);
        }
    }
}

async fn encode(file: &SelectedFile) -> Result<EncodedImage> {
    let bytes = tokio::fs::read(&file.path).await?;
    let mime_type = file.declared_type.as_deref().unwrap_or_default();
    let data_url = DataUrl::encode(mime_type, &bytes)?;
    Ok(EncodedImage::new(&file.path, data_url))
}
