//! Composition session state.
//!
//! A [`Session`] holds what the user has picked so far, whether a request is
//! running, and the outcome of the last one. Failures end up as a single
//! user-facing message rather than propagating.
//!
//! `generate` borrows the session mutably for the whole request, so the
//! loading flag is published on a `watch` channel for observers that run
//! alongside it (see [`Session::subscribe_loading`]).

use crate::error::{Result, SceneCraftError};
use crate::image::{EncodedImage, GeneratedScene, ImageFormat, SceneProvider};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Shown when `generate` is called with an empty slot.
pub const MISSING_IMAGES_MESSAGE: &str = "Please upload both a character and a product image.";

/// Shown when the model returned neither an image nor an explanation.
pub const NO_IMAGE_MESSAGE: &str = "The model did not return an image. Please try again.";

/// Character and product slots plus the state of the last generation.
pub struct Session<P> {
    provider: P,
    character: Option<EncodedImage>,
    product: Option<EncodedImage>,
    loading: watch::Sender<bool>,
    error: Option<String>,
    result: Option<GeneratedScene>,
}

impl<P: SceneProvider> Session<P> {
    /// Creates an empty session backed by `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            character: None,
            product: None,
            loading: watch::Sender::new(false),
            error: None,
            result: None,
        }
    }

    /// Returns the provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Replaces the character image.
    pub fn set_character(&mut self, image: Option<EncodedImage>) {
        self.character = image;
    }

    /// Replaces the product image.
    pub fn set_product(&mut self, image: Option<EncodedImage>) {
        self.product = image;
    }

    /// Returns the character image.
    pub fn character(&self) -> Option<&EncodedImage> {
        self.character.as_ref()
    }

    /// Returns the product image.
    pub fn product(&self) -> Option<&EncodedImage> {
        self.product.as_ref()
    }

    /// True when both images are present and nothing is running.
    pub fn can_generate(&self) -> bool {
        self.character.is_some() && self.product.is_some() && !self.is_loading()
    }

    /// True while a request is outstanding.
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Returns a receiver that sees the loading flag flip while `generate`
    /// is running.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Message describing the last failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Scene produced by the last successful generation.
    pub fn result(&self) -> Option<&GeneratedScene> {
        self.result.as_ref()
    }

    /// The last scene as a PNG data URL.
    pub fn result_data_url(&self) -> Option<String> {
        self.result.as_ref().map(GeneratedScene::to_data_url)
    }

    /// Sends both images to the provider once and records the outcome.
    ///
    /// Prior error and result are cleared first, including when a slot is
    /// empty and no request is made.
    pub async fn generate(&mut self) -> Option<&GeneratedScene> {
        self.error = None;
        self.result = None;

        let (character, product) = match (&self.character, &self.product) {
            (Some(c), Some(p)) => (c.to_data_url(), p.to_data_url()),
            _ => {
                self.error = Some(MISSING_IMAGES_MESSAGE.to_string());
                return None;
            }
        };

        self.loading.send_replace(true);
        tracing::debug!(provider = self.provider.name(), "generating scene");
        let outcome = self.provider.generate(&character, &product).await;
        self.loading.send_replace(false);

        match outcome {
            Ok(Some(data)) => {
                let scene = GeneratedScene::new(data);
                let format = scene.detected_format();
                if format != Some(ImageFormat::Png) {
                    tracing::warn!(?format, "scene payload is not a PNG");
                }
                self.result = Some(scene);
            }
            Ok(None) => self.error = Some(NO_IMAGE_MESSAGE.to_string()),
            Err(e) => {
                tracing::warn!("scene generation failed: {e}");
                self.error = Some(e.to_string());
            }
        }

        self.result.as_ref()
    }

    /// Writes the last scene into `dir` as `generated-scene-<timestamp>.png`.
    pub fn download(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let scene = self
            .result
            .as_ref()
            .ok_or_else(|| SceneCraftError::InvalidRequest("no scene to download".into()))?;
        scene.save_to_dir(dir)
    }
}
