//! Scene provider trait.

use crate::error::Result;
use crate::image::types::ProviderKind;
use async_trait::async_trait;

/// Trait for providers that compose a character and a product into one scene.
#[async_trait]
pub trait SceneProvider: Send + Sync {
    /// Composes the two images, given as data URLs.
    ///
    /// Returns the base64 payload of the first image the model produced, or
    /// `None` if the model returned neither an image nor an explanation.
    /// A textual answer without an image is an error.
    async fn generate(&self, character_image: &str, product_image: &str)
        -> Result<Option<String>>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            ProviderKind::Gemini => "Gemini (Google)",
        }
    }

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
