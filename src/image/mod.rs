//! Image encoding, scene providers and their types.

mod data_url;
mod provider;
pub mod providers;
mod types;

pub use data_url::DataUrl;
pub use provider::SceneProvider;
pub use types::{EncodedImage, GeneratedScene, ImageFormat, ProviderKind};
