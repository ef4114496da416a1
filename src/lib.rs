#![warn(missing_docs)]
//! SceneCraft - compose a character and a product into one scene.
//!
//! Two images go in as data URLs, one composite comes back from Gemini's
//! image model, guided by a fixed instruction that keeps the character
//! image's aspect ratio and art style.
//!
//! # Quick Start
//!
//! ```no_run
//! use scenecraft::{GeminiProvider, SelectedFile, Session, Uploader};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> scenecraft::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let mut session = Session::new(provider);
//!
//!     let (tx, rx) = watch::channel(None);
//!     let mut character = Uploader::new();
//!     character.subscribe(move |image| {
//!         tx.send_replace(image);
//!     });
//!     character.select(Some(SelectedFile::from_path("hero.png"))).await?;
//!     session.set_character(rx.borrow().clone());
//!
//!     // ...same for the product slot...
//!
//!     if session.generate().await.is_some() {
//!         let path = session.download(".")?;
//!         println!("saved {}", path.display());
//!     } else if let Some(message) = session.error() {
//!         eprintln!("{message}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! The API key comes from the builder, or from `GOOGLE_API_KEY`, then
//! `API_KEY`. Building a provider without one fails immediately.
//!
//! # Features
//!
//! - `cli` (default): the `scenecraft` command-line tool.

mod error;
pub mod image;
pub mod session;
pub mod status;
pub mod uploader;

// Re-export error types at crate root
pub use error::{Result, SceneCraftError};

pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder, SCENE_INSTRUCTION};
pub use image::{DataUrl, EncodedImage, GeneratedScene, ImageFormat, ProviderKind, SceneProvider};
pub use session::Session;
pub use status::StatusTicker;
pub use uploader::{SelectedFile, Uploader};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, SceneCraftError};
    pub use crate::image::providers::GeminiProvider;
    pub use crate::image::{EncodedImage, GeneratedScene, SceneProvider};
    pub use crate::session::Session;
    pub use crate::uploader::{SelectedFile, Uploader};
}
