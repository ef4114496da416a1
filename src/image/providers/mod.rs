//! Scene providers.

mod gemini;

pub use gemini::{GeminiModel, GeminiProvider, GeminiProviderBuilder, SCENE_INSTRUCTION};
