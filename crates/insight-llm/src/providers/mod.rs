//! Concrete provider implementations

pub mod gemini;

pub use gemini::{GeminiConfig, GeminiProvider};
