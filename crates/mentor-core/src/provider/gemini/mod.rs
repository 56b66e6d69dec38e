//! Gemini streaming backend (Generative Language API).

mod api;
mod sse;

pub use api::{GeminiClient, GeminiConfig, build_gemini_request};
pub use sse::GeminiSseParser;
