//! Provider client for the generative-language API.
//!
//! Supports `generateContent` for chat turns and JSON-mode structured analysis.

mod gemini;

pub use gemini::{
    first_candidate_text, Content, GeminiClient, GenerateRequest, GenerationConfig, Part,
    ProviderError, Role,
};
