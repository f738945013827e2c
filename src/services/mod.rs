// src/services/mod.rs
pub mod concierge_service;
pub mod gemini;
pub mod image_normalizer;
pub mod prompts;

pub use concierge_service::ConciergeService;
pub use gemini::{GeminiClient, GenerativeModel};
pub use image_normalizer::ImageNormalizer;

#[cfg(test)]
pub(crate) mod testing;
