// src/lib.rs
//! Dress diagnosis and concierge chat backed by a hosted Gemini model.
//!
//! Photos go through [`ImageNormalizer`] before they are stored or sent.
//! [`ConciergeService`] turns normalized photos and catalog entries into a typed
//! [`DiagnosisResult`] and runs chat turns. [`ConciergeSession`] is the state a
//! presentation layer owns between those calls.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod session;

use std::sync::Arc;

pub use crate::config::Config;
pub use crate::errors::{ConciergeError, ErrorKind};
pub use crate::models::*;
pub use crate::services::{ConciergeService, GeminiClient, GenerativeModel, ImageNormalizer};
pub use crate::session::{ConciergeSession, PhotoTarget, View};

#[derive(Clone)]
pub struct Services {
    pub concierge: Arc<ConciergeService>,
    pub normalizer: Arc<ImageNormalizer>,
}

impl Services {
    pub fn new(model: Arc<dyn GenerativeModel>, normalizer: ImageNormalizer) -> Self {
        Self {
            concierge: Arc::new(ConciergeService::new(model)),
            normalizer: Arc::new(normalizer),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConciergeError> {
        let model = Arc::new(GeminiClient::new(config)?);
        log::info!("Using Gemini model {} at {}", config.model, config.api_base);
        Ok(Self::new(model, ImageNormalizer::from_config(config)))
    }

    /// Reads [`Config`] from the environment. A missing API key is an `Auth` error.
    pub fn from_env() -> Result<Self, ConciergeError> {
        Self::from_config(&Config::from_env()?)
    }
}
