// src/services/mod.rs
pub mod gemini_service;
pub mod image_processor;
pub mod orchestrator;
pub mod prompts;
pub mod session_store;

pub use gemini_service::GeminiService;
pub use image_processor::ImageProcessor;
pub use orchestrator::Orchestrator;
pub use session_store::SessionStore;

use async_trait::async_trait;

use crate::errors::ThumbError;
use crate::models::{DesignAdvice, GenerationConfig, ImageData};

/// The two remote calls a generation attempt makes.
#[async_trait]
pub trait CreativeModel: Send + Sync {
    async fn design_advice(&self, config: &GenerationConfig) -> Result<DesignAdvice, ThumbError>;

    async fn generate_image(
        &self,
        config: &GenerationConfig,
        advice: &DesignAdvice,
    ) -> Result<ImageData, ThumbError>;
}
