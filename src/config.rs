// src/config.rs
use std::env;
use std::time::Duration;

use crate::errors::ThumbError;
use crate::services::image_processor::DEFAULT_MAX_UPLOAD_BYTES;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ADVICE_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub advice_model: String,
    pub image_model: String,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            advice_model: DEFAULT_ADVICE_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> Result<Self, ThumbError> {
        let defaults = Self::default();
        let request_timeout = match non_empty_env("REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                ThumbError::Config(format!("REQUEST_TIMEOUT_SECS is not a number: {}", raw))
            })?),
            None => defaults.request_timeout,
        };

        Ok(Self {
            api_key: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            advice_model: non_empty_env("ADVICE_MODEL").unwrap_or(defaults.advice_model),
            image_model: non_empty_env("IMAGE_MODEL").unwrap_or(defaults.image_model),
            request_timeout,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub max_upload_dimension: u32,
    pub max_upload_bytes: usize,
    pub gemini: GeminiConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ThumbError> {
        let max_upload_dimension = match non_empty_env("MAX_UPLOAD_DIMENSION") {
            Some(raw) => raw.parse().map_err(|_| {
                ThumbError::Config(format!("MAX_UPLOAD_DIMENSION is not a number: {}", raw))
            })?,
            None => 2048,
        };
        let max_upload_bytes = match non_empty_env("MAX_UPLOAD_BYTES") {
            Some(raw) => raw.parse().map_err(|_| {
                ThumbError::Config(format!("MAX_UPLOAD_BYTES is not a number: {}", raw))
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            bind_addr: non_empty_env("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            max_upload_dimension,
            max_upload_bytes,
            gemini: GeminiConfig::from_env()?,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
