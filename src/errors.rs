// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThumbError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Remote(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("A generation is already running for this session")]
    Busy,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ThumbError {
    fn label(&self) -> &'static str {
        match self {
            ThumbError::Validation(_) => "Validation error",
            ThumbError::Remote(_) => "AI service error",
            ThumbError::NotFound(_) => "Not found",
            ThumbError::Busy => "Generation in progress",
            ThumbError::ImageProcessing(_) => "Image processing error",
            ThumbError::Config(_) => "Configuration error",
        }
    }
}

impl ResponseError for ThumbError {
    fn status_code(&self) -> StatusCode {
        match self {
            ThumbError::Validation(_) | ThumbError::ImageProcessing(_) => StatusCode::BAD_REQUEST,
            ThumbError::NotFound(_) => StatusCode::NOT_FOUND,
            ThumbError::Busy => StatusCode::CONFLICT,
            ThumbError::Remote(_) => StatusCode::SERVICE_UNAVAILABLE,
            ThumbError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.label(),
            "message": self.to_string()
        }))
    }
}
