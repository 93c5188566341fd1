// src/services/gemini_service.rs
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Instant;

use crate::config::GeminiConfig;
use crate::errors::ThumbError;
use crate::models::*;
use crate::services::CreativeModel;
use crate::services::prompts;

pub const NO_IMAGE_MESSAGE: &str = "No image was generated by the model.";
pub const UNPARSEABLE_ADVICE_MESSAGE: &str = "Failed to parse design advice from Gemini.";

pub struct GeminiService {
    config: GeminiConfig,
    client: Client,
}

impl GeminiService {
    pub fn new(config: GeminiConfig) -> Result<Self, ThumbError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ThumbError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str, ThumbError> {
        self.config.api_key.as_deref().ok_or_else(|| {
            ThumbError::Remote("API Key is missing. Please set GEMINI_API_KEY.".to_string())
        })
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<Value, ThumbError> {
        let api_key = self.api_key()?;
        let endpoint = format!("{}/models/{}:generateContent", self.config.api_base, model);
        let start = Instant::now();

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ThumbError::Remote(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Gemini {} returned {}", model, status);
            return Err(ThumbError::Remote(api_error_message(&error_text, status.as_u16())));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| ThumbError::Remote(format!("Failed to parse Gemini response: {}", e)))?;

        debug!(
            "Gemini {} answered in {} ms",
            model,
            start.elapsed().as_millis()
        );
        Ok(result)
    }
}

#[async_trait]
impl CreativeModel for GeminiService {
    async fn design_advice(&self, config: &GenerationConfig) -> Result<DesignAdvice, ThumbError> {
        let body = advice_request(config);
        let result = self
            .generate_content(&self.config.advice_model, &body)
            .await?;
        parse_advice(&result)
    }

    async fn generate_image(
        &self,
        config: &GenerationConfig,
        advice: &DesignAdvice,
    ) -> Result<ImageData, ThumbError> {
        let body = image_request(config, advice)?;
        let result = self
            .generate_content(&self.config.image_model, &body)
            .await?;
        first_inline_image(&result)
    }
}

fn inline_part(image: &ImageData) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.data
        }
    })
}

pub fn advice_request(config: &GenerationConfig) -> Value {
    let mut parts = Vec::new();
    if let Some(reference) = &config.reference_image {
        parts.push(inline_part(reference));
    }
    parts.push(json!({ "text": prompts::advice_prompt(config) }));

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "hookText": { "type": "STRING" },
                    "emotion": { "type": "STRING" },
                    "backgroundDescription": { "type": "STRING" },
                    "lightingDescription": { "type": "STRING" },
                    "compositionNotes": { "type": "STRING" },
                    "styleInspiration": {
                        "type": "STRING",
                        "description": "Style cues extracted from the reference thumbnail."
                    }
                },
                "required": [
                    "hookText",
                    "emotion",
                    "backgroundDescription",
                    "lightingDescription",
                    "compositionNotes"
                ]
            }
        }
    })
}

/// Parts go subject, background, reference, then the prompt; the prompt
/// refers to them as Image 1 and Image 2.
pub fn image_request(config: &GenerationConfig, advice: &DesignAdvice) -> Result<Value, ThumbError> {
    let face = config
        .face_image
        .as_ref()
        .ok_or_else(|| ThumbError::Validation("No headshot image provided.".to_string()))?;

    let mut parts = vec![inline_part(face)];
    if let Some(background) = &config.background_image {
        parts.push(inline_part(background));
    }
    if let Some(reference) = &config.reference_image {
        parts.push(inline_part(reference));
    }
    parts.push(json!({ "text": prompts::image_prompt(config, advice) }));

    Ok(json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": {
                "aspectRatio": config.aspect_ratio.as_str()
            }
        }
    }))
}

fn candidate_parts(result: &Value) -> &[Value] {
    result["candidates"][0]["content"]["parts"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub fn parse_advice(result: &Value) -> Result<DesignAdvice, ThumbError> {
    let text: String = candidate_parts(result)
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();

    let advice: DesignAdvice = serde_json::from_str(text.trim()).map_err(|e| {
        warn!("Unparseable design advice: {}", e);
        ThumbError::Remote(UNPARSEABLE_ADVICE_MESSAGE.to_string())
    })?;

    let blank = advice.blank_fields();
    if !blank.is_empty() {
        return Err(ThumbError::Remote(format!(
            "Design advice is missing {}",
            blank.join(", ")
        )));
    }

    Ok(advice)
}

pub fn first_inline_image(result: &Value) -> Result<ImageData, ThumbError> {
    candidate_parts(result)
        .iter()
        .filter_map(|part| part.get("inlineData").or_else(|| part.get("inline_data")))
        .find_map(|inline| {
            let data = inline["data"].as_str().filter(|d| !d.is_empty())?;
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            Some(ImageData {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            })
        })
        .ok_or_else(|| ThumbError::Remote(NO_IMAGE_MESSAGE.to_string()))
}

fn api_error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("Gemini error: HTTP {}", status)
            } else {
                format!("Gemini error: {}", body.trim())
            }
        })
}
