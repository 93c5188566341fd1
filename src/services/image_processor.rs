// src/services/image_processor.rs
use crate::errors::ThumbError;
use crate::models::{ExportFormat, ImageData, Platform};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat as ImgFormat, Rgb, RgbImage};

pub const JPEG_QUALITY: u8 = 92;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const MAX_DIMENSION: u32 = 4096;

pub struct ImageProcessor {
    max_upload_dimension: u32,
    max_upload_bytes: usize,
}

impl ImageProcessor {
    pub fn new(max_upload_dimension: u32) -> Self {
        Self {
            max_upload_dimension,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(self, max_upload_bytes: usize) -> Self {
        Self {
            max_upload_bytes,
            ..self
        }
    }

    /// Rejects an upload once `len` bytes exceed the configured ceiling.
    pub fn check_upload_size(&self, len: usize) -> Result<(), ThumbError> {
        if len > self.max_upload_bytes {
            return Err(ThumbError::Validation(format!(
                "Upload exceeds {} bytes",
                self.max_upload_bytes
            )));
        }
        Ok(())
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), ThumbError> {
        let img = image::load_from_memory(data)
            .map_err(|e| ThumbError::ImageProcessing(format!("Invalid image format: {}", e)))?;

        let (width, height) = img.dimensions();

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(ThumbError::ImageProcessing(format!(
                "Image dimensions exceed {}x{}",
                MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok((width, height))
    }

    /// Validates an upload and downsizes it to the configured edge length.
    /// Untouched uploads keep their original bytes and MIME type.
    pub fn prepare_upload(&self, data: &[u8], content_type: &str) -> Result<ImageData, ThumbError> {
        self.check_upload_size(data.len())?;
        self.validate_image(data)?;

        let resized = self.resize_if_needed(data, self.max_upload_dimension)?;
        Ok(match resized {
            Some(png) => ImageData::from_bytes(&png, "image/png"),
            None => ImageData::from_bytes(data, sniff_mime(data).unwrap_or(content_type)),
        })
    }

    pub fn resize_if_needed(&self, data: &[u8], max_size: u32) -> Result<Option<Vec<u8>>, ThumbError> {
        let img = image::load_from_memory(data)
            .map_err(|e| ThumbError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let (width, height) = img.dimensions();

        if width <= max_size && height <= max_size {
            return Ok(None);
        }

        let ratio = (max_size as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| {
                ThumbError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(Some(output))
    }

    /// Re-encodes a generated image for download. JPEG has no alpha channel,
    /// so transparent pixels are composited over white first.
    pub fn export(&self, image: &ImageData, format: ExportFormat) -> Result<Vec<u8>, ThumbError> {
        let bytes = image.decode()?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| ThumbError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let mut output = Vec::new();
        match format {
            ExportFormat::Png => {
                img.write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
                    .map_err(|e| {
                        ThumbError::ImageProcessing(format!("Failed to encode PNG: {}", e))
                    })?;
            }
            ExportFormat::Jpg => {
                let flattened = flatten_on_white(&img);
                JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY)
                    .encode_image(&flattened)
                    .map_err(|e| {
                        ThumbError::ImageProcessing(format!("Failed to encode JPEG: {}", e))
                    })?;
            }
        }

        Ok(output)
    }
}

pub fn download_filename(platform: Platform, format: ExportFormat, timestamp_millis: i64) -> String {
    format!(
        "thumbnail-{}-{}.{}",
        platform.slug(),
        timestamp_millis,
        format.extension()
    )
}

fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }

    out
}

fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(data).ok()?;
    Some(match format {
        ImgFormat::Png => "image/png",
        ImgFormat::Jpeg => "image/jpeg",
        ImgFormat::WebP => "image/webp",
        ImgFormat::Gif => "image/gif",
        ImgFormat::Bmp => "image/bmp",
        _ => return None,
    })
}
