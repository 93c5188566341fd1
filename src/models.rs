// src/models.rs
use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ThumbError;

/// Most recent log entries kept on a generation state.
pub const MAX_LOG_ENTRIES: usize = 5;

/// An image carried inline as base64, the way browsers hand out `data:` URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageData {
    pub mime_type: String,
    pub data: String,
}

impl ImageData {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn parse_data_url(url: &str) -> Result<Self, ThumbError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ThumbError::Validation("Image must be a data URL".to_string()))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| ThumbError::Validation("Malformed data URL".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| ThumbError::Validation("Data URL must be base64 encoded".to_string()))?;
        if mime_type.is_empty() || data.is_empty() {
            return Err(ThumbError::Validation("Empty data URL".to_string()));
        }

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>, ThumbError> {
        general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| ThumbError::ImageProcessing(format!("Invalid base64 payload: {}", e)))
    }
}

impl TryFrom<String> for ImageData {
    type Error = ThumbError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_data_url(&value)
    }
}

impl From<ImageData> for String {
    fn from(image: ImageData) -> Self {
        image.to_data_url()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSlot {
    Face,
    Background,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    YouTube,
    #[serde(rename = "Shorts/Reels")]
    ShortsReels,
    #[serde(rename = "IG Post")]
    IgPost,
    #[serde(rename = "IG Portrait")]
    IgPortrait,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::YouTube,
        Platform::ShortsReels,
        Platform::IgPost,
        Platform::IgPortrait,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::ShortsReels => "Shorts/Reels",
            Platform::IgPost => "IG Post",
            Platform::IgPortrait => "IG Portrait",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube Thumbnail",
            Platform::ShortsReels => "Shorts / Reels",
            Platform::IgPost => "Instagram Post",
            Platform::IgPortrait => "Instagram Portrait",
        }
    }

    pub fn aspect_ratio(self) -> AspectRatio {
        match self {
            Platform::YouTube => AspectRatio::Landscape,
            Platform::ShortsReels => AspectRatio::Vertical,
            Platform::IgPost => AspectRatio::Square,
            Platform::IgPortrait => AspectRatio::Portrait,
        }
    }

    /// Tall formats get larger text by default.
    pub fn default_text_size(self) -> TextSize {
        match self {
            Platform::ShortsReels | Platform::IgPortrait => TextSize::Large,
            Platform::YouTube | Platform::IgPost => TextSize::Medium,
        }
    }

    pub fn slug(self) -> String {
        self.label().to_lowercase().replace(['/', ' '], "-")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Vertical => "9:16",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StylePreset {
    #[default]
    Cinematic,
    #[serde(rename = "Horror/Dark")]
    HorrorDark,
    #[serde(rename = "Viral Bright")]
    ViralBright,
    #[serde(rename = "Minimal Clean")]
    MinimalClean,
    #[serde(rename = "Dramatic Storytelling")]
    DramaticStorytelling,
    #[serde(rename = "Neon Cyber")]
    NeonCyber,
}

impl StylePreset {
    pub const ALL: [StylePreset; 6] = [
        StylePreset::Cinematic,
        StylePreset::HorrorDark,
        StylePreset::ViralBright,
        StylePreset::MinimalClean,
        StylePreset::DramaticStorytelling,
        StylePreset::NeonCyber,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StylePreset::Cinematic => "Cinematic",
            StylePreset::HorrorDark => "Horror/Dark",
            StylePreset::ViralBright => "Viral Bright",
            StylePreset::MinimalClean => "Minimal Clean",
            StylePreset::DramaticStorytelling => "Dramatic Storytelling",
            StylePreset::NeonCyber => "Neon Cyber",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FacePosition {
    Left,
    #[default]
    Right,
    Center,
}

impl FacePosition {
    pub const ALL: [FacePosition; 3] = [FacePosition::Left, FacePosition::Right, FacePosition::Center];

    pub fn label(self) -> &'static str {
        match self {
            FacePosition::Left => "Left",
            FacePosition::Right => "Right",
            FacePosition::Center => "Center",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl TextSize {
    pub const ALL: [TextSize; 3] = [TextSize::Small, TextSize::Medium, TextSize::Large];

    pub fn label(self) -> &'static str {
        match self {
            TextSize::Small => "Small",
            TextSize::Medium => "Medium",
            TextSize::Large => "Large",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    #[serde(rename = "Auto (AI Select)")]
    Auto,
    #[serde(rename = "Modern Sans")]
    ModernSans,
    #[serde(rename = "Impact Heavy")]
    ImpactHeavy,
    Cyberpunk,
    #[serde(rename = "Elegant Serif")]
    ElegantSerif,
    #[serde(rename = "Playful Rounded")]
    PlayfulRounded,
}

impl FontFamily {
    pub const ALL: [FontFamily; 6] = [
        FontFamily::Auto,
        FontFamily::ModernSans,
        FontFamily::ImpactHeavy,
        FontFamily::Cyberpunk,
        FontFamily::ElegantSerif,
        FontFamily::PlayfulRounded,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FontFamily::Auto => "Auto (AI Select)",
            FontFamily::ModernSans => "Modern Sans",
            FontFamily::ImpactHeavy => "Impact Heavy",
            FontFamily::Cyberpunk => "Cyberpunk",
            FontFamily::ElegantSerif => "Elegant Serif",
            FontFamily::PlayfulRounded => "Playful Rounded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorMood {
    #[default]
    Auto,
    Warm,
    Cold,
    Neon,
    Dark,
}

impl ColorMood {
    pub const ALL: [ColorMood; 5] = [
        ColorMood::Auto,
        ColorMood::Warm,
        ColorMood::Cold,
        ColorMood::Neon,
        ColorMood::Dark,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ColorMood::Auto => "Auto",
            ColorMood::Warm => "Warm",
            ColorMood::Cold => "Cold",
            ColorMood::Neon => "Neon",
            ColorMood::Dark => "Dark",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlowIntensity {
    #[default]
    Auto,
    Low,
    Medium,
    High,
}

impl GlowIntensity {
    pub const ALL: [GlowIntensity; 4] = [
        GlowIntensity::Auto,
        GlowIntensity::Low,
        GlowIntensity::Medium,
        GlowIntensity::High,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GlowIntensity::Auto => "Auto",
            GlowIntensity::Low => "Low",
            GlowIntensity::Medium => "Medium",
            GlowIntensity::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackgroundStyle {
    #[default]
    #[serde(rename = "Auto-Context")]
    AutoContext,
    Cinematic,
    #[serde(rename = "Horror / Dark")]
    HorrorDark,
    #[serde(rename = "Bright / Viral")]
    BrightViral,
    #[serde(rename = "Minimal Clean")]
    MinimalClean,
    #[serde(rename = "Tech / Futuristic")]
    TechFuturistic,
    #[serde(rename = "Mystery / Thriller")]
    MysteryThriller,
    #[serde(rename = "Fantasy / Anime")]
    FantasyAnime,
    Custom,
}

impl BackgroundStyle {
    pub const ALL: [BackgroundStyle; 9] = [
        BackgroundStyle::AutoContext,
        BackgroundStyle::Cinematic,
        BackgroundStyle::HorrorDark,
        BackgroundStyle::BrightViral,
        BackgroundStyle::MinimalClean,
        BackgroundStyle::TechFuturistic,
        BackgroundStyle::MysteryThriller,
        BackgroundStyle::FantasyAnime,
        BackgroundStyle::Custom,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BackgroundStyle::AutoContext => "Auto-Context",
            BackgroundStyle::Cinematic => "Cinematic",
            BackgroundStyle::HorrorDark => "Horror / Dark",
            BackgroundStyle::BrightViral => "Bright / Viral",
            BackgroundStyle::MinimalClean => "Minimal Clean",
            BackgroundStyle::TechFuturistic => "Tech / Futuristic",
            BackgroundStyle::MysteryThriller => "Mystery / Thriller",
            BackgroundStyle::FantasyAnime => "Fantasy / Anime",
            BackgroundStyle::Custom => "Custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpg,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpg => "image/jpeg",
        }
    }
}

macro_rules! impl_display_via_label {
    ($($ty:ty),* $(,)?) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        })*
    };
}

impl_display_via_label!(
    Platform,
    StylePreset,
    FacePosition,
    TextSize,
    FontFamily,
    ColorMood,
    GlowIntensity,
    BackgroundStyle,
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub video_title: String,
    pub face_image: Option<ImageData>,
    pub background_image: Option<ImageData>,
    pub reference_image: Option<ImageData>,
    pub background_style: BackgroundStyle,
    pub custom_background_description: String,
    pub style: StylePreset,
    pub face_position: FacePosition,
    pub text_size: TextSize,
    pub font_family: FontFamily,
    pub text_outline: bool,
    pub text_shadow: bool,
    pub color_mood: ColorMood,
    pub glow_intensity: GlowIntensity,
    pub platform: Platform,
    pub aspect_ratio: AspectRatio,
    pub export_format: ExportFormat,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            video_title: String::new(),
            face_image: None,
            background_image: None,
            reference_image: None,
            background_style: BackgroundStyle::default(),
            custom_background_description: String::new(),
            style: StylePreset::default(),
            face_position: FacePosition::default(),
            text_size: TextSize::default(),
            font_family: FontFamily::default(),
            text_outline: true,
            text_shadow: true,
            color_mood: ColorMood::default(),
            glow_intensity: GlowIntensity::default(),
            platform: Platform::default(),
            aspect_ratio: Platform::default().aspect_ratio(),
            export_format: ExportFormat::default(),
        }
    }
}

/// A single form edit. Applying one yields a new configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ConfigEvent {
    SetTitle(String),
    SetImage { slot: ImageSlot, image: ImageData },
    ClearImage { slot: ImageSlot },
    SetPlatform(Platform),
    SetBackgroundStyle(BackgroundStyle),
    SetCustomBackground(String),
    SetStyle(StylePreset),
    SetFacePosition(FacePosition),
    SetTextSize(TextSize),
    SetFontFamily(FontFamily),
    SetTextOutline(bool),
    SetTextShadow(bool),
    SetColorMood(ColorMood),
    SetGlowIntensity(GlowIntensity),
    SetExportFormat(ExportFormat),
}

impl GenerationConfig {
    pub fn apply(self, event: ConfigEvent) -> Self {
        match event {
            ConfigEvent::SetTitle(video_title) => Self { video_title, ..self },
            ConfigEvent::SetImage { slot, image } => self.with_slot(slot, Some(image)),
            ConfigEvent::ClearImage { slot } => self.with_slot(slot, None),
            ConfigEvent::SetPlatform(platform) => Self {
                platform,
                aspect_ratio: platform.aspect_ratio(),
                text_size: platform.default_text_size(),
                ..self
            },
            ConfigEvent::SetBackgroundStyle(background_style) => Self {
                background_style,
                ..self
            },
            ConfigEvent::SetCustomBackground(custom_background_description) => Self {
                custom_background_description,
                ..self
            },
            ConfigEvent::SetStyle(style) => Self { style, ..self },
            ConfigEvent::SetFacePosition(face_position) => Self {
                face_position,
                ..self
            },
            ConfigEvent::SetTextSize(text_size) => Self { text_size, ..self },
            ConfigEvent::SetFontFamily(font_family) => Self {
                font_family,
                ..self
            },
            ConfigEvent::SetTextOutline(text_outline) => Self {
                text_outline,
                ..self
            },
            ConfigEvent::SetTextShadow(text_shadow) => Self {
                text_shadow,
                ..self
            },
            ConfigEvent::SetColorMood(color_mood) => Self { color_mood, ..self },
            ConfigEvent::SetGlowIntensity(glow_intensity) => Self {
                glow_intensity,
                ..self
            },
            ConfigEvent::SetExportFormat(export_format) => Self {
                export_format,
                ..self
            },
        }
    }

    fn with_slot(self, slot: ImageSlot, image: Option<ImageData>) -> Self {
        match slot {
            ImageSlot::Face => Self {
                face_image: image,
                ..self
            },
            ImageSlot::Background => Self {
                background_image: image,
                ..self
            },
            ImageSlot::Reference => Self {
                reference_image: image,
                ..self
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignAdvice {
    pub hook_text: String,
    pub emotion: String,
    pub background_description: String,
    pub lighting_description: String,
    pub composition_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_inspiration: Option<String>,
}

impl DesignAdvice {
    /// Names of required fields that came back blank.
    pub fn blank_fields(&self) -> Vec<&'static str> {
        [
            ("hookText", &self.hook_text),
            ("emotion", &self.emotion),
            ("backgroundDescription", &self.background_description),
            ("lightingDescription", &self.lighting_description),
            ("compositionNotes", &self.composition_notes),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationState {
    pub is_analyzing: bool,
    pub is_generating: bool,
    pub error: Option<String>,
    pub result_image: Option<ImageData>,
    pub logs: Vec<String>,
}

impl GenerationState {
    pub fn is_busy(&self) -> bool {
        self.is_analyzing || self.is_generating
    }

    /// Prepends `message`, dropping the oldest entries past the cap.
    pub fn with_log(mut self, message: impl Into<String>) -> Self {
        self.logs.insert(0, message.into());
        self.logs.truncate(MAX_LOG_ENTRIES);
        self
    }

    pub fn with_error(self, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..self
        }
    }

    /// Fresh state for a new attempt, already in the analyzing phase.
    pub fn started() -> Self {
        Self {
            is_analyzing: true,
            ..Self::default()
        }
    }

    pub fn generating(self) -> Self {
        Self {
            is_analyzing: false,
            is_generating: true,
            ..self
        }
    }

    pub fn finished(self, image: ImageData) -> Self {
        Self {
            is_analyzing: false,
            is_generating: false,
            error: None,
            result_image: Some(image),
            ..self
        }
    }

    pub fn failed(self, message: impl Into<String>) -> Self {
        Self {
            is_analyzing: false,
            is_generating: false,
            result_image: None,
            ..self
        }
        .with_error(message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub config: GenerationConfig,
    pub state: GenerationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            config: GenerationConfig::default(),
            state: GenerationState::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub platform: Platform,
    pub video_title: String,
    pub busy: bool,
    pub has_result: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            platform: session.config.platform,
            video_title: session.config.video_title.clone(),
            busy: session.state.is_busy(),
            has_result: session.state.result_image.is_some(),
            updated_at: session.updated_at,
        }
    }
}
