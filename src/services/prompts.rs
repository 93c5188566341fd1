// src/services/prompts.rs
use crate::models::*;

/// Where the background of the generated image comes from. Exactly one
/// applies per request, picked in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundSource<'a> {
    SuppliedImage,
    CustomDescription(&'a str),
    NamedStyle(BackgroundStyle),
    AdviceDescription(&'a str),
}

impl<'a> BackgroundSource<'a> {
    pub fn select(config: &'a GenerationConfig, advice: &'a DesignAdvice) -> Self {
        if config.background_image.is_some() {
            BackgroundSource::SuppliedImage
        } else if config.background_style == BackgroundStyle::Custom {
            BackgroundSource::CustomDescription(&config.custom_background_description)
        } else if config.background_style != BackgroundStyle::AutoContext {
            BackgroundSource::NamedStyle(config.background_style)
        } else {
            BackgroundSource::AdviceDescription(&advice.background_description)
        }
    }

    pub fn instruction(&self) -> String {
        match self {
            BackgroundSource::SuppliedImage => "Use the provided background image (Image 2) as the scene. Blend the subject from Image 1 naturally onto this background.".to_string(),
            BackgroundSource::CustomDescription(description) => {
                format!("Generate a background matching this description: {}.", description)
            }
            BackgroundSource::NamedStyle(style) => {
                format!("Generate a background in the {} style.", style)
            }
            BackgroundSource::AdviceDescription(description) => {
                format!("Generate a context-aware background: {}.", description)
            }
        }
    }
}

pub fn safe_zone_hint(platform: Platform) -> &'static str {
    match platform {
        Platform::ShortsReels => {
            "Keep critical content (face and text) in the vertical center. Avoid the top 15% and bottom 25% where UI overlays appear."
        }
        Platform::IgPortrait => "Ensure composition works for a tall portrait frame.",
        Platform::YouTube | Platform::IgPost => "",
    }
}

fn typography(font: FontFamily) -> String {
    match font {
        FontFamily::Auto => {
            "a typography style that best matches the viral mood and core emotion of the content"
                .to_string()
        }
        other => format!("a {} font style", other),
    }
}

fn text_effects(config: &GenerationConfig) -> String {
    let mut effects = Vec::new();
    if config.text_outline {
        effects.push("bold high-contrast outline/stroke around the letters");
    }
    if config.text_shadow {
        effects.push("deep, realistic drop shadow for maximum legibility");
    }

    if effects.is_empty() {
        String::new()
    } else {
        format!("Apply {}.", effects.join(" and "))
    }
}

pub fn advice_prompt(config: &GenerationConfig) -> String {
    let reference_step = if config.reference_image.is_some() {
        "6. Analyze the style of the provided reference image (colors, lighting, text energy) and summarize how to adapt its vibe WITHOUT copying its specific content."
    } else {
        ""
    };

    format!(
        r#"Analyze this {platform} content title: "{title}".
Your goal is to provide creative direction for a high-CTR visual for {platform} ({ratio} aspect ratio).

Instructions:
1. Create a "hook text" (3-6 words maximum) that is punchier than the title.
2. Identify the dominant emotion (shock, fear, curiosity, excitement, mystery, anger, motivation).
3. Describe a cinematic, context-aware background scene based on the title.
4. Suggest lighting and color mood (e.g., "dramatic blue and orange teal", "vibrant neon pink", "dark moody shadows").
5. Provide composition notes based on a face being in the {position} position.
{reference_step}

Return the response in valid JSON format only."#,
        platform = config.platform,
        title = config.video_title.trim(),
        ratio = config.aspect_ratio.as_str(),
        position = config.face_position,
        reference_step = reference_step,
    )
}

pub fn image_prompt(config: &GenerationConfig, advice: &DesignAdvice) -> String {
    let background = BackgroundSource::select(config, advice).instruction();

    // The note points at an attached image, so it needs one.
    let reference_note = advice
        .style_inspiration
        .as_deref()
        .filter(|_| config.reference_image.is_some())
        .filter(|s| !s.trim().is_empty())
        .map(|inspiration| {
            format!(
                "STYLE REFERENCE: {}. Use the provided reference image only for its color palette and energy. Do NOT copy its layout or text.",
                inspiration
            )
        })
        .unwrap_or_default();

    let mood = match config.color_mood {
        ColorMood::Auto => "Optimized for viral appeal".to_string(),
        other => other.to_string(),
    };

    let safe_zone = safe_zone_hint(config.platform);
    let safe_zone_line = if safe_zone.is_empty() {
        String::new()
    } else {
        format!("SAFE ZONE: {}\n", safe_zone)
    };

    format!(
        r#"Create a professional, high-CTR {platform} thumbnail/post.

PRIORITY 1: SUBJECT. Use the person in Image 1. Place them on the {position} side. Enhance features, add professional lighting.
PRIORITY 2: TITLE/HOOK. Include text "{hook}". Size: {size}. Typography: {typography}. {effects}
PRIORITY 3: BACKGROUND. {background} Use high depth of field.
PRIORITY 4: STYLE GUIDANCE. {reference_note} {style} preset.
{safe_zone_line}
LIGHTING: {lighting}. Apply dramatic rim lighting on the subject.
MOOD: {mood} mood.
GLOW: {glow} intensity.
TECHNICAL: 8k resolution, cinematic grading, high contrast.
No watermarks. No extra text besides "{hook}"."#,
        platform = config.platform,
        position = config.face_position.label().to_lowercase(),
        hook = advice.hook_text,
        size = config.text_size.label().to_lowercase(),
        typography = typography(config.font_family),
        effects = text_effects(config),
        background = background,
        reference_note = reference_note,
        style = config.style,
        safe_zone_line = safe_zone_line,
        lighting = advice.lighting_description,
        mood = mood,
        glow = config.glow_intensity,
    )
}
