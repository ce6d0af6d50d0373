//! Prompt assembly from questionnaire answers.

use crate::models::{AspectRatio, Responses};

/// One focus per variation so the generated sets differ from each other.
pub const VARIATION_FOCUSES: [&str; 3] = [
    "focus on strong subject separation and bold typography",
    "focus on dramatic lighting and energetic color contrasts",
    "focus on a close-up expressive subject and minimal on-screen text",
];

const COMPOSITION_HINTS: &str = "Prefer high contrast colors, large readable text, and an expressive subject facial expression when applicable. Avoid busy backgrounds and ensure text area has safe margin.";

const DESIGN_GUIDANCE: &str = "Design guidance: follow modern YouTube thumbnail trends: use vibrant but controlled color palettes (bold gradients, neon accents), cinematic or studio-style lighting, subtle 3D depth and soft drop-shadows to separate subject and background. Favor large, highly legible sans-serif typography, strong subject isolation, and generous negative space. Avoid dated collage or clip-art looks, heavy film grain, or low-resolution textures. Prefer polished, high-resolution imagery or tasteful stylized illustrations. Provide at least 2 contrasting color palette options and a clear focal area that reads even at small sizes.";

fn answer(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Merge every questionnaire field into a single image prompt.
pub fn build_system_prompt(responses: &Responses, placement: &str) -> String {
    let mut parts = vec![format!(
        "Create a YouTube thumbnail for a {}.",
        answer(&responses.video_type).unwrap_or("video")
    )];

    if let Some(style) = answer(&responses.style) {
        parts.push(format!("Style: {}.", style));
    }
    if let Some(mood) = answer(&responses.mood) {
        parts.push(format!("Mood/tones: {}.", mood));
    }
    if let Some(audience) = answer(&responses.audience) {
        parts.push(format!("Target audience: {}.", audience));
    }
    if let Some(context) = answer(&responses.context) {
        parts.push(format!("Context / notes: {}.", context));
    }

    parts.push(format!(
        "Place the subject {}. Use strong contrast, bold typography and a clear focal point for thumbnails. Provide compositions suitable for horizontal (16:9), vertical (9:16) and square (1:1) variants.",
        placement
    ));
    parts.push(COMPOSITION_HINTS.to_string());
    parts.push(DESIGN_GUIDANCE.to_string());

    parts.join(" ")
}

/// `index` is zero-based; the prompt text numbers variations from 1.
pub fn variation_prompt(rewritten: &str, index: usize) -> String {
    let label = index + 1;
    match VARIATION_FOCUSES.get(index) {
        Some(focus) => format!("{} Variation {}: {}.", rewritten, label, focus),
        None => format!("{} Variation {}: variation {}.", rewritten, label, label),
    }
}

pub fn ratio_prompt(variation: &str, ratio: AspectRatio) -> String {
    let instruction = match ratio {
        AspectRatio::Horizontal => "Generate for horizontal (16:9) composition. Emphasize landscape framing, negative space on the right, and large headline text area.",
        AspectRatio::Vertical => "Generate for vertical (9:16) composition. Emphasize tall framing, subject-centered or top-aligned composition, and readable headline placement for mobile.",
        AspectRatio::Square => "Generate for square (1:1) composition. Emphasize centered subject, balanced negative space, and typography that reads in square crops.",
    };
    format!("{} {}", variation, instruction)
}
