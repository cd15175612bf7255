//! Prompt enrichment (brand colors, reference styles) for generation.
//!
//! Pure string templating plus prompt validation. No I/O.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::CoreError;
use crate::image::ReferenceImage;
use crate::job::JobInput;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum accepted prompt length in characters.
pub const MAX_PROMPT_LENGTH: usize = 10_000;

/// Number of dominant styles folded into the base prompt.
pub const TOP_STYLES: usize = 3;

/// Colors as supplied by clients: either `"#fff, #000"` or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColorInput {
    Text(String),
    List(Vec<String>),
}

/// Per-variation options handed to the generation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub style: String,
    pub colors: Vec<String>,
    pub fonts: Vec<String>,
}

/// One decorated prompt, derived from a single reference image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPrompt {
    pub text: String,
    pub index: usize,
    pub reference_id: String,
    pub options: GenerationOptions,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a text prompt and return it trimmed.
///
/// Whitespace-only prompts count as missing.
pub fn validate_prompt(text: &str) -> Result<String, CoreError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("textPrompt is required".to_string()));
    }
    let length = trimmed.chars().count();
    if length > MAX_PROMPT_LENGTH {
        return Err(CoreError::Validation(format!(
            "textPrompt exceeds maximum length of {MAX_PROMPT_LENGTH} characters (got {length})"
        )));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Normalize client-supplied colors into a trimmed, non-empty list.
pub fn extract_colors(colors: &ColorInput) -> Vec<String> {
    match colors {
        ColorInput::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
        ColorInput::List(list) => list
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// The `n` most frequent styles, most frequent first.
///
/// Ties keep the order in which styles first appear.
pub fn top_styles<'a>(styles: impl IntoIterator<Item = &'a str>, n: usize) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for style in styles {
        let count = counts.entry(style).or_insert(0);
        if *count == 0 {
            order.push(style);
        }
        *count += 1;
    }

    // Stable sort keeps first-appearance order among equal counts.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.into_iter().take(n).map(str::to_string).collect()
}

/// Build one generation prompt per reference image.
///
/// The base prompt is the user's text plus the color palette and the
/// dominant reference styles; each variation then adds its own reference's
/// style.
pub fn create_generation_prompts(
    input: &JobInput,
    references: &[ReferenceImage],
) -> Vec<GenerationPrompt> {
    let top = top_styles(references.iter().map(|r| r.style.as_str()), TOP_STYLES);

    let mut base = input.text_prompt.clone();
    if !input.colors.is_empty() {
        base.push_str(&format!(", color palette: {}", input.colors.join(", ")));
    }
    if !top.is_empty() {
        base.push_str(&format!(", style inspiration: {}", top.join(", ")));
    }

    references
        .iter()
        .enumerate()
        .map(|(index, reference)| {
            let mut text = base.clone();
            if !reference.style.is_empty() {
                text.push_str(&format!(", incorporating {} aesthetic", reference.style));
            }
            text.push_str(&format!(", inspired by {} design patterns", reference.style));

            GenerationPrompt {
                text,
                index,
                reference_id: reference.id.clone(),
                options: GenerationOptions {
                    style: reference.style.clone(),
                    colors: input.colors.clone(),
                    fonts: input.fonts.clone(),
                },
            }
        })
        .collect()
}

/// Append a style-blend sentence built from the first [`TOP_STYLES`]
/// distinct styles. Returns `text` unchanged when there are none.
pub fn enhance_prompt_with_context<'a>(
    text: &str,
    styles: impl IntoIterator<Item = &'a str>,
) -> String {
    let mut unique: Vec<&str> = Vec::new();
    for style in styles {
        if !style.is_empty() && !unique.contains(&style) {
            unique.push(style);
        }
        if unique.len() == TOP_STYLES {
            break;
        }
    }

    if unique.is_empty() {
        return text.to_string();
    }
    format!("{text}. Design style should blend {} elements", unique.join(", "))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn reference(index: usize, style: &str) -> ReferenceImage {
        ReferenceImage::local(index, PathBuf::from(format!("/r/{index}.png")), style)
    }

    // -- validate_prompt --

    #[test]
    fn valid_prompt_is_trimmed() {
        assert_eq!(
            validate_prompt("  landing page for SaaS startup \n").unwrap(),
            "landing page for SaaS startup"
        );
    }

    #[test]
    fn empty_prompt_rejected() {
        let err = validate_prompt("").unwrap_err();
        assert!(err.to_string().contains("textPrompt is required"));
    }

    #[test]
    fn whitespace_prompt_rejected() {
        assert!(validate_prompt(" \t ").is_err());
    }

    #[test]
    fn too_long_prompt_rejected() {
        let long = "x".repeat(MAX_PROMPT_LENGTH + 1);
        let err = validate_prompt(&long).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum length"));
    }

    #[test]
    fn boundary_prompt_length_passes() {
        let exact = "x".repeat(MAX_PROMPT_LENGTH);
        assert!(validate_prompt(&exact).is_ok());
    }

    // -- extract_colors --

    #[test]
    fn colors_from_comma_string() {
        let colors = extract_colors(&ColorInput::Text(" #fff, ,#000 ,navy".into()));
        assert_eq!(colors, vec!["#fff", "#000", "navy"]);
    }

    #[test]
    fn colors_from_list_drop_blanks() {
        let colors = extract_colors(&ColorInput::List(vec!["red".into(), "  ".into()]));
        assert_eq!(colors, vec!["red"]);
    }

    #[test]
    fn color_input_deserializes_both_shapes() {
        let text: ColorInput = serde_json::from_str(r#""a, b""#).unwrap();
        let list: ColorInput = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(extract_colors(&text), extract_colors(&list));
    }

    // -- top_styles --

    #[test]
    fn top_styles_orders_by_frequency() {
        let styles = ["bold", "tech", "tech", "modern", "tech", "bold"];
        assert_eq!(top_styles(styles, 2), vec!["tech", "bold"]);
    }

    #[test]
    fn top_styles_ties_keep_first_appearance() {
        let styles = ["cozy", "luxury", "rustic"];
        assert_eq!(top_styles(styles, 3), vec!["cozy", "luxury", "rustic"]);
    }

    // -- create_generation_prompts --

    #[test]
    fn prompts_include_palette_and_styles() {
        let mut input = JobInput::new("landing page for a bakery");
        input.colors = vec!["#f00".into(), "#0f0".into()];
        input.fonts = vec!["Inter".into()];
        let refs = vec![reference(0, "bold"), reference(1, "bold"), reference(2, "tech")];

        let prompts = create_generation_prompts(&input, &refs);

        assert_eq!(prompts.len(), 3);
        assert_eq!(
            prompts[2].text,
            "landing page for a bakery, color palette: #f00, #0f0, \
             style inspiration: bold, tech, incorporating tech aesthetic, \
             inspired by tech design patterns"
        );
        assert_eq!(prompts[2].index, 2);
        assert_eq!(prompts[2].reference_id, "ref-2");
        assert_eq!(prompts[0].options.fonts, vec!["Inter"]);
    }

    #[test]
    fn no_references_means_no_prompts() {
        let prompts = create_generation_prompts(&JobInput::new("x"), &[]);
        assert!(prompts.is_empty());
    }

    // -- enhance_prompt_with_context --

    #[test]
    fn context_blends_first_three_unique_styles() {
        let enhanced = enhance_prompt_with_context(
            "hero section",
            ["bold", "tech", "bold", "", "modern", "playful"],
        );
        assert_eq!(
            enhanced,
            "hero section. Design style should blend bold, tech, modern elements"
        );
    }

    #[test]
    fn context_without_styles_is_unchanged() {
        assert_eq!(enhance_prompt_with_context("hero", Vec::<&str>::new()), "hero");
    }
}
