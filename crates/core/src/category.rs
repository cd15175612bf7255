//! Category rule table and prompt-based category detection.
//!
//! Detection is a case-insensitive substring match against a small fixed
//! table. Prompts that match nothing fall back to [`DEFAULT_CATEGORY`].

/// A known reference-image category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    /// Phrase matched against the lowercased prompt.
    pub key: &'static str,
    /// Subdirectory of the asset root holding this category's images.
    pub directory: &'static str,
    /// Style labels assigned to located images.
    pub styles: &'static [&'static str],
}

pub const LANDING_PAGE: Category = Category {
    key: "landing page",
    directory: "LandingPage",
    styles: &[
        "modern",
        "minimalist",
        "professional",
        "creative",
        "bold",
        "elegant",
        "tech",
        "startup",
        "corporate",
        "innovative",
    ],
};

pub const INTERIOR_DESIGN: Category = Category {
    key: "interior design",
    directory: "InteriorDesign",
    styles: &[
        "modern",
        "minimalist",
        "cozy",
        "luxury",
        "scandinavian",
        "contemporary",
        "traditional",
        "industrial",
        "rustic",
        "minimal",
    ],
};

/// Match order matters: the first category whose key appears wins.
pub const CATEGORIES: &[Category] = &[LANDING_PAGE, INTERIOR_DESIGN];

pub const DEFAULT_CATEGORY: Category = LANDING_PAGE;

/// Style used when a category's palette is empty.
pub const FALLBACK_STYLE: &str = "modern";

/// Pick the category for a free-text prompt.
pub fn detect_category(prompt: &str) -> Category {
    let lower = prompt.to_lowercase();
    CATEGORIES
        .iter()
        .find(|category| lower.contains(category.key))
        .copied()
        .unwrap_or(DEFAULT_CATEGORY)
}
