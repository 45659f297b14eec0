//! Selectable fonts and colors offered by the creation dialog and editor toolbar.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swatch {
    pub label: &'static str,
    pub value: &'static str,
}

impl Swatch {
    const fn new(label: &'static str, value: &'static str) -> Self {
        Self { label, value }
    }
}

#[derive(Debug, Clone)]
pub struct PageColorPalette {
    swatches: Vec<Swatch>,
}

impl PageColorPalette {
    pub fn contains(&self, value: &str) -> bool {
        contains(&self.swatches, value)
    }

    pub fn all(&self) -> &[Swatch] {
        &self.swatches
    }

    pub fn position(&self, value: &str) -> Option<usize> {
        position(&self.swatches, value)
    }
}

impl Default for PageColorPalette {
    fn default() -> Self {
        Self {
            swatches: vec![
                Swatch::new("Parchment", "#f5f1e7"),
                Swatch::new("Plain", "#ffffff"),
                Swatch::new("Sepia", "#f4e4c1"),
                Swatch::new("Mint", "#e8f3ec"),
                Swatch::new("Sky", "#e6f0fa"),
                Swatch::new("Blush", "#fbe9eb"),
                Swatch::new("Slate", "#2f3640"),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct PenPalette {
    swatches: Vec<Swatch>,
}

impl PenPalette {
    pub fn contains(&self, value: &str) -> bool {
        contains(&self.swatches, value)
    }

    pub fn all(&self) -> &[Swatch] {
        &self.swatches
    }

    pub fn position(&self, value: &str) -> Option<usize> {
        position(&self.swatches, value)
    }
}

impl Default for PenPalette {
    fn default() -> Self {
        Self {
            swatches: vec![
                Swatch::new("Ink black", "#000000"),
                Swatch::new("Royal blue", "#1a3c8e"),
                Swatch::new("Crimson", "#a4161a"),
                Swatch::new("Forest", "#2d6a4f"),
                Swatch::new("Violet", "#5a189a"),
                Swatch::new("Sepia", "#7f5539"),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FontRegistry {
    fonts: Vec<Swatch>,
}

impl FontRegistry {
    pub fn contains(&self, family: &str) -> bool {
        contains(&self.fonts, family)
    }

    pub fn all(&self) -> &[Swatch] {
        &self.fonts
    }

    pub fn position(&self, family: &str) -> Option<usize> {
        position(&self.fonts, family)
    }

    /// Short display name for a font-family string, falling back to the raw value.
    pub fn label_for<'a>(&self, family: &'a str) -> &'a str {
        self.fonts
            .iter()
            .find(|font| font.value.eq_ignore_ascii_case(family))
            .map(|font| font.label)
            .unwrap_or(family)
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self {
            fonts: vec![
                Swatch::new("Crimson Pro", "'Crimson Pro', serif"),
                Swatch::new("Caveat", "'Caveat', cursive"),
                Swatch::new("Indie Flower", "'Indie Flower', cursive"),
                Swatch::new("Patrick Hand", "'Patrick Hand', cursive"),
                Swatch::new("Lora", "'Lora', serif"),
                Swatch::new("Courier Prime", "'Courier Prime', monospace"),
            ],
        }
    }
}

fn contains(swatches: &[Swatch], value: &str) -> bool {
    position(swatches, value).is_some()
}

fn position(swatches: &[Swatch], value: &str) -> Option<usize> {
    swatches
        .iter()
        .position(|swatch| swatch.value.eq_ignore_ascii_case(value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palettes_match_case_insensitively() {
        assert!(PageColorPalette::default().contains("#F5F1E7"));
        assert!(PenPalette::default().contains(" #000000 "));
        assert!(!PenPalette::default().contains("#123456"));
    }

    #[test]
    fn font_labels_fall_back_to_raw_family() {
        let fonts = FontRegistry::default();
        assert_eq!(fonts.label_for("'Caveat', cursive"), "Caveat");
        assert_eq!(fonts.label_for("Comic Sans"), "Comic Sans");
    }
}
