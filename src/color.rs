use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Lightness for source curves.
pub const SOURCE_LIGHTNESS: f32 = 0.60;
/// Lightness for bandpass curves, darker so they read apart from sources.
pub const BAND_LIGHTNESS: f32 = 0.40;

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize, lightness: f32) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, lightness);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: curve label → Color32
// ---------------------------------------------------------------------------

/// Maps curve labels to distinct colours.
#[derive(Debug, Clone, Default)]
pub struct ColorMap {
    mapping: BTreeMap<String, Color32>,
}

impl ColorMap {
    /// Build a colour map for source and bandpass labels.
    pub fn new<'a>(
        sources: impl ExactSizeIterator<Item = &'a str>,
        bands: impl ExactSizeIterator<Item = &'a str>,
    ) -> Self {
        let source_palette = generate_palette(sources.len(), SOURCE_LIGHTNESS);
        let band_palette = generate_palette(bands.len(), BAND_LIGHTNESS);
        let mapping = sources
            .zip(source_palette)
            .chain(bands.zip(band_palette))
            .map(|(label, c)| (label.to_string(), c))
            .collect();
        ColorMap { mapping }
    }

    /// Look up the colour for a curve label.
    pub fn color_for(&self, label: &str) -> Color32 {
        self.mapping.get(label).copied().unwrap_or(Color32::GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_distinct() {
        let colors = generate_palette(6, SOURCE_LIGHTNESS);
        assert_eq!(colors.len(), 6);
        for (i, a) in colors.iter().enumerate() {
            assert!(colors[i + 1..].iter().all(|b| a != b));
        }
        assert!(generate_palette(0, BAND_LIGHTNESS).is_empty());
    }

    #[test]
    fn test_unknown_label_is_gray() {
        let map = ColorMap::new(["bb"].into_iter(), ["V"].into_iter());
        assert_ne!(map.color_for("bb"), Color32::GRAY);
        assert_eq!(map.color_for("missing"), Color32::GRAY);
        assert_ne!(map.color_for("bb"), map.color_for("V"));
    }
}
