use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use phone_price_explorer::data::model::PriceRange;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

fn hsl_to_color32(hue: f32, saturation: f32, lightness: f32) -> Color32 {
    let rgb: Srgb = Hsl::new(hue, saturation, lightness).into_color();
    Color32::from_rgb(
        (rgb.red.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0) as u8,
    )
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| hsl_to_color32((i as f32 / n as f32) * 360.0, 0.75, 0.55))
        .collect()
}

// ---------------------------------------------------------------------------
// Price range → Color32
// ---------------------------------------------------------------------------

/// One fixed colour per price range, shared by every chart.
#[derive(Debug, Clone)]
pub struct ClassPalette {
    colors: Vec<Color32>,
}

impl Default for ClassPalette {
    fn default() -> Self {
        Self {
            colors: generate_palette(PriceRange::ALL.len()),
        }
    }
}

impl ClassPalette {
    pub fn color_for(&self, class: PriceRange) -> Color32 {
        self.colors
            .get(class.code() as usize)
            .copied()
            .unwrap_or(Color32::GRAY)
    }
}

// ---------------------------------------------------------------------------
// Diverging scale for correlation cells
// ---------------------------------------------------------------------------

/// Blue for negative, red for positive, near white around zero. NaN is grey.
pub fn correlation_color(r: f64) -> Color32 {
    if r.is_nan() {
        return Color32::GRAY;
    }
    let strength = r.abs().min(1.0) as f32;
    let hue = if r < 0.0 { 220.0 } else { 5.0 };
    hsl_to_color32(hue, 0.7, 0.95 - 0.5 * strength)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_get_distinct_colors() {
        let p = ClassPalette::default();
        let mut colors: Vec<Color32> = PriceRange::ALL.iter().map(|&c| p.color_for(c)).collect();
        colors.dedup();
        assert_eq!(colors.len(), 4);
    }

    #[test]
    fn test_correlation_color_darkens_with_strength() {
        let weak = correlation_color(0.1);
        let strong = correlation_color(0.9);
        assert!(strong.g() < weak.g());
        assert!(correlation_color(-0.9).b() > correlation_color(-0.9).r());
        assert_eq!(correlation_color(f64::NAN), Color32::GRAY);
    }
}
