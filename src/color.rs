use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// `n` visually distinct RGB triples using evenly spaced hues.
pub fn generate_rgb(n: usize) -> Vec<(u8, u8, u8)> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            // Start at blue so a single spectrum keeps the familiar colour.
            let hue = 220.0 + (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.45);
            let rgb: Srgb = hsl.into_color();
            (
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Palette for the interactive viewer.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    generate_rgb(n)
        .into_iter()
        .map(|(r, g, b)| Color32::from_rgb(r, g, b))
        .collect()
}

/// Colour for catalog line markers in both renderers.
pub const MARKER_RGB: (u8, u8, u8) = (128, 128, 128);

pub fn marker_color() -> Color32 {
    let (r, g, b) = MARKER_RGB;
    Color32::from_rgb(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_distinct() {
        let colors = generate_rgb(4);
        assert_eq!(colors.len(), 4);
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(generate_palette(0).is_empty());
    }
}
