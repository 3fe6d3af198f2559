//! Static rendering of a [`SpectrumFigure`] to PNG or SVG.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::analysis::overlay::{SpectrumFigure, X_LABEL, Y_LABEL};
use crate::color::{MARKER_RGB, generate_rgb};

pub const DEFAULT_SIZE: (u32, u32) = (1200, 700);
const MARKER_DASHES: usize = 40;

/// Render to `path`; `.svg` selects the vector backend, anything else PNG.
pub fn render_figure(figure: &SpectrumFigure, path: &Path, size: (u32, u32)) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let is_svg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));

    if is_svg {
        let root = SVGBackend::new(path, size).into_drawing_area();
        draw(&root, figure)?;
        root.present().map_err(draw_error)?;
    } else {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        draw(&root, figure)?;
        root.present().map_err(draw_error)?;
    }

    info!("Plot saved to {}", path.display());
    Ok(())
}

fn draw_error(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("drawing failed: {e}")
}

fn draw<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, figure: &SpectrumFigure) -> Result<()> {
    root.fill(&WHITE).map_err(draw_error)?;

    let (x0, x1) = match figure.x_range {
        Some((lo, hi)) if hi > lo => (lo, hi),
        Some((lo, _)) => (lo - 0.5, lo + 0.5),
        None => (0.0, 1.0),
    };
    let (y0, y1) = figure.y_range;

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, ("sans-serif", 26).into_font())
        .margin(12)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(draw_error)?;

    chart
        .configure_mesh()
        .x_desc(X_LABEL)
        .y_desc(Y_LABEL)
        .axis_desc_style(("sans-serif", 18))
        .light_line_style(BLACK.mix(0.05))
        .bold_line_style(BLACK.mix(0.15))
        .draw()
        .map_err(draw_error)?;

    let marker = RGBColor(MARKER_RGB.0, MARKER_RGB.1, MARKER_RGB.2);
    let dash = (y1 - y0) / (2 * MARKER_DASHES) as f64;
    for line in &figure.markers {
        let x = line.wavelength;
        chart
            .draw_series((0..MARKER_DASHES).map(|i| {
                let start = y0 + 2.0 * i as f64 * dash;
                PathElement::new(vec![(x, start), (x, start + dash)], marker.stroke_width(1))
            }))
            .map_err(draw_error)?;
        let label_style = ("sans-serif", 13)
            .into_font()
            .transform(FontTransform::Rotate270)
            .color(&BLACK);
        chart
            .draw_series(std::iter::once(Text::new(
                line.label.clone(),
                (line.wavelength, figure.label_y),
                label_style,
            )))
            .map_err(draw_error)?;
    }

    let colors = generate_rgb(figure.series.len());
    for (series, &(r, g, b)) in figure.series.iter().zip(&colors) {
        let color = RGBColor(r, g, b);
        for (i, segment) in series.segments.iter().enumerate() {
            let mut drawn = chart
                .draw_series(LineSeries::new(segment.iter().copied(), color.stroke_width(2)))
                .map_err(draw_error)?;
            if i == 0 {
                drawn
                    .label(&series.name)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            }
        }
    }

    if figure.show_legend() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()
            .map_err(draw_error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::overlay::build_figure;
    use crate::data::model::{LineCatalog, SpectrumRow, SpectrumTable};

    #[test]
    fn test_svg_contains_axis_labels_and_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots").join("overlay.svg");
        let a = SpectrumTable::new(
            "nucleus",
            (0..200)
                .map(|i| SpectrumRow::new(7.0 + i as f64 * 0.01, 1.0 + (i % 7) as f64))
                .collect(),
        );
        let b = SpectrumTable::new("disk", a.rows.clone());
        let figure = build_figure("NGC test", &[a, b], &LineCatalog::mid_infrared());

        render_figure(&figure, &path, (800, 500)).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Wavelength [μm]"));
        assert!(svg.contains("PAH 7.7"));
        assert!(svg.contains("nucleus"));
    }
}
