use eframe::egui::{Align2, RichText, Ui};
use egui_plot::{Legend, Line, LineStyle, Plot, PlotPoint, PlotPoints, Text, VLine};

use crate::analysis::overlay::{X_LABEL, Y_LABEL};
use crate::color::{generate_palette, marker_color};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Spectrum plot (central panel)
// ---------------------------------------------------------------------------

/// Render the overlay plot in the central panel.
pub fn spectrum_plot(ui: &mut Ui, state: &AppState) {
    let figure = match &state.figure {
        Some(figure) => figure,
        None => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("Open a spectrum to view it  (File → Open…)");
            });
            return;
        }
    };

    let colors = generate_palette(figure.series.len());

    let mut plot = Plot::new("spectrum_plot")
        .x_axis_label(X_LABEL)
        .y_axis_label(Y_LABEL)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);
    if figure.show_legend() {
        plot = plot.legend(Legend::default());
    }

    plot.show(ui, |plot_ui| {
        for (series, &color) in figure.series.iter().zip(&colors) {
            // Segments share a name so the legend shows one entry per spectrum.
            for segment in &series.segments {
                let points: PlotPoints = segment.iter().map(|&(x, y)| [x, y]).collect();
                plot_ui.line(Line::new(points).name(&series.name).color(color).width(1.5));
            }
        }

        if state.show_markers {
            for line in &figure.markers {
                plot_ui.vline(
                    VLine::new(line.wavelength)
                        .color(marker_color())
                        .style(LineStyle::dashed_loose()),
                );
                plot_ui.text(
                    Text::new(
                        PlotPoint::new(line.wavelength, figure.label_y),
                        RichText::new(&line.label).small(),
                    )
                    .color(marker_color())
                    .anchor(Align2::LEFT_BOTTOM),
                );
            }
        }
    });
}
