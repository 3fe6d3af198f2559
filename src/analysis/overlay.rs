//! Figure model for a spectrum plot with catalog line markers.
//!
//! Both the static renderer and the interactive viewer draw from a
//! [`SpectrumFigure`], so marker selection and label placement live here.

use crate::data::model::{CatalogLine, LineCatalog, SpectrumTable};

pub const X_LABEL: &str = "Wavelength [μm]";
pub const Y_LABEL: &str = "Flux";
/// Marker labels sit at this fraction of the peak flux.
pub const LABEL_HEIGHT_FRACTION: f64 = 0.8;

/// One plotted spectrum, split into contiguous runs at missing fluxes.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub segments: Vec<Vec<(f64, f64)>>,
}

impl Series {
    pub fn from_table(table: &SpectrumTable) -> Self {
        let mut segments = Vec::new();
        let mut current = Vec::new();
        for row in &table.rows {
            match row.flux {
                Some(flux) => current.push((row.wavelength, flux)),
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        Self {
            name: table.name.clone(),
            segments,
        }
    }

    pub fn points(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.segments.iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFigure {
    pub title: String,
    pub series: Vec<Series>,
    /// Catalog lines strictly inside the plotted wavelength range.
    pub markers: Vec<CatalogLine>,
    /// Height of the marker labels.
    pub label_y: f64,
    /// Wavelength span of the plotted tables.
    pub x_range: Option<(f64, f64)>,
    /// Flux span, including zero.
    pub y_range: (f64, f64),
}

impl SpectrumFigure {
    /// Legends only help when spectra are being compared.
    pub fn show_legend(&self) -> bool {
        self.series.len() > 1
    }
}

/// Catalog lines with `lo < wavelength < hi`; exact boundary matches are left out.
pub fn markers_in_range(catalog: &LineCatalog, (lo, hi): (f64, f64)) -> Vec<CatalogLine> {
    catalog
        .iter()
        .filter(|line| line.wavelength > lo && line.wavelength < hi)
        .cloned()
        .collect()
}

/// Build the overlay figure for one or more spectra.
pub fn build_figure(
    title: impl Into<String>,
    tables: &[SpectrumTable],
    catalog: &LineCatalog,
) -> SpectrumFigure {
    let x_range = tables
        .iter()
        .filter_map(SpectrumTable::wavelength_range)
        .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)));
    let peak = tables
        .iter()
        .filter_map(SpectrumTable::max_flux)
        .reduce(f64::max);
    let low = tables
        .iter()
        .flat_map(|t| t.rows.iter().filter_map(|r| r.flux))
        .fold(0.0, f64::min);

    let markers = x_range.map_or_else(Vec::new, |range| markers_in_range(catalog, range));
    let top = peak.unwrap_or(0.0).max(0.0);
    let pad = if top > low { 0.05 * (top - low) } else { 1.0 };

    SpectrumFigure {
        title: title.into(),
        series: tables.iter().map(Series::from_table).collect(),
        markers,
        label_y: LABEL_HEIGHT_FRACTION * peak.unwrap_or(0.0),
        x_range,
        y_range: (low.min(0.0), top + pad),
    }
}
