use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Placeholder written in place of a missing flux.
pub const MISSING_PLACEHOLDER: &str = "—";

// ---------------------------------------------------------------------------
// SpectrumRow / SpectrumTable – one extracted spectrum
// ---------------------------------------------------------------------------

/// One (wavelength, flux) sample. `flux` is `None` where no valid data
/// contributed to the slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumRow {
    #[serde(
        alias = "Wavelength",
        alias = "Wavelength (micron)",
        alias = "Wavelength (um)",
        alias = "Wavelength (μm)"
    )]
    pub wavelength: f64,
    #[serde(alias = "Flux")]
    pub flux: Option<f64>,
}

impl SpectrumRow {
    /// Build a row, folding NaN fluxes into the missing marker.
    pub fn new(wavelength: f64, flux: f64) -> Self {
        Self {
            wavelength,
            flux: (!flux.is_nan()).then_some(flux),
        }
    }
}

/// An ordered spectrum, rows in cube slice order.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumTable {
    /// Display name (region name or file stem).
    pub name: String,
    pub rows: Vec<SpectrumRow>,
}

impl SpectrumTable {
    pub fn new(name: impl Into<String>, rows: Vec<SpectrumRow>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Smallest and largest wavelength, or `None` for an empty table.
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        self.rows.iter().fold(None, |acc, row| match acc {
            None => Some((row.wavelength, row.wavelength)),
            Some((lo, hi)) => Some((lo.min(row.wavelength), hi.max(row.wavelength))),
        })
    }

    /// Largest non-missing flux.
    pub fn max_flux(&self) -> Option<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.flux)
            .fold(None, |acc: Option<f64>, f| Some(acc.map_or(f, |m| m.max(f))))
    }

    /// Number of rows carrying the missing marker.
    pub fn missing_count(&self) -> usize {
        self.rows.iter().filter(|row| row.flux.is_none()).count()
    }
}

// ---------------------------------------------------------------------------
// LineCatalog – named reference wavelengths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogLine {
    pub label: String,
    /// Rest-frame wavelength in micron.
    pub wavelength: f64,
}

/// Ordered set of catalog lines with unique labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LineCatalog {
    lines: Vec<CatalogLine>,
}

impl LineCatalog {
    /// Build a catalog, rejecting duplicate labels. Order is kept for display.
    pub fn new(lines: Vec<CatalogLine>) -> Result<Self, PipelineError> {
        let mut seen = BTreeSet::new();
        for line in &lines {
            if !seen.insert(line.label.as_str()) {
                return Err(PipelineError::DuplicateLine(line.label.clone()));
            }
        }
        Ok(Self { lines })
    }

    /// Common mid-infrared diagnostics (PAH bands, fine-structure and H2 lines).
    pub fn mid_infrared() -> Self {
        const LINES: &[(&str, f64)] = &[
            ("[Fe II] 5.34", 5.34),
            ("PAH 6.2", 6.2),
            ("[Ar II] 6.99", 6.985),
            ("PAH 7.7", 7.7),
            ("PAH 8.6", 8.6),
            ("H2 S(3) 9.66", 9.665),
            ("[S IV] 10.51", 10.511),
            ("PAH 11.3", 11.3),
            ("H2 S(2) 12.28", 12.279),
            ("[Ne II] 12.81", 12.81),
            ("[Ne V] 14.32", 14.322),
            ("[Ne III] 15.56", 15.555),
            ("H2 S(1) 17.03", 17.035),
            ("[S III] 18.71", 18.713),
            ("[O IV] 25.89", 25.89),
        ];
        Self {
            lines: LINES
                .iter()
                .map(|&(label, wavelength)| CatalogLine {
                    label: label.to_string(),
                    wavelength,
                })
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for LineCatalog {
    fn default() -> Self {
        Self::mid_infrared()
    }
}

// ---------------------------------------------------------------------------
// LineSummaryRow – one tabulated catalog line
// ---------------------------------------------------------------------------

/// Which of the two spectra shows the larger flux near a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stronger {
    First,
    Second,
    /// Equal fluxes, or at least one side missing.
    Neither,
}

impl fmt::Display for Stronger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stronger::First => write!(f, "Region 1"),
            Stronger::Second => write!(f, "Region 2"),
            Stronger::Neither => write!(f, "Equal/{MISSING_PLACEHOLDER}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSummaryRow {
    pub label: String,
    pub wavelength: f64,
    pub first: Option<f64>,
    pub second: Option<f64>,
    pub stronger: Stronger,
}

/// Serialized shape of a summary row; fluxes are pre-formatted text.
#[derive(Debug, Serialize)]
pub struct SummaryRecord<'a> {
    #[serde(rename = "Line")]
    pub line: &'a str,
    #[serde(rename = "Wavelength (μm)")]
    pub wavelength: f64,
    #[serde(rename = "Region 1 Flux")]
    pub first: String,
    #[serde(rename = "Region 2 Flux")]
    pub second: String,
    #[serde(rename = "Stronger In")]
    pub stronger: String,
}

impl LineSummaryRow {
    pub fn to_record(&self) -> SummaryRecord<'_> {
        SummaryRecord {
            line: &self.label,
            wavelength: self.wavelength,
            first: format_flux(self.first),
            second: format_flux(self.second),
            stronger: self.stronger.to_string(),
        }
    }
}

/// Two decimal places, or the placeholder for a missing value.
pub fn format_flux(flux: Option<f64>) -> String {
    match flux {
        Some(v) => format!("{v:.2}"),
        None => MISSING_PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_flux_becomes_missing() {
        let row = SpectrumRow::new(5.0, f64::NAN);
        assert_eq!(row.flux, None);
        assert_eq!(SpectrumRow::new(5.0, 0.0).flux, Some(0.0));
    }

    #[test]
    fn test_range_and_max_skip_missing() {
        let table = SpectrumTable::new(
            "t",
            vec![
                SpectrumRow::new(7.0, 1.0),
                SpectrumRow::new(5.0, f64::NAN),
                SpectrumRow::new(9.0, 3.5),
            ],
        );
        assert_eq!(table.wavelength_range(), Some((5.0, 9.0)));
        assert_eq!(table.max_flux(), Some(3.5));
        assert_eq!(table.missing_count(), 1);
        assert_eq!(SpectrumTable::new("e", vec![]).wavelength_range(), None);
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let lines = vec![
            CatalogLine { label: "PAH 7.7".into(), wavelength: 7.7 },
            CatalogLine { label: "PAH 7.7".into(), wavelength: 7.71 },
        ];
        assert!(matches!(
            LineCatalog::new(lines),
            Err(PipelineError::DuplicateLine(label)) if label == "PAH 7.7"
        ));
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = LineCatalog::mid_infrared();
        let relabelled = LineCatalog::new(catalog.iter().cloned().collect());
        assert!(relabelled.is_ok());
        assert!(catalog.iter().any(|l| l.label == "[Ne II] 12.81"));
    }

    #[test]
    fn test_flux_formatting() {
        assert_eq!(format_flux(Some(5.0)), "5.00");
        assert_eq!(format_flux(Some(4.456)), "4.46");
        assert_eq!(format_flux(None), "—");
        assert_eq!(Stronger::Neither.to_string(), "Equal/—");
        assert_eq!(Stronger::Second.to_string(), "Region 2");
    }
}
