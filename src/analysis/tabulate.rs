use log::info;

use crate::data::model::{LineCatalog, LineSummaryRow, SpectrumTable, Stronger};

/// Half-width of the window searched around each catalog line, micron.
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Largest flux among rows strictly inside `(center - tolerance, center + tolerance)`.
///
/// This is a peak-near-line heuristic, not a fitted line flux. `None` when no
/// row falls in the window or every row in it is missing.
pub fn peak_near(table: &SpectrumTable, center: f64, tolerance: f64) -> Option<f64> {
    let (lo, hi) = (center - tolerance, center + tolerance);
    table
        .rows
        .iter()
        .filter(|row| row.wavelength > lo && row.wavelength < hi)
        .filter_map(|row| row.flux)
        .fold(None, |acc: Option<f64>, f| Some(acc.map_or(f, |m| m.max(f))))
}

/// Which side is larger.
///
/// A missing value on either side compares false both ways and therefore
/// lands in `Neither`, even when the other side holds a real flux. Downstream
/// summaries depend on this, so it must not be "fixed" into a win.
pub fn classify(first: Option<f64>, second: Option<f64>) -> Stronger {
    match (first, second) {
        (Some(a), Some(b)) if a > b => Stronger::First,
        (Some(a), Some(b)) if b > a => Stronger::Second,
        _ => Stronger::Neither,
    }
}

/// One summary row per catalog line, in catalog order.
pub fn summarize(
    first: &SpectrumTable,
    second: &SpectrumTable,
    catalog: &LineCatalog,
    tolerance: f64,
) -> Vec<LineSummaryRow> {
    let rows: Vec<LineSummaryRow> = catalog
        .iter()
        .map(|line| {
            let a = peak_near(first, line.wavelength, tolerance);
            let b = peak_near(second, line.wavelength, tolerance);
            LineSummaryRow {
                label: line.label.clone(),
                wavelength: line.wavelength,
                first: a,
                second: b,
                stronger: classify(a, b),
            }
        })
        .collect();

    info!(
        "Tabulated {} lines ({} vs {}, ±{tolerance} μm): {} with both fluxes",
        rows.len(),
        first.name,
        second.name,
        rows.iter()
            .filter(|r| r.first.is_some() && r.second.is_some())
            .count()
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::write_summary;
    use crate::data::model::{CatalogLine, SpectrumRow};

    fn table(name: &str, rows: &[(f64, f64)]) -> SpectrumTable {
        SpectrumTable::new(
            name,
            rows.iter().map(|&(w, f)| SpectrumRow::new(w, f)).collect(),
        )
    }

    fn catalog(lines: &[(&str, f64)]) -> LineCatalog {
        LineCatalog::new(
            lines
                .iter()
                .map(|&(label, wavelength)| CatalogLine {
                    label: label.to_string(),
                    wavelength,
                })
                .collect(),
        )
        .unwrap()
    }

    fn csv(rows: &[LineSummaryRow]) -> String {
        let mut out = Vec::new();
        write_summary(&mut out, rows).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_ne_ii_missing_second_region() {
        let a = table("a", &[(12.6, 9.0), (12.75, 5.0), (13.0, 8.0)]);
        let b = table("b", &[(12.6, 1.0), (13.0, 2.0)]);
        let rows = summarize(&a, &b, &catalog(&[("[Ne II] 12.81", 12.81)]), 0.1);

        let record = rows[0].to_record();
        assert_eq!(record.first, "5.00");
        assert_eq!(record.second, "—");
        assert_eq!(record.stronger, "Equal/—");
    }

    #[test]
    fn test_pah_second_region_stronger() {
        let a = table("a", &[(7.7, 3.0)]);
        let b = table("b", &[(7.7, 4.5)]);
        let rows = summarize(&a, &b, &catalog(&[("PAH 7.7", 7.7)]), 0.1);

        let record = rows[0].to_record();
        assert_eq!(record.first, "3.00");
        assert_eq!(record.second, "4.50");
        assert_eq!(record.stronger, "Region 2");
    }

    #[test]
    fn test_missing_first_never_loses() {
        assert_eq!(classify(None, Some(100.0)), Stronger::Neither);
        assert_eq!(classify(Some(100.0), None), Stronger::Neither);
        assert_eq!(classify(None, None), Stronger::Neither);
        assert_eq!(classify(Some(2.0), Some(2.0)), Stronger::Neither);
        assert_eq!(classify(Some(2.5), Some(2.0)), Stronger::First);
    }

    #[test]
    fn test_window_is_open() {
        let t = table("t", &[(7.25, 9.0), (7.75, 9.0), (7.3, 1.0)]);
        assert_eq!(peak_near(&t, 7.5, 0.25), Some(1.0));
        assert_eq!(peak_near(&t, 7.5, 0.1), None);
    }

    #[test]
    fn test_missing_rows_inside_window_are_skipped() {
        let t = table("t", &[(11.25, f64::NAN), (11.3, 2.0), (11.35, f64::NAN)]);
        assert_eq!(peak_near(&t, 11.3, 0.1), Some(2.0));
        let gaps = table("g", &[(11.3, f64::NAN)]);
        assert_eq!(peak_near(&gaps, 11.3, 0.1), None);
    }

    #[test]
    fn test_header_and_catalog_order() {
        let a = table("a", &[(6.2, 1.0), (11.3, 4.0)]);
        let b = table("b", &[(6.2, 2.0), (11.3, 3.0)]);
        let cat = catalog(&[("PAH 11.3", 11.3), ("PAH 6.2", 6.2), ("[O IV] 25.89", 25.89)]);
        let text = csv(&summarize(&a, &b, &cat, DEFAULT_TOLERANCE));

        assert_eq!(
            text,
            "Line,Wavelength (μm),Region 1 Flux,Region 2 Flux,Stronger In\n\
             PAH 11.3,11.3,4.00,3.00,Region 1\n\
             PAH 6.2,6.2,1.00,2.00,Region 2\n\
             [O IV] 25.89,25.89,—,—,Equal/—\n"
        );
    }

    #[test]
    fn test_idempotent_output() {
        let a = table("a", &[(12.75, 5.0), (7.7, 3.0), (17.03, 0.5)]);
        let b = table("b", &[(7.68, 4.5), (17.04, 0.7)]);
        let cat = LineCatalog::mid_infrared();
        let first = csv(&summarize(&a, &b, &cat, DEFAULT_TOLERANCE));
        let second = csv(&summarize(&a, &b, &cat, DEFAULT_TOLERANCE));
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(first.lines().count(), cat.len() + 1);
    }
}
