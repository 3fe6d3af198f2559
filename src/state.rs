use crate::analysis::overlay::{SpectrumFigure, build_figure};
use crate::analysis::tabulate::{DEFAULT_TOLERANCE, summarize};
use crate::data::model::{LineCatalog, LineSummaryRow, SpectrumTable};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Which of the two compared spectra a file is loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    First,
    Second,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Spectrum for region 1 (None until the user loads a file).
    pub first: Option<SpectrumTable>,

    /// Spectrum for region 2.
    pub second: Option<SpectrumTable>,

    /// Lines marked on the plot and tabulated.
    pub catalog: LineCatalog,

    /// Half-width of the peak search window, micron.
    pub tolerance: f64,

    /// Whether catalog markers are drawn.
    pub show_markers: bool,

    /// Figure for the loaded spectra (cached).
    pub figure: Option<SpectrumFigure>,

    /// Line comparison; empty until both spectra are loaded.
    pub summary: Vec<LineSummaryRow>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            first: None,
            second: None,
            catalog: LineCatalog::mid_infrared(),
            tolerance: DEFAULT_TOLERANCE,
            show_markers: true,
            figure: None,
            summary: Vec::new(),
            status_message: None,
        }
    }
}

impl AppState {
    pub fn set_table(&mut self, slot: Slot, table: SpectrumTable) {
        match slot {
            Slot::First => self.first = Some(table),
            Slot::Second => self.second = Some(table),
        }
        self.status_message = None;
        self.recompute();
    }

    pub fn set_catalog(&mut self, catalog: LineCatalog) {
        self.catalog = catalog;
        self.recompute();
    }

    /// Only the summary depends on the tolerance.
    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
        self.resummarize();
    }

    pub fn table(&self, slot: Slot) -> Option<&SpectrumTable> {
        match slot {
            Slot::First => self.first.as_ref(),
            Slot::Second => self.second.as_ref(),
        }
    }

    /// Rebuild the figure and summary after a data change.
    pub fn recompute(&mut self) {
        let tables: Vec<SpectrumTable> = self
            .first
            .iter()
            .chain(self.second.iter())
            .cloned()
            .collect();

        self.figure = match tables.as_slice() {
            [] => None,
            [only] => Some(build_figure(only.name.clone(), &tables, &self.catalog)),
            [a, b, ..] => Some(build_figure(
                format!("{} vs {}", a.name, b.name),
                &tables,
                &self.catalog,
            )),
        };
        self.resummarize();
    }

    fn resummarize(&mut self) {
        self.summary = match (&self.first, &self.second) {
            (Some(a), Some(b)) => summarize(a, b, &self.catalog, self.tolerance),
            _ => Vec::new(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{SpectrumRow, Stronger};

    fn table(name: &str, flux: f64) -> SpectrumTable {
        SpectrumTable::new(
            name,
            vec![
                SpectrumRow::new(7.6, 1.0),
                SpectrumRow::new(7.68, flux),
                SpectrumRow::new(8.0, 1.0),
            ],
        )
    }

    #[test]
    fn test_summary_needs_both_tables() {
        let mut state = AppState::default();
        state.set_table(Slot::First, table("nucleus", 3.0));
        assert!(state.summary.is_empty());
        let figure = state.figure.as_ref().unwrap();
        assert_eq!(figure.title, "nucleus");
        assert!(!figure.show_legend());

        state.set_table(Slot::Second, table("disk", 4.5));
        assert_eq!(state.summary.len(), state.catalog.len());
        assert_eq!(state.figure.as_ref().unwrap().title, "nucleus vs disk");

        let pah = state
            .summary
            .iter()
            .find(|row| row.label == "PAH 7.7")
            .unwrap();
        assert_eq!(pah.stronger, Stronger::Second);
    }

    #[test]
    fn test_tolerance_change_resummarizes() {
        let mut state = AppState::default();
        state.set_table(Slot::First, table("a", 3.0));
        state.set_table(Slot::Second, table("b", 4.5));

        // 7.68 is 0.02 from the 7.7 line.
        state.set_tolerance(0.01);
        let pah = state.summary.iter().find(|r| r.label == "PAH 7.7").unwrap();
        assert_eq!(pah.first, None);
        assert_eq!(pah.stronger, Stronger::Neither);
    }
}
