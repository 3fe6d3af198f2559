/// Data layer: table types, loading and writing.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet          lines.json
///        │                              │
///        ▼                              ▼
///   ┌──────────┐                 ┌─────────────┐
///   │  loader   │ → SpectrumTable │ LineCatalog │
///   └──────────┘                 └─────────────┘
///        │                              │
///        └──────────────┬───────────────┘
///                       ▼
///            analysis::{overlay, tabulate}
///                       │
///                       ▼
///              LineSummaryRow → summary.csv
/// ```

pub mod loader;
pub mod model;
