use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, Float32Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use log::warn;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{CatalogLine, LineCatalog, LineSummaryRow, SpectrumRow, SpectrumTable};
use crate::error::PipelineError;

const WAVELENGTH_HEADERS: &[&str] = &[
    "wavelength",
    "Wavelength",
    "Wavelength (micron)",
    "Wavelength (um)",
    "Wavelength (μm)",
];
const FLUX_HEADERS: &[&str] = &["flux", "Flux"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a wavelength/flux table.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with `wavelength` and `flux` columns
/// * `.json`    – `[{ "wavelength": 5.0, "flux": 1.2 }, ...]`
/// * `.parquet` – `wavelength` and `flux` float columns
///
/// Missing flux cells (empty, `nan`, JSON `null`, Parquet null) load as `None`.
pub fn load_table(path: &Path) -> Result<SpectrumTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let rows = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let table = SpectrumTable::new(table_name(path), rows);
    if table.is_empty() {
        warn!("{} holds no spectrum rows", path.display());
    }
    Ok(table)
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum")
        .to_string()
}

/// Fold NaN fluxes into the missing marker so every loader agrees.
fn normalise(rows: Vec<SpectrumRow>) -> Vec<SpectrumRow> {
    rows.into_iter()
        .map(|row| SpectrumRow {
            wavelength: row.wavelength,
            flux: row.flux.filter(|f| !f.is_nan()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Vec<SpectrumRow>> {
    // Trimmed so the column check and serde see the same header names.
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();

    for (column, accepted) in [("wavelength", WAVELENGTH_HEADERS), ("flux", FLUX_HEADERS)] {
        if !headers.iter().any(|h| accepted.contains(&h)) {
            return Err(PipelineError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            }
            .into());
        }
    }

    let mut rows = Vec::new();
    for (row_no, result) in reader.deserialize::<SpectrumRow>().enumerate() {
        rows.push(result.with_context(|| format!("CSV row {row_no}"))?);
    }
    Ok(normalise(rows))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<Vec<SpectrumRow>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let rows: Vec<SpectrumRow> = serde_json::from_str(&text).context("parsing JSON records")?;
    Ok(normalise(rows))
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn load_parquet(path: &Path) -> Result<Vec<SpectrumRow>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let column = |name: &str| {
            schema
                .index_of(name)
                .map(|idx| batch.column(idx).clone())
                .map_err(|_| PipelineError::MissingColumn {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                })
        };
        let wavelengths = float_column(&column("wavelength")?)
            .context("reading 'wavelength' column")?;
        let fluxes = float_column(&column("flux")?).context("reading 'flux' column")?;

        for (row, (wavelength, flux)) in wavelengths.into_iter().zip(fluxes).enumerate() {
            let wavelength =
                wavelength.with_context(|| format!("Row {row}: null wavelength"))?;
            rows.push(SpectrumRow { wavelength, flux });
        }
    }
    Ok(normalise(rows))
}

/// Read a Float64 or Float32 column; nulls become `None`.
fn float_column(col: &Arc<dyn Array>) -> Result<Vec<Option<f64>>> {
    match col.data_type() {
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            Ok(arr.iter().collect())
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("expected Float32Array")?;
            Ok(arr.iter().map(|v| v.map(f64::from)).collect())
        }
        other => bail!("Expected Float64 or Float32 column, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Line catalog
// ---------------------------------------------------------------------------

/// Load a catalog from `[{ "label": "PAH 7.7", "wavelength": 7.7 }, ...]`.
pub fn load_catalog(path: &Path) -> Result<LineCatalog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    let lines: Vec<CatalogLine> = serde_json::from_str(&text).context("parsing catalog JSON")?;
    let catalog = LineCatalog::new(lines)?;
    if catalog.is_empty() {
        warn!("catalog {} lists no lines", path.display());
    }
    Ok(catalog)
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write an extracted spectrum as `wavelength,flux`; missing flux is an empty cell.
pub fn write_spectrum_csv(path: &Path, table: &SpectrumTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in &table.rows {
        writer.serialize(row).context("writing spectrum row")?;
    }
    writer.flush().context("flushing spectrum CSV")?;
    Ok(())
}

/// Serialize summary rows as CSV into any writer.
pub fn write_summary<W: Write>(out: W, rows: &[LineSummaryRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(row.to_record()).context("writing summary row")?;
    }
    writer.flush().context("flushing summary CSV")?;
    Ok(())
}

pub fn write_summary_csv(path: &Path, rows: &[LineSummaryRow]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_summary(file, rows)
}

/// Aligned text rendering of the summary for the terminal.
pub fn format_summary_table(rows: &[LineSummaryRow]) -> Result<String> {
    let records: Vec<_> = rows.iter().map(LineSummaryRow::to_record).collect();
    let schema = Arc::new(Schema::new(vec![
        Field::new("Line", DataType::Utf8, false),
        Field::new("Wavelength (μm)", DataType::Float64, false),
        Field::new("Region 1 Flux", DataType::Utf8, false),
        Field::new("Region 2 Flux", DataType::Utf8, false),
        Field::new("Stronger In", DataType::Utf8, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.line))),
        Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.wavelength))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.first.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.second.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.stronger.as_str()))),
    ];
    let batch = RecordBatch::try_new(schema, columns).context("building summary batch")?;
    Ok(pretty_format_batches(&[batch])
        .context("formatting summary")?
        .to_string())
}
