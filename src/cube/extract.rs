use std::path::Path;

use log::{info, warn};
use ndarray::Zip;

use super::Cube;
use super::region::{RegionMask, first_region};
use crate::data::model::{SpectrumRow, SpectrumTable};
use crate::error::{PipelineError, Result};

/// Mean of the in-mask, non-NaN values of every slice.
///
/// A slice with no valid in-mask value yields NaN; the output always has one
/// entry per slice.
pub fn masked_means(cube: &Cube, mask: &RegionMask) -> Result<Vec<f64>> {
    let (ny, nx) = cube.spatial_shape();
    if mask.inside.dim() != (ny, nx) {
        return Err(PipelineError::InvalidCube(format!(
            "mask shape {:?} does not match slice shape {:?}",
            mask.inside.dim(),
            (ny, nx)
        )));
    }

    let means = cube
        .data
        .outer_iter()
        .map(|slice| {
            let (sum, n) = Zip::from(&slice).and(&mask.inside).fold(
                (0.0, 0usize),
                |(sum, n), &value, &inside| {
                    if inside && !value.is_nan() {
                        (sum + value, n + 1)
                    } else {
                        (sum, n)
                    }
                },
            );
            if n == 0 { f64::NAN } else { sum / n as f64 }
        })
        .collect();
    Ok(means)
}

/// Extraction stage: first region of `region_path` → one flux per slice.
pub fn extract_spectrum(cube: &Cube, region_path: &Path) -> Result<SpectrumTable> {
    let region = first_region(region_path)?;
    let mask = region.to_mask(&cube.wcs.celestial, cube.spatial_shape());
    if mask.is_empty() {
        warn!(
            "region from {} covers no pixels; every slice will be missing",
            region_path.display()
        );
    }

    let rows: Vec<SpectrumRow> = cube
        .wavelengths()
        .into_iter()
        .zip(masked_means(cube, &mask)?)
        .map(|(wavelength, flux)| SpectrumRow::new(wavelength, flux))
        .collect();

    let name = region.name.unwrap_or_else(|| {
        region_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("region")
            .to_string()
    });
    let table = SpectrumTable::new(name, rows);
    info!(
        "Extracted '{}' over {} pixels: {} slices, {} missing",
        table.name,
        mask.count(),
        table.len(),
        table.missing_count()
    );
    Ok(table)
}
