//! IFU cube access: FITS loading, world coordinates, regions and extraction.

pub mod cosmology;
pub mod extract;
pub mod region;
pub mod scale;
pub mod wcs;

use std::collections::HashMap;
use std::path::Path;

use fitsio::FitsFile;
use log::{debug, info};
use ndarray::Array3;

use crate::error::{PipelineError, Result};
use wcs::{CelestialWcs, CubeWcs, SpectralAxis};

/// Extension holding the science data in pipeline-produced cubes.
pub const SCI_HDU: &str = "SCI";

const WCS_KEYWORDS: &[&str] = &[
    "CRPIX1", "CRPIX2", "CRPIX3", "CRVAL1", "CRVAL2", "CRVAL3", "CDELT1", "CDELT2", "CDELT3",
    "CD1_1", "CD1_2", "CD2_1", "CD2_2", "CD3_3", "PC1_1", "PC1_2", "PC2_1", "PC2_2",
];

/// A spectral cube indexed `(slice, row, column)` with its coordinate mapping.
#[derive(Debug, Clone)]
pub struct Cube {
    pub data: Array3<f64>,
    pub wcs: CubeWcs,
}

impl Cube {
    pub fn from_parts(data: Array3<f64>, wcs: CubeWcs) -> Self {
        Self { data, wcs }
    }

    /// Load the `SCI` extension of a FITS cube.
    pub fn open(path: &Path) -> Result<Self> {
        let mut fits = FitsFile::open(path)?;
        let hdu = fits.hdu(SCI_HDU)?;

        // n = 0 reads the axis count itself.
        let naxis = |fits: &mut FitsFile, n: usize| -> Result<usize> {
            let key = match n {
                0 => "NAXIS".to_string(),
                n => format!("NAXIS{n}"),
            };
            let value: i64 = hdu
                .read_key(fits, &key)
                .map_err(|_| PipelineError::MissingMetadata {
                    key: key.clone(),
                    hdu: SCI_HDU.to_string(),
                })?;
            usize::try_from(value).map_err(|_| PipelineError::InvalidCube(format!("{key} = {value}")))
        };
        let ndim = naxis(&mut fits, 0)?;
        if ndim != 3 {
            return Err(PipelineError::InvalidCube(format!(
                "expected 3 axes in {SCI_HDU}, found {ndim}"
            )));
        }
        let (nx, ny, nz) = (naxis(&mut fits, 1)?, naxis(&mut fits, 2)?, naxis(&mut fits, 3)?);

        let mut cards = HashMap::new();
        for &key in WCS_KEYWORDS {
            if let Ok(value) = hdu.read_key::<f64>(&mut fits, key) {
                cards.insert(key, value);
            }
        }
        let spectral_unit = hdu.read_key::<String>(&mut fits, "CUNIT3").ok();
        let card = |k: &str| cards.get(k).copied();

        let wcs = CubeWcs {
            celestial: CelestialWcs::from_keywords(card, SCI_HDU)?,
            spectral: SpectralAxis::from_keywords(card, spectral_unit.as_deref(), SCI_HDU)?,
        };

        // FITS order: NAXIS1 varies fastest, so the flat buffer is already (z, y, x).
        let flat: Vec<f64> = hdu.read_image(&mut fits)?;
        let data = Array3::from_shape_vec((nz, ny, nx), flat)
            .map_err(|e| PipelineError::InvalidCube(e.to_string()))?;

        info!(
            "Loaded cube {} with {nz} slices of {ny}x{nx} pixels",
            path.display()
        );
        debug!("spectral axis: {:?}", wcs.spectral);
        Ok(Self { data, wcs })
    }

    pub fn n_slices(&self) -> usize {
        self.data.dim().0
    }

    /// `(rows, columns)` of one slice.
    pub fn spatial_shape(&self) -> (usize, usize) {
        let (_, ny, nx) = self.data.dim();
        (ny, nx)
    }

    /// Wavelength in micron of every slice, in slice order.
    pub fn wavelengths(&self) -> Vec<f64> {
        (0..self.n_slices())
            .map(|k| self.wcs.spectral.wavelength(k))
            .collect()
    }
}
