use std::path::Path;

use fitsio::FitsFile;
use log::{debug, info};

use super::SCI_HDU;
use super::cosmology::Cosmology;
use crate::error::{PipelineError, Result};

/// Angular and physical size of one spatial pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelScale {
    pub redshift: f64,
    /// Pixel step in arcseconds (absolute value).
    pub arcsec: f64,
    /// Proper transverse size at the target, kpc.
    pub kpc: f64,
}

impl PixelScale {
    /// Scale for an angular step given in degrees (sign ignored).
    pub fn from_step(step_deg: f64, redshift: f64, cosmology: &Cosmology) -> Result<Self> {
        let arcsec = step_deg.abs() * 3600.0;
        let kpc = arcsec * cosmology.kpc_proper_per_arcsec(redshift)?;
        Ok(Self {
            redshift,
            arcsec,
            kpc,
        })
    }

    pub fn parsecs(&self) -> f64 {
        self.kpc * 1000.0
    }
}

/// Read the angular pixel step (degrees) from the `SCI` header.
///
/// `CDELT1` is preferred; cubes written with a CD matrix carry `CD1_1`
/// instead. Neither present is a hard error.
pub fn read_angular_step(path: &Path) -> Result<f64> {
    let mut fits = FitsFile::open(path)?;
    let hdu = fits.hdu(SCI_HDU)?;
    let step = hdu
        .read_key::<f64>(&mut fits, "CDELT1")
        .or_else(|_| hdu.read_key::<f64>(&mut fits, "CD1_1"))
        .map_err(|_| PipelineError::MissingMetadata {
            key: "CDELT1".to_string(),
            hdu: SCI_HDU.to_string(),
        })?;
    debug!("{}: angular step {step} deg", path.display());
    Ok(step)
}

/// Pixel-scale stage: header step → arcsec → kpc at `redshift`.
pub fn pixel_scale(path: &Path, redshift: f64, cosmology: &Cosmology) -> Result<PixelScale> {
    if !(redshift.is_finite() && redshift >= 0.0) {
        return Err(PipelineError::InvalidRedshift(redshift));
    }
    let step = read_angular_step(path)?;
    let scale = PixelScale::from_step(step, redshift, cosmology)?;
    info!(
        "Pixel scale at z={redshift}: {:.4}\" = {:.4} kpc",
        scale.arcsec, scale.kpc
    );
    Ok(scale)
}
