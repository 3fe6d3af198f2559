//! World coordinate mapping for IFU cubes.
//!
//! The two spatial axes use the gnomonic (TAN) projection with either a CD
//! matrix or CDELT + PC keywords. The spectral axis is linear:
//! `λ(k) = CRVAL3 + (k + 1 − CRPIX3) · CDELT3`, reported in micron.
//!
//! Pixel coordinates in this crate are 0-based with integer values at pixel
//! centres; FITS keywords are 1-based and converted on the way in.

use log::{debug, warn};

use crate::error::{PipelineError, Result};

// ── TAN projection ─────────────────────────────────────────────────────────

/// Forward gnomonic projection of `(ra, dec)` onto the plane tangent at
/// `(ra0, dec0)`. All angles in radians. `None` behind the tangent plane.
#[inline]
pub fn tan_project(ra: f64, dec: f64, ra0: f64, dec0: f64) -> Option<(f64, f64)> {
    let da = ra - ra0;
    let (sin_dec, cos_dec) = dec.sin_cos();
    let (sin_dec0, cos_dec0) = dec0.sin_cos();
    let cos_da = da.cos();

    let denom = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_da;
    if denom <= 1e-12 {
        return None;
    }

    let xi = cos_dec * da.sin() / denom;
    let eta = (sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_da) / denom;
    Some((xi, eta))
}

/// Inverse gnomonic projection; `(xi, eta)` and the result in radians.
#[inline]
pub fn inverse_tan_project(xi: f64, eta: f64, ra0: f64, dec0: f64) -> (f64, f64) {
    let (sin_dec0, cos_dec0) = dec0.sin_cos();
    let denom = cos_dec0 - eta * sin_dec0;
    let ra = ra0 + xi.atan2(denom);
    let dec = (sin_dec0 + eta * cos_dec0).atan2((xi * xi + denom * denom).sqrt());
    (ra.rem_euclid(std::f64::consts::TAU), dec)
}

// ── Celestial axes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CelestialWcs {
    /// Reference pixel, 1-based FITS convention.
    pub crpix: [f64; 2],
    /// Reference sky position in degrees.
    pub crval: [f64; 2],
    /// Pixel → intermediate world matrix, degrees per pixel.
    pub cd: [[f64; 2]; 2],
    cd_inv: [[f64; 2]; 2],
}

impl CelestialWcs {
    pub fn new(crpix: [f64; 2], crval: [f64; 2], cd: [[f64; 2]; 2]) -> Result<Self> {
        let det = cd[0][0] * cd[1][1] - cd[0][1] * cd[1][0];
        if det.abs() < 1e-30 || !det.is_finite() {
            return Err(PipelineError::InvalidCube(
                "celestial CD matrix is singular".to_string(),
            ));
        }
        let inv_det = 1.0 / det;
        let cd_inv = [
            [cd[1][1] * inv_det, -cd[0][1] * inv_det],
            [-cd[1][0] * inv_det, cd[0][0] * inv_det],
        ];
        Ok(Self {
            crpix,
            crval,
            cd,
            cd_inv,
        })
    }

    /// Build from header keywords. `key` returns a numeric keyword if present.
    pub fn from_keywords(key: impl Fn(&str) -> Option<f64>, hdu: &str) -> Result<Self> {
        let require = |name: &str| {
            key(name).ok_or_else(|| PipelineError::MissingMetadata {
                key: name.to_string(),
                hdu: hdu.to_string(),
            })
        };

        let crpix = [require("CRPIX1")?, require("CRPIX2")?];
        let crval = [require("CRVAL1")?, require("CRVAL2")?];

        let cd = if let Some(cd11) = key("CD1_1") {
            [
                [cd11, key("CD1_2").unwrap_or(0.0)],
                [key("CD2_1").unwrap_or(0.0), require("CD2_2")?],
            ]
        } else {
            let cdelt = [require("CDELT1")?, require("CDELT2")?];
            let pc = [
                [key("PC1_1").unwrap_or(1.0), key("PC1_2").unwrap_or(0.0)],
                [key("PC2_1").unwrap_or(0.0), key("PC2_2").unwrap_or(1.0)],
            ];
            [
                [cdelt[0] * pc[0][0], cdelt[0] * pc[0][1]],
                [cdelt[1] * pc[1][0], cdelt[1] * pc[1][1]],
            ]
        };

        debug!("celestial WCS: crpix={crpix:?} crval={crval:?} cd={cd:?}");
        Self::new(crpix, crval, cd)
    }

    /// Sky position (degrees) of a 0-based pixel position.
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x + 1.0 - self.crpix[0];
        let dy = y + 1.0 - self.crpix[1];
        let xi = (self.cd[0][0] * dx + self.cd[0][1] * dy).to_radians();
        let eta = (self.cd[1][0] * dx + self.cd[1][1] * dy).to_radians();
        let (ra, dec) = inverse_tan_project(
            xi,
            eta,
            self.crval[0].to_radians(),
            self.crval[1].to_radians(),
        );
        (ra.to_degrees(), dec.to_degrees())
    }

    /// 0-based pixel position of a sky position (degrees).
    pub fn sky_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let (xi, eta) = tan_project(
            ra.to_radians(),
            dec.to_radians(),
            self.crval[0].to_radians(),
            self.crval[1].to_radians(),
        )?;
        let (xi, eta) = (xi.to_degrees(), eta.to_degrees());
        let dx = self.cd_inv[0][0] * xi + self.cd_inv[0][1] * eta;
        let dy = self.cd_inv[1][0] * xi + self.cd_inv[1][1] * eta;
        Some((dx + self.crpix[0] - 1.0, dy + self.crpix[1] - 1.0))
    }

    /// Mean linear pixel size in degrees.
    pub fn pixel_scale_deg(&self) -> f64 {
        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        det.abs().sqrt()
    }
}

// ── Spectral axis ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SpectralAxis {
    pub crval: f64,
    pub cdelt: f64,
    pub crpix: f64,
    /// Multiplier taking header units to micron.
    pub to_micron: f64,
}

impl SpectralAxis {
    pub fn from_keywords(
        key: impl Fn(&str) -> Option<f64>,
        unit: Option<&str>,
        hdu: &str,
    ) -> Result<Self> {
        let crval = key("CRVAL3").ok_or_else(|| PipelineError::MissingMetadata {
            key: "CRVAL3".to_string(),
            hdu: hdu.to_string(),
        })?;
        let cdelt = key("CDELT3")
            .or_else(|| key("CD3_3"))
            .ok_or_else(|| PipelineError::MissingMetadata {
                key: "CDELT3".to_string(),
                hdu: hdu.to_string(),
            })?;
        let crpix = key("CRPIX3").unwrap_or(1.0);

        Ok(Self {
            crval,
            cdelt,
            crpix,
            to_micron: micron_factor(unit),
        })
    }

    /// Wavelength in micron of 0-based slice `k`.
    pub fn wavelength(&self, k: usize) -> f64 {
        (self.crval + (k as f64 + 1.0 - self.crpix) * self.cdelt) * self.to_micron
    }
}

fn micron_factor(unit: Option<&str>) -> f64 {
    match unit.map(|u| u.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("um") | Some("micron") | Some("microns") => 1.0,
        Some("m") => 1e6,
        Some("mm") => 1e3,
        Some("nm") => 1e-3,
        Some("angstrom") | Some("a") => 1e-4,
        Some(other) => {
            warn!("unrecognised spectral unit '{other}', assuming micron");
            1.0
        }
    }
}

/// Spatial and spectral mapping of one cube.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeWcs {
    pub celestial: CelestialWcs,
    pub spectral: SpectralAxis,
}
