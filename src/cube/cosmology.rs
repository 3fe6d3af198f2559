//! Flat ΛCDM distances for converting angular pixel sizes to physical sizes.

use crate::error::{PipelineError, Result};

/// Speed of light in km/s.
const C_KM_S: f64 = 299_792.458;
/// Photon density Ω_γ h² at T_cmb = 2.7255 K.
const OMEGA_GAMMA_H2: f64 = 2.4728e-5;
/// Radians per arcsecond.
const ARCSEC: f64 = std::f64::consts::PI / 648_000.0;
/// Simpson intervals per e-fold of (1 + z).
const STEPS_PER_E_FOLD: f64 = 2000.0;
const MIN_STEPS: usize = 100;
const MAX_STEPS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cosmology {
    /// Hubble constant in km/s/Mpc.
    pub h0: f64,
    /// Matter density today.
    pub omega_m: f64,
    /// CMB temperature today, K.
    pub t_cmb: f64,
    /// Effective number of (massless) neutrino species.
    pub n_eff: f64,
}

impl Cosmology {
    /// Planck 2018 (TT,TE,EE+lowE+lensing+BAO) parameters.
    ///
    /// All neutrinos are massless here. astropy's `Planck18` carries one
    /// 0.06 eV species, which moves Ω_Λ by about 1.4e-3 and distances at
    /// z < 1 by well under 0.1%.
    pub fn planck18() -> Self {
        Self {
            h0: 67.66,
            omega_m: 0.30966,
            t_cmb: 2.7255,
            n_eff: 3.046,
        }
    }

    /// Radiation density today: photons plus relativistic neutrinos.
    pub fn omega_r(&self) -> f64 {
        let h = self.h0 / 100.0;
        let omega_gamma = OMEGA_GAMMA_H2 * (self.t_cmb / 2.7255).powi(4) / (h * h);
        omega_gamma * (1.0 + 0.2271 * self.n_eff)
    }

    /// Dark energy density; the universe is flat.
    pub fn omega_lambda(&self) -> f64 {
        1.0 - self.omega_m - self.omega_r()
    }

    /// (1 + z) / E(z) written in the scale factor a = 1 / (1 + z), which
    /// stays finite as z grows without bound.
    fn integrand(&self, a: f64) -> f64 {
        a / (self.omega_r() + self.omega_m * a + self.omega_lambda() * a.powi(4)).sqrt()
    }

    /// Hubble distance c/H0 in Mpc.
    pub fn hubble_distance(&self) -> f64 {
        C_KM_S / self.h0
    }

    /// Line-of-sight comoving distance in Mpc.
    ///
    /// Composite Simpson's rule over x = ln(1 + z), so the step count grows
    /// with the logarithm of z and is capped at `MAX_STEPS`.
    pub fn comoving_distance(&self, z: f64) -> Result<f64> {
        check_redshift(z)?;
        if z == 0.0 {
            return Ok(0.0);
        }
        let x_max = z.ln_1p();
        let n = simpson_steps(z);
        let h = x_max / n as f64;
        let f = |x: f64| self.integrand((-x).exp());
        let mut sum = f(0.0) + f(x_max);
        for i in 1..n {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight * f(i as f64 * h);
        }
        Ok(self.hubble_distance() * sum * h / 3.0)
    }

    /// Angular-diameter distance in Mpc.
    pub fn angular_diameter_distance(&self, z: f64) -> Result<f64> {
        Ok(self.comoving_distance(z)? / (1.0 + z))
    }

    /// Proper transverse distance subtended by one arcsecond, in kpc.
    pub fn kpc_proper_per_arcsec(&self, z: f64) -> Result<f64> {
        Ok(self.angular_diameter_distance(z)? * 1000.0 * ARCSEC)
    }
}

impl Default for Cosmology {
    fn default() -> Self {
        Self::planck18()
    }
}

/// Even number of Simpson intervals for integrating out to `z`.
fn simpson_steps(z: f64) -> usize {
    let n = ((z.ln_1p() * STEPS_PER_E_FOLD).ceil() as usize).clamp(MIN_STEPS, MAX_STEPS);
    n + n % 2
}

fn check_redshift(z: f64) -> Result<()> {
    if z.is_finite() && z >= 0.0 {
        Ok(())
    } else {
        Err(PipelineError::InvalidRedshift(z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_planck18_flat() {
        let cosmo = Cosmology::planck18();
        assert_relative_eq!(
            cosmo.omega_m + cosmo.omega_r() + cosmo.omega_lambda(),
            1.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(cosmo.integrand(1.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_at_low_redshift() {
        // Hubble law regime: D ≈ cz/H0
        let cosmo = Cosmology::planck18();
        let d = cosmo.comoving_distance(0.001).unwrap();
        assert_relative_eq!(d, C_KM_S * 0.001 / 67.66, max_relative = 1e-3);
    }

    #[test]
    fn test_kpc_per_arcsec_at_z_0_1() {
        let scale = Cosmology::planck18().kpc_proper_per_arcsec(0.1).unwrap();
        assert!((1.85..1.95).contains(&scale), "got {scale}");
    }

    #[test]
    fn test_zero_redshift_has_zero_distance() {
        assert_eq!(Cosmology::planck18().kpc_proper_per_arcsec(0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_redshift() {
        let cosmo = Cosmology::planck18();
        for z in [-0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                cosmo.comoving_distance(z),
                Err(PipelineError::InvalidRedshift(_))
            ));
        }
    }

    #[test]
    fn test_angular_diameter_distance_turns_over() {
        let cosmo = Cosmology::planck18();
        let d1 = cosmo.angular_diameter_distance(1.0).unwrap();
        let d5 = cosmo.angular_diameter_distance(5.0).unwrap();
        assert!(d1 > d5);
    }

    #[test]
    fn test_extreme_redshift_stays_bounded() {
        let cosmo = Cosmology::planck18();
        for z in [1e8, 1e300] {
            assert!(simpson_steps(z) <= MAX_STEPS);
            assert_eq!(simpson_steps(z) % 2, 0);
            assert!(cosmo.comoving_distance(z).unwrap().is_finite());
        }
        // Past recombination the comoving distance has nearly converged.
        let d3 = cosmo.comoving_distance(1e3).unwrap();
        let d8 = cosmo.comoving_distance(1e8).unwrap();
        assert!(d8 > d3);
        assert!(d8 < 1.05 * d3, "d(1e3) = {d3}, d(1e8) = {d8}");
    }
}
