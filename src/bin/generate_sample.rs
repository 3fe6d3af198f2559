//! Write a small synthetic MIRI-like cube plus two DS9 regions and a
//! pipeline config, so every subcommand can be tried without real data.
//!
//! ```text
//! cargo run --bin generate_sample -- [OUTPUT_DIR]
//! cargo run -- run sample_data/pipeline.json
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use fitsio::FitsFile;
use fitsio::images::{ImageDescription, ImageType};

const NX: usize = 31;
const NY: usize = 31;
const NZ: usize = 400;

const RA0: f64 = 40.669_63;
const DEC0: f64 = -0.013_28;
const PIXEL_DEG: f64 = 0.13 / 3600.0;
const LAMBDA0: f64 = 7.0;
const DLAMBDA: f64 = 0.0175;

/// (centre μm, sigma μm, nucleus amplitude, disk amplitude)
const LINES: &[(f64, f64, f64, f64)] = &[
    (7.7, 0.15, 1.5, 4.0),
    (8.6, 0.10, 0.6, 1.8),
    (10.51, 0.01, 3.0, 0.2),
    (11.3, 0.08, 1.2, 3.5),
    (12.28, 0.01, 0.5, 0.8),
    (12.7, 0.10, 0.8, 1.6),
    (12.81, 0.012, 6.0, 1.0),
];

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**) for the sample noise. A fixed
/// seed keeps regenerated samples byte-identical, so no `rand` dependency.
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Flux at 0-based pixel (x, y) of slice `k`.
///
/// A compact nucleus with strong fine-structure lines sits at the centre;
/// an extended PAH-bright disk covers the rest.
fn model_flux(x: usize, y: usize, k: usize, rng: &mut SimpleRng) -> f64 {
    // Blank the left edge and the last few slices, as a real mosaic would.
    if x == 0 || k >= NZ - 4 {
        return f64::NAN;
    }
    let wavelength = LAMBDA0 + k as f64 * DLAMBDA;
    let (cx, cy) = ((NX - 1) as f64 / 2.0, (NY - 1) as f64 / 2.0);
    let r2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
    let nucleus = (-r2 / (2.0 * 2.0_f64.powi(2))).exp();
    let disk = (-r2 / (2.0 * 10.0_f64.powi(2))).exp();

    let continuum = 0.5 + 0.05 * (wavelength - LAMBDA0);
    let lines: f64 = LINES
        .iter()
        .map(|&(mu, sigma, a_nuc, a_disk)| {
            gaussian(wavelength, mu, sigma, a_nuc * nucleus + a_disk * disk)
        })
        .sum();
    continuum * (nucleus + disk) + lines + rng.gauss(0.0, 0.02)
}

fn write_cube(path: &Path) -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let mut data = Vec::with_capacity(NX * NY * NZ);
    for k in 0..NZ {
        for y in 0..NY {
            for x in 0..NX {
                data.push(model_flux(x, y, k, &mut rng));
            }
        }
    }

    let mut fits = FitsFile::create(path)
        .overwrite()
        .open()
        .with_context(|| format!("creating {}", path.display()))?;
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[NZ, NY, NX],
    };
    let hdu = fits.create_image("SCI", &description)?;

    for (key, value) in [
        ("CRPIX1", (NX as f64 + 1.0) / 2.0),
        ("CRPIX2", (NY as f64 + 1.0) / 2.0),
        ("CRPIX3", 1.0),
        ("CRVAL1", RA0),
        ("CRVAL2", DEC0),
        ("CRVAL3", LAMBDA0),
        ("CDELT1", -PIXEL_DEG),
        ("CDELT2", PIXEL_DEG),
        ("CDELT3", DLAMBDA),
    ] {
        hdu.write_key(&mut fits, key, value)?;
    }
    for (key, value) in [
        ("CTYPE1", "RA---TAN"),
        ("CTYPE2", "DEC--TAN"),
        ("CTYPE3", "WAVE"),
        ("CUNIT3", "um"),
        ("BUNIT", "MJy/sr"),
    ] {
        hdu.write_key(&mut fits, key, value)?;
    }
    hdu.write_image(&mut fits, &data)?;
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = std::env::args().nth(1).unwrap_or_else(|| "sample_data".to_string());
    let out = Path::new(&out_dir);
    std::fs::create_dir_all(out).with_context(|| format!("creating {out_dir}"))?;

    let cube_path = out.join("synthetic_s3d.fits");
    write_cube(&cube_path)?;

    std::fs::write(
        out.join("nucleus.reg"),
        format!(
            "# Region file format: DS9 version 4.1\n\
             global color=green width=1\n\
             fk5\n\
             circle({RA0:.6},{DEC0:.6},0.5\") # text={{Nucleus}}\n"
        ),
    )?;
    std::fs::write(
        out.join("disk.reg"),
        "# Region file format: DS9 version 4.1\n\
         image\n\
         box(24,16,7,12,0) # text={Disk}\n",
    )?;

    let config = serde_json::json!({
        "cube": "synthetic_s3d.fits",
        "redshift": 0.00379,
        "regions": [
            { "region": "nucleus.reg", "spectrum": "out/nucleus.csv" },
            { "region": "disk.reg", "spectrum": "out/disk.csv" }
        ],
        "output": {
            "plot": "out/line_overlay.png",
            "summary": "out/line_summary.csv"
        }
    });
    std::fs::write(
        out.join("pipeline.json"),
        serde_json::to_string_pretty(&config)?,
    )?;

    println!(
        "Wrote {NX}x{NY}x{NZ} cube, two regions and pipeline.json to {}",
        out.display()
    );
    Ok(())
}
