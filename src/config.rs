use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::analysis::tabulate::DEFAULT_TOLERANCE;
use crate::data::loader::load_catalog;
use crate::data::model::LineCatalog;
use crate::render::DEFAULT_SIZE;

// ---------------------------------------------------------------------------
// Pipeline configuration (JSON)
// ---------------------------------------------------------------------------

/// Expected layout:
///
/// ```json
/// {
///   "cube": "data/ngc_ch2-short_s3d.fits",
///   "redshift": 0.0163,
///   "regions": [
///     { "name": "Nucleus", "region": "nucleus.reg", "spectrum": "out/nucleus.csv" },
///     { "name": "Disk",    "region": "disk.reg",    "spectrum": "out/disk.csv" }
///   ],
///   "catalog": "lines.json",
///   "tolerance": 0.1,
///   "output": { "plot": "out/overlay.png", "summary": "out/line_summary.csv" }
/// }
/// ```
///
/// Relative paths are resolved against the directory holding the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub cube: PathBuf,
    pub redshift: f64,
    pub regions: Vec<RegionSpec>,
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionSpec {
    /// Legend name; defaults to the region's `text={}` label or file stem.
    #[serde(default)]
    pub name: Option<String>,
    pub region: PathBuf,
    /// Where the extracted spectrum CSV is written.
    pub spectrum: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub plot: PathBuf,
    pub summary: PathBuf,
    pub title: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plot: PathBuf::from("plots/line_overlay.png"),
            summary: PathBuf::from("line_summary.csv"),
            title: None,
            width: DEFAULT_SIZE.0,
            height: DEFAULT_SIZE.1,
        }
    }
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: PipelineConfig =
            serde_json::from_str(&text).context("parsing pipeline config")?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.cube);
        for spec in &mut self.regions {
            resolve(&mut spec.region);
            resolve(&mut spec.spectrum);
        }
        if let Some(catalog) = &mut self.catalog {
            resolve(catalog);
        }
        resolve(&mut self.output.plot);
        resolve(&mut self.output.summary);
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.redshift.is_finite() && self.redshift >= 0.0) {
            bail!("redshift must be finite and non-negative, got {}", self.redshift);
        }
        if self.regions.len() != 2 {
            bail!(
                "exactly two regions are compared, config lists {}",
                self.regions.len()
            );
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            bail!("tolerance must be positive, got {}", self.tolerance);
        }
        Ok(())
    }

    /// The configured catalog file, or the built-in mid-IR set.
    pub fn line_catalog(&self) -> Result<LineCatalog> {
        match &self.catalog {
            Some(path) => load_catalog(path),
            None => Ok(LineCatalog::mid_infrared()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("pipeline.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_and_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "cube": "cube.fits",
                "redshift": 0.0163,
                "regions": [
                    { "region": "a.reg", "spectrum": "a.csv" },
                    { "name": "Disk", "region": "b.reg", "spectrum": "b.csv" }
                ]
            }"#,
        );
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.cube, dir.path().join("cube.fits"));
        assert_eq!(config.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(config.regions[1].name.as_deref(), Some("Disk"));
        assert_eq!(config.output.summary, dir.path().join("line_summary.csv"));
        assert_eq!(config.output.width, DEFAULT_SIZE.0);
        assert_eq!(config.line_catalog().unwrap(), LineCatalog::mid_infrared());
    }

    #[test]
    fn test_rejects_wrong_region_count_and_bad_redshift() {
        let dir = tempfile::tempdir().unwrap();
        let one_region = write_config(
            dir.path(),
            r#"{"cube": "c.fits", "redshift": 0.1,
                "regions": [{ "region": "a.reg", "spectrum": "a.csv" }]}"#,
        );
        assert!(PipelineConfig::load(&one_region).is_err());

        let negative = write_config(
            dir.path(),
            r#"{"cube": "c.fits", "redshift": -0.1, "regions": [
                { "region": "a.reg", "spectrum": "a.csv" },
                { "region": "b.reg", "spectrum": "b.csv" }]}"#,
        );
        assert!(PipelineConfig::load(&negative).is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{"cube": "c.fits", "redshift": 0.1, "regions": [], "tolerence": 0.2}"#,
        );
        assert!(PipelineConfig::load(&path).is_err());
    }
}
