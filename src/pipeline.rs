//! End-to-end run: pixel scale, two extractions, overlay plot, line summary.
//!
//! Extracted spectra are written to CSV and read back before plotting so the
//! later stages see exactly what a standalone `plot`/`tabulate` run would.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::analysis::overlay::build_figure;
use crate::analysis::tabulate::summarize;
use crate::config::PipelineConfig;
use crate::cube::Cube;
use crate::cube::cosmology::Cosmology;
use crate::cube::extract::extract_spectrum;
use crate::cube::scale::{PixelScale, pixel_scale};
use crate::data::loader::{load_table, write_spectrum_csv, write_summary_csv};
use crate::data::model::{LineSummaryRow, SpectrumTable};
use crate::render::render_figure;

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub scale: PixelScale,
    pub spectra: Vec<SpectrumTable>,
    pub summary: Vec<LineSummaryRow>,
}

pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    config.validate()?;
    let cosmology = Cosmology::planck18();

    let scale = pixel_scale(&config.cube, config.redshift, &cosmology)
        .with_context(|| format!("pixel scale of {}", config.cube.display()))?;

    let cube = Cube::open(&config.cube)
        .with_context(|| format!("opening cube {}", config.cube.display()))?;

    let mut spectra = Vec::with_capacity(config.regions.len());
    for spec in &config.regions {
        let extracted = extract_spectrum(&cube, &spec.region)
            .with_context(|| format!("extracting {}", spec.region.display()))?;
        create_parent(&spec.spectrum)?;
        write_spectrum_csv(&spec.spectrum, &extracted)?;

        let mut table = load_table(&spec.spectrum)?;
        table.name = spec.name.clone().unwrap_or(extracted.name);
        spectra.push(table);
    }

    let catalog = config.line_catalog()?;
    let title = config
        .output
        .title
        .clone()
        .unwrap_or_else(|| format!("{} vs {}", spectra[0].name, spectra[1].name));
    let figure = build_figure(title, &spectra, &catalog);
    render_figure(
        &figure,
        &config.output.plot,
        (config.output.width, config.output.height),
    )?;

    let summary = summarize(&spectra[0], &spectra[1], &catalog, config.tolerance);
    create_parent(&config.output.summary)?;
    write_summary_csv(&config.output.summary, &summary)?;
    info!("Line summary saved to {}", config.output.summary.display());

    Ok(PipelineReport {
        scale,
        spectra,
        summary,
    })
}

pub(crate) fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::test_support::write_uniform_cube;
    use crate::data::model::Stronger;

    #[test]
    fn test_full_run_on_uniform_cube() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_uniform_cube(&root.join("cube.fits"), 9, 2.0, true);
        std::fs::write(root.join("nucleus.reg"), "image\ncircle(5,5,2)\n").unwrap();
        std::fs::write(root.join("disk.reg"), "image; box(3,7,2,2,0)").unwrap();
        std::fs::write(
            root.join("lines.json"),
            r#"[{"label": "mid", "wavelength": 4.904}, {"label": "far", "wavelength": 20.0}]"#,
        )
        .unwrap();
        let config_path = root.join("pipeline.json");
        std::fs::write(
            &config_path,
            r#"{
                "cube": "cube.fits",
                "redshift": 0.1,
                "regions": [
                    { "name": "Nucleus", "region": "nucleus.reg", "spectrum": "out/nucleus.csv" },
                    { "region": "disk.reg", "spectrum": "out/disk.csv" }
                ],
                "catalog": "lines.json",
                "output": { "plot": "out/overlay.svg", "summary": "out/summary.csv" }
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&config_path).unwrap();
        let report = run(&config).unwrap();

        assert!((report.scale.arcsec - 0.13).abs() < 1e-9);
        assert_eq!(report.spectra[0].name, "Nucleus");
        assert_eq!(report.spectra[1].name, "disk");
        assert!(report.spectra.iter().all(|t| t.len() == 9));
        assert!(root.join("out/nucleus.csv").exists());
        assert!(root.join("out/overlay.svg").exists());

        assert_eq!(report.summary.len(), 2);
        assert_eq!(report.summary[0].first, Some(2.0));
        assert_eq!(report.summary[0].stronger, Stronger::Neither);
        assert_eq!(report.summary[1].first, None);

        let csv = std::fs::read_to_string(root.join("out/summary.csv")).unwrap();
        assert!(csv.starts_with("Line,Wavelength (μm),Region 1 Flux,Region 2 Flux,Stronger In\n"));
        assert!(csv.contains("mid,4.904,2.00,2.00,Equal/—"));
    }
}
