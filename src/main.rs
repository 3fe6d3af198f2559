mod analysis;
mod app;
mod color;
mod config;
mod cube;
mod data;
mod error;
mod pipeline;
mod render;
mod state;
mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use eframe::egui;
use log::info;

use analysis::overlay::build_figure;
use analysis::tabulate::{DEFAULT_TOLERANCE, summarize};
use app::LineViewerApp;
use config::PipelineConfig;
use cube::Cube;
use cube::cosmology::Cosmology;
use cube::extract::extract_spectrum;
use cube::scale::pixel_scale;
use data::loader::{
    format_summary_table, load_catalog, load_table, write_spectrum_csv, write_summary_csv,
};
use data::model::{LineCatalog, LineSummaryRow};
use render::{DEFAULT_SIZE, render_figure};
use state::{AppState, Slot};

/// Two-region spectral comparison for IFU cubes.
#[derive(Parser, Debug)]
#[command(name = "rusty-cube", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Angular and physical size of one spatial pixel
    Scale {
        /// Cube FITS file with a SCI extension
        cube: PathBuf,
        /// Target redshift
        #[arg(short, long)]
        redshift: f64,
    },

    /// Mean spectrum inside the first region of a DS9 region file
    Extract {
        cube: PathBuf,
        region: PathBuf,
        /// Output CSV (wavelength,flux)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Plot one spectrum, or overlay two, with catalog line markers
    Plot {
        /// One or two spectrum tables (csv, json, parquet)
        #[arg(required = true, num_args = 1..=2)]
        spectra: Vec<PathBuf>,
        /// JSON line catalog; the built-in mid-IR list otherwise
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Image path; `.svg` writes vector output
        #[arg(short, long, default_value = "plots/spectrum.png")]
        output: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value_t = DEFAULT_SIZE.0)]
        width: u32,
        #[arg(long, default_value_t = DEFAULT_SIZE.1)]
        height: u32,
    },

    /// Compare peak fluxes near catalog lines between two spectra
    Tabulate {
        first: PathBuf,
        second: PathBuf,
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Half-width of the search window, micron
        #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,
        /// Summary CSV; printed only when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run all stages from a JSON config
    Run { config: PathBuf },

    /// Interactive viewer
    View {
        #[arg(num_args = 0..=2)]
        spectra: Vec<PathBuf>,
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Scale { cube, redshift } => {
            let scale = pixel_scale(&cube, redshift, &Cosmology::planck18())
                .with_context(|| format!("pixel scale of {}", cube.display()))?;
            println!("Pixel scale: {:.4} arcsec", scale.arcsec);
            println!("At z={redshift}, 1 pixel ≈ {:.4} kpc ({:.1} pc)", scale.kpc, scale.parsecs());
        }

        Command::Extract {
            cube,
            region,
            output,
        } => {
            let cube = Cube::open(&cube).with_context(|| format!("opening {}", cube.display()))?;
            let table = extract_spectrum(&cube, &region)?;
            pipeline::create_parent(&output)?;
            write_spectrum_csv(&output, &table)?;
            info!("Spectrum saved to {}", output.display());
        }

        Command::Plot {
            spectra,
            catalog,
            output,
            title,
            width,
            height,
        } => {
            let tables = spectra
                .iter()
                .map(|p| load_table(p).with_context(|| format!("loading {}", p.display())))
                .collect::<Result<Vec<_>>>()?;
            let title = title.unwrap_or_else(|| {
                tables
                    .iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>()
                    .join(" vs ")
            });
            let figure = build_figure(title, &tables, &catalog_or_default(catalog)?);
            render_figure(&figure, &output, (width, height))?;
        }

        Command::Tabulate {
            first,
            second,
            catalog,
            tolerance,
            output,
        } => {
            if !(tolerance.is_finite() && tolerance > 0.0) {
                bail!("tolerance must be positive, got {tolerance}");
            }
            let a = load_table(&first).with_context(|| format!("loading {}", first.display()))?;
            let b = load_table(&second).with_context(|| format!("loading {}", second.display()))?;
            let rows = summarize(&a, &b, &catalog_or_default(catalog)?, tolerance);
            if let Some(path) = output {
                pipeline::create_parent(&path)?;
                write_summary_csv(&path, &rows)?;
                info!("Line summary saved to {}", path.display());
            }
            print_summary(&rows)?;
        }

        Command::Run { config } => {
            let config = PipelineConfig::load(&config)?;
            let report = pipeline::run(&config)?;
            println!(
                "Pixel scale: {:.4} arcsec ≈ {:.4} kpc at z={}",
                report.scale.arcsec, report.scale.kpc, report.scale.redshift
            );
            print_summary(&report.summary)?;
        }

        Command::View {
            spectra,
            catalog,
            tolerance,
        } => {
            let mut state = AppState::default();
            state.tolerance = tolerance;
            state.set_catalog(catalog_or_default(catalog)?);
            for (slot, path) in [Slot::First, Slot::Second].into_iter().zip(&spectra) {
                ui::panels::load_into(&mut state, slot, path);
            }
            run_viewer(state)?;
        }
    }
    Ok(())
}

fn catalog_or_default(path: Option<PathBuf>) -> Result<LineCatalog> {
    match path {
        Some(path) => load_catalog(&path),
        None => Ok(LineCatalog::mid_infrared()),
    }
}

fn print_summary(rows: &[LineSummaryRow]) -> Result<()> {
    println!("{}", format_summary_table(rows)?);
    Ok(())
}

fn run_viewer(state: AppState) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_min_inner_size([700.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Cube – Line Comparison",
        options,
        Box::new(|_cc| Ok(Box::new(LineViewerApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("viewer failed: {e}"))
}
