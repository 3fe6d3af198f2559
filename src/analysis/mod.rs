//! Spectrum-level analysis: catalog overlays and line-flux comparison.

pub mod overlay;
pub mod tabulate;
