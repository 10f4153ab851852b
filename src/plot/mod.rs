//! PNG figures of the matched catalogs.
//!
//! `figures` decides what goes on every panel, `panels` draws one panel
//! with plotters, `png` owns the in-memory canvas and the encoding.

pub mod figures;
pub mod panels;
pub mod png;

pub use figures::make_plots;
