//! Numerical analysis of the matched catalogs.

pub mod amr;
pub mod binning;
pub mod deproject;
pub mod diffs;
pub mod integrate;
pub mod kde;
pub mod runs;
