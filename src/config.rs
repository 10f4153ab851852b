use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::binning::BinRule;
use crate::analysis::deproject::SkyCoord;
use crate::data::model::Galaxy;

// ---------------------------------------------------------------------------
// Config – everything a run needs besides the input data
// ---------------------------------------------------------------------------

/// Run configuration, read from a JSON file. Every section falls back to
/// its default, so `{}` is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inputs: Inputs,
    pub figures_dir: FiguresDir,
    pub galaxies: Galaxies,
    /// Detector plate scale used to turn radii in pixels into arcsec.
    pub plate_scale_arcsec_px: PlateScale,
    pub diffs: DiffConfig,
    pub amr: AmrConfig,
    pub monte_carlo: MonteCarloConfig,
    pub columns: LiteratureColumns,
}

impl Config {
    /// Load the configuration from `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn galaxy(&self, g: Galaxy) -> &GalaxyGeometry {
        match g {
            Galaxy::Smc => &self.galaxies.smc,
            Galaxy::Lmc => &self.galaxies.lmc,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Inputs {
    pub asteca_output: PathBuf,
    pub literature: PathBuf,
    /// Optional database cross-match table (extinction maps).
    pub crossmatch: Option<PathBuf>,
}

impl Default for Inputs {
    fn default() -> Self {
        Self {
            asteca_output: PathBuf::from("asteca_output.dat"),
            literature: PathBuf::from("literature.csv"),
            crossmatch: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiguresDir(pub PathBuf);

impl Default for FiguresDir {
    fn default() -> Self {
        Self(PathBuf::from("figures"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlateScale(pub f64);

impl Default for PlateScale {
    fn default() -> Self {
        Self(0.274)
    }
}

// ---------------------------------------------------------------------------
// Galaxy disk geometry
// ---------------------------------------------------------------------------

/// Centre, distance and disk orientation of one of the Clouds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalaxyGeometry {
    pub center_ra_deg: f64,
    pub center_dec_deg: f64,
    pub distance_kpc: f64,
    pub inclination_deg: f64,
    pub position_angle_deg: f64,
}

impl GalaxyGeometry {
    pub fn center(&self) -> SkyCoord {
        SkyCoord::new(self.center_ra_deg, self.center_dec_deg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Galaxies {
    pub smc: GalaxyGeometry,
    pub lmc: GalaxyGeometry,
}

impl Default for Galaxies {
    fn default() -> Self {
        Self {
            // 00h52m42s, -72d49m
            smc: GalaxyGeometry {
                center_ra_deg: 13.175,
                center_dec_deg: -72.816_667,
                distance_kpc: 60.26,
                inclination_deg: 65.5,
                position_angle_deg: 165.0,
            },
            // 05h20m47s, -69d28m41s
            lmc: GalaxyGeometry {
                center_ra_deg: 80.195_833,
                center_dec_deg: -69.478_056,
                distance_kpc: 50.12,
                inclination_deg: 35.8,
                position_angle_deg: 145.0,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis sections
// ---------------------------------------------------------------------------

/// Maximum accepted ASteCA vs literature difference per parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub metal: f64,
    pub age: f64,
    pub ext: f64,
    pub dist: f64,
    pub rad: f64,
    /// Parameters actually checked (`metal`, `age`, `ext`, `dist`, `rad`).
    pub checked: Vec<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            metal: 0.1,
            age: 0.5,
            ext: 0.1,
            dist: 0.1,
            rad: 100.0,
            checked: vec!["age".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmrConfig {
    /// [Fe/H] step of the KDE grid.
    pub grid_step: f64,
    /// Upper limit applied to ASteCA [Fe/H] errors.
    pub feh_err_cap: f64,
    /// Lower limit applied to literature [Fe/H] errors.
    pub lit_feh_err_floor: f64,
    /// Literature [Fe/H] errors at or below this mark a missing value.
    pub lit_feh_missing: f64,
    pub bins: BinRule,
}

impl Default for AmrConfig {
    fn default() -> Self {
        Self {
            grid_step: 0.01,
            feh_err_cap: 2.0,
            lit_feh_err_floor: 0.05,
            lit_feh_missing: -10.0,
            bins: BinRule::Knuth,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub runs: usize,
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            runs: 1000,
            seed: None,
        }
    }
}

/// Column names of the literature table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiteratureColumns {
    pub name: String,
    pub log_age: String,
    pub e_log_age: String,
    pub feh: String,
    pub e_feh: String,
    pub ebv: String,
    pub e_ebv: String,
    pub dist_mod: String,
    pub e_dist_mod: String,
    pub rad_px: String,
}

impl Default for LiteratureColumns {
    fn default() -> Self {
        Self {
            name: "Name".to_string(),
            log_age: "log_age".to_string(),
            e_log_age: "e_log_age".to_string(),
            feh: "feh".to_string(),
            e_feh: "e_feh".to_string(),
            ebv: "ebv".to_string(),
            e_ebv: "e_ebv".to_string(),
            dist_mod: "dist_mod".to_string(),
            e_dist_mod: "e_dist_mod".to_string(),
            rad_px: "rad_px".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_means_defaults() {
        let cfg = Config::load(None).unwrap();
        assert_eq!(cfg.figures_dir.0, PathBuf::from("figures"));
        assert_eq!(cfg.diffs.checked, vec!["age".to_string()]);
        assert_eq!(cfg.amr.bins, BinRule::Knuth);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"figures_dir": "out", "amr": {{"bins": 12}}, "monte_carlo": {{"seed": 7}}}}"#
        )
        .unwrap();

        let cfg = Config::load(Some(f.path())).unwrap();
        assert_eq!(cfg.figures_dir.0, PathBuf::from("out"));
        assert_eq!(cfg.amr.bins, BinRule::Count(12));
        assert_eq!(cfg.amr.grid_step, 0.01);
        assert_eq!(cfg.monte_carlo.seed, Some(7));
        assert_eq!(cfg.monte_carlo.runs, 1000);
        assert_eq!(cfg.galaxy(Galaxy::Lmc).inclination_deg, 35.8);
    }

    #[test]
    fn bad_json_names_the_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{{ not json").unwrap();
        let err = Config::load(Some(f.path())).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
    }
}
