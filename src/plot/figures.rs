use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Array2;
use rand::Rng;

use super::panels::{Point, ScatterPanel, draw_amr, draw_density, padded_range};
use super::png::render;
use crate::analysis::amr::GalaxyAmr;
use crate::analysis::kde::{Extent, kde_map};
use crate::config::Config;
use crate::data::model::Galaxy;
use crate::params::{GalaxySample, InParams, ParamPair};

const FEH: &str = "[Fe/H]";
const LOG_AGE: &str = "log(age/yr)";
const EBV: &str = "E(B-V)";
const DIST_MOD: &str = "(m-M)0";
const MASS: &str = "M (Msun)";
const RAD_PC: &str = "r_cl (pc)";

const AGE_RANGE: (f64, f64) = (6.0, 10.0);
const FEH_RANGE: (f64, f64) = (-2.4, 0.15);
const MASS_RANGE: (f64, f64) = (-100.0, 10500.0);

/// Random offset added to plotted positions so overlapping clusters show.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Jitter {
    None,
    /// Uniform in `±frac` of the axis range.
    Symmetric(f64),
    /// Uniform in `[0, frac]` of the axis range.
    Positive(f64),
}

impl Jitter {
    fn offset<R: Rng + ?Sized>(self, axis: f64, rng: &mut R) -> f64 {
        match self {
            Jitter::None => 0.0,
            Jitter::Symmetric(f) => rng.gen_range(-f * axis..=f * axis),
            Jitter::Positive(f) => rng.gen_range(0.0..=f * axis),
        }
    }
}

/// Marker radius for a cluster radius in parsec.
fn marker_size(rad_pc: f64) -> f64 {
    (rad_pc * 5.0).max(0.0).sqrt().clamp(2.0, 30.0)
}

fn finish(path: PathBuf) -> PathBuf {
    log::info!("{} done", path.display());
    path
}

fn render_panels(path: &Path, size: (u32, u32), grid: (usize, usize), panels: &[ScatterPanel]) -> Result<()> {
    render(path, size, |root| {
        for (panel, area) in panels.iter().zip(root.split_evenly(grid).iter()) {
            panel.draw(area)?;
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// ASteCA vs literature
// ---------------------------------------------------------------------------

/// Clusters with a reference value of `pair`, ASteCA on x and reference on y.
fn pair_points<R: Rng + ?Sized>(
    pair: &ParamPair,
    z: &[f64],
    range: (f64, f64),
    jitter: Jitter,
    error_bars: bool,
    rng: &mut R,
) -> Vec<Point> {
    let axis = range.1 - range.0;
    pair.with_lit()
        .filter_map(|i| {
            let lit = pair.lit[i]?;
            let x = pair.asteca[i] + jitter.offset(axis, rng);
            let y = lit + jitter.offset(axis, rng);
            let p = Point::new(x, y, z[i]);
            Some(if error_bars {
                p.x_err(Some(pair.e_asteca[i])).y_err(pair.e_lit[i])
            } else {
                p
            })
        })
        .collect()
}

fn dist_mod_range(g: Galaxy) -> (f64, f64) {
    match g {
        Galaxy::Smc => (18.61, 19.39),
        Galaxy::Lmc => (18.11, 18.89),
    }
}

/// The five ASteCA vs literature panels of one galaxy.
pub fn as_vs_lit_panels<R: Rng + ?Sized>(s: &GalaxySample, rng: &mut R) -> Vec<ScatterPanel> {
    let g = s.galaxy.name();
    let age = &s.log_age.asteca;
    let specs = [
        ("[Fe/H]_asteca", "[Fe/H]_lit", LOG_AGE, &s.feh, age, (-2.4, 0.45), Jitter::Symmetric(0.01)),
        ("log(age/yr)_asteca", "log(age/yr)_lit", EBV, &s.log_age, &s.ebv.asteca, (5.8, 10.6), Jitter::None),
        ("E(B-V)_asteca", "E(B-V)_lit", LOG_AGE, &s.ebv, age, (-0.04, 0.29), Jitter::None),
        ("(m-M)0_asteca", "(m-M)0_lit", LOG_AGE, &s.dist_mod, age, dist_mod_range(s.galaxy), Jitter::Positive(0.05)),
        ("rad_asteca (px)", "rad_lit (px)", LOG_AGE, &s.radius_px, age, (1.0, 599.0), Jitter::None),
    ];

    specs
        .into_iter()
        .enumerate()
        .map(|(k, (xl, yl, zl, pair, z, range, jitter))| {
            // Radii have no reference errors to show.
            let error_bars = k != 4;
            ScatterPanel::one_to_one(xl, yl, zl, range)
                .label(g)
                .points(pair_points(pair, z, range, jitter, error_bars, rng))
        })
        .collect()
}

pub fn make_as_vs_lit_plot<R: Rng + ?Sized>(s: &GalaxySample, dir: &Path, rng: &mut R) -> Result<PathBuf> {
    let path = dir.join(format!("as_vs_lit_{}.png", s.galaxy));
    log::info!("plotting ASteCA vs literature values for the {}", s.galaxy);
    render_panels(&path, (1400, 2100), (3, 2), &as_vs_lit_panels(s, rng))?;
    Ok(finish(path))
}

/// ASteCA vs MCEV extinction, coloured by the SF map value.
pub fn lit_ext_panels(params: &InParams) -> Vec<ScatterPanel> {
    params
        .iter()
        .map(|s| {
            let points = (0..s.len())
                .filter_map(|i| {
                    let mcev = s.ext_mcev[i]?;
                    let p = Point::new(s.ebv.asteca[i], mcev, s.ext_sf[i].unwrap_or(f64::NAN));
                    Some(p.x_err(Some(s.ebv.e_asteca[i])).y_err(s.e_ext_mcev[i]))
                })
                .collect();
            ScatterPanel::one_to_one("E(B-V)_asteca", "E(B-V)_MCEV", "E(B-V)_SF", (-0.02, 0.4))
                .label(s.galaxy.name())
                .points(points)
        })
        .collect()
}

pub fn make_lit_ext_plot(params: &InParams, dir: &Path) -> Result<PathBuf> {
    let path = dir.join("as_vs_lit_extin.png");
    log::info!("plotting ASteCA vs MCEV extinction");
    render_panels(&path, (1400, 700), (1, 2), &lit_ext_panels(params))?;
    Ok(finish(path))
}

// ---------------------------------------------------------------------------
// KDE maps
// ---------------------------------------------------------------------------

/// One density panel: the KDE of two ASteCA parameters and the clusters.
#[derive(Debug, Clone)]
pub struct KdePanel {
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub ext: Extent,
    /// `None` when the map could not be built.
    pub z: Option<Array2<f64>>,
    pub stars: Vec<(f64, f64)>,
}

struct Axis<'a> {
    label: &'static str,
    values: &'a [f64],
    errors: &'a [f64],
    range: (f64, f64),
}

fn kde_panel<R: Rng + ?Sized>(x: Axis<'_>, y: Axis<'_>, rng: &mut R) -> KdePanel {
    let ext = [x.range.0, x.range.1, y.range.0, y.range.1];
    let z = match kde_map(x.values, x.errors, y.values, y.errors, ext) {
        Ok(z) => Some(z),
        Err(e) => {
            log::warn!("no KDE map for {} vs {}: {e}", x.label, y.label);
            None
        }
    };
    let (jx, jy) = (Jitter::Positive(0.01), Jitter::Positive(0.01));
    let stars = x
        .values
        .iter()
        .zip(y.values)
        .map(|(&a, &b)| {
            (
                a + jx.offset(x.range.1 - x.range.0, rng),
                b + jy.offset(y.range.1 - y.range.0, rng),
            )
        })
        .collect();
    KdePanel {
        x_label: x.label,
        y_label: y.label,
        ext,
        z,
        stars,
    }
}

/// Age-[Fe/H], age-mass, distance-extinction and mass-[Fe/H] maps.
pub fn kde_panels<R: Rng + ?Sized>(s: &GalaxySample, rng: &mut R) -> Vec<KdePanel> {
    let (ebv_range, dm_range) = match s.galaxy {
        Galaxy::Smc => ((-0.014, 0.16), (18.75, 19.25)),
        Galaxy::Lmc => ((-0.02, 0.31), (18.25, 18.75)),
    };
    let age = || Axis {
        label: LOG_AGE,
        values: &s.log_age.asteca,
        errors: &s.log_age.e_asteca,
        range: AGE_RANGE,
    };
    let feh = || Axis {
        label: FEH,
        values: &s.feh.asteca,
        errors: &s.feh.e_asteca,
        range: FEH_RANGE,
    };
    let mass = || Axis {
        label: MASS,
        values: &s.mass,
        errors: &s.e_mass,
        range: MASS_RANGE,
    };
    let dist = Axis {
        label: DIST_MOD,
        values: &s.dist_mod.asteca,
        errors: &s.dist_mod.e_asteca,
        range: dm_range,
    };
    let ebv = Axis {
        label: EBV,
        values: &s.ebv.asteca,
        errors: &s.ebv.e_asteca,
        range: ebv_range,
    };

    vec![
        kde_panel(age(), feh(), rng),
        kde_panel(age(), mass(), rng),
        kde_panel(dist, ebv, rng),
        kde_panel(mass(), feh(), rng),
    ]
}

pub fn make_kde_plots<R: Rng + ?Sized>(s: &GalaxySample, dir: &Path, rng: &mut R) -> Result<PathBuf> {
    let path = dir.join(format!("as_kde_maps_{}.png", s.galaxy));
    log::info!("plotting KDE maps for the {}", s.galaxy);
    let panels = kde_panels(s, rng);
    render(&path, (1400, 1400), |root| {
        for (p, area) in panels.iter().zip(root.split_evenly((2, 2)).iter()) {
            if let Some(z) = &p.z {
                draw_density(area, z, p.ext, p.x_label, p.y_label, &p.stars)?;
            }
        }
        Ok(())
    })?;
    Ok(finish(path))
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Both galaxies on the sky, coloured by each fitted parameter.
pub fn ra_dec_panels(params: &InParams) -> Vec<ScatterPanel> {
    let collect = |f: fn(&GalaxySample) -> &[f64]| -> Vec<f64> {
        params.iter().flat_map(|s| f(s).iter().copied()).collect()
    };
    let ra = collect(|s| &s.ra);
    let dec = collect(|s| &s.dec);
    let rad = collect(|s| &s.rad_pc);
    let colourings = [
        (FEH, collect(|s| &s.feh.asteca)),
        (LOG_AGE, collect(|s| &s.log_age.asteca)),
        (EBV, collect(|s| &s.ebv.asteca)),
        (DIST_MOD, collect(|s| &s.dist_mod.asteca)),
        (MASS, collect(|s| &s.mass)),
        (RAD_PC, rad.clone()),
    ];
    let x_range = padded_range(&ra);
    let y_range = padded_range(&dec);

    colourings
        .into_iter()
        .map(|(label, z)| {
            let points = (0..ra.len())
                .map(|i| Point::new(ra[i], dec[i], z[i]).size(marker_size(rad[i])))
                .collect();
            ScatterPanel::new("RA (deg)", "Dec (deg)", label, x_range)
                .y_range(y_range)
                .points(points)
        })
        .collect()
}

pub fn make_ra_dec_plot(params: &InParams, dir: &Path) -> Result<PathBuf> {
    let path = dir.join("as_RA_DEC.png");
    log::info!("plotting RA vs DEC maps");
    render_panels(&path, (1600, 1800), (3, 2), &ra_dec_panels(params))?;
    Ok(finish(path))
}

// ---------------------------------------------------------------------------
// Parameter vs parameter, marker size from the cluster radius
// ---------------------------------------------------------------------------

/// A plotted quantity with optional error bars.
struct Series<'a> {
    label: &'a str,
    values: &'a [f64],
    errors: Option<&'a [f64]>,
}

impl<'a> Series<'a> {
    fn new(label: &'a str, values: &'a [f64]) -> Self {
        Self {
            label,
            values,
            errors: None,
        }
    }

    fn with_errors(label: &'a str, values: &'a [f64], errors: &'a [f64]) -> Self {
        Self {
            label,
            values,
            errors: Some(errors),
        }
    }

    fn error(&self, i: usize) -> Option<f64> {
        self.errors.map(|e| e[i])
    }
}

fn wide_panel(s: &GalaxySample, x: Series<'_>, x_range: (f64, f64), y: Series<'_>, z: Series<'_>) -> ScatterPanel {
    let points = (0..x.values.len())
        .map(|i| {
            Point::new(x.values[i], y.values[i], z.values[i])
                .x_err(x.error(i))
                .y_err(y.error(i))
                .size(marker_size(s.rad_pc[i]))
        })
        .collect();
    ScatterPanel::new(x.label, y.label, z.label, x_range)
        .label(s.galaxy.name())
        .points(points)
}

/// Integrated colour against age, coloured by mass.
pub fn int_cols_panels(params: &InParams) -> Vec<ScatterPanel> {
    params
        .iter()
        .map(|s| {
            wide_panel(
                s,
                Series::with_errors("log(age/yr)_asteca", &s.log_age.asteca, &s.log_age.e_asteca),
                (6.5, 9.95),
                Series::new("(C-T1)0_asteca", &s.int_color),
                Series::new(MASS, &s.mass),
            )
        })
        .collect()
}

pub fn make_int_cols_plot(params: &InParams, dir: &Path) -> Result<PathBuf> {
    let path = dir.join("as_integ_colors.png");
    log::info!("plotting integrated colors");
    render_panels(&path, (1600, 1200), (2, 1), &int_cols_panels(params))?;
    Ok(finish(path))
}

/// Concentration parameter against age and [Fe/H], per galaxy.
pub fn concent_panels(params: &InParams) -> Vec<ScatterPanel> {
    const CONC: &str = "Concentration (N_memb/pc^2)";
    let mut panels = Vec::new();
    for s in params.iter() {
        let conc = s.concentration();
        panels.push(wide_panel(
            s,
            Series::with_errors("log(age/yr)_asteca", &s.log_age.asteca, &s.log_age.e_asteca),
            (6.5, 10.4),
            Series::new(CONC, &conc),
            Series::new(MASS, &s.mass),
        ));
        panels.push(wide_panel(
            s,
            Series::with_errors("[Fe/H]_asteca", &s.feh.asteca, &s.feh.e_asteca),
            (-2.3, 0.2),
            Series::new(CONC, &conc),
            Series::new(MASS, &s.mass),
        ));
    }
    panels
}

pub fn make_concent_plot(params: &InParams, dir: &Path) -> Result<PathBuf> {
    let path = dir.join("concent_param.png");
    log::info!("plotting concentration parameter");
    render_panels(&path, (1600, 2400), (4, 1), &concent_panels(params))?;
    Ok(finish(path))
}

/// Radius in parsec against age, [Fe/H] and mass.
pub fn radius_panels(s: &GalaxySample) -> Vec<ScatterPanel> {
    let rad = || Series::with_errors("R_cl;asteca (pc)", &s.rad_pc, &s.e_rad_pc);
    vec![
        wide_panel(
            s,
            rad(),
            (0.0, 40.0),
            Series::with_errors("log(age/yr)_asteca", &s.log_age.asteca, &s.log_age.e_asteca),
            Series::new(MASS, &s.mass),
        ),
        wide_panel(
            s,
            rad(),
            (0.0, 40.0),
            Series::with_errors("[Fe/H]_asteca", &s.feh.asteca, &s.feh.e_asteca),
            Series::new(MASS, &s.mass),
        ),
        wide_panel(
            s,
            rad(),
            (0.0, 40.0),
            Series::with_errors(MASS, &s.mass, &s.e_mass),
            Series::new("log(age/yr)_asteca", &s.log_age.asteca),
        ),
    ]
}

pub fn make_radius_plot(s: &GalaxySample, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(format!("as_rad_vs_params_{}.png", s.galaxy));
    log::info!("plotting radius vs parameters for the {}", s.galaxy);
    render_panels(&path, (1600, 1800), (3, 1), &radius_panels(s))?;
    Ok(finish(path))
}

/// KDE probability against contamination index, coloured by age and [Fe/H].
pub fn probs_ci_panels(params: &InParams) -> Vec<ScatterPanel> {
    let range = (-0.01, 1.02);
    let mut panels = Vec::new();
    for s in params.iter() {
        for (z_label, z) in [("log(age/yr)_asteca", &s.log_age.asteca), ("[Fe/H]_asteca", &s.feh.asteca)] {
            panels.push(
                wide_panel(
                    s,
                    Series::new("CI_asteca", &s.cont_ind),
                    range,
                    Series::new("prob_asteca", &s.kde_prob),
                    Series::new(z_label, z),
                )
                .y_range(range),
            );
        }
    }
    panels
}

pub fn make_probs_ci_plot(params: &InParams, dir: &Path) -> Result<PathBuf> {
    let path = dir.join("as_prob_vs_CI.png");
    log::info!("plotting probabilities vs contamination index");
    render_panels(&path, (1600, 1600), (2, 2), &probs_ci_panels(params))?;
    Ok(finish(path))
}

// ---------------------------------------------------------------------------
// AMR
// ---------------------------------------------------------------------------

pub fn make_amr_plot(amrs: &[GalaxyAmr], dir: &Path) -> Result<PathBuf> {
    let path = dir.join("as_amr.png");
    log::info!("plotting age-metallicity relations");
    render(&path, (1400, 900), |root| draw_amr(root, amrs))?;
    Ok(finish(path))
}

// ---------------------------------------------------------------------------
// Everything
// ---------------------------------------------------------------------------

/// Render every figure under `cfg.figures_dir`, returning the written paths.
pub fn make_plots<R: Rng + ?Sized>(
    params: &InParams,
    amrs: &[GalaxyAmr],
    cfg: &Config,
    rng: &mut R,
) -> Result<Vec<PathBuf>> {
    let dir = cfg.figures_dir.0.as_path();
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut written = Vec::new();
    for s in params.iter() {
        if s.is_empty() {
            log::warn!("{}: no clusters, per-galaxy figures skipped", s.galaxy);
            continue;
        }
        written.push(make_as_vs_lit_plot(s, dir, rng)?);
        written.push(make_kde_plots(s, dir, rng)?);
    }
    written.push(make_ra_dec_plot(params, dir)?);
    written.push(make_lit_ext_plot(params, dir)?);
    written.push(make_int_cols_plot(params, dir)?);
    written.push(make_concent_plot(params, dir)?);
    for s in params.iter().filter(|s| !s.is_empty()) {
        written.push(make_radius_plot(s, dir)?);
    }
    written.push(make_probs_ci_plot(params, dir)?);
    if amrs.is_empty() {
        log::warn!("no AMR available, as_amr.png skipped");
    } else {
        written.push(make_amr_plot(amrs, dir)?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pair(asteca: Vec<f64>, lit: Vec<Option<f64>>) -> ParamPair {
        let n = asteca.len();
        ParamPair {
            asteca,
            e_asteca: vec![0.1; n],
            lit,
            e_lit: vec![Some(0.2); n],
        }
    }

    fn sample(g: Galaxy) -> GalaxySample {
        let mut s = GalaxySample::new(g);
        s.names = vec!["A".into(), "B".into(), "C".into()];
        s.ra = vec![10.0, 12.0, 15.0];
        s.dec = vec![-72.0, -73.0, -71.5];
        s.feh = pair(vec![-1.0, -0.5, -0.2], vec![Some(-0.9), None, Some(-0.3)]);
        s.log_age = pair(vec![9.0, 8.5, 7.5], vec![Some(9.1), Some(8.4), None]);
        s.ebv = pair(vec![0.05, 0.1, 0.08], vec![None, None, None]);
        s.dist_mod = pair(vec![18.9, 19.0, 18.95], vec![Some(18.9); 3]);
        s.radius_px = pair(vec![100.0, 50.0, 80.0], vec![Some(90.0), None, None]);
        s.mass = vec![1000.0, 2000.0, 500.0];
        s.e_mass = vec![100.0; 3];
        s.rad_pc = vec![5.0, 3.0, 10.0];
        s.e_rad_pc = vec![0.5; 3];
        s.n_memb = vec![100.0, 50.0, 80.0];
        s.kde_prob = vec![0.9, 0.5, 0.7];
        s.cont_ind = vec![0.2, 0.6, 0.4];
        s.int_color = vec![1.0, 0.5, 0.2];
        s.ext_sf = vec![Some(0.04), None, None];
        s.ext_mcev = vec![Some(0.06), Some(0.1), None];
        s.e_ext_mcev = vec![Some(0.01), Some(0.02), None];
        s.dep_dist_kpc = vec![1.0, 2.0, 3.0];
        s
    }

    #[test]
    fn as_vs_lit_keeps_only_clusters_with_reference_values() {
        let mut rng = StdRng::seed_from_u64(3);
        let panels = as_vs_lit_panels(&sample(Galaxy::Smc), &mut rng);
        let counts: Vec<usize> = panels.iter().map(|p| p.points.len()).collect();
        assert_eq!(counts, vec![2, 2, 0, 3, 1]);
        assert!(panels.iter().all(|p| p.one_to_one && p.label == "SMC"));
        assert_eq!(panels[0].y_range, Some((-2.4, 0.45)));
        assert_eq!(panels[3].x_range, (18.61, 19.39));
        assert_eq!(panels[4].points[0].y_err, None);
        assert_eq!(panels[1].points[0].y_err, Some(0.2));
    }

    #[test]
    fn jitter_stays_within_its_fraction() {
        let mut rng = StdRng::seed_from_u64(11);
        let s = sample(Galaxy::Lmc);
        let panels = as_vs_lit_panels(&s, &mut rng);

        let feh_axis = 0.45 - -2.4;
        for (p, truth) in panels[0].points.iter().zip([-1.0, -0.2]) {
            assert!((p.x - truth).abs() <= 0.01 * feh_axis + 1e-12);
        }
        let dm_axis = 18.89 - 18.11;
        for (p, truth) in panels[3].points.iter().zip(&s.dist_mod.asteca) {
            let d = p.x - truth;
            assert!((0.0..=0.05 * dm_axis + 1e-12).contains(&d));
        }
        // No jitter on age.
        assert_eq!(panels[1].points[0].x, 9.0);
    }

    #[test]
    fn kde_panels_have_fixed_extents() {
        let mut rng = StdRng::seed_from_u64(5);
        let panels = kde_panels(&sample(Galaxy::Smc), &mut rng);
        assert_eq!(panels.len(), 4);
        assert_eq!(panels[0].ext, [6.0, 10.0, -2.4, 0.15]);
        assert_eq!(panels[2].ext, [18.75, 19.25, -0.014, 0.16]);
        for p in &panels {
            assert_eq!(p.stars.len(), 3);
            let z = p.z.as_ref().unwrap();
            assert!((z.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn combined_and_per_galaxy_layouts() {
        let params = InParams {
            smc: sample(Galaxy::Smc),
            lmc: sample(Galaxy::Lmc),
        };
        let ra_dec = ra_dec_panels(&params);
        assert_eq!(ra_dec.len(), 6);
        assert!(ra_dec.iter().all(|p| p.points.len() == 6));
        assert_eq!(ra_dec[5].points[2].z, 10.0);

        let ext = lit_ext_panels(&params);
        assert_eq!(ext.iter().map(|p| p.points.len()).collect::<Vec<_>>(), vec![2, 2]);
        assert!(ext[0].points[1].z.is_nan());

        assert_eq!(int_cols_panels(&params).len(), 2);
        let conc = concent_panels(&params);
        assert_eq!(conc.len(), 4);
        assert_eq!(conc[1].x_range, (-2.3, 0.2));
        assert_eq!(radius_panels(&params.smc).len(), 3);

        let probs = probs_ci_panels(&params);
        assert_eq!(probs.len(), 4);
        assert!(probs.iter().all(|p| p.y_range == Some((-0.01, 1.02))));
        assert_eq!(probs[2].label, "LMC");
    }

    #[test]
    fn marker_size_is_bounded() {
        assert_eq!(marker_size(0.0), 2.0);
        assert_eq!(marker_size(5.0), 5.0);
        assert_eq!(marker_size(1e6), 30.0);
    }
}
