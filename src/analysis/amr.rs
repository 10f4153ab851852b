//! Age-metallicity relation from KDE-weighted [Fe/H] values.
//!
//! 1. Build the 2D KDE of the age-[Fe/H] plane.
//! 2. For every age column of the map, average the [Fe/H] grid values
//!    weighted by the KDE (see math.stackexchange.com/q/1457390).
//! 3. Bin the age axis and average the weighted [Fe/H] values in each bin,
//!    propagating their errors (Bevington & Robinson 1992).

use crate::analysis::binning::{BinRule, linspace};
use crate::analysis::kde::kde_2d;
use crate::config::AmrConfig;
use crate::data::filter::{AmrInput, Source, amr_sample};
use crate::data::model::Galaxy;
use crate::error::{NumericError, check_lengths};
use crate::params::InParams;

/// One weighted [Fe/H] value (and its spread) per grid age.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedAmr {
    pub age: Vec<f64>,
    pub feh: Vec<f64>,
    pub e_feh: Vec<f64>,
}

/// The weighted AMR averaged over age bins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinnedAmr {
    pub age: Vec<f64>,
    pub feh: Vec<f64>,
    pub e_feh: Vec<f64>,
    /// Bin edges, extended by one bin on each side.
    pub edges: Vec<f64>,
}

impl BinnedAmr {
    pub fn len(&self) -> usize {
        self.age.len()
    }

    pub fn is_empty(&self) -> bool {
        self.age.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalaxyAmr {
    pub galaxy: Galaxy,
    pub source: Source,
    pub clusters: AmrInput,
    pub weighted: WeightedAmr,
    pub binned: BinnedAmr,
}

/// KDE-weighted mean [Fe/H] and its weighted standard deviation for every
/// age of a `gd × gd` grid, `gd = (y_max - y_min) / grid_step`.
pub fn age_met_rel(
    age: &[f64],
    e_age: &[f64],
    feh: &[f64],
    e_feh: &[f64],
    grid_step: f64,
) -> Result<WeightedAmr, NumericError> {
    if age.is_empty() {
        return Err(NumericError::EmptySample);
    }
    check_lengths(age.len(), &[e_age, feh, e_feh])?;
    if !(grid_step > 0.0) {
        return Err(NumericError::InvalidInput(format!("grid step {grid_step}")));
    }

    let (x_min, x_max) = padded_range(age, e_age);
    let (y_min, y_max) = padded_range(feh, e_feh);

    let gd = ((y_max - y_min) / grid_step) as usize;
    if gd < 2 {
        return Err(NumericError::TooFewPoints { needed: 2, found: gd });
    }

    // Descending, matching the row order of the KDE map.
    let met_vals: Vec<f64> = linspace(y_min, y_max, gd).into_iter().rev().collect();
    let age_vals = linspace(x_min, x_max, gd);

    let z = kde_2d(age, e_age, feh, e_feh, [x_min, x_max, y_min, y_max], gd)?;

    let mut out = WeightedAmr::default();
    for (j, col) in z.columns().into_iter().enumerate() {
        let sum_w: f64 = col.sum();
        if sum_w <= 0.0 {
            log::warn!("no KDE weight at age {:.3}, skipped", age_vals[j]);
            continue;
        }
        let met_w = col.iter().zip(&met_vals).map(|(w, m)| w * m).sum::<f64>() / sum_w;

        let nume: f64 = col
            .iter()
            .zip(&met_vals)
            .map(|(w, m)| w * (met_w - m).powi(2))
            .sum();
        let deno = sum_w - col.iter().map(|w| w * w).sum::<f64>() / sum_w;
        let stdev = if deno > 0.0 { (nume / deno).sqrt() } else { 0.0 };

        out.age.push(age_vals[j]);
        out.feh.push(met_w);
        out.e_feh.push(stdev);
    }
    Ok(out)
}

fn padded_range(v: &[f64], e: &[f64]) -> (f64, f64) {
    let lo = v.iter().zip(e).map(|(v, e)| v - e).fold(f64::INFINITY, f64::min);
    let hi = v.iter().zip(e).map(|(v, e)| v + e).fold(f64::NEG_INFINITY, f64::max);
    (lo, hi)
}

/// Average the weighted AMR inside each age bin. Bins come from `rule`
/// applied to the cluster ages, extended by one bin on each side; the age
/// of a bin is the midpoint of the grid ages it holds. Empty bins are
/// skipped.
pub fn feh_avrg(
    cluster_ages: &[f64],
    rule: BinRule,
    weighted: &WeightedAmr,
) -> Result<BinnedAmr, NumericError> {
    let edges = rule.edges(cluster_ages)?;
    let delta = edges[1] - edges[0];

    let mut age_rang = Vec::with_capacity(edges.len() + 2);
    age_rang.push(edges[0] - delta);
    age_rang.extend_from_slice(&edges);
    age_rang.push(edges[edges.len() - 1] + delta);

    log::info!(
        "{} bins; {:.2} bin width; {:.2}-{:.2} limits",
        age_rang.len(),
        delta,
        age_rang[0],
        age_rang[age_rang.len() - 1]
    );

    let mut out = BinnedAmr {
        edges: age_rang.clone(),
        ..Default::default()
    };
    for pair in age_rang.windows(2) {
        let (min_a, max_a) = (pair[0], pair[1]);
        let in_bin: Vec<usize> = (0..weighted.age.len())
            .filter(|&k| min_a <= weighted.age[k] && weighted.age[k] < max_a)
            .collect();
        if in_bin.is_empty() {
            continue;
        }

        let ages = in_bin.iter().map(|&k| weighted.age[k]);
        let a_0 = ages.clone().fold(f64::INFINITY, f64::min);
        let a_1 = ages.fold(f64::NEG_INFINITY, f64::max);
        let n = in_bin.len() as f64;
        let feh_mean = in_bin.iter().map(|&k| weighted.feh[k]).sum::<f64>() / n;
        let err = in_bin.iter().map(|&k| weighted.e_feh[k].powi(2)).sum::<f64>().sqrt() / n;

        out.age.push(0.5 * (a_0 + a_1));
        out.feh.push(feh_mean);
        out.e_feh.push(err);
    }
    Ok(out)
}

/// AMR of one galaxy from the selected clusters.
pub fn galaxy_amr(
    galaxy: Galaxy,
    source: Source,
    clusters: AmrInput,
    cfg: &AmrConfig,
) -> Result<GalaxyAmr, NumericError> {
    let weighted = age_met_rel(
        &clusters.age_gyr,
        &clusters.e_age_gyr,
        &clusters.feh,
        &clusters.e_feh,
        cfg.grid_step,
    )?;
    let binned = feh_avrg(&clusters.age_gyr, cfg.bins, &weighted)?;
    Ok(GalaxyAmr {
        galaxy,
        source,
        clusters,
        weighted,
        binned,
    })
}

/// AMR of both Clouds. A galaxy whose AMR cannot be built is reported and
/// left out.
pub fn get_amr(params: &InParams, source: Source, cfg: &AmrConfig) -> Vec<GalaxyAmr> {
    Galaxy::ALL
        .iter()
        .filter_map(|&g| {
            let clusters = amr_sample(params.galaxy(g), source, cfg);
            log::info!("{g}: {} clusters in the AMR sample", clusters.len());
            match galaxy_amr(g, source, clusters, cfg) {
                Ok(amr) => Some(amr),
                Err(e) => {
                    log::warn!("{g}: AMR skipped: {e}");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GalaxySample;
    use approx::assert_relative_eq;

    /// `(name, log_age, e_log_age, feh, e_feh)` rows as ASteCA values.
    fn galaxy_sample(galaxy: Galaxy, rows: &[(&str, f64, f64, f64, f64)]) -> GalaxySample {
        let mut s = GalaxySample::new(galaxy);
        for &(name, log_age, e_log_age, feh, e_feh) in rows {
            s.names.push(name.to_string());
            s.log_age.asteca.push(log_age);
            s.log_age.e_asteca.push(e_log_age);
            s.log_age.lit.push(None);
            s.log_age.e_lit.push(None);
            s.feh.asteca.push(feh);
            s.feh.e_asteca.push(e_feh);
            s.feh.lit.push(None);
            s.feh.e_lit.push(None);
        }
        s
    }

    #[test]
    fn equal_metallicities_give_flat_relation() {
        let age = [1.0, 2.0, 3.5, 5.0, 8.0];
        let e_age = [0.2; 5];
        let feh = [-0.7; 5];
        let e_feh = [0.1; 5];

        let w = age_met_rel(&age, &e_age, &feh, &e_feh, 0.01).unwrap();
        // (y_max - y_min) / step lands on 20 up to rounding.
        assert!((19..=20).contains(&w.age.len()));
        for (&m, &e) in w.feh.iter().zip(&w.e_feh) {
            assert_relative_eq!(m, -0.7, epsilon = 1e-3);
            assert!(e > 0.0 && e < 0.2);
        }
        assert_relative_eq!(w.age[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(*w.age.last().unwrap(), 8.2, epsilon = 1e-12);
    }

    #[test]
    fn relation_follows_the_clusters() {
        // Old clusters metal poor, young ones metal rich.
        let age = [1.0, 1.2, 9.0, 9.5];
        let e_age = [0.1; 4];
        let feh = [-0.3, -0.35, -1.5, -1.45];
        let e_feh = [0.05; 4];

        let w = age_met_rel(&age, &e_age, &feh, &e_feh, 0.01).unwrap();
        assert!(w.feh[0] > -0.5);
        assert!(*w.feh.last().unwrap() < -1.3);
    }

    #[test]
    fn grid_too_coarse_is_an_error() {
        let r = age_met_rel(&[1.0], &[0.1], &[-1.0], &[0.001], 0.01);
        assert_eq!(r, Err(NumericError::TooFewPoints { needed: 2, found: 0 }));
    }

    #[test]
    fn binned_average_and_error_propagation() {
        let weighted = WeightedAmr {
            age: vec![0.5, 1.5, 2.5, 3.5],
            feh: vec![-1.0, -0.8, -0.6, -0.2],
            e_feh: vec![0.3, 0.4, 0.1, 0.1],
        };
        // Two bins: [0, 2) and [2, 4], extended to [-2, 6].
        let b = feh_avrg(&[0.0, 4.0], BinRule::Count(2), &weighted).unwrap();

        assert_eq!(b.edges, vec![-2.0, 0.0, 2.0, 4.0, 6.0]);
        assert_eq!(b.len(), 2);
        assert_relative_eq!(b.age[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(b.feh[0], -0.9, epsilon = 1e-12);
        assert_relative_eq!(b.e_feh[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(b.age[1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(b.feh[1], -0.4, epsilon = 1e-12);
    }

    #[test]
    fn galaxy_without_a_usable_grid_is_left_out() {
        let params = InParams {
            // One cluster with a tiny [Fe/H] error: the KDE grid has no rows.
            smc: galaxy_sample(Galaxy::Smc, &[("K3", 9.0, 0.1, -1.0, 0.001)]),
            lmc: galaxy_sample(
                Galaxy::Lmc,
                &[
                    ("SL1", 8.5, 0.1, -0.3, 0.1),
                    ("SL2", 8.8, 0.1, -0.4, 0.15),
                    ("SL3", 9.2, 0.1, -0.6, 0.1),
                    ("SL4", 9.5, 0.1, -0.8, 0.2),
                    ("SL5", 9.8, 0.1, -1.2, 0.15),
                    ("SL6", 10.0, 0.1, -1.6, 0.2),
                ],
            ),
        };

        let amrs = get_amr(&params, Source::Asteca, &AmrConfig::default());
        assert_eq!(amrs.len(), 1);
        let lmc = &amrs[0];
        assert_eq!(lmc.galaxy, Galaxy::Lmc);
        assert_eq!(lmc.source, Source::Asteca);
        assert_eq!(lmc.clusters.len(), 6);
        assert!(!lmc.weighted.age.is_empty());
        assert!(!lmc.binned.is_empty());
        assert_eq!(lmc.binned.feh.len(), lmc.binned.e_feh.len());
        for &f in &lmc.binned.feh {
            assert!((-1.8..=-0.2).contains(&f), "{f}");
        }
    }

    #[test]
    fn single_tight_cluster_fails_alone() {
        let clusters = amr_sample(
            &galaxy_sample(Galaxy::Smc, &[("K3", 9.0, 0.1, -1.0, 0.001)]),
            Source::Asteca,
            &AmrConfig::default(),
        );
        let err = galaxy_amr(Galaxy::Smc, Source::Asteca, clusters, &AmrConfig::default());
        assert!(matches!(err, Err(NumericError::TooFewPoints { .. })));
    }
}
