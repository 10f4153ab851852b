//! Per-galaxy parameter arrays assembled from the matched catalogs.
//!
//! Every array in a [`GalaxySample`] is indexed the same way: position `i`
//! is the `i`-th matched cluster of that galaxy, in ASteCA output order.

use anyhow::{Context, Result};

use crate::analysis::deproject::{self, SkyCoord, separation};
use crate::config::Config;
use crate::data::matching::{Match, find_crossmatch};
use crate::data::model::{CrossMatch, Galaxy, LiteratureTable, Measurement};

/// ASteCA values next to the literature values of the same parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamPair {
    pub asteca: Vec<f64>,
    pub e_asteca: Vec<f64>,
    pub lit: Vec<Option<f64>>,
    pub e_lit: Vec<Option<f64>>,
}

impl ParamPair {
    fn push(&mut self, m: Measurement, lit: Option<f64>, e_lit: Option<f64>) {
        self.asteca.push(m.value);
        self.e_asteca.push(m.sigma);
        self.lit.push(lit);
        self.e_lit.push(e_lit);
    }

    pub fn len(&self) -> usize {
        self.asteca.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asteca.is_empty()
    }

    /// Indices of the clusters that have a literature value.
    pub fn with_lit(&self) -> impl Iterator<Item = usize> + '_ {
        self.lit
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|_| i))
    }
}

/// All parameter arrays of one galaxy.
#[derive(Debug, Clone, PartialEq)]
pub struct GalaxySample {
    pub galaxy: Galaxy,
    pub names: Vec<String>,
    pub ra: Vec<f64>,
    pub dec: Vec<f64>,
    pub feh: ParamPair,
    pub log_age: ParamPair,
    pub ebv: ParamPair,
    pub dist_mod: ParamPair,
    pub radius_px: ParamPair,
    pub mass: Vec<f64>,
    pub e_mass: Vec<f64>,
    pub rad_pc: Vec<f64>,
    pub e_rad_pc: Vec<f64>,
    pub n_memb: Vec<f64>,
    pub kde_prob: Vec<f64>,
    pub cont_ind: Vec<f64>,
    pub int_color: Vec<f64>,
    pub ext_sf: Vec<Option<f64>>,
    pub ext_mcev: Vec<Option<f64>>,
    pub e_ext_mcev: Vec<Option<f64>>,
    pub dep_dist_kpc: Vec<f64>,
}

impl GalaxySample {
    pub fn new(galaxy: Galaxy) -> Self {
        Self {
            galaxy,
            names: Vec::new(),
            ra: Vec::new(),
            dec: Vec::new(),
            feh: ParamPair::default(),
            log_age: ParamPair::default(),
            ebv: ParamPair::default(),
            dist_mod: ParamPair::default(),
            radius_px: ParamPair::default(),
            mass: Vec::new(),
            e_mass: Vec::new(),
            rad_pc: Vec::new(),
            e_rad_pc: Vec::new(),
            n_memb: Vec::new(),
            kde_prob: Vec::new(),
            cont_ind: Vec::new(),
            int_color: Vec::new(),
            ext_sf: Vec::new(),
            ext_mcev: Vec::new(),
            e_ext_mcev: Vec::new(),
            dep_dist_kpc: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Concentration parameter of every cluster, `n_memb / (π r_pc²)`.
    pub fn concentration(&self) -> Vec<f64> {
        self.n_memb
            .iter()
            .zip(&self.rad_pc)
            .map(|(&n, &r)| concentration(n, r))
            .collect()
    }
}

/// Both Clouds.
#[derive(Debug, Clone, PartialEq)]
pub struct InParams {
    pub smc: GalaxySample,
    pub lmc: GalaxySample,
}

impl InParams {
    pub fn galaxy(&self, g: Galaxy) -> &GalaxySample {
        match g {
            Galaxy::Smc => &self.smc,
            Galaxy::Lmc => &self.lmc,
        }
    }

    fn galaxy_mut(&mut self, g: Galaxy) -> &mut GalaxySample {
        match g {
            Galaxy::Smc => &mut self.smc,
            Galaxy::Lmc => &mut self.lmc,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GalaxySample> {
        [&self.smc, &self.lmc].into_iter()
    }
}

/// The Cloud whose centre is angularly closest to `coord`.
pub fn classify(coord: SkyCoord, cfg: &Config) -> Galaxy {
    let d_smc = separation(coord, cfg.galaxy(Galaxy::Smc).center());
    let d_lmc = separation(coord, cfg.galaxy(Galaxy::Lmc).center());
    if d_smc <= d_lmc { Galaxy::Smc } else { Galaxy::Lmc }
}

/// Fill the per-galaxy arrays from the matched clusters. Fails when a match
/// points past the end of `table`.
pub fn build_params(
    matches: &[Match<'_>],
    table: &LiteratureTable,
    crossmatch: &[CrossMatch],
    cfg: &Config,
) -> Result<InParams> {
    let mut params = InParams {
        smc: GalaxySample::new(Galaxy::Smc),
        lmc: GalaxySample::new(Galaxy::Lmc),
    };
    let cols = &cfg.columns;
    let scale = cfg.plate_scale_arcsec_px.0;

    for m in matches {
        let cl = m.cluster;
        let rec = table.records.get(m.row).with_context(|| {
            format!(
                "{}: literature row {} out of range ({} rows)",
                cl.name,
                m.row,
                table.len()
            )
        })?;
        let coord = SkyCoord::new(cl.ra_deg, cl.dec_deg);
        let galaxy = classify(coord, cfg);
        let s = params.galaxy_mut(galaxy);

        s.names.push(cl.name.clone());
        s.ra.push(cl.ra_deg);
        s.dec.push(cl.dec_deg);
        s.feh.push(cl.feh, rec.value(&cols.feh), rec.value(&cols.e_feh));
        s.log_age.push(cl.log_age, rec.value(&cols.log_age), rec.value(&cols.e_log_age));
        s.ebv.push(cl.ebv, rec.value(&cols.ebv), rec.value(&cols.e_ebv));
        s.dist_mod.push(cl.dist_mod, rec.value(&cols.dist_mod), rec.value(&cols.e_dist_mod));
        s.radius_px.push(cl.radius_px, rec.value(&cols.rad_px), None);
        s.mass.push(cl.mass.value);
        s.e_mass.push(cl.mass.sigma);

        let r = radius_pc(cl.radius_px, cl.dist_mod, scale);
        s.rad_pc.push(r.value);
        s.e_rad_pc.push(r.sigma);

        s.n_memb.push(cl.n_memb);
        s.kde_prob.push(cl.kde_prob);
        s.cont_ind.push(cl.cont_ind);
        s.int_color.push(cl.int_color);

        let xm = find_crossmatch(crossmatch, &cl.name);
        s.ext_sf.push(xm.and_then(|x| x.ext_sf));
        s.ext_mcev.push(xm.and_then(|x| x.ext_mcev));
        s.e_ext_mcev.push(xm.and_then(|x| x.e_ext_mcev));

        s.dep_dist_kpc.push(deproject::deproj_dist(cfg.galaxy(galaxy), coord));
    }

    for s in params.iter() {
        log::info!("{}: {} matched clusters", s.galaxy, s.len());
    }
    Ok(params)
}

/// Distance in parsec for a distance modulus.
pub fn distance_pc(dist_mod: f64) -> f64 {
    10f64.powf(dist_mod / 5.0 + 1.0)
}

/// Physical radius in parsec of an angular radius given in pixels, with the
/// first-order propagation of the radius and distance modulus errors.
pub fn radius_pc(r_px: Measurement, dist_mod: Measurement, scale_arcsec_px: f64) -> Measurement {
    let d = distance_pc(dist_mod.value);
    let rad_per_px = (scale_arcsec_px / 3600.0).to_radians();
    let theta = r_px.value * rad_per_px;

    let r = d * theta.tan();
    let dr_dpx = d * rad_per_px / theta.cos().powi(2);
    let dr_ddm = r * std::f64::consts::LN_10 / 5.0;
    let sigma = ((dr_dpx * r_px.sigma).powi(2) + (dr_ddm * dist_mod.sigma).powi(2)).sqrt();

    Measurement::new(r, sigma)
}

/// Approximate number of members per square parsec.
pub fn concentration(n_memb: f64, r_pc: f64) -> f64 {
    n_memb / (std::f64::consts::PI * r_pc * r_pc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::matching::match_clusters;
    use crate::data::model::{AstecaCluster, Cell, LiteratureRecord};
    use approx::assert_relative_eq;

    fn cluster(name: &str, ra: f64, dec: f64) -> AstecaCluster {
        AstecaCluster {
            name: name.to_string(),
            ra_deg: ra,
            dec_deg: dec,
            radius_px: Measurement::new(100.0, 10.0),
            n_memb: 200.0,
            cont_ind: 0.4,
            kde_prob: 0.9,
            int_color: 1.0,
            feh: Measurement::new(-1.0, 0.2),
            log_age: Measurement::new(9.5, 0.1),
            ebv: Measurement::new(0.05, 0.01),
            dist_mod: Measurement::new(18.5, 0.1),
            mass: Measurement::new(3000.0, 500.0),
        }
    }

    #[test]
    fn distance_modulus_to_parsec() {
        assert_relative_eq!(distance_pc(18.5), 50_118.72, epsilon = 0.01);
        assert_relative_eq!(distance_pc(0.0), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn radius_in_parsec() {
        let r = radius_pc(Measurement::new(100.0, 0.0), Measurement::new(18.5, 0.0), 0.274);
        // 27.4 arcsec at 50.12 kpc.
        assert_relative_eq!(r.value, 6.657, epsilon = 1e-3);
        assert_relative_eq!(r.sigma, 0.0, epsilon = 1e-12);

        let r = radius_pc(Measurement::new(100.0, 10.0), Measurement::new(18.5, 0.0), 0.274);
        assert_relative_eq!(r.sigma, 0.6657, epsilon = 1e-3);
    }

    #[test]
    fn concentration_is_members_per_area() {
        assert_relative_eq!(concentration(314.159_265, 10.0), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn clusters_are_split_by_nearest_cloud() {
        let cfg = Config::default();
        let clusters = vec![
            cluster("NGC121", 6.7, -71.5),
            cluster("SL579", 81.2, -69.3),
            cluster("LOST", 0.0, 0.0),
        ];
        let table = LiteratureTable::from_records(
            vec![
                LiteratureRecord {
                    cells: [
                        ("Name".to_string(), Cell::String("SL579".into())),
                        ("feh".to_string(), Cell::Float(-0.5)),
                    ]
                    .into(),
                },
                LiteratureRecord {
                    cells: [("Name".to_string(), Cell::String("NGC121".into()))].into(),
                },
            ],
            "Name",
        );
        let matches = match_clusters(&clusters, &table);
        let p = build_params(&matches, &table, &[], &cfg).unwrap();

        assert_eq!(p.smc.names, vec!["NGC121"]);
        assert_eq!(p.lmc.names, vec!["SL579"]);
        assert_eq!(p.lmc.feh.lit, vec![Some(-0.5)]);
        assert_eq!(p.smc.feh.lit, vec![None]);
        assert_eq!(p.lmc.feh.with_lit().collect::<Vec<_>>(), vec![0]);
        assert_eq!(p.lmc.ext_sf, vec![None]);
        assert_eq!(p.lmc.concentration().len(), 1);
        for s in p.iter() {
            assert_eq!(s.rad_pc.len(), s.len());
            assert_eq!(s.dep_dist_kpc.len(), s.len());
            assert!(s.dep_dist_kpc.iter().all(|d| d.is_finite() && *d >= 0.0));
        }
    }

    #[test]
    fn match_past_the_table_end_is_an_error() {
        let cfg = Config::default();
        let clusters = vec![cluster("NGC121", 6.7, -71.5)];
        let table = LiteratureTable::from_records(
            vec![LiteratureRecord {
                cells: [("Name".to_string(), Cell::String("NGC121".into()))].into(),
            }],
            "Name",
        );
        let stale = [Match {
            cluster: &clusters[0],
            row: 3,
        }];
        let err = build_params(&stale, &table, &[], &cfg).unwrap_err();
        assert!(err.to_string().contains("literature row 3 out of range"), "{err}");
    }
}
