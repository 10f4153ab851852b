//! Clusters whose ASteCA values disagree with the literature.

use std::fmt;

use crate::config::DiffConfig;
use crate::data::model::Galaxy;
use crate::params::{GalaxySample, InParams, ParamPair};

/// Parameters that can be compared against the literature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Metal,
    Age,
    Ext,
    Dist,
    Rad,
}

impl Param {
    pub const ALL: [Param; 5] = [Param::Metal, Param::Age, Param::Ext, Param::Dist, Param::Rad];

    pub fn key(self) -> &'static str {
        match self {
            Param::Metal => "metal",
            Param::Age => "age",
            Param::Ext => "ext",
            Param::Dist => "dist",
            Param::Rad => "rad",
        }
    }

    fn threshold(self, cfg: &DiffConfig) -> f64 {
        match self {
            Param::Metal => cfg.metal,
            Param::Age => cfg.age,
            Param::Ext => cfg.ext,
            Param::Dist => cfg.dist,
            Param::Rad => cfg.rad,
        }
    }

    fn values(self, s: &GalaxySample) -> &ParamPair {
        match self {
            Param::Metal => &s.feh,
            Param::Age => &s.log_age,
            Param::Ext => &s.ebv,
            Param::Dist => &s.dist_mod,
            Param::Rad => &s.radius_px,
        }
    }
}

/// One parameter of one cluster outside the accepted difference.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub galaxy: Galaxy,
    pub name: String,
    pub param: Param,
    pub asteca: f64,
    pub lit: f64,
    /// Age difference in Gyr, for age entries.
    pub age_diff_gyr: Option<f64>,
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (g, n, p) = (self.galaxy, &self.name, self.param.key());
        match (self.param, self.age_diff_gyr) {
            (Param::Rad, _) => write!(f, "{g} {n} {p}, {} vs {}", self.asteca, self.lit),
            (_, Some(gyr)) => write!(f, "{g} {n} {p}, {:.2} vs {:.2} , {gyr:.2}", self.asteca, self.lit),
            (Param::Metal, None) => write!(f, "{g} {n} {p}, {:.4} vs {:.4}", self.asteca, self.lit),
            _ => write!(f, "{g} {n} {p}, {:.2} vs {:.2}", self.asteca, self.lit),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffReport {
    pub entries: Vec<DiffEntry>,
    /// Number of clusters with at least one flagged parameter, per galaxy
    /// (indexed by [`Galaxy::index`]).
    pub flagged_clusters: [usize; 2],
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for g in Galaxy::ALL {
            for e in self.entries.iter().filter(|e| e.galaxy == g) {
                writeln!(f, "{e}")?;
            }
            writeln!(
                f,
                "\n* {g}, total num of clusts with diffs in params: {}\n",
                self.flagged_clusters[g.index()]
            )?;
        }
        Ok(())
    }
}

/// Compare ASteCA and literature values of the configured parameters.
/// Clusters without a literature value for a parameter are not compared.
pub fn check_diffs(params: &InParams, cfg: &DiffConfig) -> DiffReport {
    let checked: Vec<Param> = Param::ALL
        .into_iter()
        .filter(|p| cfg.checked.iter().any(|c| c == p.key()))
        .collect();
    for unknown in cfg.checked.iter().filter(|c| !Param::ALL.iter().any(|p| p.key() == c.as_str())) {
        log::warn!("unknown parameter '{unknown}' in diffs.checked, ignored");
    }

    let mut report = DiffReport::default();
    for sample in params.iter() {
        let mut count = 0;
        for (i, name) in sample.names.iter().enumerate() {
            let mut flagged = false;
            for &param in &checked {
                let pair = param.values(sample);
                let Some(lit) = pair.lit[i] else { continue };
                let asteca = pair.asteca[i];
                if (asteca - lit).abs() <= param.threshold(cfg) {
                    continue;
                }
                flagged = true;
                let age_diff_gyr = (param == Param::Age)
                    .then(|| (10f64.powf(asteca) - 10f64.powf(lit)).abs() / 1e9);
                report.entries.push(DiffEntry {
                    galaxy: sample.galaxy,
                    name: name.clone(),
                    param,
                    asteca,
                    lit,
                    age_diff_gyr,
                });
            }
            if flagged {
                count += 1;
            }
        }
        report.flagged_clusters[sample.galaxy.index()] = count;
    }
    report
}
