use crate::config::AmrConfig;
use crate::params::GalaxySample;

// ---------------------------------------------------------------------------
// Which clusters enter the age-metallicity relation
// ---------------------------------------------------------------------------

/// Origin of the values used to build an AMR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Source {
    Asteca,
    Literature,
}

/// Ages (Gyr) and metallicities of the clusters selected for an AMR.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmrInput {
    pub names: Vec<String>,
    pub age_gyr: Vec<f64>,
    pub e_age_gyr: Vec<f64>,
    pub feh: Vec<f64>,
    pub e_feh: Vec<f64>,
}

impl AmrInput {
    fn push(&mut self, name: &str, log_age: f64, e_log_age: f64, feh: f64, e_feh: f64) {
        let (age, e_age) = log_age_to_gyr(log_age, e_log_age);
        self.names.push(name.to_string());
        self.age_gyr.push(age);
        self.e_age_gyr.push(e_age);
        self.feh.push(feh);
        self.e_feh.push(e_feh);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// `log10(age/yr)` and its error to Gyr.
pub fn log_age_to_gyr(log_age: f64, e_log_age: f64) -> (f64, f64) {
    let age = 10f64.powf(log_age - 9.0);
    (age, std::f64::consts::LN_10 * age * e_log_age)
}

/// Select the clusters of one galaxy that enter the AMR.
///
/// * ASteCA values: every cluster, [Fe/H] errors capped at `feh_err_cap`.
/// * Literature values: clusters with an age, a [Fe/H] and a [Fe/H] error
///   above `lit_feh_missing`; errors floored at `lit_feh_err_floor`.
pub fn amr_sample(sample: &GalaxySample, source: Source, cfg: &AmrConfig) -> AmrInput {
    let mut out = AmrInput::default();

    for (i, name) in sample.names.iter().enumerate() {
        match source {
            Source::Asteca => out.push(
                name,
                sample.log_age.asteca[i],
                sample.log_age.e_asteca[i],
                sample.feh.asteca[i],
                sample.feh.e_asteca[i].min(cfg.feh_err_cap),
            ),
            Source::Literature => {
                let lit = (
                    sample.log_age.lit[i],
                    sample.feh.lit[i],
                    sample.feh.e_lit[i].filter(|&e| e > cfg.lit_feh_missing),
                );
                let (Some(age), Some(feh), Some(e_feh)) = lit else {
                    log::debug!("{}: {name} has no literature age/[Fe/H], skipped", sample.galaxy);
                    continue;
                };
                out.push(
                    name,
                    age,
                    sample.log_age.e_lit[i].unwrap_or(0.0),
                    feh,
                    e_feh.max(cfg.lit_feh_err_floor),
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Galaxy;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn sample() -> GalaxySample {
        let mut s = GalaxySample::new(Galaxy::Lmc);
        s.names = vec!["A".into(), "B".into(), "C".into()];
        s.log_age.asteca = vec![9.0, 8.0, 10.0];
        s.log_age.e_asteca = vec![0.1, 0.0, 0.2];
        s.log_age.lit = vec![Some(9.1), Some(8.2), None];
        s.log_age.e_lit = vec![Some(0.05), None, None];
        s.feh.asteca = vec![-0.4, -0.7, -1.5];
        s.feh.e_asteca = vec![0.1, 3.5, 0.3];
        s.feh.lit = vec![Some(-0.5), Some(-0.6), Some(-1.2)];
        s.feh.e_lit = vec![Some(0.01), None, Some(0.2)];
        s
    }

    #[test]
    fn asteca_keeps_everything_and_caps_errors() {
        let cfg = AmrConfig::default();
        let out = amr_sample(&sample(), Source::Asteca, &cfg);
        assert_eq!(out.names, vec!["A", "B", "C"]);
        assert_eq!(out.e_feh, vec![0.1, 2.0, 0.3]);
        assert_relative_eq!(out.age_gyr[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(out.age_gyr[2], 10.0, epsilon = 1e-12);
        assert_relative_eq!(out.e_age_gyr[0], std::f64::consts::LN_10 * 0.1, epsilon = 1e-12);
    }

    #[test]
    fn literature_needs_values_and_floors_errors() {
        let cfg = AmrConfig::default();
        let out = amr_sample(&sample(), Source::Literature, &cfg);
        // B has no [Fe/H] error, C has no age.
        assert_eq!(out.names, vec!["A"]);
        assert_eq!(out.e_feh, vec![0.05]);
        assert_eq!(out.feh, vec![-0.5]);
    }
}
