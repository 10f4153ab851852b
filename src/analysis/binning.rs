//! Histogram bin edges for the AMR age ranges.

use serde::{Deserialize, Serialize};

use crate::error::NumericError;

/// How the age range is split before averaging the weighted [Fe/H] values.
///
/// Serialized as `"knuth"` or as a plain bin count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BinSpec", into = "BinSpec")]
pub enum BinRule {
    /// Knuth's Bayesian rule for the optimal number of equal-width bins.
    Knuth,
    /// Fixed number of equal-width bins.
    Count(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum BinSpec {
    Count(usize),
    Name(String),
}

impl TryFrom<BinSpec> for BinRule {
    type Error = String;

    fn try_from(spec: BinSpec) -> Result<Self, Self::Error> {
        match spec {
            BinSpec::Count(n) => Ok(BinRule::Count(n)),
            BinSpec::Name(s) if s.eq_ignore_ascii_case("knuth") => Ok(BinRule::Knuth),
            BinSpec::Name(s) => Err(format!("unknown binning rule '{s}'")),
        }
    }
}

impl From<BinRule> for BinSpec {
    fn from(rule: BinRule) -> Self {
        match rule {
            BinRule::Knuth => BinSpec::Name("knuth".to_string()),
            BinRule::Count(n) => BinSpec::Count(n),
        }
    }
}

impl BinRule {
    pub fn edges(self, data: &[f64]) -> Result<Vec<f64>, NumericError> {
        match self {
            BinRule::Knuth => knuth_bin_edges(data),
            BinRule::Count(n) => fixed_bin_edges(data, n),
        }
    }
}

/// `n` equal-width bins spanning the data range.
pub fn fixed_bin_edges(data: &[f64], n: usize) -> Result<Vec<f64>, NumericError> {
    if n == 0 {
        return Err(NumericError::InvalidInput("bin count must be positive".into()));
    }
    let (lo, hi) = data_range(data)?;
    if hi == lo {
        return Ok(vec![lo - 0.5, hi + 0.5]);
    }
    Ok(linspace(lo, hi, n + 1))
}

/// Bin edges maximising Knuth's (2006) log posterior
///
/// `F(M) = n ln M + lnΓ(M/2) − M lnΓ(1/2) − lnΓ(n + M/2) + Σ lnΓ(n_k + 1/2)`
///
/// over every bin count `M` in `1..=n`.
pub fn knuth_bin_edges(data: &[f64]) -> Result<Vec<f64>, NumericError> {
    let (lo, hi) = data_range(data)?;
    if hi == lo {
        return Ok(vec![lo - 0.5, hi + 0.5]);
    }

    let n = data.len();
    let mut best = (1, f64::NEG_INFINITY);
    for m in 1..=n {
        let counts = bin_counts(data, lo, hi, m);
        let mf = m as f64;
        let posterior = n as f64 * mf.ln() + ln_gamma(0.5 * mf)
            - mf * ln_gamma(0.5)
            - ln_gamma(n as f64 + 0.5 * mf)
            + counts.iter().map(|&c| ln_gamma(c as f64 + 0.5)).sum::<f64>();
        if posterior > best.1 {
            best = (m, posterior);
        }
    }

    log::debug!("knuth rule: {} bins for {} values", best.0, n);
    Ok(linspace(lo, hi, best.0 + 1))
}

fn data_range(data: &[f64]) -> Result<(f64, f64), NumericError> {
    if data.is_empty() {
        return Err(NumericError::EmptySample);
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(NumericError::InvalidInput("non-finite value in sample".into()));
    }
    let lo = data.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok((lo, hi))
}

fn bin_counts(data: &[f64], lo: f64, hi: f64, m: usize) -> Vec<usize> {
    let width = (hi - lo) / m as f64;
    let mut counts = vec![0; m];
    for &v in data {
        let k = (((v - lo) / width) as usize).min(m - 1);
        counts[k] += 1;
    }
    counts
}

pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Natural log of the gamma function for positive arguments (Lanczos,
/// g = 7, n = 9).
fn ln_gamma(x: f64) -> f64 {
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula.
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + 7.5;
    let series = COEF
        .iter()
        .enumerate()
        .skip(1)
        .fold(COEF[0], |acc, (i, &c)| acc + c / (x + i as f64));
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ln_gamma_matches_factorials() {
        assert_relative_eq!(ln_gamma(1.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(ln_gamma(5.0), 24.0_f64.ln(), epsilon = 1e-10);
        assert_relative_eq!(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), epsilon = 1e-10);
        assert_relative_eq!(ln_gamma(0.25), 3.625_609_908_221_908_f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn repeated_value_gives_single_bin() {
        let edges = knuth_bin_edges(&[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(edges, vec![1.5, 2.5]);
    }

    #[test]
    fn bimodal_data_gets_more_than_one_bin() {
        let mut data: Vec<f64> = (0..40).map(|i| 1.0 + 0.001 * i as f64).collect();
        data.extend((0..40).map(|i| 9.0 + 0.001 * i as f64));
        let edges = knuth_bin_edges(&data).unwrap();
        assert!(edges.len() > 2, "got {edges:?}");
        assert_relative_eq!(edges[0], 1.0);
        assert_relative_eq!(*edges.last().unwrap(), 9.039, epsilon = 1e-12);
    }

    #[test]
    fn fixed_count_spans_range() {
        let edges = fixed_bin_edges(&[0.0, 3.0, 10.0], 5).unwrap();
        assert_eq!(edges.len(), 6);
        assert_relative_eq!(edges[1], 2.0, epsilon = 1e-12);
        assert!(fixed_bin_edges(&[1.0], 0).is_err());
        assert_eq!(fixed_bin_edges(&[], 3), Err(NumericError::EmptySample));
    }

    #[test]
    fn rule_parses_from_json() {
        let knuth: BinRule = serde_json::from_str(r#""knuth""#).unwrap();
        let count: BinRule = serde_json::from_str("8").unwrap();
        assert_eq!(knuth, BinRule::Knuth);
        assert_eq!(count, BinRule::Count(8));
        assert!(serde_json::from_str::<BinRule>(r#""scott""#).is_err());
    }
}
