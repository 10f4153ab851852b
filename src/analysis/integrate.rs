//! Age-averaged metallicity of an AMR by Simpson's rule, with Monte Carlo
//! propagation of the [Fe/H] errors.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::analysis::amr::BinnedAmr;
use crate::data::model::Measurement;
use crate::error::{NumericError, check_lengths};

/// Composite Simpson's rule over samples with arbitrary spacing.
///
/// Consecutive pairs of intervals use the three-point rule for uneven
/// spacing; a trailing single interval uses the trapezoid rule.
pub fn simpson(x: &[f64], y: &[f64]) -> Result<f64, NumericError> {
    check_lengths(x.len(), &[y])?;
    if x.len() < 2 {
        return Err(NumericError::TooFewPoints { needed: 2, found: x.len() });
    }

    let mut total = 0.0;
    let mut i = 0;
    while i + 2 < x.len() {
        let h0 = x[i + 1] - x[i];
        let h1 = x[i + 2] - x[i + 1];
        if h0 <= 0.0 || h1 <= 0.0 {
            return Err(NumericError::InvalidInput("x must be strictly increasing".into()));
        }
        let hs = h0 + h1;
        total += hs / 6.0
            * ((2.0 - h1 / h0) * y[i] + hs * hs / (h0 * h1) * y[i + 1] + (2.0 - h0 / h1) * y[i + 2]);
        i += 2;
    }
    if i + 1 < x.len() {
        let h = x[i + 1] - x[i];
        if h <= 0.0 {
            return Err(NumericError::InvalidInput("x must be strictly increasing".into()));
        }
        total += 0.5 * h * (y[i] + y[i + 1]);
    }
    Ok(total)
}

/// `∫ [Fe/H] dt / (t_last − t_first)` over the binned AMR.
pub fn mean_metallicity(amr: &BinnedAmr) -> Result<f64, NumericError> {
    mean_over_span(&amr.age, &amr.feh)
}

fn mean_over_span(age: &[f64], feh: &[f64]) -> Result<f64, NumericError> {
    let integral = simpson(age, feh)?;
    Ok(integral / (age[age.len() - 1] - age[0]))
}

/// Mean metallicity and its Monte Carlo error: every run perturbs each
/// [Fe/H] value by a Gaussian draw of its own error and integrates again.
pub fn mc_mean_metallicity<R: Rng + ?Sized>(
    amr: &BinnedAmr,
    runs: usize,
    rng: &mut R,
) -> Result<Measurement, NumericError> {
    if runs == 0 {
        return Err(NumericError::InvalidInput("Monte Carlo needs at least one run".into()));
    }
    check_lengths(amr.age.len(), &[&amr.feh, &amr.e_feh])?;
    let value = mean_metallicity(amr)?;

    let dists = amr
        .e_feh
        .iter()
        .map(|&e| Normal::new(0.0, e).map_err(|err| NumericError::InvalidInput(err.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    let mut perturbed = amr.feh.clone();
    let mut samples = Vec::with_capacity(runs);
    for _ in 0..runs {
        for ((p, &f), d) in perturbed.iter_mut().zip(&amr.feh).zip(&dists) {
            *p = f + d.sample(rng);
        }
        samples.push(mean_over_span(&amr.age, &perturbed)?);
    }

    let mean = samples.iter().sum::<f64>() / runs as f64;
    let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / runs as f64;
    Ok(Measurement::new(value, var.sqrt()))
}
