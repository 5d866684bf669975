use anyhow::{anyhow, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::cmp::Ordering;

/// Multiple testing correction applied across every comparison of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Correction {
    #[default]
    None,
    Bonferroni,
    BenjaminiHochberg,
}

impl Correction {
    /// Adjusted p-values, or `None` when no correction is requested.
    ///
    /// NaN p-values are left as NaN and do not count towards the number of tests.
    pub fn apply(self, p_values: &[f64]) -> Result<Option<Vec<f64>>> {
        let adjust: fn(&[f64]) -> Result<Vec<f64>> = match self {
            Correction::None => return Ok(None),
            Correction::Bonferroni => bonferroni_correction,
            Correction::BenjaminiHochberg => benjamini_hochberg_correction,
        };

        let finite: Vec<(usize, f64)> = p_values
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| !p.is_nan())
            .collect();
        let mut adjusted = vec![f64::NAN; p_values.len()];
        if finite.is_empty() {
            return Ok(Some(adjusted));
        }

        let values: Vec<f64> = finite.iter().map(|(_, p)| *p).collect();
        for ((idx, _), p) in finite.into_iter().zip(adjust(&values)?) {
            adjusted[idx] = p;
        }
        Ok(Some(adjusted))
    }
}

fn validate(p_values: &[f64]) -> Result<()> {
    if p_values.is_empty() {
        return Err(anyhow!("Empty p-value array"));
    }
    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(anyhow!("Invalid p-value at index {}: {}", i, p));
        }
    }
    Ok(())
}

/// Multiply each p-value by the number of tests, capping at 1.0.
pub fn bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate(p_values)?;
    let n = p_values.len() as f64;
    Ok(p_values.iter().map(|&p| (p * n).min(1.0)).collect())
}

/// Benjamini-Hochberg step-up adjustment controlling the false discovery rate.
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate(p_values)?;
    let n = p_values.len();

    let mut indexed_p_values: Vec<(usize, f64)> =
        p_values.iter().enumerate().map(|(i, &p)| (i, p)).collect();
    indexed_p_values.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_min = 1.0_f64;

    // largest to smallest, carrying the running minimum
    for i in (0..n).rev() {
        let (orig_idx, p_val) = indexed_p_values[i];
        let rank = i + 1;
        let adjustment = (p_val * n as f64 / rank as f64).min(1.0);
        current_min = adjustment.min(current_min);
        adjusted_p_values[orig_idx] = current_min;
    }

    Ok(adjusted_p_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bonferroni_caps_at_one() {
        let adj = bonferroni_correction(&[0.01, 0.2, 0.6]).unwrap();
        assert_relative_eq!(adj[0], 0.03, epsilon = 1e-12);
        assert_relative_eq!(adj[1], 0.6, epsilon = 1e-12);
        assert_eq!(adj[2], 1.0);
    }

    #[test]
    fn benjamini_hochberg_is_monotone() {
        let adj = benjamini_hochberg_correction(&[0.01, 0.04, 0.03, 0.005]).unwrap();
        // sorted: 0.005, 0.01, 0.03, 0.04 -> 0.02, 0.02, 0.04, 0.04
        assert_relative_eq!(adj[3], 0.02, epsilon = 1e-12);
        assert_relative_eq!(adj[0], 0.02, epsilon = 1e-12);
        assert_relative_eq!(adj[2], 0.04, epsilon = 1e-12);
        assert_relative_eq!(adj[1], 0.04, epsilon = 1e-12);
    }

    #[test]
    fn none_leaves_values_alone() {
        assert!(Correction::None.apply(&[0.5]).unwrap().is_none());
    }

    #[test]
    fn nan_p_values_are_skipped() {
        let adj = Correction::Bonferroni.apply(&[0.01, f64::NAN, 0.02]).unwrap().unwrap();
        assert_relative_eq!(adj[0], 0.02, epsilon = 1e-12);
        assert!(adj[1].is_nan());
        assert_relative_eq!(adj[2], 0.04, epsilon = 1e-12);
    }

    #[test]
    fn invalid_p_value_is_rejected() {
        assert!(bonferroni_correction(&[1.5]).is_err());
        assert!(benjamini_hochberg_correction(&[]).is_err());
    }
}
