use anyhow::{anyhow, Result};
use statrs::distribution::{ContinuousCDF, Normal};
use std::cmp::Ordering;

/// Largest smaller-sample size for which the exact null distribution is used.
const EXACT_MAX_SMALLER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Exact,
    Asymptotic,
}

#[derive(Debug, Clone)]
pub struct MannWhitneyResult {
    /// U statistic of the first sample
    pub statistic: f64,
    /// Two-sided p-value
    pub p_value: f64,
    pub method: Method,
    /// Continuity corrected z (asymptotic only)
    pub z_score: Option<f64>,
}

/// Two-sided Mann-Whitney U test.
///
/// The exact null distribution is used when the pooled sample has no ties and
/// the smaller sample has at most eight values; otherwise the tie-corrected
/// normal approximation with continuity correction.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Result<MannWhitneyResult> {
    let nx = x.len();
    let ny = y.len();
    if nx == 0 || ny == 0 {
        return Err(anyhow!("Mann-Whitney U needs two non-empty samples"));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(anyhow!("Mann-Whitney U received a non-finite value"));
    }

    // Pool samples with group labels (0 for x, 1 for y)
    let mut combined: Vec<(f64, usize)> = Vec::with_capacity(nx + ny);
    combined.extend(x.iter().map(|&v| (v, 0)));
    combined.extend(y.iter().map(|&v| (v, 1)));
    combined.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let (ranks, tie_term) = mid_ranks(&combined);

    let rank_sum_x: f64 = combined
        .iter()
        .zip(&ranks)
        .filter(|((_, g), _)| *g == 0)
        .map(|(_, r)| r)
        .sum();

    let n1 = nx as f64;
    let n2 = ny as f64;
    let u_x = rank_sum_x - n1 * (n1 + 1.0) / 2.0;
    let u_y = n1 * n2 - u_x;
    let u = u_x.max(u_y);

    if tie_term == 0.0 && nx.min(ny) <= EXACT_MAX_SMALLER {
        let p_value = (2.0 * exact_upper_tail(nx, ny, u)).min(1.0);
        return Ok(MannWhitneyResult {
            statistic: u_x,
            p_value,
            method: Method::Exact,
            z_score: None,
        });
    }

    let n = n1 + n2;
    let mean_u = n1 * n2 / 2.0;
    let var_u = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));

    if var_u <= 0.0 {
        // every value tied
        return Ok(MannWhitneyResult {
            statistic: u_x,
            p_value: 1.0,
            method: Method::Asymptotic,
            z_score: None,
        });
    }

    let z = (u - mean_u - 0.5) / var_u.sqrt();
    let normal = Normal::new(0.0, 1.0)?;
    let p_value = (2.0 * normal.sf(z)).clamp(0.0, 1.0);

    Ok(MannWhitneyResult {
        statistic: u_x,
        p_value,
        method: Method::Asymptotic,
        z_score: Some(z),
    })
}

/// Average ranks (1-based) of a sorted sample plus the tie term `sum(t^3 - t)`.
fn mid_ranks(sorted: &[(f64, usize)]) -> (Vec<f64>, f64) {
    let mut ranks = vec![0.0; sorted.len()];
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let val = sorted[i].0;
        let mut j = i + 1;
        while j < sorted.len() && sorted[j].0 == val {
            j += 1;
        }

        let rank = (i + j - 1) as f64 / 2.0 + 1.0;
        ranks[i..j].iter_mut().for_each(|r| *r = rank);

        let t = (j - i) as f64;
        tie_term += t * t * t - t;
        i = j;
    }
    (ranks, tie_term)
}

/// P(U >= u) under the null for samples of size `m` and `n` without ties.
fn exact_upper_tail(m: usize, n: usize, u: f64) -> f64 {
    let counts = u_distribution(m.min(n), m.max(n));
    let total: f64 = counts.iter().sum();
    let start = u.ceil().max(0.0) as usize;
    let tail: f64 = counts.iter().skip(start).sum();
    tail / total
}

/// Number of arrangements giving each U value, `0..=m*n`.
///
/// `f(i, j, u) = f(i-1, j, u-j) + f(i, j-1, u)`: the last pooled value belongs
/// either to the first sample (beating all `j` values of the second) or to the second.
fn u_distribution(m: usize, n: usize) -> Vec<f64> {
    let max_u = m * n;
    let mut f = vec![vec![0.0; max_u + 1]; m + 1];
    f[0][0] = 1.0;

    for j in 0..=n {
        for i in 1..=m {
            let (lower, upper) = f.split_at_mut(i);
            let prev = &lower[i - 1];
            let cur = &mut upper[0];
            for u in j..=(i * j) {
                cur[u] += prev[u - j];
            }
        }
    }
    f.swap_remove(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn separated_small_samples_are_exact() {
        let r = mann_whitney_u(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(r.method, Method::Exact);
        assert_eq!(r.statistic, 0.0);
        // 2 * (1 / C(6, 3))
        assert_relative_eq!(r.p_value, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn exact_with_unbalanced_sizes() {
        let y: Vec<f64> = (3..=12).map(f64::from).collect();
        let r = mann_whitney_u(&[1.0, 2.0], &y).unwrap();
        assert_eq!(r.method, Method::Exact);
        assert_relative_eq!(r.p_value, 2.0 / 66.0, epsilon = 1e-12);
    }

    #[test]
    fn u_distribution_sums_to_binomial() {
        let counts = u_distribution(3, 4);
        assert_eq!(counts.len(), 13);
        assert_relative_eq!(counts.iter().sum::<f64>(), 35.0);
        // symmetric around m*n/2
        for k in 0..counts.len() {
            assert_eq!(counts[k], counts[counts.len() - 1 - k]);
        }
    }

    #[test]
    fn large_samples_use_normal_approximation() {
        let x: Vec<f64> = (1..=10).map(f64::from).collect();
        let y: Vec<f64> = (11..=20).map(f64::from).collect();
        let r = mann_whitney_u(&x, &y).unwrap();
        assert_eq!(r.method, Method::Asymptotic);
        assert_relative_eq!(r.p_value, 1.826717911e-4, max_relative = 1e-6);
    }

    #[test]
    fn ties_force_asymptotic_with_correction() {
        let x = [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0];
        let y = [3.0, 3.0, 4.0, 4.0, 5.0, 5.0, 6.0, 6.0, 7.0, 7.0];
        let r = mann_whitney_u(&x, &y).unwrap();
        assert_eq!(r.method, Method::Asymptotic);
        assert_eq!(r.statistic, 18.0);
        assert_relative_eq!(r.p_value, 0.015856209681, max_relative = 1e-6);
    }

    #[test]
    fn all_ties_give_unit_p_value() {
        let r = mann_whitney_u(&[2.0, 2.0], &[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(r.p_value, 1.0);
    }

    #[test]
    fn p_value_is_symmetric_in_samples() {
        let x = [0.5, 3.0, 7.5, 2.0];
        let y = [1.0, 8.0, 9.0, 4.0, 6.0];
        let a = mann_whitney_u(&x, &y).unwrap();
        let b = mann_whitney_u(&y, &x).unwrap();
        assert_relative_eq!(a.p_value, b.p_value, epsilon = 1e-12);
        assert_relative_eq!(a.statistic + b.statistic, 20.0);
    }

    #[test]
    fn rejects_empty_and_nan() {
        assert!(mann_whitney_u(&[], &[1.0]).is_err());
        assert!(mann_whitney_u(&[f64::NAN], &[1.0]).is_err());
    }
}
