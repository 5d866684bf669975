use polars::prelude::PolarsResult;
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::analysis::correction::Correction;
use crate::analysis::mann_whitney::mann_whitney_u;
use crate::helper_functions::unique_in_order;
use crate::models::{polars_err, Observation, PairwiseComparison};

/// Categories in order of first appearance.
pub fn categories(observations: &[Observation]) -> Vec<&str> {
    unique_in_order(observations.iter().map(|o| o.category.as_str()))
}

/// Observations belonging to one category, order preserved.
pub fn category_subset<'a>(observations: &'a [Observation], category: &str) -> Vec<&'a Observation> {
    observations.iter().filter(|o| o.category == category).collect()
}

/// Every 2-combination of the stratum's groups, tested with Mann-Whitney U.
pub fn pairwise_tests(
    stratum: &[&Observation],
    category: &str,
    letter: &str,
    alpha: f64,
) -> PolarsResult<Vec<PairwiseComparison>> {
    let groups = unique_in_order(stratum.iter().map(|o| o.group.as_str()));
    let samples: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| stratum.iter().filter(|o| o.group == *g).map(|o| o.count).collect())
        .collect();

    let mut results = Vec::new();
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            let (x, y) = (&samples[i], &samples[j]);
            if x.is_empty() || y.is_empty() {
                continue;
            }
            let test = mann_whitney_u(x, y).map_err(|e| polars_err(e.into()))?;
            debug!(
                "{category} / {letter}: {} vs {}: {:?} test, z = {:?}",
                groups[i], groups[j], test.method, test.z_score
            );
            results.push(PairwiseComparison {
                category: category.to_string(),
                letter: letter.to_string(),
                group1: groups[i].to_string(),
                mean1: x.iter().mean(),
                group2: groups[j].to_string(),
                mean2: y.iter().mean(),
                statistic: test.statistic,
                p_value: test.p_value,
                p_adjusted: None,
                significant: test.p_value < alpha,
            });
        }
    }
    Ok(results)
}

/// Run the pairwise tests for every (Category, LETTER) stratum, then apply the
/// run-wide correction.
pub fn stratified_pairwise_tests(
    observations: &[Observation],
    alpha: f64,
    correction: Correction,
) -> PolarsResult<Vec<PairwiseComparison>> {
    let mut comparisons = Vec::new();

    for category in categories(observations) {
        let subset = category_subset(observations, category);
        let letters = unique_in_order(subset.iter().map(|o| o.letter.as_str()));

        for letter in letters {
            let stratum: Vec<&Observation> =
                subset.iter().copied().filter(|o| o.letter == letter).collect();
            let results = pairwise_tests(&stratum, category, letter, alpha)?;
            debug!(
                "{category} / {letter}: {} observations, {} comparisons",
                stratum.len(),
                results.len()
            );
            comparisons.extend(results);
        }
    }

    let p_values: Vec<f64> = comparisons.iter().map(|c| c.p_value).collect();
    if let Some(adjusted) = correction.apply(&p_values).map_err(|e| polars_err(e.into()))? {
        for (c, p) in comparisons.iter_mut().zip(adjusted) {
            c.p_adjusted = Some(p);
            c.significant = p < alpha;
        }
    }

    for c in comparisons.iter().filter(|c| c.significant) {
        debug!(
            "significant: {} / {} {} vs {} (U = {}, p = {:e})",
            c.category, c.letter, c.group1, c.group2, c.statistic, c.p_value
        );
    }
    let n_sig = comparisons.iter().filter(|c| c.significant).count();
    info!(
        "Ran {} pairwise comparisons ({} significant at alpha = {alpha})",
        comparisons.len(),
        n_sig
    );
    Ok(comparisons)
}
