use std::fs::create_dir_all;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::analysis::boxplot::plot_category;
use crate::analysis::correction::Correction;
use crate::analysis::pairwise::{categories, category_subset, stratified_pairwise_tests};
use crate::analysis::statistics_output::save_statistics;
use crate::config::{Cli, RunConfig};
use crate::data_handling::classifier_counts::{melt_counts, CombinedCounts};
use crate::data_handling::isolate_metadata::IsolateMetadata;
use crate::data_handling::observations::{collect_observations, join_isolates};
use crate::helper_functions::write_run_config;
use crate::models::{Dataset, Observation, PairwiseComparison};

mod analysis;
mod config;
mod data_handling;
mod helper_functions;
mod models;

fn main() -> Result<()> {
    // Setup logging and run configuration
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = RunConfig::from_cli(&cli)?;

    info!("Starting groupwise analysis");

    create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;
    write_run_config(&config.output_dir, &config).context("writing run configuration")?;

    let observations = load_observations(&config)?;

    let comparisons = stratified_pairwise_tests(&observations, config.alpha, config.correction)
        .context("running pairwise tests")?;

    render_plots(&config, &observations, &comparisons)?;

    let stats_path = config.output_dir.join("statistics.tsv");
    save_statistics(&stats_path, &comparisons, config.correction != Correction::None)
        .with_context(|| format!("writing {}", stats_path.display()))?;

    println!(
        "Plots and statistics generated in the '{}' directory.",
        config.output_dir.display()
    );
    Ok(())
}

/// load -> reshape -> join -> filter
fn load_observations(config: &RunConfig) -> Result<Vec<Observation>> {
    let counts = CombinedCounts { path: config.counts_path.clone() }
        .load()
        .context("loading classifier counts")?;
    let isolates = IsolateMetadata { path: config.isolates_path.clone() }
        .load()
        .context("loading isolate metadata")?;

    let long = melt_counts(&counts).context("reshaping counts to long form")?;
    let merged = join_isolates(&long, &isolates).context("joining isolate metadata")?;
    let (observations, _report) = collect_observations(&merged).context("filtering observations")?;
    Ok(observations)
}

fn render_plots(
    config: &RunConfig,
    observations: &[Observation],
    comparisons: &[PairwiseComparison],
) -> Result<()> {
    for category in categories(observations) {
        let subset = category_subset(observations, category);
        plot_category(&config.output_dir, category, &subset, comparisons, &config.plot)
            .with_context(|| format!("plotting category {category}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::statistics_output::write_statistics;
    use std::fs;

    fn write_inputs(dir: &std::path::Path) {
        fs::write(
            dir.join("combined_classifier_count.tsv"),
            "LETTER\tCOLOR\tCategory\tClass\ta1\ta2\ta3\tb1\tb2\tb3\tnometa\n\
             J\t#111\tInformation storage\tc1\t1\t2\t3\t40\t50\t60\t7\n\
             K\t#222\tInformation storage\tc2\t5\t5\t6\t5\t6\t5\t7\n\
             C\t#333\tMetabolism\tc3\t10\t11\t12\t10\t11\t12\t7\n",
        )
        .unwrap();
        fs::write(
            dir.join("isolate_colors.tsv"),
            "a1\t#f00\tclinical\na2\t#f00\tclinical\na3\t#f00\tclinical\n\
             b1\t#00f\tenvironmental\nb2\t#00f\tenvironmental\nb3\t#00f\tenvironmental\n",
        )
        .unwrap();
    }

    #[test]
    fn pipeline_without_plots() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_inputs(input.path());

        let cli = Cli::parse_from([
            "groupwise",
            "--input-dir",
            input.path().to_str().unwrap(),
            "--output-dir",
            output.path().to_str().unwrap(),
        ]);
        let config = RunConfig::from_cli(&cli).unwrap();

        let observations = load_observations(&config).unwrap();
        // 3 letters x 6 isolates with metadata
        assert_eq!(observations.len(), 18);
        assert!(observations.iter().all(|o| o.isolate != "nometa"));

        let comparisons =
            stratified_pairwise_tests(&observations, config.alpha, config.correction).unwrap();
        let strata: Vec<_> = comparisons
            .iter()
            .map(|c| (c.category.as_str(), c.letter.as_str()))
            .collect();
        assert_eq!(
            strata,
            vec![("Information storage", "J"), ("Information storage", "K"), ("Metabolism", "C")]
        );
        assert!(comparisons.iter().all(|c| c.group1 == "clinical" && c.group2 == "environmental"));

        // 3 vs 3 fully separated: exact p = 2 / C(6, 3) = 0.1, not significant
        assert!((comparisons[0].p_value - 0.1).abs() < 1e-12);
        assert!(!comparisons[0].significant);
        // identical samples
        assert_eq!(comparisons[2].p_value, 1.0);

        let mut buf = Vec::new();
        write_statistics(&mut buf, &comparisons, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().nth(1).unwrap().starts_with("Information storage\tJ\tclinical\t2\tenvironmental\t50\t"));
    }
}
