use std::io::Write;
use std::path::Path;

use polars::prelude::PolarsResult;
use tracing::info;

use crate::models::{polars_err, PairwiseComparison};

const BASE_HEADER: [&str; 8] = [
    "Category", "LETTER", "Group1", "Mean1", "Group2", "Mean2", "P-value", "Significant",
];

/// Plain decimals down to 1e-4, scientific notation below.
fn format_p_value(p: f64) -> String {
    if p != 0.0 && p.abs() < 1e-4 {
        format!("{p:e}")
    } else {
        p.to_string()
    }
}

fn python_bool(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

/// Write the comparison table as TSV. `P-adjusted` is added after `P-value`
/// when `with_adjusted` is set.
pub fn write_statistics<W: Write>(
    writer: W,
    comparisons: &[PairwiseComparison],
    with_adjusted: bool,
) -> PolarsResult<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);

    let mut header: Vec<&str> = BASE_HEADER.to_vec();
    if with_adjusted {
        header.insert(7, "P-adjusted");
    }
    wtr.write_record(&header).map_err(|e| polars_err(Box::new(e)))?;

    for c in comparisons {
        let mut row = vec![
            c.category.clone(),
            c.letter.clone(),
            c.group1.clone(),
            c.mean1.to_string(),
            c.group2.clone(),
            c.mean2.to_string(),
            format_p_value(c.p_value),
        ];
        if with_adjusted {
            row.push(c.p_adjusted.map(format_p_value).unwrap_or_default());
        }
        row.push(python_bool(c.significant).to_string());
        wtr.write_record(&row).map_err(|e| polars_err(Box::new(e)))?;
    }

    wtr.flush().map_err(|e| polars_err(Box::new(e)))?;
    Ok(())
}

pub fn save_statistics(
    path: &Path,
    comparisons: &[PairwiseComparison],
    with_adjusted: bool,
) -> PolarsResult<()> {
    let file = std::fs::File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    write_statistics(file, comparisons, with_adjusted)?;
    info!("Statistics saved to: {}", path.display());
    Ok(())
}
