use std::path::PathBuf;
use std::sync::Arc;
use polars::error::PolarsResult;
use polars::frame::DataFrame;
use polars::prelude::{CsvReadOptions, DataType, SerReader};

use std::env;
pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

/// Anchor a relative path at the project root; absolute paths pass through.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root().join(path)
    }
}

use std::fs;
use std::path::Path;
use serde::Serialize;
use crate::models::polars_err;

pub fn write_run_config<T: Serialize>(output_dir: &Path, config: &T) -> PolarsResult<PathBuf> {
    let config_path = output_dir.join("run_config.json");
    let body = serde_json::to_string_pretty(config).map_err(|e| polars_err(Box::new(e)))?;
    fs::write(&config_path, body).map_err(|e| polars_err(Box::new(e)))?;
    Ok(config_path)
}

/// Read a tab separated file.
///
/// With `all_text` every column is read as `String`, which keeps isolate and
/// group identifiers such as `007` intact.
pub fn read_tsv(file_path: &Path, has_header: bool, all_text: bool) -> PolarsResult<DataFrame> {
    let mut options = CsvReadOptions::default().with_has_header(has_header);
    if all_text {
        let n_fields = count_fields(file_path)?;
        let dtype_override: Arc<Vec<DataType>> = Arc::new(vec![DataType::String; n_fields]);
        options = options.with_dtype_overwrite(Some(dtype_override));
    }
    options
        .map_parse_options(|o| o.with_separator(b'\t').with_truncate_ragged_lines(true))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()
}

fn count_fields(path: &Path) -> PolarsResult<usize> {
    use std::io::{BufRead, BufReader};

    let file = fs::File::open(path).map_err(|e| polars_err(Box::new(e)))?;
    let mut rdr = BufReader::new(file);
    let mut first = String::new();
    rdr.read_line(&mut first).map_err(|e| polars_err(Box::new(e)))?;
    Ok(first.trim_end_matches(['\r', '\n']).split('\t').count())
}

/// Distinct values in order of first appearance.
pub fn unique_in_order<'a, I>(values: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::HashSet::new();
    values.into_iter().filter(|v| seen.insert(*v)).collect()
}

/// Pad a value range by `pct` of its width on both sides.
pub fn expand_range(min_val: f64, max_val: f64, pct: f64) -> (f64, f64) {
    if (max_val - min_val).abs() < 1e-9 {
        return (min_val - 1.0, max_val + 1.0);
    }
    let range = max_val - min_val;
    let pad = range * pct;
    (min_val - pad, max_val + pad)
}
