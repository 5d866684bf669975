use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, error, info};

use crate::helper_functions::read_tsv;
use crate::models::{polars_err, Dataset, ID_COLUMNS};

/// Wide classifier-count table: the four identifier columns followed by one
/// count column per isolate.
pub struct CombinedCounts {
    pub path: PathBuf,
}

impl CombinedCounts {
    /// Isolate columns in header order.
    pub fn isolate_columns(df: &DataFrame) -> Vec<String> {
        df.get_column_names()
            .into_iter()
            .filter(|c| !ID_COLUMNS.contains(&c.as_str()))
            .map(|c| c.to_string())
            .collect()
    }
}

impl Dataset for CombinedCounts {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading classifier counts from {}", self.path.display());
        // all text; the melt casts counts and unparseable cells become null
        let df = match read_tsv(&self.path, true, true) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read classifier counts: {}", e);
                return Err(e);
            }
        };

        let names = df.get_column_names();
        for id in ID_COLUMNS {
            if !names.iter().any(|c| c.as_str() == id) {
                return Err(polars_err(
                    format!("{} is missing the `{id}` column", self.path.display()).into(),
                ));
            }
        }

        let df = df
            .lazy()
            .with_columns(ID_COLUMNS.map(|c| col(c).cast(DataType::String)))
            .collect()?;

        debug!("Loaded {} rows x {} columns", df.height(), df.width());
        Ok(df)
    }
}

/// Wide -> long. One block per isolate column, in header order, each block
/// holding every table row in file order.
///
/// Output columns: `LETTER, COLOR, Category, Class, Isolate, Count`.
pub fn melt_counts(df: &DataFrame) -> PolarsResult<DataFrame> {
    let isolates = CombinedCounts::isolate_columns(df);
    if isolates.is_empty() {
        return Err(polars_err("classifier count table has no isolate columns".into()));
    }

    let blocks: Vec<LazyFrame> = isolates
        .iter()
        .map(|isolate| {
            let mut exprs: Vec<Expr> = ID_COLUMNS.iter().map(|c| col(*c)).collect();
            exprs.push(lit(isolate.as_str()).alias("Isolate"));
            exprs.push(col(isolate.as_str()).cast(DataType::Float64).alias("Count"));
            df.clone().lazy().select(exprs)
        })
        .collect();

    let long = concat(blocks, UnionArgs::default())?.collect()?;
    info!(
        "Reshaped {} rows x {} isolates into {} long rows",
        df.height(),
        isolates.len(),
        long.height()
    );
    Ok(long)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use std::io::Write;

    fn wide() -> DataFrame {
        df![
            "LETTER" => &["A", "B"],
            "COLOR" => &["red", "blue"],
            "Category" => &["Cat 1", "Cat 1"],
            "Class" => &["x", "y"],
            "iso1" => &[1i64, 2],
            "iso2" => &[3i64, 4]
        ]
        .unwrap()
    }

    #[test]
    fn isolate_columns_exclude_identifiers() {
        assert_eq!(CombinedCounts::isolate_columns(&wide()), vec!["iso1", "iso2"]);
    }

    #[test]
    fn melt_is_column_major() {
        let long = melt_counts(&wide()).unwrap();
        assert_eq!(long.height(), 4);

        let isolates: Vec<_> = long.column("Isolate").unwrap().str().unwrap().into_no_null_iter().collect();
        let letters: Vec<_> = long.column("LETTER").unwrap().str().unwrap().into_no_null_iter().collect();
        let counts: Vec<_> = long.column("Count").unwrap().f64().unwrap().into_no_null_iter().collect();

        assert_eq!(isolates, vec!["iso1", "iso1", "iso2", "iso2"]);
        assert_eq!(letters, vec!["A", "B", "A", "B"]);
        assert_eq!(counts, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn melt_without_isolates_fails() {
        let df = df![
            "LETTER" => &["A"],
            "COLOR" => &["red"],
            "Category" => &["c"],
            "Class" => &["x"]
        ]
        .unwrap();
        assert!(melt_counts(&df).is_err());
    }

    #[test]
    fn load_rejects_missing_identifier() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "LETTER\tCOLOR\tClass\tiso1").unwrap();
        writeln!(tmp, "A\tred\tx\t1").unwrap();
        let err = CombinedCounts { path: tmp.path().to_path_buf() }.load().unwrap_err();
        assert!(err.to_string().contains("Category"));
    }

    #[test]
    fn late_non_numeric_counts_become_missing() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "LETTER\tCOLOR\tCategory\tClass\ta1\ta2").unwrap();
        for i in 0..150 {
            let a1 = match i {
                130 => "NA".to_string(),
                140 => "2.5".to_string(),
                _ => i.to_string(),
            };
            writeln!(tmp, "L{i}\t#000\tCat\tc\t{a1}\t1").unwrap();
        }

        let wide = CombinedCounts { path: tmp.path().to_path_buf() }.load().unwrap();
        assert_eq!(wide.height(), 150);

        let long = melt_counts(&wide).unwrap();
        let counts = long.column("Count").unwrap().f64().unwrap();
        assert_eq!(counts.get(0), Some(0.0));
        assert_eq!(counts.get(130), None);
        assert_eq!(counts.get(140), Some(2.5));
        assert_eq!(counts.get(150), Some(1.0));
        assert_eq!(counts.null_count(), 1);
    }
}
