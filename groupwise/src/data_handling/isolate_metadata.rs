use std::path::PathBuf;

use polars::prelude::*;
use tracing::{error, info, warn};

use crate::helper_functions::read_tsv;
use crate::models::{polars_err, Dataset, ISOLATE_COLUMNS};

/// Header-less `Isolate, Color, Group` table.
pub struct IsolateMetadata {
    pub path: PathBuf,
}

impl Dataset for IsolateMetadata {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading isolate metadata from {}", self.path.display());
        let mut df = match read_tsv(&self.path, false, true) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read isolate metadata: {}", e);
                return Err(e);
            }
        };

        if df.width() < ISOLATE_COLUMNS.len() {
            return Err(polars_err(
                format!(
                    "{} has {} columns, expected Isolate, Color and Group",
                    self.path.display(),
                    df.width()
                )
                .into(),
            ));
        }
        if df.width() > ISOLATE_COLUMNS.len() {
            warn!(
                "Ignoring {} extra column(s) in {}",
                df.width() - ISOLATE_COLUMNS.len(),
                self.path.display()
            );
        }

        let mut names = df.get_column_names_owned();
        for (slot, name) in names.iter_mut().zip(ISOLATE_COLUMNS) {
            *slot = name.into();
        }
        df.set_column_names(names)?;
        let df = df.select(ISOLATE_COLUMNS)?;

        info!("Loaded metadata for {} isolates", df.height());
        Ok(df)
    }
}
