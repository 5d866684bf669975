use polars::error::{PolarsError, PolarsResult};
use polars::frame::DataFrame;

/// Identifier columns of the wide classifier-count table. Every other column
/// is an isolate.
pub const ID_COLUMNS: [&str; 4] = ["LETTER", "COLOR", "Category", "Class"];

/// Names given to the header-less isolate metadata columns.
pub const ISOLATE_COLUMNS: [&str; 3] = ["Isolate", "Color", "Group"];

pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

/// Fold any non-polars failure (I/O, plotting, CSV) into a `PolarsError`.
pub fn polars_err(err: Box<dyn std::error::Error>) -> PolarsError {
    PolarsError::ComputeError(err.to_string().into())
}

/// One long-form row that survived the join and filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub letter: String,
    pub category: String,
    pub isolate: String,
    pub group: String,
    pub count: f64,
}

/// Result of one pairwise test inside a (Category, LETTER) stratum.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseComparison {
    pub category: String,
    pub letter: String,
    pub group1: String,
    pub mean1: f64,
    pub group2: String,
    pub mean2: f64,
    /// U statistic of `group1`
    pub statistic: f64,
    pub p_value: f64,
    pub p_adjusted: Option<f64>,
    pub significant: bool,
}
