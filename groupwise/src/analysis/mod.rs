pub mod boxplot;
pub mod correction;
pub mod mann_whitney;
pub mod pairwise;
pub mod statistics_output;
