pub mod classifier_counts;
pub mod isolate_metadata;
pub mod observations;
