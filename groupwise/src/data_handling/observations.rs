use std::collections::BTreeSet;

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::models::Observation;

const ROW_INDEX: &str = "__row_nr";

/// Left-join the long table onto the isolate metadata, keeping long-row order.
pub fn join_isolates(long: &DataFrame, isolates: &DataFrame) -> PolarsResult<DataFrame> {
    let merged = long
        .clone()
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .join(
            isolates.clone().lazy(),
            [col("Isolate")],
            [col("Isolate")],
            JoinArgs::new(JoinType::Left),
        )
        .sort([ROW_INDEX], SortMultipleOptions::default().with_maintain_order(true))
        .select([col("*").exclude([ROW_INDEX])])
        .collect()?;

    debug!("Merged table has {} rows", merged.height());
    Ok(merged)
}

/// Row accounting of [`collect_observations`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterReport {
    pub kept: usize,
    pub missing_letter: usize,
    pub missing_group: usize,
    pub missing_count: usize,
    pub unmatched_isolates: BTreeSet<String>,
}

/// Keep rows with a known LETTER, a known Group and a numeric Count.
pub fn collect_observations(merged: &DataFrame) -> PolarsResult<(Vec<Observation>, FilterReport)> {
    let letter = merged.column("LETTER")?.str()?;
    let category = merged.column("Category")?.str()?;
    let isolate = merged.column("Isolate")?.str()?;
    let group = merged.column("Group")?.str()?;
    let count = merged.column("Count")?.f64()?;

    let mut report = FilterReport::default();
    let mut rows = Vec::with_capacity(merged.height());

    for i in 0..merged.height() {
        let Some(l) = letter.get(i) else {
            report.missing_letter += 1;
            continue;
        };
        let Some(g) = group.get(i) else {
            report.missing_group += 1;
            if let Some(iso) = isolate.get(i) {
                report.unmatched_isolates.insert(iso.to_string());
            }
            continue;
        };
        let Some(c) = count.get(i).filter(|c| !c.is_nan()) else {
            report.missing_count += 1;
            continue;
        };

        rows.push(Observation {
            letter: l.to_string(),
            category: category.get(i).unwrap_or_default().to_string(),
            isolate: isolate.get(i).unwrap_or_default().to_string(),
            group: g.to_string(),
            count: c,
        });
    }
    report.kept = rows.len();

    if report.missing_letter > 0 {
        warn!("Skipped {} rows without a LETTER", report.missing_letter);
    }
    if report.missing_group > 0 {
        warn!(
            "Skipped {} rows from {} isolate(s) without group metadata",
            report.missing_group,
            report.unmatched_isolates.len()
        );
        debug!("Isolates without metadata: {:?}", report.unmatched_isolates);
    }
    if report.missing_count > 0 {
        warn!("Skipped {} rows with a missing or non-numeric Count", report.missing_count);
    }
    info!("{} observations kept for testing", report.kept);

    Ok((rows, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::classifier_counts::melt_counts;
    use polars::df;

    #[test]
    fn join_and_filter_keep_melt_order() {
        let wide = df![
            "LETTER" => &["A", "B"],
            "COLOR" => &["red", "blue"],
            "Category" => &["Cat", "Cat"],
            "Class" => &["x", "y"],
            "iso2" => &[Some(1.0), None],
            "stray" => &[5.0, 6.0],
            "iso1" => &[3.0, 4.0]
        ]
        .unwrap();
        // metadata listed in a different order than the header
        let isolates = df![
            "Isolate" => &["iso1", "iso2"],
            "Color" => &["#000", "#fff"],
            "Group" => &["G1", "G2"]
        ]
        .unwrap();

        let long = melt_counts(&wide).unwrap();
        let merged = join_isolates(&long, &isolates).unwrap();
        assert_eq!(merged.height(), 6);

        let (obs, report) = collect_observations(&merged).unwrap();
        let got: Vec<_> = obs.iter().map(|o| (o.isolate.as_str(), o.letter.as_str(), o.count)).collect();
        assert_eq!(got, vec![("iso2", "A", 1.0), ("iso1", "A", 3.0), ("iso1", "B", 4.0)]);

        assert_eq!(report.kept, 3);
        assert_eq!(report.missing_group, 2);
        assert_eq!(report.missing_count, 1);
        assert!(report.unmatched_isolates.contains("stray"));
        assert_eq!(obs[0].group, "G2");
    }

    #[test]
    fn duplicated_metadata_keeps_listing_order() {
        let long = df![
            "LETTER" => &["A", "A"],
            "COLOR" => &["red", "red"],
            "Category" => &["Cat", "Cat"],
            "Class" => &["x", "x"],
            "Isolate" => &["iso1", "iso2"],
            "Count" => &[1.0, 2.0]
        ]
        .unwrap();
        let isolates = df![
            "Isolate" => &["iso1", "iso2", "iso1", "iso1"],
            "Color" => &["#000", "#111", "#222", "#333"],
            "Group" => &["G1", "G2", "G3", "G4"]
        ]
        .unwrap();

        let merged = join_isolates(&long, &isolates).unwrap();
        let (obs, _) = collect_observations(&merged).unwrap();
        let got: Vec<_> = obs.iter().map(|o| (o.isolate.as_str(), o.group.as_str())).collect();
        assert_eq!(got, vec![("iso1", "G1"), ("iso1", "G3"), ("iso1", "G4"), ("iso2", "G2")]);
    }
}
