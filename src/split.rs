use crate::dataset;
use crate::error::{PrepError, Result};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Share of rows assigned to each partition.
#[derive(Debug, Clone, Copy)]
pub struct SplitFractions {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

/// The three partitions of one dataset, features and target together.
#[derive(Debug)]
pub struct SplitSets {
    pub train: DataFrame,
    pub val: DataFrame,
    pub test: DataFrame,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub train_rows: usize,
    pub val_rows: usize,
    pub test_rows: usize,
    pub class_count: usize,
}

impl SplitSets {
    pub fn summary(&self, class_count: usize) -> SplitSummary {
        SplitSummary {
            train_rows: self.train.height(),
            val_rows: self.val.height(),
            test_rows: self.test.height(),
            class_count,
        }
    }
}

/// Deterministic stratified train/validation/test split.
///
/// Rows are grouped by their target value, each group is shuffled with the
/// seeded generator, and test/val counts are rounded per group so every class
/// keeps its proportions across partitions. Groups too small to stratify stay
/// in train.
pub fn stratified_split(
    df: &DataFrame,
    target: &str,
    fractions: SplitFractions,
    seed: u64,
) -> Result<(SplitSets, usize)> {
    let y = dataset::column(df, target)?;
    if y.null_count() > 0 {
        return Err(PrepError::Validation(format!(
            "Target column '{target}' has {} missing values",
            y.null_count()
        )));
    }
    if df.height() == 0 {
        return Err(PrepError::Validation("Cannot split an empty dataset".to_string()));
    }

    // BTreeMap keeps class iteration order stable across runs
    let mut groups: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for i in 0..df.height() {
        let key = dataset::render_value(&y.get(i)?);
        groups.entry(key).or_default().push(i as u32);
    }
    let class_count = groups.len();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_idx = Vec::new();
    let mut val_idx = Vec::new();
    let mut test_idx = Vec::new();

    for (class, mut indices) in groups {
        indices.shuffle(&mut rng);
        let n = indices.len();

        if n < 3 {
            warn!(
                "Class '{}' has only {} rows, too few to stratify; keeping in train",
                class, n
            );
            train_idx.extend(indices);
            continue;
        }

        let mut n_test = (n as f64 * fractions.test).round() as usize;
        let mut n_val = (n as f64 * fractions.val).round() as usize;
        // Keep at least one row of every class in train
        while n_test + n_val >= n {
            if n_test >= n_val && n_test > 0 {
                n_test -= 1;
            } else if n_val > 0 {
                n_val -= 1;
            } else {
                break;
            }
        }

        test_idx.extend(indices.drain(..n_test));
        val_idx.extend(indices.drain(..n_val));
        train_idx.extend(indices);
    }

    // Restore original row order within each partition
    train_idx.sort_unstable();
    val_idx.sort_unstable();
    test_idx.sort_unstable();

    let sets = SplitSets {
        train: take_rows(df, train_idx)?,
        val: take_rows(df, val_idx)?,
        test: take_rows(df, test_idx)?,
    };

    info!(
        "Split {} rows into train={} val={} test={} across {} classes",
        df.height(),
        sets.train.height(),
        sets.val.height(),
        sets.test.height(),
        class_count
    );

    Ok((sets, class_count))
}

/// Split a frame into features and target.
pub fn split_features_target(df: &DataFrame, target: &str) -> Result<(DataFrame, Series)> {
    let y = dataset::column(df, target)?.clone();
    let x = df.drop(target)?;
    Ok((x, y))
}

fn take_rows(df: &DataFrame, indices: Vec<u32>) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), indices);
    Ok(df.take(&idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    const FRACTIONS: SplitFractions = SplitFractions {
        train: 0.70,
        val: 0.15,
        test: 0.15,
    };

    fn lead_frame() -> DataFrame {
        // 20 rows, 10 per class
        let visits: Vec<i64> = (0..20).collect();
        let converted: Vec<i64> = (0..20).map(|i| i % 2).collect();
        df!(
            "total_visits" => visits,
            "converted" => converted,
        )
        .unwrap()
    }

    #[test]
    fn partitions_cover_all_rows_disjointly() {
        let frame = lead_frame();
        let (sets, classes) = stratified_split(&frame, "converted", FRACTIONS, 42).unwrap();

        assert_eq!(classes, 2);
        assert_eq!(
            sets.train.height() + sets.val.height() + sets.test.height(),
            frame.height()
        );

        let mut seen: Vec<i64> = Vec::new();
        for part in [&sets.train, &sets.val, &sets.test] {
            let ca = part.column("total_visits").unwrap();
            let series = ca.as_materialized_series();
            for v in series.i64().unwrap().into_iter().flatten() {
                seen.push(v);
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<i64>>());
    }

    #[test]
    fn class_proportions_are_preserved() {
        let frame = lead_frame();
        let (sets, _) = stratified_split(&frame, "converted", FRACTIONS, 42).unwrap();

        for (part, expected) in [(&sets.train, 6), (&sets.val, 2), (&sets.test, 2)] {
            let series = part.column("converted").unwrap().as_materialized_series();
            let ones: i64 = series.i64().unwrap().into_iter().flatten().sum();
            let rows = part.height() as i64;
            assert_eq!(rows, expected * 2);
            assert_eq!(ones, expected, "each partition holds half ones");
        }
    }

    #[test]
    fn same_seed_gives_identical_partitions() {
        let frame = lead_frame();
        let (first, _) = stratified_split(&frame, "converted", FRACTIONS, 7).unwrap();
        let (second, _) = stratified_split(&frame, "converted", FRACTIONS, 7).unwrap();

        assert!(first.train.equals(&second.train));
        assert!(first.val.equals(&second.val));
        assert!(first.test.equals(&second.test));
    }

    #[test]
    fn tiny_class_falls_into_train() {
        let frame = df!(
            "total_visits" => &[1i64, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            "converted" => &[0i64, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
        )
        .unwrap();

        let (sets, _) = stratified_split(&frame, "converted", FRACTIONS, 42).unwrap();
        let train_y = sets
            .train
            .column("converted")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .flatten()
            .filter(|v| *v == 1)
            .count();
        assert_eq!(train_y, 1, "the single-row class stays in train");
    }

    #[test]
    fn null_target_is_rejected() {
        let frame = df!(
            "total_visits" => &[1i64, 2],
            "converted" => &[Some(0i64), None],
        )
        .unwrap();

        assert!(matches!(
            stratified_split(&frame, "converted", FRACTIONS, 42),
            Err(PrepError::Validation(_))
        ));
    }

    #[test]
    fn features_and_target_separate_cleanly() {
        let frame = lead_frame();
        let (x, y) = split_features_target(&frame, "converted").unwrap();
        assert_eq!(x.width(), 1);
        assert_eq!(y.name().as_str(), "converted");
        assert_eq!(y.len(), 20);
    }
}
