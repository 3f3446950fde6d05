use crate::dataset;
use crate::error::{PrepError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use super::Transformer;

/// Fills missing numeric values with the per-column mean seen at fit time.
///
/// Output columns are always Float64, matching the widening the scaler
/// performs anyway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanImputer {
    columns: Vec<String>,
    means: BTreeMap<String, f64>,
}

impl MeanImputer {
    pub fn new(columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
            means: BTreeMap::new(),
        }
    }

    pub fn mean_for(&self, column: &str) -> Option<f64> {
        self.means.get(column).copied()
    }

    fn fitted_mean(&self, column: &str) -> Result<f64> {
        self.means
            .get(column)
            .copied()
            .ok_or_else(|| PrepError::Transform {
                message: format!("MeanImputer not fitted for column '{column}'"),
            })
    }
}

impl Transformer for MeanImputer {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        self.means.clear();
        for col in &self.columns {
            let series = dataset::column(df, col)?;
            let values = dataset::numeric_values(series)?;
            let mean = if values.is_empty() {
                warn!("Column '{}' has no observed values, imputing 0.0", col);
                0.0
            } else {
                values.iter().mean()
            };
            self.means.insert(col.clone(), mean);
        }
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for col in &self.columns {
            let mean = self.fitted_mean(col)?;
            let casted = dataset::column(df, col)?.cast(&DataType::Float64)?;
            let filled: Vec<f64> = casted
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(mean))
                .collect();
            out.with_column(Series::new(col.as_str().into(), filled))?;
        }
        Ok(out)
    }
}

/// Fills missing categorical values with the per-column modal value.
///
/// Ties break toward the smallest value so repeated fits are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MostFrequentImputer {
    columns: Vec<String>,
    modes: BTreeMap<String, String>,
}

impl MostFrequentImputer {
    pub fn new(columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
            modes: BTreeMap::new(),
        }
    }

    pub fn mode_for(&self, column: &str) -> Option<&str> {
        self.modes.get(column).map(String::as_str)
    }

    fn fitted_mode(&self, column: &str) -> Result<&str> {
        self.modes
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| PrepError::Transform {
                message: format!("MostFrequentImputer not fitted for column '{column}'"),
            })
    }
}

impl Transformer for MostFrequentImputer {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        self.modes.clear();
        for col in &self.columns {
            let series = dataset::column(df, col)?;
            let ca = string_column(series, col)?;

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for value in ca.into_iter().flatten() {
                *counts.entry(value).or_insert(0) += 1;
            }

            let mode = counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(value, _)| value.to_string())
                .unwrap_or_else(|| {
                    warn!("Column '{}' has no observed values, imputing \"\"", col);
                    String::new()
                });
            self.modes.insert(col.clone(), mode);
        }
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for col in &self.columns {
            let mode = self.fitted_mode(col)?;
            let series = dataset::column(df, col)?;
            let ca = string_column(series, col)?;

            let filled: StringChunked = ca
                .into_iter()
                .map(|v| v.or(Some(mode)))
                .collect();
            out.with_column(filled.with_name(col.as_str().into()).into_series())?;
        }
        Ok(out)
    }
}

fn string_column<'a>(series: &'a Series, col: &str) -> Result<&'a StringChunked> {
    series.str().map_err(|_| PrepError::Transform {
        message: format!(
            "Categorical column '{col}' has dtype {}, expected strings",
            series.dtype()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn mean_imputer_fills_with_training_mean() {
        let train = df!("total_visits" => &[Some(2.0), Some(6.0), None]).unwrap();
        let cols = vec!["total_visits".to_string()];

        let mut imputer = MeanImputer::new(&cols);
        let out = imputer.fit_transform(&train).unwrap();

        assert_eq!(imputer.mean_for("total_visits"), Some(4.0));
        let series = out.column("total_visits").unwrap().as_materialized_series();
        assert_eq!(series.null_count(), 0);
        assert_eq!(series.f64().unwrap().get(2), Some(4.0));
    }

    #[test]
    fn mean_imputer_widens_integers_to_float() {
        let train = df!("total_visits" => &[Some(1i64), None, Some(3)]).unwrap();
        let cols = vec!["total_visits".to_string()];

        let mut imputer = MeanImputer::new(&cols);
        let out = imputer.fit_transform(&train).unwrap();

        let series = out.column("total_visits").unwrap().as_materialized_series();
        assert_eq!(series.dtype(), &DataType::Float64);
        assert_eq!(series.f64().unwrap().get(1), Some(2.0));
    }

    #[test]
    fn all_null_column_imputes_zero() {
        let train = df!("total_visits" => &[None::<f64>, None]).unwrap();
        let cols = vec!["total_visits".to_string()];

        let mut imputer = MeanImputer::new(&cols);
        let out = imputer.fit_transform(&train).unwrap();

        let series = out.column("total_visits").unwrap().as_materialized_series();
        assert_eq!(series.f64().unwrap().get(0), Some(0.0));
    }

    #[test]
    fn transform_before_fit_is_an_error() {
        let frame = df!("total_visits" => &[1.0]).unwrap();
        let imputer = MeanImputer::new(&["total_visits".to_string()]);
        assert!(matches!(
            imputer.transform(&frame),
            Err(PrepError::Transform { .. })
        ));
    }

    #[test]
    fn most_frequent_imputer_fills_with_mode() {
        let train = df!(
            "lead_source" => &[Some("google"), Some("google"), Some("referral"), None],
        )
        .unwrap();
        let cols = vec!["lead_source".to_string()];

        let mut imputer = MostFrequentImputer::new(&cols);
        let out = imputer.fit_transform(&train).unwrap();

        assert_eq!(imputer.mode_for("lead_source"), Some("google"));
        let series = out.column("lead_source").unwrap().as_materialized_series();
        assert_eq!(series.null_count(), 0);
        assert_eq!(series.str().unwrap().get(3), Some("google"));
    }

    #[test]
    fn mode_ties_break_toward_smallest_value() {
        let train = df!(
            "lead_source" => &["referral", "google", "google", "referral"],
        )
        .unwrap();
        let cols = vec!["lead_source".to_string()];

        let mut imputer = MostFrequentImputer::new(&cols);
        imputer.fit(&train).unwrap();
        assert_eq!(imputer.mode_for("lead_source"), Some("google"));
    }

    #[test]
    fn non_string_categorical_column_is_a_transform_error() {
        let train = df!("lead_source" => &[1i64, 2]).unwrap();
        let mut imputer = MostFrequentImputer::new(&["lead_source".to_string()]);
        assert!(matches!(
            imputer.fit(&train),
            Err(PrepError::Transform { .. })
        ));
    }
}
