use crate::dataset;
use crate::error::{PrepError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::warn;

use super::Transformer;

/// Per-column standardization parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScaleParams {
    pub mean: f64,
    /// Population standard deviation, or 1.0 for constant columns.
    pub scale: f64,
}

/// Standardizes numeric columns to zero mean and unit variance.
///
/// Constant columns keep a scale of 1.0 and map to all-zeros instead of
/// dividing by zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: BTreeMap<String, ScaleParams>,
}

impl StandardScaler {
    pub fn new(columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
            params: BTreeMap::new(),
        }
    }

    pub fn params_for(&self, column: &str) -> Option<ScaleParams> {
        self.params.get(column).copied()
    }

    fn fitted_params(&self, column: &str) -> Result<ScaleParams> {
        self.params
            .get(column)
            .copied()
            .ok_or_else(|| PrepError::Transform {
                message: format!("StandardScaler not fitted for column '{column}'"),
            })
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        self.params.clear();
        for col in &self.columns {
            let series = dataset::column(df, col)?;
            let values = dataset::numeric_values(series)?;

            let params = if values.is_empty() {
                warn!("Column '{}' has no observed values, scaling as identity", col);
                ScaleParams {
                    mean: 0.0,
                    scale: 1.0,
                }
            } else {
                let mean = values.iter().mean();
                let std_dev = values.iter().population_std_dev();
                let scale = if std_dev > 0.0 && std_dev.is_finite() {
                    std_dev
                } else {
                    1.0
                };
                ScaleParams { mean, scale }
            };
            self.params.insert(col.clone(), params);
        }
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for col in &self.columns {
            let params = self.fitted_params(col)?;
            let casted = dataset::column(df, col)?.cast(&DataType::Float64)?;
            let scaled: Vec<Option<f64>> = casted
                .f64()?
                .into_iter()
                .map(|v| v.map(|x| (x - params.mean) / params.scale))
                .collect();
            out.with_column(Series::new(col.as_str().into(), scaled))?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn scaled_values(df: &DataFrame, col: &str) -> Vec<f64> {
        df.column(col)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn scaled_column_has_zero_mean_unit_variance() {
        let train = df!("total_visits" => &[2.0, 4.0, 6.0, 8.0]).unwrap();
        let cols = vec!["total_visits".to_string()];

        let mut scaler = StandardScaler::new(&cols);
        let out = scaler.fit_transform(&train).unwrap();
        let values = scaled_values(&out, "total_visits");

        let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
        let var: f64 =
            values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < 1e-9);
        assert!((var - 1.0).abs() < 1e-9);
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let train = df!("total_visits" => &[5.0, 5.0, 5.0]).unwrap();
        let cols = vec!["total_visits".to_string()];

        let mut scaler = StandardScaler::new(&cols);
        let out = scaler.fit_transform(&train).unwrap();

        assert_eq!(scaled_values(&out, "total_visits"), vec![0.0, 0.0, 0.0]);
        assert_eq!(scaler.params_for("total_visits").unwrap().scale, 1.0);
    }

    #[test]
    fn transform_reuses_training_parameters() {
        let train = df!("total_visits" => &[2.0, 4.0, 6.0]).unwrap();
        let other = df!("total_visits" => &[4.0]).unwrap();
        let cols = vec!["total_visits".to_string()];

        let mut scaler = StandardScaler::new(&cols);
        scaler.fit(&train).unwrap();
        let out = scaler.transform(&other).unwrap();

        // 4.0 is the training mean, so it lands exactly on zero
        assert!(scaled_values(&out, "total_visits")[0].abs() < 1e-9);
    }

    #[test]
    fn nulls_stay_null_through_scaling() {
        let train = df!("total_visits" => &[Some(2.0), Some(4.0), None]).unwrap();
        let cols = vec!["total_visits".to_string()];

        let mut scaler = StandardScaler::new(&cols);
        let out = scaler.fit_transform(&train).unwrap();
        let series = out.column("total_visits").unwrap().as_materialized_series();
        assert_eq!(series.null_count(), 1);
    }
}
