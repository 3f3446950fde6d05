use crate::dataset;
use crate::error::{PrepError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::Transformer;

/// One-hot encodes categorical columns against the vocabulary seen at fit
/// time.
///
/// Each category becomes a `{column}_{value}` indicator column of 0.0/1.0.
/// Values unseen during fit encode as all-zeros rather than erroring, so a
/// preprocessor fitted on train never rejects validation or test rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    categories: BTreeMap<String, Vec<String>>,
}

impl OneHotEncoder {
    pub fn new(columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
            categories: BTreeMap::new(),
        }
    }

    /// Vocabulary learned for one column, sorted.
    pub fn categories_for(&self, column: &str) -> Option<&[String]> {
        self.categories.get(column).map(Vec::as_slice)
    }

    /// Output column names produced for one input column.
    pub fn feature_names(&self, column: &str) -> Vec<String> {
        self.categories
            .get(column)
            .map(|cats| {
                cats.iter()
                    .map(|cat| format!("{column}_{cat}"))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn fitted_categories(&self, column: &str) -> Result<&[String]> {
        self.categories
            .get(column)
            .map(Vec::as_slice)
            .ok_or_else(|| PrepError::Transform {
                message: format!("OneHotEncoder not fitted for column '{column}'"),
            })
    }
}

impl Transformer for OneHotEncoder {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        self.categories.clear();
        for col in &self.columns {
            let series = dataset::column(df, col)?;
            let ca = string_column(series, col)?;

            let distinct: BTreeSet<String> = ca
                .into_iter()
                .flatten()
                .map(str::to_string)
                .collect();
            self.categories.insert(col.clone(), distinct.into_iter().collect());
        }
        Ok(())
    }

    /// Replaces each configured column, in place, with its indicator block.
    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut cols: Vec<Column> = Vec::new();

        for column in df.get_columns() {
            let name = column.name().as_str();
            if !self.columns.iter().any(|c| c == name) {
                cols.push(column.clone());
                continue;
            }

            let cats = self.fitted_categories(name)?;
            let series = column.as_materialized_series();
            let ca = string_column(series, name)?;
            for cat in cats {
                let indicators: Vec<f64> = ca
                    .into_iter()
                    .map(|v| if v == Some(cat.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                cols.push(Series::new(format!("{name}_{cat}").into(), indicators).into());
            }
        }

        Ok(DataFrame::new(cols)?)
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
