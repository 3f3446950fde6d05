use crate::error::{PrepError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

mod encode;
mod impute;
mod scale;

pub use encode::OneHotEncoder;
pub use impute::{MeanImputer, MostFrequentImputer};
pub use scale::StandardScaler;

/// A fit-once, apply-many feature transformer.
///
/// `fit` learns state from the training partition; `transform` applies that
/// state without touching it, so validation and test data never leak into
/// the fitted parameters.
pub trait Transformer {
    fn fit(&mut self, df: &DataFrame) -> Result<()>;

    fn transform(&self, df: &DataFrame) -> Result<DataFrame>;

    fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }
}

/// Column-wise preprocessor combining the numeric and categorical pipelines.
///
/// Numeric columns run impute(mean) then standardize; categorical columns run
/// impute(most frequent) then one-hot encode. Everything else passes through
/// untouched after the transformed block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTransformer {
    numerical_cols: Vec<String>,
    categorical_cols: Vec<String>,
    mean_imputer: MeanImputer,
    scaler: StandardScaler,
    mode_imputer: MostFrequentImputer,
    encoder: OneHotEncoder,
}

impl ColumnTransformer {
    pub fn new(numerical_cols: &[String], categorical_cols: &[String]) -> Self {
        Self {
            numerical_cols: numerical_cols.to_vec(),
            categorical_cols: categorical_cols.to_vec(),
            mean_imputer: MeanImputer::new(numerical_cols),
            scaler: StandardScaler::new(numerical_cols),
            mode_imputer: MostFrequentImputer::new(categorical_cols),
            encoder: OneHotEncoder::new(categorical_cols),
        }
    }

    /// Every configured column must exist in the frame.
    fn check_columns(&self, df: &DataFrame) -> Result<()> {
        for col in self.numerical_cols.iter().chain(&self.categorical_cols) {
            if df.column(col).is_err() {
                return Err(PrepError::MissingColumn(col.clone()));
            }
        }
        Ok(())
    }

    /// Serialize the fitted parameters to a JSON artifact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("Preprocessor saved to {}", path.display());
        Ok(())
    }

    /// Restore a fitted preprocessor from its JSON artifact.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Transformer for ColumnTransformer {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        self.check_columns(df)?;

        // Each downstream step fits on the output of the one before it,
        // mirroring a pipeline of imputer -> scaler / imputer -> encoder.
        let num_imputed = self.mean_imputer.fit_transform(df)?;
        self.scaler.fit(&num_imputed)?;

        let cat_imputed = self.mode_imputer.fit_transform(df)?;
        self.encoder.fit(&cat_imputed)?;

        info!(
            "Fitted preprocessor on {} rows ({} numeric, {} categorical columns)",
            df.height(),
            self.numerical_cols.len(),
            self.categorical_cols.len()
        );
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.check_columns(df)?;

        let scaled = self.scaler.transform(&self.mean_imputer.transform(df)?)?;
        let encoded = self.encoder.transform(&self.mode_imputer.transform(df)?)?;

        let mut cols: Vec<Column> = Vec::new();
        for name in &self.numerical_cols {
            cols.push(scaled.column(name)?.clone());
        }
        for name in &self.categorical_cols {
            for feature in self.encoder.feature_names(name) {
                cols.push(encoded.column(&feature)?.clone());
            }
        }
        for column in df.get_columns() {
            let name = column.name().as_str();
            let transformed = self.numerical_cols.iter().any(|c| c == name)
                || self.categorical_cols.iter().any(|c| c == name);
            if !transformed {
                cols.push(column.clone());
            }
        }

        Ok(DataFrame::new(cols)?)
    }
}
