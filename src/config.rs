use crate::error::{PrepError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level run configuration for the preparation pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub artifacts_root: PathBuf,
    pub data: DataConfig,
    pub validation: ValidationConfig,
    pub transformation: TransformationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Raw input dataset (CSV).
    pub raw_path: PathBuf,
    /// YAML schema the dataset is validated against.
    pub schema_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Directory the validation artifacts are written to.
    pub root_dir: PathBuf,
    /// Columns that must be present and null-free.
    #[serde(default)]
    pub critical_columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformationConfig {
    /// Directory the split/transform artifacts are written to.
    pub root_dir: PathBuf,
    /// Dataset the transformation stage reads, normally the validated CSV.
    pub data_path: PathBuf,
    pub numerical_cols: Vec<String>,
    pub categorical_cols: Vec<String>,
    pub target_col: String,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f64,
    #[serde(default = "default_val_fraction")]
    pub val_fraction: f64,
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
}

fn default_random_state() -> u64 {
    42
}

fn default_train_fraction() -> f64 {
    0.70
}

fn default_val_fraction() -> f64 {
    0.15
}

fn default_test_fraction() -> f64 {
    0.15
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PrepError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.transformation.check_fractions()?;
        Ok(config)
    }
}

impl TransformationConfig {
    /// Split fractions must cover the whole dataset.
    pub fn check_fractions(&self) -> Result<()> {
        let total = self.train_fraction + self.val_fraction + self.test_fraction;
        if (total - 1.0).abs() > 1e-6 {
            return Err(PrepError::Config(format!(
                "Split fractions must sum to 1.0, got {total}"
            )));
        }
        if self.train_fraction <= 0.0 || self.val_fraction < 0.0 || self.test_fraction < 0.0 {
            return Err(PrepError::Config(
                "Split fractions must be non-negative with a positive train share".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_transformation() -> TransformationConfig {
        TransformationConfig {
            root_dir: PathBuf::from("artifacts/transformation"),
            data_path: PathBuf::from("artifacts/validation/validated_data.csv"),
            numerical_cols: vec!["total_visits".to_string()],
            categorical_cols: vec!["lead_source".to_string()],
            target_col: "converted".to_string(),
            random_state: 42,
            train_fraction: 0.70,
            val_fraction: 0.15,
            test_fraction: 0.15,
        }
    }

    #[test]
    fn default_fractions_are_accepted() {
        assert!(base_transformation().check_fractions().is_ok());
    }

    #[test]
    fn fractions_must_sum_to_one() {
        let mut cfg = base_transformation();
        cfg.test_fraction = 0.25;
        assert!(matches!(
            cfg.check_fractions(),
            Err(PrepError::Config(_))
        ));
    }
}
