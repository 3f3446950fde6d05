use crate::config::Config;
use crate::dataset;
use crate::error::{PrepError, Result};
use crate::profile;
use crate::schema::DatasetSchema;
use crate::split::{self, SplitFractions};
use crate::transform::{ColumnTransformer, Transformer};
use crate::validation::DataValidator;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const VALIDATION_REPORT_FILE: &str = "validation_report.json";
pub const PROFILE_REPORT_FILE: &str = "report.html";
pub const VALIDATED_DATA_FILE: &str = "validated_data.csv";
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const RUN_RECORD_FILE: &str = "run.json";

/// Result of the validation stage.
#[derive(Debug, Serialize)]
pub struct ValidationStageResult {
    pub passed: bool,
    pub rows: usize,
    pub columns: usize,
    pub finding_count: usize,
    pub dropped_columns: Vec<String>,
    pub report_path: PathBuf,
    pub profile_path: PathBuf,
    /// Only written when every check passed.
    pub validated_data_path: Option<PathBuf>,
}

/// Result of the split + transform stage.
#[derive(Debug, Serialize)]
pub struct TransformationStageResult {
    pub train_rows: usize,
    pub val_rows: usize,
    pub test_rows: usize,
    pub class_count: usize,
    /// Width of the transformed feature matrices.
    pub feature_count: usize,
    pub preprocessor_path: PathBuf,
    pub output_dir: PathBuf,
}

/// Summary record for one end-to-end run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub validation_passed: Option<bool>,
    pub transformation_completed: bool,
}

impl RunRecord {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            validation_passed: None,
            transformation_completed: false,
        }
    }

    fn save(&mut self, artifacts_root: &Path) -> Result<()> {
        self.finished_at = Some(Utc::now());
        let path = artifacts_root.join(RUN_RECORD_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!("Run record saved to {}", path.display());
        Ok(())
    }
}

/// Everything produced by a full `run` invocation.
#[derive(Debug, Serialize)]
pub struct PipelineRunResult {
    pub run_id: Uuid,
    pub validation: ValidationStageResult,
    pub transformation: TransformationStageResult,
}

/// Validate the raw dataset and persist the validation artifacts.
#[instrument(skip(config))]
pub fn run_validation(config: &Config) -> Result<ValidationStageResult> {
    fs::create_dir_all(&config.validation.root_dir)?;

    info!("📥 Loading dataset from {}", config.data.raw_path.display());
    let df = dataset::read_csv(&config.data.raw_path)?;
    let fingerprint = dataset::file_fingerprint(&config.data.raw_path)?;
    let schema = DatasetSchema::load(&config.data.schema_path)?;

    info!("🔍 Validating {} rows against the schema...", df.height());
    let validator = DataValidator::new(schema, config.validation.clone());
    let (report, cleaned) = validator.validate(&df, &fingerprint)?;

    let profile = profile::profile_frame(&df, "Data Profiling Report")?;
    let profile_path = config.validation.root_dir.join(PROFILE_REPORT_FILE);
    profile::write_html_report(&profile, &profile_path)?;

    let report_path = config.validation.root_dir.join(VALIDATION_REPORT_FILE);
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    info!("Validation results saved to {}", report_path.display());

    let validated_data_path = if report.passed {
        let path = config.validation.root_dir.join(VALIDATED_DATA_FILE);
        let mut cleaned = cleaned;
        dataset::write_csv(&mut cleaned, &path)?;
        info!("💾 Validated data saved to {}", path.display());
        Some(path)
    } else {
        warn!(
            "Data validation failed, check {} for details",
            report_path.display()
        );
        None
    };

    Ok(ValidationStageResult {
        passed: report.passed,
        rows: report.row_count,
        columns: report.column_count,
        finding_count: report.finding_count(),
        dropped_columns: report.dropped_columns.clone(),
        report_path,
        profile_path,
        validated_data_path,
    })
}

/// Split the validated dataset and fit/apply the preprocessing pipeline.
#[instrument(skip(config))]
pub fn run_transformation(config: &Config) -> Result<TransformationStageResult> {
    let t = &config.transformation;
    fs::create_dir_all(&t.root_dir)?;

    info!("📥 Loading validated data from {}", t.data_path.display());
    let df = dataset::read_csv(&t.data_path)?;

    info!("✂️  Splitting into train/validation/test sets...");
    let fractions = SplitFractions {
        train: t.train_fraction,
        val: t.val_fraction,
        test: t.test_fraction,
    };
    let (sets, class_count) = split::stratified_split(&df, &t.target_col, fractions, t.random_state)?;

    for (frame, name) in [
        (&sets.train, "y_train.csv"),
        (&sets.val, "y_val.csv"),
        (&sets.test, "y_test.csv"),
    ] {
        let y = dataset::column(frame, &t.target_col)?.clone();
        let mut y_frame = DataFrame::new(vec![y.into_column()])?;
        dataset::write_csv(&mut y_frame, &t.root_dir.join(name))?;
    }

    let (x_train, _) = split::split_features_target(&sets.train, &t.target_col)?;
    let (x_val, _) = split::split_features_target(&sets.val, &t.target_col)?;
    let (x_test, _) = split::split_features_target(&sets.test, &t.target_col)?;

    info!("🔧 Fitting preprocessor on the training partition...");
    let mut preprocessor = ColumnTransformer::new(&t.numerical_cols, &t.categorical_cols);
    let mut x_train_t = preprocessor.fit_transform(&x_train)?;
    let mut x_val_t = preprocessor.transform(&x_val)?;
    let mut x_test_t = preprocessor.transform(&x_test)?;

    let preprocessor_path = t.root_dir.join(PREPROCESSOR_FILE);
    preprocessor.save(&preprocessor_path)?;

    for (frame, name) in [
        (&mut x_train_t, "x_train_transformed.csv"),
        (&mut x_val_t, "x_val_transformed.csv"),
        (&mut x_test_t, "x_test_transformed.csv"),
    ] {
        dataset::write_csv(frame, &t.root_dir.join(name))?;
    }
    info!("💾 Transformed matrices saved to {}", t.root_dir.display());

    Ok(TransformationStageResult {
        train_rows: sets.train.height(),
        val_rows: sets.val.height(),
        test_rows: sets.test.height(),
        class_count,
        feature_count: x_train_t.width(),
        preprocessor_path,
        output_dir: t.root_dir.clone(),
    })
}

/// Run both stages sequentially, refusing to transform unvalidated data.
pub fn run_all(config: &Config) -> Result<PipelineRunResult> {
    fs::create_dir_all(&config.artifacts_root)?;
    let mut record = RunRecord::new();

    let validation = run_validation(config)?;
    record.validation_passed = Some(validation.passed);

    if !validation.passed {
        record.save(&config.artifacts_root)?;
        return Err(PrepError::Validation(format!(
            "Dataset failed validation, see {}",
            validation.report_path.display()
        )));
    }

    let transformation = run_transformation(config)?;
    record.transformation_completed = true;
    record.save(&config.artifacts_root)?;

    Ok(PipelineRunResult {
        run_id: record.id,
        validation,
        transformation,
    })
}
