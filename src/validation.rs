use crate::config::ValidationConfig;
use crate::dataset;
use crate::error::Result;
use crate::schema::{ColumnSpec, DatasetSchema, ScalarValue};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// How many offending values a single finding reports before truncating.
const MAX_REPORTED_VALUES: usize = 20;

/// The rule checks a validation run executes, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Columns,
    Dtypes,
    CriticalMissing,
    StringEnums,
    NumericEnums,
    NumericRanges,
}

/// Severity of an individual finding.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum FindingSeverity {
    /// Notable, but the check still passes.
    Warning,
    /// The check fails.
    Error,
    /// The check fails and the dataset must not reach the transform stage.
    Critical,
}

/// A single rule violation detected during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: FindingSeverity,
    pub column: Option<String>,
    pub description: String,
    /// Offending values, capped at `MAX_REPORTED_VALUES`.
    pub values: Vec<String>,
}

/// Outcome of one check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: CheckKind,
    pub passed: bool,
    pub findings: Vec<Finding>,
}

/// Full validation report persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub row_count: usize,
    pub column_count: usize,
    pub dataset_sha256: String,
    pub checks: Vec<CheckResult>,
    /// Columns dropped because every value was distinct.
    pub dropped_columns: Vec<String>,
    pub validated_at: DateTime<Utc>,
}

impl ValidationReport {
    /// Whether any finding carries `Critical` severity.
    pub fn has_critical_findings(&self) -> bool {
        self.checks.iter().any(|c| {
            c.findings
                .iter()
                .any(|f| f.severity == FindingSeverity::Critical)
        })
    }

    pub fn finding_count(&self) -> usize {
        self.checks.iter().map(|c| c.findings.len()).sum()
    }
}

/// Rule-based validator for one declared dataset shape.
pub struct DataValidator {
    schema: DatasetSchema,
    config: ValidationConfig,
}

impl DataValidator {
    pub fn new(schema: DatasetSchema, config: ValidationConfig) -> Self {
        Self { schema, config }
    }

    /// Run every check against the frame and assemble the report.
    ///
    /// Data-content problems never error out of this function; they become
    /// findings. The returned frame is the input minus fully-unique columns.
    pub fn validate(
        &self,
        df: &DataFrame,
        dataset_sha256: &str,
    ) -> Result<(ValidationReport, DataFrame)> {
        let checks = vec![
            self.check_columns(df),
            self.check_dtypes(df)?,
            self.check_critical_missing(df),
            self.check_string_enums(df)?,
            self.check_numeric_enums(df)?,
            self.check_numeric_ranges(df)?,
        ];

        for check in &checks {
            if check.passed {
                info!("Check {:?} passed", check.check);
            } else {
                warn!(
                    "Check {:?} failed with {} findings",
                    check.check,
                    check.findings.len()
                );
            }
        }

        let (cleaned, dropped_columns) = drop_unique_columns(df)?;
        let passed = checks.iter().all(|c| c.passed);

        let report = ValidationReport {
            passed,
            row_count: df.height(),
            column_count: df.width(),
            dataset_sha256: dataset_sha256.to_string(),
            checks,
            dropped_columns,
            validated_at: Utc::now(),
        };

        Ok((report, cleaned))
    }

    /// All declared columns must be present, and none beyond them.
    fn check_columns(&self, df: &DataFrame) -> CheckResult {
        let frame_cols: HashSet<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let schema_cols: HashSet<String> = self.schema.columns.keys().cloned().collect();

        let mut missing: Vec<String> = schema_cols.difference(&frame_cols).cloned().collect();
        let mut extra: Vec<String> = frame_cols.difference(&schema_cols).cloned().collect();
        missing.sort();
        extra.sort();

        let mut findings = Vec::new();
        if !missing.is_empty() {
            findings.push(Finding {
                severity: FindingSeverity::Error,
                column: None,
                description: format!("{} declared columns are missing", missing.len()),
                values: missing,
            });
        }
        if !extra.is_empty() {
            findings.push(Finding {
                severity: FindingSeverity::Error,
                column: None,
                description: format!("{} columns are not declared in the schema", extra.len()),
                values: extra,
            });
        }

        result(CheckKind::Columns, findings)
    }

    /// Each present column's dtype must satisfy its declaration.
    fn check_dtypes(&self, df: &DataFrame) -> Result<CheckResult> {
        let mut findings = Vec::new();

        for (name, spec) in &self.schema.columns {
            let Ok(series) = dataset::column(df, name) else {
                // The columns check already reports the absence
                continue;
            };
            let dtype = series.dtype();
            if !spec.column_type.accepts(dtype) {
                findings.push(Finding {
                    severity: FindingSeverity::Error,
                    column: Some(name.clone()),
                    description: format!(
                        "Declared {}, found dtype {}",
                        spec.column_type.label(),
                        dtype
                    ),
                    values: Vec::new(),
                });
            }
        }

        Ok(result(CheckKind::Dtypes, findings))
    }

    /// Critical columns must exist and be null-free.
    fn check_critical_missing(&self, df: &DataFrame) -> CheckResult {
        let mut findings = Vec::new();

        for name in &self.config.critical_columns {
            match dataset::column(df, name) {
                Err(_) => findings.push(Finding {
                    severity: FindingSeverity::Critical,
                    column: Some(name.clone()),
                    description: "Critical column is not present".to_string(),
                    values: Vec::new(),
                }),
                Ok(series) => {
                    let nulls = series.null_count();
                    if nulls > 0 {
                        findings.push(Finding {
                            severity: FindingSeverity::Critical,
                            column: Some(name.clone()),
                            description: format!("Critical column has {nulls} missing values"),
                            values: Vec::new(),
                        });
                    }
                }
            }
        }

        result(CheckKind::CriticalMissing, findings)
    }

    /// String columns with an enum constraint may only hold allowed values.
    fn check_string_enums(&self, df: &DataFrame) -> Result<CheckResult> {
        let mut findings = Vec::new();

        for (name, spec) in self.constrained_columns(|s| !s.column_type.is_numeric()) {
            let Some(values) = spec.enum_values() else {
                continue;
            };
            let Ok(series) = dataset::column(df, name) else {
                continue;
            };
            let Ok(ca) = series.str() else {
                // dtype check reports the mismatch
                debug!("Skipping enum check for non-string column {name}");
                continue;
            };

            let allowed: HashSet<&str> = values.iter().filter_map(ScalarValue::as_str).collect();
            let mut offending = Vec::new();
            for value in ca.into_iter().flatten() {
                if !allowed.contains(value) {
                    offending.push(value.to_string());
                }
            }
            if !offending.is_empty() {
                findings.push(enum_finding(name, offending));
            }
        }

        Ok(result(CheckKind::StringEnums, findings))
    }

    /// Numeric columns with an enum constraint may only hold allowed values.
    fn check_numeric_enums(&self, df: &DataFrame) -> Result<CheckResult> {
        let mut findings = Vec::new();

        for (name, spec) in self.constrained_columns(|s| s.column_type.is_numeric()) {
            let Some(values) = spec.enum_values() else {
                continue;
            };
            let Ok(series) = dataset::column(df, name) else {
                continue;
            };
            if !is_numeric_series(series) {
                debug!("Skipping enum check for non-numeric column {name}");
                continue;
            }

            let allowed: Vec<f64> = values.iter().filter_map(ScalarValue::as_f64).collect();
            let mut offending = Vec::new();
            for value in dataset::numeric_values(series)? {
                if !allowed.iter().any(|a| *a == value) {
                    offending.push(format_number(value));
                }
            }
            if !offending.is_empty() {
                findings.push(enum_finding(name, offending));
            }
        }

        Ok(result(CheckKind::NumericEnums, findings))
    }

    /// Numeric columns with a range constraint must fall within [min, max].
    fn check_numeric_ranges(&self, df: &DataFrame) -> Result<CheckResult> {
        let mut findings = Vec::new();

        for (name, spec) in self.constrained_columns(|s| s.column_type.is_numeric()) {
            let Some((min, max)) = spec.range() else {
                continue;
            };
            let Ok(series) = dataset::column(df, name) else {
                continue;
            };
            if !is_numeric_series(series) {
                debug!("Skipping range check for non-numeric column {name}");
                continue;
            }

            let mut below = Vec::new();
            let mut above = Vec::new();
            for value in dataset::numeric_values(series)? {
                if min.is_some_and(|m| value < m) {
                    below.push(format_number(value));
                } else if max.is_some_and(|m| value > m) {
                    above.push(format_number(value));
                }
            }

            if !below.is_empty() {
                findings.push(range_finding(name, "minimum", min, below));
            }
            if !above.is_empty() {
                findings.push(range_finding(name, "maximum", max, above));
            }
        }

        Ok(result(CheckKind::NumericRanges, findings))
    }

    fn constrained_columns(
        &self,
        pred: impl Fn(&ColumnSpec) -> bool,
    ) -> impl Iterator<Item = (&String, &ColumnSpec)> {
        self.schema
            .columns
            .iter()
            .filter(move |(_, spec)| pred(spec))
    }
}

/// Drop columns whose distinct count equals the row count.
///
/// Such columns are identifiers; they carry no signal for the model and blow
/// up one-hot encodings. A single-row frame is left alone since every column
/// would qualify.
pub fn drop_unique_columns(df: &DataFrame) -> Result<(DataFrame, Vec<String>)> {
    let mut dropped = Vec::new();
    let mut out = df.clone();

    if df.height() > 1 {
        for name in df.get_column_names() {
            let series = dataset::column(df, name.as_str())?;
            if series.n_unique()? == df.height() {
                out = out.drop(name.as_str())?;
                dropped.push(name.to_string());
            }
        }
    }

    if !dropped.is_empty() {
        warn!("Dropping columns with fully unique values: {:?}", dropped);
    }
    Ok((out, dropped))
}

fn result(check: CheckKind, findings: Vec<Finding>) -> CheckResult {
    let passed = findings
        .iter()
        .all(|f| f.severity < FindingSeverity::Error);
    CheckResult {
        check,
        passed,
        findings,
    }
}

fn enum_finding(column: &str, mut offending: Vec<String>) -> Finding {
    let total = offending.len();
    offending.truncate(MAX_REPORTED_VALUES);
    Finding {
        severity: FindingSeverity::Error,
        column: Some(column.to_string()),
        description: format!("{total} values outside the allowed set"),
        values: offending,
    }
}

fn range_finding(column: &str, bound: &str, limit: Option<f64>, mut offending: Vec<String>) -> Finding {
    let total = offending.len();
    offending.truncate(MAX_REPORTED_VALUES);
    Finding {
        severity: FindingSeverity::Error,
        column: Some(column.to_string()),
        description: format!(
            "{total} values violate the {bound} of {}",
            limit.map(format_number).unwrap_or_default()
        ),
        values: offending,
    }
}

fn is_numeric_series(series: &Series) -> bool {
    matches!(
        series.dtype(),
        DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64
    )
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::schema::{ColumnType, Constraint};
    use polars::df;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn lead_schema() -> DatasetSchema {
        let mut columns = BTreeMap::new();
        columns.insert(
            "lead_source".to_string(),
            ColumnSpec {
                column_type: ColumnType::String,
                constraints: vec![Constraint::Enum {
                    values: vec![
                        ScalarValue::Text("google".to_string()),
                        ScalarValue::Text("referral".to_string()),
                    ],
                }],
            },
        );
        columns.insert(
            "total_visits".to_string(),
            ColumnSpec {
                column_type: ColumnType::Integer,
                constraints: vec![Constraint::Range {
                    min: Some(0.0),
                    max: Some(100.0),
                }],
            },
        );
        columns.insert(
            "converted".to_string(),
            ColumnSpec {
                column_type: ColumnType::Integer,
                constraints: vec![Constraint::Enum {
                    values: vec![ScalarValue::Int(0), ScalarValue::Int(1)],
                }],
            },
        );
        DatasetSchema { columns }
    }

    fn validator() -> DataValidator {
        DataValidator::new(
            lead_schema(),
            ValidationConfig {
                root_dir: PathBuf::from("artifacts/validation"),
                critical_columns: vec!["converted".to_string()],
            },
        )
    }

    fn valid_frame() -> DataFrame {
        df!(
            "lead_source" => &["google", "referral", "google", "google"],
            "total_visits" => &[3i64, 10, 0, 3],
            "converted" => &[1i64, 0, 0, 1],
        )
        .unwrap()
    }

    fn check<'a>(report: &'a ValidationReport, kind: CheckKind) -> &'a CheckResult {
        report.checks.iter().find(|c| c.check == kind).unwrap()
    }

    #[test]
    fn clean_frame_passes_every_check() {
        let (report, cleaned) = validator().validate(&valid_frame(), "abc123").unwrap();
        assert!(report.passed);
        assert_eq!(report.finding_count(), 0);
        assert_eq!(cleaned.width(), 3);
        assert_eq!(report.dataset_sha256, "abc123");
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let frame = df!(
            "lead_source" => &["google"],
            "converted" => &[1i64],
        )
        .unwrap();

        let (report, _) = validator().validate(&frame, "abc123").unwrap();
        assert!(!report.passed);

        let columns = check(&report, CheckKind::Columns);
        assert!(!columns.passed);
        assert!(columns.findings[0]
            .values
            .contains(&"total_visits".to_string()));
    }

    #[test]
    fn extra_column_fails_the_columns_check() {
        let mut frame = valid_frame();
        frame
            .with_column(Series::new("surprise".into(), &[1i64, 2, 3, 4]))
            .unwrap();

        let (report, _) = validator().validate(&frame, "abc123").unwrap();
        let columns = check(&report, CheckKind::Columns);
        assert!(!columns.passed);
        assert!(columns.findings[0].values.contains(&"surprise".to_string()));
    }

    #[test]
    fn dtype_mismatch_names_expected_and_actual() {
        let frame = df!(
            "lead_source" => &["google", "referral"],
            "total_visits" => &["3", "10"],
            "converted" => &[1i64, 0],
        )
        .unwrap();

        let (report, _) = validator().validate(&frame, "abc123").unwrap();
        let dtypes = check(&report, CheckKind::Dtypes);
        assert!(!dtypes.passed);
        let finding = &dtypes.findings[0];
        assert_eq!(finding.column.as_deref(), Some("total_visits"));
        assert!(finding.description.contains("integer"));
        assert!(finding.description.contains("str"));
    }

    #[test]
    fn null_in_critical_column_is_critical() {
        let frame = df!(
            "lead_source" => &["google", "referral"],
            "total_visits" => &[3i64, 10],
            "converted" => &[Some(1i64), None],
        )
        .unwrap();

        let (report, _) = validator().validate(&frame, "abc123").unwrap();
        assert!(!report.passed);
        assert!(report.has_critical_findings());

        let critical = check(&report, CheckKind::CriticalMissing);
        assert_eq!(
            critical.findings[0].severity,
            FindingSeverity::Critical
        );
    }

    #[test]
    fn enum_violation_reports_the_offending_value() {
        let frame = df!(
            "lead_source" => &["google", "billboard"],
            "total_visits" => &[3i64, 10],
            "converted" => &[1i64, 0],
        )
        .unwrap();

        let (report, _) = validator().validate(&frame, "abc123").unwrap();
        let enums = check(&report, CheckKind::StringEnums);
        assert!(!enums.passed);
        assert_eq!(enums.findings[0].values, vec!["billboard".to_string()]);
    }

    #[test]
    fn numeric_enum_violation_is_reported() {
        let frame = df!(
            "lead_source" => &["google", "referral"],
            "total_visits" => &[3i64, 10],
            "converted" => &[1i64, 7],
        )
        .unwrap();

        let (report, _) = validator().validate(&frame, "abc123").unwrap();
        let enums = check(&report, CheckKind::NumericEnums);
        assert!(!enums.passed);
        assert_eq!(enums.findings[0].values, vec!["7".to_string()]);
    }

    #[test]
    fn range_violations_split_min_and_max() {
        let frame = df!(
            "lead_source" => &["google", "referral", "google"],
            "total_visits" => &[-5i64, 10, 400],
            "converted" => &[1i64, 0, 1],
        )
        .unwrap();

        let (report, _) = validator().validate(&frame, "abc123").unwrap();
        let ranges = check(&report, CheckKind::NumericRanges);
        assert!(!ranges.passed);
        assert_eq!(ranges.findings.len(), 2);
        assert_eq!(ranges.findings[0].values, vec!["-5".to_string()]);
        assert_eq!(ranges.findings[1].values, vec!["400".to_string()]);
    }

    #[test]
    fn fully_unique_columns_are_dropped() {
        let frame = df!(
            "prospect_id" => &["a", "b", "c", "d"],
            "lead_source" => &["google", "google", "referral", "google"],
        )
        .unwrap();

        let (cleaned, dropped) = drop_unique_columns(&frame).unwrap();
        assert_eq!(dropped, vec!["prospect_id".to_string()]);
        assert_eq!(cleaned.width(), 1);
    }

    #[test]
    fn single_row_frame_keeps_its_columns() {
        let frame = df!("prospect_id" => &["a"]).unwrap();
        let (cleaned, dropped) = drop_unique_columns(&frame).unwrap();
        assert!(dropped.is_empty());
        assert_eq!(cleaned.width(), 1);
    }
}
