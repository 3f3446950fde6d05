use crate::dataset;
use crate::error::Result;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// How many distinct values a non-numeric column reports frequencies for.
const TOP_VALUE_LIMIT: usize = 5;

/// Profile of a full dataset, one entry per column.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetProfile {
    pub title: String,
    pub row_count: usize,
    pub column_count: usize,
    pub generated_at: DateTime<Utc>,
    pub columns: Vec<ColumnProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    /// Non-null entries.
    pub count: usize,
    pub null_count: usize,
    pub distinct_count: usize,
    pub numeric: Option<NumericSummary>,
    pub top_values: Vec<ValueCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub lower_quartile: f64,
    pub median: f64,
    pub upper_quartile: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Profile every column of the frame.
pub fn profile_frame(df: &DataFrame, title: &str) -> Result<DatasetProfile> {
    let mut columns = Vec::with_capacity(df.width());
    for name in df.get_column_names() {
        let series = dataset::column(df, name.as_str())?;
        columns.push(profile_column(series)?);
    }

    Ok(DatasetProfile {
        title: title.to_string(),
        row_count: df.height(),
        column_count: df.width(),
        generated_at: Utc::now(),
        columns,
    })
}

fn profile_column(series: &Series) -> Result<ColumnProfile> {
    let dtype = series.dtype().clone();
    let null_count = series.null_count();
    let count = series.len() - null_count;
    let distinct_count = series.n_unique()?;

    let numeric = if is_numeric_dtype(&dtype) {
        numeric_summary(series)?
    } else {
        None
    };

    let top_values = if numeric.is_none() {
        top_value_counts(series)?
    } else {
        Vec::new()
    };

    Ok(ColumnProfile {
        name: series.name().to_string(),
        dtype: dtype.to_string(),
        count,
        null_count,
        distinct_count,
        numeric,
        top_values,
    })
}

fn numeric_summary(series: &Series) -> Result<Option<NumericSummary>> {
    let values = dataset::numeric_values(series)?;
    if values.is_empty() {
        return Ok(None);
    }

    let mean = values.iter().mean();
    // Sample standard deviation; a single observation has none.
    let std_dev = if values.len() > 1 {
        values.iter().std_dev()
    } else {
        0.0
    };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut ordered = Data::new(values);
    Ok(Some(NumericSummary {
        mean,
        std_dev,
        min,
        max,
        lower_quartile: ordered.lower_quartile(),
        median: ordered.median(),
        upper_quartile: ordered.upper_quartile(),
    }))
}

fn top_value_counts(series: &Series) -> Result<Vec<ValueCount>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for i in 0..series.len() {
        let av = series.get(i)?;
        if matches!(av, AnyValue::Null) {
            continue;
        }
        *counts.entry(dataset::render_value(&av)).or_insert(0) += 1;
    }

    let mut pairs: Vec<ValueCount> = counts
        .into_iter()
        .map(|(value, count)| ValueCount { value, count })
        .collect();
    // Count descending, value ascending for a stable report
    pairs.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    pairs.truncate(TOP_VALUE_LIMIT);
    Ok(pairs)
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
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

/// Render the profile as a single self-contained HTML page and write it out.
pub fn write_html_report(profile: &DatasetProfile, path: &Path) -> Result<()> {
    let html = render_html(profile);
    fs::write(path, html)?;
    info!("Profile report generated at: file://{}", path.display());
    Ok(())
}

pub fn render_html(profile: &DatasetProfile) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        "<h1>{}</h1>\n<p class=\"meta\">{} rows &times; {} columns &mdash; generated {}</p>\n",
        escape(&profile.title),
        profile.row_count,
        profile.column_count,
        profile.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    for col in &profile.columns {
        body.push_str(&format!(
            "<section>\n<h2>{} <span class=\"dtype\">{}</span></h2>\n",
            escape(&col.name),
            escape(&col.dtype)
        ));
        body.push_str("<table>\n");
        push_row(&mut body, "count", &col.count.to_string());
        push_row(&mut body, "missing", &col.null_count.to_string());
        push_row(&mut body, "distinct", &col.distinct_count.to_string());
        if let Some(num) = &col.numeric {
            push_row(&mut body, "mean", &format!("{:.4}", num.mean));
            push_row(&mut body, "std dev", &format!("{:.4}", num.std_dev));
            push_row(&mut body, "min", &format!("{:.4}", num.min));
            push_row(&mut body, "25%", &format!("{:.4}", num.lower_quartile));
            push_row(&mut body, "median", &format!("{:.4}", num.median));
            push_row(&mut body, "75%", &format!("{:.4}", num.upper_quartile));
            push_row(&mut body, "max", &format!("{:.4}", num.max));
        }
        for vc in &col.top_values {
            push_row(&mut body, &escape(&vc.value), &vc.count.to_string());
        }
        body.push_str("</table>\n</section>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape(&profile.title),
        REPORT_STYLE,
        body
    )
}

fn push_row(body: &mut String, label: &str, value: &str) {
    body.push_str(&format!(
        "<tr><td>{}</td><td>{}</td></tr>\n",
        label, value
    ));
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

const REPORT_STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
h1{border-bottom:2px solid #444}\
h2{margin-bottom:0.2em}\
.dtype{font-size:0.6em;color:#777;font-weight:normal}\
.meta{color:#555}\
table{border-collapse:collapse;margin-bottom:1.5em}\
td{border:1px solid #ccc;padding:0.25em 0.75em}\
td:first-child{background:#f4f4f4}";
