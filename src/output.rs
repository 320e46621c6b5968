//! Hand summaries to the renderer: a text table, JSON, or CSV/Parquet frames.

use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

use clap::ValueEnum;
use polars::frame::DataFrame;
use polars::prelude::*;
use polars_io::parquet::ParquetWriter;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{total, CategorySummary, ScalarSummary, ScatterPlot, Summary};
use crate::error::CaseError;
use crate::filter::FilterOptions;
use crate::records::age_group_label;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteFormat {
    #[default]
    Table,
    Json,
    Csv,
    Parquet,
}

pub fn categories_frame(categories: &[CategorySummary]) -> PolarsResult<DataFrame> {
    let sum = total(categories);
    let labels: Vec<&str> = categories.iter().map(|c| c.label.as_str()).collect();
    let values: Vec<u64> = categories.iter().map(|c| c.value as u64).collect();
    let colors: Vec<&str> = categories.iter().map(|c| c.color.as_str()).collect();
    let shares: Vec<Option<f64>> = categories.iter().map(|c| c.share(sum)).collect();

    DataFrame::new(vec![
        Series::new("label", labels),
        Series::new("value", values),
        Series::new("color", colors),
        Series::new("share", shares),
    ])
}

pub fn scalar_frame(summary: &ScalarSummary) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new("count", vec![summary.count as u64]),
        Series::new("avg_duration", vec![summary.avg_duration]),
        Series::new("avg_icu_stay", vec![summary.avg_icu_stay]),
        Series::new("mortality_rate", vec![summary.mortality_rate]),
    ])
}

pub fn scatter_frame(plot: &ScatterPlot) -> PolarsResult<DataFrame> {
    let points = &plot.points;
    DataFrame::new(vec![
        Series::new(
            "subjectid",
            points.iter().map(|p| p.subjectid.as_str()).collect::<Vec<_>>(),
        ),
        Series::new("age", points.iter().map(|p| p.age).collect::<Vec<_>>()),
        Series::new(
            "department",
            points.iter().map(|p| p.department.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(
            "opname",
            points.iter().map(|p| p.opname.as_str()).collect::<Vec<_>>(),
        ),
        Series::new("asa", points.iter().map(|p| p.asa as u32).collect::<Vec<_>>()),
        Series::new(
            "duration_hours",
            points.iter().map(|p| p.duration_hours).collect::<Vec<_>>(),
        ),
        Series::new("icu_days", points.iter().map(|p| p.icu_days).collect::<Vec<_>>()),
        Series::new(
            "blood_loss_ml",
            points.iter().map(|p| p.blood_loss_ml).collect::<Vec<_>>(),
        ),
        Series::new("died", points.iter().map(|p| p.died).collect::<Vec<_>>()),
        Series::new(
            "color",
            points.iter().map(|p| p.color.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(
            "highlighted",
            points.iter().map(|p| p.highlighted).collect::<Vec<_>>(),
        ),
    ])
}

pub fn summary_frame(summary: &Summary) -> PolarsResult<DataFrame> {
    match summary {
        Summary::Categories(categories) => categories_frame(categories),
        Summary::Scalar(scalar) => scalar_frame(scalar),
        Summary::Scatter(plot) => scatter_frame(plot),
    }
}

pub async fn write_csv<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<(), CaseError> {
    let path = path.as_ref();
    let mut file = File::create(path).map_err(|e| CaseError::io(path, e))?;

    CsvWriter::new(&mut file).has_header(true).finish(df)?;

    Ok(())
}

pub async fn write_parquet<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<(), CaseError> {
    let path = path.as_ref();
    let mut file = File::create(path).map_err(|e| CaseError::io(path, e))?;

    ParquetWriter::new(&mut file).finish(df)?;

    Ok(())
}

/// Write `rendered` to `path`, or to stdout when no path is given.
async fn emit(path: Option<&Path>, rendered: String) -> Result<(), CaseError> {
    match path {
        Some(path) => tokio::fs::write(path, rendered)
            .await
            .map_err(|e| CaseError::io(path, e)),
        None => {
            print!("{}", rendered);
            Ok(())
        }
    }
}

pub async fn write_summary(
    summary: &Summary,
    title: &str,
    format: WriteFormat,
    path: Option<&Path>,
) -> Result<(), CaseError> {
    match format {
        WriteFormat::Table => emit(path, render_table(title, summary)).await?,
        WriteFormat::Json => {
            let mut json = serde_json::to_string_pretty(summary)?;
            json.push('\n');
            emit(path, json).await?
        }
        WriteFormat::Csv | WriteFormat::Parquet => {
            let path = path.ok_or(CaseError::OutputRequired { format })?;
            let mut df = summary_frame(summary)?;
            if format == WriteFormat::Csv {
                write_csv(path, &mut df).await?;
            } else {
                write_parquet(path, &mut df).await?;
            }
        }
    }

    if let Some(path) = path {
        info!("wrote {:?} summary to {}", format, path.display());
    }
    Ok(())
}

/// Write the dropdown values as a table or JSON.
pub async fn write_options(
    options: &FilterOptions,
    format: WriteFormat,
    path: Option<&Path>,
) -> Result<(), CaseError> {
    let rendered = match format {
        WriteFormat::Table => render_options(options),
        WriteFormat::Json => {
            let mut json = serde_json::to_string_pretty(options)?;
            json.push('\n');
            json
        }
        other => {
            return Err(CaseError::UnsupportedFormat {
                format: other,
                what: "filter options",
            })
        }
    };
    emit(path, rendered).await?;

    if let Some(path) = path {
        info!("wrote {:?} filter options to {}", format, path.display());
    }
    Ok(())
}

pub fn render_options(options: &FilterOptions) -> String {
    let asa: Vec<String> = options.asa_scores.iter().map(|a| a.to_string()).collect();
    let ages: Vec<String> = options
        .age_groups
        .iter()
        .map(|g| age_group_label(*g))
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "Departments: {}", options.departments.join(", "));
    let _ = writeln!(out, "ASA scores: {}", asa.join(", "));
    let _ = writeln!(out, "Operation types: {}", options.optypes.join(", "));
    let _ = writeln!(out, "Age groups: {}", ages.join(", "));
    out
}

fn not_available(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.2}{}", v, unit),
        None => format!("N/A{}", unit),
    }
}

/// Plain-text rendering, with "N/A" for means of an empty selection.
pub fn render_table(title: &str, summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);

    match summary {
        Summary::Categories(categories) => {
            let sum = total(categories);
            let width = categories
                .iter()
                .map(|c| c.label.len())
                .max()
                .unwrap_or(0)
                .max(5);
            for c in categories {
                let share = match c.share(sum) {
                    Some(s) => format!("{:.1}%", s),
                    None => "N/A".to_string(),
                };
                let _ = writeln!(
                    out,
                    "  {:<width$}  {:>8}  {:>6}  {}",
                    c.label,
                    c.value,
                    share,
                    c.color,
                    width = width
                );
            }
            let _ = writeln!(out, "  {:<width$}  {:>8}", "Total", sum, width = width);
        }
        Summary::Scalar(s) => {
            let _ = writeln!(out, "  Patients: {}", s.count);
            let _ = writeln!(out, "  Avg Surgery Time: {}", not_available(s.avg_duration, " hrs"));
            let _ = writeln!(out, "  Avg ICU Stay: {}", not_available(s.avg_icu_stay, " days"));
            let _ = writeln!(out, "  Mortality Rate: {}", not_available(s.mortality_rate, "%"));
        }
        Summary::Scatter(plot) => {
            let highlighted = plot.points.iter().filter(|p| p.highlighted).count();
            let _ = writeln!(
                out,
                "  Points: {} ({} highlighted)",
                plot.points.len(),
                highlighted
            );
            let _ = writeln!(out, "  Max Surgery Duration: {:.2} hrs", plot.max_duration_hours);
            let _ = writeln!(out, "  Max ICU Stay: {:.2} days", plot.max_icu_days);
            for p in plot.points.iter().filter(|p| p.highlighted) {
                let _ = writeln!(
                    out,
                    "  {:>8}  {:>6.2} hrs  {:>6.1} days  {}",
                    p.subjectid, p.duration_hours, p.icu_days, p.color
                );
            }
        }
    }

    out
}
