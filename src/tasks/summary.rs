// src/tasks/summary.rs
use std::fmt::Write as _;
use std::path::PathBuf;
use serde::Serialize;
use tracing::info;

use crate::error::{FlowResult, FlowError};

/// Aggregated view of one training slice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub log: PathBuf,
    pub lcurve: PathBuf,
    pub log_bytes: u64,
    /// Data rows in the learning curve, comments and blank lines excluded
    pub lcurve_points: usize,
}

/// Summarize collected training outputs. The three lists are index-aligned:
/// position `i` of each refers to the same dataset.
pub fn summarize(names: &[String], logs: &[PathBuf], lcurves: &[PathBuf]) -> FlowResult<Vec<DatasetSummary>> {
    if names.len() != logs.len() || names.len() != lcurves.len() {
        return Err(FlowError::ConfigMismatch(format!(
            "summary received {} names, {} logs and {} lcurves",
            names.len(),
            logs.len(),
            lcurves.len()
        )));
    }

    let mut summaries = Vec::with_capacity(names.len());
    for ((name, log), lcurve) in names.iter().zip(logs).zip(lcurves) {
        let log_bytes = std::fs::metadata(log)
            .map_err(|e| FlowError::FileError {
                path: log.clone(),
                message: format!("Failed to read log: {}", e),
            })?
            .len();

        let curve = std::fs::read_to_string(lcurve)
            .map_err(|e| FlowError::FileError {
                path: lcurve.clone(),
                message: format!("Failed to read learning curve: {}", e),
            })?;
        let lcurve_points = curve
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .count();

        summaries.push(DatasetSummary {
            name: name.clone(),
            log: log.clone(),
            lcurve: lcurve.clone(),
            log_bytes,
            lcurve_points,
        });
    }

    info!("Summarized {} training slices", summaries.len());
    Ok(summaries)
}

/// Plain-text table, one row per dataset in slice order
pub fn render(summaries: &[DatasetSummary]) -> String {
    let width = summaries
        .iter()
        .map(|summary| summary.name.len())
        .max()
        .unwrap_or(0)
        .max("dataset".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:>10}  {:>8}  log", "dataset", "log bytes", "points", width = width);
    for summary in summaries {
        let _ = writeln!(
            out,
            "{:<width$}  {:>10}  {:>8}  {}",
            summary.name,
            summary.log_bytes,
            summary.lcurve_points,
            summary.log.display(),
            width = width
        );
    }
    out
}
