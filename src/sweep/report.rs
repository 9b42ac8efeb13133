//! Sweep Report
//!
//! Export surface for the chart renderer: every experiment's table plus the
//! aligned series for each metric field.

use serde::Serialize;

use super::align::{AlignedSeries, Experiment};
use super::error::BatchError;

/// A run that did not contribute to its experiment's table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub trace: Option<String>,
    pub stage: String,
    pub message: String,
}

impl From<&BatchError> for FailureRecord {
    fn from(e: &BatchError) -> Self {
        Self {
            trace: e.trace().map(str::to_string),
            stage: e.stage().to_string(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub label: String,
    pub config: String,
    pub elapsed_secs: f64,
    pub experiment: Experiment,
    pub failures: Vec<FailureRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub generated_at: String,
    pub fields: Vec<String>,
    pub experiments: Vec<ExperimentReport>,
    pub series: Vec<AlignedSeries>,
}

impl SweepReport {
    pub fn failure_count(&self) -> usize {
        self.experiments.iter().map(|e| e.failures.len()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failure_count() == 0
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("# Simulator Sweep Report\n\n");
        md.push_str(&format!("Generated: {}\n\n", self.generated_at));

        md.push_str("## Experiments\n\n");
        md.push_str("| Label | Config | Traces | Failures | Time (s) |\n");
        md.push_str("|-------|--------|--------|----------|----------|\n");
        for exp in &self.experiments {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {:.1} |\n",
                exp.label,
                exp.config,
                exp.experiment.table.len(),
                exp.failures.len(),
                exp.elapsed_secs
            ));
        }
        md.push('\n');

        if !self.is_complete() {
            md.push_str("## Failed Runs\n\n");
            for exp in &self.experiments {
                for failure in &exp.failures {
                    md.push_str(&format!("- **{}** ({}): {}\n", exp.label, failure.stage, failure.message));
                }
            }
            md.push('\n');
        }

        md.push_str("## Metrics\n\n");
        for series in &self.series {
            md.push_str(&series.to_markdown());
            md.push('\n');
        }
        md
    }
}
