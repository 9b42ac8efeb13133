//! Multi-Series Alignment
//!
//! Lines up several experiments' metrics tables on the first table's trace
//! ordering, one value sequence per experiment, ready for a grouped chart.

use serde::Serialize;

use super::error::AlignError;
use super::table::MetricsTable;

/// A label paired with the table measured under that configuration
#[derive(Debug, Clone, Serialize)]
pub struct Experiment {
    pub label: String,
    pub table: MetricsTable,
}

impl Experiment {
    pub fn new(label: impl Into<String>, table: MetricsTable) -> Self {
        Self {
            label: label.into(),
            table,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub values: Vec<f64>,
}

/// One metric field across every experiment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedSeries {
    pub title: String,
    pub field: String,
    /// Shared x-axis; `series[i].values[j]` belongs to `traces[j]`
    pub traces: Vec<String>,
    pub series: Vec<Series>,
}

impl AlignedSeries {
    pub fn labels(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.label.as_str()).collect()
    }

    /// Markdown table: one row per trace, one column per experiment
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("### {}\n\n", self.title));

        md.push_str("| Trace |");
        for s in &self.series {
            md.push_str(&format!(" {} |", s.label));
        }
        md.push_str("\n|-------|");
        for _ in &self.series {
            md.push_str("------|");
        }
        md.push('\n');

        for (j, trace) in self.traces.iter().enumerate() {
            md.push_str(&format!("| {} |", trace));
            for s in &self.series {
                match s.values.get(j) {
                    Some(v) => md.push_str(&format!(" {} |", v)),
                    None => md.push_str("  |"),
                }
            }
            md.push('\n');
        }
        md
    }
}

/// Align one field (by index into the record) across `experiments`
pub fn align(
    experiments: &[Experiment],
    field: usize,
    title: impl Into<String>,
) -> Result<AlignedSeries, AlignError> {
    let reference = experiments.first().ok_or(AlignError::NoExperiments)?;
    let fields = reference.table.fields();
    if field >= fields.len() {
        return Err(AlignError::FieldOutOfRange {
            field,
            arity: fields.len(),
        });
    }

    for exp in &experiments[1..] {
        if exp.table.fields() != fields {
            return Err(AlignError::ShapeMismatch {
                experiment: exp.label.clone(),
                expected: fields.to_vec(),
                found: exp.table.fields().to_vec(),
            });
        }
    }

    let traces = reference.table.trace_names();
    let series = experiments
        .iter()
        .map(|exp| {
            let values = traces
                .iter()
                .map(|trace| {
                    exp.table
                        .get(trace)
                        .and_then(|record| record.get(field))
                        .ok_or_else(|| AlignError::MissingTrace {
                            experiment: exp.label.clone(),
                            trace: trace.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Series {
                label: exp.label.clone(),
                values,
            })
        })
        .collect::<Result<Vec<_>, AlignError>>()?;

    Ok(AlignedSeries {
        title: title.into(),
        field: fields[field].clone(),
        traces,
        series,
    })
}

/// Align a field looked up by name in the first table's schema
pub fn align_named(
    experiments: &[Experiment],
    field: &str,
    title: impl Into<String>,
) -> Result<AlignedSeries, AlignError> {
    let reference = experiments.first().ok_or(AlignError::NoExperiments)?;
    let index = reference
        .table
        .fields()
        .iter()
        .position(|f| f == field)
        .ok_or_else(|| AlignError::UnknownField(field.to_string()))?;
    align(experiments, index, title)
}

/// One aligned series per schema field, titled by field name
pub fn align_all(experiments: &[Experiment]) -> Result<Vec<AlignedSeries>, AlignError> {
    let reference = experiments.first().ok_or(AlignError::NoExperiments)?;
    reference
        .table
        .fields()
        .iter()
        .enumerate()
        .map(|(i, name)| align(experiments, i, name.clone()))
        .collect()
}
