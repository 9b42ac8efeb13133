//! Metrics Table
//!
//! Trace identifier -> metrics record for one experiment. Iteration order is
//! insertion order, which for a batch run is completion order.

use serde::Serialize;
use std::collections::HashMap;

/// Fixed-arity counters extracted from one run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricsRecord {
    values: Vec<f64>,
}

impl MetricsRecord {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn get(&self, field: usize) -> Option<f64> {
        self.values.get(field).copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableEntry {
    pub trace: String,
    pub record: MetricsRecord,
}

/// Read-only once built; see [`MetricsTableBuilder`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsTable {
    fields: Vec<String>,
    entries: Vec<TableEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl MetricsTable {
    pub fn builder(fields: Vec<String>) -> MetricsTableBuilder {
        MetricsTableBuilder {
            table: Self {
                fields,
                entries: Vec::new(),
                index: HashMap::new(),
            },
        }
    }

    /// Build from already-known entries (later duplicates overwrite earlier ones)
    pub fn from_entries<I, S>(fields: Vec<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, MetricsRecord)>,
        S: Into<String>,
    {
        let mut builder = Self::builder(fields);
        for (trace, record) in entries {
            builder.insert(trace, record);
        }
        builder.finish()
    }

    /// Field names of the schema that produced the records
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn get(&self, trace: &str) -> Option<&MetricsRecord> {
        self.index.get(trace).map(|&i| &self.entries[i].record)
    }

    pub fn contains(&self, trace: &str) -> bool {
        self.index.contains_key(trace)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricsRecord)> {
        self.entries.iter().map(|e| (e.trace.as_str(), &e.record))
    }

    pub fn trace_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.trace.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Single-writer accumulator used by the batch collector
#[derive(Debug)]
pub struct MetricsTableBuilder {
    table: MetricsTable,
}

impl MetricsTableBuilder {
    /// Insert a record. A repeated trace keeps its original position and
    /// the previous record is returned.
    pub fn insert(&mut self, trace: impl Into<String>, record: MetricsRecord) -> Option<MetricsRecord> {
        let trace = trace.into();
        match self.table.index.get(&trace) {
            Some(&i) => Some(std::mem::replace(&mut self.table.entries[i].record, record)),
            None => {
                self.table.index.insert(trace.clone(), self.table.entries.len());
                self.table.entries.push(TableEntry { trace, record });
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn finish(self) -> MetricsTable {
        self.table
    }
}
