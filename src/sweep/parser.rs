//! Simulator Output Parser
//!
//! Extracts a fixed-shape metrics record from one run's textual output.
//! Fields are located by label token over the whitespace-tokenized text,
//! never by absolute position.

use serde::{Deserialize, Serialize};

use super::error::ParseError;
use super::table::MetricsRecord;

pub const IPC_LABEL: &str = "IPC:";
pub const MPKI_LABEL: &str = "MPKI:";
pub const BRANCH_CONDITIONAL_LABEL: &str = "BRANCH_CONDITIONAL:";
pub const DEFAULT_CACHE_BLOCK: &str = "cpu0_L2C";
pub const CACHE_TOTAL_LABEL: &str = "TOTAL";

/// Which occurrence of a label is authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occurrence {
    First,
    /// Used for counters that are reported more than once (warmup + final)
    Last,
}

/// How to find one field's value token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// Token immediately after `label`
    Label { label: String, occurrence: Occurrence },
    /// Token at `offset` after the first `header`, whose next token must be `sub_label`
    Block {
        header: String,
        sub_label: String,
        offset: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub locator: Locator,
}

impl FieldSpec {
    pub fn label(name: &str, label: &str, occurrence: Occurrence) -> Self {
        Self {
            name: name.into(),
            locator: Locator::Label {
                label: label.into(),
                occurrence,
            },
        }
    }

    pub fn block(name: &str, header: &str, sub_label: &str, offset: usize) -> Self {
        Self {
            name: name.into(),
            locator: Locator::Block {
                header: header.into(),
                sub_label: sub_label.into(),
                offset,
            },
        }
    }

    fn extract(&self, tokens: &[&str]) -> Result<f64, ParseError> {
        let (idx, anchor) = match &self.locator {
            Locator::Label { label, occurrence } => {
                let pos = find_token(tokens, label, *occurrence).ok_or_else(|| {
                    ParseError::LabelNotFound {
                        field: self.name.clone(),
                        label: label.clone(),
                    }
                })?;
                (pos + 1, label)
            }
            Locator::Block {
                header,
                sub_label,
                offset,
            } => {
                let pos = find_token(tokens, header, Occurrence::First).ok_or_else(|| {
                    ParseError::LabelNotFound {
                        field: self.name.clone(),
                        label: header.clone(),
                    }
                })?;
                let next = tokens.get(pos + 1).copied();
                if next != Some(sub_label.as_str()) {
                    return Err(ParseError::UnexpectedToken {
                        field: self.name.clone(),
                        expected: sub_label.clone(),
                        found: next.map(str::to_string),
                    });
                }
                (pos + offset, header)
            }
        };

        let token = tokens.get(idx).ok_or_else(|| ParseError::MissingValue {
            field: self.name.clone(),
            label: anchor.clone(),
        })?;
        token.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
            field: self.name.clone(),
            token: token.to_string(),
        })
    }
}

fn find_token(tokens: &[&str], label: &str, occurrence: Occurrence) -> Option<usize> {
    match occurrence {
        Occurrence::First => tokens.iter().position(|t| *t == label),
        Occurrence::Last => tokens.iter().rposition(|t| *t == label),
    }
}

/// Declared field schema; one parser for every record shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    fields: Vec<FieldSpec>,
}

impl OutputSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// {IPC, total MPKI, branch-conditional MPKI}
    pub fn core() -> Self {
        Self::new(vec![
            FieldSpec::label("ipc", IPC_LABEL, Occurrence::Last),
            FieldSpec::label("total_mpki", MPKI_LABEL, Occurrence::First),
            FieldSpec::label(
                "branch_conditional_mpki",
                BRANCH_CONDITIONAL_LABEL,
                Occurrence::First,
            ),
        ])
    }

    /// Core fields plus total accesses and hits of one cache level.
    ///
    /// Expects `<cache_block> TOTAL ACCESS: <n> HIT: <n> ...`.
    pub fn extended(cache_block: &str) -> Self {
        let mut schema = Self::core();
        schema.fields.push(FieldSpec::block(
            "l2c_accesses",
            cache_block,
            CACHE_TOTAL_LABEL,
            3,
        ));
        schema
            .fields
            .push(FieldSpec::block("l2c_hits", cache_block, CACHE_TOTAL_LABEL, 5));
        schema
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Parse raw process output (decoded lossily as UTF-8)
    pub fn parse(&self, raw: &[u8]) -> Result<MetricsRecord, ParseError> {
        self.parse_str(&String::from_utf8_lossy(raw))
    }

    pub fn parse_str(&self, text: &str) -> Result<MetricsRecord, ParseError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let values = self
            .fields
            .iter()
            .map(|field| field.extract(&tokens))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MetricsRecord::new(values))
    }
}

impl Default for OutputSchema {
    fn default() -> Self {
        Self::core()
    }
}
