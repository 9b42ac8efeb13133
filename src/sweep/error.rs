//! Sweep Errors
//!
//! One error type per pipeline stage. Every run-level failure carries the
//! trace identifier it belongs to.

use std::path::PathBuf;
use std::time::Duration;

/// Errors from the output parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Required label token absent from the output.
    LabelNotFound { field: String, label: String },
    /// Block header found but the following token was not the expected sub-label.
    UnexpectedToken {
        field: String,
        expected: String,
        found: Option<String>,
    },
    /// Label found but the output ends before the value token.
    MissingValue { field: String, label: String },
    /// Value token is not a number.
    InvalidNumber { field: String, token: String },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LabelNotFound { field, label } => {
                write!(f, "label not found: '{}' (field {})", label, field)
            }
            Self::UnexpectedToken {
                field,
                expected,
                found,
            } => write!(
                f,
                "expected '{}' after block header for {}, found {}",
                expected,
                field,
                found.as_deref().unwrap_or("end of output")
            ),
            Self::MissingValue { field, label } => {
                write!(f, "no value after '{}' (field {})", label, field)
            }
            Self::InvalidNumber { field, token } => {
                write!(f, "invalid number '{}' for field {}", token, field)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors from a single simulator invocation.
#[derive(Debug)]
pub enum RunError {
    Spawn {
        trace: String,
        source: std::io::Error,
    },
    Exit {
        trace: String,
        status: Option<i32>,
        diagnostics: String,
    },
    Timeout {
        trace: String,
        after: Duration,
    },
}

impl RunError {
    pub fn trace(&self) -> &str {
        match self {
            Self::Spawn { trace, .. } | Self::Exit { trace, .. } | Self::Timeout { trace, .. } => {
                trace
            }
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn { trace, source } => {
                write!(f, "[{}] failed to spawn simulator: {}", trace, source)
            }
            Self::Exit {
                trace,
                status,
                diagnostics,
            } => {
                match status {
                    Some(code) => write!(f, "[{}] simulator exited with status {}", trace, code)?,
                    None => write!(f, "[{}] simulator terminated by signal", trace)?,
                }
                if !diagnostics.is_empty() {
                    write!(f, ": {}", diagnostics)?;
                }
                Ok(())
            }
            Self::Timeout { trace, after } => {
                write!(f, "[{}] simulator timed out after {:?}", trace, after)
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from a batch of runs.
#[derive(Debug)]
pub enum BatchError {
    /// Trace directory could not be listed.
    Enumerate {
        dir: PathBuf,
        source: std::io::Error,
    },
    Run(RunError),
    Parse {
        trace: String,
        source: ParseError,
    },
    /// A worker task was lost (panic or cancellation) before reporting.
    Task { trace: String, reason: String },
}

impl BatchError {
    /// Trace identifier this failure belongs to, when there is one.
    pub fn trace(&self) -> Option<&str> {
        match self {
            Self::Run(e) => Some(e.trace()),
            Self::Parse { trace, .. } | Self::Task { trace, .. } => Some(trace),
            Self::Enumerate { .. } => None,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Enumerate { .. } => "enumerate",
            Self::Run(_) => "run",
            Self::Parse { .. } => "parse",
            Self::Task { .. } => "task",
        }
    }
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enumerate { dir, source } => {
                write!(f, "cannot list traces in {}: {}", dir.display(), source)
            }
            Self::Run(e) => write!(f, "run failed: {}", e),
            Self::Parse { trace, source } => write!(f, "[{}] parse failed: {}", trace, source),
            Self::Task { trace, reason } => write!(f, "[{}] worker task lost: {}", trace, reason),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Enumerate { source, .. } => Some(source),
            Self::Run(e) => Some(e),
            Self::Parse { source, .. } => Some(source),
            Self::Task { .. } => None,
        }
    }
}

impl From<RunError> for BatchError {
    fn from(e: RunError) -> Self {
        Self::Run(e)
    }
}

/// Build phase that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Configure,
    Compile,
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configure => write!(f, "configure"),
            Self::Compile => write!(f, "compile"),
        }
    }
}

/// Errors from the configure/build step.
#[derive(Debug)]
pub enum BuildError {
    Spawn {
        phase: BuildPhase,
        config: String,
        source: std::io::Error,
    },
    Exit {
        phase: BuildPhase,
        config: String,
        status: Option<i32>,
        diagnostics: String,
    },
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn {
                phase,
                config,
                source,
            } => write!(f, "{} step for '{}' could not start: {}", phase, config, source),
            Self::Exit {
                phase,
                config,
                status,
                diagnostics,
            } => {
                write!(
                    f,
                    "{} step for '{}' failed (status {})",
                    phase,
                    config,
                    status.map(|c| c.to_string()).unwrap_or_else(|| "signal".into())
                )?;
                if !diagnostics.is_empty() {
                    write!(f, ": {}", diagnostics)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::Exit { .. } => None,
        }
    }
}

/// Errors from multi-series alignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AlignError {
    NoExperiments,
    MissingTrace { experiment: String, trace: String },
    FieldOutOfRange { field: usize, arity: usize },
    UnknownField(String),
    ShapeMismatch {
        experiment: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl std::fmt::Display for AlignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoExperiments => write!(f, "nothing to align: no experiments given"),
            Self::MissingTrace { experiment, trace } => {
                write!(f, "experiment '{}' has no result for trace '{}'", experiment, trace)
            }
            Self::FieldOutOfRange { field, arity } => {
                write!(f, "field index {} out of range (records have {} fields)", field, arity)
            }
            Self::UnknownField(name) => write!(f, "unknown metric field '{}'", name),
            Self::ShapeMismatch {
                experiment,
                expected,
                found,
            } => write!(
                f,
                "experiment '{}' has fields {:?}, expected {:?}",
                experiment, found, expected
            ),
        }
    }
}

impl std::error::Error for AlignError {}

/// Errors from a full sweep.
#[derive(Debug)]
pub enum SweepError {
    NoExperiments,
    Build {
        experiment: String,
        source: BuildError,
    },
    Batch {
        experiment: String,
        source: BatchError,
    },
    Align(AlignError),
}

impl std::fmt::Display for SweepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoExperiments => write!(f, "no experiments configured"),
            Self::Build { experiment, source } => {
                write!(f, "experiment '{}': build failed: {}", experiment, source)
            }
            Self::Batch { experiment, source } => {
                write!(f, "experiment '{}': {}", experiment, source)
            }
            Self::Align(e) => write!(f, "alignment failed: {}", e),
        }
    }
}

impl std::error::Error for SweepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoExperiments => None,
            Self::Build { source, .. } => Some(source),
            Self::Batch { source, .. } => Some(source),
            Self::Align(e) => Some(e),
        }
    }
}

impl From<AlignError> for SweepError {
    fn from(e: AlignError) -> Self {
        Self::Align(e)
    }
}
