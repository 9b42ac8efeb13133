//! Sweep Configuration
//!
//! Simulator location, build recipe, invocation recipe, pool sizing and the
//! experiments to compare. Loadable from TOML; every section has defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::parser::{OutputSchema, DEFAULT_CACHE_BLOCK};
use super::runner::FailurePolicy;

pub const CONFIG_PATH_ENV: &str = "SIMSWEEP_CONFIG_PATH";

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Simulator checkout (working directory for build and runs)
    #[serde(default = "default_simulator_dir")]
    pub simulator_dir: PathBuf,

    /// Directory holding one file per trace
    #[serde(default = "default_traces_dir")]
    pub traces_dir: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub recipe: InvocationRecipe,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub schema: SchemaConfig,

    /// Compared in order; the first one fixes the trace ordering
    #[serde(default)]
    pub experiments: Vec<ExperimentConfig>,
}

fn default_simulator_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_traces_dir() -> PathBuf {
    PathBuf::from("traces")
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            simulator_dir: default_simulator_dir(),
            traces_dir: default_traces_dir(),
            build: BuildConfig::default(),
            recipe: InvocationRecipe::default(),
            pool: PoolConfig::default(),
            failure_policy: FailurePolicy::default(),
            schema: SchemaConfig::default(),
            experiments: Vec::new(),
        }
    }
}

impl HarnessConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from environment or default path
    pub fn from_env() -> Self {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "simsweep.toml".to_string());

        Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default sweep config ({}): {}", path, e);
            Self::default()
        })
    }

    /// Save to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Configure + compile step run before each experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Invoked as `<config_script> <experiment config>`
    #[serde(default = "default_config_script")]
    pub config_script: String,

    #[serde(default = "default_make_program")]
    pub make_program: String,

    /// Passed as `-j<make_jobs>`
    #[serde(default = "default_make_jobs")]
    pub make_jobs: u32,
}

fn default_config_script() -> String {
    "./config.sh".to_string()
}
fn default_make_program() -> String {
    "make".to_string()
}
fn default_make_jobs() -> u32 {
    8
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            config_script: default_config_script(),
            make_program: default_make_program(),
            make_jobs: default_make_jobs(),
        }
    }
}

/// How one simulator run is invoked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRecipe {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_warmup_instructions")]
    pub warmup_instructions: u64,

    #[serde(default = "default_simulation_instructions")]
    pub simulation_instructions: u64,

    /// Argument template; `{warmup}`, `{simulation}` and `{trace}` are substituted
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_program() -> String {
    "bin/champsim".to_string()
}
fn default_warmup_instructions() -> u64 {
    5_000_000
}
fn default_simulation_instructions() -> u64 {
    20_000_000
}
fn default_args() -> Vec<String> {
    [
        "--warmup_instructions",
        "{warmup}",
        "--simulation_instructions",
        "{simulation}",
        "{trace}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for InvocationRecipe {
    fn default() -> Self {
        Self {
            program: default_program(),
            warmup_instructions: default_warmup_instructions(),
            simulation_instructions: default_simulation_instructions(),
            args: default_args(),
        }
    }
}

impl InvocationRecipe {
    pub fn render_args(&self, trace: &Path) -> Vec<String> {
        let warmup = self.warmup_instructions.to_string();
        let simulation = self.simulation_instructions.to_string();
        let trace = trace.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{warmup}", &warmup)
                    .replace("{simulation}", &simulation)
                    .replace("{trace}", &trace)
            })
            .collect()
    }
}

/// Worker pool sizing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Concurrent simulator processes (default: available parallelism)
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Per-run timeout; unset means wait for the process indefinitely
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,
}

impl PoolConfig {
    pub fn concurrency(&self) -> usize {
        self.max_concurrency
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}

/// Record shape to extract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaConfig {
    #[default]
    Core,
    Extended {
        #[serde(default = "default_cache_block")]
        cache_block: String,
    },
}

fn default_cache_block() -> String {
    DEFAULT_CACHE_BLOCK.to_string()
}

impl SchemaConfig {
    pub fn to_schema(&self) -> OutputSchema {
        match self {
            Self::Core => OutputSchema::core(),
            Self::Extended { cache_block } => OutputSchema::extended(cache_block),
        }
    }
}

/// One configuration to build and measure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub label: String,
    /// Name passed to the configure script
    pub config: String,
}

impl std::str::FromStr for ExperimentConfig {
    type Err = String;

    /// `label=config`, or a bare name used for both
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, config) = match s.split_once('=') {
            Some((label, config)) => (label.trim(), config.trim()),
            None => (s.trim(), s.trim()),
        };
        if label.is_empty() || config.is_empty() {
            return Err(format!("invalid experiment '{}', expected label=config", s));
        }
        Ok(Self {
            label: label.to_string(),
            config: config.to_string(),
        })
    }
}
