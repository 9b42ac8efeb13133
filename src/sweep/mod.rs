//! Simulator Sweep Harness
//!
//! Builds a simulator per configuration, runs it over a directory of traces
//! concurrently, extracts performance counters from each run's text output
//! and aligns the per-experiment tables for comparison.
//!
//! Pipeline:
//! - `build`: configure + compile, fatal on failure
//! - `launcher`: one external process per trace
//! - `runner`: bounded fan-out, single collecting point, explicit failure policy
//! - `parser`: label-anchored extraction into a fixed-shape record
//! - `align`: N tables -> N value sequences on the first table's trace order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use simsweep::sweep::{run_sweep, HarnessConfig};
//!
//! let mut config = HarnessConfig::load("simsweep.toml")?;
//! config.experiments.push("baseline=bimodal".parse()?);
//! let report = run_sweep(&config).await?;
//! println!("{}", report.to_markdown());
//! ```

pub mod align;
pub mod build;
pub mod config;
pub mod error;
pub mod launcher;
pub mod orchestrator;
pub mod parser;
pub mod report;
pub mod runner;
pub mod table;
pub mod trace;

pub use align::*;
pub use build::*;
pub use config::*;
pub use error::*;
pub use launcher::*;
pub use orchestrator::*;
pub use parser::*;
pub use report::*;
pub use runner::*;
pub use table::*;
pub use trace::*;
