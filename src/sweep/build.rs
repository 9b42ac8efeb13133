//! Simulator Build Step
//!
//! Configures and compiles the simulator for one experiment. Must finish
//! before any run of that experiment is launched.

use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

use super::config::BuildConfig;
use super::error::{BuildError, BuildPhase};
use super::launcher::{diagnostics, resolve_program};

#[derive(Debug, Clone)]
pub struct BuildStep {
    simulator_dir: PathBuf,
    config: BuildConfig,
}

impl BuildStep {
    pub fn new(simulator_dir: impl Into<PathBuf>, config: BuildConfig) -> Self {
        Self {
            simulator_dir: simulator_dir.into(),
            config,
        }
    }

    /// `<config_script> <config_name>` then `<make_program> -j<jobs>`
    pub async fn run(&self, config_name: &str) -> Result<(), BuildError> {
        info!("Configuring simulator: {}", config_name);
        self.run_phase(
            BuildPhase::Configure,
            config_name,
            &self.config.config_script,
            vec![config_name.to_string()],
        )
        .await?;

        info!("Building simulator ({} jobs)", self.config.make_jobs);
        self.run_phase(
            BuildPhase::Compile,
            config_name,
            &self.config.make_program,
            vec![format!("-j{}", self.config.make_jobs)],
        )
        .await
    }

    async fn run_phase(
        &self,
        phase: BuildPhase,
        config_name: &str,
        program: &str,
        args: Vec<String>,
    ) -> Result<(), BuildError> {
        let spawn_err = |source: std::io::Error| BuildError::Spawn {
            phase,
            config: config_name.to_string(),
            source,
        };
        let simulator_dir = std::fs::canonicalize(&self.simulator_dir).map_err(spawn_err)?;

        let output = Command::new(resolve_program(&simulator_dir, program))
            .args(&args)
            .current_dir(&simulator_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(spawn_err)?;

        if !output.status.success() {
            return Err(BuildError::Exit {
                phase,
                config: config_name.to_string(),
                status: output.status.code(),
                diagnostics: diagnostics(&output),
            });
        }
        Ok(())
    }
}
