//! Sweep Orchestrator
//!
//! For each experiment in order: build the simulator under its configuration,
//! run the batch, then align every metric field across experiments.

use chrono::Utc;
use tracing::{info, warn};

use super::align::{align_all, Experiment};
use super::build::BuildStep;
use super::config::HarnessConfig;
use super::error::SweepError;
use super::launcher::CommandLauncher;
use super::report::{ExperimentReport, FailureRecord, SweepReport};
use super::runner::BatchRunner;

pub async fn run_sweep(config: &HarnessConfig) -> Result<SweepReport, SweepError> {
    if config.experiments.is_empty() {
        return Err(SweepError::NoExperiments);
    }

    let schema = config.schema.to_schema();
    let build = BuildStep::new(&config.simulator_dir, config.build.clone());
    let mut reports = Vec::with_capacity(config.experiments.len());

    for exp in &config.experiments {
        info!("=== Experiment '{}' (config {}) ===", exp.label, exp.config);

        // The binary must reflect this configuration before any run starts
        build
            .run(&exp.config)
            .await
            .map_err(|source| SweepError::Build {
                experiment: exp.label.clone(),
                source,
            })?;

        let runner = BatchRunner::new(
            CommandLauncher::new(&config.simulator_dir, config.recipe.clone()),
            schema.clone(),
            &config.pool,
            config.failure_policy,
        );
        let outcome = runner
            .run_dir(&config.traces_dir)
            .await
            .map_err(|source| SweepError::Batch {
                experiment: exp.label.clone(),
                source,
            })?;

        if !outcome.is_complete() {
            warn!(
                "Experiment '{}': {} runs failed",
                exp.label,
                outcome.failures.len()
            );
        }

        reports.push(ExperimentReport {
            label: exp.label.clone(),
            config: exp.config.clone(),
            elapsed_secs: outcome.elapsed.as_secs_f64(),
            failures: outcome.failures.iter().map(FailureRecord::from).collect(),
            experiment: Experiment::new(exp.label.clone(), outcome.table),
        });
    }

    let experiments: Vec<Experiment> = reports.iter().map(|r| r.experiment.clone()).collect();
    let series = align_all(&experiments)?;
    info!(
        "Aligned {} fields across {} experiments",
        series.len(),
        experiments.len()
    );

    Ok(SweepReport {
        generated_at: Utc::now().to_rfc3339(),
        fields: schema.field_names(),
        experiments: reports,
        series,
    })
}
