//! End-to-end sweep tests
//!
//! A shell script stands in for the simulator: `config.sh` records the active
//! configuration and `run.sh` prints the trace file, appending a final IPC
//! report when built as "gshare".

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use simsweep::sweep::{
    run_sweep, BuildConfig, FailurePolicy, HarnessConfig, InvocationRecipe, PoolConfig,
    SchemaConfig, SweepError,
};

const GOOD_OUTPUT: &str = "\
CPU 0 cumulative IPC: 1 instructions: 20000000 cycles: 20000000
CPU 0 Branch Prediction Accuracy: 96% MPKI: 3 Average ROB Occupancy at Mispredict: 40
BRANCH_CONDITIONAL: 0.5
cpu0_L2C TOTAL ACCESS: 100 HIT: 80 MISS: 20
";

const RUN_SCRIPT: &str = r#"
cat "$1"
if [ "$(cat current_config)" = "gshare" ]; then
    echo "CPU 0 final IPC: 2.5"
fi
"#;

struct Fixture {
    _dir: tempfile::TempDir,
    config: HarnessConfig,
}

fn fixture(traces: &[(&str, &str)]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = harness(dir.path(), traces);
    Fixture { _dir: dir, config }
}

/// Same layout, addressed by paths relative to the current directory
fn relative_fixture(traces: &[(&str, &str)]) -> Fixture {
    let dir = tempfile::Builder::new()
        .prefix("simsweep-it-")
        .tempdir_in(".")
        .unwrap();
    let rel = PathBuf::from(dir.path().file_name().unwrap());
    let config = harness(&rel, traces);
    Fixture { _dir: dir, config }
}

fn harness(root: &Path, traces: &[(&str, &str)]) -> HarnessConfig {
    let sim = root.join("champsim");
    let trace_dir = root.join("traces");
    fs::create_dir_all(&sim).unwrap();
    fs::create_dir_all(&trace_dir).unwrap();

    let config_script = sim.join("config.sh");
    fs::write(&config_script, "#!/bin/sh\necho \"$1\" > current_config\n").unwrap();
    fs::set_permissions(&config_script, fs::Permissions::from_mode(0o755)).unwrap();
    fs::write(sim.join("run.sh"), RUN_SCRIPT).unwrap();

    for (name, body) in traces {
        fs::write(trace_dir.join(name), body).unwrap();
    }

    HarnessConfig {
        simulator_dir: sim,
        traces_dir: trace_dir,
        build: BuildConfig {
            config_script: "./config.sh".into(),
            make_program: "true".into(),
            make_jobs: 2,
        },
        recipe: InvocationRecipe {
            program: "sh".into(),
            warmup_instructions: 5_000_000,
            simulation_instructions: 20_000_000,
            args: vec!["run.sh".into(), "{trace}".into()],
        },
        pool: PoolConfig {
            max_concurrency: Some(4),
            task_timeout_secs: Some(30),
        },
        failure_policy: FailurePolicy::FailFast,
        schema: SchemaConfig::Extended {
            cache_block: "cpu0_L2C".into(),
        },
        experiments: vec![
            "baseline=bimodal".parse().unwrap(),
            "variant-A=gshare".parse().unwrap(),
        ],
    }
}

fn current_config(sim: &Path) -> String {
    fs::read_to_string(sim.join("current_config"))
        .unwrap()
        .trim()
        .to_string()
}

#[tokio::test]
async fn test_sweep_compares_experiments() {
    let fx = fixture(&[
        ("600.perlbench.xz", GOOD_OUTPUT),
        ("605.mcf.xz", GOOD_OUTPUT),
        ("623.xalancbmk.xz", GOOD_OUTPUT),
    ]);

    let report = run_sweep(&fx.config).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.fields.len(), 5);
    assert_eq!(report.experiments.len(), 2);
    assert_eq!(report.experiments[0].experiment.table.len(), 3);
    assert_eq!(report.experiments[1].label, "variant-A");
    assert_eq!(current_config(&fx.config.simulator_dir), "gshare");

    // One series set per field, trace order shared by both experiments
    assert_eq!(report.series.len(), 5);
    let ipc = &report.series[0];
    assert_eq!(ipc.field, "ipc");
    assert_eq!(ipc.traces.len(), 3);
    assert_eq!(ipc.labels(), vec!["baseline", "variant-A"]);
    assert_eq!(ipc.series[0].values, vec![1.0, 1.0, 1.0]);
    assert_eq!(ipc.series[1].values, vec![2.5, 2.5, 2.5]);

    let hits = &report.series[4];
    assert_eq!(hits.field, "l2c_hits");
    assert_eq!(hits.series[1].values, vec![80.0, 80.0, 80.0]);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["series"][0]["series"][1]["label"], "variant-A");

    let md = report.to_markdown();
    assert!(md.contains("| baseline | bimodal | 3 | 0 |"));
    assert!(md.contains("### ipc"));
}

#[tokio::test]
async fn test_sweep_with_relative_dirs() {
    let fx = relative_fixture(&[("600.perlbench.xz", GOOD_OUTPUT), ("605.mcf.xz", GOOD_OUTPUT)]);
    assert!(fx.config.simulator_dir.is_relative());
    assert!(fx.config.traces_dir.is_relative());

    let report = run_sweep(&fx.config).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(current_config(&fx.config.simulator_dir), "gshare");
    let ipc = &report.series[0];
    let mut traces = ipc.traces.clone();
    traces.sort();
    assert_eq!(traces, vec!["600.perlbench.xz", "605.mcf.xz"]);
    assert_eq!(ipc.series[1].values, vec![2.5, 2.5]);
}

#[tokio::test]
async fn test_sweep_fails_fast_on_bad_output() {
    let fx = fixture(&[
        ("600.perlbench.xz", GOOD_OUTPUT),
        ("999.truncated.xz", "CPU 0 cumulative IPC: 1"),
    ]);

    match run_sweep(&fx.config).await.unwrap_err() {
        SweepError::Batch { experiment, source } => {
            assert_eq!(experiment, "baseline");
            assert_eq!(source.stage(), "parse");
            assert_eq!(source.trace(), Some("999.truncated.xz"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // Second experiment never built
    assert_eq!(current_config(&fx.config.simulator_dir), "bimodal");
}

#[tokio::test]
async fn test_sweep_collects_partial_results() {
    let mut fx = fixture(&[
        ("600.perlbench.xz", GOOD_OUTPUT),
        ("605.mcf.xz", GOOD_OUTPUT),
        ("999.truncated.xz", "CPU 0 cumulative IPC: 1"),
    ]);
    fx.config.failure_policy = FailurePolicy::CollectPartial;

    let report = run_sweep(&fx.config).await.unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.failure_count(), 2);
    for exp in &report.experiments {
        assert_eq!(exp.experiment.table.len(), 2);
        assert_eq!(exp.failures[0].trace.as_deref(), Some("999.truncated.xz"));
        assert_eq!(exp.failures[0].stage, "parse");
    }
    assert_eq!(report.series[0].traces.len(), 2);
    assert!(report.to_markdown().contains("## Failed Runs"));
}

#[tokio::test]
async fn test_sweep_build_failure_is_fatal() {
    let mut fx = fixture(&[("600.perlbench.xz", GOOD_OUTPUT)]);
    fx.config.build.make_program = "false".into();

    let err = run_sweep(&fx.config).await.unwrap_err();
    assert!(matches!(err, SweepError::Build { ref experiment, .. } if experiment == "baseline"));
}

#[tokio::test]
async fn test_sweep_requires_experiments() {
    let mut fx = fixture(&[("600.perlbench.xz", GOOD_OUTPUT)]);
    fx.config.experiments.clear();

    assert!(matches!(
        run_sweep(&fx.config).await.unwrap_err(),
        SweepError::NoExperiments
    ));
}

#[tokio::test]
async fn test_sweep_missing_trace_dir() {
    let mut fx = fixture(&[]);
    fx.config.traces_dir = fx.config.traces_dir.join("absent");

    match run_sweep(&fx.config).await.unwrap_err() {
        SweepError::Batch { source, .. } => assert_eq!(source.stage(), "enumerate"),
        other => panic!("unexpected error: {other}"),
    }
}
