//! Concurrent Batch Runner
//!
//! Fans the launcher out over every trace, bounded by a semaphore, and drains
//! completions through a single `JoinSet`. Only the collecting loop touches the
//! table, so no locking is needed. Table order is completion order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::config::PoolConfig;
use super::error::{BatchError, RunError};
use super::launcher::Launcher;
use super::parser::OutputSchema;
use super::table::{MetricsTable, MetricsTableBuilder};
use super::trace::{list_traces, Trace};

/// What a batch does when one run fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// First failure aborts the outstanding runs and fails the batch
    #[default]
    FailFast,
    /// Every run completes; failures are reported beside the table
    CollectPartial,
}

/// Result of one batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub table: MetricsTable,
    /// Always empty under [`FailurePolicy::FailFast`]
    pub failures: Vec<BatchError>,
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct BatchRunner<L> {
    launcher: Arc<L>,
    schema: Arc<OutputSchema>,
    max_concurrency: usize,
    task_timeout: Option<Duration>,
    policy: FailurePolicy,
}

impl<L: Launcher + 'static> BatchRunner<L> {
    pub fn new(launcher: L, schema: OutputSchema, pool: &PoolConfig, policy: FailurePolicy) -> Self {
        Self {
            launcher: Arc::new(launcher),
            schema: Arc::new(schema),
            max_concurrency: pool.concurrency(),
            task_timeout: pool.task_timeout(),
            policy,
        }
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run every trace file in `traces_dir`
    pub async fn run_dir(&self, traces_dir: &Path) -> Result<BatchOutcome, BatchError> {
        let traces = list_traces(traces_dir)?;
        info!("Found {} traces in {}", traces.len(), traces_dir.display());
        self.run(traces).await
    }

    pub async fn run(&self, traces: Vec<Trace>) -> Result<BatchOutcome, BatchError> {
        let start = Instant::now();
        let total = traces.len();
        info!(
            "Running {} traces (max {} concurrent, policy {:?})",
            total, self.max_concurrency, self.policy
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut names: HashMap<Id, String> = HashMap::with_capacity(total);
        for trace in traces {
            let name = trace.name.clone();
            let launcher = Arc::clone(&self.launcher);
            let permits = Arc::clone(&permits);
            let task_timeout = self.task_timeout;
            let handle = tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                match task_timeout {
                    Some(limit) => match timeout(limit, launcher.launch(&trace)).await {
                        Ok(result) => result,
                        Err(_) => Err(RunError::Timeout {
                            trace: trace.name.clone(),
                            after: limit,
                        }),
                    },
                    None => launcher.launch(&trace).await,
                }
            });
            names.insert(handle.id(), name);
        }

        let mut builder = MetricsTable::builder(self.schema.field_names());
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            let outcome = match joined {
                Ok((id, result)) => {
                    let name = names.remove(&id).unwrap_or_default();
                    self.collect(&mut builder, name, result)
                }
                Err(e) => Err(BatchError::Task {
                    trace: names.remove(&e.id()).unwrap_or_default(),
                    reason: e.to_string(),
                }),
            };

            if let Err(e) = outcome {
                error!("{}", e);
                match self.policy {
                    FailurePolicy::FailFast => {
                        // Dropping the aborted tasks kills their child processes
                        tasks.abort_all();
                        warn!(
                            "Aborting batch after failure ({} of {} traces collected)",
                            builder.len(),
                            total
                        );
                        return Err(e);
                    }
                    FailurePolicy::CollectPartial => failures.push(e),
                }
            }
        }

        let elapsed = start.elapsed();
        if failures.is_empty() {
            info!("Batch complete: {} traces in {:.1}s", builder.len(), elapsed.as_secs_f64());
        } else {
            warn!(
                "Batch finished with {} failures ({} of {} traces collected)",
                failures.len(),
                builder.len(),
                total
            );
        }

        Ok(BatchOutcome {
            table: builder.finish(),
            failures,
            elapsed,
        })
    }

    fn collect(
        &self,
        builder: &mut MetricsTableBuilder,
        name: String,
        result: Result<Vec<u8>, RunError>,
    ) -> Result<(), BatchError> {
        let output = result?;
        let record = self.schema.parse(&output).map_err(|source| BatchError::Parse {
            trace: name.clone(),
            source,
        })?;
        debug!("{} -> {:?}", name, record.values());
        if builder.insert(name.clone(), record).is_some() {
            warn!("Duplicate trace name '{}': earlier result overwritten", name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::error::ParseError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned output per trace name; unknown traces exit non-zero
    struct FakeLauncher {
        outputs: HashMap<String, String>,
        delay: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
        launched: AtomicUsize,
    }

    impl FakeLauncher {
        fn new(outputs: &[(&str, &str)]) -> Self {
            Self {
                outputs: outputs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                delay: Duration::from_millis(5),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                launched: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Launcher for FakeLauncher {
        async fn launch(&self, trace: &Trace) -> Result<Vec<u8>, RunError> {
            self.launched.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if trace.name.starts_with("panic") {
                panic!("simulator wrapper crashed on {}", trace.name);
            }
            match self.outputs.get(&trace.name) {
                Some(text) => Ok(text.clone().into_bytes()),
                None => Err(RunError::Exit {
                    trace: trace.name.clone(),
                    status: Some(1),
                    diagnostics: "trace not found".into(),
                }),
            }
        }
    }

    fn traces(names: &[&str]) -> Vec<Trace> {
        names
            .iter()
            .map(|n| Trace::from_path(format!("/traces/{}", n)))
            .collect()
    }

    fn pool(max: usize) -> PoolConfig {
        PoolConfig {
            max_concurrency: Some(max),
            task_timeout_secs: None,
        }
    }

    fn output(ipc: f64) -> String {
        format!(
            "warmup IPC: 9.9 ... IPC: {} ... MPKI: 3.2 BRANCH_CONDITIONAL: 0.4",
            ipc
        )
    }

    #[tokio::test]
    async fn test_all_traces_collected() {
        let (a, b, c) = (output(1.0), output(2.0), output(3.0));
        let launcher = FakeLauncher::new(&[("a.xz", a.as_str()), ("b.xz", b.as_str()), ("c.xz", c.as_str())]);
        let runner = BatchRunner::new(launcher, OutputSchema::core(), &pool(2), FailurePolicy::FailFast);

        let outcome = runner.run(traces(&["a.xz", "b.xz", "c.xz"])).await.unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.table.len(), 3);
        assert_eq!(outcome.table.get("b.xz").and_then(|r| r.get(0)), Some(2.0));
        assert_eq!(outcome.table.fields()[0], "ipc");
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let text = output(1.0);
        let names: Vec<String> = (0..12).map(|i| format!("t{}", i)).collect();
        let pairs: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), text.as_str())).collect();
        let launcher = FakeLauncher::new(&pairs).with_delay(Duration::from_millis(20));
        let runner = BatchRunner::new(launcher, OutputSchema::core(), &pool(3), FailurePolicy::FailFast);

        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let outcome = runner.run(traces(&refs)).await.unwrap();
        assert_eq!(outcome.table.len(), 12);
        assert!(runner.launcher.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_fail_fast_returns_error_not_table() {
        let a = output(1.0);
        let launcher = FakeLauncher::new(&[("a.xz", a.as_str())]);
        let runner = BatchRunner::new(launcher, OutputSchema::core(), &pool(1), FailurePolicy::FailFast);

        let err = runner.run(traces(&["a.xz", "missing.xz"])).await.unwrap_err();
        assert_eq!(err.stage(), "run");
        assert_eq!(err.trace(), Some("missing.xz"));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_outstanding_runs() {
        // Single worker: the failing first trace must prevent most later launches
        let ok = output(1.0);
        let names: Vec<String> = (0..20).map(|i| format!("t{:02}", i)).collect();
        let pairs: Vec<(&str, &str)> = names
            .iter()
            .skip(1)
            .map(|n| (n.as_str(), ok.as_str()))
            .collect();
        let launcher = FakeLauncher::new(&pairs).with_delay(Duration::from_millis(10));
        let runner = BatchRunner::new(launcher, OutputSchema::core(), &pool(1), FailurePolicy::FailFast);

        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        assert!(runner.run(traces(&refs)).await.is_err());
        assert!(runner.launcher.launched.load(Ordering::SeqCst) < 20);
    }

    #[tokio::test]
    async fn test_parse_failure_names_trace() {
        let launcher = FakeLauncher::new(&[("bad.xz", "IPC: 1.0 MPKI: 2.0")]);
        let runner = BatchRunner::new(launcher, OutputSchema::core(), &pool(2), FailurePolicy::FailFast);

        match runner.run(traces(&["bad.xz"])).await.unwrap_err() {
            BatchError::Parse { trace, source } => {
                assert_eq!(trace, "bad.xz");
                assert!(matches!(source, ParseError::LabelNotFound { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_collect_partial_keeps_successes() {
        let (a, c) = (output(1.0), output(3.0));
        let launcher = FakeLauncher::new(&[("a.xz", a.as_str()), ("c.xz", c.as_str()), ("p.xz", "IPC: oops")]);
        let runner = BatchRunner::new(
            launcher,
            OutputSchema::core(),
            &pool(4),
            FailurePolicy::CollectPartial,
        );

        let outcome = runner
            .run(traces(&["a.xz", "b.xz", "c.xz", "p.xz"]))
            .await
            .unwrap();
        assert!(!outcome.is_complete());
        assert_eq!(outcome.table.len(), 2);
        assert!(outcome.table.contains("a.xz") && outcome.table.contains("c.xz"));

        let mut failed: Vec<_> = outcome
            .failures
            .iter()
            .map(|f| (f.trace().unwrap_or_default().to_string(), f.stage()))
            .collect();
        failed.sort();
        assert_eq!(
            failed,
            vec![("b.xz".to_string(), "run"), ("p.xz".to_string(), "parse")]
        );
    }

    #[tokio::test]
    async fn test_panicked_worker_names_trace() {
        let a = output(1.0);
        let launcher = FakeLauncher::new(&[("a.xz", a.as_str())]);
        let runner = BatchRunner::new(
            launcher,
            OutputSchema::core(),
            &pool(2),
            FailurePolicy::CollectPartial,
        );

        let outcome = runner.run(traces(&["a.xz", "panic.xz"])).await.unwrap();
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        let failure = &outcome.failures[0];
        assert_eq!(failure.stage(), "task");
        assert_eq!(failure.trace(), Some("panic.xz"));
        assert!(matches!(failure, BatchError::Task { .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_a_run_failure() {
        let a = output(1.0);
        let launcher = FakeLauncher::new(&[("slow.xz", a.as_str())]).with_delay(Duration::from_secs(5));
        let mut runner = BatchRunner::new(launcher, OutputSchema::core(), &pool(1), FailurePolicy::FailFast);
        runner.task_timeout = Some(Duration::from_millis(20));

        let err = runner.run(traces(&["slow.xz"])).await.unwrap_err();
        assert!(matches!(err, BatchError::Run(RunError::Timeout { ref trace, .. }) if trace == "slow.xz"));
    }

    #[tokio::test]
    async fn test_duplicate_basenames_collide() {
        let a = output(1.0);
        let launcher = FakeLauncher::new(&[("same.xz", a.as_str())]);
        let runner = BatchRunner::new(launcher, OutputSchema::core(), &pool(2), FailurePolicy::FailFast);

        let batch = vec![
            Trace::from_path("/suite-a/same.xz"),
            Trace::from_path("/suite-b/same.xz"),
        ];
        let outcome = runner.run(batch).await.unwrap();
        assert_eq!(outcome.table.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let runner = BatchRunner::new(
            FakeLauncher::new(&[]),
            OutputSchema::core(),
            &pool(2),
            FailurePolicy::FailFast,
        );
        let outcome = runner.run(Vec::new()).await.unwrap();
        assert!(outcome.table.is_empty());
        assert!(outcome.is_complete());
    }
}
