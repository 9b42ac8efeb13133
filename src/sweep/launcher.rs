//! Simulator Launcher
//!
//! Runs the external simulation binary once per trace and hands back its
//! captured stdout. No retries; concurrency is the runner's business.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use super::config::InvocationRecipe;
use super::error::RunError;
use super::trace::Trace;

/// Longest diagnostic excerpt kept from a failed process
const MAX_DIAGNOSTIC_BYTES: usize = 4096;

/// One simulator invocation for one trace
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Completes when the run has finished; returns its raw output
    async fn launch(&self, trace: &Trace) -> Result<Vec<u8>, RunError>;
}

/// Launches a real process from an [`InvocationRecipe`]
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    working_dir: PathBuf,
    recipe: InvocationRecipe,
}

impl CommandLauncher {
    pub fn new(working_dir: impl Into<PathBuf>, recipe: InvocationRecipe) -> Self {
        Self {
            working_dir: working_dir.into(),
            recipe,
        }
    }

    pub fn recipe(&self) -> &InvocationRecipe {
        &self.recipe
    }
}

#[async_trait]
impl Launcher for CommandLauncher {
    async fn launch(&self, trace: &Trace) -> Result<Vec<u8>, RunError> {
        let spawn_err = |source: io::Error| RunError::Spawn {
            trace: trace.name.clone(),
            source,
        };
        // The child runs inside working_dir, so every path it sees is absolute
        let working_dir = std::fs::canonicalize(&self.working_dir).map_err(spawn_err)?;
        let trace_path = anchor(&trace.path).map_err(spawn_err)?;

        let program = resolve_program(&working_dir, &self.recipe.program);
        let args = self.recipe.render_args(&trace_path);
        debug!("Launching {} for {} ({:?})", program.display(), trace.name, args);

        // kill_on_drop: an aborted batch must not leave simulators behind
        let output = Command::new(&program)
            .args(&args)
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(spawn_err)?;

        if !output.status.success() {
            return Err(RunError::Exit {
                trace: trace.name.clone(),
                status: output.status.code(),
                diagnostics: diagnostics(&output),
            });
        }

        debug!("{} finished ({} bytes of output)", trace.name, output.stdout.len());
        Ok(output.stdout)
    }
}

/// Relative paths with a directory component (`bin/champsim`, `./config.sh`)
/// are taken relative to the simulator directory; bare names go through PATH.
pub(crate) fn resolve_program(working_dir: &Path, program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        working_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

/// `path` against the harness's current directory; absolute paths pass through
pub(crate) fn anchor(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Tail of stderr, or of stdout when stderr is empty
pub(crate) fn diagnostics(output: &Output) -> String {
    let stream = if output.stderr.iter().all(u8::is_ascii_whitespace) {
        &output.stdout
    } else {
        &output.stderr
    };
    let start = stream.len().saturating_sub(MAX_DIAGNOSTIC_BYTES);
    String::from_utf8_lossy(&stream[start..]).trim().to_string()
}
